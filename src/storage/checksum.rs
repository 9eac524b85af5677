//! Trailing CRC32 shared by the header and every record
//!
//! The last four bytes of a block hold the little-endian CRC32 of everything
//! before them. A torn or bit-flipped block fails verification.

/// Size of the checksum trailer
pub const CHECKSUM_SIZE: usize = 4;

/// Write the checksum trailer into the last four bytes of `block`
pub fn seal(block: &mut [u8]) {
    let body_len = block.len().saturating_sub(CHECKSUM_SIZE);
    let crc = crc32fast::hash(&block[..body_len]);
    block[body_len..].copy_from_slice(&crc.to_le_bytes());
}

/// Check the trailer written by [`seal`]
pub fn verify_seal(block: &[u8]) -> bool {
    if block.len() < CHECKSUM_SIZE {
        return false;
    }
    let body_len = block.len() - CHECKSUM_SIZE;
    let mut stored = [0u8; CHECKSUM_SIZE];
    stored.copy_from_slice(&block[body_len..]);
    crc32fast::hash(&block[..body_len]) == u32::from_le_bytes(stored)
}
