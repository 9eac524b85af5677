//! Tests for the Database handle
//!
//! These tests verify:
//! - get / put / delete / scan through the public API
//! - Durability across close and reopen
//! - Size limits and layout adoption on reopen
//! - Corruption surfaces as errors, never as wrong values

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use bstdb::codec::{Node, NodeCodec};
use bstdb::storage::{RecordRead, HEADER_SIZE};
use bstdb::{BstError, Config, Database, SyncStrategy, TreeStats};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_db(dir: &Path) -> Database {
    Database::open_path(&dir.join("test.db")).unwrap()
}

fn collect(db: &Database) -> Vec<(Vec<u8>, Vec<u8>)> {
    db.scan().unwrap().collect::<Result<Vec<_>, _>>().unwrap()
}

fn pairs(items: &[(&str, &str)]) -> Vec<(Vec<u8>, Vec<u8>)> {
    items
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_put_get_delete_scan_walkthrough() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    db.put(b"b", b"1").unwrap();
    db.put(b"a", b"2").unwrap();
    db.put(b"c", b"3").unwrap();
    assert_eq!(collect(&db), pairs(&[("a", "2"), ("b", "1"), ("c", "3")]));

    assert!(db.delete(b"b").unwrap());
    assert_eq!(collect(&db), pairs(&[("a", "2"), ("c", "3")]));
    assert_eq!(db.get(b"b").unwrap(), None);
}

#[test]
fn test_get_missing_key() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    assert_eq!(db.get(b"nope").unwrap(), None);
    db.put(b"yes", b"1").unwrap();
    assert_eq!(db.get(b"nope").unwrap(), None);
}

#[test]
fn test_put_overwrites() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    db.put(b"key", b"old").unwrap();
    db.put(b"key", b"new").unwrap();

    assert_eq!(db.get(b"key").unwrap(), Some(b"new".to_vec()));
    assert_eq!(collect(&db).len(), 1);
}

#[test]
fn test_delete_on_empty_database() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    assert!(!db.delete(b"anything").unwrap());
    assert!(db.is_empty().unwrap());
}

#[test]
fn test_delete_twice() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    db.put(b"k", b"v").unwrap();

    assert!(db.delete(b"k").unwrap());
    assert!(!db.delete(b"k").unwrap());
}

#[test]
fn test_contains_and_is_empty() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    assert!(db.is_empty().unwrap());
    db.put(b"k", b"v").unwrap();
    assert!(db.contains(b"k").unwrap());
    assert!(!db.contains(b"other").unwrap());
    assert!(!db.is_empty().unwrap());

    db.delete(b"k").unwrap();
    assert!(db.is_empty().unwrap());
}

#[test]
fn test_empty_key_and_value() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    db.put(b"", b"").unwrap();
    db.put(b"a", b"").unwrap();

    assert_eq!(db.get(b"").unwrap(), Some(Vec::new()));
    assert_eq!(collect(&db), pairs(&[("", ""), ("a", "")]));
}

#[test]
fn test_binary_keys_order_bytewise() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    db.put(&[0xff], b"high").unwrap();
    db.put(&[0x00, 0x01], b"low").unwrap();
    db.put(&[0x00], b"lowest").unwrap();

    let keys: Vec<Vec<u8>> = collect(&db).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![vec![0x00], vec![0x00, 0x01], vec![0xff]]);
}

#[test]
fn test_scan_empty_database() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    assert!(collect(&db).is_empty());
}

// =============================================================================
// Size Limit Tests
// =============================================================================

#[test]
fn test_record_too_large() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp.path().join("small.db"))
        .max_key_len(4)
        .max_value_len(8)
        .build();
    let db = Database::open(config).unwrap();

    assert!(matches!(
        db.put(b"toolong", b"v"),
        Err(BstError::RecordTooLarge { field: "key", .. })
    ));
    assert!(matches!(
        db.put(b"k", b"123456789"),
        Err(BstError::RecordTooLarge { field: "value", .. })
    ));

    // Exactly at the limit is fine
    db.put(b"keyk", b"12345678").unwrap();
    assert_eq!(db.get(b"keyk").unwrap(), Some(b"12345678".to_vec()));
}

#[test]
fn test_invalid_config_rejected() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp.path().join("bad.db"))
        .max_key_len(0)
        .build();

    assert!(matches!(Database::open(config), Err(BstError::Config(_))));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_data_survives_reopen() {
    let temp = TempDir::new().unwrap();

    {
        let db = open_db(temp.path());
        db.put(b"b", b"1").unwrap();
        db.put(b"a", b"2").unwrap();
        db.put(b"c", b"3").unwrap();
        db.delete(b"b").unwrap();
        db.close().unwrap();
    }

    let db = open_db(temp.path());
    assert_eq!(collect(&db), pairs(&[("a", "2"), ("c", "3")]));
}

#[test]
fn test_data_survives_drop_without_close() {
    let temp = TempDir::new().unwrap();

    {
        let db = open_db(temp.path());
        db.put(b"k", b"v").unwrap();
    }

    let db = open_db(temp.path());
    assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_os_buffered_then_sync() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("buffered.db");

    {
        let config = Config::builder()
            .path(&path)
            .sync_strategy(SyncStrategy::OsBuffered)
            .build();
        let db = Database::open(config).unwrap();
        for i in 0..20u32 {
            db.put(format!("k{:02}", i).as_bytes(), &i.to_le_bytes()).unwrap();
        }
        db.sync().unwrap();
    }

    let db = Database::open_path(&path).unwrap();
    assert_eq!(collect(&db).len(), 20);
    assert_eq!(db.get(b"k07").unwrap(), Some(7u32.to_le_bytes().to_vec()));
}

#[test]
fn test_reopen_adopts_stored_layout() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("layout.db");

    let first = Config::builder()
        .path(&path)
        .max_key_len(8)
        .max_value_len(8)
        .build();
    let record_size = {
        let db = Database::open(first).unwrap();
        db.put(b"key", b"value").unwrap();
        db.record_size()
    };

    let second = Config::builder()
        .path(&path)
        .max_key_len(64)
        .max_value_len(1024)
        .build();
    let db = Database::open(second).unwrap();

    assert_eq!(db.record_size(), record_size);
    assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
    assert!(matches!(
        db.put(b"key", b"longer than eight"),
        Err(BstError::RecordTooLarge { .. })
    ));
}

#[test]
fn test_reclaim_space_reuses_records() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    for i in 0..10u8 {
        db.put(&[i], b"v").unwrap();
    }
    let len = db.storage().file_len().unwrap();

    for i in 0..10u8 {
        db.delete(&[i]).unwrap();
    }
    for i in 10..20u8 {
        db.put(&[i], b"v").unwrap();
    }

    assert_eq!(db.storage().file_len().unwrap(), len);
}

#[test]
fn test_without_reclaim_file_only_grows() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp.path().join("grow.db"))
        .reclaim_space(false)
        .build();
    let db = Database::open(config).unwrap();

    db.put(b"a", b"1").unwrap();
    let len = db.storage().file_len().unwrap();
    db.delete(b"a").unwrap();
    db.put(b"b", b"2").unwrap();

    assert_eq!(db.storage().file_len().unwrap(), len + db.record_size() as u64);
}

// =============================================================================
// Verification Tests
// =============================================================================

#[test]
fn test_verify_reports_stats() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    for key in ["m", "c", "x", "a"] {
        db.put(key.as_bytes(), b"v").unwrap();
    }
    db.delete(b"x").unwrap();

    assert_eq!(
        db.verify().unwrap(),
        TreeStats {
            live: 3,
            tombstones: 0,
            free: 1,
            orphaned: 0,
            total_records: 4,
            max_depth: 3,
        }
    );
}

#[test]
fn test_verify_empty_database() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    assert_eq!(db.verify().unwrap(), TreeStats::default());
}

// =============================================================================
// Interrupted Mutation Tests
// =============================================================================

fn codec_for(db: &Database) -> NodeCodec {
    NodeCodec::new(db.config().max_key_len, db.config().max_value_len)
}

#[test]
fn test_unlinked_append_leaves_tree_intact() {
    let temp = TempDir::new().unwrap();

    {
        let db = open_db(temp.path());
        db.put(b"b", b"1").unwrap();
        db.put(b"a", b"2").unwrap();

        // Insert that stopped after placing its record, before linking it
        let bytes = codec_for(&db).encode(&Node::new(b"c".to_vec(), b"3".to_vec())).unwrap();
        let mut guard = db.storage().exclusive().unwrap();
        guard.append_record(&bytes).unwrap();
        guard.flush().unwrap();
    }

    let db = open_db(temp.path());
    assert_eq!(collect(&db), pairs(&[("a", "2"), ("b", "1")]));
    assert_eq!(db.get(b"c").unwrap(), None);

    let stats = db.verify().unwrap();
    assert_eq!(stats.live, 2);
    assert_eq!(stats.orphaned, 1);
    assert_eq!(stats.total_records, 3);

    // Still writable
    db.put(b"c", b"3").unwrap();
    assert_eq!(collect(&db), pairs(&[("a", "2"), ("b", "1"), ("c", "3")]));
    assert_eq!(db.verify().unwrap().orphaned, 1);
}

#[test]
fn test_unfilled_free_list_pop_leaks_one_slot() {
    let temp = TempDir::new().unwrap();

    {
        let db = open_db(temp.path());
        db.put(b"b", b"1").unwrap();
        db.put(b"a", b"2").unwrap();
        db.put(b"c", b"3").unwrap();
        db.delete(b"c").unwrap();
        assert_eq!(db.verify().unwrap().free, 1);

        // Allocation that popped the free list, then stopped before filling the slot
        let mut guard = db.storage().exclusive().unwrap();
        let mut header = *guard.header();
        header.free_head = None;
        guard.write_header(header).unwrap();
        guard.flush().unwrap();
    }

    let db = open_db(temp.path());
    assert_eq!(collect(&db), pairs(&[("a", "2"), ("b", "1")]));

    let stats = db.verify().unwrap();
    assert_eq!(stats.live, 2);
    assert_eq!(stats.free, 0);
    assert_eq!(stats.orphaned, 1);

    // Leaked slot is not handed out again
    let len = db.storage().file_len().unwrap();
    db.put(b"d", b"4").unwrap();
    assert_eq!(db.storage().file_len().unwrap(), len + db.record_size() as u64);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_damaged_record_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("damaged.db");

    {
        let db = Database::open_path(&path).unwrap();
        db.put(b"key", b"value").unwrap();
    }

    // Flip a byte inside the root record's key area
    {
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(HEADER_SIZE + 21)).unwrap();
        file.write_all(b"X").unwrap();
        file.sync_all().unwrap();
    }

    let db = Database::open_path(&path).unwrap();
    assert!(matches!(
        db.get(b"key"),
        Err(BstError::CorruptRecord { offset, .. }) if offset == HEADER_SIZE
    ));
    assert!(db.scan().unwrap().next().unwrap().is_err());
    assert!(db.verify().is_err());
}

#[test]
fn test_damaged_header_refuses_open() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("header.db");

    {
        let db = Database::open_path(&path).unwrap();
        db.put(b"k", b"v").unwrap();
    }
    {
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(8)).unwrap();
        file.write_all(&[0xAB, 0xCD]).unwrap();
    }

    assert!(matches!(
        Database::open_path(&path),
        Err(BstError::CorruptHeader(_))
    ));
}

#[test]
fn test_scan_restarts_after_writes() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());
    db.put(b"a", b"1").unwrap();

    let first: Vec<_> = db.scan().unwrap().collect();
    db.put(b"b", b"2").unwrap();
    let second: Vec<_> = db.scan().unwrap().collect();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
}
