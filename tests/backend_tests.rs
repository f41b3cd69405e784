//! Backend Contract Tests
//!
//! Exercises the pool contract over the file and session media.

use std::fs::{self, File};
use std::time::{Duration as StdDuration, SystemTime};

use cache_pool::cache::{CacheItem, Pool};
use cache_pool::medium::{FileMedium, Medium, SessionEntry, SessionMedium, SessionStore};
use cache_pool::CacheError;
use chrono::{Duration, Utc};

// == Helper Functions ==

fn backdate(path: &std::path::Path, by: StdDuration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - by).unwrap();
}

fn file_pool(dir: &std::path::Path, expire: Option<Duration>) -> Pool<FileMedium, String> {
    Pool::new(FileMedium::open(dir).unwrap()).with_expire(expire)
}

// == File Medium ==

#[test]
fn test_file_save_writes_one_file_per_key() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);

    assert!(pool.set("alpha", "A".to_string()).unwrap());
    assert!(pool.set("beta", "B".to_string()).unwrap());

    assert!(tmp.path().join("alpha").is_file());
    assert!(tmp.path().join("beta").is_file());
}

#[test]
fn test_file_item_visible_to_new_pool() {
    let tmp = tempfile::tempdir().unwrap();
    file_pool(tmp.path(), None).set("shared", "value".to_string()).unwrap();

    let mut reader = file_pool(tmp.path(), None);
    let item = reader.get_item("shared").unwrap();

    assert!(item.is_hit());
    assert_eq!(item.get().map(String::as_str), Some("value"));
    assert!(reader.is_committed("shared"));
}

#[test]
fn test_file_older_than_expire_window_is_evicted() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), Some(Duration::hours(1)));
    let mut item = CacheItem::with_value("old", "v".to_string()).unwrap();
    item.expires_after(None);
    pool.save(item).unwrap();

    backdate(&tmp.path().join("old"), StdDuration::from_secs(2 * 3600));

    let item = pool.get_item("old").unwrap();
    assert!(!item.is_hit());
    assert!(item.get().is_none());
    assert!(pool.is_deferred("old"));
    assert!(!tmp.path().join("old").exists());
}

#[test]
fn test_file_within_expire_window_survives() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), Some(Duration::hours(1)));
    pool.set("fresh", "v".to_string()).unwrap();

    backdate(&tmp.path().join("fresh"), StdDuration::from_secs(600));

    assert!(pool.get_item("fresh").unwrap().is_hit());
}

#[test]
fn test_file_without_default_never_expires() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);
    let mut item = CacheItem::with_value("keep", "v".to_string()).unwrap();
    item.expires_after(None);
    pool.save(item).unwrap();

    backdate(&tmp.path().join("keep"), StdDuration::from_secs(365 * 24 * 3600));

    for _ in 0..3 {
        assert!(pool.get_item("keep").unwrap().is_hit());
    }
}

#[test]
fn test_file_unrepresentable_expire_window_keeps_items() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), Some(Duration::seconds(9_000_000_000_000)));
    let mut item = CacheItem::with_value("k", "v".to_string()).unwrap();
    item.expires_after(None);

    assert!(pool.save(item).unwrap());
    assert!(pool.get_item("k").unwrap().is_hit());
}

#[test]
fn test_file_dot_keys_behave_as_absent() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);

    for key in [".", ".."] {
        let item = pool.get_item(key).unwrap();
        assert!(!item.is_hit());
        assert!(pool.is_deferred(key));

        assert!(pool.delete_item(key).unwrap());
        assert!(!pool.has_item(key).unwrap());
    }
    assert!(pool.delete_items(&[".", ".."]).unwrap());
}

#[test]
fn test_file_dot_keys_cannot_be_saved() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);

    assert!(!pool.set("..", "v".to_string()).unwrap());
    assert!(!pool.is_committed(".."));
    assert!(tmp.path().is_dir());
}

#[test]
fn test_file_delete_removes_file() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);
    pool.set("doomed", "v".to_string()).unwrap();

    assert!(pool.delete_item("doomed").unwrap());
    assert!(!tmp.path().join("doomed").exists());
}

#[test]
fn test_file_delete_items_continues_past_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);
    pool.set("k1", "v".to_string()).unwrap();
    pool.set("k3", "v".to_string()).unwrap();
    // A directory under a key name cannot be removed as a file
    fs::create_dir(tmp.path().join("k2")).unwrap();

    assert!(!pool.delete_items(&["k1", "k2", "k3"]).unwrap());

    assert!(!tmp.path().join("k1").exists());
    assert!(tmp.path().join("k2").exists());
    assert!(!tmp.path().join("k3").exists());
}

#[test]
fn test_file_commit_partial_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);
    fs::create_dir(tmp.path().join("blocked")).unwrap();
    pool.save_deferred(CacheItem::with_value("ok", "v".to_string()).unwrap()).unwrap();
    pool.save_deferred(CacheItem::with_value("blocked", "v".to_string()).unwrap()).unwrap();

    assert!(!pool.commit());

    assert!(pool.is_committed("ok"));
    assert!(pool.is_deferred("blocked"));
    assert!(tmp.path().join("ok").is_file());
}

#[test]
fn test_file_read_error_raises() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);
    fs::create_dir(tmp.path().join("dir.key")).unwrap();

    assert!(matches!(pool.get_item("dir.key"), Err(CacheError::Storage(_))));
}

#[test]
fn test_file_clear_removes_files() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pool = file_pool(tmp.path(), None);
    pool.set("a", "1".to_string()).unwrap();
    pool.save_deferred(CacheItem::with_value("b", "2".to_string()).unwrap()).unwrap();

    assert!(pool.clear());

    assert!(!tmp.path().join("a").exists());
    assert!(!pool.has_item("b").unwrap());
}

// == Session Medium ==

#[test]
fn test_session_pools_share_store() {
    let store = SessionStore::new();
    let mut writer: Pool<SessionMedium, u32> =
        Pool::new(SessionMedium::open(store.clone(), "visitor").unwrap());
    writer.set("visits", 3).unwrap();

    let mut reader: Pool<SessionMedium, u32> =
        Pool::new(SessionMedium::open(store.clone(), "visitor").unwrap());

    assert_eq!(reader.get_item("visits").unwrap().into_value(), Some(3));
    assert_eq!(store.entry_count("visitor"), 1);
}

#[test]
fn test_session_write_timestamp_decides_staleness() {
    let store = SessionStore::new();
    let mut pool: Pool<SessionMedium, String> =
        Pool::new(SessionMedium::open(store.clone(), "s").unwrap())
            .with_expire(Some(Duration::minutes(30)));
    let mut item = CacheItem::with_value("token", "abc".to_string()).unwrap();
    item.expires_after(Some(Duration::days(7)));
    pool.save(item).unwrap();

    let mut entry = store.entry("s", "token").unwrap();
    entry.written_at = Utc::now() - Duration::hours(1);
    store.put_entry("s", "token", entry).unwrap();

    assert!(!pool.get_item("token").unwrap().is_hit());
    assert!(store.entry("s", "token").is_none());
}

#[test]
fn test_session_clear_empties_namespace() {
    let store = SessionStore::new();
    let mut pool: Pool<SessionMedium, String> =
        Pool::new(SessionMedium::open(store.clone(), "s").unwrap());
    pool.set("a", "1".to_string()).unwrap();

    assert!(pool.clear());
    assert_eq!(store.entry_count("s"), 0);
}

#[test]
fn test_session_teardown_surfaces_storage_errors() {
    let store = SessionStore::new();
    let mut pool: Pool<SessionMedium, String> =
        Pool::new(SessionMedium::open(store.clone(), "s").unwrap());
    pool.set("a", "1".to_string()).unwrap();

    store.teardown("s").unwrap();

    assert!(matches!(pool.get_item("a"), Err(CacheError::Storage(_))));
    pool.save_deferred(CacheItem::with_value("b", "v".to_string()).unwrap()).unwrap();
    assert!(!pool.commit());
    assert!(!pool.clear());
}

#[test]
fn test_raw_session_entry_shape() {
    let store = SessionStore::new();
    let mut medium = SessionMedium::open(store.clone(), "raw").unwrap();
    medium.write("k", b"{}", None).unwrap();

    let SessionEntry { item, written_at } = store.entry("raw", "k").unwrap();
    assert_eq!(item, b"{}");
    assert!(written_at <= Utc::now());
}
