//! Medium Module
//!
//! Persistence substrates a [`Pool`](crate::cache::Pool) writes through to.
//! The pool owns container and expiration logic; a medium only stores bytes.

mod file;
mod memcached;
mod memory;
mod network;
mod session;

pub use file::FileMedium;
pub use memcached::MemcachedClient;
pub use memory::MemoryMedium;
pub use network::{ClientError, ClientResult, KeyValueClient, NetworkMedium};
pub use session::{SessionEntry, SessionMedium, SessionStore};

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;

// == Stored Entry ==
/// Raw bytes read back from a medium.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    /// Encoded item
    pub bytes: Vec<u8>,
    /// When the medium last wrote the entry, if it keeps such a clock
    pub written_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    pub fn new(bytes: Vec<u8>, written_at: Option<DateTime<Utc>>) -> Self {
        Self { bytes, written_at }
    }

    /// True when the medium clock says the entry outlived `lifetime`.
    ///
    /// A lifetime reaching past the representable range never goes stale.
    pub fn is_stale(&self, lifetime: Option<Duration>, now: DateTime<Utc>) -> bool {
        match (self.written_at, lifetime) {
            (Some(written), Some(lifetime)) if lifetime > Duration::zero() => written
                .checked_add_signed(lifetime)
                .is_some_and(|deadline| deadline <= now),
            _ => false,
        }
    }
}

// == Medium Trait ==
/// Capability interface over a persistence substrate.
///
/// Keys handed to a medium have already passed key validation.
pub trait Medium: Send {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Reads the entry for `key`; `Ok(None)` when it does not exist.
    fn read(&mut self, key: &str) -> Result<Option<StoredEntry>>;

    /// Writes `bytes` under `key`. `ttl` is the item's remaining lifetime,
    /// `None` meaning it never expires.
    fn write(&mut self, key: &str, bytes: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Removes `key`. Removing an absent key succeeds.
    fn delete(&mut self, key: &str) -> Result<()>;

    fn exists(&mut self, key: &str) -> Result<bool>;

    /// Drops everything this medium owns. Shared media keep their data.
    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_by_medium_clock() {
        let now = Utc::now();
        let entry = StoredEntry::new(vec![], Some(now - Duration::seconds(10)));

        assert!(entry.is_stale(Some(Duration::seconds(5)), now));
        assert!(entry.is_stale(Some(Duration::seconds(10)), now));
        assert!(!entry.is_stale(Some(Duration::seconds(20)), now));
        assert!(!entry.is_stale(None, now));
    }

    #[test]
    fn test_no_clock_never_stale() {
        let entry = StoredEntry::new(vec![1], None);
        assert!(!entry.is_stale(Some(Duration::seconds(1)), Utc::now()));
    }

    #[test]
    fn test_unrepresentable_lifetime_never_stale() {
        let now = Utc::now();
        let entry = StoredEntry::new(vec![], Some(now));

        assert!(!entry.is_stale(Some(Duration::seconds(9_000_000_000_000)), now));
        assert!(!entry.is_stale(Some(Duration::MAX), now));
    }
}
