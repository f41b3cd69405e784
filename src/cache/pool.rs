//! Cache Pool Module
//!
//! Committed and deferred item containers layered over a persistence medium.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{validate_key, CacheItem, PoolStats};
use crate::error::Result;
use crate::medium::Medium;

// == Pool Contract ==
/// Object-safe pool contract, used where the medium is chosen at runtime.
pub trait CachePool<V>: Send {
    fn has_item(&self, key: &str) -> Result<bool>;
    fn get_item(&mut self, key: &str) -> Result<CacheItem<V>>;
    fn get_items(&mut self, keys: &[&str]) -> Result<BTreeMap<String, CacheItem<V>>>;
    fn delete_item(&mut self, key: &str) -> Result<bool>;
    fn delete_items(&mut self, keys: &[&str]) -> Result<bool>;
    fn save(&mut self, item: CacheItem<V>) -> Result<bool>;
    fn save_deferred(&mut self, item: CacheItem<V>) -> Result<bool>;
    fn commit(&mut self) -> bool;
    fn clear(&mut self) -> bool;
    fn set_expire_time(&mut self, expire: Option<Duration>);
    fn default_expire(&self) -> Option<Duration>;
    fn set(&mut self, key: &str, value: V) -> Result<bool>;
    fn stats(&self) -> PoolStats;
}

/// A pool over JSON values whose medium is picked at runtime.
pub type DynPool = Box<dyn CachePool<serde_json::Value>>;

// == Pool ==
/// Cache pool holding committed and deferred items over a medium `M`.
///
/// A key lives in at most one container. The medium is the source of truth:
/// reads consult it before the containers, and a failed write drops the
/// un-persisted item from the committed container.
///
/// Expiration is evaluated lazily on read. Nothing is swept in the background.
#[derive(Debug)]
pub struct Pool<M, V = serde_json::Value> {
    medium: M,
    /// Items persisted to the medium
    items: HashMap<String, CacheItem<V>>,
    /// Items awaiting commit
    deferred: HashMap<String, CacheItem<V>>,
    /// Lifetime applied on save to items without an explicit expiration
    default_expire: Option<Duration>,
    stats: PoolStats,
}

impl<M, V> Pool<M, V>
where
    M: Medium,
    V: Serialize + DeserializeOwned + Clone + Send,
{
    // == Constructors ==
    /// Creates an empty pool over `medium` with no default expiration.
    pub fn new(medium: M) -> Self {
        Self {
            medium,
            items: HashMap::new(),
            deferred: HashMap::new(),
            default_expire: None,
            stats: PoolStats::new(),
        }
    }

    /// Creates a pool seeded with already committed `items`.
    pub fn with_items(
        medium: M,
        items: impl IntoIterator<Item = CacheItem<V>>,
        default_expire: Option<Duration>,
    ) -> Self {
        let mut pool = Self::new(medium);
        pool.items = items
            .into_iter()
            .map(|item| (item.key().to_string(), item))
            .collect();
        pool.default_expire = default_expire;
        pool
    }

    /// Builder form of [`Pool::set_expire_time`].
    pub fn with_expire(mut self, expire: Option<Duration>) -> Self {
        self.default_expire = expire;
        self
    }

    // == Accessors ==
    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    pub fn default_expire(&self) -> Option<Duration> {
        self.default_expire
    }

    /// True when `key` sits in the committed container.
    pub fn is_committed(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// True when `key` sits in the deferred container.
    pub fn is_deferred(&self, key: &str) -> bool {
        self.deferred.contains_key(key)
    }

    // == Has Item ==
    /// True if `key` is in either container. Expiration is not consulted.
    pub fn has_item(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.contains(key))
    }

    // == Get Item ==
    /// Resolves `key` to an item, creating a deferred placeholder on a miss.
    ///
    /// A deferred item that is still a hit shadows the medium; an expired one
    /// is dropped. Otherwise the medium is read first; entries that are stale
    /// by the medium clock or by their own expiration are deleted and replaced
    /// with a placeholder.
    ///
    /// # Errors
    /// `InvalidKey` for a bad key, `Storage` when the medium read fails.
    pub fn get_item(&mut self, key: &str) -> Result<CacheItem<V>> {
        validate_key(key)?;

        let now = Utc::now();
        let pending = self
            .deferred
            .get(key)
            .filter(|item| item.has_value())
            .map(|item| (item.is_hit_at(now), item.clone()));
        match pending {
            Some((true, pending)) => {
                debug!("Resolved {} from deferred writes", key);
                self.stats.record_hit();
                return Ok(pending);
            }
            Some((false, _)) => {
                debug!("Dropping expired deferred write for {}", key);
                self.deferred.remove(key);
                self.stats.record_eviction();
            }
            None => {}
        }

        let medium = self.medium.name();
        let stored = self.medium.read(key).inspect_err(|err| {
            warn!("Read of {} from {} medium failed: {}", key, medium, err);
        })?;

        if let Some(entry) = stored {
            if entry.is_stale(self.default_expire, now) {
                return Ok(self.evict(key));
            }
            let item = CacheItem::decode(key, &entry.bytes)?;
            if !item.is_hit_at(now) {
                return Ok(self.evict(key));
            }
            self.deferred.remove(key);
            self.items.insert(key.to_string(), item.clone());
            self.stats.record_hit();
            return Ok(item);
        }

        match self.items.get(key).map(|item| (item.is_hit_at(now), item.clone())) {
            Some((true, item)) => {
                self.stats.record_hit();
                Ok(item)
            }
            Some((false, _)) => Ok(self.evict(key)),
            None => Ok(self.placeholder(key)),
        }
    }

    // == Get Items ==
    /// Resolves several keys at once.
    ///
    /// With no keys, returns every item in both containers; on a key present
    /// in both, the committed item wins.
    pub fn get_items(&mut self, keys: &[&str]) -> Result<BTreeMap<String, CacheItem<V>>> {
        if keys.is_empty() {
            let mut all: BTreeMap<String, CacheItem<V>> = self
                .deferred
                .iter()
                .map(|(key, item)| (key.clone(), item.clone()))
                .collect();
            all.extend(
                self.items
                    .iter()
                    .map(|(key, item)| (key.clone(), item.clone())),
            );
            return Ok(all);
        }

        let mut found = BTreeMap::new();
        for key in keys {
            found.insert(key.to_string(), self.get_item(key)?);
        }
        Ok(found)
    }

    // == Delete Item ==
    /// Removes `key` from the medium, then from the containers.
    ///
    /// Returns true iff the key is absent afterwards. A failed physical
    /// delete returns false and leaves the containers untouched.
    pub fn delete_item(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        if let Err(err) = self.medium.delete(key) {
            warn!("Delete of {} from {} medium failed: {}", key, self.medium.name(), err);
            return Ok(false);
        }

        self.items.remove(key);
        self.deferred.remove(key);
        Ok(!self.contains(key))
    }

    // == Delete Items ==
    /// Deletes every key, continuing past failures.
    ///
    /// All keys are validated before anything is deleted. Returns true iff
    /// every deletion succeeded; use [`Pool::has_item`] to find the failures.
    pub fn delete_items(&mut self, keys: &[&str]) -> Result<bool> {
        for key in keys {
            validate_key(key)?;
        }

        let mut all_deleted = true;
        for key in keys {
            all_deleted &= self.delete_item(key)?;
        }
        Ok(all_deleted)
    }

    // == Save ==
    /// Persists `item` and moves it into the committed container.
    ///
    /// The pool's default lifetime is applied unless the item carries an
    /// explicit expiration. Items that are not a hit are refused. A medium
    /// failure returns false and drops any committed copy of the key.
    pub fn save(&mut self, mut item: CacheItem<V>) -> Result<bool> {
        validate_key(item.key())?;
        item.apply_default_expiration(self.default_expire);

        let now = Utc::now();
        if !item.is_hit_at(now) {
            debug!("Refusing to save {}: item is not a hit", item.key());
            return Ok(false);
        }

        let key = item.key().to_string();
        let written = item
            .encode()
            .and_then(|bytes| self.medium.write(&key, &bytes, item.ttl(now)));

        if let Err(err) = written {
            warn!("Write of {} to {} medium failed: {}", key, self.medium.name(), err);
            self.stats.record_write_failure();
            self.items.remove(&key);
            return Ok(false);
        }

        self.deferred.remove(&key);
        self.items.insert(key.clone(), item);
        Ok(self.contains(&key))
    }

    // == Save Deferred ==
    /// Queues `item` for the next [`Pool::commit`] without touching the medium.
    pub fn save_deferred(&mut self, item: CacheItem<V>) -> Result<bool> {
        validate_key(item.key())?;

        let key = item.key().to_string();
        self.items.remove(&key);
        self.deferred.insert(key.clone(), item);
        Ok(self.contains(&key))
    }

    // == Commit ==
    /// Saves every deferred item that carries a value.
    ///
    /// Each item gets an attempt regardless of earlier failures; failed items
    /// stay deferred. Miss placeholders are left alone. Returns true iff all
    /// attempted saves succeeded.
    pub fn commit(&mut self) -> bool {
        let mut pending: Vec<String> = self
            .deferred
            .iter()
            .filter(|(_, item)| item.has_value())
            .map(|(key, _)| key.clone())
            .collect();
        pending.sort();

        let mut all_saved = true;
        for key in &pending {
            let Some(item) = self.deferred.get(key).cloned() else {
                continue;
            };
            match self.save(item) {
                Ok(saved) => all_saved &= saved,
                Err(err) => {
                    warn!("Commit of {} failed: {}", key, err);
                    all_saved = false;
                }
            }
        }

        if !all_saved {
            warn!(
                "Commit incomplete: {} of {} items still deferred",
                pending.iter().filter(|key| self.deferred.contains_key(*key)).count(),
                pending.len()
            );
        }
        all_saved
    }

    // == Clear ==
    /// Clears the medium, then both containers.
    ///
    /// If the medium refuses, the containers are kept and false is returned.
    pub fn clear(&mut self) -> bool {
        if let Err(err) = self.medium.clear() {
            warn!("Clearing {} medium failed: {}", self.medium.name(), err);
            return false;
        }

        self.items.clear();
        self.deferred.clear();
        self.items.is_empty() && self.deferred.is_empty()
    }

    // == Default Expiration ==
    /// Sets the lifetime applied on save; `None` means never expire.
    pub fn set_expire_time(&mut self, expire: Option<Duration>) -> &mut Self {
        self.default_expire = expire;
        self
    }

    // == Set ==
    /// Assigns `value` to the item under `key` and saves it.
    pub fn set(&mut self, key: &str, value: V) -> Result<bool> {
        let mut item = self.get_item(key)?;
        item.set(value);
        self.save(item)
    }

    // == Stats ==
    pub fn stats(&self) -> PoolStats {
        let mut stats = self.stats.clone();
        stats.set_sizes(self.items.len(), self.deferred.len());
        stats
    }

    // == Internal Helpers ==
    fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key) || self.deferred.contains_key(key)
    }

    /// Existing placeholder for `key`, or a new one placed into `deferred`.
    fn placeholder(&mut self, key: &str) -> CacheItem<V> {
        self.stats.record_miss();
        self.deferred
            .entry(key.to_string())
            .or_insert_with(|| CacheItem::placeholder(key.to_string()))
            .clone()
    }

    /// Lazy eviction: purge a stale entry and hand back a fresh placeholder.
    fn evict(&mut self, key: &str) -> CacheItem<V> {
        debug!("Evicting stale item {}", key);
        if let Err(err) = self.medium.delete(key) {
            warn!("Eviction of {} from {} medium failed: {}", key, self.medium.name(), err);
        }
        self.items.remove(key);
        self.deferred.remove(key);
        self.stats.record_eviction();
        self.placeholder(key)
    }
}

impl<M, V> CachePool<V> for Pool<M, V>
where
    M: Medium,
    V: Serialize + DeserializeOwned + Clone + Send,
{
    fn has_item(&self, key: &str) -> Result<bool> {
        Pool::has_item(self, key)
    }

    fn get_item(&mut self, key: &str) -> Result<CacheItem<V>> {
        Pool::get_item(self, key)
    }

    fn get_items(&mut self, keys: &[&str]) -> Result<BTreeMap<String, CacheItem<V>>> {
        Pool::get_items(self, keys)
    }

    fn delete_item(&mut self, key: &str) -> Result<bool> {
        Pool::delete_item(self, key)
    }

    fn delete_items(&mut self, keys: &[&str]) -> Result<bool> {
        Pool::delete_items(self, keys)
    }

    fn save(&mut self, item: CacheItem<V>) -> Result<bool> {
        Pool::save(self, item)
    }

    fn save_deferred(&mut self, item: CacheItem<V>) -> Result<bool> {
        Pool::save_deferred(self, item)
    }

    fn commit(&mut self) -> bool {
        Pool::commit(self)
    }

    fn clear(&mut self) -> bool {
        Pool::clear(self)
    }

    fn set_expire_time(&mut self, expire: Option<Duration>) {
        Pool::set_expire_time(self, expire);
    }

    fn default_expire(&self) -> Option<Duration> {
        Pool::default_expire(self)
    }

    fn set(&mut self, key: &str, value: V) -> Result<bool> {
        Pool::set(self, key, value)
    }

    fn stats(&self) -> PoolStats {
        Pool::stats(self)
    }
}
