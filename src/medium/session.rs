//! Session Medium
//!
//! A session-scoped associative store shared through an explicit handle.
//! Each pool owns one namespace inside the store, indexed by its session key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::{CacheError, Result};
use crate::medium::{Medium, StoredEntry};

// == Session Entry ==
/// An encoded item plus the instant it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub item: Vec<u8>,
    pub written_at: DateTime<Utc>,
}

type Namespaces = HashMap<String, HashMap<String, SessionEntry>>;

// == Session Store ==
/// Handle to a session store. Clones share the same underlying data.
///
/// Namespaces are created with [`SessionStore::init`] and dropped with
/// [`SessionStore::teardown`]; nothing is created implicitly on access.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    namespaces: Arc<Mutex<Namespaces>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the namespace for `session_key` if it does not exist yet.
    pub fn init(&self, session_key: &str) -> Result<()> {
        let mut namespaces = self.lock()?;
        if !namespaces.contains_key(session_key) {
            debug!("Initialising session namespace {}", session_key);
            namespaces.insert(session_key.to_string(), HashMap::new());
        }
        Ok(())
    }

    /// Drops the namespace for `session_key`. Returns whether it existed.
    pub fn teardown(&self, session_key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(session_key).is_some())
    }

    pub fn is_initialised(&self, session_key: &str) -> bool {
        self.lock()
            .map(|namespaces| namespaces.contains_key(session_key))
            .unwrap_or(false)
    }

    /// Number of entries stored under `session_key`.
    pub fn entry_count(&self, session_key: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|namespaces| namespaces.get(session_key).map(HashMap::len))
            .unwrap_or(0)
    }

    /// Raw entry stored under `session_key` / `key`.
    pub fn entry(&self, session_key: &str, key: &str) -> Option<SessionEntry> {
        self.lock()
            .ok()
            .and_then(|namespaces| namespaces.get(session_key)?.get(key).cloned())
    }

    /// Replaces the entry stored under `session_key` / `key`.
    pub fn put_entry(&self, session_key: &str, key: &str, entry: SessionEntry) -> Result<()> {
        self.with_namespace(session_key, |namespace| {
            namespace.insert(key.to_string(), entry);
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Namespaces>> {
        self.namespaces
            .lock()
            .map_err(|_| CacheError::Storage("session store lock poisoned".to_string()))
    }

    fn with_namespace<T>(
        &self,
        session_key: &str,
        f: impl FnOnce(&mut HashMap<String, SessionEntry>) -> T,
    ) -> Result<T> {
        let mut namespaces = self.lock()?;
        let namespace = namespaces.get_mut(session_key).ok_or_else(|| {
            CacheError::Storage(format!("session namespace {} is not initialised", session_key))
        })?;
        Ok(f(namespace))
    }
}

// == Session Medium ==
/// Medium writing into one namespace of a [`SessionStore`].
///
/// Staleness is judged by the stored write timestamp against the pool's
/// default lifetime, not by the item's own expiration field alone.
#[derive(Debug, Clone)]
pub struct SessionMedium {
    store: SessionStore,
    session_key: String,
}

impl SessionMedium {
    /// Binds to `session_key` in `store`, initialising its namespace.
    ///
    /// # Errors
    /// `InvalidArgument` when `session_key` is empty.
    pub fn open(store: SessionStore, session_key: impl Into<String>) -> Result<Self> {
        let session_key = session_key.into();
        if session_key.is_empty() {
            return Err(CacheError::InvalidArgument("no session key provided".to_string()));
        }
        store.init(&session_key)?;
        info!("Session medium bound to {}", session_key);
        Ok(Self { store, session_key })
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

impl Medium for SessionMedium {
    fn name(&self) -> &'static str {
        "session"
    }

    fn read(&mut self, key: &str) -> Result<Option<StoredEntry>> {
        self.store.with_namespace(&self.session_key, |namespace| {
            namespace
                .get(key)
                .map(|entry| StoredEntry::new(entry.item.clone(), Some(entry.written_at)))
        })
    }

    fn write(&mut self, key: &str, bytes: &[u8], _ttl: Option<Duration>) -> Result<()> {
        let entry = SessionEntry {
            item: bytes.to_vec(),
            written_at: Utc::now(),
        };
        self.store.put_entry(&self.session_key, key, entry)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.store.with_namespace(&self.session_key, |namespace| {
            namespace.remove(key);
        })
    }

    fn exists(&mut self, key: &str) -> Result<bool> {
        self.store
            .with_namespace(&self.session_key, |namespace| namespace.contains_key(key))
    }

    fn clear(&mut self) -> Result<()> {
        self.store
            .with_namespace(&self.session_key, |namespace| namespace.clear())
    }
}
