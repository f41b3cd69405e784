//! Network Medium
//!
//! Writes through to a remote key-value service. The remote enforces TTLs,
//! so no write clock is reported back to the pool.

use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::{validate_key, Pool};
use crate::error::{CacheError, Result};
use crate::medium::{Medium, StoredEntry};

// == Client Error ==
/// Failure reported by a [`KeyValueClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The remote has no entry for the key
    #[error("not found")]
    NotFound,

    /// The remote answered with an error
    #[error("{0}")]
    Remote(String),

    /// Transport failure
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for CacheError {
    fn from(err: ClientError) -> Self {
        CacheError::Storage(err.to_string())
    }
}

// == Key-Value Client ==
/// Operations a remote key-value service must offer.
///
/// TTLs are whole seconds; zero means the entry never expires.
pub trait KeyValueClient: Send {
    fn get(&mut self, key: &str) -> ClientResult<Vec<u8>>;
    fn set(&mut self, key: &str, value: &[u8], ttl_secs: u32) -> ClientResult<()>;
    fn delete(&mut self, key: &str) -> ClientResult<()>;
    fn touch(&mut self, key: &str, ttl_secs: u32) -> ClientResult<()>;
    fn increment(&mut self, key: &str, by: u64) -> ClientResult<u64>;
    fn decrement(&mut self, key: &str, by: u64) -> ClientResult<u64>;
    fn version(&mut self) -> ClientResult<String>;
    fn flush_all(&mut self) -> ClientResult<()>;
}

/// Whole seconds for the remote, rounding partial seconds up.
pub(crate) fn ttl_seconds(ttl: Option<Duration>) -> u32 {
    match ttl {
        None => 0,
        Some(ttl) => {
            let millis = ttl.num_milliseconds().max(1);
            let secs = (millis + 999) / 1000;
            u32::try_from(secs).unwrap_or(u32::MAX)
        }
    }
}

// == Network Medium ==
/// Medium backed by a remote key-value client.
///
/// `clear` leaves the remote untouched since the service may be shared;
/// use [`Pool::flush_all`] to wipe it explicitly.
#[derive(Debug)]
pub struct NetworkMedium<C> {
    client: C,
}

impl<C: KeyValueClient> NetworkMedium<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }
}

impl<C: KeyValueClient> Medium for NetworkMedium<C> {
    fn name(&self) -> &'static str {
        "network"
    }

    fn read(&mut self, key: &str) -> Result<Option<StoredEntry>> {
        match self.client.get(key) {
            Ok(bytes) => Ok(Some(StoredEntry::new(bytes, None))),
            Err(ClientError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8], ttl: Option<Duration>) -> Result<()> {
        let ttl_secs = ttl_seconds(ttl);
        debug!("Writing {} to remote with ttl {}s", key, ttl_secs);
        Ok(self.client.set(key, bytes, ttl_secs)?)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        match self.client.delete(key) {
            Ok(()) | Err(ClientError::NotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&mut self, key: &str) -> Result<bool> {
        Ok(self.read(key)?.is_some())
    }
}

// == Client Operations ==
/// The subset of raw client operations a network pool exposes.
///
/// Counters operate on raw remote values, not on items written by `save`.
impl<C, V> Pool<NetworkMedium<C>, V>
where
    C: KeyValueClient,
    V: Serialize + DeserializeOwned + Clone + Send,
{
    /// Resets the remote TTL of `key`. Returns false if the key is absent.
    pub fn touch(&mut self, key: &str, ttl: Option<Duration>) -> Result<bool> {
        validate_key(key)?;
        match self.medium_mut().client_mut().touch(key, ttl_seconds(ttl)) {
            Ok(()) => Ok(true),
            Err(ClientError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Increments a remote counter; `None` if the key is absent.
    pub fn increment(&mut self, key: &str, by: u64) -> Result<Option<u64>> {
        validate_key(key)?;
        match self.medium_mut().client_mut().increment(key, by) {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Decrements a remote counter; `None` if the key is absent.
    pub fn decrement(&mut self, key: &str, by: u64) -> Result<Option<u64>> {
        validate_key(key)?;
        match self.medium_mut().client_mut().decrement(key, by) {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Version string reported by the remote.
    pub fn version(&mut self) -> Result<String> {
        Ok(self.medium_mut().client_mut().version()?)
    }

    /// Wipes the remote, then both containers.
    pub fn flush_all(&mut self) -> Result<bool> {
        self.medium_mut().client_mut().flush_all()?;
        Ok(self.clear())
    }
}
