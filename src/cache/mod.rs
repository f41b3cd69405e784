//! Cache Module
//!
//! Cache items, the pool contract and its statistics.

mod item;
mod pool;
mod stats;


// Re-export public types
pub use item::{CacheItem, Expiration};
pub use pool::{CachePool, DynPool, Pool};
pub use stats::PoolStats;

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 64;

// == Key Validation ==
/// Checks `key` against `[A-Za-z0-9._]{1,64}`.
///
/// # Errors
/// `InvalidKey` for empty, over-long, or out-of-alphabet keys.
pub fn validate_key(key: &str) -> Result<()> {
    let valid_len = !key.is_empty() && key.len() <= MAX_KEY_LENGTH;
    let valid_chars = key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_');

    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(CacheError::InvalidKey(key.to_string()))
    }
}
