//! Cache Pool - pluggable cache item pools
//!
//! Items with expiration, a pool contract with deferred writes and commit,
//! and interchangeable persistence media (memory, file, session, memcached).

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod medium;
pub mod models;
pub mod registry;

pub use api::AppState;
pub use cache::{CacheItem, CachePool, DynPool, Pool};
pub use config::Config;
pub use error::{CacheError, Result};
pub use registry::Registry;
