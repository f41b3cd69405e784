//! Strategy Registry
//!
//! Maps a strategy name to a pool builder plus its default options.
//! Caller options are merged over the defaults, caller values winning.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::cache::{DynPool, Pool};
use crate::error::{CacheError, Result};
use crate::medium::{
    FileMedium, MemcachedClient, MemoryMedium, NetworkMedium, SessionMedium, SessionStore,
};

// == Named Lifetimes ==
/// Seconds in one hour
pub const HOUR: i64 = 3600;
/// Seconds in one day
pub const DAY: i64 = 86_400;
/// Seconds in 30 days
pub const MONTH: i64 = 2_592_000;

/// Option holding the default lifetime in seconds (`null` for never)
pub const EXPIRE_KEY: &str = "expire";

/// Options handed to a strategy builder.
pub type StrategyOptions = Map<String, Value>;

type Builder = Box<dyn Fn(StrategyOptions) -> Result<DynPool> + Send + Sync>;

// == Strategy ==
/// A pool builder and the options it is called with by default.
pub struct Strategy {
    builder: Builder,
    defaults: StrategyOptions,
}

impl Strategy {
    pub fn new<F>(builder: F, defaults: StrategyOptions) -> Self
    where
        F: Fn(StrategyOptions) -> Result<DynPool> + Send + Sync + 'static,
    {
        Self {
            builder: Box::new(builder),
            defaults,
        }
    }

    pub fn defaults(&self) -> &StrategyOptions {
        &self.defaults
    }
}

// == Typed Options ==
#[derive(Debug, Deserialize)]
struct MemoryOptions {
    expire: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FileOptions {
    cache_dir: Option<PathBuf>,
    expire: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SessionOptions {
    session_key: String,
    expire: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MemcachedOptions {
    servers: Vec<String>,
    expire: Option<i64>,
    timeout_ms: Option<u64>,
}

/// Directory used by the file strategy when no `cache_dir` is given.
const DEFAULT_CACHE_DIR: &str = "cache";

fn parse<T: DeserializeOwned>(options: StrategyOptions) -> Result<T> {
    serde_json::from_value(Value::Object(options))
        .map_err(|err| CacheError::InvalidArgument(format!("invalid strategy options: {}", err)))
}

/// Non-positive or missing lifetimes mean "never expire".
fn expire_from(secs: Option<i64>) -> Result<Option<Duration>> {
    match secs.filter(|secs| *secs > 0) {
        Some(secs) => Duration::try_seconds(secs).map(Some).ok_or_else(|| {
            CacheError::InvalidArgument(format!("expire {} is out of range", secs))
        }),
        None => Ok(None),
    }
}

fn options(value: Value) -> StrategyOptions {
    match value {
        Value::Object(map) => map,
        _ => StrategyOptions::new(),
    }
}

// == Registry ==
/// Registry of named pool strategies.
pub struct Registry {
    strategies: HashMap<String, Strategy>,
}

impl Registry {
    /// A registry with no strategies.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// A registry with the `memory`, `file` and `memcached` strategies.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.strategies.insert(
            "memory".to_string(),
            Strategy::new(
                |options| {
                    let options: MemoryOptions = parse(options)?;
                    let expire = expire_from(options.expire)?;
                    let pool = Pool::<_, Value>::new(MemoryMedium::new()).with_expire(expire);
                    Ok(Box::new(pool) as DynPool)
                },
                options(json!({ "expire": null })),
            ),
        );

        registry.strategies.insert(
            "file".to_string(),
            Strategy::new(
                |options| {
                    let options: FileOptions = parse(options)?;
                    let expire = expire_from(options.expire)?;
                    let dir = options
                        .cache_dir
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
                    let pool = Pool::<_, Value>::new(FileMedium::open(dir)?).with_expire(expire);
                    Ok(Box::new(pool) as DynPool)
                },
                options(json!({ "cache_dir": null, "expire": DAY })),
            ),
        );

        registry.strategies.insert(
            "memcached".to_string(),
            Strategy::new(
                |options| {
                    let options: MemcachedOptions = parse(options)?;
                    let expire = expire_from(options.expire)?;
                    let timeout = options.timeout_ms.map(StdDuration::from_millis);
                    let client = MemcachedClient::connect(&options.servers, timeout)?;
                    let medium = NetworkMedium::new(client);
                    let pool = Pool::<_, Value>::new(medium).with_expire(expire);
                    Ok(Box::new(pool) as DynPool)
                },
                options(json!({
                    "servers": ["127.0.0.1:11211"],
                    "timeout_ms": 1000,
                    "expire": MONTH,
                })),
            ),
        );

        registry
    }

    /// [`Registry::new`] plus a `session` strategy bound to `store`.
    pub fn with_session_store(store: SessionStore) -> Self {
        let mut registry = Self::new();
        registry.strategies.insert(
            "session".to_string(),
            Strategy::new(
                move |options| {
                    let options: SessionOptions = parse(options)?;
                    let expire = expire_from(options.expire)?;
                    let medium = SessionMedium::open(store.clone(), options.session_key)?;
                    let pool = Pool::<_, Value>::new(medium).with_expire(expire);
                    Ok(Box::new(pool) as DynPool)
                },
                options(json!({ "session_key": "cache_pool_session", "expire": HOUR })),
            ),
        );
        registry
    }

    // == Strategy Management ==
    /// Registers `strategy` under `name`.
    ///
    /// # Errors
    /// `InvalidArgument` when the name is already taken.
    pub fn add_strategy(&mut self, name: impl Into<String>, strategy: Strategy) -> Result<()> {
        let name = name.into();
        if self.strategies.contains_key(&name) {
            return Err(CacheError::InvalidArgument(format!(
                "strategy {} is already registered",
                name
            )));
        }
        self.strategies.insert(name, strategy);
        Ok(())
    }

    pub fn has_strategy(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Unregisters `name`. Returns whether it was registered.
    pub fn remove_strategy(&mut self, name: &str) -> bool {
        self.strategies.remove(name).is_some()
    }

    /// Registered names, sorted.
    pub fn strategy_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // == Create ==
    /// Builds a pool for `name` with `overrides` merged over its defaults.
    ///
    /// # Errors
    /// `UnknownStrategy` for an unregistered name; otherwise whatever the
    /// builder reports (bad options, unavailable storage).
    pub fn create(&self, name: &str, overrides: StrategyOptions) -> Result<DynPool> {
        let strategy = self
            .strategies
            .get(name)
            .ok_or_else(|| CacheError::UnknownStrategy(name.to_string()))?;

        let mut merged = strategy.defaults.clone();
        merged.extend(overrides);

        let pool = (strategy.builder)(merged)?;
        info!("Created cache pool with strategy {}", name);
        Ok(pool)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
