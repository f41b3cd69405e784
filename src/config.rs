//! Configuration Module
//!
//! Loads server configuration from environment variables and turns it into
//! registry options for the selected strategy.

use std::env;

use serde_json::{json, Value};

use crate::registry::{StrategyOptions, EXPIRE_KEY};

/// Server configuration parameters.
///
/// All values can be configured via environment variables. Unset strategy
/// options fall back to the registry's defaults for that strategy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry strategy used to build the pool
    pub strategy: String,
    /// Default lifetime in seconds; 0 disables expiration
    pub default_expire: Option<i64>,
    /// Cache directory for the file strategy
    pub cache_dir: Option<String>,
    /// Namespace for the session strategy
    pub session_key: Option<String>,
    /// Servers for the memcached strategy
    pub memcached_servers: Option<Vec<String>>,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_STRATEGY` - Registry strategy name (default: memory)
    /// - `DEFAULT_EXPIRE` - Default lifetime in seconds (default: strategy default)
    /// - `CACHE_DIR` - Directory for the file strategy
    /// - `SESSION_KEY` - Namespace for the session strategy
    /// - `MEMCACHED_SERVERS` - Comma-separated `host:port` list
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            strategy: env::var("CACHE_STRATEGY").unwrap_or(defaults.strategy),
            default_expire: env::var("DEFAULT_EXPIRE")
                .ok()
                .and_then(|v| v.parse().ok()),
            cache_dir: env::var("CACHE_DIR").ok().filter(|v| !v.is_empty()),
            session_key: env::var("SESSION_KEY").ok().filter(|v| !v.is_empty()),
            memcached_servers: env::var("MEMCACHED_SERVERS").ok().map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    /// Options overriding the strategy defaults. Only set values are included.
    pub fn strategy_options(&self) -> StrategyOptions {
        let mut options = StrategyOptions::new();
        if let Some(expire) = self.default_expire {
            let expire = if expire > 0 { json!(expire) } else { Value::Null };
            options.insert(EXPIRE_KEY.to_string(), expire);
        }
        if let Some(dir) = &self.cache_dir {
            options.insert("cache_dir".to_string(), json!(dir));
        }
        if let Some(key) = &self.session_key {
            options.insert("session_key".to_string(), json!(key));
        }
        if let Some(servers) = &self.memcached_servers {
            options.insert("servers".to_string(), json!(servers));
        }
        options
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: "memory".to_string(),
            default_expire: None,
            cache_dir: None,
            session_key: None,
            memcached_servers: None,
            server_port: 3000,
        }
    }
}
