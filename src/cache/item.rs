//! Cache Item Module
//!
//! A named value carrier with an optional expiration instant.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::cache::validate_key;
use crate::error::{CacheError, Result};

// == Expiration ==
/// Expiration state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Nothing chosen yet; the pool's default lifetime is applied on save
    Default,
    /// Explicitly never expires
    Never,
    /// Expires at the given instant
    At(DateTime<Utc>),
}

// == Cache Item ==
/// A single named value with expiration metadata.
///
/// An item is a hit when it carries a value and its expiration instant, if
/// any, is strictly in the future. A miss never exposes a value: `get`
/// returns `None` for placeholders and for expired items alike.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem<V> {
    key: String,
    value: Option<V>,
    expiration: Expiration,
}

/// Persisted form shared by every medium.
#[derive(Serialize)]
struct EncodedRef<'a, V> {
    value: &'a V,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct Encoded<V> {
    value: V,
    expires_at: Option<DateTime<Utc>>,
}

impl<V> CacheItem<V> {
    // == Constructors ==
    /// Creates an empty item for `key`.
    ///
    /// # Errors
    /// `InvalidKey` when the key fails validation.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self::placeholder(key))
    }

    /// Creates an item for `key` already carrying `value`.
    pub fn with_value(key: impl Into<String>, value: V) -> Result<Self> {
        let mut item = Self::new(key)?;
        item.value = Some(value);
        Ok(item)
    }

    /// Miss placeholder for an already validated key.
    pub(crate) fn placeholder(key: String) -> Self {
        Self {
            key,
            value: None,
            expiration: Expiration::Default,
        }
    }

    // == Accessors ==
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the value if the item is a hit.
    pub fn get(&self) -> Option<&V> {
        if self.is_hit() {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Consumes the item, returning the value if it is a hit.
    pub fn into_value(self) -> Option<V> {
        if self.is_hit() {
            self.value
        } else {
            None
        }
    }

    /// True when a value has been assigned, regardless of expiration.
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn expiration(&self) -> Expiration {
        self.expiration
    }

    /// The absolute expiration instant, if one is set.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        match self.expiration {
            Expiration::At(at) => Some(at),
            Expiration::Default | Expiration::Never => None,
        }
    }

    // == Mutators ==
    /// Assigns the value. Expiration is left untouched.
    pub fn set(&mut self, value: V) -> &mut Self {
        self.value = Some(value);
        self
    }

    /// Expires `ttl` from now, or never when `ttl` is `None`.
    ///
    /// A lifetime too large to represent is treated as never.
    pub fn expires_after(&mut self, ttl: Option<Duration>) -> &mut Self {
        self.expiration = match ttl.and_then(|ttl| Utc::now().checked_add_signed(ttl)) {
            Some(at) => Expiration::At(at),
            None => Expiration::Never,
        };
        self
    }

    /// Expires at `at`, or never when `at` is `None`.
    pub fn expires_at(&mut self, at: Option<DateTime<Utc>>) -> &mut Self {
        self.expiration = match at {
            Some(at) => Expiration::At(at),
            None => Expiration::Never,
        };
        self
    }

    // == Hit State ==
    pub fn is_hit(&self) -> bool {
        self.is_hit_at(Utc::now())
    }

    /// Hit state evaluated against an explicit clock reading.
    pub fn is_hit_at(&self, now: DateTime<Utc>) -> bool {
        if self.value.is_none() {
            return false;
        }
        match self.expiration {
            Expiration::At(at) => now < at,
            Expiration::Default | Expiration::Never => true,
        }
    }

    // == Pool Helpers ==
    /// Resolves `Expiration::Default` against the pool's default lifetime.
    pub(crate) fn apply_default_expiration(&mut self, default: Option<Duration>) {
        if self.expiration == Expiration::Default {
            self.expires_after(default);
        }
    }

    /// Remaining lifetime for media that enforce TTLs themselves.
    pub(crate) fn ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expiry().map(|at| at - now)
    }
}

impl<V: Serialize> CacheItem<V> {
    /// Encodes value and expiration for a medium.
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let value = self
            .value
            .as_ref()
            .ok_or_else(|| CacheError::Serialization(format!("item {} has no value", self.key)))?;
        let encoded = EncodedRef {
            value,
            expires_at: self.expiry(),
        };
        Ok(serde_json::to_vec(&encoded)?)
    }
}

impl<V: DeserializeOwned> CacheItem<V> {
    /// Rebuilds an item from bytes written by [`CacheItem::encode`].
    pub(crate) fn decode(key: &str, bytes: &[u8]) -> Result<Self> {
        let encoded: Encoded<V> = serde_json::from_slice(bytes)?;
        let mut item = Self::placeholder(key.to_string());
        item.value = Some(encoded.value);
        item.expires_at(encoded.expires_at);
        Ok(item)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_miss() {
        let item: CacheItem<String> = CacheItem::new("fresh").unwrap();

        assert_eq!(item.key(), "fresh");
        assert!(!item.is_hit());
        assert!(item.get().is_none());
        assert_eq!(item.expiration(), Expiration::Default);
    }

    #[test]
    fn test_new_rejects_invalid_key() {
        let result = CacheItem::<String>::new("bad key");
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn test_set_makes_hit_without_touching_expiration() {
        let mut item = CacheItem::new("k").unwrap();
        item.expires_after(Some(Duration::seconds(30)));
        let before = item.expiry();

        item.set(7u32);

        assert!(item.is_hit());
        assert_eq!(item.get(), Some(&7));
        assert_eq!(item.expiry(), before);
    }

    #[test]
    fn test_expiration_boundary() {
        let mut item = CacheItem::with_value("k", "v").unwrap();
        let now = Utc::now();
        let ttl = Duration::seconds(10);
        item.expires_at(Some(now + ttl));

        let epsilon = Duration::milliseconds(1);
        assert!(item.is_hit_at(now + ttl - epsilon));
        assert!(!item.is_hit_at(now + ttl));
        assert!(!item.is_hit_at(now + ttl + epsilon));
    }

    #[test]
    fn test_expired_item_hides_value() {
        let mut item = CacheItem::with_value("k", 1u8).unwrap();
        item.expires_at(Some(Utc::now() - Duration::seconds(1)));

        assert!(!item.is_hit());
        assert!(item.has_value());
        assert!(item.get().is_none());
        assert!(item.into_value().is_none());
    }

    #[test]
    fn test_expires_after_none_clears_expiration() {
        let mut item = CacheItem::with_value("k", 1u8).unwrap();
        item.expires_after(Some(Duration::seconds(5)));
        item.expires_after(None);

        assert_eq!(item.expiration(), Expiration::Never);
        assert!(item.is_hit_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_expires_at_none_clears_expiration() {
        let mut item = CacheItem::with_value("k", 1u8).unwrap();
        item.expires_at(Some(Utc::now()));
        item.expires_at(None);

        assert_eq!(item.expiration(), Expiration::Never);
        assert!(item.expiry().is_none());
    }

    #[test]
    fn test_apply_default_only_when_unset() {
        let mut defaulted = CacheItem::with_value("a", 1u8).unwrap();
        defaulted.apply_default_expiration(Some(Duration::seconds(60)));
        assert!(defaulted.expiry().is_some());

        let mut never = CacheItem::with_value("b", 1u8).unwrap();
        never.expires_after(None);
        never.apply_default_expiration(Some(Duration::seconds(60)));
        assert_eq!(never.expiration(), Expiration::Never);

        let mut no_default = CacheItem::with_value("c", 1u8).unwrap();
        no_default.apply_default_expiration(None);
        assert_eq!(no_default.expiration(), Expiration::Never);
    }

    #[test]
    fn test_encoding_keeps_expiry() {
        let mut item = CacheItem::with_value("k", vec![1, 2, 3]).unwrap();
        item.expires_after(Some(Duration::hours(1)));

        let bytes = item.encode().unwrap();
        let decoded: CacheItem<Vec<i32>> = CacheItem::decode("k", &bytes).unwrap();

        assert_eq!(decoded.get(), Some(&vec![1, 2, 3]));
        assert_eq!(decoded.expiry(), item.expiry());
    }

    #[test]
    fn test_encode_placeholder_fails() {
        let item: CacheItem<String> = CacheItem::new("empty").unwrap();
        assert!(matches!(item.encode(), Err(CacheError::Serialization(_))));
    }
}
