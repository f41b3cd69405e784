//! In-process map medium.

use std::collections::HashMap;

use chrono::Duration;

use crate::error::Result;
use crate::medium::{Medium, StoredEntry};

/// Keeps encoded items in a process-local map.
///
/// No write clock is recorded: item expiration alone decides staleness.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Medium for MemoryMedium {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn read(&mut self, key: &str) -> Result<Option<StoredEntry>> {
        Ok(self
            .entries
            .get(key)
            .map(|bytes| StoredEntry::new(bytes.clone(), None)))
    }

    fn write(&mut self, key: &str, bytes: &[u8], _ttl: Option<Duration>) -> Result<()> {
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn exists(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.contains_key(key))
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_delete() {
        let mut medium = MemoryMedium::new();

        medium.write("k", b"bytes", None).unwrap();
        assert!(medium.exists("k").unwrap());
        assert_eq!(medium.read("k").unwrap().unwrap().bytes, b"bytes");

        medium.delete("k").unwrap();
        assert!(medium.read("k").unwrap().is_none());
        medium.delete("k").unwrap();
    }

    #[test]
    fn test_clear() {
        let mut medium = MemoryMedium::new();
        medium.write("a", b"1", None).unwrap();
        medium.write("b", b"2", None).unwrap();

        medium.clear().unwrap();
        assert!(medium.is_empty());
    }
}
