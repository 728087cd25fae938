use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use sha2::{Digest, Sha256};

/// Key of a cache entry: SHA-256 of the normalized content text.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Rewrite `\r\n` and lone `\r` as `\n`.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Content-addressed store of compiled artifacts.
///
/// Entries live as long as the cache; there is no eviction.
pub struct ContentCache<T> {
    entries: HashMap<CacheKey, Rc<T>>,
}

impl<T> ContentCache<T> {
    pub fn new() -> Self {
        ContentCache {
            entries: HashMap::new(),
        }
    }

    /// Hash `text` after line-ending normalization, so the same logical
    /// content always maps to the same key.
    pub fn key_for(text: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(normalize_newlines(text).as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        CacheKey(bytes)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Rc<T>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, item: T) -> Rc<T> {
        let item = Rc::new(item);
        self.entries.insert(key, Rc::clone(&item));
        item
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ContentCache<T> {
    fn default() -> Self {
        ContentCache::new()
    }
}
