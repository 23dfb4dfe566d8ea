use crate::types::ExtractionResult;
use ahash::AHasher;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::hash::{Hash, Hasher};

const DEFAULT_CAPACITY: usize = 256;

/// Hash of raw image bytes, used as part of the cache key.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = AHasher::default();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// In-memory OCR result cache keyed by backend, language and image hash.
///
/// Bounded: once full, the oldest entry is evicted.
pub struct OcrCache {
    capacity: usize,
    entries: Mutex<IndexMap<String, ExtractionResult>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrCacheStats {
    pub entries: usize,
    pub capacity: usize,
}

impl Default for OcrCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl OcrCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn key(backend: &str, language: &str, image: &[u8]) -> String {
        format!("{}:{}:{}", backend, language, compute_hash(image))
    }

    pub fn get(&self, key: &str) -> Option<ExtractionResult> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: String, result: ExtractionResult) {
        let mut entries = self.entries.lock();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(key, result);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> OcrCacheStats {
        OcrCacheStats {
            entries: self.entries.lock().len(),
            capacity: self.capacity,
        }
    }
}
