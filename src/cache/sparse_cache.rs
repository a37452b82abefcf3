use crate::scoring::SparseVector;
use lru::LruCache;
use std::num::NonZeroUsize;

/// LRU cache of document sparse vectors keyed by exact text
///
/// Owned by a single reranker and mutated through `&mut self`, so no locking.
/// Once `capacity` entries are held, inserting evicts the least recently used one.
pub struct SparseVectorCache {
    cache: LruCache<String, SparseVector>,
    hits: u64,
    misses: u64,
}

impl SparseVectorCache {
    /// Create a new cache holding at most `capacity` vectors (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: LruCache::new(cap),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up the vector for `text`, marking it most recently used
    pub fn get(&mut self, text: &str) -> Option<SparseVector> {
        match self.cache.get(text) {
            Some(v) => {
                self.hits += 1;
                Some(v.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store the vector for `text`
    pub fn put(&mut self, text: String, vector: SparseVector) {
        self.cache.put(text, vector);
    }

    /// Check presence without touching recency or hit counters
    pub fn contains(&self, text: &str) -> bool {
        self.cache.contains(text)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
