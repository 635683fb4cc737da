//! TTL cache for query responses.
//!
//! Keys combine the normalized query text with the search mode, so the same
//! question asked in a different mode is a separate entry. Entries expire
//! after a fixed window; when the cache is full the oldest entry is evicted.

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::QueryResponse;

struct CachedEntry {
    response: QueryResponse,
    stored_at: Instant,
}

/// In-process query cache with TTL expiry and hit/miss accounting.
pub struct QueryCache {
    entries: Mutex<HashMap<String, CachedEntry>>,
    ttl: Duration,
    max_size: usize,
    stats: Mutex<CacheCounters>,
}

#[derive(Default)]
struct CacheCounters {
    hits: u64,
    misses: u64,
}

/// Snapshot returned by GET /cache/stats.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_items: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl QueryCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_size,
            stats: Mutex::new(CacheCounters::default()),
        }
    }

    /// Cache key: sha256 of the normalized query plus the search mode.
    fn key(query: &str, mode: &str) -> String {
        let content = format!("{}_{}", query.trim().to_lowercase(), mode);
        let digest = Sha256::digest(content.as_bytes());
        hex::encode(digest)
    }

    /// Look up a response. Expired entries are removed on access.
    pub fn get(&self, query: &str, mode: &str) -> Option<QueryResponse> {
        let key = Self::key(query, mode);
        let mut entries = self.entries.lock();

        let hit = match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                Some(entry.response.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        };
        drop(entries);

        let mut stats = self.stats.lock();
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        hit
    }

    /// Store a response, evicting the oldest entry when at capacity.
    pub fn set(&self, query: &str, mode: &str, response: QueryResponse) {
        if self.max_size == 0 {
            return;
        }
        let key = Self::key(query, mode);
        let mut entries = self.entries.lock();

        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest_key) = oldest {
                entries.remove(&oldest_key);
            }
        }

        entries.insert(
            key,
            CachedEntry {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let total_items = self.entries.lock().len();
        let counters = self.stats.lock();
        let total_requests = counters.hits + counters.misses;
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            counters.hits as f64 / total_requests as f64
        };
        CacheStats {
            total_items,
            max_size: self.max_size,
            hits: counters.hits,
            misses: counters.misses,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QueryRequest, QueryResponse};

    fn sample_response(answer: &str) -> QueryResponse {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "q"}"#).unwrap();
        QueryResponse {
            success: true,
            answer: answer.to_string(),
            ..QueryResponse::failure("", answer, &req)
        }
    }

    #[test]
    fn test_set_and_get() {
        let cache = QueryCache::new(Duration::from_secs(60), 10);
        cache.set("what is ml?", "hybrid", sample_response("an answer"));
        let hit = cache.get("what is ml?", "hybrid").unwrap();
        assert_eq!(hit.answer, "an answer");
    }

    #[test]
    fn test_key_normalizes_case_and_whitespace() {
        let cache = QueryCache::new(Duration::from_secs(60), 10);
        cache.set("  What Is ML?  ", "hybrid", sample_response("a"));
        assert!(cache.get("what is ml?", "hybrid").is_some());
    }

    #[test]
    fn test_mode_is_part_of_the_key() {
        let cache = QueryCache::new(Duration::from_secs(60), 10);
        cache.set("q", "hybrid", sample_response("a"));
        assert!(cache.get("q", "lexical").is_none());
        assert!(cache.get("q", "hybrid").is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = QueryCache::new(Duration::ZERO, 10);
        cache.set("q", "hybrid", sample_response("a"));
        // Zero TTL means the entry is expired on the next lookup
        assert!(cache.get("q", "hybrid").is_none());
    }

    #[test]
    fn test_eviction_at_capacity() {
        let cache = QueryCache::new(Duration::from_secs(60), 2);
        cache.set("q1", "hybrid", sample_response("a1"));
        std::thread::sleep(Duration::from_millis(5));
        cache.set("q2", "hybrid", sample_response("a2"));
        std::thread::sleep(Duration::from_millis(5));
        cache.set("q3", "hybrid", sample_response("a3"));

        // q1 was oldest and should be gone; q2 and q3 remain
        assert_eq!(cache.stats().total_items, 2);
        assert!(cache.get("q2", "hybrid").is_some());
        assert!(cache.get("q3", "hybrid").is_some());
    }

    #[test]
    fn test_hit_rate_accounting() {
        let cache = QueryCache::new(Duration::from_secs(60), 10);
        cache.set("q", "hybrid", sample_response("a"));
        cache.get("q", "hybrid"); // hit
        cache.get("missing", "hybrid"); // miss
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = QueryCache::new(Duration::from_secs(60), 10);
        cache.set("q", "hybrid", sample_response("a"));
        cache.get("q", "hybrid");
        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let cache = QueryCache::new(Duration::from_secs(60), 0);
        cache.set("q", "hybrid", sample_response("a"));
        assert!(cache.get("q", "hybrid").is_none());
    }
}
