//! In-memory response cache keyed by request fingerprint.
//!
//! A lookup is an exact match on the fingerprint of (conversation id,
//! normalized message text). Hits and misses are counted for the status
//! endpoint. When a maximum size is configured the oldest entry is evicted
//! first.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use persona_types::status::CacheStats;

/// Separator between the conversation id and the message text when hashing.
const FINGERPRINT_SEPARATOR: u8 = 0x1F;

/// Lower-case, trim, and collapse whitespace runs to a single space.
pub fn normalize_message(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic cache key for a message within a conversation.
pub fn fingerprint(conversation_id: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(conversation_id.as_bytes());
    hasher.update([FINGERPRINT_SEPARATOR]);
    hasher.update(normalize_message(message).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[derive(Clone)]
struct CacheEntry {
    conversation_id: String,
    response: String,
    seq: u64,
}

/// Thread-safe response cache.
///
/// Concurrent misses on the same fingerprint may both reach the LLM; the
/// later insert simply overwrites the earlier one.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: Option<usize>,
    next_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a cache. `None` is unbounded; `Some(0)` stores nothing.
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            next_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a fingerprint, counting the hit or miss.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.response.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a response under a fingerprint.
    pub fn insert(&self, key: String, conversation_id: &str, response: String) {
        if self.max_entries == Some(0) {
            return;
        }

        if !self.entries.contains_key(&key) {
            self.enforce_max_entries();
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            CacheEntry {
                conversation_id: conversation_id.to_string(),
                response,
                seq,
            },
        );
    }

    /// Drop every entry that belongs to a conversation.
    pub fn purge_conversation(&self, conversation_id: &str) {
        self.entries
            .retain(|_, entry| entry.conversation_id != conversation_id);
    }

    /// Remove all entries. Counters are kept.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate_percent = if total == 0 {
            0.0
        } else {
            ((hits as f64 / total as f64) * 10_000.0).round() / 100.0
        };

        CacheStats {
            hits,
            misses,
            hit_rate_percent,
            entries: self.entries.len(),
            max_entries: self.max_entries,
        }
    }

    /// Evict oldest entries until there is room for one more.
    fn enforce_max_entries(&self) {
        let Some(max) = self.max_entries else {
            return;
        };

        while self.entries.len() >= max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().seq)
                .map(|entry| entry.key().clone());

            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_message() {
        assert_eq!(normalize_message("  Hello   THERE\n friend "), "hello there friend");
        assert_eq!(normalize_message(""), "");
    }

    #[test]
    fn test_fingerprint_ignores_case_and_spacing() {
        assert_eq!(
            fingerprint("conv-1", "What is Rust?"),
            fingerprint("conv-1", "  what   is rust?  ")
        );
    }

    #[test]
    fn test_fingerprint_scoped_to_conversation() {
        assert_ne!(fingerprint("conv-1", "hello"), fingerprint("conv-2", "hello"));
        // The separator keeps "ab"+"c" distinct from "a"+"bc".
        assert_ne!(fingerprint("ab", "c"), fingerprint("a", "bc"));
    }

    #[test]
    fn test_hit_returns_identical_text_without_counting_miss() {
        let cache = ResponseCache::new(None);
        let key = fingerprint("conv-1", "hi");
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), "conv-1", "Hello! ✨ How can I help?".to_string());

        let stats_before = cache.stats();
        let hit = cache.get(&key).unwrap();
        assert_eq!(hit, "Hello! ✨ How can I help?");

        let stats_after = cache.stats();
        assert_eq!(stats_after.misses, stats_before.misses);
        assert_eq!(stats_after.hits, stats_before.hits + 1);
    }

    #[test]
    fn test_oldest_entry_evicted_first() {
        let cache = ResponseCache::new(Some(2));
        cache.insert("a".to_string(), "c", "1".to_string());
        cache.insert("b".to_string(), "c", "2".to_string());
        cache.insert("c".to_string(), "c", "3".to_string());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b").as_deref(), Some("2"));
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = ResponseCache::new(Some(2));
        cache.insert("a".to_string(), "c", "1".to_string());
        cache.insert("b".to_string(), "c", "2".to_string());
        cache.insert("b".to_string(), "c", "2b".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert_eq!(cache.get("b").as_deref(), Some("2b"));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = ResponseCache::new(Some(0));
        cache.insert("a".to_string(), "c", "1".to_string());
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_purge_conversation() {
        let cache = ResponseCache::new(None);
        cache.insert(fingerprint("keep", "x"), "keep", "1".to_string());
        cache.insert(fingerprint("drop", "x"), "drop", "2".to_string());
        cache.insert(fingerprint("drop", "y"), "drop", "3".to_string());

        cache.purge_conversation("drop");
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fingerprint("keep", "x")).is_some());
    }

    #[test]
    fn test_hit_rate_rounding() {
        let cache = ResponseCache::new(None);
        cache.insert("k".to_string(), "c", "v".to_string());
        cache.get("k");
        cache.get("missing");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hit_rate_percent, 33.33);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = ResponseCache::new(None);
        cache.insert("k".to_string(), "c", "v".to_string());
        cache.get("k");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
    }
}
