//! Sliding-window hit storage for the rate limiter.
//!
//! Each client key maps to the arrival times (milliseconds since the Unix
//! epoch) of its requests, oldest first. Expired entries are pruned lazily
//! when that key is next incremented; the optional sweep only drops keys
//! that have gone fully dormant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

/// Result of counting one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementResponse {
    /// Hits for the key inside the current window, including this one.
    pub total_hits: usize,
    /// Wall-clock instant (ms since epoch) at which this hit leaves the window.
    pub reset_time_ms: u64,
}

impl IncrementResponse {
    pub fn reset_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.reset_time_ms)
    }
}

/// Storage backend for the `/api` rate limiter.
///
/// Implementations must perform each `increment` as one indivisible
/// read-prune-append step for its key.
pub trait RateLimitStore: Send + Sync {
    /// Set the window length used by every later call.
    fn init(&self, window: Duration);

    /// Count a hit for `key` and return the count inside the window.
    fn increment(&self, key: &str) -> IncrementResponse;

    /// Undo the most recent hit for `key`, if any.
    fn decrement(&self, key: &str);

    /// Forget everything about `key`.
    fn reset_key(&self, key: &str);

    /// Forget every key.
    fn reset_all(&self);
}

/// In-process sliding-window store. Counts are not shared between instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    window_ms: AtomicU64,
    hits: DashMap<String, Vec<u64>>,
}

impl MemoryStore {
    /// Create a store already initialized with `window`.
    pub fn new(window: Duration) -> Self {
        let store = Self::default();
        store.init(window);
        store
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.load(Ordering::Acquire))
    }

    /// Count a hit for `key` arriving at `now_ms`.
    pub fn increment_at(&self, key: &str, now_ms: u64) -> IncrementResponse {
        let window_ms = self.window_ms.load(Ordering::Acquire);

        // The shard lock is held for the whole prune-append sequence.
        let mut timestamps = self.hits.entry(key.to_string()).or_default();
        timestamps.retain(|&ts| ts.saturating_add(window_ms) > now_ms);
        timestamps.push(now_ms);

        IncrementResponse {
            total_hits: timestamps.len(),
            reset_time_ms: now_ms.saturating_add(window_ms),
        }
    }

    /// Drop keys whose newest hit is outside the window at `now_ms`.
    /// Returns the number of keys removed.
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let window_ms = self.window_ms.load(Ordering::Acquire);
        let before = self.hits.len();
        self.hits.retain(|_, timestamps| {
            timestamps
                .last()
                .is_some_and(|&newest| newest.saturating_add(window_ms) > now_ms)
        });
        before.saturating_sub(self.hits.len())
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(now_millis())
    }

    /// Number of keys currently tracked.
    pub fn key_count(&self) -> usize {
        self.hits.len()
    }

    /// Hits currently stored for `key`, without pruning.
    pub fn stored_hits(&self, key: &str) -> usize {
        self.hits.get(key).map_or(0, |timestamps| timestamps.len())
    }
}

impl RateLimitStore for MemoryStore {
    fn init(&self, window: Duration) {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        let previous = self.window_ms.swap(window_ms, Ordering::AcqRel);

        if previous != 0 && previous != window_ms && !self.hits.is_empty() {
            tracing::warn!(
                previous_ms = previous,
                window_ms,
                keys = self.hits.len(),
                "Rate limit window changed, discarding stored hits"
            );
            self.hits.clear();
        }
    }

    fn increment(&self, key: &str) -> IncrementResponse {
        self.increment_at(key, now_millis())
    }

    fn decrement(&self, key: &str) {
        if let Some(mut timestamps) = self.hits.get_mut(key) {
            timestamps.pop();
        }
    }

    fn reset_key(&self, key: &str) {
        self.hits.remove(key);
    }

    fn reset_all(&self) {
        self.hits.clear();
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_MS: u64 = 15 * 60 * 1000;
    const T0: u64 = 1_700_000_000_000;

    fn store() -> MemoryStore {
        MemoryStore::new(Duration::from_millis(WINDOW_MS))
    }

    #[test]
    fn test_hits_accumulate_inside_window() {
        let store = store();
        for n in 1..=5 {
            let res = store.increment_at("1.2.3.4", T0 + n * 1000);
            assert_eq!(res.total_hits, n as usize);
            assert_eq!(res.reset_time_ms, T0 + n * 1000 + WINDOW_MS);
        }
    }

    #[test]
    fn test_window_slides() {
        let store = store();
        for i in 0..10 {
            store.increment_at("k", T0 + i);
        }
        // One millisecond after the newest hit expired, everything is gone.
        let res = store.increment_at("k", T0 + 9 + WINDOW_MS + 1);
        assert_eq!(res.total_hits, 1);
        assert_eq!(store.stored_hits("k"), 1);
    }

    #[test]
    fn test_partial_expiry_keeps_newer_hits() {
        let store = store();
        store.increment_at("k", T0);
        store.increment_at("k", T0 + 60_000);
        let res = store.increment_at("k", T0 + WINDOW_MS + 1);
        assert_eq!(res.total_hits, 2);
    }

    #[test]
    fn test_boundary_hit_is_excluded() {
        let store = store();
        store.increment_at("k", T0);
        // Exactly windowMs later the first hit is no longer strictly newer.
        let res = store.increment_at("k", T0 + WINDOW_MS);
        assert_eq!(res.total_hits, 1);

        let store = self::store();
        store.increment_at("k", T0);
        let res = store.increment_at("k", T0 + WINDOW_MS - 1);
        assert_eq!(res.total_hits, 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = store();
        for i in 0..3 {
            store.increment_at("a", T0 + i);
        }
        assert_eq!(store.increment_at("b", T0 + 5).total_hits, 1);
        assert_eq!(store.increment_at("a", T0 + 6).total_hits, 4);
    }

    #[test]
    fn test_reset_key() {
        let store = store();
        for i in 0..50 {
            store.increment_at("k", T0 + i);
        }
        store.increment_at("other", T0);
        store.reset_key("k");
        assert_eq!(store.increment_at("k", T0 + 100).total_hits, 1);
        assert_eq!(store.stored_hits("other"), 1);
    }

    #[test]
    fn test_reset_all() {
        let store = store();
        store.increment_at("a", T0);
        store.increment_at("b", T0);
        store.reset_all();
        assert_eq!(store.key_count(), 0);
        assert_eq!(store.increment_at("a", T0 + 1).total_hits, 1);
    }

    #[test]
    fn test_decrement_removes_latest_hit() {
        let store = store();
        store.increment_at("k", T0);
        store.increment_at("k", T0 + 1);
        store.decrement("k");
        assert_eq!(store.stored_hits("k"), 1);
        assert_eq!(store.increment_at("k", T0 + 2).total_hits, 2);
    }

    #[test]
    fn test_decrement_missing_or_empty_is_noop() {
        let store = store();
        store.decrement("absent");
        assert_eq!(store.key_count(), 0);

        store.increment_at("k", T0);
        store.decrement("k");
        store.decrement("k");
        assert_eq!(store.stored_hits("k"), 0);
    }

    #[test]
    fn test_sweep_drops_only_dormant_keys() {
        let store = store();
        store.increment_at("old", T0);
        store.increment_at("fresh", T0 + WINDOW_MS - 10);
        store.increment_at("empty", T0 + WINDOW_MS - 10);
        store.decrement("empty");

        let removed = store.sweep_at(T0 + WINDOW_MS + 1);
        assert_eq!(removed, 2);
        assert_eq!(store.key_count(), 1);
        assert_eq!(store.stored_hits("fresh"), 1);
    }

    #[test]
    fn test_reinit_with_new_window_discards_hits() {
        let store = store();
        store.increment_at("k", T0);
        store.init(Duration::from_millis(WINDOW_MS));
        assert_eq!(store.stored_hits("k"), 1, "same window keeps state");

        store.init(Duration::from_secs(60));
        assert_eq!(store.key_count(), 0);
        assert_eq!(store.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_reset_time_is_now_plus_window() {
        let store = store();
        let before = now_millis();
        let res = store.increment("k");
        assert!(res.reset_time_ms >= before + WINDOW_MS);
        assert!(res.reset_time() > SystemTime::now());
    }
}
