use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use portico_core::ValidationResult;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + offset
    }
}

#[derive(Debug, Clone)]
struct CachedResult {
    result: ValidationResult,
    created_at: Instant,
}

pub struct ValidationCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CachedResult>>,
}

impl ValidationCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `id`, if any. Stale entries are evicted on read.
    pub fn get(&self, id: &str) -> Option<ValidationResult> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(id) {
            Some(entry) if now.saturating_duration_since(entry.created_at) < self.ttl => {
                Some(entry.result.clone())
            }
            Some(_) => {
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, id: &str, result: ValidationResult) {
        let created_at = self.clock.now();
        self.lock()
            .insert(id.to_string(), CachedResult { result, created_at });
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedResult>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_expires_exactly_at_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = ValidationCache::new(Duration::from_secs(300), clock.clone());
        cache.insert("zai", ValidationResult::valid("ok"));

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get("zai"), Some(ValidationResult::valid("ok")));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("zai"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = ValidationCache::default();
        cache.insert("a", ValidationResult::valid("ok"));
        cache.insert("b", ValidationResult::invalid("nope"));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn reinsert_refreshes_timestamp() {
        let clock = Arc::new(ManualClock::new());
        let cache = ValidationCache::new(Duration::from_secs(10), clock.clone());
        cache.insert("a", ValidationResult::invalid("first"));
        clock.advance(Duration::from_secs(8));
        cache.insert("a", ValidationResult::valid("second"));
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("a"), Some(ValidationResult::valid("second")));
    }
}
