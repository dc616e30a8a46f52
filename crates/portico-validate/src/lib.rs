pub mod cache;
pub mod checks;
pub mod health;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use portico_core::{EnvLookup, Provider, ValidationResult};
use tracing::{debug, error};

pub use cache::{Clock, DEFAULT_TTL, ManualClock, SystemClock, ValidationCache};
pub use checks::{HTTP_CHECK_TIMEOUT, ProviderCheck, StrategyCheck};
pub use health::{HEALTH_CHECK_TIMEOUT, HealthChecker};

pub struct Validator {
    check: Arc<dyn ProviderCheck>,
    cache: ValidationCache,
}

impl Validator {
    pub fn new(check: Arc<dyn ProviderCheck>, cache: ValidationCache) -> Self {
        Self { check, cache }
    }

    pub fn with_strategies(
        env: Arc<dyn EnvLookup>,
        http_timeout: Duration,
        ttl: Duration,
    ) -> reqwest::Result<Self> {
        let check = StrategyCheck::new(env, http_timeout)?;
        Ok(Self::new(Arc::new(check), ValidationCache::with_ttl(ttl)))
    }

    /// `skip_cache` bypasses the read only; the fresh result is still stored.
    pub fn validate(&self, provider: &Provider, skip_cache: bool) -> ValidationResult {
        if !skip_cache {
            if let Some(hit) = self.cache.get(&provider.id) {
                debug!(provider = %provider.id, valid = hit.valid, "validation cache hit");
                return hit;
            }
        }
        let result = self.check.check(provider);
        debug!(provider = %provider.id, valid = result.valid, message = %result.message, "validated");
        self.cache.insert(&provider.id, result.clone());
        result
    }

    pub fn validate_all(&self, providers: &[Provider]) -> HashMap<String, ValidationResult> {
        thread::scope(|scope| {
            let handles: Vec<_> = providers
                .iter()
                .map(|provider| {
                    let handle = scope.spawn(move || self.validate(provider, false));
                    (provider, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(provider, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        error!(provider = %provider.id, "validation worker panicked");
                        ValidationResult::invalid("validation check panicked")
                    });
                    (provider.id.clone(), result)
                })
                .collect()
        })
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &ValidationCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl ProviderCheck for Counting {
        fn check(&self, provider: &Provider) -> ValidationResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            ValidationResult::valid(format!("{} check #{n}", provider.id))
        }
    }

    #[test]
    fn skip_cache_still_writes_back() {
        let check = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let validator = Validator::new(check.clone(), ValidationCache::default());
        let provider = Provider::new("p", "P");

        let fresh = validator.validate(&provider, true);
        let cached = validator.validate(&provider, false);
        assert_eq!(fresh, cached);
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);

        let forced = validator.validate(&provider, true);
        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
        assert_eq!(validator.validate(&provider, false), forced);
    }

    #[test]
    fn validate_all_of_nothing_is_empty() {
        let validator = Validator::new(
            Arc::new(Counting {
                calls: AtomicUsize::new(0),
            }),
            ValidationCache::default(),
        );
        assert!(validator.validate_all(&[]).is_empty());
    }
}
