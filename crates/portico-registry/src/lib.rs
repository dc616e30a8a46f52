pub mod builtin;
pub mod store;

use std::collections::HashSet;

use portico_core::{Category, Provider, is_valid_id};
use serde_json::Value;
use tracing::{debug, warn};

pub use builtin::builtin_providers;
pub use store::{FileSource, InMemorySource, ProviderSource, StoreDocument, StoreError};

pub trait ProviderCatalog: Send + Sync {
    fn get_all(&self) -> Vec<Provider>;

    fn get_by_id(&self, id: &str) -> Option<Provider> {
        self.get_all().into_iter().find(|provider| provider.id == id)
    }

    fn by_category(&self, category: Category) -> Vec<Provider> {
        self.get_all()
            .into_iter()
            .filter(|provider| provider.category == category)
            .collect()
    }
}

impl ProviderCatalog for Vec<Provider> {
    fn get_all(&self) -> Vec<Provider> {
        self.clone()
    }
}

pub struct ProviderRegistry {
    source: Box<dyn ProviderSource>,
    builtins: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn new(source: impl ProviderSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            builtins: builtin_providers(),
        }
    }

    pub fn without_builtins(source: impl ProviderSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            builtins: Vec::new(),
        }
    }
}

impl ProviderCatalog for ProviderRegistry {
    fn get_all(&self) -> Vec<Provider> {
        let document = match self.source.load() {
            Ok(document) => document,
            Err(err) => {
                warn!("provider store unusable, continuing with no providers: {err}");
                return Vec::new();
            }
        };
        merge(&self.builtins, document)
    }
}

/// Source order is preserved; the first occurrence of an id wins.
pub fn merge(builtins: &[Provider], document: StoreDocument) -> Vec<Provider> {
    let disabled: HashSet<&str> = document.disabled.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for provider in builtins.iter().cloned().chain(document.providers) {
        if !is_valid_id(&provider.id) {
            warn!(id = %provider.id, "skipping provider with malformed id");
            continue;
        }
        if disabled.contains(provider.id.as_str()) {
            continue;
        }
        if !seen.insert(provider.id.clone()) {
            debug!(id = %provider.id, "duplicate provider id shadowed by earlier entry");
            continue;
        }
        let provider = match document.overrides.get(&provider.id) {
            Some(patch) => apply_override(provider, patch),
            None => provider,
        };
        merged.push(provider);
    }

    merged
}

pub fn apply_override(provider: Provider, patch: &Value) -> Provider {
    let Some(patch_fields) = patch.as_object() else {
        warn!(id = %provider.id, "override is not an object, ignoring");
        return provider;
    };
    let mut base = match serde_json::to_value(&provider) {
        Ok(Value::Object(map)) => map,
        _ => return provider,
    };
    for (key, value) in patch_fields {
        if key == "id" {
            continue;
        }
        base.insert(key.clone(), value.clone());
    }
    match serde_json::from_value::<Provider>(Value::Object(base)) {
        Ok(patched) => patched,
        Err(err) => {
            warn!(id = %provider.id, "override does not produce a valid provider, ignoring: {err}");
            provider
        }
    }
}
