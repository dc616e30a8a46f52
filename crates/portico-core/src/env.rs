use std::collections::{BTreeMap, HashMap};

pub trait EnvLookup: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;

    fn is_set(&self, key: &str) -> bool {
        self.var(key).is_some_and(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvLookup for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
