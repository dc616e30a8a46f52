use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use portico_core::Provider;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default, deserialize_with = "lenient_providers")]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub overrides: BTreeMap<String, Value>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

// One bad entry must not hide the rest of the store.
fn lenient_providers<'de, D>(deserializer: D) -> Result<Vec<Provider>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(provider) => Some(provider),
            Err(err) => {
                warn!(index, "skipping unreadable provider entry: {err}");
                None
            }
        })
        .collect())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read provider store at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse provider store at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub trait ProviderSource: Send + Sync {
    fn load(&self) -> Result<StoreDocument, StoreError>;
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProviderSource for FileSource {
    fn load(&self) -> Result<StoreDocument, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoreDocument::default()),
            Err(source) => {
                return Err(StoreError::ReadFailed {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::ParseFailed {
            path: self.path.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    document: StoreDocument,
}

impl InMemorySource {
    pub fn new(document: StoreDocument) -> Self {
        Self { document }
    }
}

impl ProviderSource for InMemorySource {
    fn load(&self) -> Result<StoreDocument, StoreError> {
        Ok(self.document.clone())
    }
}
