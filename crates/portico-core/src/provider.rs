use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fallback groups providers by category. Tags are open: anything not
/// listed here round-trips through `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Category {
    Anthropic,
    OpenAi,
    Google,
    Local,
    Standalone,
    #[default]
    Custom,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Local => "local",
            Self::Standalone => "standalone",
            Self::Custom => "custom",
            Self::Other(tag) => tag,
        }
    }

    pub fn parse(value: &str) -> Self {
        let tag = value.trim().to_lowercase();
        match tag.as_str() {
            "anthropic" => Self::Anthropic,
            "openai" | "open-ai" => Self::OpenAi,
            "google" => Self::Google,
            "local" => Self::Local,
            "standalone" => Self::Standalone,
            "" | "custom" => Self::Custom,
            _ => Self::Other(tag),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    Api,
    Proxy,
    Gateway,
    Standalone,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Proxy => "proxy",
            Self::Gateway => "gateway",
            Self::Standalone => "standalone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ValidationSpec {
    /// No `env_key` means the provider is always available.
    Env {
        #[serde(rename = "envKey", default, skip_serializing_if = "Option::is_none")]
        env_key: Option<String>,
    },
    Http {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Command {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
    },
}

impl Default for ValidationSpec {
    fn default() -> Self {
        Self::Env { env_key: None }
    }
}

impl ValidationSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Env { .. } => "env",
            Self::Http { .. } => "http",
            Self::Command { .. } => "command",
        }
    }

    pub fn env_key(&self) -> Option<&str> {
        match self {
            Self::Env { env_key } => env_key.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMappings(Vec<(String, String)>);

impl EnvMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        let source = source.into();
        let target = target.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == source) {
            Some(entry) => entry.1 = target,
            None => self.0.push((source, target)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(s, t)| (s.as_str(), t.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>, T: Into<String>> FromIterator<(S, T)> for EnvMappings {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        let mut mappings = Self::new();
        for (source, target) in iter {
            mappings.insert(source, target);
        }
        mappings
    }
}

impl Serialize for EnvMappings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (source, target) in &self.0 {
            map.serialize_entry(source, target)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EnvMappings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = EnvMappings;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of source env var names to target env var names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut mappings = EnvMappings::new();
                while let Some((source, target)) = access.next_entry::<String, String>()? {
                    mappings.insert(source, target);
                }
                Ok(mappings)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(rename = "type", default)]
    pub kind: ProviderType,
    #[serde(default)]
    pub validation: ValidationSpec,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub env_mappings: EnvMappings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_arg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_permissions_arg: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_env_var: Option<String>,
}

impl Provider {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: Category::default(),
            kind: ProviderType::default(),
            validation: ValidationSpec::default(),
            env_vars: BTreeMap::new(),
            env_mappings: EnvMappings::new(),
            config_dir: None,
            command: None,
            default_args: Vec::new(),
            update_cmd: None,
            continue_arg: None,
            skip_permissions_arg: None,
            models: Vec::new(),
            model_env_var: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_kind(mut self, kind: ProviderType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_validation(mut self, validation: ValidationSpec) -> Self {
        self.validation = validation;
        self
    }

    pub fn is_standalone(&self) -> bool {
        matches!(self.kind, ProviderType::Standalone)
    }

    pub fn effective_config_dir(&self) -> String {
        self.config_dir
            .clone()
            .unwrap_or_else(|| format!("~/.portico/providers/{}", self.id))
    }
}

pub fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
