pub mod env;
pub mod launch;
pub mod provider;
pub mod validation;

pub use env::{EnvLookup, ProcessEnv};
pub use launch::LaunchAttempt;
pub use provider::{Category, EnvMappings, Provider, ProviderType, ValidationSpec, is_valid_id};
pub use validation::{HealthCheckResult, ValidationResult};
