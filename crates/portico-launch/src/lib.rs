pub mod env;
pub mod error;
pub mod fallback;
pub mod launcher;
pub mod process;
pub mod update;

pub use env::{
    CONFIG_DIR_VAR, CredentialBypass, EnvironmentBuilder, IsolationContext, KeychainShim,
    NoBypass, PROVIDER_ID_VAR, has_legacy_credential_store, platform_bypass,
};
pub use error::LaunchError;
pub use fallback::FallbackResolver;
pub use launcher::{LaunchOutcome, Launcher, find_provider};
pub use process::{ProcessRunner, SpawnSpec, SystemRunner};
pub use update::{UpdateOutcome, run_update};
