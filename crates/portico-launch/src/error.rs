use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("unknown provider: {id} (known: {known})")]
    UnknownProvider { id: String, known: String },
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("failed while waiting for {program}: {source}")]
    Wait { program: String, source: io::Error },
    #[error("provider {0} has no command configured")]
    MissingCommand(String),
    #[error("provider {provider} has an unparseable command: {command}")]
    InvalidCommand { provider: String, command: String },
    #[error("failed to prepare config dir {path}: {source}")]
    ConfigDir { path: PathBuf, source: io::Error },
    #[error("failed to install credential store bypass: {0}")]
    CredentialBypass(#[source] io::Error),
    #[error("failed to compose PATH: {0}")]
    PathJoin(#[from] std::env::JoinPathsError),
    #[error("provider {0} does not support model selection")]
    ModelSelectionUnsupported(String),
    #[error("model {model} is not offered by {provider} (available: {available})")]
    UnknownModel {
        provider: String,
        model: String,
        available: String,
    },
}
