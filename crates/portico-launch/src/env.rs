use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use portico_common::paths::expand_home_with;
use portico_core::{EnvLookup, Provider};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::LaunchError;

pub const PROVIDER_ID_VAR: &str = "PORTICO_PROVIDER";
pub const CONFIG_DIR_VAR: &str = "CLAUDE_CONFIG_DIR";

const SHIM_NAME: &str = "security";
const SHIM_SCRIPT: &str = "#!/bin/sh\n\
echo \"security: SecKeychainSearchCopyNext: access denied by portico isolation\" >&2\n\
exit 51\n";

/// True on platforms whose OS credential store the shared CLI reaches for
/// before falling back to file-based credentials.
pub fn has_legacy_credential_store() -> bool {
    cfg!(target_os = "macos")
}

pub trait CredentialBypass: Send + Sync {
    fn install(&self) -> std::io::Result<Option<TempDir>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeychainShim;

impl CredentialBypass for KeychainShim {
    fn install(&self) -> std::io::Result<Option<TempDir>> {
        let dir = tempfile::Builder::new().prefix("portico-shim-").tempdir()?;
        let script = dir.path().join(SHIM_NAME);
        fs::write(&script, SHIM_SCRIPT)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        }
        Ok(Some(dir))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoBypass;

impl CredentialBypass for NoBypass {
    fn install(&self) -> std::io::Result<Option<TempDir>> {
        Ok(None)
    }
}

pub fn platform_bypass() -> Box<dyn CredentialBypass> {
    if has_legacy_credential_store() {
        Box::new(KeychainShim)
    } else {
        Box::new(NoBypass)
    }
}

#[derive(Debug)]
pub struct IsolationContext {
    pub provider_id: String,
    pub config_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    shim_dir: Option<TempDir>,
}

impl IsolationContext {
    pub fn shim_dir(&self) -> Option<&Path> {
        self.shim_dir.as_ref().map(TempDir::path)
    }

    pub fn cleanup(self) {
        if let Some(dir) = self.shim_dir {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                warn!(path = %path.display(), "failed to remove shim dir: {err}");
            }
        }
    }
}

pub struct EnvironmentBuilder {
    caller_env: Arc<dyn EnvLookup>,
    bypass: Box<dyn CredentialBypass>,
    home: PathBuf,
}

impl EnvironmentBuilder {
    pub fn new(caller_env: Arc<dyn EnvLookup>, bypass: Box<dyn CredentialBypass>) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            caller_env,
            bypass,
            home,
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn build(
        &self,
        provider: &Provider,
        model: Option<&str>,
    ) -> Result<IsolationContext, LaunchError> {
        let config_dir = expand_home_with(&provider.effective_config_dir(), &self.home);
        fs::create_dir_all(&config_dir).map_err(|source| LaunchError::ConfigDir {
            path: config_dir.clone(),
            source,
        })?;

        let mut env = BTreeMap::new();
        env.insert(PROVIDER_ID_VAR.to_string(), provider.id.clone());
        env.insert(
            CONFIG_DIR_VAR.to_string(),
            config_dir.to_string_lossy().into_owned(),
        );
        for (key, value) in &provider.env_vars {
            env.insert(key.clone(), value.clone());
        }
        for (source, target) in provider.env_mappings.iter() {
            match self.caller_env.var(source) {
                Some(value) => {
                    debug!(provider = %provider.id, source, target, "mapping env var");
                    env.insert(target.to_string(), value);
                }
                None => debug!(provider = %provider.id, source, "mapping source absent"),
            }
        }
        if let Some(model) = model {
            let (key, value) = select_model(provider, model)?;
            env.insert(key, value);
        }

        let shim_dir = self
            .bypass
            .install()
            .map_err(LaunchError::CredentialBypass)?;
        if let Some(dir) = &shim_dir {
            let path = prepend_path(dir.path(), self.caller_env.var("PATH").as_deref())?;
            env.insert("PATH".to_string(), path);
        }

        Ok(IsolationContext {
            provider_id: provider.id.clone(),
            config_dir,
            env,
            shim_dir,
        })
    }
}

pub(crate) fn select_model(provider: &Provider, model: &str) -> Result<(String, String), LaunchError> {
    let Some(var) = provider.model_env_var.clone() else {
        return Err(LaunchError::ModelSelectionUnsupported(provider.id.clone()));
    };
    if !provider.models.is_empty() && !provider.models.iter().any(|m| m == model) {
        return Err(LaunchError::UnknownModel {
            provider: provider.id.clone(),
            model: model.to_string(),
            available: provider.models.join(", "),
        });
    }
    Ok((var, model.to_string()))
}

fn prepend_path(dir: &Path, existing: Option<&str>) -> Result<String, LaunchError> {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(existing) = existing {
        entries.extend(env::split_paths(existing));
    }
    let joined = env::join_paths(entries)?;
    Ok(joined.to_string_lossy().into_owned())
}
