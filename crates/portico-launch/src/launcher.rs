use std::sync::Arc;

use portico_core::{LaunchAttempt, Provider};
use portico_registry::ProviderCatalog;
use portico_validate::Validator;
use tracing::{error, info, warn};

use crate::env::{EnvironmentBuilder, select_model};
use crate::error::LaunchError;
use crate::fallback::FallbackResolver;
use crate::process::{ProcessRunner, SpawnSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub exit_code: i32,
    pub provider_id: String,
    pub tried: Vec<String>,
    pub exhausted: bool,
}

pub struct Launcher {
    catalog: Arc<dyn ProviderCatalog>,
    validator: Arc<Validator>,
    builder: EnvironmentBuilder,
    runner: Arc<dyn ProcessRunner>,
    cli_binary: String,
}

impl Launcher {
    pub fn new(
        catalog: Arc<dyn ProviderCatalog>,
        validator: Arc<Validator>,
        builder: EnvironmentBuilder,
        runner: Arc<dyn ProcessRunner>,
        cli_binary: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            validator,
            builder,
            runner,
            cli_binary: cli_binary.into(),
        }
    }

    /// Runs the attempt, then same-category fallbacks while they fail.
    ///
    /// Attempts are strictly sequential and every provider id is tried at
    /// most once, so the chain ends after at most one attempt per provider.
    pub fn launch(&self, mut attempt: LaunchAttempt) -> LaunchOutcome {
        // Model errors end the chain before any attempt.
        if let Some(model) = attempt.model.as_deref() {
            if !attempt.provider.is_standalone() {
                if let Err(err) = select_model(&attempt.provider, model) {
                    error!(provider = %attempt.provider.id, "{err}");
                    eprintln!("{err}");
                    return LaunchOutcome {
                        exit_code: 1,
                        provider_id: attempt.provider.id.clone(),
                        tried: attempt.tried_provider_ids().to_vec(),
                        exhausted: false,
                    };
                }
            }
        }

        let gate = self.validator.validate(&attempt.provider, false);
        let mut exit_code = if gate.valid {
            self.run_once(&attempt)
        } else {
            eprintln!(
                "{} is not available: {}",
                attempt.provider.name, gate.message
            );
            1
        };

        let mut exhausted = false;
        while exit_code != 0 && attempt.fallback_enabled {
            let resolver = FallbackResolver::new(self.catalog.as_ref(), &self.validator);
            let Some(next) = resolver.next(&attempt.provider, attempt.tried_provider_ids()) else {
                eprintln!(
                    "All {} providers exhausted; giving up with exit code {exit_code}.",
                    attempt.provider.category.as_str()
                );
                exhausted = true;
                break;
            };
            eprintln!(
                "{} failed (exit {exit_code}); falling back to {}.",
                attempt.provider.name, next.name
            );
            info!(from = %attempt.provider.id, to = %next.id, exit_code, "falling back");
            attempt.advance_to(next);
            exit_code = self.run_once(&attempt);
        }

        LaunchOutcome {
            exit_code,
            provider_id: attempt.provider.id.clone(),
            tried: attempt.tried_provider_ids().to_vec(),
            exhausted,
        }
    }

    fn run_once(&self, attempt: &LaunchAttempt) -> i32 {
        let provider = &attempt.provider;
        let result = if provider.is_standalone() {
            if attempt.model.is_some() {
                warn!(provider = %provider.id, "standalone providers ignore model selection");
            }
            standalone_spec(provider, &attempt.args).and_then(|spec| self.runner.run(&spec))
        } else {
            self.run_isolated(attempt)
        };
        match result {
            Ok(code) => code,
            Err(err) => {
                error!(provider = %provider.id, "launch failed: {err}");
                eprintln!("Failed to launch {}: {err}", provider.name);
                1
            }
        }
    }

    fn run_isolated(&self, attempt: &LaunchAttempt) -> Result<i32, LaunchError> {
        let provider = &attempt.provider;
        let context = self.builder.build(provider, attempt.model.as_deref())?;
        let spec = SpawnSpec {
            provider_id: provider.id.clone(),
            program: self.cli_binary.clone(),
            args: shared_cli_args(attempt),
            env: context.env.clone(),
        };
        let result = self.runner.run(&spec);
        context.cleanup();
        result
    }
}

pub fn find_provider(catalog: &dyn ProviderCatalog, id: &str) -> Result<Provider, LaunchError> {
    let providers = catalog.get_all();
    if let Some(provider) = providers.iter().find(|provider| provider.id == id) {
        return Ok(provider.clone());
    }
    Err(LaunchError::UnknownProvider {
        id: id.to_string(),
        known: providers
            .iter()
            .map(|provider| provider.id.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn standalone_spec(provider: &Provider, user_args: &[String]) -> Result<SpawnSpec, LaunchError> {
    let command = provider
        .command
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LaunchError::MissingCommand(provider.id.clone()))?;
    let mut words = shlex::split(command).ok_or_else(|| LaunchError::InvalidCommand {
        provider: provider.id.clone(),
        command: command.to_string(),
    })?;
    if words.is_empty() {
        return Err(LaunchError::MissingCommand(provider.id.clone()));
    }
    let program = words.remove(0);
    let args = words
        .into_iter()
        .chain(provider.default_args.iter().cloned())
        .chain(user_args.iter().cloned())
        .collect();
    Ok(SpawnSpec {
        provider_id: provider.id.clone(),
        program,
        args,
        env: Default::default(),
    })
}

fn shared_cli_args(attempt: &LaunchAttempt) -> Vec<String> {
    let provider = &attempt.provider;
    let mut args = Vec::new();
    if attempt.continue_session {
        match &provider.continue_arg {
            Some(flag) => args.push(flag.clone()),
            None => warn!(provider = %provider.id, "provider does not support continuing a session"),
        }
    }
    if attempt.skip_permissions {
        match &provider.skip_permissions_arg {
            Some(flag) => args.push(flag.clone()),
            None => warn!(provider = %provider.id, "provider does not support skipping permissions"),
        }
    }
    args.extend(attempt.args.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_precede_user_args_when_declared() {
        let mut provider = Provider::new("zai", "Z.ai");
        provider.continue_arg = Some("--continue".to_string());
        provider.skip_permissions_arg = Some("--dangerously-skip-permissions".to_string());
        let attempt = LaunchAttempt::new(provider, vec!["-p".to_string(), "hi".to_string()])
            .with_continue(true)
            .with_skip_permissions(true);
        assert_eq!(
            shared_cli_args(&attempt),
            vec!["--continue", "--dangerously-skip-permissions", "-p", "hi"]
        );
    }

    #[test]
    fn undeclared_flags_are_dropped() {
        let attempt = LaunchAttempt::new(Provider::new("bare", "Bare"), vec!["x".to_string()])
            .with_continue(true)
            .with_skip_permissions(true);
        assert_eq!(shared_cli_args(&attempt), vec!["x"]);
    }

    #[test]
    fn unrequested_flags_are_not_added() {
        let mut provider = Provider::new("zai", "Z.ai");
        provider.continue_arg = Some("--continue".to_string());
        let attempt = LaunchAttempt::new(provider, Vec::new());
        assert!(shared_cli_args(&attempt).is_empty());
    }

    #[test]
    fn standalone_spec_orders_default_then_user_args() {
        let mut provider = Provider::new("codex", "Codex");
        provider.command = Some("codex --profile work".to_string());
        provider.default_args = vec!["--full-auto".to_string()];
        let spec = standalone_spec(&provider, &["fix the bug".to_string()]).expect("spec");
        assert_eq!(spec.program, "codex");
        assert_eq!(spec.args, vec!["--profile", "work", "--full-auto", "fix the bug"]);
        assert!(spec.env.is_empty());
    }

    #[test]
    fn standalone_without_command_is_an_error() {
        let provider = Provider::new("ghost", "Ghost");
        assert!(matches!(
            standalone_spec(&provider, &[]),
            Err(LaunchError::MissingCommand(_))
        ));
    }
}
