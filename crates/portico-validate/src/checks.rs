use std::sync::Arc;
use std::time::Duration;

use portico_core::{EnvLookup, Provider, ValidationResult, ValidationSpec};
use reqwest::blocking::Client;
use tracing::{debug, error};
use url::Url;

pub const HTTP_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

pub trait ProviderCheck: Send + Sync {
    fn check(&self, provider: &Provider) -> ValidationResult;
}

pub struct StrategyCheck {
    env: Arc<dyn EnvLookup>,
    client: Client,
    http_timeout: Duration,
}

impl StrategyCheck {
    pub fn new(env: Arc<dyn EnvLookup>, http_timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            env,
            client,
            http_timeout,
        })
    }

    fn check_env(&self, env_key: Option<&str>) -> ValidationResult {
        let Some(key) = env_key else {
            return ValidationResult::valid("always available");
        };
        if self.env.is_set(key) {
            ValidationResult::valid(format!("{key} is set"))
        } else {
            ValidationResult::invalid(format!("environment variable {key} is not set"))
        }
    }

    fn check_http(&self, url: Option<&str>) -> ValidationResult {
        let Some(raw) = url else {
            return ValidationResult::invalid("no URL configured for http validation");
        };
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(err) => return ValidationResult::invalid(format!("invalid URL {raw}: {err}")),
        };
        match self.client.get(url).send() {
            // Any status means something answered.
            Ok(response) => ValidationResult::valid(format!(
                "{raw} reachable (HTTP {})",
                response.status().as_u16()
            )),
            Err(err) if err.is_timeout() => ValidationResult::invalid(format!(
                "{raw} timed out after {}ms",
                self.http_timeout.as_millis()
            )),
            Err(err) if err.is_connect() => {
                ValidationResult::invalid(format!("{raw} unreachable: connection failed"))
            }
            Err(err) => ValidationResult::invalid(format!("{raw} unreachable: {err}")),
        }
    }

    fn check_command(&self, command: Option<&str>) -> ValidationResult {
        let Some(program) = command.and_then(first_word) else {
            return ValidationResult::invalid("no command configured for command validation");
        };
        match which::which(&program) {
            Ok(path) => ValidationResult::valid(format!("{program} found at {}", path.display())),
            Err(which::Error::CannotFindBinaryPath) => {
                debug!(command = %program, "command not found on PATH");
                ValidationResult::invalid(format!("command {program} not found on PATH"))
            }
            Err(err) => {
                error!(command = %program, "command lookup failed: {err}");
                ValidationResult::invalid(format!("command {program} lookup failed: {err}"))
            }
        }
    }
}

impl ProviderCheck for StrategyCheck {
    fn check(&self, provider: &Provider) -> ValidationResult {
        match &provider.validation {
            ValidationSpec::Env { env_key } => self.check_env(env_key.as_deref()),
            ValidationSpec::Http { url } => self.check_http(url.as_deref()),
            ValidationSpec::Command { command } => {
                self.check_command(command.as_deref().or(provider.command.as_deref()))
            }
        }
    }
}

fn first_word(command: &str) -> Option<String> {
    shlex::split(command)
        .and_then(|words| words.into_iter().next())
        .filter(|word| !word.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn strategy(env: HashMap<String, String>) -> StrategyCheck {
        StrategyCheck::new(Arc::new(env), Duration::from_millis(500)).expect("client")
    }

    #[test]
    fn env_without_key_is_always_available() {
        let check = strategy(HashMap::new());
        let provider = Provider::new("official", "Official");
        assert!(check.check(&provider).valid);
    }

    #[test]
    fn env_key_missing_names_the_variable() {
        let check = strategy(HashMap::new());
        let provider = Provider::new("x", "X").with_validation(ValidationSpec::Env {
            env_key: Some("X_KEY".to_string()),
        });
        let result = check.check(&provider);
        assert!(!result.valid);
        assert!(result.message.contains("X_KEY"));
    }

    #[test]
    fn env_key_empty_counts_as_unset() {
        let env = HashMap::from([("X_KEY".to_string(), String::new())]);
        let check = strategy(env);
        let provider = Provider::new("x", "X").with_validation(ValidationSpec::Env {
            env_key: Some("X_KEY".to_string()),
        });
        assert!(!check.check(&provider).valid);
    }

    #[test]
    fn env_key_present_is_valid() {
        let env = HashMap::from([("X_KEY".to_string(), "sk-123".to_string())]);
        let check = strategy(env);
        let provider = Provider::new("x", "X").with_validation(ValidationSpec::Env {
            env_key: Some("X_KEY".to_string()),
        });
        assert!(check.check(&provider).valid);
    }

    #[test]
    fn missing_command_is_invalid() {
        let check = strategy(HashMap::new());
        let provider = Provider::new("ghost", "Ghost").with_validation(ValidationSpec::Command {
            command: Some("nonexistent-xyz".to_string()),
        });
        let result = check.check(&provider);
        assert!(!result.valid);
        assert!(result.message.contains("nonexistent-xyz"));
    }

    #[test]
    fn command_check_falls_back_to_launch_command() {
        let check = strategy(HashMap::new());
        let mut provider = Provider::new("solo", "Solo")
            .with_validation(ValidationSpec::Command { command: None });
        assert!(!check.check(&provider).valid);

        provider.command = Some("nonexistent-xyz --full-auto".to_string());
        let result = check.check(&provider);
        assert!(!result.valid);
        assert!(result.message.contains("nonexistent-xyz"));

        #[cfg(unix)]
        {
            provider.command = Some("sh -c true".to_string());
            assert!(check.check(&provider).valid);
        }
    }

    #[test]
    fn http_without_url_is_invalid() {
        let check = strategy(HashMap::new());
        let provider =
            Provider::new("proxy", "Proxy").with_validation(ValidationSpec::Http { url: None });
        assert!(!check.check(&provider).valid);
    }

    #[test]
    fn first_word_handles_quoted_commands() {
        assert_eq!(first_word("npx -y tool").as_deref(), Some("npx"));
        assert_eq!(first_word("'my tool' --x").as_deref(), Some("my tool"));
        assert_eq!(first_word("   "), None);
    }
}
