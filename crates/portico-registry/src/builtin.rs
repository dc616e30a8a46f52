use portico_core::{Category, EnvMappings, Provider, ProviderType, ValidationSpec};

const CONTINUE_ARG: &str = "--continue";
const SKIP_PERMISSIONS_ARG: &str = "--dangerously-skip-permissions";
const MODEL_ENV_VAR: &str = "ANTHROPIC_MODEL";

/// Providers shipped with portico. They precede stored providers, so a stored
/// entry reusing one of these ids is shadowed; use `overrides` instead.
pub fn builtin_providers() -> Vec<Provider> {
    vec![
        shared_cli("anthropic", "Anthropic (official)", Category::Anthropic)
            .with_config_dir("~/.claude")
            .with_update("claude update"),
        anthropic_compatible(
            "zai",
            "Z.ai GLM",
            "https://api.z.ai/api/anthropic",
            "ZAI_API_KEY",
            &["glm-4.6", "glm-4.5-air"],
        ),
        anthropic_compatible(
            "kimi",
            "Moonshot Kimi",
            "https://api.moonshot.ai/anthropic",
            "MOONSHOT_API_KEY",
            &["kimi-k2-turbo-preview", "kimi-k2-0905-preview"],
        ),
        anthropic_compatible(
            "deepseek",
            "DeepSeek",
            "https://api.deepseek.com/anthropic",
            "DEEPSEEK_API_KEY",
            &["deepseek-chat", "deepseek-reasoner"],
        ),
        shared_cli("ccr", "Claude Code Router", Category::Custom)
            .with_kind(ProviderType::Proxy)
            .with_validation(ValidationSpec::Http {
                url: Some("http://127.0.0.1:3456".to_string()),
            })
            .with_env("ANTHROPIC_BASE_URL", "http://127.0.0.1:3456"),
        shared_cli("litellm", "LiteLLM gateway", Category::Custom)
            .with_kind(ProviderType::Gateway)
            .with_validation(ValidationSpec::Http {
                url: Some("http://127.0.0.1:4000/health".to_string()),
            })
            .with_env("ANTHROPIC_BASE_URL", "http://127.0.0.1:4000"),
        standalone("codex", "OpenAI Codex", Category::OpenAi, "codex")
            .with_update("npm install -g @openai/codex"),
        standalone("gemini", "Gemini CLI", Category::Google, "gemini")
            .with_update("npm install -g @google/gemini-cli"),
    ]
}

trait BuiltinExt {
    fn with_config_dir(self, dir: &str) -> Self;
    fn with_update(self, cmd: &str) -> Self;
    fn with_env(self, key: &str, value: &str) -> Self;
}

impl BuiltinExt for Provider {
    fn with_config_dir(mut self, dir: &str) -> Self {
        self.config_dir = Some(dir.to_string());
        self
    }

    fn with_update(mut self, cmd: &str) -> Self {
        self.update_cmd = Some(cmd.to_string());
        self
    }

    fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env_vars.insert(key.to_string(), value.to_string());
        self
    }
}

fn shared_cli(id: &str, name: &str, category: Category) -> Provider {
    let mut provider = Provider::new(id, name).with_category(category);
    provider.continue_arg = Some(CONTINUE_ARG.to_string());
    provider.skip_permissions_arg = Some(SKIP_PERMISSIONS_ARG.to_string());
    provider
}

fn anthropic_compatible(
    id: &str,
    name: &str,
    base_url: &str,
    key_env: &str,
    models: &[&str],
) -> Provider {
    let mut provider = shared_cli(id, name, Category::Anthropic)
        .with_validation(ValidationSpec::Env {
            env_key: Some(key_env.to_string()),
        })
        .with_env("ANTHROPIC_BASE_URL", base_url);
    provider.env_mappings = EnvMappings::from_iter([(key_env, "ANTHROPIC_AUTH_TOKEN")]);
    provider.models = models.iter().map(|m| (*m).to_string()).collect();
    provider.model_env_var = Some(MODEL_ENV_VAR.to_string());
    provider
}

fn standalone(id: &str, name: &str, category: Category, command: &str) -> Provider {
    let mut provider = Provider::new(id, name)
        .with_category(category)
        .with_kind(ProviderType::Standalone)
        .with_validation(ValidationSpec::Command {
            command: Some(command.to_string()),
        });
    provider.command = Some(command.to_string());
    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::is_valid_id;
    use std::collections::HashSet;

    #[test]
    fn builtin_ids_are_unique_and_well_formed() {
        let providers = builtin_providers();
        let mut seen = HashSet::new();
        for provider in &providers {
            assert!(is_valid_id(&provider.id), "bad id {}", provider.id);
            assert!(seen.insert(provider.id.clone()), "duplicate {}", provider.id);
        }
    }

    #[test]
    fn standalone_builtins_name_their_command() {
        for provider in builtin_providers().iter().filter(|p| p.is_standalone()) {
            assert!(provider.command.is_some(), "{} lacks command", provider.id);
        }
    }
}
