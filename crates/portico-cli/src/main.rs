use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use portico_common::config::PorticoConfig;
use portico_common::{APP_NAME, logging};
use portico_core::{Category, EnvLookup, LaunchAttempt, ProcessEnv, Provider};
use portico_launch::{
    EnvironmentBuilder, Launcher, SystemRunner, find_provider, platform_bypass, run_update,
};
use portico_registry::{FileSource, ProviderCatalog, ProviderRegistry};
use portico_validate::{HealthChecker, Validator};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "portico", about = "Launch AI coding CLIs against isolated providers", version)]
struct Cli {
    /// Force debug logging.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate local setup and generate default config if missing.
    Doctor,
    /// List providers with their availability.
    List {
        #[arg(long)]
        category: Option<String>,
        /// Drop cached validation results first.
        #[arg(long)]
        refresh: bool,
    },
    /// Validate one provider, or all of them.
    Check {
        id: Option<String>,
        /// Run a live request against the provider endpoint.
        #[arg(long)]
        deep: bool,
    },
    /// Show the environment a provider's session would receive.
    Env { id: String },
    /// Run a provider's update command.
    Update { id: String },
    /// Launch a session with a provider.
    Run {
        id: String,
        #[arg(short = 'c', long = "continue")]
        continue_session: bool,
        #[arg(long)]
        skip_permissions: bool,
        /// Try other providers in the same category when this one fails.
        #[arg(long)]
        fallback: bool,
        #[arg(long)]
        model: Option<String>,
        /// Passed through to the launched CLI.
        #[arg(last = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Doctor) => doctor(cli.debug),
        Some(Command::List { category, refresh }) => list(cli.debug, category, refresh),
        Some(Command::Check { id, deep }) => check(cli.debug, id, deep),
        Some(Command::Env { id }) => env(cli.debug, &id),
        Some(Command::Update { id }) => update(cli.debug, &id),
        Some(Command::Run {
            id,
            continue_session,
            skip_permissions,
            fallback,
            model,
            args,
        }) => {
            let app = App::init(cli.debug)?;
            let provider = app.provider(&id)?;
            let attempt = LaunchAttempt::new(provider, args)
                .with_continue(continue_session)
                .with_skip_permissions(skip_permissions)
                .with_fallback(fallback || app.config.fallback)
                .with_model(model);
            let outcome = app.launcher().launch(attempt);
            std::process::exit(outcome.exit_code);
        }
        None => {
            println!("{APP_NAME}: no command given.");
            println!("Run `portico list` to see providers or `portico doctor` to set up.");
            Ok(())
        }
    }
}

/// Config, logging and the long-lived collaborators every command shares.
struct App {
    config: PorticoConfig,
    env: Arc<dyn EnvLookup>,
    registry: Arc<ProviderRegistry>,
    validator: Arc<Validator>,
}

impl App {
    fn init(debug: bool) -> Result<Self> {
        let (config, _, _) = PorticoConfig::load_or_create()?;
        config.validate()?;
        logging::init(if debug { "debug" } else { config.log_level.as_str() });

        let env: Arc<dyn EnvLookup> = Arc::new(ProcessEnv);
        let registry = Arc::new(ProviderRegistry::new(FileSource::new(
            config.providers_path(),
        )));
        let validator = Validator::with_strategies(
            env.clone(),
            config.http_timeout(),
            config.cache_ttl(),
        )
        .context("failed to build HTTP client for validation")?;
        Ok(Self {
            config,
            env,
            registry,
            validator: Arc::new(validator),
        })
    }

    fn provider(&self, id: &str) -> Result<Provider> {
        Ok(find_provider(self.registry.as_ref(), id)?)
    }

    fn env_builder(&self) -> EnvironmentBuilder {
        EnvironmentBuilder::new(self.env.clone(), platform_bypass())
    }

    fn launcher(&self) -> Launcher {
        Launcher::new(
            self.registry.clone(),
            self.validator.clone(),
            self.env_builder(),
            Arc::new(SystemRunner),
            self.config.cli_binary.clone(),
        )
    }
}

fn doctor(debug: bool) -> Result<()> {
    let (config, path, created) = PorticoConfig::load_or_create()?;
    config.validate()?;
    logging::init(if debug { "debug" } else { config.log_level.as_str() });

    let store = config.providers_path();
    let registry = ProviderRegistry::new(FileSource::new(&store));
    let binary = which::which(&config.cli_binary);

    println!("{APP_NAME} doctor: OK");
    println!("config: {}", path.display());
    println!("created_config: {created}");
    println!("providers_file: {}", store.display());
    println!("providers_file_exists: {}", store.exists());
    println!("providers: {}", registry.get_all().len());
    match binary {
        Ok(found) => println!("cli_binary: {} ({})", config.cli_binary, found.display()),
        Err(_) => println!("cli_binary: {} (not found on PATH)", config.cli_binary),
    }
    Ok(())
}

fn list(debug: bool, category: Option<String>, refresh: bool) -> Result<()> {
    let app = App::init(debug)?;
    let providers = match category {
        Some(raw) => app.registry.by_category(Category::parse(&raw)),
        None => app.registry.get_all(),
    };
    if refresh {
        app.validator.clear_cache();
    }
    if providers.is_empty() {
        println!("no providers configured");
        return Ok(());
    }

    let results = app.validator.validate_all(&providers);
    for provider in &providers {
        let (mark, message) = match results.get(&provider.id) {
            Some(result) if result.valid => ("ok", result.message.as_str()),
            Some(result) => ("--", result.message.as_str()),
            None => ("??", "not validated"),
        };
        println!(
            "[{mark}] {:<12} {:<24} {:<10} {:<10} {message}",
            provider.id,
            provider.name,
            provider.category.as_str(),
            provider.kind.as_str(),
        );
    }
    Ok(())
}

fn check(debug: bool, id: Option<String>, deep: bool) -> Result<()> {
    let app = App::init(debug)?;
    let providers = match id {
        Some(id) => vec![app.provider(&id)?],
        None => app.registry.get_all(),
    };

    if !deep {
        let results = app.validator.validate_all(&providers);
        for provider in &providers {
            if let Some(result) = results.get(&provider.id) {
                println!("{}: valid={} {}", provider.id, result.valid, result.message);
            }
        }
        return Ok(());
    }

    let checker = HealthChecker::new(&app.validator, app.env.clone(), app.config.health_timeout())
        .context("failed to build HTTP client for health checks")?;
    for (id, result) in checker.health_check_all(&providers) {
        println!("{id}: valid={} {}", result.valid, result.message);
        if let Some(latency) = result.latency_ms {
            println!("  latency_ms: {latency}");
        }
        if let Some(model) = &result.model_name {
            println!(
                "  model: {model} (available: {})",
                result.model_available.unwrap_or(false)
            );
        }
        if let Some(error) = &result.error {
            println!("  error: {error}");
        }
    }
    Ok(())
}

fn env(debug: bool, id: &str) -> Result<()> {
    let app = App::init(debug)?;
    let provider = app.provider(id)?;
    if provider.is_standalone() {
        println!("{id} is standalone and runs with the caller's environment unchanged");
        return Ok(());
    }
    let context = app
        .env_builder()
        .build(&provider, None)
        .with_context(|| format!("failed to prepare environment for {id}"))?;
    for (key, value) in &context.env {
        println!("{key}={}", mask_secret(key, value));
    }
    context.cleanup();
    Ok(())
}

fn update(debug: bool, id: &str) -> Result<()> {
    let app = App::init(debug)?;
    let provider = app.provider(id)?;
    let Some(outcome) = run_update(&provider, app.config.update_timeout())
        .with_context(|| format!("failed to run update for {id}"))?
    else {
        println!("{id} has no update command");
        return Ok(());
    };
    if outcome.timed_out {
        bail!(
            "update for {id} timed out after {}ms",
            app.config.update_timeout_ms
        );
    }
    if !outcome.success {
        bail!(
            "update for {id} failed with exit code {}",
            outcome
                .exit_code
                .map_or_else(|| "unknown".to_string(), |code| code.to_string())
        );
    }
    println!("{id} updated");
    Ok(())
}

/// Hides values of variables whose names suggest credentials.
fn mask_secret(key: &str, value: &str) -> String {
    let upper = key.to_ascii_uppercase();
    let sensitive = ["KEY", "TOKEN", "SECRET"]
        .iter()
        .any(|marker| upper.contains(marker));
    if !sensitive || value.is_empty() {
        return value.to_string();
    }
    if value.chars().count() <= 8 {
        return "****".to_string();
    }
    let visible: String = value.chars().take(4).collect();
    format!("{visible}****")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_credentials_only() {
        assert_eq!(mask_secret("ANTHROPIC_AUTH_TOKEN", "sk-abcdef123456"), "sk-a****");
        assert_eq!(mask_secret("ZAI_API_KEY", "short"), "****");
        assert_eq!(mask_secret("client_secret", "0123456789"), "0123****");
        assert_eq!(
            mask_secret("ANTHROPIC_BASE_URL", "https://api.z.ai"),
            "https://api.z.ai"
        );
    }

    #[test]
    fn run_passes_trailing_args_through() {
        let cli = Cli::parse_from([
            "portico", "run", "zai", "-c", "--fallback", "--", "-p", "--verbose",
        ]);
        match cli.command {
            Some(Command::Run {
                id,
                continue_session,
                fallback,
                skip_permissions,
                args,
                ..
            }) => {
                assert_eq!(id, "zai");
                assert!(continue_session);
                assert!(fallback);
                assert!(!skip_permissions);
                assert_eq!(args, vec!["-p", "--verbose"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
