use std::sync::Arc;
use std::time::{Duration, Instant};

use portico_core::{EnvLookup, HealthCheckResult, Provider, ProviderType, ValidationSpec};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::json;
use tracing::{debug, info};

use crate::Validator;

pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(15);

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const FALLBACK_TOKEN_VAR: &str = "ANTHROPIC_AUTH_TOKEN";
const TOKEN_TARGETS: [&str; 2] = ["ANTHROPIC_AUTH_TOKEN", "ANTHROPIC_API_KEY"];
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct HealthChecker<'a> {
    validator: &'a Validator,
    env: Arc<dyn EnvLookup>,
    client: Client,
}

impl<'a> HealthChecker<'a> {
    pub fn new(
        validator: &'a Validator,
        env: Arc<dyn EnvLookup>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            validator,
            env,
            client,
        })
    }

    pub fn health_check(&self, provider: &Provider) -> HealthCheckResult {
        let basic = self.validator.validate(provider, true);
        if !basic.valid {
            return basic.into();
        }
        match provider.kind {
            ProviderType::Api => self.check_api(provider),
            ProviderType::Proxy => self.check_proxy(provider),
            ProviderType::Gateway | ProviderType::Standalone => {
                let mut result = HealthCheckResult::from(basic);
                result.message = format!(
                    "{} (deep check skipped for {} providers)",
                    result.message,
                    provider.kind.as_str()
                );
                result
            }
        }
    }

    /// One provider at a time, in order, to stay clear of third-party rate limits.
    pub fn health_check_all(&self, providers: &[Provider]) -> Vec<(String, HealthCheckResult)> {
        let mut results = Vec::with_capacity(providers.len());
        for provider in providers {
            info!(provider = %provider.id, "running deep health check");
            results.push((provider.id.clone(), self.health_check(provider)));
        }
        results
    }

    fn check_api(&self, provider: &Provider) -> HealthCheckResult {
        let model = resolve_model(provider);
        let Some(api_key) = resolve_api_key(provider, self.env.as_ref()) else {
            return HealthCheckResult {
                valid: false,
                message: "no API key available for health check".to_string(),
                model_name: Some(model),
                error: Some("missing api key".to_string()),
                ..HealthCheckResult::default()
            };
        };
        let endpoint = format!("{}/v1/messages", base_url(provider));
        let body = json!({
            "model": model,
            "max_tokens": 1,
            "messages": [{"role": "user", "content": "ping"}],
        });

        let started = Instant::now();
        let response = self
            .client
            .post(&endpoint)
            .header("x-api-key", &api_key)
            .bearer_auth(&api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send();
        let latency_ms = elapsed_ms(started);

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                let reason = if err.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {err}")
                };
                return HealthCheckResult {
                    valid: false,
                    message: reason.clone(),
                    latency_ms: Some(latency_ms),
                    model_name: Some(model),
                    error: Some(reason),
                    ..HealthCheckResult::default()
                };
            }
        };

        let status = response.status();
        debug!(provider = %provider.id, status = status.as_u16(), latency_ms, "deep check response");
        let (valid, model_available, message) = classify_status(status);
        let error = if valid {
            None
        } else {
            Some(response.text().unwrap_or_default())
                .filter(|body| !body.trim().is_empty())
                .or_else(|| Some(format!("HTTP {}", status.as_u16())))
        };
        HealthCheckResult {
            valid,
            message,
            latency_ms: Some(latency_ms),
            model_available,
            model_name: Some(model),
            error,
        }
    }

    fn check_proxy(&self, provider: &Provider) -> HealthCheckResult {
        let target = match &provider.validation {
            ValidationSpec::Http { url: Some(url) } => url.clone(),
            _ => base_url(provider),
        };
        let started = Instant::now();
        match self.client.get(&target).send() {
            Ok(response) => {
                let latency_ms = elapsed_ms(started);
                HealthCheckResult {
                    valid: true,
                    message: format!(
                        "proxy reachable in {latency_ms}ms (HTTP {})",
                        response.status().as_u16()
                    ),
                    latency_ms: Some(latency_ms),
                    ..HealthCheckResult::default()
                }
            }
            Err(err) => HealthCheckResult {
                valid: false,
                message: format!("proxy unreachable: {target}"),
                latency_ms: Some(elapsed_ms(started)),
                error: Some(err.to_string()),
                ..HealthCheckResult::default()
            },
        }
    }
}

fn classify_status(status: StatusCode) -> (bool, Option<bool>, String) {
    match status.as_u16() {
        200..=299 => (true, Some(true), "API responded".to_string()),
        429 => (true, None, "rate limited (service is up)".to_string()),
        401 => (false, None, "authentication failed (401)".to_string()),
        403 => (false, None, "access forbidden (403)".to_string()),
        404 => (
            false,
            Some(false),
            "model or endpoint not found (404)".to_string(),
        ),
        code @ 500..=599 => (false, None, format!("provider server error ({code})")),
        code => (false, None, format!("unexpected response (HTTP {code})")),
    }
}

fn base_url(provider: &Provider) -> String {
    provider
        .env_vars
        .get("ANTHROPIC_BASE_URL")
        .map(String::as_str)
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/')
        .to_string()
}

fn resolve_model(provider: &Provider) -> String {
    provider
        .env_vars
        .get("ANTHROPIC_MODEL")
        .cloned()
        .or_else(|| provider.models.first().cloned())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

fn resolve_api_key(provider: &Provider, env: &dyn EnvLookup) -> Option<String> {
    let mapped = provider
        .env_mappings
        .iter()
        .filter(|(_, target)| TOKEN_TARGETS.contains(target))
        .find_map(|(source, _)| non_empty(env.var(source)));
    mapped
        .or_else(|| {
            provider
                .validation
                .env_key()
                .and_then(|key| non_empty(env.var(key)))
        })
        .or_else(|| non_empty(env.var(FALLBACK_TOKEN_VAR)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::EnvMappings;
    use std::collections::HashMap;

    #[test]
    fn api_key_prefers_mapped_source() {
        let mut provider = Provider::new("zai", "Z").with_validation(ValidationSpec::Env {
            env_key: Some("VALIDATION_KEY".to_string()),
        });
        provider.env_mappings = EnvMappings::from_iter([("ZAI_KEY", "ANTHROPIC_AUTH_TOKEN")]);
        let env = HashMap::from([
            ("ZAI_KEY".to_string(), "mapped".to_string()),
            ("VALIDATION_KEY".to_string(), "validation".to_string()),
            ("ANTHROPIC_AUTH_TOKEN".to_string(), "fallback".to_string()),
        ]);
        assert_eq!(resolve_api_key(&provider, &env).as_deref(), Some("mapped"));
    }

    #[test]
    fn api_key_falls_through_to_well_known_variable() {
        let mut provider = Provider::new("zai", "Z");
        provider.env_mappings = EnvMappings::from_iter([("UNSET", "ANTHROPIC_AUTH_TOKEN")]);
        let env = HashMap::from([("ANTHROPIC_AUTH_TOKEN".to_string(), "fallback".to_string())]);
        assert_eq!(resolve_api_key(&provider, &env).as_deref(), Some("fallback"));
        assert_eq!(resolve_api_key(&provider, &HashMap::<String, String>::new()), None);
    }

    #[test]
    fn model_resolution_order() {
        let mut provider = Provider::new("p", "P");
        assert_eq!(resolve_model(&provider), DEFAULT_MODEL);
        provider.models = vec!["glm-4.6".to_string()];
        assert_eq!(resolve_model(&provider), "glm-4.6");
        provider
            .env_vars
            .insert("ANTHROPIC_MODEL".to_string(), "pinned".to_string());
        assert_eq!(resolve_model(&provider), "pinned");
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(StatusCode::OK).0);
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).0);
        assert!(!classify_status(StatusCode::UNAUTHORIZED).0);
        assert!(classify_status(StatusCode::FORBIDDEN).2.contains("403"));
        assert_eq!(classify_status(StatusCode::NOT_FOUND).1, Some(false));
        assert!(classify_status(StatusCode::BAD_GATEWAY).2.contains("502"));
    }
}
