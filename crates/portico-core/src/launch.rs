use crate::provider::Provider;

#[derive(Debug, Clone)]
pub struct LaunchAttempt {
    pub provider: Provider,
    pub args: Vec<String>,
    pub continue_session: bool,
    pub skip_permissions: bool,
    pub fallback_enabled: bool,
    pub model: Option<String>,
    tried_provider_ids: Vec<String>,
}

impl LaunchAttempt {
    pub fn new(provider: Provider, args: Vec<String>) -> Self {
        let tried_provider_ids = vec![provider.id.clone()];
        Self {
            provider,
            args,
            continue_session: false,
            skip_permissions: false,
            fallback_enabled: false,
            model: None,
            tried_provider_ids,
        }
    }

    pub fn with_continue(mut self, continue_session: bool) -> Self {
        self.continue_session = continue_session;
        self
    }

    pub fn with_skip_permissions(mut self, skip_permissions: bool) -> Self {
        self.skip_permissions = skip_permissions;
        self
    }

    pub fn with_fallback(mut self, fallback_enabled: bool) -> Self {
        self.fallback_enabled = fallback_enabled;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn tried_provider_ids(&self) -> &[String] {
        &self.tried_provider_ids
    }

    pub fn has_tried(&self, id: &str) -> bool {
        self.tried_provider_ids.iter().any(|tried| tried == id)
    }

    /// Switches the attempt to `next`, recording it as tried. The tried list
    /// only grows.
    pub fn advance_to(&mut self, next: Provider) {
        if !self.has_tried(&next.id) {
            self.tried_provider_ids.push(next.id.clone());
        }
        self.provider = next;
        // A model picked for one provider does not carry over to another.
        self.model = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_provider_is_always_tried() {
        let attempt = LaunchAttempt::new(Provider::new("first", "First"), Vec::new());
        assert_eq!(attempt.tried_provider_ids(), ["first".to_string()]);
        assert!(attempt.has_tried("first"));
    }

    #[test]
    fn advancing_grows_tried_set_monotonically() {
        let mut attempt = LaunchAttempt::new(Provider::new("first", "First"), Vec::new())
            .with_model(Some("m1".to_string()));
        attempt.advance_to(Provider::new("second", "Second"));
        attempt.advance_to(Provider::new("second", "Second"));
        assert_eq!(
            attempt.tried_provider_ids(),
            ["first".to_string(), "second".to_string()]
        );
        assert_eq!(attempt.provider.id, "second");
        assert!(attempt.model.is_none());
    }
}
