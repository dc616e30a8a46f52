use portico_core::Provider;
use portico_registry::ProviderCatalog;
use portico_validate::Validator;
use tracing::{debug, info};

pub struct FallbackResolver<'a> {
    catalog: &'a dyn ProviderCatalog,
    validator: &'a Validator,
}

impl<'a> FallbackResolver<'a> {
    pub fn new(catalog: &'a dyn ProviderCatalog, validator: &'a Validator) -> Self {
        Self { catalog, validator }
    }

    pub fn candidates(&self, current: &Provider, tried: &[String]) -> Vec<Provider> {
        self.catalog
            .get_all()
            .into_iter()
            .filter(|candidate| candidate.category == current.category)
            .filter(|candidate| !tried.iter().any(|id| *id == candidate.id))
            .collect()
    }

    pub fn next(&self, current: &Provider, tried: &[String]) -> Option<Provider> {
        let candidates = self.candidates(current, tried);
        debug!(
            from = %current.id,
            category = current.category.as_str(),
            candidates = candidates.len(),
            "resolving fallback"
        );
        candidates.into_iter().find(|candidate| {
            let result = self.validator.validate(candidate, false);
            if !result.valid {
                info!(candidate = %candidate.id, reason = %result.message, "skipping fallback candidate");
            }
            result.valid
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::{Category, ValidationSpec};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn keyed(id: &str, category: Category, key: &str) -> Provider {
        Provider::new(id, id)
            .with_category(category)
            .with_validation(ValidationSpec::Env {
                env_key: Some(key.to_string()),
            })
    }

    fn validator(set: &[&str]) -> Validator {
        let env: HashMap<String, String> = set
            .iter()
            .map(|k| ((*k).to_string(), "x".to_string()))
            .collect();
        Validator::with_strategies(Arc::new(env), Duration::from_secs(1), Duration::from_secs(300))
            .expect("validator")
    }

    #[test]
    fn skips_other_categories_tried_and_invalid() {
        let catalog = vec![
            keyed("a", Category::Anthropic, "A"),
            keyed("b", Category::Anthropic, "B"),
            keyed("c", Category::OpenAi, "C"),
            keyed("d", Category::Anthropic, "D"),
        ];
        let validator = validator(&["B", "C", "D"]);
        let resolver = FallbackResolver::new(&catalog, &validator);

        let next = resolver.next(&catalog[0], &["a".to_string()]).expect("candidate");
        assert_eq!(next.id, "b");

        let next = resolver
            .next(&catalog[0], &["a".to_string(), "b".to_string()])
            .expect("candidate");
        assert_eq!(next.id, "d");
    }

    #[test]
    fn exhausted_category_yields_none() {
        let catalog = vec![
            keyed("a", Category::Anthropic, "A"),
            keyed("b", Category::Anthropic, "B"),
        ];
        let validator = validator(&[]);
        let resolver = FallbackResolver::new(&catalog, &validator);
        assert!(resolver.next(&catalog[0], &["a".to_string()]).is_none());
        assert_eq!(resolver.candidates(&catalog[0], &["a".to_string()]).len(), 1);
    }
}
