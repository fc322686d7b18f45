//! Route resolution.
//!
//! Category to rule target to registry lookup. A rule naming an unknown
//! provider fails the request it routes, with a configuration error.

use crate::classifier::{Category, Classify, DefaultClassifier};
use crate::rules::RoutingRules;
use crate::tokens::TokenCounter;
use gateway_config::RouteTarget;
use gateway_core::{GatewayResult, MessagesRequest};
use gateway_providers::{Provider, ProviderRegistry};
use std::sync::Arc;
use tracing::debug;

/// Where a request goes
#[derive(Debug, Clone)]
pub struct RouteDecision {
    /// Category the request was classified into
    pub category: Category,
    /// Resolved provider
    pub provider: Provider,
    /// Concrete model sent to the provider
    pub model: String,
    /// The caller named the provider explicitly
    pub explicit: bool,
}

/// Request router
pub struct Router {
    registry: Arc<ProviderRegistry>,
    rules: RoutingRules,
    classifier: Box<dyn Classify>,
    counter: TokenCounter,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("rules", &self.rules)
            .field("providers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Create a router with the default classifier
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, rules: RoutingRules) -> Self {
        Self {
            registry,
            rules,
            classifier: Box::new(DefaultClassifier::new()),
            counter: TokenCounter::new(),
        }
    }

    /// Replace the classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl Classify + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Rule table
    #[must_use]
    pub fn rules(&self) -> &RoutingRules {
        &self.rules
    }

    /// Provider registry
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Whether routing falls back to the static default for every request
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.rules.is_complete()
    }

    /// Category of `request`
    #[must_use]
    pub fn classify(&self, request: &MessagesRequest) -> Category {
        if self.is_degraded() {
            return Category::Default;
        }
        self.classifier.classify(request, &self.rules)
    }

    /// Prompt token estimate for `request`
    #[must_use]
    pub fn count_tokens(&self, request: &MessagesRequest) -> usize {
        self.counter.count_request(request)
    }

    /// `provider,model` or `provider:model` naming a registered provider.
    ///
    /// Always `None` while degraded: the default route is then unconditional.
    #[must_use]
    pub fn explicit_target(&self, model: &str) -> Option<RouteTarget> {
        if self.is_degraded() {
            return None;
        }
        RouteTarget::parse(model).filter(|target| self.registry.contains(&target.provider))
    }

    /// Resolve `request` to a provider and model.
    ///
    /// An explicit target in the model field bypasses classification.
    ///
    /// # Errors
    /// Returns `ProviderNotFound` when the chosen target names an unknown
    /// provider or no default provider exists
    pub fn route(&self, request: &MessagesRequest) -> GatewayResult<RouteDecision> {
        if let Some(target) = self.explicit_target(&request.model) {
            return self.resolve_explicit(&target);
        }

        let category = self.classify(request);
        let decision = match self.rules.target(category) {
            Some(target) => self.resolve(category, target)?,
            None => self.static_default()?,
        };

        debug!(
            category = %decision.category,
            provider = %decision.provider.name,
            model = %decision.model,
            "Route resolved"
        );
        Ok(decision)
    }

    /// The default route: the default provider's first model, or
    /// `Router.default` when the rule set is complete
    ///
    /// # Errors
    /// Returns `ProviderNotFound` if the default provider does not exist
    pub fn static_default(&self) -> GatewayResult<RouteDecision> {
        if let Some(target) = self.rules.default.as_ref().filter(|_| !self.is_degraded()) {
            return self.resolve(Category::Default, target);
        }

        let (provider, model) = self.registry.default_target()?;
        Ok(RouteDecision {
            category: Category::Default,
            provider,
            model,
            explicit: false,
        })
    }

    /// Resolve an explicit target
    ///
    /// # Errors
    /// Returns `ProviderNotFound` for unknown providers
    pub fn resolve_explicit(&self, target: &RouteTarget) -> GatewayResult<RouteDecision> {
        let mut decision = self.resolve(Category::Default, target)?;
        decision.explicit = true;
        debug!(provider = %decision.provider.name, model = %decision.model, "Explicit route");
        Ok(decision)
    }

    fn resolve(&self, category: Category, target: &RouteTarget) -> GatewayResult<RouteDecision> {
        let provider = self.registry.resolve(&target.provider)?;
        Ok(RouteDecision {
            category,
            provider,
            model: target.model.clone(),
            explicit: false,
        })
    }
}
