//! Routing rule table.

use crate::classifier::Category;
use gateway_config::{RouteTarget, RouterConfig};
use gateway_core::{GatewayError, GatewayResult};

/// Category to `provider:model` targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRules {
    /// Target for background requests
    pub background: Option<RouteTarget>,
    /// Target for extended-reasoning requests
    pub think: Option<RouteTarget>,
    /// Target for long-context requests
    pub long_context: Option<RouteTarget>,
    /// Overrides the default provider's first model
    pub default: Option<RouteTarget>,
    /// Token volume above which a request is long-context
    pub long_context_threshold: usize,
}

impl Default for RoutingRules {
    fn default() -> Self {
        Self {
            background: None,
            think: None,
            long_context: None,
            default: None,
            long_context_threshold: gateway_config::config::DEFAULT_LONG_CONTEXT_THRESHOLD,
        }
    }
}

impl RoutingRules {
    /// Build from the `Router` config section
    ///
    /// # Errors
    /// Returns a configuration error for malformed targets
    pub fn from_config(config: &RouterConfig) -> GatewayResult<Self> {
        let targets = config
            .targets()
            .map_err(|e| GatewayError::configuration(e.to_string()))?;

        Ok(Self {
            background: targets.background,
            think: targets.think,
            long_context: targets.long_context,
            default: targets.default,
            long_context_threshold: config.long_context_threshold,
        })
    }

    /// Whether background, think and longContext are all configured
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.background.is_some() && self.think.is_some() && self.long_context.is_some()
    }

    /// Configured target for `category`
    #[must_use]
    pub fn target(&self, category: Category) -> Option<&RouteTarget> {
        match category {
            Category::Background => self.background.as_ref(),
            Category::Think => self.think.as_ref(),
            Category::LongContext => self.long_context.as_ref(),
            Category::Default => self.default.as_ref(),
        }
    }
}
