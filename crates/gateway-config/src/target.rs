//! Route target syntax.

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// A `provider:model` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTarget {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
}

impl RouteTarget {
    /// Create a target
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parse `provider:model`, or the legacy `provider,model`.
    ///
    /// Only the first separator splits, so model names may contain `:`.
    /// The comma form is tried first since `provider,model:tag` is common.
    pub fn parse(raw: &str) -> Option<Self> {
        let (provider, model) = raw.split_once(',').or_else(|| raw.split_once(':'))?;
        let (provider, model) = (provider.trim(), model.trim());
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self::new(provider, model))
    }
}

impl FromStr for RouteTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            ConfigError::invalid("Router", format!("'{s}' is not of the form provider:model"))
        })
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}
