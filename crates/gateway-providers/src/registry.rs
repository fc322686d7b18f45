//! Provider registry.
//!
//! Built once at startup from configuration and shared read-only as
//! `Arc<ProviderRegistry>`. Lookups of unknown names are typed errors.

use gateway_config::{GatewayConfig, ProviderConfig};
use gateway_core::{GatewayError, GatewayResult};
use secrecy::SecretString;
use std::collections::HashMap;
use tracing::{debug, info};

/// Name of the implicit default provider
pub const DEFAULT_PROVIDER: &str = "default";

/// A configured OpenAI-compatible backend
#[derive(Debug, Clone)]
pub struct Provider {
    /// Unique name
    pub name: String,
    /// Base URL of the chat-completions API
    pub base_url: String,
    /// API key
    pub credential: SecretString,
    /// Models, first is the provider default
    pub models: Vec<String>,
}

impl Provider {
    /// Create a provider, validating its fields
    ///
    /// # Errors
    /// Returns a configuration error for an empty name, an unparsable base
    /// URL or an empty model list
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        credential: SecretString,
        models: Vec<String>,
    ) -> GatewayResult<Self> {
        let name = name.into();
        let base_url = base_url.into();

        if name.trim().is_empty() {
            return Err(GatewayError::configuration("provider name cannot be empty"));
        }
        url::Url::parse(&base_url).map_err(|e| {
            GatewayError::configuration(format!("provider '{name}' has an invalid base URL: {e}"))
        })?;
        if models.is_empty() {
            return Err(GatewayError::configuration(format!(
                "provider '{name}' has no models"
            )));
        }

        Ok(Self {
            name,
            base_url,
            credential,
            models,
        })
    }

    /// Build from a config entry
    ///
    /// # Errors
    /// Same as [`Provider::new`]
    pub fn from_config(config: &ProviderConfig) -> GatewayResult<Self> {
        Self::new(
            &config.name,
            &config.api_base_url,
            config.api_key.clone(),
            config.models.clone(),
        )
    }

    /// First configured model
    #[must_use]
    pub fn default_model(&self) -> &str {
        self.models.first().map_or("", String::as_str)
    }

    /// Whether `model` is listed for this provider
    #[must_use]
    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Registry of providers keyed by name
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Provider>,
    order: Vec<String>,
    aliases: HashMap<String, String>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    ///
    /// The `OPENAI_*` triple, when fully set, becomes provider `default`.
    /// Named providers follow in config order. Without the triple, the first
    /// named provider is aliased as `default`.
    ///
    /// # Errors
    /// Returns a configuration error if any provider fails validation
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let mut registry = Self::new();

        if let (Some(key), Some(base_url), Some(model)) = (
            &config.openai_api_key,
            &config.openai_base_url,
            &config.openai_model,
        ) {
            registry.register(Provider::new(
                DEFAULT_PROVIDER,
                base_url,
                key.clone(),
                vec![model.clone()],
            )?);
        }

        for provider_config in &config.providers {
            registry.register(Provider::from_config(provider_config)?);
        }

        if !registry.providers.contains_key(DEFAULT_PROVIDER) {
            if let Some(first) = registry.order.first().cloned() {
                debug!(provider = %first, "Aliasing first provider as default");
                registry.aliases.insert(DEFAULT_PROVIDER.to_string(), first);
            }
        }

        info!(
            providers = registry.len(),
            default = registry.contains(DEFAULT_PROVIDER),
            "Provider registry built"
        );

        Ok(registry)
    }

    /// Insert or replace a provider by name; returns the replaced provider
    pub fn register(&mut self, provider: Provider) -> Option<Provider> {
        let name = provider.name.clone();
        let previous = self.providers.insert(name.clone(), provider);
        if previous.is_none() {
            self.order.push(name.clone());
        }
        self.aliases.remove(&name);
        debug!(provider = %name, replaced = previous.is_some(), "Provider registered");
        previous
    }

    /// Look up a provider by name or alias
    ///
    /// # Errors
    /// Returns `ProviderNotFound` for unknown names
    pub fn resolve(&self, name: &str) -> GatewayResult<Provider> {
        self.get(name)
            .cloned()
            .ok_or_else(|| GatewayError::provider_not_found(name))
    }

    /// Borrowing lookup
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name).or_else(|| {
            self.aliases
                .get(name)
                .and_then(|target| self.providers.get(target))
        })
    }

    /// Whether `name` resolves
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The default provider and its first model
    ///
    /// # Errors
    /// Returns `ProviderNotFound` if no default provider exists
    pub fn default_target(&self) -> GatewayResult<(Provider, String)> {
        let provider = self.resolve(DEFAULT_PROVIDER)?;
        let model = provider.default_model().to_string();
        Ok((provider, model))
    }

    /// Registered names in registration order (aliases excluded)
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of registered providers (aliases excluded)
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
