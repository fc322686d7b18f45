//! Configuration schema.
//!
//! Keys are written exactly as they appear in `config.json`, so the struct
//! fields carry explicit serde renames.

use crate::error::ConfigError;
use crate::target::RouteTarget;
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default listen host
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default listen port
pub const DEFAULT_PORT: u16 = 3456;
/// Default token volume above which a request is long-context
pub const DEFAULT_LONG_CONTEXT_THRESHOLD: usize = 60_000;
/// Default client cache capacity
pub const DEFAULT_CACHE_CAPACITY: usize = 10;
/// Default client cache TTL (2 hours)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 2 * 60 * 60;
/// Default backend connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// API key of the implicit default provider
    #[serde(rename = "OPENAI_API_KEY", default)]
    pub openai_api_key: Option<SecretString>,

    /// Base URL of the implicit default provider
    #[serde(rename = "OPENAI_BASE_URL", default)]
    pub openai_base_url: Option<String>,

    /// Model of the implicit default provider
    #[serde(rename = "OPENAI_MODEL", default)]
    pub openai_model: Option<String>,

    /// Named providers, in registration order
    #[serde(rename = "Providers", default)]
    pub providers: Vec<ProviderConfig>,

    /// Routing rules
    #[serde(rename = "Router", default)]
    pub router: RouterConfig,

    /// Listen host
    #[serde(rename = "HOST", default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(rename = "PORT", default = "default_port")]
    pub port: u16,

    /// Log level (`RUST_LOG` takes precedence)
    #[serde(rename = "LOG_LEVEL", default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(rename = "LOG_FORMAT", default)]
    pub log_format: LogFormat,

    /// Client cache tuning
    #[serde(rename = "CLIENT_CACHE", default)]
    pub client_cache: ClientCacheConfig,

    /// Backend connect timeout in seconds
    #[serde(rename = "CONNECT_TIMEOUT_SECS", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: None,
            openai_model: None,
            providers: Vec::new(),
            router: RouterConfig::default(),
            host: default_host(),
            port: DEFAULT_PORT,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            client_cache: ClientCacheConfig::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    /// Parse a config from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup
    ///
    /// Empty values are ignored. An unparsable `ROUTER_PORT` is ignored with a
    /// debug log.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(SecretString::new(key));
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai_base_url = Some(url);
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.openai_model = Some(model);
        }
        if let Some(host) = get("ROUTER_HOST") {
            self.host = host;
        }
        if let Some(port) = get("ROUTER_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => debug!(value = %port, "Ignoring unparsable ROUTER_PORT"),
            }
        }
        if let Some(level) = get("ROUTER_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Whether the `OPENAI_*` triple is fully set
    #[must_use]
    pub fn has_default_provider(&self) -> bool {
        self.openai_api_key.is_some() && self.openai_base_url.is_some() && self.openai_model.is_some()
    }

    /// Backend connect timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate the configuration
    ///
    /// Rule targets are checked for syntax only; a rule that names an unknown
    /// provider fails the requests routed to it, not startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("PORT", "port must be non-zero"));
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("HOST", "host cannot be empty"));
        }

        if let Some(base_url) = &self.openai_base_url {
            url::Url::parse(base_url)
                .map_err(|e| ConfigError::invalid("OPENAI_BASE_URL", e.to_string()))?;
        }

        for (i, provider) in self.providers.iter().enumerate() {
            provider.validate(&format!("Providers[{i}]"))?;
        }

        self.router.targets()?;

        if self.client_cache.capacity == 0 {
            return Err(ConfigError::invalid(
                "CLIENT_CACHE.capacity",
                "capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// A named OpenAI-compatible provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name
    pub name: String,

    /// Base URL of the chat-completions API
    pub api_base_url: String,

    /// API key
    pub api_key: SecretString,

    /// Available models; the first is the provider's default
    #[serde(default)]
    pub models: Vec<String>,
}

impl ProviderConfig {
    /// Create a provider config
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        api_base_url: impl Into<String>,
        api_key: impl Into<String>,
        models: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_base_url: api_base_url.into(),
            api_key: SecretString::new(api_key.into()),
            models,
        }
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("{field}.name"),
                "provider name cannot be empty",
            ));
        }
        url::Url::parse(&self.api_base_url)
            .map_err(|e| ConfigError::invalid(format!("{field}.api_base_url"), e.to_string()))?;
        if self.models.is_empty() {
            return Err(ConfigError::invalid(
                format!("{field}.models"),
                "at least one model is required",
            ));
        }
        Ok(())
    }
}

/// Routing rules, one `provider:model` target per category
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Target for background requests
    #[serde(default)]
    pub background: Option<String>,

    /// Target for extended-reasoning requests
    #[serde(default)]
    pub think: Option<String>,

    /// Target for long-context requests
    #[serde(rename = "longContext", default)]
    pub long_context: Option<String>,

    /// Overrides the default target
    #[serde(default)]
    pub default: Option<String>,

    /// Token volume above which a request is long-context
    #[serde(rename = "longContextThreshold", default = "default_threshold")]
    pub long_context_threshold: usize,
}

fn default_threshold() -> usize {
    DEFAULT_LONG_CONTEXT_THRESHOLD
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            background: None,
            think: None,
            long_context: None,
            default: None,
            long_context_threshold: DEFAULT_LONG_CONTEXT_THRESHOLD,
        }
    }
}

/// Parsed rule targets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterTargets {
    /// Background target
    pub background: Option<RouteTarget>,
    /// Think target
    pub think: Option<RouteTarget>,
    /// Long-context target
    pub long_context: Option<RouteTarget>,
    /// Default override
    pub default: Option<RouteTarget>,
}

impl RouterConfig {
    /// Parse every configured target
    pub fn targets(&self) -> Result<RouterTargets, ConfigError> {
        let parse = |key: &str, raw: &Option<String>| -> Result<Option<RouteTarget>, ConfigError> {
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(raw) => RouteTarget::parse(raw).map(Some).ok_or_else(|| {
                    ConfigError::invalid(
                        format!("Router.{key}"),
                        format!("'{raw}' is not of the form provider:model"),
                    )
                }),
            }
        };

        Ok(RouterTargets {
            background: parse("background", &self.background)?,
            think: parse("think", &self.think)?,
            long_context: parse("longContext", &self.long_context)?,
            default: parse("default", &self.default)?,
        })
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Client cache tuning
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClientCacheConfig {
    /// Maximum live clients
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Seconds a client lives after insertion
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

fn default_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl Default for ClientCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl ClientCacheConfig {
    /// TTL as a duration
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
