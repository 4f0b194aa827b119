//! Process configuration
//!
//! Read once at start-up from the environment (and `.env` when present) and
//! handed to the service constructors. Nothing reads the environment after
//! this point.

use crate::{Error, Result};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(Error::Config(format!(
                "Unknown provider '{}'. Expected 'openai' or 'anthropic'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Which provider and model serve one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTarget {
    pub provider: ProviderKind,
    pub model: String,
}

impl ModelTarget {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoles {
    pub classify: ModelTarget,
    pub simple: ModelTarget,
    pub complex: ModelTarget,
    pub tutor_primary: ModelTarget,
    pub tutor_fallback: ModelTarget,
}

impl Default for ModelRoles {
    fn default() -> Self {
        Self {
            classify: ModelTarget::new(ProviderKind::OpenAi, "gpt-4o-mini"),
            simple: ModelTarget::new(ProviderKind::OpenAi, "gpt-4o-mini"),
            complex: ModelTarget::new(ProviderKind::Anthropic, "claude-sonnet-4-20250514"),
            tutor_primary: ModelTarget::new(ProviderKind::Anthropic, "claude-sonnet-4-20250514"),
            tutor_fallback: ModelTarget::new(ProviderKind::OpenAi, "gpt-4o"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub models: ModelRoles,
    pub bind_addr: SocketAddr,
    pub provider_timeout: Duration,
    pub max_body_bytes: usize,
}

// Keys stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "***"),
            )
            .field("models", &self.models)
            .field("bind_addr", &self.bind_addr)
            .field("provider_timeout", &self.provider_timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ModelRoles::default();

        let target = |role: &str, default: ModelTarget| -> Result<ModelTarget> {
            let provider = match get(&format!("{}_PROVIDER", role)) {
                Some(value) => value.parse()?,
                None => default.provider,
            };
            let model = get(&format!("{}_MODEL", role)).unwrap_or(default.model);
            Ok(ModelTarget { provider, model })
        };

        let models = ModelRoles {
            classify: target("CLASSIFY", defaults.classify)?,
            simple: target("SIMPLE", defaults.simple)?,
            complex: target("COMPLEX", defaults.complex)?,
            tutor_primary: target("TUTOR_PRIMARY", defaults.tutor_primary)?,
            tutor_fallback: target("TUTOR_FALLBACK", defaults.tutor_fallback)?,
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e| Error::Config(format!("Invalid BIND_ADDR (expected host:port): {}", e)))?;

        let provider_timeout = match get("PROVIDER_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(value.parse().map_err(|_| {
                Error::Config(format!("Invalid PROVIDER_TIMEOUT_SECS '{}'", value))
            })?),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(value) => value
                .parse()
                .map_err(|_| Error::Config(format!("Invalid MAX_BODY_BYTES '{}'", value)))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            models,
            bind_addr,
            provider_timeout,
            max_body_bytes,
        })
    }

    pub fn api_key_for(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }
}
