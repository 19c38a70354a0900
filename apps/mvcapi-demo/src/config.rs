//! Layered application configuration.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use mvcapi::ProblemDetailsConfig;
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `MVCAPI__SERVER__BIND_ADDR`.
pub const ENV_PREFIX: &str = "MVCAPI__";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub problem_details: ProblemDetailsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Budget of the `/api/values/slow` endpoint before it times out.
    #[serde(default = "default_slow_timeout_ms")]
    pub slow_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            slow_timeout_ms: default_slow_timeout_ms(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8087".to_owned()
}

fn default_slow_timeout_ms() -> u64 {
    50
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_owned()
}

impl AppConfig {
    /// Defaults, then the YAML file (if any), then `MVCAPI__*` environment variables.
    ///
    /// # Errors
    /// Fails when the file is missing or any layer does not match the schema.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        Self::from_figment(&figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// # Errors
    /// Fails when the merged layers do not match the schema.
    pub fn from_figment(figment: &Figment) -> anyhow::Result<Self> {
        Ok(figment.extract()?)
    }

    /// Effective configuration as pretty JSON.
    ///
    /// # Errors
    /// Fails only if serialization fails.
    pub fn to_pretty_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
