//! Configuration from environment variables and an optional YAML file.
//!
//! ```yaml
//! relay:
//!   port: 8000
//!   backend_url: "http://localhost:11434/api/chat"
//!   model: "mistral"
//! ```
//!
//! **Environment variables** (used as defaults, overridden by the file):
//! - `HOST`: bind address (default: 0.0.0.0)
//! - `PORT`: server port (default: 8000)
//! - `OLLAMA_API_URL`: Ollama chat endpoint (default: http://localhost:11434/api/chat)
//! - `OLLAMA_MODEL`: model to request and to report in chunks (default: mistral)
//! - `CONNECT_TIMEOUT_SECS`: opt-in upstream connect timeout, `0` means none (default: 0)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_MODEL: &str = "mistral";
/// No connect timeout unless configured.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub model: String,
    /// `None` leaves the connect phase unbounded.
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RelayYamlConfig {
    #[serde(default)]
    relay: RelaySection,
}

#[derive(Debug, Default, Deserialize)]
struct RelaySection {
    host: Option<String>,
    port: Option<u16>,
    backend_url: Option<String>,
    model: Option<String>,
    connect_timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            backend_url: env::var("OLLAMA_API_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            connect_timeout_secs: timeout_from_secs(
                env::var("CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
        }
    }
}

impl RelayConfig {
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read relay config from {:?}", path))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse relay config {:?}", path))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml: RelayYamlConfig = if content.trim().is_empty() {
            RelayYamlConfig::default()
        } else {
            serde_yaml_ng::from_str(content)?
        };
        let section = yaml.relay;
        let defaults = Self::default();

        Ok(Self {
            host: section.host.unwrap_or(defaults.host),
            port: section.port.unwrap_or(defaults.port),
            backend_url: section.backend_url.unwrap_or(defaults.backend_url),
            model: section.model.unwrap_or(defaults.model),
            connect_timeout_secs: match section.connect_timeout_secs {
                Some(secs) => timeout_from_secs(secs),
                None => defaults.connect_timeout_secs,
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn timeout_from_secs(secs: u64) -> Option<u64> {
    (secs > 0).then_some(secs)
}
