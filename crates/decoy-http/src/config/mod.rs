//! Server configuration, loadable from YAML or JSON files.

mod stubs;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ServerError};
use crate::request::JournalMode;
use crate::server::ShutdownTimeouts;

pub use stubs::{HeaderDefinition, PathDefinition, RequestDefinition, ResponseTemplate, StubDefinition};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 asks the OS for an ephemeral port.
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_name")]
    pub name: String,
    /// Log every request, match decision and response.
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub journal_mode: JournalMode,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Registered at startup, before the first request is accepted.
    #[serde(default)]
    pub stubs: Vec<StubDefinition>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_name() -> String {
    "decoy".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            name: default_name(),
            verbose: false,
            journal_mode: JournalMode::default(),
            shutdown: ShutdownConfig::default(),
            stubs: Vec::new(),
        }
    }
}

/// Shutdown timing in milliseconds, validated into `ShutdownTimeouts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: i64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i64,
}

fn default_grace_period_ms() -> i64 {
    500
}

fn default_timeout_ms() -> i64 {
    1000
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ShutdownConfig {
    pub fn timeouts(&self) -> Result<ShutdownTimeouts, ServerError> {
        ShutdownTimeouts::from_millis(self.grace_period_ms, self.timeout_ms)
    }
}

impl ServerConfig {
    /// Loads a config file; `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: ServerConfig = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        self.shutdown
            .timeouts()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        for (index, stub) in self.stubs.iter().enumerate() {
            stub.build().map_err(|e| {
                ConfigError::Invalid(format!(
                    "stub #{} ({}): {}",
                    index,
                    stub.name.as_deref().unwrap_or("unnamed"),
                    e
                ))
            })?;
        }
        Ok(())
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}
