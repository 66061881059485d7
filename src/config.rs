//! # Application Configuration
//!
//! [`AppConfig`] is the read-only, process-wide data the adapters stamp on
//! every invocation: the application name and the local address, plus the
//! logging settings. It is built once at startup and injected into adapters
//! through [`crate::context::ContextBuilder`].
//!
//! ## Sources
//!
//! - YAML file via [`AppConfig::load`]:
//!
//! ```yaml
//! app_name: orders
//! local_addr: 10.0.0.12   # optional, resolved from interfaces when absent
//! log:
//!   level: debug
//!   format: pretty
//! ```
//!
//! - Environment via [`AppConfig::from_env`]: `BRRTFLOW_APP_NAME`,
//!   `BRRTFLOW_LOCAL_ADDR` and the `BRRTFLOW_LOG_*` variables read by
//!   [`LogConfig::from_env`].

use serde::Deserialize;
use std::env;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::logging::{LogConfig, LogFormat};

/// Application name used when nothing is configured.
pub const DEFAULT_APP_NAME: &str = "unknown";

/// Address used when no non-loopback IPv4 interface exists.
pub const FALLBACK_LOCAL_ADDR: &str = "127.0.0.1";

/// Configuration loading error
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The configuration file is not valid YAML for [`AppConfig`]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config '{}': {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    app_name: Option<String>,
    local_addr: Option<String>,
    #[serde(default)]
    log: LogSection,
}

#[derive(Debug, Default, Deserialize)]
struct LogSection {
    level: Option<String>,
    format: Option<String>,
}

/// Read-only application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Reported as the `module` field on every log event
    pub app_name: String,
    /// Reported as the `local_ip` field on every log event
    pub local_addr: String,
    pub log: LogConfig,
}

impl AppConfig {
    /// Explicit configuration with logging taken from the environment.
    #[must_use]
    pub fn new(app_name: impl Into<String>, local_addr: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            local_addr: local_addr.into(),
            log: LogConfig::from_env(),
        }
    }

    /// Configuration from `BRRTFLOW_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::resolve(FileConfig::default())
    }

    /// Load a YAML configuration file. Environment variables fill the gaps
    /// the file leaves.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded application config");
        Ok(Self::resolve(file))
    }

    fn parse(content: &str) -> Result<FileConfig, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        serde_yaml::from_str(content)
    }

    fn resolve(file: FileConfig) -> Self {
        let app_name = file
            .app_name
            .or_else(|| non_empty_env("BRRTFLOW_APP_NAME"))
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        let local_addr = file
            .local_addr
            .or_else(|| non_empty_env("BRRTFLOW_LOCAL_ADDR"))
            .unwrap_or_else(resolve_local_addr);

        let mut log = LogConfig::from_env();
        if let Some(level) = file.log.level {
            log.log_level = level;
        }
        if let Some(format) = file.log.format {
            log.format = LogFormat::parse(&format);
        }

        Self {
            app_name,
            local_addr,
            log,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First non-loopback IPv4 address of this host, or [`FALLBACK_LOCAL_ADDR`].
#[must_use]
pub fn resolve_local_addr() -> String {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces
            .iter()
            .filter(|iface| !iface.is_loopback())
            .find_map(|iface| match iface.ip() {
                IpAddr::V4(ip) => Some(ip.to_string()),
                IpAddr::V6(_) => None,
            })
            .unwrap_or_else(|| FALLBACK_LOCAL_ADDR.to_string()),
        Err(e) => {
            warn!(error = %e, "Failed to list network interfaces");
            FALLBACK_LOCAL_ADDR.to_string()
        }
    }
}
