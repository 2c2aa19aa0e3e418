//! # Configuration
//!
//! Optional TOML configuration file for the tangle binary.
//!
//! ## Precedence
//!
//! CLI flags > environment variables > config file > built-in defaults.
//!
//! ## Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! backend = "redb"
//! path = "tangle.redb"
//!
//! [log]
//! level = "info"
//! format = "json"
//! file = "tangle.log"
//!
//! [walk]
//! alpha = 0.01
//! max_steps = 10000
//!
//! [security]
//! rate_limit = 100
//! cors_origins = ["http://localhost:3000"]
//! ```
//!
//! ## Environment Variables
//!
//! - `TANGLE_API_KEY`: bearer key required by every endpoint except `/health`
//! - `TANGLE_RATE_LIMIT`: requests per second, `0` disables limiting
//! - `TANGLE_CORS_ORIGINS`: comma-separated origins, or `*` for all
//! - `TANGLE_LOG_FORMAT`: `text` or `json`

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tangle_core::primitives::{DEFAULT_ALPHA, DEFAULT_MAX_STEPS};
use tangle_core::{TangleError, WalkParams};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "tangle.toml";

// =============================================================================
// SECTIONS
// =============================================================================

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// ACID database file.
    #[default]
    Redb,
    /// Volatile, lost on exit.
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Memory => "memory",
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Database file for the redb backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("tangle.redb"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse `text` or `json`, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for the tangle crates when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
    /// Append log output to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// `[walk]` section: defaults for tip selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    pub alpha: f64,
    pub max_steps: usize,
    /// Fixed RNG seed for reproducible tip selection.
    pub seed: Option<u64>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            max_steps: DEFAULT_MAX_STEPS,
            seed: None,
        }
    }
}

impl WalkConfig {
    /// Walk parameters used when a request does not override them.
    pub fn params(&self) -> WalkParams {
        WalkParams::new(self.alpha, self.max_steps)
    }
}

/// `[security]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Bearer key. `None` or empty disables authentication.
    pub api_key: Option<String>,
    /// Requests per second. `0` disables rate limiting.
    pub rate_limit: u32,
    /// Allowed CORS origins. `None` means localhost only; `["*"]` means all.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            rate_limit: 100,
            cors_origins: None,
        }
    }
}

impl SecurityConfig {
    /// The configured API key, if authentication is enabled.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Complete binary configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
    pub walk: WalkConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, TangleError> {
        toml::from_str(content)
            .map_err(|e| TangleError::DeserializationError(format!("Invalid config: {}", e)))
    }

    /// Load the config file at `path`.
    ///
    /// A missing file yields the defaults unless `required` is set, which is
    /// the case when the path was given explicitly on the command line.
    pub fn load(path: &Path, required: bool) -> Result<Self, TangleError> {
        if !path.exists() {
            if required {
                return Err(TangleError::IoError(format!(
                    "Config file '{}' not found",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TangleError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Overlay `TANGLE_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Overlay variables from an arbitrary lookup. Unparseable values are
    /// ignored with a warning.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("TANGLE_API_KEY") {
            self.security.api_key = Some(key);
        }

        if let Some(raw) = lookup("TANGLE_RATE_LIMIT") {
            match raw.trim().parse() {
                Ok(rps) => self.security.rate_limit = rps,
                Err(e) => tracing::warn!("Ignoring TANGLE_RATE_LIMIT='{}': {}", raw, e),
            }
        }

        if let Some(raw) = lookup("TANGLE_CORS_ORIGINS") {
            self.security.cors_origins = Some(
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }

        if let Some(raw) = lookup("TANGLE_LOG_FORMAT") {
            match LogFormat::parse(&raw) {
                Some(format) => self.log.format = format,
                None => tracing::warn!("Ignoring TANGLE_LOG_FORMAT='{}'", raw),
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
