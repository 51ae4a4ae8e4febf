//! Sandbox configuration.
//!
//! Configuration is optional: every field has a default. It can be loaded
//! from TOML text, a TOML file, or the environment:
//!
//! ```toml
//! init_timeout_ms = 30000
//!
//! [defaults]
//! timeout = 5000
//! maxOutputLines = 1000
//!
//! [python]
//! binary = "/usr/bin/python3"
//! memory_limit = 536870912
//!
//! [javascript]
//! network = false
//! extra_readonly_paths = ["/opt/node_modules"]
//! ```
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `SNIPBOX_CONFIG` | TOML file to load |
//! | `SNIPBOX_PYTHON` | Python binary override |
//! | `SNIPBOX_NODE` | Node binary override |
//! | `SNIPBOX_TIMEOUT_MS` | Default execution timeout |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::options::ExecutionOptions;

pub const CONFIG_ENV: &str = "SNIPBOX_CONFIG";
pub const PYTHON_ENV: &str = "SNIPBOX_PYTHON";
pub const NODE_ENV: &str = "SNIPBOX_NODE";
pub const TIMEOUT_ENV: &str = "SNIPBOX_TIMEOUT_MS";

/// Settings for one language runtime.
///
/// `None` limits fall back to the runtime's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Interpreter binary; discovered automatically when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Memory limit in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
    /// `RLIMIT_NPROC` for the worker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<u64>,
    /// Allow TCP bind/connect from executed code.
    pub network: bool,
    /// Additional read-only paths (package directories, data files).
    pub extra_readonly_paths: Vec<PathBuf>,
}

impl RuntimeConfig {
    fn validate(&self, language: &str) -> Result<()> {
        if self.memory_limit == Some(0) {
            return Err(Error::InvalidConfig(format!(
                "{language}.memory_limit must be positive"
            )));
        }
        if self.max_processes == Some(0) {
            return Err(Error::InvalidConfig(format!(
                "{language}.max_processes must be positive"
            )));
        }
        if let Some(binary) = &self.binary
            && !binary.is_absolute()
        {
            return Err(Error::InvalidConfig(format!(
                "{language}.binary must be an absolute path: {}",
                binary.display()
            )));
        }
        Ok(())
    }
}

/// Top-level sandbox configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    /// Options used when a caller passes none.
    pub defaults: ExecutionOptions,
    /// How long a worker may take to report ready.
    pub init_timeout_ms: u64,
    pub python: RuntimeConfig,
    pub javascript: RuntimeConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            defaults: ExecutionOptions::default(),
            init_timeout_ms: 30_000,
            python: RuntimeConfig::default(),
            javascript: RuntimeConfig::default(),
        }
    }
}

impl SandboxConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `$SNIPBOX_CONFIG` (if set) and apply the environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(python) = std::env::var_os(PYTHON_ENV) {
            config.python.binary = Some(PathBuf::from(python));
        }
        if let Some(node) = std::env::var_os(NODE_ENV) {
            config.javascript.binary = Some(PathBuf::from(node));
        }
        if let Ok(ms) = std::env::var(TIMEOUT_ENV) {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("{TIMEOUT_ENV}={ms:?}: {e}")))?;
            config.defaults.timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        self.defaults
            .validate()
            .map_err(|e| Error::InvalidConfig(format!("defaults: {e}")))?;
        if self.init_timeout_ms == 0 {
            return Err(Error::InvalidConfig("init_timeout_ms must be positive".into()));
        }
        self.python.validate("python")?;
        self.javascript.validate("javascript")?;
        Ok(())
    }
}
