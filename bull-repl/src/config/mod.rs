//! Configuration for bull-repl
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `BULL_REPL_` prefix, `__` for nesting)
//! 2. `./bull-repl.toml`, or the file given with `--config`
//! 3. `~/.config/bull-repl/config.toml` (user config, XDG)
//! 4. `/etc/bull-repl/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Example: `BULL_REPL_CONNECTION__REDIS_URL=redis://cache:6379`
//!
//! # Example Configuration
//!
//! ```toml
//! [connection]
//! redis_url = "redis://localhost:6379"
//! prefix = "bull"
//! queue = "emails"
//!
//! [console]
//! pause_scope = "global"
//! history_size = 1000
//!
//! [logging]
//! level = "warn"
//! format = "compact"
//! ```

use crate::observability::LogFormat;
use crate::queue::PauseScope;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "bull-repl";
const ENV_PREFIX: &str = "BULL_REPL_";

/// Default queue connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Redis URL used when `connect` gets no `--redis`
    pub redis_url: String,

    /// Key prefix used when `connect` gets no `--prefix`
    pub prefix: String,

    /// Queue to connect to at start-up
    pub queue: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            prefix: "bull".to_string(),
            queue: None,
        }
    }
}

/// Interactive console behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Whether `pause`/`resume` affect every worker or only this process
    pub pause_scope: PauseScope,

    /// History file, defaults to the user data directory
    pub history_file: Option<PathBuf>,

    /// Maximum number of history entries
    pub history_size: usize,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            pause_scope: PauseScope::Global,
            history_file: None,
            history_size: 1000,
        }
    }
}

impl ConsoleSettings {
    /// History file to use: the configured one or
    /// `{data_dir}/bull-repl/bull-repl-default.history`.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.history_file.clone().unwrap_or_else(|| {
            dirs::data_dir().map_or_else(
                || PathBuf::from(".bull-repl-default.history"),
                |dir| dir.join(APP_NAME).join("bull-repl-default.history"),
            )
        })
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level directive, overridden by `RUST_LOG`
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Complete bull-repl configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BullReplConfig {
    /// Default queue connection
    pub connection: ConnectionSettings,

    /// Console behaviour
    pub console: ConsoleSettings,

    /// Logging
    pub logging: LoggingSettings,
}

impl BullReplConfig {
    /// Load configuration from the standard locations
    ///
    /// `local` replaces `./bull-repl.toml` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be parsed
    /// - Configuration values fail type conversion
    pub fn load(local: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Self::defaults()?;

        let system_config = PathBuf::from("/etc").join(APP_NAME).join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        let user_config = Self::recommended_path();
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config =
            local.map_or_else(|| PathBuf::from("./bull-repl.toml"), Path::to_path_buf);
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        } else if local.is_some() {
            anyhow::bail!("config file {} does not exist", local_config.display());
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        Ok(figment.extract()?)
    }

    /// Hardcoded defaults as the base figment layer
    fn defaults() -> anyhow::Result<Figment> {
        Ok(Figment::new().merge(Toml::string(&toml::to_string(&Self::default())?)))
    }

    /// XDG config path: `~/.config/bull-repl/config.toml`
    #[must_use]
    pub fn recommended_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./bull-repl.toml"),
            |config_dir| config_dir.join(APP_NAME).join("config.toml"),
        )
    }
}
