//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`QL_DATA_DIR`, `QL_LOG`)
//! 3. Session config.kdl (`<data-dir>/config.kdl`)
//! 4. System config.kdl (`~/.config/questline/config.kdl`, or `$QL_CONFIG_DIR/config.kdl`)
//! 5. Built-in defaults
//!
//! `data-dir` is resolved first and without the session layer, since the
//! session file lives inside the data directory.

use crate::Result;
use crate::config::{OutputFormat, QuestlineConfig};
use crate::engine::{EditionSet, EngineRules};
use crate::engine::predicates::DEFAULT_PREMIUM_EDITIONS;
use crate::storage::{default_data_dir, session_config_path};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "QL_DATA_DIR";
/// Log filter, either a level or full `tracing` directives.
pub const LOG_ENV: &str = "QL_LOG";
/// Directory holding the system config.kdl.
pub const CONFIG_DIR_ENV: &str = "QL_CONFIG_DIR";

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    EnvVar(String),
    Session,
    System,
    CliFlag,
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Session => write!(f, "session"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub data_dir: Resolved<PathBuf>,
    pub premium_editions: Resolved<Vec<u32>>,
    pub output_format: Resolved<OutputFormat>,
    pub log_level: Resolved<String>,
    /// System config file consulted, if any location could be determined
    pub system_config: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn data_dir(&self) -> &Path {
        &self.data_dir.value
    }

    pub fn output_format(&self) -> &OutputFormat {
        &self.output_format.value
    }

    pub fn log_level(&self) -> &str {
        &self.log_level.value
    }

    pub fn engine_rules(&self) -> EngineRules {
        EngineRules::new(EditionSet::new(self.premium_editions.value.iter().copied()))
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }
}

/// Location of the system config file.
pub fn system_config_path() -> Option<PathBuf> {
    if let Some(dir) = non_empty_env(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir).join("config.kdl"));
    }
    dirs::config_dir().map(|dir| dir.join("questline").join("config.kdl"))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve configuration with the full precedence chain.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let system_path = system_config_path();
    let system = match &system_path {
        Some(path) => QuestlineConfig::load(path)?,
        None => QuestlineConfig::new(),
    };

    let data_dir = if let Some(dir) = &overrides.data_dir {
        Resolved::new(dir.clone(), ValueSource::CliFlag)
    } else if let Some(dir) = non_empty_env(DATA_DIR_ENV) {
        Resolved::new(PathBuf::from(dir), ValueSource::EnvVar(DATA_DIR_ENV.to_string()))
    } else if let Some(dir) = &system.data_dir {
        Resolved::new(dir.clone(), ValueSource::System)
    } else {
        Resolved::new(default_data_dir()?, ValueSource::Default)
    };

    let session = QuestlineConfig::load(&session_config_path(&data_dir.value))?;
    if session.data_dir.is_some() {
        tracing::warn!("data-dir in the session config is ignored");
    }

    let premium_editions = if let Some(editions) = &session.premium_editions {
        Resolved::new(editions.clone(), ValueSource::Session)
    } else if let Some(editions) = &system.premium_editions {
        Resolved::new(editions.clone(), ValueSource::System)
    } else {
        Resolved::new(DEFAULT_PREMIUM_EDITIONS.to_vec(), ValueSource::Default)
    };

    let output_format = if let Some(format) = &overrides.output_format {
        Resolved::new(format.clone(), ValueSource::CliFlag)
    } else if let Some(format) = &session.output_format {
        Resolved::new(format.clone(), ValueSource::Session)
    } else if let Some(format) = &system.output_format {
        Resolved::new(format.clone(), ValueSource::System)
    } else {
        Resolved::new(OutputFormat::Json, ValueSource::Default)
    };

    let log_level = if let Some(level) = &overrides.log_level {
        Resolved::new(level.clone(), ValueSource::CliFlag)
    } else if let Some(level) = non_empty_env(LOG_ENV) {
        Resolved::new(level, ValueSource::EnvVar(LOG_ENV.to_string()))
    } else if let Some(level) = &session.log_level {
        Resolved::new(level.clone(), ValueSource::Session)
    } else if let Some(level) = &system.log_level {
        Resolved::new(level.clone(), ValueSource::System)
    } else {
        Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default)
    };

    Ok(ResolvedConfig {
        data_dir,
        premium_editions,
        output_format,
        log_level,
        system_config: system_path,
    })
}
