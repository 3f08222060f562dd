//! Configuration for questline.
//!
//! One KDL schema, read from two places:
//! - System: `~/.config/questline/config.kdl` (or `$QL_CONFIG_DIR/config.kdl`)
//! - Session: `<data-dir>/config.kdl`
//!
//! Contains:
//! - `premium-editions` - edition ids that unlock `eodOnly` tasks
//! - `output-format` - "json" or "human"
//! - `log-level` - default log level
//! - `data-dir` - data directory (system file only)
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CONFIG_DIR_ENV, ConfigOverrides, DATA_DIR_ENV, LOG_ENV, Resolved, ResolvedConfig, ValueSource,
    resolve_config, system_config_path,
};
pub use schema::{LOG_LEVELS, OutputFormat, QuestlineConfig};
