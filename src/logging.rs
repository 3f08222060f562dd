//! Logging setup for the `ql` binary.
//!
//! Logs go to stderr so stdout stays clean for command output.

use crate::{Error, Result};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `filter` is either a bare level (`warn`) or full directives
/// (`questline=debug,warn`). A bare level only applies to this crate and the
/// `ql` binary.
pub fn init(filter: &str) -> Result<()> {
    let filter = build_filter(filter)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .map_err(|e| Error::Other(format!("failed to initialize logging: {}", e)))
}

fn build_filter(filter: &str) -> Result<EnvFilter> {
    let filter = filter.trim();
    let directives = if crate::config::LOG_LEVELS.contains(&filter.to_lowercase().as_str()) {
        let level = filter.to_lowercase();
        format!("questline={level},ql={level}")
    } else {
        filter.to_string()
    };
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("invalid log filter '{}': {}", directives, e)))
}
