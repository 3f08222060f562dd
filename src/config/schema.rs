//! KDL schema for config.kdl.
//!
//! ```kdl
//! premium-editions 4 5
//! output-format "human"  // or "json"
//! log-level "info"
//! data-dir "/srv/questline"  // honored in the system file only
//! ```

use crate::{Error, Result};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log levels accepted in config files. `QL_LOG` takes full filter directives.
pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Preferences stored in config.kdl. Unset values fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestlineConfig {
    /// Game editions that unlock `eodOnly` tasks
    pub premium_editions: Option<Vec<u32>>,

    pub output_format: Option<OutputFormat>,

    pub log_level: Option<String>,

    pub data_dir: Option<PathBuf>,
}

impl QuestlineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(level) = &self.log_level {
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(format!(
                    "log-level must be one of {}, got '{}'",
                    LOG_LEVELS.join(", "),
                    level
                ));
            }
        }
        if let Some(editions) = &self.premium_editions {
            if editions.is_empty() {
                return Err("premium-editions needs at least one edition id".to_string());
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes and ill-typed values are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(node) = doc.get("premium-editions") {
            let editions: Vec<u32> = node
                .entries()
                .iter()
                .filter_map(|entry| entry.value().as_integer())
                .filter_map(|i| u32::try_from(i).ok())
                .collect();
            if !editions.is_empty() {
                config.premium_editions = Some(editions);
            }
        }

        if let Some(s) = first_string(doc, "output-format") {
            config.output_format = OutputFormat::parse(s);
        }

        if let Some(s) = first_string(doc, "log-level") {
            config.log_level = Some(s.to_string());
        }

        if let Some(s) = first_string(doc, "data-dir") {
            config.data_dir = Some(PathBuf::from(s));
        }

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(editions) = &self.premium_editions {
            let mut node = KdlNode::new("premium-editions");
            for edition in editions {
                node.push(KdlEntry::new(KdlValue::Integer(*edition as i128)));
            }
            doc.nodes_mut().push(node);
        }

        if let Some(format) = &self.output_format {
            let mut node = KdlNode::new("output-format");
            node.push(KdlEntry::new(KdlValue::String(format.as_str().to_string())));
            doc.nodes_mut().push(node);
        }

        if let Some(level) = &self.log_level {
            let mut node = KdlNode::new("log-level");
            node.push(KdlEntry::new(KdlValue::String(level.clone())));
            doc.nodes_mut().push(node);
        }

        if let Some(dir) = &self.data_dir {
            let mut node = KdlNode::new("data-dir");
            node.push(KdlEntry::new(KdlValue::String(dir.display().to_string())));
            doc.nodes_mut().push(node);
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &QuestlineConfig) {
        if other.premium_editions.is_some() {
            self.premium_editions = other.premium_editions.clone();
        }
        if other.output_format.is_some() {
            self.output_format = other.output_format.clone();
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level.clone();
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir.clone();
        }
    }

    /// Read and validate a config file. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))?;
        Ok(config)
    }
}

fn first_string<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a str> {
    doc.get(name)?.entries().first()?.value().as_string()
}
