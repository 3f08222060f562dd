//! CLI argument definitions for questline.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Questline - quest availability and alternative-task invalidation.
///
/// Import a task catalog with `ql init --tasks <file>`, create an actor with
/// `ql actor set`, then ask `ql available`.
#[derive(Parser, Debug)]
#[command(name = "ql")]
#[command(author, version, long_version = crate::LONG_VERSION, about = "Quest dependency graph engine", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Data directory (default: ~/.local/share/questline, or QL_DATA_DIR)
    #[arg(short = 'D', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level or tracing filter directives (default: warn, or QL_LOG)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, optionally importing a task catalog
    Init {
        /// Task catalog (JSON array, {"tasks": [...]} or {"data": {"tasks": [...]}})
        #[arg(long)]
        tasks: Option<PathBuf>,
    },

    /// Task catalog commands
    Tasks {
        #[command(subcommand)]
        command: TasksCommands,
    },

    /// Which tasks are available to an actor (or their team) right now
    Available {
        /// Actor id
        #[arg(short, long)]
        actor: String,

        /// Include the actor's teammates
        #[arg(long)]
        team: bool,

        /// Only evaluate these tasks (repeatable; default: all)
        #[arg(short, long = "task")]
        tasks: Vec<String>,

        /// List unavailable tasks too
        #[arg(long)]
        all: bool,
    },

    /// Explain whether one task is available to an actor
    Check {
        /// Task id
        task: String,

        /// Actor id
        #[arg(short, long)]
        actor: String,
    },

    /// Show an actor's formatted progress, including invalid tasks
    Progress {
        /// Actor id
        #[arg(short, long)]
        actor: String,

        /// Also rewrite the stored view
        #[arg(long)]
        refresh: bool,
    },

    /// Mark a task complete, failed or uncompleted for an actor
    Update {
        /// Task id
        task: String,

        /// Actor id
        #[arg(short, long)]
        actor: String,

        /// New status: complete, failed, uncomplete
        #[arg(short, long)]
        status: String,
    },

    /// Actor commands
    Actor {
        #[command(subcommand)]
        command: ActorCommands,
    },

    /// Team commands
    Team {
        #[command(subcommand)]
        command: TeamCommands,
    },

    /// Graph analysis commands
    Graph {
        #[command(subcommand)]
        command: GraphCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TasksCommands {
    /// Replace the task catalog with the contents of a file
    Import {
        /// Catalog file
        file: PathBuf,
    },

    /// List tasks in the catalog
    List,
}

#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Create an actor or change its attributes
    Set {
        /// Actor id
        #[arg(short, long)]
        actor: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Player level
        #[arg(short, long)]
        level: Option<u32>,

        /// Faction (USEC, BEAR)
        #[arg(short, long)]
        faction: Option<String>,

        /// Game edition id
        #[arg(short, long)]
        edition: Option<u32>,

        /// Trader loyalty level, as TRADER=LEVEL (repeatable)
        #[arg(long)]
        loyalty: Vec<String>,

        /// Trader standing, as TRADER=VALUE (repeatable)
        #[arg(long)]
        standing: Vec<String>,
    },

    /// Show an actor's raw snapshot
    Show {
        /// Actor id
        #[arg(short, long)]
        actor: String,
    },

    /// List actors
    List,
}

#[derive(Subcommand, Debug)]
pub enum TeamCommands {
    /// Replace an actor's teammates (no members clears the team)
    Set {
        /// Actor id
        #[arg(short, long)]
        actor: String,

        /// Teammate ids
        members: Vec<String>,
    },

    /// Show an actor's team, the actor first
    Show {
        /// Actor id
        #[arg(short, long)]
        actor: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum GraphCommands {
    /// Report cycles, dangling references and one-sided alternatives
    Check,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration and where each value came from
    Show,
}
