//! Questline CLI - quest availability and alternative-task invalidation.

use clap::Parser;
use questline::cli::{
    ActorCommands, Cli, Commands, ConfigCommands, GraphCommands, TasksCommands, TeamCommands,
};
use questline::commands::{self, Output};
use questline::config::{ConfigOverrides, OutputFormat, ResolvedConfig, resolve_config};
use questline::logging;
use std::process;
use std::time::Instant;

fn main() {
    let cli = Cli::parse();

    let mut overrides = ConfigOverrides::new();
    if let Some(dir) = &cli.data_dir {
        overrides = overrides.with_data_dir(dir);
    }
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    if let Some(level) = &cli.log_level {
        overrides = overrides.with_log_level(level);
    }

    let config = match resolve_config(&overrides) {
        Ok(config) => config,
        Err(e) => exit_with_error(&e, cli.human_readable),
    };
    let human = *config.output_format() == OutputFormat::Human;

    if let Err(e) = logging::init(config.log_level()) {
        eprintln!("Warning: {}", e);
    }

    let start = Instant::now();
    let result = run_command(cli.command, &config, human);
    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, ok = result.is_ok(), "command finished");

    if let Err(e) = result {
        exit_with_error(&e, human);
    }
}

fn exit_with_error(e: &questline::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
    process::exit(1);
}

fn run_command(
    command: Commands,
    config: &ResolvedConfig,
    human: bool,
) -> Result<(), questline::Error> {
    let data_dir = config.data_dir();
    let rules = config.engine_rules();

    match command {
        Commands::Init { tasks } => {
            let result = commands::init(data_dir, tasks.as_deref())?;
            output(&result, human);
        }
        Commands::Tasks { command } => match command {
            TasksCommands::Import { file } => {
                let result = commands::tasks_import(data_dir, &file)?;
                output(&result, human);
            }
            TasksCommands::List => {
                let result = commands::tasks_list(data_dir)?;
                output(&result, human);
            }
        },
        Commands::Available {
            actor,
            team,
            tasks,
            all,
        } => {
            let result = commands::available(data_dir, &rules, &actor, team, &tasks, all)?;
            output(&result, human);
        }
        Commands::Check { task, actor } => {
            let result = commands::check(data_dir, &rules, &task, &actor)?;
            output(&result, human);
        }
        Commands::Progress { actor, refresh } => {
            let result = commands::progress_show(data_dir, &actor, refresh)?;
            output(&result, human);
        }
        Commands::Update {
            task,
            actor,
            status,
        } => {
            let result = commands::update(data_dir, &task, &actor, &status)?;
            output(&result, human);
        }
        Commands::Actor { command } => match command {
            ActorCommands::Set {
                actor,
                name,
                level,
                faction,
                edition,
                loyalty,
                standing,
            } => {
                let result = commands::actor_set(
                    data_dir,
                    &actor,
                    name,
                    level,
                    faction.as_deref(),
                    edition,
                    &loyalty,
                    &standing,
                )?;
                output(&result, human);
            }
            ActorCommands::Show { actor } => {
                let result = commands::actor_show(data_dir, &actor)?;
                output(&result, human);
            }
            ActorCommands::List => {
                let result = commands::actor_list(data_dir)?;
                output(&result, human);
            }
        },
        Commands::Team { command } => match command {
            TeamCommands::Set { actor, members } => {
                let result = commands::team_set(data_dir, &actor, &members)?;
                output(&result, human);
            }
            TeamCommands::Show { actor } => {
                let result = commands::team_show(data_dir, &actor)?;
                output(&result, human);
            }
        },
        Commands::Graph { command } => match command {
            GraphCommands::Check => {
                let result = commands::graph_check(data_dir)?;
                output(&result, human);
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                output(&commands::config_show(config), human);
            }
        },
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
