//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Launch AI coding agents on any cloud
#[derive(Parser)]
#[command(
    name = "spawn",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format (listing commands)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Answer prompts with their defaults (also `SPAWN_YES` / `CI`)
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision a server on a cloud and start an agent on it
    Run(commands::run::RunArgs),

    /// List available agents
    Agents,

    /// List clouds, the ones with credentials first
    Clouds,

    /// Show which agents are implemented on which clouds
    Matrix,

    /// Show previous runs
    List(commands::list::ListArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            command,
        } = self;

        if let Command::Version = command {
            commands::version::run(json);
            return Ok(());
        }

        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        })?;

        match command {
            Command::Run(args) => commands::run::run(&app, args).await,
            Command::Agents => commands::agents::run(&app).await,
            Command::Clouds => commands::clouds::run(&app).await,
            Command::Matrix => commands::matrix::run(&app).await,
            Command::List(args) => commands::list::run(&app, &args).await,
            Command::Version => Ok(()),
        }
    }
}
