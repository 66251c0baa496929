// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = commands::load_config(
        cli.config.as_deref(),
        cli.work_dir.as_deref(),
        &cli.overrides,
    )?;

    match cli.command.unwrap_or(Commands::Run(Default::default())) {
        Commands::Run(args) => commands::cmd_run(config, args),
        Commands::Status => commands::cmd_status(&config),
        Commands::Reset { stage } => commands::cmd_reset(config, stage),
        Commands::Restore { resource } => commands::cmd_restore(&config, resource.as_deref()),
        Commands::Resolve => commands::cmd_resolve(config),
    }
}
