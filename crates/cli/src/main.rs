mod commands;
mod error;

use std::process::ExitCode;

use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlstep_core::{init_logging, load_env_file, AppConfigTrait, LoggingConfig, MigrateConfig};
use sqlstep_orm::MigrateCommand;

use commands::*;
use error::CliError;

#[derive(Parser)]
#[command(name = "sqlstep")]
#[command(version)]
#[command(about = "Version-ordered SQL migrations for PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate database structures. Create new tables, columns, indexes and so on.
    Migrate(MigrateArgs),
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .multiple(false)
        .args(["up", "down", "show_version", "force", "create"]),
))]
struct MigrateArgs {
    /// Migrate up by <n>. Setting to 0 migrates all
    #[arg(long, short = 'u', value_name = "N")]
    up: Option<u32>,

    /// Migrate down by <n>. Setting to 0 migrates all
    #[arg(long, short = 'd', value_name = "N")]
    down: Option<u32>,

    /// Show the last applied migration version
    #[arg(long = "version", short = 'v')]
    show_version: bool,

    /// Set the migration version without running migrations (-1 clears it)
    #[arg(long, short = 'f', value_name = "N", allow_negative_numbers = true)]
    force: Option<i64>,

    /// Create an empty up/down migration pair
    #[arg(long, short = 'c', value_name = "NAME")]
    create: Option<String>,
}

impl MigrateArgs {
    fn into_command(self) -> MigrateCommand {
        if let Some(n) = self.up {
            MigrateCommand::Up(n)
        } else if let Some(n) = self.down {
            MigrateCommand::Down(n)
        } else if let Some(version) = self.force {
            MigrateCommand::Force(version)
        } else if let Some(name) = self.create {
            MigrateCommand::Create(name)
        } else {
            MigrateCommand::Version
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    // LOG_LEVEL may live in the env file, but its load error still has to be logged
    let env_file = load_env_file();
    let logging = LoggingConfig::from_env().unwrap_or_default();
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    let env_file = env_file?;
    tracing::debug!(path = %env_file.display(), "Loaded environment file");

    let config = MigrateConfig::from_env()?;
    tracing::debug!(sources = ?config.config_sources(), "Configuration loaded");
    tracing::debug!(
        sources = ?config.database.config_sources(),
        "Database configuration loaded"
    );

    match cli.command {
        Commands::Migrate(args) => migrate::run(args.into_command(), &config).await?,
    }

    Ok(())
}
