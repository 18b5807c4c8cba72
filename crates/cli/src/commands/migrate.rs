use std::io::{self, Write};

use chrono::Local;
use sqlstep_core::MigrateConfig;
use sqlstep_orm::{
    create_migration_pair, discover, MigrateCommand, MigrateResult, MigrationConfig,
    MigrationRunner, RunOutcome, StepRequest, VersionState,
};

use crate::error::CliError;

pub async fn run(command: MigrateCommand, config: &MigrateConfig) -> Result<(), CliError> {
    let mut stdout = io::stdout();

    if let Some(request) = command.step_request() {
        return steps(request, config, &mut stdout).await;
    }

    match command {
        MigrateCommand::Create(name) => {
            let pair = create_migration_pair(
                &config.migrations_dir,
                &name,
                Local::now().naive_local(),
            )?;
            writeln!(stdout, "Created migration: {}", pair.up.display())?;
            writeln!(stdout, "Created migration: {}", pair.down.display())?;
        }
        MigrateCommand::Version => {
            let runner = connect(config).await?;
            let result = runner.version().await;
            runner.close().await;
            report_version(&mut stdout, &result?)?;
        }
        MigrateCommand::Force(version) => {
            let runner = connect(config).await?;
            let result = runner.force(version).await;
            runner.close().await;
            report_version(&mut stdout, &result?)?;
        }
        MigrateCommand::Up(_) | MigrateCommand::Down(_) => {}
    }

    Ok(())
}

/// Discover, resolve the step count, then apply. Files are read before any
/// connection is made.
async fn steps<W: Write>(
    request: StepRequest,
    config: &MigrateConfig,
    out: &mut W,
) -> Result<(), CliError> {
    let discovery = discover(&config.migrations_dir, request.direction)?;

    let mut catalog = discovery.catalog;
    let runner = connect(config).await?;
    let result = match request.resolve(discovery.count) {
        Some(steps) => runner.run_steps(&mut catalog, steps).await,
        None => runner.no_change().await,
    };
    runner.close().await;

    report_outcome(out, &result?)?;
    Ok(())
}

/// Callers close the runner on every path, including errors.
async fn connect(config: &MigrateConfig) -> MigrateResult<MigrationRunner> {
    MigrationRunner::connect(MigrationConfig::from(config), &config.database).await
}

fn report_version<W: Write>(out: &mut W, state: &VersionState) -> io::Result<()> {
    match state.version {
        None if !state.dirty => writeln!(out, "no migrations applied yet"),
        None => writeln!(out, "Current version: none, Dirty: {}", state.dirty),
        Some(version) => writeln!(out, "Current version: {}, Dirty: {}", version, state.dirty),
    }
}

fn report_outcome<W: Write>(out: &mut W, outcome: &RunOutcome) -> io::Result<()> {
    match outcome {
        RunOutcome::NoChange => writeln!(out, "no migrations applied. no change"),
        RunOutcome::Applied { steps, version } => match version {
            Some(version) => writeln!(
                out,
                "Applied {} migration(s). Current version: {}",
                steps, version
            ),
            None => writeln!(
                out,
                "Applied {} migration(s). No migrations remain applied",
                steps
            ),
        },
    }
}
