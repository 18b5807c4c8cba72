//! Migration scaffolding - creates empty up/down script pairs

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::definitions::Direction;
use crate::error::{MigrateError, MigrateResult};

/// Version format of scaffolded migrations
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// Paths of a freshly created migration pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPair {
    pub version: String,
    pub up: PathBuf,
    pub down: PathBuf,
}

/// Create `<version>_<name>.up.sql` and `<version>_<name>.down.sql` in `dir`.
///
/// Existing files are never overwritten. If the down file cannot be created
/// the up file is removed again.
pub fn create_migration_pair(
    dir: &Path,
    name: &str,
    now: NaiveDateTime,
) -> MigrateResult<MigrationPair> {
    let name = normalize_name(name)?;

    fs::create_dir_all(dir).map_err(|e| {
        MigrateError::Scaffold(format!(
            "Failed to create migrations directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let version = now.format(VERSION_FORMAT).to_string();
    let stem = format!("{}_{}", version, name);
    let up = dir.join(format!("{}{}", stem, Direction::Up.suffix()));
    let down = dir.join(format!("{}{}", stem, Direction::Down.suffix()));

    create_new(&up)
        .map_err(|e| MigrateError::Scaffold(format!("error creating up file: {}", e)))?;

    if let Err(e) = create_new(&down) {
        if let Err(cleanup) = fs::remove_file(&up) {
            tracing::warn!(path = %up.display(), "Failed to remove orphaned up file: {}", cleanup);
        }
        return Err(MigrateError::Scaffold(format!(
            "error creating down file: {}",
            e
        )));
    }

    tracing::info!(up = %up.display(), down = %down.display(), "Created migration pair");

    Ok(MigrationPair { version, up, down })
}

fn create_new(path: &Path) -> std::io::Result<()> {
    OpenOptions::new().write(true).create_new(true).open(path)?;
    Ok(())
}

/// Trim the name and join whitespace-separated words with `_`.
fn normalize_name(name: &str) -> MigrateResult<String> {
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.is_empty() {
        return Err(MigrateError::Scaffold(
            "Migration name cannot be empty".to_string(),
        ));
    }

    let name = words.join("_");
    if name.contains(['/', '\\']) {
        return Err(MigrateError::Scaffold(format!(
            "Migration name '{}' must not contain path separators",
            name
        )));
    }

    Ok(name)
}
