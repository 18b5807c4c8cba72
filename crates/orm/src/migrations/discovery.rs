//! Migration Discovery - builds a catalog from a migrations directory
//!
//! Files are named `<version>_<name>.<up|down>.sql`. Only the requested
//! direction is loaded; bodies are read verbatim.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::catalog::Catalog;
use super::definitions::{Direction, MigrationEntry, MigrationVersion};
use crate::error::{MigrateError, MigrateResult};

/// Result of scanning a migrations directory for one direction
#[derive(Debug, Clone)]
pub struct Discovery {
    pub catalog: Catalog,
    /// Number of files discovered, used to resolve "all" step requests
    pub count: usize,
}

/// Recursively scan `dir` for scripts of `direction`.
pub fn discover(dir: &Path, direction: Direction) -> MigrateResult<Discovery> {
    if !dir.is_dir() {
        return Err(MigrateError::MissingDirectory(dir.to_path_buf()));
    }

    let suffix = direction.suffix();
    let mut catalog = Catalog::new(direction);
    let mut count = 0;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        // Symlinked scripts are read through the link
        if entry.file_type().is_dir() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !file_name.ends_with(&suffix) {
            continue;
        }

        let path = entry.path();
        let version = version_from_file_name(&file_name).ok_or_else(|| {
            MigrateError::MalformedVersion {
                path: path.to_path_buf(),
                token: version_token(&file_name).to_string(),
            }
        })?;

        let body = fs::read_to_string(path).map_err(|source| MigrateError::UnreadableMigration {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(version, path = %path.display(), "Discovered {} migration", direction);
        catalog.insert(MigrationEntry::new(
            version,
            direction,
            path.display().to_string(),
            body,
        ))?;
        count += 1;
    }

    tracing::info!("total '{}' migrations found: {}", direction, count);

    Ok(Discovery { catalog, count })
}

/// The filename text before the first `_`
fn version_token(file_name: &str) -> &str {
    file_name.split('_').next().unwrap_or(file_name)
}

/// Parse the leading version token of a migration filename.
///
/// Versions are stored as `BIGINT`, so anything above `i64::MAX` is rejected.
pub fn version_from_file_name(file_name: &str) -> Option<MigrationVersion> {
    let token = version_token(file_name);
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token
        .parse::<i64>()
        .ok()
        .and_then(|version| MigrationVersion::try_from(version).ok())
}
