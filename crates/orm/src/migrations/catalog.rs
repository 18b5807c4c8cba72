//! Migration Catalog - in-memory, single-direction migration source
//!
//! A catalog holds the entries of exactly one direction, keyed by version.
//! Navigation answers "not found" with `None`: runners use it to detect the
//! ends of the catalog, it is not an error.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use super::definitions::{Direction, MigrationEntry, MigrationVersion};
use crate::error::{MigrateError, MigrateResult};

/// A navigable source of migrations for one direction
pub trait MigrationSource {
    /// Prepare the source for reading
    fn open(&mut self) -> MigrateResult<()> {
        Ok(())
    }

    /// Release anything held by the source
    fn close(&mut self) -> MigrateResult<()> {
        Ok(())
    }

    /// Direction of every entry in this source
    fn direction(&self) -> Direction;

    /// Smallest version with an entry
    fn first(&self) -> Option<MigrationVersion>;

    /// Largest entry-bearing version strictly below `version`
    fn prev(&self, version: MigrationVersion) -> Option<MigrationVersion>;

    /// Smallest entry-bearing version strictly above `version`
    fn next(&self, version: MigrationVersion) -> Option<MigrationVersion>;

    /// Entry for `version`, with its body and identifier
    fn read(&self, version: MigrationVersion) -> Option<&MigrationEntry>;
}

/// Discovered migrations of a single direction
#[derive(Debug, Clone)]
pub struct Catalog {
    direction: Direction,
    entries: BTreeMap<MigrationVersion, MigrationEntry>,
}

impl Catalog {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            entries: BTreeMap::new(),
        }
    }

    /// Add an entry. Rejects entries of the other direction and a second
    /// entry for an existing version.
    pub fn insert(&mut self, entry: MigrationEntry) -> MigrateResult<()> {
        if entry.direction != self.direction {
            return Err(MigrateError::DirectionMismatch {
                requested: entry.direction,
                catalog: self.direction,
            });
        }

        if let Some(existing) = self.entries.get(&entry.version) {
            return Err(MigrateError::DuplicateVersion {
                version: entry.version,
                direction: entry.direction,
                first: existing.identifier.clone(),
                second: entry.identifier,
            });
        }

        self.entries.insert(entry.version, entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Versions in ascending order
    pub fn versions(&self) -> impl Iterator<Item = MigrationVersion> + '_ {
        self.entries.keys().copied()
    }
}

impl MigrationSource for Catalog {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn first(&self) -> Option<MigrationVersion> {
        self.entries.keys().next().copied()
    }

    fn prev(&self, version: MigrationVersion) -> Option<MigrationVersion> {
        self.entries.range(..version).next_back().map(|(v, _)| *v)
    }

    fn next(&self, version: MigrationVersion) -> Option<MigrationVersion> {
        self.entries
            .range((Excluded(version), Unbounded))
            .next()
            .map(|(v, _)| *v)
    }

    fn read(&self, version: MigrationVersion) -> Option<&MigrationEntry> {
        self.entries.get(&version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(direction: Direction, versions: &[MigrationVersion]) -> Catalog {
        let mut catalog = Catalog::new(direction);
        for version in versions {
            catalog
                .insert(MigrationEntry::new(
                    *version,
                    direction,
                    format!("{}_m.{}.sql", version, direction),
                    format!("-- {}", version),
                ))
                .unwrap();
        }
        catalog
    }

    #[test]
    fn test_empty_catalog_has_no_first() {
        let catalog = Catalog::new(Direction::Up);
        assert!(catalog.is_empty());
        assert_eq!(catalog.first(), None);
        assert_eq!(catalog.next(0), None);
        assert_eq!(catalog.prev(10), None);
    }

    #[test]
    fn test_navigation_over_sparse_versions() {
        let catalog = catalog(Direction::Up, &[30, 10, 20]);

        assert_eq!(catalog.first(), Some(10));
        assert_eq!(catalog.next(10), Some(20));
        assert_eq!(catalog.next(15), Some(20));
        assert_eq!(catalog.next(30), None);
        assert_eq!(catalog.prev(20), Some(10));
        assert_eq!(catalog.prev(25), Some(20));
        assert_eq!(catalog.prev(10), None);
        assert_eq!(catalog.versions().collect::<Vec<_>>(), vec![10, 20, 30]);
    }

    #[test]
    fn test_read_returns_body_and_identifier() {
        let catalog = catalog(Direction::Down, &[7]);

        let entry = catalog.read(7).unwrap();
        assert_eq!(entry.body, "-- 7");
        assert_eq!(entry.identifier, "7_m.down.sql");
        assert!(catalog.read(8).is_none());
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let mut catalog = catalog(Direction::Up, &[1]);
        let err = catalog
            .insert(MigrationEntry::new(1, Direction::Up, "other/1_x.up.sql", ""))
            .unwrap_err();

        assert!(matches!(err, MigrateError::DuplicateVersion { version: 1, .. }));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_other_direction_rejected() {
        let mut catalog = Catalog::new(Direction::Up);
        let err = catalog
            .insert(MigrationEntry::new(1, Direction::Down, "1_x.down.sql", ""))
            .unwrap_err();

        assert!(matches!(err, MigrateError::DirectionMismatch { .. }));
    }
}
