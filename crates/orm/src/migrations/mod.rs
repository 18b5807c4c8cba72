//! Migration System
//!
//! Discovery builds a single-direction [`Catalog`] from a migrations
//! directory; the [`StepApplicator`] walks it against a [`VersionStore`].
//! [`MigrationRunner`] binds both to a PostgreSQL pool.

pub mod applicator;
pub mod catalog;
pub mod definitions;
pub mod discovery;
pub mod postgres;
pub mod runner;
pub mod scaffold;
pub mod store;

pub use applicator::{
    force_version, no_change, plan, read_version, PlannedStep, StepApplicator,
};
pub use catalog::{Catalog, MigrationSource};
pub use definitions::*;
pub use discovery::{discover, version_from_file_name, Discovery};
pub use postgres::PgVersionStore;
pub use runner::MigrationRunner;
pub use scaffold::{create_migration_pair, MigrationPair};
pub use store::{MemoryVersionStore, VersionStore};
