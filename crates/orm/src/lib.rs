//! # sqlstep-orm: version-ordered SQL migrations
//!
//! Discovers `<version>_<name>.<up|down>.sql` scripts, orders them by
//! version and applies or reverts a bounded number of steps against the
//! `{version, dirty}` marker stored in the target database.

pub mod database;
pub mod error;
pub mod migrations;

pub use error::*;
pub use migrations::*;
