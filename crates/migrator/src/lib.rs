//! # stepwise-migrator
//!
//! Applies ordered, versioned SQL scripts to a PostgreSQL database. The
//! applied version is tracked in an append-only history table; a `migrate`
//! call resolves it, plans the file range up or down to the requested
//! `(major, minor)` version, loads the scripts concurrently and executes them
//! one at a time in order.
//!
//! ```no_run
//! use sqlx::{Connection, PgConnection};
//! use stepwise_migrator::{Migrator, MigratorConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = PgConnection::connect("postgres://localhost/app").await?;
//! let config = MigratorConfig::new("migrations");
//! let report = Migrator::new(&mut conn, config, 1, 2).migrate().await?;
//! println!("executed {:?}", report.executed);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod definitions;
pub mod error;
pub mod executor;
pub mod migrator;
pub mod plan;
pub mod resolver;
pub mod security;
pub mod store;

#[cfg(test)]
mod testing;


pub use database::MigrationDatabase;
pub use definitions::*;
pub use error::{MigrationError, MigrationResult};
pub use migrator::{MigrationStatus, Migrator};
pub use plan::MigrationPlan;
pub use store::{ScriptIndex, ScriptName};
