//! Migration Definitions - Core types shared by the migration engine
//!
//! Defines version points, directions, configuration, the migrator state
//! machine and the reports returned to callers.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, MigrationResult};
use crate::security::validate_identifier;

/// Default name of the history table
pub const DEFAULT_HISTORY_TABLE: &str = "migrations_history";

/// Default migrations directory
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// A schema version point
///
/// `file_number` is the position of the step in the migrations directory
/// index. It is always derived from the index, never supplied by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Migration {
    pub major: u32,
    pub minor: u32,
    pub file_number: u32,
}

impl Migration {
    pub fn new(major: u32, minor: u32, file_number: u32) -> Self {
        Self {
            major,
            minor,
            file_number,
        }
    }

    /// The state before any step has been applied
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.file_number == 0
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02} (file {:04})", self.major, self.minor, self.file_number)
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply steps (run `up` scripts) in ascending order
    Up,
    /// Revert steps (run `down` scripts) in descending order
    Down,
}

impl Direction {
    /// Marker used in script filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step script reaches the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    /// Script runs on the bare connection, the ledger row is written
    /// afterwards in its own transaction. Allows statements Postgres refuses
    /// inside a transaction block (`CREATE INDEX CONCURRENTLY`, `VACUUM`).
    #[default]
    Direct,
    /// Script and ledger row commit together or not at all
    Transactional,
}

impl StepMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepMode::Direct => "direct",
            StepMode::Transactional => "transactional",
        }
    }
}

impl fmt::Display for StepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the migrator
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Directory holding `NNNN.MM.mm.<up|down>.sql` scripts
    pub migrations_dir: PathBuf,
    /// Table name for the applied-version ledger
    pub history_table: String,
    pub step_mode: StepMode,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
            step_mode: StepMode::default(),
        }
    }
}

impl MigratorConfig {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            ..Self::default()
        }
    }

    /// Use a custom history table; an empty name keeps the default
    pub fn with_history_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !table.is_empty() {
            self.history_table = table;
        }
        self
    }

    pub fn with_step_mode(mut self, mode: StepMode) -> Self {
        self.step_mode = mode;
        self
    }

    pub fn validate(&self) -> MigrationResult<()> {
        const OP: &str = "migrator.config";

        validate_identifier(&self.history_table)
            .map_err(|reason| MigrationError::configuration(OP, reason))?;

        if self.migrations_dir.as_os_str().is_empty() {
            return Err(MigrationError::configuration(
                OP,
                "migrations directory cannot be empty",
            ));
        }

        Ok(())
    }
}

/// Lifecycle of a single `migrate` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigratorState {
    Uninitialized,
    /// Current version known
    Resolved,
    /// Range computed
    Planned,
    Executing,
    Succeeded,
    Failed,
}

impl fmt::Display for MigratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigratorState::Uninitialized => "uninitialized",
            MigratorState::Resolved => "resolved",
            MigratorState::Planned => "planned",
            MigratorState::Executing => "executing",
            MigratorState::Succeeded => "succeeded",
            MigratorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful `migrate` call
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Direction of the executed range, `None` for a no-op
    pub direction: Option<Direction>,
    /// File numbers executed, in execution order
    pub executed: Vec<u32>,
    /// Version before the call
    pub from: Migration,
    /// Version after the call
    pub to: Migration,
    /// Whether the history table was missing when the call started
    pub bootstrapped: bool,
    pub started_at: DateTime<Utc>,
    pub execution_time_ms: u128,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}
