//! Migrator - Orchestrates a single `migrate` call
//!
//! Runs the state machine
//! `Uninitialized -> Resolved -> Planned -> Executing -> {Succeeded, Failed}`
//! against a borrowed database handle. The handle's lifecycle stays with the
//! caller. Concurrent calls against the same history table are not guarded.

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::Instrument;

use crate::database::MigrationDatabase;
use crate::definitions::{Migration, MigrationReport, MigratorConfig, MigratorState};
use crate::error::MigrationResult;
use crate::executor::{execute_scripts, load_scripts};
use crate::plan::{plan, resolve_target, MigrationPlan};
use crate::resolver::resolve_current;
use crate::store::ScriptIndex;

/// Snapshot of where the schema is and what `migrate` would run
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub current: Migration,
    pub target: Migration,
    pub bootstrapped: bool,
    pub pending: Option<MigrationPlan>,
    /// File numbers `migrate` would execute, in order
    pub steps: Vec<u32>,
    /// Newest step available in the directory
    pub latest: Option<Migration>,
}

struct Resolution {
    index: ScriptIndex,
    current: Migration,
    target: Migration,
    bootstrapped: bool,
}

/// Moves the schema to a target `(major, minor)` version
pub struct Migrator<'db, D: MigrationDatabase + ?Sized> {
    db: &'db mut D,
    config: MigratorConfig,
    current: Migration,
    target: Migration,
    state: MigratorState,
}

impl<'db, D: MigrationDatabase + ?Sized> Migrator<'db, D> {
    /// Create a migrator; the target file number is resolved during `migrate`
    pub fn new(db: &'db mut D, config: MigratorConfig, major: u32, minor: u32) -> Self {
        Self {
            db,
            config,
            current: Migration::zero(),
            target: Migration::new(major, minor, 0),
            state: MigratorState::Uninitialized,
        }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Last version known to be applied; after a failure, the last step that succeeded
    pub fn current_version(&self) -> Migration {
        self.current
    }

    pub fn target_version(&self) -> Migration {
        self.target
    }

    pub fn state(&self) -> MigratorState {
        self.state
    }

    fn transition(&mut self, next: MigratorState) {
        tracing::debug!(from = %self.state, to = %next, "migrator state change");
        self.state = next;
    }

    /// Move the schema to the target version
    ///
    /// Steps already applied before a failure stay applied; the error names
    /// the failing file and `current_version` reports the last success.
    pub async fn migrate(&mut self) -> MigrationResult<MigrationReport> {
        self.state = MigratorState::Uninitialized;

        let span = tracing::info_span!(
            "migrate",
            table = %self.config.history_table,
            mode = %self.config.step_mode,
            target_major = self.target.major,
            target_minor = self.target.minor
        );

        match self.run().instrument(span).await {
            Ok(report) => {
                self.transition(MigratorState::Succeeded);
                Ok(report)
            }
            Err(err) => {
                self.transition(MigratorState::Failed);
                tracing::error!(error = %err, current = %self.current, "migration failed");
                Err(err)
            }
        }
    }

    async fn run(&mut self) -> MigrationResult<MigrationReport> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        let Resolution {
            index,
            current,
            target,
            bootstrapped,
        } = self.resolve().await?;
        let from = current;

        let Some(plan) = plan(&current, &target) else {
            self.transition(MigratorState::Planned);
            tracing::info!(version = %current, "schema already at target version");
            return Ok(MigrationReport {
                direction: None,
                executed: Vec::new(),
                from,
                to: current,
                bootstrapped,
                started_at,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        };

        let steps = plan.validate(&index)?;
        self.transition(MigratorState::Planned);
        tracing::info!(
            direction = %plan.direction,
            first = plan.first,
            last = plan.last,
            steps = steps.len(),
            from = %current,
            to = %target,
            "planned migration range"
        );

        let scripts = load_scripts(&index, plan.direction, &steps).await?;

        self.transition(MigratorState::Executing);
        let executed = execute_scripts(
            &mut *self.db,
            &self.config.history_table,
            &index,
            scripts,
            self.config.step_mode,
            &mut self.current,
        )
        .await?;

        Ok(MigrationReport {
            direction: Some(plan.direction),
            executed,
            from,
            to: self.current,
            bootstrapped,
            started_at,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Index the directory and resolve both ends of the move
    async fn resolve(&mut self) -> MigrationResult<Resolution> {
        self.config.validate()?;

        let index = ScriptIndex::load(&self.config.migrations_dir)?;
        let (current, bootstrapped) =
            resolve_current(&mut *self.db, &self.config.history_table).await?;
        self.current = current;
        self.transition(MigratorState::Resolved);

        let target = resolve_target(&index, self.target.major, self.target.minor)?;
        self.target = target;

        Ok(Resolution {
            index,
            current,
            target,
            bootstrapped,
        })
    }

    /// Resolve current and target versions without executing anything
    pub async fn status(&mut self) -> MigrationResult<MigrationStatus> {
        let Resolution {
            index,
            current,
            target,
            bootstrapped,
        } = self.resolve().await?;

        let pending = plan(&current, &target);
        let steps = match &pending {
            Some(plan) => plan.validate(&index)?,
            None => Vec::new(),
        };

        Ok(MigrationStatus {
            current,
            target,
            bootstrapped,
            pending,
            steps,
            latest: index.latest(),
        })
    }
}
