//! In-memory `MigrationDatabase` for tests

use async_trait::async_trait;

use crate::database::MigrationDatabase;
use crate::definitions::{Migration, StepMode};

/// Records executed scripts and ledger rows
///
/// `history == None` models a missing history table. A step whose script
/// contains the configured failure marker is rejected without side effects,
/// like a rolled back transaction.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    history: Option<Vec<Migration>>,
    executed: Vec<String>,
    fail_marker: Option<String>,
    catalog_failure: Option<String>,
    history_failure: Option<String>,
    history_queries: usize,
    modes: Vec<StepMode>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(rows: Vec<Migration>) -> Self {
        Self {
            history: Some(rows),
            ..Self::default()
        }
    }

    /// Reject any script containing `marker`
    pub fn fail_on(&mut self, marker: &str) {
        self.fail_marker = Some(marker.to_string());
    }

    pub fn fail_catalog(&mut self, message: &str) {
        self.catalog_failure = Some(message.to_string());
    }

    /// Fail every history read with `message`
    pub fn fail_history(&mut self, message: &str) {
        self.history_failure = Some(message.to_string());
    }

    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn history(&self) -> Option<&[Migration]> {
        self.history.as_deref()
    }

    pub fn history_queries(&self) -> usize {
        self.history_queries
    }

    /// Step mode of every applied step, in order
    pub fn modes(&self) -> &[StepMode] {
        &self.modes
    }
}

#[async_trait]
impl MigrationDatabase for MemoryDatabase {
    async fn history_table_exists(&mut self, _table: &str) -> Result<bool, sqlx::Error> {
        if let Some(message) = &self.catalog_failure {
            return Err(sqlx::Error::Protocol(message.clone()));
        }
        Ok(self.history.is_some())
    }

    async fn latest_version(&mut self, _table: &str) -> Result<Option<Migration>, sqlx::Error> {
        self.history_queries += 1;
        if let Some(message) = &self.history_failure {
            return Err(sqlx::Error::Protocol(message.clone()));
        }
        match &self.history {
            Some(rows) => Ok(rows.last().copied()),
            None => Err(sqlx::Error::Protocol(
                "relation \"migrations_history\" does not exist".to_string(),
            )),
        }
    }

    async fn apply_step(
        &mut self,
        _table: &str,
        script: &str,
        reached: &Migration,
        mode: StepMode,
    ) -> Result<(), sqlx::Error> {
        if let Some(marker) = &self.fail_marker {
            if script.contains(marker.as_str()) {
                return Err(sqlx::Error::Protocol(format!("rejected script: {}", marker)));
            }
        }

        self.executed.push(script.to_string());
        self.modes.push(mode);
        self.history.get_or_insert_with(Vec::new).push(*reached);
        Ok(())
    }
}
