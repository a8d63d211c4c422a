//! Version Resolver - Reads the applied version from the history table

use crate::database::MigrationDatabase;
use crate::definitions::Migration;
use crate::error::{MigrationError, MigrationResult};

/// Whether the history table exists; a missing table is not an error
pub async fn table_exists<D>(db: &mut D, table: &str) -> MigrationResult<bool>
where
    D: MigrationDatabase + ?Sized,
{
    const OP: &str = "migrator.table_exists";

    db.history_table_exists(table)
        .await
        .map_err(|e| MigrationError::storage(OP, e))
}

/// Most recently applied version, ordered by `date_applied`
pub async fn current_version<D>(db: &mut D, table: &str) -> MigrationResult<Migration>
where
    D: MigrationDatabase + ?Sized,
{
    const OP: &str = "migrator.current_version";

    db.latest_version(table)
        .await
        .map_err(|e| MigrationError::storage(OP, e))?
        .ok_or_else(|| MigrationError::NotFound {
            op: OP,
            table: table.to_string(),
        })
}

/// Current version plus whether the schema is being bootstrapped
///
/// Without a history table the current version is the zero migration and no
/// history query is issued.
pub async fn resolve_current<D>(db: &mut D, table: &str) -> MigrationResult<(Migration, bool)>
where
    D: MigrationDatabase + ?Sized,
{
    if !table_exists(db, table).await? {
        tracing::info!(table, "history table missing, starting from the empty schema");
        return Ok((Migration::zero(), true));
    }

    let current = current_version(db, table).await?;
    tracing::debug!(table, %current, "resolved applied version");
    Ok((current, false))
}
