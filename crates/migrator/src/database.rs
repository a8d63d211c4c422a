//! Database seam for the migrator
//!
//! [`MigrationDatabase`] is the borrowed handle a `migrate` call works
//! against. The PostgreSQL implementation lives on `sqlx::PgConnection`, so
//! callers keep ownership of the connection and its lifecycle.

use async_trait::async_trait;
use sqlx::{Connection, Executor, PgConnection, Row};

use crate::definitions::{Migration, StepMode};
use crate::security::escape_identifier;

/// Operations the migrator needs from the database
#[async_trait]
pub trait MigrationDatabase: Send {
    /// Whether the history table exists in the default schema
    async fn history_table_exists(&mut self, table: &str) -> Result<bool, sqlx::Error>;

    /// Most recently applied version, `None` when the table is empty
    async fn latest_version(&mut self, table: &str) -> Result<Option<Migration>, sqlx::Error>;

    /// Run one script verbatim and record `reached` in the history table
    ///
    /// The history table is created when missing after the script has run.
    /// With [`StepMode::Transactional`] script and ledger row share one
    /// transaction; with [`StepMode::Direct`] only the ledger write does.
    async fn apply_step(
        &mut self,
        table: &str,
        script: &str,
        reached: &Migration,
        mode: StepMode,
    ) -> Result<(), sqlx::Error>;
}

/// SQL text for the history table
pub mod history_sql {
    use super::escape_identifier;

    /// Catalog lookup, `$1` is the unquoted table name
    pub fn table_exists() -> &'static str {
        "SELECT EXISTS (\n    \
            SELECT 1 FROM information_schema.tables\n    \
            WHERE table_schema = current_schema()\n    \
            AND table_name = $1\n\
        )"
    }

    pub fn latest_version(table: &str) -> String {
        format!(
            "SELECT major_version, minor_version, file_number FROM {} \
             ORDER BY date_applied DESC LIMIT 1",
            escape_identifier(table)
        )
    }

    pub fn create_table(table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                major_version INTEGER NOT NULL,\n    \
                minor_version INTEGER NOT NULL,\n    \
                file_number INTEGER NOT NULL,\n    \
                date_applied TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
            )",
            escape_identifier(table)
        )
    }

    /// Ledger append, binds major, minor and file number
    pub fn record_version(table: &str) -> String {
        format!(
            "INSERT INTO {} (major_version, minor_version, file_number, date_applied) \
             VALUES ($1, $2, $3, clock_timestamp())",
            escape_identifier(table)
        )
    }
}

fn to_column(value: u32) -> Result<i32, sqlx::Error> {
    i32::try_from(value)
        .map_err(|_| sqlx::Error::Protocol(format!("version component {} overflows INTEGER", value)))
}

fn from_column(row: &sqlx::postgres::PgRow, column: &str) -> Result<u32, sqlx::Error> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

#[async_trait]
impl MigrationDatabase for PgConnection {
    async fn history_table_exists(&mut self, table: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(history_sql::table_exists())
            .bind(table)
            .fetch_one(&mut *self)
            .await
    }

    async fn latest_version(&mut self, table: &str) -> Result<Option<Migration>, sqlx::Error> {
        let sql = history_sql::latest_version(table);
        let row = sqlx::query(&sql).fetch_optional(&mut *self).await?;

        row.map(|row| {
            Ok(Migration {
                major: from_column(&row, "major_version")?,
                minor: from_column(&row, "minor_version")?,
                file_number: from_column(&row, "file_number")?,
            })
        })
        .transpose()
    }

    async fn apply_step(
        &mut self,
        table: &str,
        script: &str,
        reached: &Migration,
        mode: StepMode,
    ) -> Result<(), sqlx::Error> {
        // Unprepared: the script may hold several statements
        if mode == StepMode::Direct {
            (&mut *self).execute(script).await?;
        }

        let mut transaction = self.begin().await?;
        if mode == StepMode::Transactional {
            (&mut *transaction).execute(script).await?;
        }

        let create_sql = history_sql::create_table(table);
        (&mut *transaction).execute(create_sql.as_str()).await?;

        let record_sql = history_sql::record_version(table);
        sqlx::query(&record_sql)
            .bind(to_column(reached.major)?)
            .bind(to_column(reached.minor)?)
            .bind(to_column(reached.file_number)?)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_sql_quotes_table() {
        let sql = history_sql::latest_version("migrations_history");
        assert!(sql.contains("FROM \"migrations_history\""));
        assert!(sql.contains("ORDER BY date_applied DESC LIMIT 1"));

        let sql = history_sql::record_version("migrations_history");
        assert!(sql.starts_with("INSERT INTO \"migrations_history\""));
        assert!(sql.contains("$3"));
    }

    #[test]
    fn test_create_table_sql_columns() {
        let sql = history_sql::create_table("schema_versions");
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"schema_versions\""));
        for column in ["major_version", "minor_version", "file_number", "date_applied"] {
            assert!(sql.contains(column), "missing column {}", column);
        }
    }

    #[test]
    fn test_table_exists_uses_bound_name() {
        assert!(history_sql::table_exists().contains("table_name = $1"));
    }

    #[test]
    fn test_to_column_bounds() {
        assert_eq!(to_column(9999).unwrap(), 9999);
        assert!(to_column(u32::MAX).is_err());
    }
}
