//! Script Executor - Loads a planned range and applies it in order
//!
//! Loading fans out one task per file and fans back in before anything runs,
//! so concurrency only affects load latency. Execution is strictly
//! sequential on the borrowed database handle and stops at the first failure.

use std::path::PathBuf;
use std::time::Instant;

use crate::database::MigrationDatabase;
use crate::definitions::{Direction, Migration, StepMode};
use crate::error::{MigrationError, MigrationResult};
use crate::store::ScriptIndex;

/// A script body ready to execute
#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub file_number: u32,
    pub direction: Direction,
    pub path: PathBuf,
    pub sql: String,
}

/// Read the scripts for `steps` concurrently, returned in `steps` order
///
/// Every read is awaited before returning, including after a failure; the
/// first error in execution order is reported.
pub async fn load_scripts(
    index: &ScriptIndex,
    direction: Direction,
    steps: &[u32],
) -> MigrationResult<Vec<LoadedScript>> {
    const OP: &str = "migrator.load_scripts";

    let mut paths = Vec::with_capacity(steps.len());
    for &file_number in steps {
        let path = index.script_path(file_number, direction).ok_or_else(|| {
            MigrationError::planning(
                OP,
                format!("file {:04} has no {} script", file_number, direction),
            )
        })?;
        paths.push((file_number, path.to_path_buf()));
    }

    let handles: Vec<_> = paths
        .into_iter()
        .map(|(file_number, path)| {
            tokio::spawn(async move {
                let sql = tokio::fs::read_to_string(&path).await;
                (file_number, path, sql)
            })
        })
        .collect();

    let mut scripts = Vec::with_capacity(handles.len());
    let mut first_error = None;

    for handle in handles {
        match handle.await {
            Ok((file_number, path, Ok(sql))) => {
                tracing::debug!(file = file_number, path = %path.display(), bytes = sql.len(), "loaded script");
                scripts.push(LoadedScript {
                    file_number,
                    direction,
                    path,
                    sql,
                });
            }
            Ok((_, path, Err(e))) => {
                first_error.get_or_insert_with(|| MigrationError::file_system(OP, path, e));
            }
            Err(join_error) => {
                first_error.get_or_insert_with(|| {
                    MigrationError::file_system(
                        OP,
                        index.dir(),
                        std::io::Error::new(std::io::ErrorKind::Other, join_error.to_string()),
                    )
                });
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(scripts),
    }
}

/// Apply `scripts` one at a time, advancing `current` after each step
///
/// Returns the executed file numbers. On failure `current` names the last
/// step that succeeded and nothing after the failing file has run.
pub async fn execute_scripts<D>(
    db: &mut D,
    table: &str,
    index: &ScriptIndex,
    scripts: Vec<LoadedScript>,
    mode: StepMode,
    current: &mut Migration,
) -> MigrationResult<Vec<u32>>
where
    D: MigrationDatabase + ?Sized,
{
    const OP: &str = "migrator.execute_scripts";
    let mut executed = Vec::with_capacity(scripts.len());

    for script in scripts {
        let reached = match script.direction {
            Direction::Up => index.version_at(script.file_number).ok_or_else(|| {
                MigrationError::planning(OP, format!("file {:04} is not indexed", script.file_number))
            })?,
            Direction::Down => index.previous(script.file_number),
        };

        let started = Instant::now();
        if let Err(source) = db.apply_step(table, &script.sql, &reached, mode).await {
            tracing::warn!(
                file = script.file_number,
                direction = %script.direction,
                last_applied = %current,
                error = %source,
                "migration step failed"
            );
            return Err(MigrationError::Execution {
                op: OP,
                file_number: script.file_number,
                direction: script.direction,
                source,
            });
        }

        *current = reached;
        executed.push(script.file_number);
        tracing::info!(
            file = script.file_number,
            direction = %script.direction,
            version = %reached,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "applied migration step"
        );
    }

    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDatabase;
    use std::fs;
    use tempfile::TempDir;

    fn scenario() -> (TempDir, ScriptIndex) {
        let temp_dir = TempDir::new().unwrap();
        for name in [
            "0001.00.00.up.sql",
            "0001.00.00.down.sql",
            "0002.00.00.up.sql",
            "0002.00.00.down.sql",
            "0003.00.01.up.sql",
            "0003.00.01.down.sql",
        ] {
            fs::write(temp_dir.path().join(name), format!("-- {}", name)).unwrap();
        }
        let index = ScriptIndex::load(temp_dir.path()).unwrap();
        (temp_dir, index)
    }

    #[tokio::test]
    async fn test_load_preserves_execution_order() {
        let (_dir, index) = scenario();

        let scripts = load_scripts(&index, Direction::Down, &[3, 2, 1]).await.unwrap();
        let order: Vec<_> = scripts.iter().map(|s| s.file_number).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(scripts[0].sql, "-- 0003.00.01.down.sql");
        assert!(scripts.iter().all(|s| s.direction == Direction::Down));
    }

    #[tokio::test]
    async fn test_load_failure_aborts_range() {
        let (dir, index) = scenario();
        fs::remove_file(dir.path().join("0002.00.00.up.sql")).unwrap();

        let err = load_scripts(&index, Direction::Up, &[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, MigrationError::FileSystem { .. }));
        assert!(err.to_string().contains("0002.00.00.up.sql"));
    }

    #[tokio::test]
    async fn test_execute_advances_current_per_step() {
        let (_dir, index) = scenario();
        let mut db = MemoryDatabase::new();
        let scripts = load_scripts(&index, Direction::Up, &[1, 2, 3]).await.unwrap();
        let mut current = Migration::zero();

        let executed = execute_scripts(
            &mut db,
            "migrations_history",
            &index,
            scripts,
            StepMode::Direct,
            &mut current,
        )
        .await
        .unwrap();

        assert_eq!(executed, vec![1, 2, 3]);
        assert_eq!(current, Migration::new(0, 1, 3));
        assert_eq!(
            db.history().unwrap(),
            &[Migration::new(0, 0, 1), Migration::new(0, 0, 2), Migration::new(0, 1, 3)]
        );
    }

    #[tokio::test]
    async fn test_execute_stops_at_first_failure() {
        let (_dir, index) = scenario();
        let mut db = MemoryDatabase::with_history(vec![Migration::new(0, 1, 3)]);
        db.fail_on("0002.00.00.down.sql");
        let scripts = load_scripts(&index, Direction::Down, &[3, 2, 1]).await.unwrap();
        let mut current = Migration::new(0, 1, 3);

        let err = execute_scripts(
            &mut db,
            "migrations_history",
            &index,
            scripts,
            StepMode::Direct,
            &mut current,
        )
        .await
        .unwrap_err();

        assert_eq!(err.failed_file(), Some(2));
        assert_eq!(db.executed(), &["-- 0003.00.01.down.sql".to_string()]);
        assert_eq!(current, Migration::new(0, 0, 2));
    }
}
