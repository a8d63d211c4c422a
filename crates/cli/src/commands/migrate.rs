use anyhow::{Context, Result};
use sqlx::{Connection, PgConnection};
use stepwise_migrator::Migrator;

use crate::config::AppConfig;

/// Open the connection the migrator borrows; closing it stays with the caller
async fn connect(config: &AppConfig) -> Result<PgConnection> {
    let masked = config.masked_database_url();
    let mut conn = PgConnection::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to {}", masked))?;
    conn.ping()
        .await
        .with_context(|| format!("database at {} did not answer ping", masked))?;

    tracing::debug!(database = %masked, "connected");
    Ok(conn)
}

pub async fn run(config: &AppConfig, major: u32, minor: u32) -> Result<()> {
    let mut conn = connect(config).await?;

    let result = Migrator::new(&mut conn, config.migrator_config(), major, minor)
        .migrate()
        .await;
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close database connection");
    }

    let report = result.context("migration failed")?;
    if report.is_noop() {
        println!("Already at version {}", report.to);
    } else {
        println!(
            "Migrated {} -> {} ({} step(s) {}, {} ms)",
            report.from,
            report.to,
            report.executed.len(),
            report.direction.map(|d| d.to_string()).unwrap_or_default(),
            report.execution_time_ms
        );
    }
    Ok(())
}

pub async fn status(config: &AppConfig, major: u32, minor: u32, json: bool) -> Result<()> {
    let mut conn = connect(config).await?;

    let result = Migrator::new(&mut conn, config.migrator_config(), major, minor)
        .status()
        .await;
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close database connection");
    }

    let status = result.context("failed to resolve migration status")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Migration Status:");
    println!("================");
    if status.bootstrapped {
        println!("  current: none (history table '{}' missing)", config.history_table);
    } else {
        println!("  current: {}", status.current);
    }
    println!("  target:  {}", status.target);
    if let Some(latest) = status.latest {
        println!("  latest:  {}", latest);
    }

    match status.pending {
        Some(plan) => {
            let steps: Vec<String> = status.steps.iter().map(|n| format!("{:04}", n)).collect();
            println!("  pending: {} {}", plan.direction, steps.join(", "));
        }
        None => println!("  pending: none"),
    }
    Ok(())
}
