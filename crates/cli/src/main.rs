mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use commands::migrate;
use config::{AppConfig, LoggingConfig};

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Apply versioned SQL migrations to PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move the schema up or down to a version
    Migrate {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show current and target versions without executing anything
    Status {
        #[command(flatten)]
        target: TargetArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Target major version
    #[arg(long, default_value_t = 0)]
    major: u32,

    /// Target minor version
    #[arg(long, default_value_t = 0)]
    minor: u32,

    /// Directory holding NNNN.MM.mm.<up|down>.sql scripts (env: MIGRATIONS_PATH)
    #[arg(long)]
    path: Option<PathBuf>,

    /// History table name (env: MIGRATIONS_TABLE)
    #[arg(long)]
    table: Option<String>,

    /// PostgreSQL connection URL (env: DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Run each script in the same transaction as its history row
    #[arg(long)]
    transactional: bool,
}

impl TargetArgs {
    fn app_config(&self) -> anyhow::Result<AppConfig> {
        let config = AppConfig::from_env(self.database_url.clone())?
            .with_overrides(self.path.clone(), self.table.clone())
            .transactional(self.transactional);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&LoggingConfig::from_env()?)?;

    match cli.command {
        Commands::Migrate { target } => {
            let config = target.app_config()?;
            migrate::run(&config, target.major, target.minor).await?;
        }
        Commands::Status { target, json } => {
            let config = target.app_config()?;
            migrate::status(&config, target.major, target.minor, json).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate_flags() {
        let cli = Cli::try_parse_from([
            "stepwise", "migrate", "--major", "1", "--minor", "3", "--path", "db", "--table", "history",
        ])
        .unwrap();

        match cli.command {
            Commands::Migrate { target } => {
                assert_eq!((target.major, target.minor), (1, 3));
                assert_eq!(target.path, Some(PathBuf::from("db")));
                assert_eq!(target.table.as_deref(), Some("history"));
                assert!(!target.transactional);
            }
            _ => panic!("expected migrate"),
        }
    }

    #[test]
    fn test_parse_transactional_flag() {
        let cli = Cli::try_parse_from(["stepwise", "status", "--transactional", "--json"]).unwrap();

        match cli.command {
            Commands::Status { target, json } => {
                assert!(target.transactional);
                assert!(json);
            }
            _ => panic!("expected status"),
        }
    }

    #[test]
    fn test_negative_version_rejected() {
        assert!(Cli::try_parse_from(["stepwise", "migrate", "--major", "-1"]).is_err());
    }
}
