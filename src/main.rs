//! yougile-sync: export the tasks of a Yougile board into a CSV snapshot

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use yougile_sync::{Config, Exporter, Result};

/// Export the tasks of a Yougile board into a CSV snapshot
///
/// The first run exports every task. Later runs refresh open tasks and tasks with a
/// recent deadline, and keep the remaining rows of the existing snapshot.
#[derive(Parser, Debug)]
#[command(name = "yougile-sync")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "YOUGILE_CONFIG")]
    config: Option<PathBuf>,

    /// Snapshot file to create or update
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Refresh deadline-checked tasks due within this many past days
    #[arg(long)]
    deadline_days: Option<u32>,

    /// Overwrite the snapshot without keeping a backup
    #[arg(long)]
    no_backup: bool,

    /// API key
    #[arg(long, env = "YOUGILE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Board to export
    #[arg(long, env = "YOUGILE_BOARD_ID")]
    board_id: Option<String>,

    /// API base URL
    #[arg(long, env = "YOUGILE_BASE_URL")]
    base_url: Option<String>,
}

impl Cli {
    /// Configuration file settings with the command line and environment applied on top
    fn load_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(api_key) = self.api_key {
            config.api.api_key = api_key;
        }
        if let Some(board_id) = self.board_id {
            config.api.board_id = board_id;
        }
        if let Some(base_url) = self.base_url {
            config.api.base_url = base_url;
        }
        if let Some(path) = self.snapshot {
            config.snapshot.path = path;
        }
        if let Some(days) = self.deadline_days {
            config.columns.deadline_days_offset = days;
        }
        if self.no_backup {
            config.snapshot.backup = false;
        }
        Ok(config)
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    let exporter = Exporter::new(config)?;
    let summary = exporter.run().await?;

    info!(
        mode = ?summary.mode,
        rows = summary.rows_written,
        new_rows = summary.new_rows,
        carried_over = summary.carried_over,
        "Export finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.error_code(), "❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
