use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use archive_infrastructure::{ArchiveConfig, CONFIG_PATH_ENV};

#[derive(Parser, Debug)]
#[command(name = "sui-archive")]
#[command(about = "Archive Sui events to Parquet files or ClickHouse", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    /// Print the resolved run plan and exit without fetching anything
    #[arg(long)]
    check: bool,
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Logs to stdout, or to a daily rolling file under `log_dir` when one is configured.
fn init_tracing(log_dir: Option<&str>) -> Option<WorkerGuard> {
    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "sui-archive.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_env_filter(env_filter())
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(config) = args.config {
        std::env::set_var(CONFIG_PATH_ENV, config);
    }

    let config = ArchiveConfig::load().await;
    let log_dir = config.as_ref().ok().and_then(|config| config.log_dir.clone());
    let _guard = init_tracing(log_dir.as_deref());
    let config = config?;

    match &config.loaded_from {
        Some(path) => info!(path = %path, "config loaded"),
        None => warn!("config file not found, using defaults and environment"),
    }

    if args.check {
        let plan = config.plan()?;
        println!("{}", archive_bootstrap::describe_plan(&config, &plan));
        return Ok(());
    }

    archive_bootstrap::run(config).await
}
