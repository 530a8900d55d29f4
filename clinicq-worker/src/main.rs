use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use clinicq_config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use clinicq_core::{
    PassReport, QueueScheduler,
    store::{BoundedQueueStore, PostgresQueueStore},
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "clinicq-worker")]
#[command(about = "Keeps clinic live queues in sync with today's check-ins")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a clinicq.toml file
    #[arg(long, global = true, env = "CLINICQ_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll and reconcile until interrupted (default)
    Run,
    /// Run a single reconciliation pass and exit
    Once,
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

type WorkerStore = BoundedQueueStore<PostgresQueueStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Db(DbCommand::Migrate) => run_db_migrate(&config).await,
        Command::Once => run_once(&config).await,
        Command::Run => run_worker(&config).await,
    }
}

/// Installed before configuration loads so loader diagnostics are kept.
/// `RUST_LOG` is read from the process environment only, not the `.env`
/// file.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Pass summaries at info; override via RUST_LOG.
                "info,clinicq_core=info,clinicq_config=info,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let ConfigLoad { config, warnings } =
        ConfigLoader::with_options(ConfigLoaderOptions {
            config_path: cli.config.clone(),
            env_file: cli.env_file.clone(),
        })
        .load()
        .context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file in effect");
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    let scheduler = &config.scheduler;
    info!(
        scheduler.poll_interval_ms = scheduler.poll_interval_ms,
        scheduler.full_pass_interval_ms = scheduler.full_pass_interval_ms,
        scheduler.error_backoff_ms = scheduler.error_backoff_ms,
        scheduler.default_eta_minutes = scheduler.default_eta_minutes,
        scheduler.max_inflight_store_calls = scheduler.max_inflight_store_calls,
        scheduler.utc_offset_minutes = scheduler.utc_offset_minutes,
        "scheduler configuration in effect"
    );

    Ok(config)
}

async fn connect_store(config: &Config) -> anyhow::Result<PostgresQueueStore> {
    let database_url = config
        .database
        .url
        .as_deref()
        .ok_or_else(|| anyhow!("DATABASE_URL is required"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    PostgresQueueStore::new(pool)
        .await
        .context("queue store health check failed")
}

async fn build_scheduler(
    config: &Config,
) -> anyhow::Result<QueueScheduler<WorkerStore>> {
    let store = connect_store(config).await?;
    let bounded = BoundedQueueStore::new(
        store,
        config.scheduler.max_inflight_store_calls,
    );
    Ok(QueueScheduler::new(
        Arc::new(bounded),
        config.scheduler.clone(),
    ))
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    let store = connect_store(config).await?;
    store.migrate().await.context("database migration failed")?;
    info!("Database migrations applied successfully");
    Ok(())
}

async fn run_once(config: &Config) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(config).await?;
    let report = scheduler
        .reconcile_now()
        .await
        .context("reconciliation pass failed")?;
    ensure_clean(&report)
}

async fn run_worker(config: &Config) -> anyhow::Result<()> {
    let scheduler = build_scheduler(config).await?;
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
        signal_token.cancel();
    });

    scheduler.run(shutdown).await;
    Ok(())
}

/// Clinic failures are already logged by the pass; surface them as a
/// non-zero exit for one-shot runs.
fn ensure_clean(report: &PassReport) -> anyhow::Result<()> {
    if report.is_clean() {
        return Ok(());
    }
    Err(anyhow!(
        "{} of {} clinics were not updated",
        report.clinics_failed(),
        report.clinics_failed() + report.clinics_processed
    ))
}
