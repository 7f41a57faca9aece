//! Cache warmer command-line entry point
//!
//! Five subcommands: `init` writes a default config, `status` prints the
//! dashboard, `once` runs a single pass, `run` loops until signalled, and
//! `flush` marks an external cache flush so every URL re-warms next pass.

use cache_warmer::config::{default_config_template, load_config, AppConfig};
use cache_warmer::output::{print_flush_confirmation, print_status};
use cache_warmer::{CacheWarmer, WarmStore, WarmerError};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cache-warmer")]
#[command(version)]
#[command(about = "Keeps a website's HTTP cache warm from its sitemaps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a default config.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,

        /// Path to config TOML
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Show dashboard with current status
    Status {
        /// Number of recent URLs to show
        #[arg(long, default_value_t = 10)]
        recent: u32,

        /// Number of failed URLs to show
        #[arg(long, default_value_t = 10)]
        failed: u32,

        /// Path to config TOML
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Run a single pass and exit
    Once {
        /// Path to config TOML
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Run warmer continuously
    Run {
        /// Path to config TOML
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Mark cache flush (forces rewarm)
    Flush {
        /// Optional reason for flush
        #[arg(long)]
        reason: Option<String>,

        /// Path to config TOML
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { force, config } => handle_init(&config, force),
        Commands::Status {
            recent,
            failed,
            config,
        } => handle_status(&config, recent, failed),
        Commands::Once { config } => handle_run(&config, true).await,
        Commands::Run { config } => handle_run(&config, false).await,
        Commands::Flush { reason, config } => handle_flush(&config, reason.as_deref()),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// Writes the default config, sizing `max_load` to the host CPU count
fn handle_init(config_path: &Path, force: bool) -> Result<(), WarmerError> {
    if config_path.exists() && !force {
        println!("Config already exists: {}", config_path.display());
        return Ok(());
    }

    let cpus = num_cpus::get();
    let max_load = ((cpus as f64) - 1.0).max(1.0);

    std::fs::write(config_path, default_config_template(max_load))?;

    println!("Wrote config template: {}", config_path.display());
    println!("Detected {} CPU(s), set max_load = {:.1}", cpus, max_load);
    Ok(())
}

fn handle_status(config_path: &Path, recent: u32, failed: u32) -> Result<(), WarmerError> {
    let config = load_config(config_path)?;
    let store = WarmStore::open(Path::new(&config.app.db_path))?;

    print_status(
        &store,
        recent,
        failed,
        &config_path.display().to_string(),
        &config.app.db_path,
    )
}

fn handle_flush(config_path: &Path, reason: Option<&str>) -> Result<(), WarmerError> {
    let config = load_config(config_path)?;
    let store = WarmStore::open(Path::new(&config.app.db_path))?;

    let reason = match reason {
        Some(r) if !r.is_empty() => r,
        _ => "manual flush",
    };
    store.mark_flush(reason)?;

    print_flush_confirmation(&store, reason)
}

async fn handle_run(config_path: &Path, once: bool) -> Result<(), WarmerError> {
    let config = load_config(config_path)?;
    setup_logging(&config.app)?;

    let store = Arc::new(WarmStore::open(Path::new(&config.app.db_path))?);
    let warmer = CacheWarmer::new(config.clone(), Arc::clone(&store))?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    if once {
        tracing::info!(
            "Starting cache warmer ONCE. db={} concurrency={} max_load={:.2}",
            config.app.db_path,
            config.http.concurrency,
            config.load.max_load
        );

        let summary = match warmer.run_once(&cancel).await {
            Ok(summary) => summary,
            Err(err) if err.is_cancelled() => Default::default(),
            Err(err) => return Err(err),
        };

        let stats = store.stats()?;
        tracing::info!(
            "Summary: ok={} fail={} warmed_total={} last_flush_utc={}",
            summary.ok,
            summary.fail,
            stats.warmed_total,
            stats.last_flush_utc.as_deref().unwrap_or("")
        );
    } else {
        tracing::info!(
            "Starting cache warmer LOOP={} interval={}s db={} concurrency={} max_load={:.2}",
            config.app.loop_enabled,
            config.app.loop_interval_seconds,
            config.app.db_path,
            config.http.concurrency,
            config.load.max_load
        );
        warmer.run_loop(&cancel).await?;
    }

    tracing::info!("Stopped.");
    Ok(())
}

/// Sets up tracing: stdout always, plus an append-mode file when configured
fn setup_logging(app: &AppConfig) -> Result<(), WarmerError> {
    let filter = match app.log_level.to_ascii_uppercase().as_str() {
        "ERROR" => "error",
        "WARN" => "warn",
        "DEBUG" => "debug",
        "TRACE" => "trace",
        _ => "info",
    };

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(stdout_layer);

    if app.log_file.is_empty() {
        registry.init();
        return Ok(());
    }

    let log_path = Path::new(&app.log_file);
    if let Some(dir) = log_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    registry
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();
    Ok(())
}

/// Cancels the token once on SIGINT or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Received stop signal, shutting down...");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
