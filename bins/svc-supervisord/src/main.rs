use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use svc_supervisor::ServiceManager;

/// Service supervisor daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service registry file (YAML)
    #[arg(short, long, value_name = "FILE", default_value = "services.yaml")]
    registry: String,

    /// Runtime state snapshot file (JSON)
    #[arg(short, long, value_name = "FILE", default_value = "service-state.json")]
    state: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Manager heartbeat interval in seconds
    #[arg(long, default_value_t = 5)]
    heartbeat: u64,

    /// Run duration in seconds (for testing)
    #[arg(long)]
    run_duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug)?;

    info!("Starting service supervisor");
    info!("Registry file: {}", args.registry);

    let manager = ServiceManager::new(&args.registry);
    manager
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!("Initialization failed: {}", e))?;
    info!(
        "Managing {} service(s): {:?}",
        manager.get_service_names().len(),
        manager.get_service_names()
    );

    manager.set_status_change_callback(Arc::new(|name, old, new| {
        info!("Service '{}' changed state: {} -> {}", name, old, new);
    }));
    manager.set_error_callback(Arc::new(|name, message| {
        error!("Service '{}' error: {}", name, message);
    }));

    manager.start_monitoring(Duration::from_secs(args.heartbeat));

    if let Err(e) = manager.start_all_services().await {
        // Individual services may legitimately fail to start; keep
        // supervising whatever did come up.
        warn!("Startup incomplete: {}", e);
    } else {
        info!("All services started");
    }

    if let Some(duration) = args.run_duration {
        info!("Running for {} seconds (test mode)", duration);
        tokio::time::sleep(Duration::from_secs(duration)).await;
    } else {
        wait_for_shutdown_signal().await;
    }

    info!("Shutting down...");
    if let Err(e) = manager.save_service_state(&args.state).await {
        warn!("Could not save state snapshot: {}", e);
    }
    manager
        .shutdown()
        .await
        .map_err(|e| anyhow::anyhow!("Shutdown failed: {}", e))?;
    info!("Service supervisor shut down");

    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };
        let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGINT handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(windows)]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}
