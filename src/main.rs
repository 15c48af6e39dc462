// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Restreamer — adaptive multi-source video restreamer.
//!
//! Usage: `restreamer` (no flags; reads `main.conf` from the working
//! directory). Exit codes: `0` clean shutdown, `1` startup failure
//! (config, router auth, or reachability).

use std::path::Path;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use restreamer::config::Config;
use restreamer::controller::RestreamerController;
use restreamer::reachability;

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_file(Path::new("main.conf")) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load main.conf");
            std::process::exit(1);
        }
    };

    info!(
        devices = config.profile.devices.len(),
        degradation_steps = config.profile.degradation_steps,
        adaptive = config.adaptive_mode.enabled,
        "starting restreamer"
    );

    let controller = match RestreamerController::new(&config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build restreamer controller");
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.verify_uplink().await {
        error!(error = %e, "router authentication failed");
        std::process::exit(1);
    }
    info!("router authentication succeeded");

    let reachable = reachability::check_connection(
        &config.connection_check.ping_ip,
        &config.connection_check.curl_url,
        Duration::from_secs(config.settings.timeout.max(1)),
    )
    .await;
    if !reachable {
        error!("startup reachability check failed");
        std::process::exit(1);
    }
    info!("startup reachability check passed");

    if let Err(e) = controller.start() {
        error!(error = %e, "failed to start restreamer controller");
        std::process::exit(1);
    }

    run_until_shutdown(&controller).await;
    controller.stop().await;
    info!("shutdown complete");
}

/// Waits for Ctrl+C or SIGTERM, printing a status snapshot every minute in
/// between — mirrors the status loop of the deployment this replaces
/// ("current signal level", "active sources", logged roughly once a minute).
async fn run_until_shutdown(controller: &RestreamerController) {
    #[cfg(unix)]
    let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };

    loop {
        #[cfg(unix)]
        let shutdown_requested = tokio::select! {
            _ = tokio::signal::ctrl_c() => true,
            _ = terminate.recv() => true,
            _ = tokio::time::sleep(STATUS_INTERVAL) => false,
        };

        #[cfg(not(unix))]
        let shutdown_requested = tokio::select! {
            _ = tokio::signal::ctrl_c() => true,
            _ = tokio::time::sleep(STATUS_INTERVAL) => false,
        };

        if shutdown_requested {
            info!("received shutdown signal, stopping…");
            return;
        }

        let status = controller.get_status();
        let active: Vec<&str> = status
            .source_active
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| name.as_str())
            .collect();
        info!(level = status.current_level, active_sources = ?active, "status");
    }
}
