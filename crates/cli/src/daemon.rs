//! Daemon lifecycle management

use crate::emit;
use anyhow::{Context, Result};
use splitter_core::{candidate_paths, SystemConfig};
use splitter_watcher::{NativeBackend, Supervisor, WatchSettings};
use std::sync::Arc;
use tracing::{info, warn};

/// Watch every candidate directory until Ctrl-C
pub async fn run(config: &SystemConfig) -> Result<()> {
    let emitter = emit::build(config).context("Failed to set up split emitter")?;
    let supervisor = Supervisor::new(
        WatchSettings::from(config),
        Arc::new(NativeBackend::new()),
        emitter,
    );

    info!(
        "Pulse window {}ms, target file {}, split key {:#04x}",
        config.pulse_window_ms, config.target_file, config.split_key
    );

    let candidates = candidate_paths(config);
    if candidates.is_empty() {
        warn!("No directories to watch; add `paths` to the config file");
    }
    for path in candidates {
        supervisor.register_path(path);
    }

    supervisor.run(shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
