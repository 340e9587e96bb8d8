use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use heartsync_core::SyncConfig;
use heartsync_session::{RandomSource, SyncController};
use heartsync_transport::LoopbackMesh;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::console::{ConsoleView, QuietView, SimulatedCamera};

const DEFAULT_ROOM: &str = "room1";
const MAX_SIMULATED_PEERS: usize = 8;

/// Local peer plus simulated peers on an in-process mesh.
///
/// # Environment
/// - `HEARTSYNC_ROOM`   room to join (default `room1`)
/// - `HEARTSYNC_CONFIG` optional JSON file with a `SyncConfig`
/// - `HEARTSYNC_PEERS`  simulated peers sharing the room (default 1, max 8)
///
/// # Flow
/// 1. Open the connection and show the local id
/// 2. Join the room; the camera is acquired and published after joining
/// 3. Broadcast a sample every `send_interval_ms`, chart received samples
/// 4. Ctrl-C leaves the room and stops the simulated peers
pub async fn run() -> Result<()> {
    let config = load_config()?;
    let room = std::env::var("HEARTSYNC_ROOM").unwrap_or_else(|_| DEFAULT_ROOM.to_string());
    let peer_count: usize = std::env::var("HEARTSYNC_PEERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
        .min(MAX_SIMULATED_PEERS);

    info!(
        "Room '{}' — history {} samples, threshold {}, interval {} ms, {} simulated peer(s)",
        room, config.history_len, config.threshold, config.send_interval_ms, peer_count
    );

    let mesh = LoopbackMesh::new();
    let (stop_tx, stop_rx) = watch::channel(false);

    // ── Simulated peers ────────────────────────────────────────────────────
    let mut handles = Vec::with_capacity(peer_count);
    for idx in 0..peer_count {
        let mut peer = SyncController::new(
            config.clone(),
            Arc::new(mesh.endpoint()),
            Arc::new(SimulatedCamera),
            QuietView::new(idx),
        );
        let mut stop = stop_rx.clone();
        let room = room.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = peer.start().await {
                warn!("Peer[{idx}] could not connect: {e}");
                return;
            }
            if let Err(e) = peer.join(&room, None).await {
                warn!("Peer[{idx}] could not join '{room}': {e}");
                return;
            }
            let mut source = RandomSource::new();
            peer.run(&mut source, async move {
                let _ = stop.changed().await;
            })
            .await;
            peer.leave().await;
        }));
    }

    // ── Local peer ─────────────────────────────────────────────────────────
    let mut local = SyncController::new(
        config,
        Arc::new(mesh.endpoint()),
        Arc::new(SimulatedCamera),
        ConsoleView::default(),
    );
    local.start().await.context("opening connection")?;
    let report = local
        .join(&room, None)
        .await
        .with_context(|| format!("joining room '{}'", room))?;
    if let Some(e) = &report.media_error {
        warn!("Joined '{}' without local video: {}", report.room, e);
    }

    info!("Streaming heartbeats — press Ctrl-C to leave.");
    let mut source = RandomSource::new();
    local
        .run(&mut source, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl-C handler unavailable: {}", e);
            }
        })
        .await;

    if let Some(stream) = local.leave().await {
        info!("Released local stream {}", stream);
    }

    let _ = stop_tx.send(true);
    let failed = join_peers(handles).await;
    if failed == 0 {
        info!("All peers stopped.");
    } else {
        warn!("{} simulated peer(s) ended abnormally", failed);
    }
    Ok(())
}

/// Awaits every simulated peer task; returns how many panicked or were
/// cancelled.
async fn join_peers(handles: Vec<JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for (idx, h) in handles.into_iter().enumerate() {
        if let Err(e) = h.await {
            warn!("Peer[{idx}] task failed: {e}");
            failed += 1;
        }
    }
    failed
}

fn load_config() -> Result<SyncConfig> {
    let config = match std::env::var("HEARTSYNC_CONFIG") {
        Ok(path) => read_config(Path::new(&path))?,
        Err(_) => SyncConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<SyncConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn peer_task_failures_are_counted() {
        let ok = tokio::spawn(async {});
        let panicked = tokio::spawn(async { panic!("simulated peer crashed") });
        let cancelled = tokio::spawn(std::future::pending::<()>());
        cancelled.abort();

        assert_eq!(join_peers(vec![ok, panicked, cancelled]).await, 2);
    }

    #[tokio::test]
    async fn clean_shutdown_reports_no_failures() {
        let handles = (0..3).map(|_| tokio::spawn(async {})).collect();
        assert_eq!(join_peers(handles).await, 0);
    }
}
