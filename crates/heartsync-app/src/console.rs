//! Log-based stand-ins for the browser UI.

use async_trait::async_trait;
use heartsync_core::{HeartSyncError, PeerId, SessionState, StreamHandle};
use heartsync_session::{MediaDevices, RemoteMediaView, StatusView, SyncVisualizer};
use tracing::{debug, info, warn};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn sparkline(series: &[f64]) -> String {
    series
        .iter()
        .map(|v| {
            let idx = (v.clamp(0.0, 1.0) * (SPARK.len() - 1) as f64).round() as usize;
            SPARK[idx]
        })
        .collect()
}

// ── SimulatedCamera ───────────────────────────────────────────────────────────

/// Always grants a fresh stream.
pub struct SimulatedCamera;

#[async_trait]
impl MediaDevices for SimulatedCamera {
    async fn acquire_local_media(&self) -> Result<StreamHandle, HeartSyncError> {
        Ok(StreamHandle::generate())
    }

    fn release_local_media(&self, stream: StreamHandle) {
        debug!("Camera stream {} released", stream);
    }
}

// ── ConsoleView ───────────────────────────────────────────────────────────────

/// Prints the chart as a sparkline and logs effect changes.
#[derive(Default)]
pub struct ConsoleView {
    remote: Vec<(PeerId, StreamHandle)>,
    effect_active: bool,
}

impl RemoteMediaView for ConsoleView {
    fn attach_remote_stream(&mut self, peer: &PeerId, stream: StreamHandle) {
        info!("▶ video from {} ({})", peer, stream);
        self.remote.retain(|(p, _)| p != peer);
        self.remote.push((peer.clone(), stream));
    }

    fn detach_remote_stream(&mut self, peer: &PeerId) {
        self.remote.retain(|(p, _)| p != peer);
        info!("■ {} left ({} video(s) remaining)", peer, self.remote.len());
    }

    fn clear_remote_streams(&mut self) {
        info!("Clearing {} remote video(s)", self.remote.len());
        self.remote.clear();
    }
}

impl SyncVisualizer for ConsoleView {
    fn render_series(&mut self, series: &[f64]) {
        info!("Heart sync {}", sparkline(series));
    }

    fn set_effect_state(&mut self, active: bool) {
        if active != self.effect_active {
            info!("♥ effect {}", if active { "on" } else { "off" });
            self.effect_active = active;
        }
    }

    fn set_sync_score(&mut self, score: Option<f64>) {
        if let Some(score) = score {
            info!("Sync score {:.2}", score);
        }
    }
}

impl StatusView for ConsoleView {
    fn show_local_id(&mut self, id: &PeerId) {
        info!("My ID: {}", id);
    }

    fn show_state(&mut self, state: SessionState) {
        debug!("Session {}", state);
    }

    fn report_error(&mut self, error: &HeartSyncError) {
        warn!("{}", error);
    }
}

// ── QuietView ─────────────────────────────────────────────────────────────────

/// View for simulated peers: only errors are logged.
pub struct QuietView {
    idx: usize,
}

impl QuietView {
    pub fn new(idx: usize) -> Self {
        Self { idx }
    }
}

impl RemoteMediaView for QuietView {
    fn attach_remote_stream(&mut self, _peer: &PeerId, _stream: StreamHandle) {}

    fn clear_remote_streams(&mut self) {}
}

impl SyncVisualizer for QuietView {
    fn render_series(&mut self, _series: &[f64]) {}

    fn set_effect_state(&mut self, _active: bool) {}
}

impl StatusView for QuietView {
    fn report_error(&mut self, error: &HeartSyncError) {
        warn!("Peer[{}] {}", self.idx, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparkline_maps_unit_range() {
        assert_eq!(sparkline(&[0.0, 0.5, 1.0]), "▁▅█");
        assert_eq!(sparkline(&[-1.0, 2.0]), "▁█");
        assert_eq!(sparkline(&[]), "");
    }
}
