use async_trait::async_trait;
use heartsync_core::{HeartSyncError, PeerId, SessionState, StreamHandle};

// MARK: - MediaDevices trait

/// Local camera/microphone access.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquires the default local media stream (may prompt for permission).
    async fn acquire_local_media(&self) -> Result<StreamHandle, HeartSyncError>;

    /// Takes back a stream the session no longer owns.
    fn release_local_media(&self, _stream: StreamHandle) {}
}

// MARK: - RemoteMediaView trait

/// Owns the video elements of remote peers.
pub trait RemoteMediaView: Send {
    fn attach_remote_stream(&mut self, peer: &PeerId, stream: StreamHandle);

    fn detach_remote_stream(&mut self, _peer: &PeerId) {}

    /// Removes every remote video (called on leave).
    fn clear_remote_streams(&mut self);
}

// MARK: - SyncVisualizer trait

/// Chart and heart effect, updated after every received sample.
pub trait SyncVisualizer: Send {
    fn render_series(&mut self, series: &[f64]);

    fn set_effect_state(&mut self, active: bool);

    /// Correlation between local and received samples, once defined.
    fn set_sync_score(&mut self, _score: Option<f64>) {}
}

// MARK: - StatusView trait

/// Identity, lifecycle and error display.
pub trait StatusView: Send {
    fn show_local_id(&mut self, _id: &PeerId) {}

    fn show_state(&mut self, _state: SessionState) {}

    fn report_error(&mut self, error: &HeartSyncError);
}
