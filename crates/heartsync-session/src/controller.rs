use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use heartsync_core::correlation::sync_score;
use heartsync_core::{
    HeartSyncError, PeerId, RoomName, SessionState, StreamHandle, SyncConfig, SyncHistory,
};
use heartsync_transport::{MeshTransport, RoomEvent};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{
    MediaDevices, PeerDataChannel, RemoteMediaView, RoomSession, SampleSource, SessionEvent,
    StatusView, SyncVisualizer,
};

/// Outcome of a successful [`SyncController::join`].
#[derive(Debug)]
pub struct JoinReport {
    pub room: RoomName,
    /// Whether the session holds a local stream after joining.
    pub has_local_stream: bool,
    /// Media acquisition failure; the session stays joined without video.
    pub media_error: Option<HeartSyncError>,
}

/// Single owner of the current session, the sync history and the UI.
///
/// Every mutation (`join`, `leave`, `tick`, `handle_event`) takes `&mut self`,
/// so room events are applied one at a time in arrival order.
pub struct SyncController<V> {
    config: SyncConfig,
    transport: Arc<dyn MeshTransport>,
    media: Arc<dyn MediaDevices>,
    view: V,
    history: SyncHistory,
    /// Samples this peer broadcast, for the sync score.
    sent: SyncHistory,
    /// Per-peer received samples; the score compares `sent` with one peer.
    received: HashMap<PeerId, SyncHistory>,
    local_id: Option<PeerId>,
    session: Option<RoomSession>,
    channel: Option<PeerDataChannel>,
    events: Option<mpsc::Receiver<RoomEvent>>,
}

impl<V> SyncController<V>
where
    V: RemoteMediaView + SyncVisualizer + StatusView,
{
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn MeshTransport>,
        media: Arc<dyn MediaDevices>,
        view: V,
    ) -> Self {
        let history = SyncHistory::from_config(&config);
        let sent = SyncHistory::from_config(&config);
        Self {
            config,
            transport,
            media,
            view,
            history,
            sent,
            received: HashMap::new(),
            local_id: None,
            session: None,
            channel: None,
            events: None,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.session.as_ref().map(RoomSession::state).unwrap_or_default()
    }

    pub fn session(&self) -> Option<&RoomSession> {
        self.session.as_ref()
    }

    pub fn history(&self) -> &SyncHistory {
        &self.history
    }

    pub fn local_id(&self) -> Option<&PeerId> {
        self.local_id.as_ref()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Opens the signaling connection and shows the local id.
    pub async fn start(&mut self) -> Result<PeerId, HeartSyncError> {
        let id = self.transport.open_connection().await.map_err(|e| {
            let err = HeartSyncError::from(e);
            self.view.report_error(&err);
            err
        })?;
        info!("Connection open — local id {}", id);
        self.view.show_local_id(&id);
        self.local_id = Some(id.clone());
        Ok(id)
    }

    /// Joins `room_name` with a fresh [`RoomSession`].
    ///
    /// Without `initial_stream`, local media is acquired after joining and
    /// published with `replace_stream`; a media failure is reported in the
    /// [`JoinReport`] and does not undo the join.
    pub async fn join(
        &mut self,
        room_name: &str,
        initial_stream: Option<StreamHandle>,
    ) -> Result<JoinReport, HeartSyncError> {
        if let Some(current) = self.session.as_ref().filter(|s| s.state().is_joined()) {
            let err = HeartSyncError::AlreadyJoined {
                room: current.room().map(ToString::to_string).unwrap_or_default(),
            };
            self.view.report_error(&err);
            return Err(err);
        }

        let mut session = RoomSession::new(Arc::clone(&self.transport));
        self.channel = Some(session.data_channel());
        self.events = None;
        self.view.show_state(SessionState::Joining);

        let joined = session.join(room_name, initial_stream).await;
        let state = session.state();
        self.session = Some(session);
        self.view.show_state(state);

        let events = match joined {
            Ok(events) => events,
            Err(e) => {
                self.view.report_error(&e);
                return Err(e);
            }
        };
        self.events = Some(events);

        let media_error = if self.has_local_stream() {
            None
        } else {
            self.acquire_local_media().await.err()
        };

        let room = self
            .session
            .as_ref()
            .and_then(RoomSession::room)
            .cloned()
            .ok_or(HeartSyncError::NotJoined)?;
        Ok(JoinReport { room, has_local_stream: self.has_local_stream(), media_error })
    }

    /// Leaves the current room and clears remote videos. Idempotent.
    pub async fn leave(&mut self) -> Option<StreamHandle> {
        let session = self.session.as_mut()?;
        if !session.state().is_joined() {
            debug!("leave() with no joined session");
            return None;
        }
        let released = session.leave().await;
        let state = session.state();

        // Queued events are dropped; any already taken are rejected by the
        // Left session in `handle_event`.
        self.events = None;
        self.received.clear();
        self.view.clear_remote_streams();
        self.view.show_state(state);
        released
    }

    async fn acquire_local_media(&mut self) -> Result<(), HeartSyncError> {
        let stream = match self.media.acquire_local_media().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Local media unavailable, continuing without video: {}", e);
                self.view.report_error(&e);
                return Err(e);
            }
        };

        let Some(session) = self.session.as_mut() else {
            self.media.release_local_media(stream);
            return Err(HeartSyncError::NotJoined);
        };
        match session.replace_stream(stream).await {
            Ok(Some(previous)) => {
                self.media.release_local_media(previous);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("Publishing local media failed: {}", e);
                self.view.report_error(&e);
                Err(e)
            }
        }
    }

    fn has_local_stream(&self) -> bool {
        self.session.as_ref().and_then(RoomSession::local_stream).is_some()
    }

    // ── Heartbeat flow ────────────────────────────────────────────────────────

    /// Broadcasts one local sample. A no-op unless joined.
    pub async fn tick(&mut self, sample: f64) {
        let Some(channel) = &self.channel else {
            return;
        };
        if channel.send(sample).await {
            if let Err(e) = self.sent.push(sample) {
                debug!("Local sample not recorded: {}", e);
            }
        }
    }

    /// Applies one room event. Events arriving outside `Joined` are ignored.
    pub fn handle_event(&mut self, event: RoomEvent) {
        let Some(session) = &self.session else {
            debug!("Room event with no session; ignored");
            return;
        };
        match session.accept(event) {
            Some(SessionEvent::RemoteStream { peer, stream }) => {
                self.view.attach_remote_stream(&peer, stream);
            }
            Some(SessionEvent::Heartbeat { peer, value }) => {
                debug!("Heartbeat {:.3} from {}", value, peer);
                self.apply_heartbeat(peer, value);
            }
            Some(SessionEvent::PeerLeft { peer }) => {
                self.received.remove(&peer);
                self.view.detach_remote_stream(&peer);
            }
            None => {}
        }
    }

    fn apply_heartbeat(&mut self, peer: PeerId, value: f64) {
        let snapshot = match self.history.push(value) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Heartbeat dropped: {}", e);
                return;
            }
        };
        self.view.render_series(&snapshot.series);
        self.view.set_effect_state(snapshot.above_threshold);

        let config = &self.config;
        let from_peer = self
            .received
            .entry(peer)
            .or_insert_with(|| SyncHistory::from_config(config));
        let score = match from_peer.push(value) {
            Ok(peer_snapshot) => sync_score(&self.sent.series(), &peer_snapshot.series),
            Err(_) => None,
        };
        self.view.set_sync_score(score);
    }

    /// Next queued room event, or `None` when not joined or the room closed.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Drives the controller until `shutdown` completes: broadcasts a sample
    /// from `source` every `send_interval` and applies room events as they
    /// arrive.
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F)
    where
        S: SampleSource,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.send_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }

                _ = ticker.tick() => {
                    if let Some(sample) = source.next_sample() {
                        self.tick(sample).await;
                    }
                }

                event = recv_event(&mut self.events) => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("Room event stream closed");
                            self.events = None;
                        }
                    }
                }
            }
        }
    }
}

async fn recv_event(events: &mut Option<mpsc::Receiver<RoomEvent>>) -> Option<RoomEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
