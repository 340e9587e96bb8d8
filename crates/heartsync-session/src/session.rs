//! Room membership lifecycle.
//!
//! ```text
//! Idle ──join ok──► Joined ──leave──► Left
//!  ▲  │                 │ ▲
//!  └──┘ join failure    └─┘ replace_stream
//! ```
//!
//! `Left` is terminal: joining again means constructing a new session.

use std::sync::Arc;

use heartsync_core::{HeartSyncError, PeerId, RoomName, SessionState, StreamHandle};
use heartsync_transport::{JoinOptions, MeshTransport, RoomEvent, RoomHandle};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::PeerDataChannel;

// MARK: - SessionEvent

/// Room events that survived routing, ready for the UI and the history.
#[derive(Debug)]
pub enum SessionEvent {
    RemoteStream { peer: PeerId, stream: StreamHandle },
    Heartbeat { peer: PeerId, value: f64 },
    PeerLeft { peer: PeerId },
}

// MARK: - RoomSession

pub struct RoomSession {
    transport: Arc<dyn MeshTransport>,
    state: SessionState,
    room: Option<RoomName>,
    /// Present only while `Joined`.
    local_stream: Option<StreamHandle>,
    /// Holds the room handle exactly while `Joined`.
    link: watch::Sender<Option<Arc<dyn RoomHandle>>>,
    channel: PeerDataChannel,
}

impl RoomSession {
    pub fn new(transport: Arc<dyn MeshTransport>) -> Self {
        let (link, link_rx) = watch::channel(None);
        Self {
            transport,
            state: SessionState::Idle,
            room: None,
            local_stream: None,
            link,
            channel: PeerDataChannel::new(link_rx),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn room(&self) -> Option<&RoomName> {
        self.room.as_ref()
    }

    pub fn local_stream(&self) -> Option<&StreamHandle> {
        self.local_stream.as_ref()
    }

    /// Heartbeat channel bound to this session's joined state.
    pub fn data_channel(&self) -> PeerDataChannel {
        self.channel.clone()
    }

    /// Joins `room_name`, publishing `initial_stream` if given.
    ///
    /// The name is validated before the transport is touched. On failure the
    /// session is back in `Idle` and `initial_stream` is released.
    pub async fn join(
        &mut self,
        room_name: &str,
        initial_stream: Option<StreamHandle>,
    ) -> Result<mpsc::Receiver<RoomEvent>, HeartSyncError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Joining | SessionState::Joined => {
                return Err(HeartSyncError::AlreadyJoined {
                    room: self.room.as_ref().map(ToString::to_string).unwrap_or_default(),
                });
            }
            SessionState::Left => return Err(HeartSyncError::SessionClosed),
        }

        let room = RoomName::parse(room_name)?;

        info!("Joining room '{}' (local stream: {})", room, initial_stream.is_some());
        let pending = JoinInFlight::enter(&mut self.state);

        let joined = match self
            .transport
            .join_room(&room, JoinOptions::mesh(initial_stream.as_ref()))
            .await
        {
            Ok(joined) => joined,
            Err(e) => {
                drop(pending);
                warn!("Join '{}' failed: {}", room, e);
                return Err(e.into());
            }
        };

        pending.complete();
        self.link.send_replace(Some(joined.handle));
        self.local_stream = initial_stream;
        self.room = Some(room);
        info!("Joined room '{}'", self.room.as_ref().map(RoomName::as_str).unwrap_or_default());
        Ok(joined.events)
    }

    /// Publishes `stream` as the local stream and returns the previous one.
    pub async fn replace_stream(
        &mut self,
        stream: StreamHandle,
    ) -> Result<Option<StreamHandle>, HeartSyncError> {
        if !self.state.is_joined() {
            return Err(HeartSyncError::NotJoined);
        }
        let room = self.link.borrow().clone().ok_or(HeartSyncError::NotJoined)?;
        room.replace_stream(&stream).await?;
        info!("Local stream replaced with {}", stream);
        Ok(self.local_stream.replace(stream))
    }

    /// Leaves the room and hands the local stream back to the caller.
    ///
    /// No-op (returns `None`) unless joined. Close errors are logged only.
    pub async fn leave(&mut self) -> Option<StreamHandle> {
        if !self.state.is_joined() {
            debug!("leave() ignored in state {}", self.state);
            return None;
        }

        self.state = SessionState::Left;
        let room = self.link.send_replace(None);
        if let Some(room) = room {
            if let Err(e) = room.close().await {
                warn!("Closing room '{}' failed: {}", room.room(), e);
            }
        }
        info!("Left room '{}'", self.room.as_ref().map(RoomName::as_str).unwrap_or_default());
        self.local_stream.take()
    }

    /// Routes a raw room event. Everything is dropped unless joined; only
    /// heartbeat data messages are forwarded.
    pub fn accept(&self, event: RoomEvent) -> Option<SessionEvent> {
        if !self.state.is_joined() {
            debug!("Dropping {:?} in state {}", event_kind(&event), self.state);
            return None;
        }
        match event {
            RoomEvent::Stream { peer, stream } => {
                info!("Remote stream {} from {}", stream, peer);
                Some(SessionEvent::RemoteStream { peer, stream })
            }
            RoomEvent::Data { peer, payload } => self
                .channel
                .on_data(&payload)
                .map(|value| SessionEvent::Heartbeat { peer, value }),
            RoomEvent::PeerLeft { peer } => {
                info!("Peer {} left", peer);
                Some(SessionEvent::PeerLeft { peer })
            }
        }
    }
}

/// Keeps the session in `Joining` while the transport call is pending.
///
/// Dropped without [`JoinInFlight::complete`] (join failed, or the `join`
/// future was cancelled) it puts the session back to `Idle`.
struct JoinInFlight<'a> {
    state: &'a mut SessionState,
    done: bool,
}

impl<'a> JoinInFlight<'a> {
    fn enter(state: &'a mut SessionState) -> Self {
        *state = SessionState::Joining;
        Self { state, done: false }
    }

    fn complete(mut self) {
        *self.state = SessionState::Joined;
        self.done = true;
    }
}

impl Drop for JoinInFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            debug!("Join abandoned; back to Idle");
            *self.state = SessionState::Idle;
        }
    }
}

/// Dropping a joined session skips `close()`; the room handle is released
/// and the transport is expected to leave the room when its handle drops.
/// Call [`RoomSession::leave`] first to get the local stream back.
impl Drop for RoomSession {
    fn drop(&mut self) {
        if self.state.is_joined() {
            warn!("RoomSession dropped while joined; releasing room handle");
        }
        self.link.send_replace(None);
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("state", &self.state)
            .field("room", &self.room)
            .field("local_stream", &self.local_stream)
            .finish()
    }
}

fn event_kind(event: &RoomEvent) -> &'static str {
    match event {
        RoomEvent::Stream { .. } => "stream",
        RoomEvent::Data { .. } => "data",
        RoomEvent::PeerLeft { .. } => "peer_left",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use heartsync_core::TransportError;
    use heartsync_transport::{DataMessage, LoopbackMesh};

    use super::*;

    fn session_on(mesh: &LoopbackMesh) -> RoomSession {
        RoomSession::new(Arc::new(mesh.endpoint()))
    }

    fn data(peer: &str, msg: DataMessage) -> RoomEvent {
        RoomEvent::Data { peer: PeerId::new(peer), payload: msg.encode().unwrap() }
    }

    #[tokio::test]
    async fn empty_room_name_never_reaches_transport() {
        let mesh = LoopbackMesh::new();
        let mut session = session_on(&mesh);

        let err = session.join("", None).await.unwrap_err();
        assert!(matches!(err, HeartSyncError::InvalidInput { .. }));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(mesh.join_attempts(), 0);
    }

    #[tokio::test]
    async fn join_failure_returns_to_idle() {
        let mesh = LoopbackMesh::new();
        mesh.fail_next_join(TransportError::SignalingUnavailable { reason: "offline".into() });
        let mut session = session_on(&mesh);

        let err = session.join("room1", Some(StreamHandle::new("cam"))).await.unwrap_err();
        assert!(matches!(err, HeartSyncError::Connection { .. }));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.local_stream().is_none());

        // Not retried automatically, but the caller may try again.
        assert_eq!(mesh.join_attempts(), 1);
        session.join("room1", None).await.unwrap();
        assert_eq!(session.state(), SessionState::Joined);
    }

    /// Transport whose `join_room` never resolves.
    struct StalledTransport;

    #[async_trait::async_trait]
    impl MeshTransport for StalledTransport {
        async fn open_connection(&self) -> Result<PeerId, TransportError> {
            Ok(PeerId::new("stalled"))
        }

        async fn join_room(
            &self,
            _room: &RoomName,
            _options: JoinOptions<'_>,
        ) -> Result<heartsync_transport::JoinedRoom, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancelled_join_returns_to_idle() {
        let mut session = RoomSession::new(Arc::new(StalledTransport));

        let attempt = tokio::time::timeout(Duration::from_millis(20), session.join("room1", None)).await;
        assert!(attempt.is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.room().is_none());
        assert_eq!(session.leave().await, None);

        let retry = tokio::time::timeout(Duration::from_millis(20), session.join("room1", None)).await;
        assert!(retry.is_err(), "retry reaches the transport again instead of AlreadyJoined");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn cancelled_join_then_join_on_live_transport() {
        let mesh = LoopbackMesh::new();
        let mut stalled = RoomSession::new(Arc::new(StalledTransport));
        let _ = tokio::time::timeout(Duration::from_millis(20), stalled.join("room1", None)).await;
        assert_eq!(stalled.state(), SessionState::Idle);

        let mut session = session_on(&mesh);
        let _events = session.join("room1", None).await.unwrap();
        assert_eq!(session.state(), SessionState::Joined);
    }

    #[tokio::test]
    async fn dropping_joined_session_leaves_loopback_room() {
        let mesh = LoopbackMesh::new();
        let remote = mesh.endpoint();
        let mut remote_room = remote.join_room(&RoomName::parse("room1").unwrap(), JoinOptions::default()).await.unwrap();

        let mut session = session_on(&mesh);
        let _events = session.join("room1", None).await.unwrap();
        assert_eq!(mesh.members(&RoomName::parse("room1").unwrap()).len(), 2);
        drop(session);

        assert_eq!(mesh.members(&RoomName::parse("room1").unwrap()), vec![remote.id().clone()]);
        assert!(matches!(remote_room.events.recv().await, Some(RoomEvent::PeerLeft { .. })));
    }

    #[tokio::test]
    async fn local_stream_held_only_while_joined() {
        let mesh = LoopbackMesh::new();
        let mut session = session_on(&mesh);

        let _events = session.join("room1", Some(StreamHandle::new("cam"))).await.unwrap();
        assert_eq!(session.local_stream().map(StreamHandle::id), Some("cam"));

        let previous = session.replace_stream(StreamHandle::new("cam-hd")).await.unwrap();
        assert_eq!(previous, Some(StreamHandle::new("cam")));
        assert_eq!(session.state(), SessionState::Joined);

        let released = session.leave().await;
        assert_eq!(released, Some(StreamHandle::new("cam-hd")));
        assert_eq!(session.state(), SessionState::Left);
        assert!(session.local_stream().is_none());
    }

    #[tokio::test]
    async fn replace_stream_requires_joined() {
        let mesh = LoopbackMesh::new();
        let mut session = session_on(&mesh);
        assert_eq!(
            session.replace_stream(StreamHandle::new("cam")).await,
            Err(HeartSyncError::NotJoined)
        );
        assert!(session.local_stream().is_none());
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let mesh = LoopbackMesh::new();

        let mut never_joined = session_on(&mesh);
        assert_eq!(never_joined.leave().await, None);
        assert_eq!(never_joined.state(), SessionState::Idle);

        let mut session = session_on(&mesh);
        let _events = session.join("room1", None).await.unwrap();
        session.leave().await;
        let second = session.leave().await;
        assert_eq!(second, None);
        assert_eq!(session.state(), SessionState::Left);
        assert!(mesh.members(&RoomName::parse("room1").unwrap()).is_empty());
    }

    #[tokio::test]
    async fn left_session_cannot_rejoin() {
        let mesh = LoopbackMesh::new();
        let mut session = session_on(&mesh);
        let _events = session.join("room1", None).await.unwrap();
        session.leave().await;
        assert_eq!(session.join("room1", None).await.unwrap_err(), HeartSyncError::SessionClosed);
    }

    #[tokio::test]
    async fn second_join_while_joined_is_rejected() {
        let mesh = LoopbackMesh::new();
        let mut session = session_on(&mesh);
        let _events = session.join("room1", None).await.unwrap();
        assert!(matches!(
            session.join("room2", None).await,
            Err(HeartSyncError::AlreadyJoined { .. })
        ));
        assert_eq!(mesh.join_attempts(), 1);
    }

    #[tokio::test]
    async fn send_is_noop_unless_joined() {
        let mesh = LoopbackMesh::new();
        let mut session = session_on(&mesh);
        let channel = session.data_channel();

        assert!(!channel.send(0.4).await);
        assert_eq!(mesh.broadcast_count(), 0);

        let _events = session.join("room1", None).await.unwrap();
        assert!(channel.send(0.4).await);
        assert_eq!(mesh.broadcast_count(), 1);

        session.leave().await;
        assert!(!channel.send(0.4).await);
        assert_eq!(mesh.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn routes_only_heartbeats() {
        let mesh = LoopbackMesh::new();
        let mut session = session_on(&mesh);
        let _events = session.join("room1", None).await.unwrap();

        match session.accept(data("peer-b", DataMessage::heartbeat(0.7))) {
            Some(SessionEvent::Heartbeat { peer, value }) => {
                assert_eq!(peer.as_str(), "peer-b");
                assert_eq!(value, 0.7);
            }
            other => panic!("expected heartbeat, got {:?}", other),
        }

        let ping = DataMessage::new("ping", serde_json::json!(1));
        assert!(session.accept(data("peer-b", ping)).is_none());

        let garbage = RoomEvent::Data { peer: PeerId::new("peer-b"), payload: Bytes::from_static(b"{") };
        assert!(session.accept(garbage).is_none());
    }

    #[tokio::test]
    async fn events_after_leave_are_dropped() {
        let mesh = LoopbackMesh::new();
        let mut session = session_on(&mesh);
        let _events = session.join("room1", None).await.unwrap();
        session.leave().await;

        assert!(session.accept(data("peer-b", DataMessage::heartbeat(0.9))).is_none());
        let stream = RoomEvent::Stream { peer: PeerId::new("peer-b"), stream: StreamHandle::new("cam-b") };
        assert!(session.accept(stream).is_none());
    }
}
