//! heartsync-transport — mesh room transport interface
//!
//! The signaling/negotiation stack (ICE, SDP, media transport, mesh fan-out)
//! lives behind [`MeshTransport`] and [`RoomHandle`]. This crate only defines
//! that seam, the heartbeat wire message and an in-process [`LoopbackMesh`].
//!
//! ```text
//! MeshTransport::open_connection()  → PeerId
//! MeshTransport::join_room(room)    → JoinedRoom { handle, events }
//!     handle.send(payload)          ─► every other member: RoomEvent::Data
//!     handle.replace_stream(stream) ─► every other member: RoomEvent::Stream
//!     handle.close()                ─► every other member: RoomEvent::PeerLeft
//! ```

pub mod loopback;
pub mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use heartsync_core::{PeerId, RoomName, StreamHandle, TransportError};
use tokio::sync::mpsc;

pub use loopback::{LoopbackMesh, LoopbackPeer};
pub use wire::{DataMessage, HEARTBEAT_TYPE};

/// Capacity of each member's inbound event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

// MARK: - MeshMode

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeshMode {
    /// Every participant connects directly to every other participant.
    #[default]
    Mesh,
}

// MARK: - JoinOptions

/// Options for [`MeshTransport::join_room`]. The stream is borrowed: the
/// caller keeps ownership, the transport only publishes it.
#[derive(Debug, Default)]
pub struct JoinOptions<'a> {
    pub mode: MeshMode,
    pub stream: Option<&'a StreamHandle>,
}

impl<'a> JoinOptions<'a> {
    pub fn mesh(stream: Option<&'a StreamHandle>) -> Self {
        Self { mode: MeshMode::Mesh, stream }
    }
}

// MARK: - RoomEvent

/// Events delivered by a joined room, in arrival order.
#[derive(Debug)]
pub enum RoomEvent {
    /// A remote peer published (or replaced) its media stream.
    Stream { peer: PeerId, stream: StreamHandle },
    /// A broadcast payload from a remote peer.
    Data { peer: PeerId, payload: Bytes },
    /// A remote peer closed its room connection.
    PeerLeft { peer: PeerId },
}

// MARK: - MeshTransport trait

/// Signaling collaborator: connection identity and room admission.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Opens the signaling connection and returns the local peer id.
    async fn open_connection(&self) -> Result<PeerId, TransportError>;

    /// Joins `room`. Fails with a [`TransportError`] on signaling errors.
    async fn join_room(
        &self,
        room: &RoomName,
        options: JoinOptions<'_>,
    ) -> Result<JoinedRoom, TransportError>;
}

// MARK: - RoomHandle trait

/// Live connection to a joined mesh room.
#[async_trait]
pub trait RoomHandle: Send + Sync {
    fn room(&self) -> &RoomName;

    /// Broadcasts `payload` to every other member.
    async fn send(&self, payload: Bytes) -> Result<(), TransportError>;

    /// Publishes `stream` as this member's media stream.
    async fn replace_stream(&self, stream: &StreamHandle) -> Result<(), TransportError>;

    /// Tears down the mesh connection. Dropping the last handle without
    /// calling `close` leaves the room as well.
    async fn close(&self) -> Result<(), TransportError>;
}

// MARK: - JoinedRoom

pub struct JoinedRoom {
    pub handle: Arc<dyn RoomHandle>,
    pub events: mpsc::Receiver<RoomEvent>,
}

impl std::fmt::Debug for JoinedRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinedRoom")
            .field("room", self.handle.room())
            .finish_non_exhaustive()
    }
}
