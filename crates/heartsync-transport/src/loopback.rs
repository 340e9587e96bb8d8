//! In-process mesh used by the `heartsync` binary and by tests.
//!
//! A [`LoopbackMesh`] is the shared "signaling server"; each simulated
//! participant gets its own [`LoopbackPeer`] endpoint. Events are pushed with
//! `try_send` so the hub lock is never held across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use heartsync_core::{PeerId, RoomName, StreamHandle, TransportError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{JoinOptions, JoinedRoom, MeshTransport, RoomEvent, RoomHandle, EVENT_QUEUE_CAPACITY};

// ── Hub state ─────────────────────────────────────────────────────────────────

struct Member {
    peer: PeerId,
    stream_id: Option<String>,
    tx: mpsc::Sender<RoomEvent>,
}

#[derive(Default)]
struct MeshState {
    rooms: HashMap<RoomName, Vec<Member>>,
    pending_failures: VecDeque<TransportError>,
    join_attempts: u64,
    broadcasts: u64,
}

fn deliver(member: &Member, event: RoomEvent) {
    deliver_to(&member.peer, &member.tx, event);
}

fn deliver_to(peer: &PeerId, tx: &mpsc::Sender<RoomEvent>, event: RoomEvent) {
    if let Err(e) = tx.try_send(event) {
        warn!("Loopback: dropping event for {}: {}", peer, e);
    }
}

// ── LoopbackMesh ──────────────────────────────────────────────────────────────

/// Shared in-memory room registry.
#[derive(Clone, Default)]
pub struct LoopbackMesh {
    state: Arc<Mutex<MeshState>>,
}

impl LoopbackMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// New participant endpoint with a fresh peer id.
    pub fn endpoint(&self) -> LoopbackPeer {
        self.endpoint_with_id(PeerId::generate())
    }

    pub fn endpoint_with_id(&self, id: PeerId) -> LoopbackPeer {
        LoopbackPeer { id, state: Arc::clone(&self.state) }
    }

    /// The next `join_room` call fails with `err`.
    pub fn fail_next_join(&self, err: TransportError) {
        self.lock().pending_failures.push_back(err);
    }

    /// Number of `join_room` calls received, including failed ones.
    pub fn join_attempts(&self) -> u64 {
        self.lock().join_attempts
    }

    /// Number of `send` broadcasts accepted across all rooms.
    pub fn broadcast_count(&self) -> u64 {
        self.lock().broadcasts
    }

    pub fn members(&self, room: &RoomName) -> Vec<PeerId> {
        self.lock()
            .rooms
            .get(room)
            .map(|members| members.iter().map(|m| m.peer.clone()).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MeshState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<MeshState>) -> MutexGuard<'_, MeshState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── LoopbackPeer ──────────────────────────────────────────────────────────────

/// One participant's view of a [`LoopbackMesh`].
#[derive(Clone)]
pub struct LoopbackPeer {
    id: PeerId,
    state: Arc<Mutex<MeshState>>,
}

impl LoopbackPeer {
    pub fn id(&self) -> &PeerId {
        &self.id
    }
}

#[async_trait]
impl MeshTransport for LoopbackPeer {
    async fn open_connection(&self) -> Result<PeerId, TransportError> {
        info!("Loopback: connection open (peer={})", self.id);
        Ok(self.id.clone())
    }

    async fn join_room(
        &self,
        room: &RoomName,
        options: JoinOptions<'_>,
    ) -> Result<JoinedRoom, TransportError> {
        let mut state = lock_state(&self.state);
        state.join_attempts += 1;

        if let Some(err) = state.pending_failures.pop_front() {
            warn!("Loopback: join '{}' failed (injected): {}", room, err);
            return Err(err);
        }

        let members = state.rooms.entry(room.clone()).or_default();
        if members.iter().any(|m| m.peer == self.id) {
            return Err(TransportError::JoinRejected {
                reason: format!("peer {} already in room '{}'", self.id, room),
            });
        }

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let stream_id = options.stream.map(|s| s.id().to_owned());

        // Existing members' streams → newcomer; newcomer's stream → existing members.
        for member in members.iter() {
            if let Some(id) = &member.stream_id {
                deliver_to(&self.id, &tx, RoomEvent::Stream {
                    peer: member.peer.clone(),
                    stream: StreamHandle::new(id.clone()),
                });
            }
            if let Some(id) = &stream_id {
                deliver(member, RoomEvent::Stream {
                    peer: self.id.clone(),
                    stream: StreamHandle::new(id.clone()),
                });
            }
        }

        members.push(Member { peer: self.id.clone(), stream_id, tx });
        info!(
            "Loopback: {} joined '{}' ({:?} mode, {} member(s))",
            self.id,
            room,
            options.mode,
            members.len()
        );

        let handle = LoopbackRoom {
            room: room.clone(),
            peer: self.id.clone(),
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        };
        Ok(JoinedRoom { handle: Arc::new(handle), events: rx })
    }
}

// ── LoopbackRoom ──────────────────────────────────────────────────────────────

struct LoopbackRoom {
    room: RoomName,
    peer: PeerId,
    state: Arc<Mutex<MeshState>>,
    closed: AtomicBool,
}

impl LoopbackRoom {
    /// Removes this member from the hub once; later calls are no-ops.
    fn detach(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = lock_state(&self.state);
        if let Some(members) = state.rooms.get_mut(&self.room) {
            members.retain(|m| m.peer != self.peer);
            for member in members.iter() {
                deliver(member, RoomEvent::PeerLeft { peer: self.peer.clone() });
            }
            if members.is_empty() {
                state.rooms.remove(&self.room);
            }
        }
        info!("Loopback: {} left '{}'", self.peer, self.room);
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RoomHandle for LoopbackRoom {
    fn room(&self) -> &RoomName {
        &self.room
    }

    async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut state = lock_state(&self.state);
        state.broadcasts += 1;
        let Some(members) = state.rooms.get(&self.room) else {
            return Err(TransportError::ConnectionClosed);
        };
        let mut delivered = 0usize;
        for member in members.iter().filter(|m| m.peer != self.peer) {
            deliver(member, RoomEvent::Data { peer: self.peer.clone(), payload: payload.clone() });
            delivered += 1;
        }
        debug!("Loopback: {} broadcast {} bytes to {} peer(s)", self.peer, payload.len(), delivered);
        Ok(())
    }

    async fn replace_stream(&self, stream: &StreamHandle) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut state = lock_state(&self.state);
        let Some(members) = state.rooms.get_mut(&self.room) else {
            return Err(TransportError::ConnectionClosed);
        };
        for member in members.iter_mut() {
            if member.peer == self.peer {
                member.stream_id = Some(stream.id().to_owned());
            } else {
                deliver(member, RoomEvent::Stream {
                    peer: self.peer.clone(),
                    stream: StreamHandle::new(stream.id()),
                });
            }
        }
        debug!("Loopback: {} published {}", self.peer, stream);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.detach();
        Ok(())
    }
}

impl Drop for LoopbackRoom {
    fn drop(&mut self) {
        self.detach();
    }
}
