use std::sync::Arc;

use heartsync_transport::{DataMessage, RoomHandle};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Heartbeat broadcast over the room's data primitive.
///
/// The channel shares the session's link: while the session is joined the
/// link holds the room handle, otherwise it is empty and every operation is
/// a silent no-op. `leave()` clears the link before closing the room, so a
/// send or an inbound message racing a leave sees an empty link.
#[derive(Clone)]
pub struct PeerDataChannel {
    link: watch::Receiver<Option<Arc<dyn RoomHandle>>>,
}

impl PeerDataChannel {
    pub(crate) fn new(link: watch::Receiver<Option<Arc<dyn RoomHandle>>>) -> Self {
        Self { link }
    }

    pub fn is_open(&self) -> bool {
        self.link.borrow().is_some()
    }

    /// Broadcasts `{type: "heartbeat", value}` to every peer.
    ///
    /// Never fails: returns `false` when not joined or when the broadcast
    /// could not be handed to the transport.
    pub async fn send(&self, value: f64) -> bool {
        let room = self.link.borrow().clone();
        let Some(room) = room else {
            debug!("Heartbeat {:.3} dropped: not joined", value);
            return false;
        };

        let payload = match DataMessage::heartbeat(value).encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Heartbeat encode failed: {}", e);
                return false;
            }
        };

        match room.send(payload).await {
            Ok(()) => {
                debug!("Heartbeat {:.3} broadcast to '{}'", value, room.room());
                true
            }
            Err(e) => {
                warn!("Heartbeat broadcast to '{}' failed: {}", room.room(), e);
                false
            }
        }
    }

    /// Decodes an inbound broadcast. Returns the sample of a heartbeat
    /// message, unvalidated; anything else yields `None` without error.
    pub fn on_data(&self, payload: &[u8]) -> Option<f64> {
        if !self.is_open() {
            debug!("Inbound message ignored: channel closed");
            return None;
        }
        match DataMessage::decode(payload) {
            Ok(msg) => {
                let value = msg.heartbeat_value();
                if value.is_none() {
                    debug!("Ignoring '{}' message", msg.kind);
                }
                value
            }
            Err(e) => {
                debug!("Ignoring undecodable message: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for PeerDataChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerDataChannel").field("open", &self.is_open()).finish()
    }
}
