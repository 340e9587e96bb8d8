//! heartsync-session — room lifecycle and heartbeat synchronisation
//!
//! ```text
//! SyncController
//!   ├─ RoomSession        Idle → Joining → Joined → Left
//!   │    └─ PeerDataChannel  send(value) / on_data(payload)
//!   ├─ SyncHistory        bounded FIFO of received samples
//!   └─ collaborators      MediaDevices, RemoteMediaView, SyncVisualizer, StatusView
//! ```
//!
//! Everything runs on one owner: the controller consumes room events in
//! arrival order, so the history is never mutated concurrently.

pub mod channel;
pub mod controller;
pub mod session;
pub mod source;
pub mod view;

pub use channel::PeerDataChannel;
pub use controller::{JoinReport, SyncController};
pub use session::{RoomSession, SessionEvent};
pub use source::{HeartRateSource, RandomSource, SampleSource, ScriptedSource};
pub use view::{MediaDevices, RemoteMediaView, StatusView, SyncVisualizer};
