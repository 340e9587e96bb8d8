pub mod config;
pub mod correlation;
pub mod errors;
pub mod history;
pub mod sensor;
pub mod types;

pub use config::SyncConfig;
pub use errors::{HeartSyncError, TransportError};
pub use history::{SyncHistory, SyncSnapshot};
pub use types::*;
