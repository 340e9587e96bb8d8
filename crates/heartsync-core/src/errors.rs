use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeartSyncError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    #[error("Local media unavailable: {reason}")]
    MediaAccess { reason: String },

    #[error("Session is not joined")]
    NotJoined,

    #[error("Session already left; create a new session to join again")]
    SessionClosed,

    #[error("Already joined room '{room}'")]
    AlreadyJoined { room: String },

    #[error("Sample is not a number: {value}")]
    InvalidSample { value: f64 },

    #[error("Malformed heart rate measurement: {reason}")]
    MalformedMeasurement { reason: String },
}

impl HeartSyncError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput { reason: reason.into() }
    }

    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection { reason: reason.into() }
    }

    pub fn media_access(reason: impl Into<String>) -> Self {
        Self::MediaAccess { reason: reason.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Signaling unavailable: {reason}")]
    SignalingUnavailable { reason: String },

    #[error("Join rejected: {reason}")]
    JoinRejected { reason: String },

    #[error("Room connection closed")]
    ConnectionClosed,

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("Malformed payload: {reason}")]
    Malformed { reason: String },
}

impl From<TransportError> for HeartSyncError {
    fn from(err: TransportError) -> Self {
        Self::Connection { reason: err.to_string() }
    }
}
