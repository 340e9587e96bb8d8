use serde::{Deserialize, Serialize};

use crate::HeartSyncError;

// MARK: - RoomName

/// Nome de sala validado (nunca vazio).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    pub fn parse(name: impl Into<String>) -> Result<Self, HeartSyncError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HeartSyncError::invalid_input("room name must not be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomName {
    type Error = HeartSyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomName> for String {
    fn from(name: RoomName) -> Self {
        name.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// MARK: - PeerId

/// Identidade de um participante da malha. Puramente informativa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// MARK: - StreamHandle

/// Opaque handle to a media stream (camera/microphone or a remote peer's track).
///
/// Deliberately not `Clone`: whoever holds the value owns the stream. The
/// session owns the local handle while joined and gives it back on leave.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    id: String,
}

impl StreamHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream:{}", self.id)
    }
}

// MARK: - SessionState

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Joining,
    Joined,
    Left,
}

impl SessionState {
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Joining => write!(f, "joining"),
            Self::Joined => write!(f, "joined"),
            Self::Left => write!(f, "left"),
        }
    }
}

// MARK: - HeartbeatSample

/// Amostra escalar em [0, 1]. A ordem de chegada é a chave de ordenação.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct HeartbeatSample(f64);

impl HeartbeatSample {
    /// Clamps finite and infinite values into [0, 1]; rejects NaN.
    pub fn new(value: f64) -> Result<Self, HeartSyncError> {
        if value.is_nan() {
            return Err(HeartSyncError::InvalidSample { value });
        }
        Ok(Self(value.clamp(0.0, 1.0)))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_name_rejects_empty_and_blank() {
        assert!(matches!(RoomName::parse(""), Err(HeartSyncError::InvalidInput { .. })));
        assert!(matches!(RoomName::parse("   "), Err(HeartSyncError::InvalidInput { .. })));
        assert_eq!(RoomName::parse("room1").unwrap().as_str(), "room1");
    }

    #[test]
    fn room_name_deserialization_is_validated() {
        let ok: RoomName = serde_json::from_str("\"lobby\"").unwrap();
        assert_eq!(ok.as_str(), "lobby");
        assert!(serde_json::from_str::<RoomName>("\"\"").is_err());
    }

    #[test]
    fn sample_is_clamped() {
        assert_eq!(HeartbeatSample::new(1.7).unwrap().value(), 1.0);
        assert_eq!(HeartbeatSample::new(-0.2).unwrap().value(), 0.0);
        assert_eq!(HeartbeatSample::new(f64::INFINITY).unwrap().value(), 1.0);
        assert_eq!(HeartbeatSample::new(0.25).unwrap().value(), 0.25);
    }

    #[test]
    fn sample_rejects_nan() {
        assert!(matches!(
            HeartbeatSample::new(f64::NAN),
            Err(HeartSyncError::InvalidSample { .. })
        ));
    }

    #[test]
    fn generated_handles_are_distinct() {
        assert_ne!(StreamHandle::generate(), StreamHandle::generate());
        assert_ne!(PeerId::generate(), PeerId::generate());
    }
}
