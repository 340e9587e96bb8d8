use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::MAX_CAPACITY;
use crate::HeartSyncError;

/// Configuração de sincronização.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of samples kept for the chart.
    #[serde(alias = "historyLen", alias = "maxDataPoints")]
    pub history_len: usize,
    /// Samples strictly above this value turn the heart effect on.
    pub threshold: f64,
    #[serde(alias = "sendIntervalMs")]
    pub send_interval_ms: u64,
    /// Heart rate mapped to sample 0.0.
    #[serde(alias = "minBpm")]
    pub min_bpm: u16,
    /// Heart rate mapped to sample 1.0.
    #[serde(alias = "maxBpm")]
    pub max_bpm: u16,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            history_len: 20,
            threshold: 0.5,
            send_interval_ms: 1000,
            min_bpm: 40,
            max_bpm: 180,
        }
    }
}

impl SyncConfig {
    /// Retorna o intervalo de envio de heartbeats.
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn validate(&self) -> Result<(), HeartSyncError> {
        if self.history_len == 0 {
            return Err(HeartSyncError::invalid_input("history_len must be at least 1"));
        }
        if self.history_len > MAX_CAPACITY {
            return Err(HeartSyncError::invalid_input(format!(
                "history_len {} exceeds {}",
                self.history_len, MAX_CAPACITY
            )));
        }
        if self.send_interval_ms == 0 {
            return Err(HeartSyncError::invalid_input("send_interval_ms must be positive"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(HeartSyncError::invalid_input(format!(
                "threshold {} outside [0, 1]",
                self.threshold
            )));
        }
        if self.min_bpm >= self.max_bpm {
            return Err(HeartSyncError::invalid_input(format!(
                "min_bpm ({}) must be below max_bpm ({})",
                self.min_bpm, self.max_bpm
            )));
        }
        Ok(())
    }
}
