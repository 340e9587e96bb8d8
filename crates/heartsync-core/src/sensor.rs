//! BLE Heart Rate Measurement decoding (GATT characteristic 0x2A37).
//!
//! Only the heart rate value is read; energy expended and RR intervals that
//! may follow it are skipped.

use crate::HeartSyncError;

/// Heart Rate Measurement characteristic UUID.
pub const HEART_RATE_MEASUREMENT_UUID: &str = "00002a37-0000-1000-8000-00805f9b34fb";

const FLAG_VALUE_U16: u8 = 0x01;

/// Decodes the heart rate (bpm) from a raw measurement notification.
///
/// Bit 0 of the flags byte selects a `u8` value or a little-endian `u16`.
pub fn parse_heart_rate_measurement(data: &[u8]) -> Result<u16, HeartSyncError> {
    let (&flags, rest) = data.split_first().ok_or_else(|| HeartSyncError::MalformedMeasurement {
        reason: "empty payload".into(),
    })?;

    if flags & FLAG_VALUE_U16 == 0 {
        rest.first().map(|&bpm| bpm as u16).ok_or_else(|| HeartSyncError::MalformedMeasurement {
            reason: "missing u8 heart rate".into(),
        })
    } else {
        match rest {
            [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
            _ => Err(HeartSyncError::MalformedMeasurement {
                reason: format!("u16 heart rate needs 2 bytes, got {}", rest.len()),
            }),
        }
    }
}

/// Maps `bpm` linearly onto [0, 1] over `[min_bpm, max_bpm]`, clamping outside.
pub fn bpm_to_sample(bpm: u16, min_bpm: u16, max_bpm: u16) -> f64 {
    if max_bpm <= min_bpm {
        return if bpm > min_bpm { 1.0 } else { 0.0 };
    }
    let span = (max_bpm - min_bpm) as f64;
    ((bpm as f64 - min_bpm as f64) / span).clamp(0.0, 1.0)
}
