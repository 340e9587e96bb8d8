//! Sample providers polled on every send tick.

use std::collections::VecDeque;

use bytes::Bytes;
use heartsync_core::sensor::{bpm_to_sample, parse_heart_rate_measurement};
use heartsync_core::SyncConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub trait SampleSource: Send {
    /// Current reading, or `None` to skip this tick.
    fn next_sample(&mut self) -> Option<f64>;
}

// ── RandomSource ──────────────────────────────────────────────────────────────

/// Uniform samples in [0, 1). Stand-in until a real sensor is attached.
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for RandomSource {
    fn next_sample(&mut self) -> Option<f64> {
        Some(self.rng.gen::<f64>())
    }
}

// ── ScriptedSource ────────────────────────────────────────────────────────────

/// Replays a fixed sequence, optionally cycling.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    samples: VecDeque<f64>,
    cycle: bool,
}

impl ScriptedSource {
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        Self { samples: samples.into_iter().collect(), cycle: false }
    }

    pub fn cycling(samples: impl IntoIterator<Item = f64>) -> Self {
        Self { samples: samples.into_iter().collect(), cycle: true }
    }
}

impl SampleSource for ScriptedSource {
    fn next_sample(&mut self) -> Option<f64> {
        let next = self.samples.pop_front()?;
        if self.cycle {
            self.samples.push_back(next);
        }
        Some(next)
    }
}

// ── HeartRateSource ───────────────────────────────────────────────────────────

/// Latest heart rate from a stream of raw BLE Heart Rate Measurement
/// notifications, mapped onto [0, 1].
pub struct HeartRateSource {
    notifications: mpsc::Receiver<Bytes>,
    latest_bpm: Option<u16>,
    min_bpm: u16,
    max_bpm: u16,
}

impl HeartRateSource {
    pub fn new(notifications: mpsc::Receiver<Bytes>, config: &SyncConfig) -> Self {
        Self {
            notifications,
            latest_bpm: None,
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
        }
    }

    pub fn latest_bpm(&self) -> Option<u16> {
        self.latest_bpm
    }
}

impl SampleSource for HeartRateSource {
    fn next_sample(&mut self) -> Option<f64> {
        while let Ok(raw) = self.notifications.try_recv() {
            match parse_heart_rate_measurement(&raw) {
                Ok(bpm) => {
                    debug!("Heart rate: {} bpm", bpm);
                    self.latest_bpm = Some(bpm);
                }
                Err(e) => warn!("Skipping measurement: {}", e),
            }
        }
        self.latest_bpm.map(|bpm| bpm_to_sample(bpm, self.min_bpm, self.max_bpm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_samples_stay_in_unit_range() {
        let mut source = RandomSource::seeded(7);
        for _ in 0..100 {
            let v = source.next_sample().unwrap();
            assert!((0.0..1.0).contains(&v), "v={}", v);
        }
    }

    #[test]
    fn scripted_source_runs_out_unless_cycling() {
        let mut once = ScriptedSource::new([0.1, 0.2]);
        assert_eq!(once.next_sample(), Some(0.1));
        assert_eq!(once.next_sample(), Some(0.2));
        assert_eq!(once.next_sample(), None);

        let mut cycle = ScriptedSource::cycling([0.1, 0.2]);
        let got: Vec<_> = (0..3).filter_map(|_| cycle.next_sample()).collect();
        assert_eq!(got, vec![0.1, 0.2, 0.1]);
    }

    #[test]
    fn heart_rate_source_keeps_latest_valid_reading() {
        let (tx, rx) = mpsc::channel(8);
        let mut source = HeartRateSource::new(rx, &SyncConfig::default());
        assert_eq!(source.next_sample(), None);

        tx.try_send(Bytes::from_static(&[0x00, 60])).unwrap();
        tx.try_send(Bytes::from_static(&[0x00, 110])).unwrap();
        tx.try_send(Bytes::from_static(&[0x01, 0x05])).unwrap(); // truncated, skipped
        assert_eq!(source.next_sample(), Some(0.5));
        assert_eq!(source.latest_bpm(), Some(110));

        // No new notifications: the last reading is repeated.
        assert_eq!(source.next_sample(), Some(0.5));
    }
}
