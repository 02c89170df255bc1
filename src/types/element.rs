use chrono::{DateTime, Utc};
use serde::Serialize;

/// m/s -> km/h
pub const MPS_TO_KMPH: f64 = 3.6;

/// Metrics computed for one window update
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionElement {
    pub timestamp: DateTime<Utc>,
    /// steps/min
    pub cadence: f64,
    /// m/s
    pub speed: f64,
    /// m, cumulative over the recording
    pub distance: f64,
}

impl SessionElement {
    pub fn new(timestamp: DateTime<Utc>, cadence: f64, speed: f64, distance: f64) -> Self {
        Self {
            timestamp,
            cadence,
            speed,
            distance,
        }
    }

    pub fn zero(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, 0.0, 0.0, 0.0)
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed * MPS_TO_KMPH
    }
}
