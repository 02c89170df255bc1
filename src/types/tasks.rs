use super::{ExportResult, Reading, SessionState};

/// Metrics recompute job handed to the background worker.
///
/// Carries a snapshot of the window so the worker can compute without
/// holding the session lock.
#[derive(Debug, Clone)]
pub struct MetricsJob {
    /// Session epoch at snapshot time; results for an older epoch are dropped
    pub epoch: u64,
    pub window: Vec<Reading>,
    pub new_reading_count: usize,
    pub last_distance: f64,
    pub update_distance: bool,
}

/// Push updates delivered to subscribers (UI, exporter, logging)
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MetricsUpdated {
        cadence: f64,
        speed_kmh: f64,
        distance_m: f64,
    },
    VisualisationUpdated(Vec<u8>),
    StateChanged(SessionState),
    Saved(ExportResult),
    ExportFailed(String),
}
