//! Gait metrics from a wearable IMU stream.
//!
//! Readings flow through an incremental PCA engine into a sliding window;
//! steps are detected on the first principal component and integrated into
//! cadence, speed and distance. [`session::SessionController`] owns the
//! lifecycle and pushes typed [`types::SessionEvent`]s to subscribers.

pub mod analysis;
pub mod config;
pub mod export;
pub mod logger;
pub mod protocol;
pub mod session;
pub mod simulate;
pub mod types;
pub mod utils;

pub use analysis::{compute_window_metrics, cumtrapz, find_step_peaks, IncrementalPca, KinematicEstimator, PcaError};
pub use config::{AppConfig, ConfigError, ConfigManager};
pub use export::{ExportError, FileExporter, SessionExporter};
pub use protocol::{encode_frame, parse_frame, FRAME_SIZE};
pub use session::{Session, SessionController, SessionError};
pub use types::{ExportResult, RawReading, Reading, SessionElement, SessionEvent, SessionState};
