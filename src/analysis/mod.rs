pub mod kinematics;
pub mod pca;
pub mod peaks;

pub use kinematics::{compute_window_metrics, cumtrapz, KinematicEstimator};
pub use pca::{IncrementalPca, PcaError, PcaState};
pub use peaks::{find_step_peaks, StepDetector};
