pub mod reading;
pub mod element;
pub mod results;
pub mod state;
pub mod tasks;

pub use reading::{RawReading, Reading, G};
pub use element::{SessionElement, MPS_TO_KMPH};
pub use results::ExportResult;
pub use state::SessionState;
pub use tasks::{MetricsJob, SessionEvent};
