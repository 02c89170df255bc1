pub mod controller;
pub mod recording;
pub mod supervisor;
pub mod worker;

pub use controller::{SessionController, SessionError};
pub use recording::Session;
pub use supervisor::JobSlot;
pub use worker::run_metrics_worker;
