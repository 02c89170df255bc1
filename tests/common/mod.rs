#![allow(dead_code)]

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use stride_hub::simulate::{synthetic_run, RunProfile};
use stride_hub::{AppConfig, RawReading, SessionController};

/// Device time of the first synthetic reading (ms)
pub const TRACE_START: u32 = 1000;

/// Deterministic 100 Hz running trace: a step every 0.7 s, first step at
/// sample 20.
pub fn running_trace(count: usize) -> Vec<RawReading> {
    let mut rng = StdRng::seed_from_u64(42);
    synthetic_run(&RunProfile::default(), TRACE_START, count, &mut rng)
}

/// Fresh, empty scratch directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("stridehub-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

pub fn config_exporting_to(dir: &PathBuf) -> AppConfig {
    let mut config = AppConfig::default();
    config.export.directory = dir.display().to_string();
    config
}

/// Block until no metrics job is in flight
pub fn wait_idle(controller: &SessionController) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while controller.is_computing() {
        assert!(Instant::now() < deadline, "metrics worker did not finish");
        thread::sleep(Duration::from_millis(5));
    }
}
