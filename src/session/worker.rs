use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info};

use crate::analysis::KinematicEstimator;
use crate::types::{MetricsJob, SessionElement};

/// 轮询关闭信号的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Metrics worker loop.
///
/// Runs each job off the ingestion path and hands the result to
/// `complete`, which is responsible for publishing it (or discarding it)
/// and releasing the job slot. Exits on shutdown or when every job sender
/// is gone.
pub fn run_metrics_worker<F>(
    job_receiver: Receiver<MetricsJob>,
    estimator: KinematicEstimator,
    shutdown_signal: Arc<AtomicBool>,
    complete: F,
) where
    F: Fn(MetricsJob, SessionElement),
{
    info!("Metrics worker thread started");

    while !shutdown_signal.load(Ordering::Relaxed) {
        match job_receiver.recv_timeout(POLL_INTERVAL) {
            Ok(job) => {
                let element = estimator.compute_window_metrics(
                    &job.window,
                    job.new_reading_count,
                    job.last_distance,
                    job.update_distance,
                );
                debug!(
                    "Metrics job (epoch {}, {} new readings): cadence {:.1}, speed {:.2} m/s",
                    job.epoch, job.new_reading_count, element.cadence, element.speed
                );
                complete(job, element);
            }
            Err(RecvTimeoutError::Timeout) => {
                // 超时，继续检查关闭信号
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!("Metrics worker: job channel disconnected, exiting");
                break;
            }
        }
    }

    info!("Metrics worker thread exiting gracefully");
}
