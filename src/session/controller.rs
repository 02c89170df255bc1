//! Session lifecycle, reading ingestion and metrics scheduling.
//!
//! All session data lives in one `SessionCore` behind a single mutex, so a
//! window shift can never interleave with a metrics publish or an export
//! snapshot. Metrics are recomputed on a worker thread from a window
//! snapshot; at most one job is in flight and its result is dropped if the
//! session was cleared in the meantime (epoch mismatch).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};

use super::recording::Session;
use super::supervisor::JobSlot;
use super::worker::run_metrics_worker;
use crate::analysis::KinematicEstimator;
use crate::config::AppConfig;
use crate::export::{ExportError, FileExporter, SessionExporter};
use crate::protocol::parse_frame;
use crate::types::{ExportResult, MetricsJob, RawReading, SessionElement, SessionEvent, SessionState};
use crate::utils::format_device_time;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Sensor is not connected")]
    NotConnected,
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
    #[error("Failed to start metrics worker: {0}")]
    WorkerSpawn(std::io::Error),
}

struct SessionCore {
    state: SessionState,
    session: Session,
    start: Option<DateTime<Utc>>,
    /// 每次清空会话时递增，用于丢弃过期的计算结果
    epoch: u64,
    /// readings admitted since the last completed metrics job
    window_counter: usize,
    visualisation_counter: usize,
}

impl SessionCore {
    fn clear(&mut self) {
        self.epoch += 1;
        self.session.clear();
        self.start = None;
        self.window_counter = 0;
        self.visualisation_counter = 0;
    }
}

struct Shared {
    core: Mutex<SessionCore>,
    slot: JobSlot,
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Subscriber channel full, dropping {:?}", event_name(&event));
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Publish a finished job unless its epoch is stale, then free the slot.
    fn complete_job(&self, job: MetricsJob, element: SessionElement) {
        let published = {
            let mut core = self.lock();
            if core.epoch != job.epoch {
                debug!("Discarding stale metrics result (epoch {}, now {})", job.epoch, core.epoch);
                None
            } else {
                core.window_counter = core.window_counter.saturating_sub(job.new_reading_count);
                let record = core.state.is_recording();
                let element = if record {
                    element
                } else {
                    // 未在录制：距离保持不变
                    SessionElement {
                        distance: core.session.last_distance(),
                        ..element
                    }
                };
                core.session.publish_element(element, record);
                Some(element)
            }
        };
        self.slot.release();

        if let Some(element) = published {
            self.emit(SessionEvent::MetricsUpdated {
                cadence: element.cadence,
                speed_kmh: element.speed_kmh(),
                distance_m: element.distance,
            });
        }
    }
}

fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::MetricsUpdated { .. } => "MetricsUpdated",
        SessionEvent::VisualisationUpdated(_) => "VisualisationUpdated",
        SessionEvent::StateChanged(_) => "StateChanged",
        SessionEvent::Saved(_) => "Saved",
        SessionEvent::ExportFailed(_) => "ExportFailed",
    }
}

pub struct SessionController {
    config: AppConfig,
    shared: Arc<Shared>,
    exporter: Box<dyn SessionExporter>,
    job_sender: Sender<MetricsJob>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Controller exporting to the configured directory
    pub fn new(config: AppConfig) -> Result<Self, SessionError> {
        let exporter = Box::new(FileExporter::from_config(&config));
        Self::with_exporter(config, exporter)
    }

    pub fn with_exporter(config: AppConfig, exporter: Box<dyn SessionExporter>) -> Result<Self, SessionError> {
        let (job_sender, job_receiver) = bounded(1);
        let mut controller = Self::build(config, exporter, job_sender);

        let estimator = KinematicEstimator::new(controller.config.detector.clone());
        let shared = Arc::clone(&controller.shared);
        let shutdown = Arc::clone(&controller.shutdown);
        let worker = thread::Builder::new()
            .name("metrics-worker".to_string())
            .spawn(move || {
                run_metrics_worker(job_receiver, estimator, shutdown, move |job, element| {
                    shared.complete_job(job, element)
                })
            })
            .map_err(SessionError::WorkerSpawn)?;
        controller.worker = Some(worker);

        Ok(controller)
    }

    fn build(config: AppConfig, exporter: Box<dyn SessionExporter>, job_sender: Sender<MetricsJob>) -> Self {
        let session = Session::new(config.session.clone(), config.detector.clone());
        let core = SessionCore {
            state: SessionState::Disconnected,
            session,
            start: None,
            epoch: 0,
            window_counter: 0,
            visualisation_counter: 0,
        };
        Self {
            config,
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                slot: JobSlot::new(),
                subscribers: Mutex::new(Vec::new()),
            }),
            exporter,
            job_sender,
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// New push channel for session events
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = bounded(self.config.channels.event_channel_capacity.max(1));
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn transition(&self, state: SessionState) {
        info!("Session state -> {}", state);
        self.shared.emit(SessionEvent::StateChanged(state));
    }

    pub fn connect(&self) {
        let changed = {
            let mut core = self.shared.lock();
            if core.state == SessionState::Disconnected {
                core.state = SessionState::Connected;
                true
            } else {
                false
            }
        };
        if changed {
            self.transition(SessionState::Connected);
        }
    }

    /// Drop the sensor link; every buffer is cleared.
    pub fn disconnect(&self) {
        let changed = {
            let mut core = self.shared.lock();
            core.clear();
            std::mem::replace(&mut core.state, SessionState::Disconnected) != SessionState::Disconnected
        };
        if changed {
            self.transition(SessionState::Disconnected);
        }
    }

    /// Admit one reading. Returns `false` when the current state does not
    /// accept readings.
    pub fn add_reading(&self, raw: RawReading) -> bool {
        let mut visualisation = None;
        let mut job = None;
        {
            let mut core = self.shared.lock();
            if !core.state.accepts_readings() {
                debug!("Ignoring reading at {} while {}", format_device_time(raw.time), core.state);
                return false;
            }

            if !raw.is_finite() {
                debug!("Dropping non-finite reading at {}", format_device_time(raw.time));
                return false;
            }

            let record = core.state.is_recording();
            core.session.shift_window(raw, record);
            core.window_counter += 1;
            core.visualisation_counter += 1;

            if core.session.window_len() == 0 {
                return true;
            }

            if core.visualisation_counter >= self.config.session.visualisation_update_step {
                core.visualisation_counter = 0;
                visualisation = Some(core.session.visualisation_bytes());
            }

            if core.window_counter >= self.config.session.window_step {
                if self.shared.slot.try_acquire() {
                    job = Some(MetricsJob {
                        epoch: core.epoch,
                        window: core.session.snapshot_window(),
                        new_reading_count: core.window_counter,
                        last_distance: core.session.last_distance(),
                        update_distance: record,
                    });
                } else {
                    debug!("Metrics job still running, {} readings pending", core.window_counter);
                }
            }
        }

        if let Some(bytes) = visualisation {
            self.shared.emit(SessionEvent::VisualisationUpdated(bytes));
        }
        if let Some(job) = job {
            self.dispatch(job);
        }
        true
    }

    /// Decode a wire frame and admit it; malformed frames are dropped.
    pub fn add_frame(&self, bytes: &[u8]) -> bool {
        match parse_frame(bytes) {
            Some(raw) => self.add_reading(raw),
            None => {
                debug!("Dropping malformed frame of {} bytes", bytes.len());
                false
            }
        }
    }

    fn dispatch(&self, job: MetricsJob) {
        match self.job_sender.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Metrics job queue full, skipping update");
                self.shared.slot.release();
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("Metrics worker is gone, skipping update");
                self.shared.slot.release();
            }
        }
    }

    pub fn record(&self) -> Result<(), SessionError> {
        {
            let mut core = self.shared.lock();
            match core.state {
                SessionState::Disconnected => return Err(SessionError::NotConnected),
                SessionState::Exporting => {
                    return Err(SessionError::InvalidState {
                        state: core.state,
                        operation: "record",
                    })
                }
                SessionState::Recording => return Ok(()),
                SessionState::Connected => {}
            }
            let start = *core.start.get_or_insert_with(Utc::now);
            core.state = SessionState::Recording;
            debug!("Recording started at {}", start);
        }
        self.transition(SessionState::Recording);
        Ok(())
    }

    /// Stop accumulating without touching recorded data.
    pub fn pause_recording(&self) -> Result<(), SessionError> {
        {
            let mut core = self.shared.lock();
            match core.state {
                SessionState::Recording => core.state = SessionState::Connected,
                SessionState::Connected => return Ok(()),
                state => {
                    return Err(SessionError::InvalidState {
                        state,
                        operation: "pause recording",
                    })
                }
            }
        }
        self.transition(SessionState::Connected);
        Ok(())
    }

    /// Export the recording and start afresh.
    ///
    /// Buffers are cleared only after a successful export (or when
    /// `export.clear_on_failure` is set); either way the session ends up
    /// `Connected`.
    pub fn stop_recording(&self) -> Result<ExportResult, SessionError> {
        let (epoch, start, readings, elements) = {
            let mut core = self.shared.lock();
            match core.state {
                SessionState::Disconnected => return Err(SessionError::NotConnected),
                SessionState::Exporting => {
                    return Err(SessionError::InvalidState {
                        state: core.state,
                        operation: "stop recording",
                    })
                }
                SessionState::Connected | SessionState::Recording => {}
            }
            core.state = SessionState::Exporting;
            let start = *core.start.get_or_insert_with(Utc::now);
            // 重算结果只用于导出，会话中的实时 elements 保持不变
            let elements = if self.config.export.recalculate_before_export {
                core.session.recalculate_elements(start).unwrap_or_else(|e| {
                    warn!("Skipping element recalculation: {}", e);
                    core.session.elements().to_vec()
                })
            } else {
                core.session.elements().to_vec()
            };
            (core.epoch, start, core.session.readings().to_vec(), elements)
        };
        self.transition(SessionState::Exporting);

        let result = self.exporter.export(&start, &readings, &elements);

        let back_to_connected = {
            let mut core = self.shared.lock();
            let clear = result.is_ok() || self.config.export.clear_on_failure;
            if core.epoch == epoch && clear {
                core.clear();
            }
            if core.state == SessionState::Exporting {
                core.state = SessionState::Connected;
                true
            } else {
                false
            }
        };

        match &result {
            Ok(saved) => self.shared.emit(SessionEvent::Saved(saved.clone())),
            Err(e) => {
                error!("Export failed: {}", e);
                self.shared.emit(SessionEvent::ExportFailed(e.to_string()));
            }
        }
        if back_to_connected {
            self.transition(SessionState::Connected);
        }

        result.map_err(SessionError::from)
    }

    /// Forget the recording and the PCA basis; the lifecycle state is kept.
    pub fn reset(&self) {
        self.shared.lock().clear();
        info!("Session reset");
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.shared.lock().start
    }

    pub fn current_cadence(&self) -> f64 {
        self.shared.lock().session.current_element().cadence
    }

    pub fn current_speed_kmh(&self) -> f64 {
        self.shared.lock().session.current_element().speed_kmh()
    }

    pub fn current_distance_m(&self) -> f64 {
        self.shared.lock().session.current_element().distance
    }

    pub fn visualisation_bytes(&self) -> Vec<u8> {
        self.shared.lock().session.visualisation_bytes()
    }

    /// Readings admitted since the last completed metrics update
    pub fn pending_reading_count(&self) -> usize {
        self.shared.lock().window_counter
    }

    pub fn is_computing(&self) -> bool {
        self.shared.slot.is_busy()
    }

    /// Read-only access to the session under the lock
    pub fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.shared.lock().session)
    }

    /// Controller without a worker thread; jobs are left on the returned
    /// receiver.
    #[cfg(test)]
    fn detached(config: AppConfig) -> (Self, Receiver<MetricsJob>) {
        let (job_sender, job_receiver) = bounded(1);
        let exporter = Box::new(FileExporter::from_config(&config));
        (Self::build(config, exporter, job_sender), job_receiver)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Metrics worker panicked");
            }
        }
    }
}
