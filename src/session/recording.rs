//! Session data: PCA engine, sliding window and recorded buffers.
//!
//! Not synchronised; the controller keeps it behind its lock.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use nalgebra::Vector3;

use crate::analysis::{IncrementalPca, KinematicEstimator, PcaError};
use crate::config::{DetectorConfig, SessionConfig};
use crate::types::{RawReading, Reading, SessionElement, G};

/// 批量重算的时间步长 (ms)
const RECALCULATION_STEP_MILLIS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    estimator: KinematicEstimator,
    pca: IncrementalPca,
    /// PCA 初始化前缓存的读数，附带到达时是否在录制
    seed: Vec<(RawReading, bool)>,
    window: VecDeque<Reading>,
    readings: Vec<Reading>,
    elements: Vec<SessionElement>,
    current: SessionElement,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default(), DetectorConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig, detector: DetectorConfig) -> Self {
        let window_size = config.window_size();
        Self {
            seed: Vec::with_capacity(config.pca_initial_size),
            window: VecDeque::with_capacity(window_size),
            config,
            estimator: KinematicEstimator::new(detector),
            pca: IncrementalPca::new(),
            readings: Vec::new(),
            elements: Vec::new(),
            current: SessionElement::zero(Utc::now()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn estimator(&self) -> &KinematicEstimator {
        &self.estimator
    }

    pub fn window_size(&self) -> usize {
        self.config.window_size()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn is_pca_initialized(&self) -> bool {
        self.pca.is_initialized()
    }

    pub fn pca(&self) -> &IncrementalPca {
        &self.pca
    }

    pub fn window(&self) -> &VecDeque<Reading> {
        &self.window
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn elements(&self) -> &[SessionElement] {
        &self.elements
    }

    pub fn current_element(&self) -> &SessionElement {
        &self.current
    }

    /// Feed one reading through PCA into the window.
    ///
    /// Until `pca_initial_size` readings have arrived they are only
    /// buffered and `None` is returned. The reading that completes the seed
    /// initialises the basis, pads the window to `window_size` with blank
    /// readings and returns its own projection. `record` decides whether
    /// the enriched reading is kept for export.
    pub fn shift_window(&mut self, raw: RawReading, record: bool) -> Option<Reading> {
        if self.pca.is_initialized() {
            let pcs = match self.pca.update(&raw.acceleration_ms2()) {
                Ok(pcs) => pcs,
                Err(e) => {
                    warn!("PCA update failed: {}", e);
                    return None;
                }
            };
            let reading = raw.with_projection(pcs);
            self.push_window(reading, record);
            return Some(reading);
        }

        self.seed.push((raw, record));
        if self.seed.len() < self.config.pca_initial_size.max(2) {
            return None;
        }
        self.initialize_window()
    }

    fn initialize_window(&mut self) -> Option<Reading> {
        let samples: Vec<Vector3<f64>> = self.seed.iter().map(|(raw, _)| raw.acceleration_ms2()).collect();
        let projections = match self.pca.initialize(&samples) {
            Ok(projections) => projections,
            Err(e) => {
                warn!("PCA initialisation failed: {}", e);
                return None;
            }
        };

        let seed = std::mem::take(&mut self.seed);
        let window_size = self.window_size();
        let first_time = seed.first().map(|(raw, _)| raw.time).unwrap_or(0);

        self.window.clear();
        for _ in seed.len()..window_size {
            self.window.push_back(Reading::blank(first_time));
        }

        let mut last = None;
        for ((raw, record), pcs) in seed.into_iter().zip(projections) {
            let reading = raw.with_projection(pcs);
            self.push_window(reading, record);
            last = Some(reading);
        }

        info!(
            "PCA initialised from {} readings, window holds {} of {}",
            self.config.pca_initial_size,
            self.window.len(),
            window_size
        );
        last
    }

    fn push_window(&mut self, reading: Reading, record: bool) {
        self.window.push_back(reading);
        while self.window.len() > self.window_size() {
            self.window.pop_front();
        }
        if record {
            self.readings.push(reading);
        }
    }

    pub fn snapshot_window(&self) -> Vec<Reading> {
        self.window.iter().copied().collect()
    }

    /// Distance carried into the next metrics update
    pub fn last_distance(&self) -> f64 {
        self.current.distance
    }

    /// Store `element` as the live metrics; recorded sessions keep it.
    pub fn publish_element(&mut self, element: SessionElement, record: bool) {
        self.current = element;
        if record {
            self.elements.push(element);
        }
    }

    /// Recompute metrics on the current window in place.
    pub fn update_window_metrics(&mut self, new_reading_count: usize, is_recording: bool) -> SessionElement {
        let window = self.snapshot_window();
        let element = self.estimator.compute_window_metrics(
            &window,
            new_reading_count,
            self.last_distance(),
            is_recording,
        );
        self.publish_element(element, is_recording);
        element
    }

    /// 窗口 PC0 映射到 0..=255，量程 ±visualisation_range_g
    pub fn visualisation_bytes(&self) -> Vec<u8> {
        let max = self.config.visualisation_range_g * G;
        let min = -max;
        self.window
            .iter()
            .map(|r| scale_to_byte(r.pc0(), min, max))
            .collect()
    }

    /// Empty every buffer and forget the PCA basis.
    pub fn clear(&mut self) {
        self.pca.reset();
        self.seed.clear();
        self.window.clear();
        self.readings.clear();
        self.elements.clear();
        self.current = SessionElement::zero(Utc::now());
        debug!("Session cleared");
    }

    /// Batch re-analysis of the whole recording. The live `elements` are
    /// left as they are.
    ///
    /// One PCA basis is fitted over every recorded reading, then metrics are
    /// computed at 1 s steps over trailing windows of `window_size_millis`.
    /// Element timestamps are `start` plus the device time offset.
    pub fn recalculate_elements(&self, start: DateTime<Utc>) -> Result<Vec<SessionElement>, PcaError> {
        let samples: Vec<Vector3<f64>> = self.readings.iter().map(Reading::acceleration_ms2).collect();
        let mut batch = IncrementalPca::new();
        let projections = batch.initialize(&samples)?;
        let projected: Vec<Reading> = self
            .readings
            .iter()
            .zip(projections)
            .map(|(r, pcs)| r.raw().with_projection(pcs))
            .collect();

        let (first_ms, last_ms) = match (projected.first(), projected.last()) {
            (Some(first), Some(last)) => (first.time(), last.time()),
            _ => return Ok(Vec::new()),
        };
        let window_ms = self.config.window_size_millis;

        let mut elements = Vec::new();
        let mut distance = 0.0;
        let mut time = first_ms.saturating_add(RECALCULATION_STEP_MILLIS);
        let end = last_ms.saturating_add(window_ms);
        while time <= end {
            let lower = projected.partition_point(|r| r.time() < time.saturating_sub(window_ms));
            let upper = projected.partition_point(|r| r.time() <= time);
            let fresh_from = projected.partition_point(|r| r.time() <= time.saturating_sub(RECALCULATION_STEP_MILLIS));
            let new_count = upper.saturating_sub(fresh_from.max(lower));

            let timestamp = start + Duration::milliseconds(i64::from(time - first_ms));
            let element = self.estimator.compute_window_metrics_at(
                timestamp,
                &projected[lower..upper],
                new_count,
                distance,
                true,
            );
            distance = element.distance;
            elements.push(element);

            time = match time.checked_add(RECALCULATION_STEP_MILLIS) {
                Some(next) => next,
                None => break,
            };
        }

        info!(
            "Recalculated {} elements over {} readings ({} ms)",
            elements.len(),
            projected.len(),
            last_ms - first_ms
        );
        Ok(elements)
    }
}

fn scale_to_byte(value: f64, min: f64, max: f64) -> u8 {
    let scaled = ((value - min) / (max - min) * 255.0).floor();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, 255.0) as u8
}
