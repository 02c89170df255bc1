//! Cadence, speed and distance from a window of projected readings.

use chrono::{DateTime, Utc};

use super::peaks::StepDetector;
use crate::config::DetectorConfig;
use crate::types::{Reading, SessionElement};

/// Cumulative trapezoidal integral of `y` over `x`.
///
/// Returns one value per interval (`len - 1` values); mismatched or short
/// inputs are integrated over their common prefix.
pub fn cumtrapz(y: &[f64], x: &[f64]) -> Vec<f64> {
    let mut sum = 0.0;
    y.windows(2)
        .zip(x.windows(2))
        .map(|(yy, xx)| {
            sum += (yy[0] + yy[1]) / 2.0 * (xx[1] - xx[0]);
            sum
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct KinematicEstimator {
    detector: StepDetector,
}

impl KinematicEstimator {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            detector: StepDetector::new(config),
        }
    }

    pub fn compute_window_metrics(
        &self,
        window: &[Reading],
        new_reading_count: usize,
        last_distance: f64,
        update_distance: bool,
    ) -> SessionElement {
        self.compute_window_metrics_at(Utc::now(), window, new_reading_count, last_distance, update_distance)
    }

    /// Metrics for `window`, stamped with `timestamp`.
    ///
    /// Distance advances by `speed × duration` of the `new_reading_count`
    /// most recent readings only, so overlapping windows never count the
    /// same stretch twice.
    pub fn compute_window_metrics_at(
        &self,
        timestamp: DateTime<Utc>,
        window: &[Reading],
        new_reading_count: usize,
        last_distance: f64,
        update_distance: bool,
    ) -> SessionElement {
        let (first, last) = match (window.first(), window.last()) {
            (Some(first), Some(last)) if window.len() >= 2 => (first.time(), last.time()),
            _ => return SessionElement::new(timestamp, 0.0, 0.0, last_distance),
        };

        let pc0: Vec<f64> = window.iter().map(Reading::pc0).collect();
        let t: Vec<f64> = window
            .iter()
            .map(|r| r.time().saturating_sub(first) as f64 / 1000.0)
            .collect();

        let peaks = self.detector.find_peaks(&pc0);

        let window_duration_ms = last.saturating_sub(first);
        let cadence = if window_duration_ms == 0 {
            0.0
        } else {
            peaks.len() as f64 / window_duration_ms as f64 * 60000.0
        };

        let speed = window_speed(&pc0, &t, &peaks);

        let distance = if update_distance {
            let recent_ms = recent_duration_ms(window, new_reading_count);
            last_distance + speed * (recent_ms as f64 / 1000.0)
        } else {
            last_distance
        };

        SessionElement::new(timestamp, cadence, speed, distance)
    }
}

/// [`KinematicEstimator::compute_window_metrics`] with default thresholds
pub fn compute_window_metrics(
    window: &[Reading],
    new_reading_count: usize,
    last_distance: f64,
    update_distance: bool,
) -> SessionElement {
    KinematicEstimator::default().compute_window_metrics(window, new_reading_count, last_distance, update_distance)
}

/// Mean per-step peak speed.
///
/// Segment edges sit halfway between consecutive entries of
/// `{0, peaks.., len - 1}`, so each segment holds exactly one step.
fn window_speed(pc0: &[f64], t: &[f64], peaks: &[usize]) -> f64 {
    if peaks.is_empty() || pc0.len() < 2 {
        return 0.0;
    }

    let mut bounds = Vec::with_capacity(peaks.len() + 2);
    bounds.push(0);
    bounds.extend_from_slice(peaks);
    bounds.push(pc0.len() - 1);

    let edges: Vec<usize> = bounds.windows(2).map(|b| (b[0] + b[1]) / 2).collect();
    let speeds: Vec<f64> = edges
        .windows(2)
        .map(|e| segment_peak_speed(&pc0[e[0]..=e[1]], &t[e[0]..=e[1]]))
        .collect();

    if speeds.is_empty() {
        return 0.0;
    }
    speeds.iter().sum::<f64>() / speeds.len() as f64
}

fn segment_peak_speed(acceleration: &[f64], t: &[f64]) -> f64 {
    cumtrapz(acceleration, t)
        .into_iter()
        .fold(0.0, |peak, v| peak.max(v.abs()))
}

/// Time covered by the `count` newest readings, measured from the reading
/// just before them (clamped to the window start).
fn recent_duration_ms(window: &[Reading], count: usize) -> u32 {
    if count == 0 || window.len() < 2 {
        return 0;
    }
    let span = (count + 1).min(window.len());
    let first = window[window.len() - span].time();
    let last = window[window.len() - 1].time();
    last.saturating_sub(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawReading;
    use nalgebra::Vector3;

    /// Triangular spikes every `period` samples on a constant baseline,
    /// zero mean per period.
    fn pulse_window(len: usize, period: usize, first_peak: usize, baseline: f64) -> Vec<Reading> {
        let half_width = 6.0;
        let amplitude = period as f64 * baseline / half_width;
        (0..len)
            .map(|j| {
                let phase = (j + period - first_peak % period) % period;
                let d = phase.min(period - phase) as f64;
                let pulse = amplitude * (1.0 - d / half_width).max(0.0);
                RawReading::new(1000 + 10 * j as u32, Vector3::zeros(), Vector3::zeros())
                    .with_projection(Vector3::new(pulse - baseline, 0.0, 0.0))
            })
            .collect()
    }

    #[test]
    fn cumtrapz_matches_linear_integral() {
        let x = [0.0, 1.0, 1.5, 2.0, 3.3];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let expected = [2.0, 3.75, 6.0, 14.19];
        let output = cumtrapz(&y, &x);
        assert_eq!(output.len(), expected.len());
        for (a, b) in output.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
        }
    }

    #[test]
    fn cumtrapz_of_short_input_is_empty() {
        assert!(cumtrapz(&[1.0], &[0.0]).is_empty());
        assert!(cumtrapz(&[], &[]).is_empty());
    }

    #[test]
    fn zero_window_yields_zero_metrics() {
        let window = vec![Reading::blank(0); 1000];
        let element = compute_window_metrics(&window, 100, 12.5, true);
        assert_eq!(element.cadence, 0.0);
        assert_eq!(element.speed, 0.0);
        assert_eq!(element.distance, 12.5);

        let window: Vec<Reading> = (0..1000).map(|i| Reading::blank(i * 10)).collect();
        let element = compute_window_metrics(&window, 100, 12.5, true);
        assert_eq!((element.cadence, element.speed, element.distance), (0.0, 0.0, 12.5));
    }

    #[test]
    fn tiny_windows_are_degenerate() {
        assert_eq!(compute_window_metrics(&[], 0, 3.0, true).distance, 3.0);
        let one = [Reading::blank(10)];
        let element = compute_window_metrics(&one, 1, 3.0, true);
        assert_eq!((element.cadence, element.speed, element.distance), (0.0, 0.0, 3.0));
    }

    #[test]
    fn pulse_train_cadence_and_speed() {
        // 峰值位于 30, 100, ..., 940，共 14 步
        let window = pulse_window(1000, 70, 30, 12.0);
        let element = compute_window_metrics(&window, 100, 0.0, false);

        assert!((element.cadence - 14.0 / 9990.0 * 60000.0).abs() < 1e-9);
        // 首段 5.88333，其余 13 段各 3.48333
        let expected_speed = (5.883_333_333 + 13.0 * 3.483_333_333) / 14.0;
        assert!((element.speed - expected_speed).abs() < 1e-6, "speed {}", element.speed);
        assert_eq!(element.distance, 0.0);
    }

    #[test]
    fn distance_spans_only_new_readings() {
        let window = pulse_window(1000, 70, 30, 12.0);
        let element = compute_window_metrics(&window, 100, 10.0, true);
        // 100 个新读数跨越 1.0 s
        assert!((element.distance - (10.0 + element.speed * 1.0)).abs() < 1e-9);

        let whole = compute_window_metrics(&window, 5000, 0.0, true);
        assert!((whole.distance - whole.speed * 9.99).abs() < 1e-9);
    }

    #[test]
    fn distance_is_monotonic_while_recording_and_frozen_otherwise() {
        let window = pulse_window(1000, 70, 30, 12.0);
        let mut distance = 0.0;
        for _ in 0..5 {
            let element = compute_window_metrics(&window, 100, distance, true);
            assert!(element.distance >= distance);
            distance = element.distance;
        }
        let frozen = compute_window_metrics(&window, 100, distance, false);
        assert_eq!(frozen.distance, distance);
    }

    #[test]
    fn timestamp_is_passed_through() {
        let now = Utc::now();
        let estimator = KinematicEstimator::default();
        let element = estimator.compute_window_metrics_at(now, &[], 0, 0.0, false);
        assert_eq!(element.timestamp, now);
    }
}
