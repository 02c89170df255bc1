//! Step detection on the first principal component.
//!
//! Steps show up as acceleration spikes on the dominant axis. A step is a
//! local maximum that survives two filters, applied in order:
//! - minimum separation: of two peaks closer than `min_peak_distance`
//!   samples only the taller one is kept (highest peaks claim their
//!   neighbourhood first);
//! - minimum height: the peak value must exceed `min_peak_height`.

use std::cmp::Ordering;

use crate::config::DetectorConfig;

#[derive(Debug, Clone, Default)]
pub struct StepDetector {
    config: DetectorConfig,
}

impl StepDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Ascending indices of detected steps in `signal`
    pub fn find_peaks(&self, signal: &[f64]) -> Vec<usize> {
        let maxima = local_maxima(signal);
        let spaced = select_by_distance(signal, &maxima, self.config.min_peak_distance);
        spaced
            .into_iter()
            .filter(|&i| signal[i] > self.config.min_peak_height)
            .collect()
    }
}

/// [`StepDetector::find_peaks`] with the default thresholds
pub fn find_step_peaks(signal: &[f64]) -> Vec<usize> {
    StepDetector::default().find_peaks(signal)
}

/// Strict local maxima. A flat top counts once, at its middle sample; the
/// first and last samples are never peaks.
fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if signal.len() < 3 {
        return peaks;
    }

    let last = signal.len() - 1;
    let mut i = 1;
    while i < last {
        if signal[i - 1] < signal[i] {
            // 跳过平顶
            let mut ahead = i + 1;
            while ahead < last && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(signal: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut keep = vec![true; peaks.len()];
    let mut priority: Vec<usize> = (0..peaks.len()).collect();
    priority.sort_by(|&a, &b| {
        signal[peaks[a]]
            .partial_cmp(&signal[peaks[b]])
            .unwrap_or(Ordering::Equal)
    });

    for &i in priority.iter().rev() {
        if !keep[i] {
            continue;
        }

        let mut k = i;
        while k > 0 && peaks[i] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = i + 1;
        while k < peaks.len() && peaks[k] - peaks[i] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}
