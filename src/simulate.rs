//! Synthetic running trace, used in place of a live sensor.
//!
//! Every step is a triangular acceleration spike along `direction` on top
//! of a constant negative baseline, sized so each step period integrates to
//! zero. Two slow sinusoids on the perpendicular axes and gravity on z
//! make the trace look like a foot-mounted IMU.

use std::f64::consts::TAU;

use nalgebra::Vector3;
use rand::Rng;

use crate::types::{RawReading, G};

#[derive(Debug, Clone, PartialEq)]
pub struct RunProfile {
    pub sample_interval_millis: u32,
    /// samples between consecutive steps
    pub step_period: usize,
    /// index of the first step
    pub first_step: usize,
    /// half width of a step spike (samples)
    pub spike_half_width: usize,
    /// baseline deceleration between steps (m/s²)
    pub baseline: f64,
    /// dominant acceleration axis
    pub direction: Vector3<f64>,
    /// uniform noise amplitude added to every axis (g)
    pub jitter_g: f64,
}

impl Default for RunProfile {
    fn default() -> Self {
        Self {
            sample_interval_millis: 10,
            step_period: 70,
            first_step: 20,
            spike_half_width: 6,
            baseline: 13.95,
            direction: Vector3::new(0.28, 0.0, 0.96),
            jitter_g: 0.0,
        }
    }
}

impl RunProfile {
    /// Peak-to-baseline spike height (m/s²)
    pub fn spike_amplitude(&self) -> f64 {
        self.step_period as f64 * self.baseline / self.spike_half_width.max(1) as f64
    }

    /// Steps per minute of the generated trace
    pub fn cadence(&self) -> f64 {
        60_000.0 / (self.step_period as f64 * self.sample_interval_millis as f64)
    }

    /// Signal along `direction` at sample `index` (m/s²)
    pub fn step_signal(&self, index: usize) -> f64 {
        let period = self.step_period.max(1);
        let phase = (index + period - self.first_step % period) % period;
        let distance = phase.min(period - phase) as f64;
        let spike = (1.0 - distance / self.spike_half_width.max(1) as f64).max(0.0);
        self.spike_amplitude() * spike - self.baseline
    }
}

/// `count` readings starting at device time `start_time`, acceleration in g.
pub fn synthetic_run<R: Rng + ?Sized>(
    profile: &RunProfile,
    start_time: u32,
    count: usize,
    rng: &mut R,
) -> Vec<RawReading> {
    let along = profile.direction.normalize();
    let lateral = Vector3::y();
    let across = along.cross(&lateral).normalize();

    (0..count)
        .map(|i| {
            let time = start_time.wrapping_add(profile.sample_interval_millis.wrapping_mul(i as u32));
            let t = (i as f64 * profile.sample_interval_millis as f64) / 1000.0;

            let acceleration = along * profile.step_signal(i)
                + lateral * (0.5 * (TAU * 1.3 * t).sin())
                + across * (0.3 * (TAU * 0.9 * t).sin())
                + Vector3::new(0.0, 0.0, G);
            let mut acceleration = acceleration / G;
            if profile.jitter_g > 0.0 {
                for v in acceleration.iter_mut() {
                    *v += rng.random_range(-profile.jitter_g..profile.jitter_g);
                }
            }

            // 步态周期内的足部转动 (deg/s)
            let phase = TAU * i as f64 / profile.step_period.max(1) as f64;
            let angular_velocity = Vector3::new(
                120.0 * phase.sin(),
                15.0 * (2.0 * phase).cos(),
                8.0 * phase.cos(),
            );

            RawReading::new(time, acceleration, angular_velocity)
        })
        .collect()
}
