//! Ambient wind field with a diurnal cycle and AR(1) turbulence.

use chrono::{DateTime, Timelike, Utc};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::gaussian_noise;
use crate::sim::clock::Clock;

/// Parameters of the farm-level ambient wind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindParams {
    /// Mean wind speed at reference height (m/s).
    pub base_speed_mps: f64,
    /// Amplitude of the daily sinusoid (m/s).
    pub daily_amplitude_mps: f64,
    /// Hour of day (UTC, fractional) at which the sinusoid peaks.
    pub peak_hour: f64,
    /// AR(1) correlation of turbulence between ticks (0 = white noise).
    pub turbulence_alpha: f64,
    /// Stationary standard deviation of turbulence (m/s).
    pub turbulence_std_mps: f64,
    /// Mean meteorological direction the wind blows from (degrees).
    pub base_direction_deg: f64,
    /// Stationary standard deviation of direction wander (degrees).
    pub direction_std_deg: f64,
    /// Height the speeds above refer to (m).
    pub reference_height_m: f64,
    /// Power-law shear exponent.
    pub shear_exponent: f64,
    /// Air density (kg/m³) for the power curve, if modelled.
    pub air_density: Option<f64>,
}

impl Default for WindParams {
    fn default() -> Self {
        Self {
            base_speed_mps: 8.0,
            daily_amplitude_mps: 2.0,
            peak_hour: 15.0,
            turbulence_alpha: 0.9,
            turbulence_std_mps: 0.6,
            base_direction_deg: 220.0,
            direction_std_deg: 8.0,
            reference_height_m: 80.0,
            shear_exponent: 0.14,
            air_density: None,
        }
    }
}

/// One ambient sample: farm-level speed at reference height and direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    /// Tick timestamp.
    pub timestamp: DateTime<Utc>,
    /// Ambient speed at reference height (m/s, never negative).
    pub speed_mps: f64,
    /// Direction the wind blows from, in `[0, 360)` degrees.
    pub direction_deg: f64,
}

/// Seeded ambient wind model.
///
/// Same seed and same clock always yield a bit-identical sample sequence.
#[derive(Debug, Clone)]
pub struct WindField {
    params: WindParams,
    seed: u64,
}

impl WindField {
    /// Creates a wind field.
    pub fn new(params: WindParams, seed: u64) -> Self {
        Self { params, seed }
    }

    /// Model parameters.
    pub fn params(&self) -> &WindParams {
        &self.params
    }

    /// Lazy sample sequence, one per clock tick.
    pub fn samples(&self, clock: Clock) -> WindSamples {
        WindSamples {
            params: self.params.clone(),
            clock,
            rng: StdRng::seed_from_u64(self.seed),
            turbulence: 0.0,
            direction_wander: 0.0,
        }
    }

    /// Scales a reference-height speed to `hub_height_m` with the power law.
    pub fn at_hub_height(&self, speed_mps: f64, hub_height_m: f64) -> f64 {
        let p = &self.params;
        if p.reference_height_m <= 0.0 || hub_height_m <= 0.0 {
            return speed_mps;
        }
        speed_mps * (hub_height_m / p.reference_height_m).powf(p.shear_exponent)
    }
}

/// Iterator over [`WindSample`]s produced by [`WindField::samples`].
#[derive(Debug, Clone)]
pub struct WindSamples {
    params: WindParams,
    clock: Clock,
    rng: StdRng,
    turbulence: f64,
    direction_wander: f64,
}

impl WindSamples {
    /// AR(1) step with stationary standard deviation `std`:
    /// `x(t) = a * x(t-1) + sqrt(1 - a^2) * eps(t)`.
    fn ar1(rng: &mut StdRng, prev: f64, alpha: f64, std: f64) -> f64 {
        let a = alpha.clamp(0.0, 0.999);
        a * prev + (1.0 - a * a).sqrt() * gaussian_noise(rng, std)
    }
}

impl Iterator for WindSamples {
    type Item = WindSample;

    fn next(&mut self) -> Option<WindSample> {
        let (_, timestamp) = self.clock.tick()?;
        let p = &self.params;

        self.turbulence = Self::ar1(
            &mut self.rng,
            self.turbulence,
            p.turbulence_alpha,
            p.turbulence_std_mps,
        );
        self.direction_wander = Self::ar1(
            &mut self.rng,
            self.direction_wander,
            p.turbulence_alpha,
            p.direction_std_deg,
        );

        let hour = f64::from(timestamp.num_seconds_from_midnight()) / 3600.0;
        let phase = 2.0 * std::f64::consts::PI * (hour - p.peak_hour) / 24.0;
        let speed = p.base_speed_mps + p.daily_amplitude_mps * phase.cos() + self.turbulence;

        Some(WindSample {
            timestamp,
            speed_mps: speed.max(0.0),
            direction_deg: (p.base_direction_deg + self.direction_wander).rem_euclid(360.0),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.clock.remaining();
        (left, Some(left))
    }
}
