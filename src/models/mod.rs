//! Physical models: farm layout, ambient wind, wake interaction, power curve.

pub mod layout;
pub mod power_curve;
pub mod wake;
pub mod wind_field;

pub use layout::{FarmLayout, GeoReference, Turbine, TurbineType};
pub use power_curve::{CurveShape, Operation, PowerCurve, TurbineStatus};
pub use wake::{CombinationRule, DeficitModel, WakeModel};
pub use wind_field::{WindField, WindParams, WindSample, WindSamples};

use rand::{Rng, rngs::StdRng};

/// Generates a Gaussian noise sample using the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// A normally distributed sample with mean 0 and the given standard deviation.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
