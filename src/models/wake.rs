//! Wake interaction: effective wind speed at each turbine after upstream deficits.
//!
//! Directions are meteorological: `direction_deg` is where the wind blows
//! *from*, clockwise from north. Layout coordinates are `x` east, `y` north.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::layout::Turbine;

/// Single-wake velocity deficit model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeficitModel {
    /// Jensen/Park top-hat wake expanding linearly, weighted by the fraction
    /// of the downstream rotor inside the wake cone.
    Jensen {
        /// Rotor thrust coefficient `Ct` in `(0, 1)`.
        thrust_coefficient: f64,
        /// Wake decay (expansion) constant `k`.
        decay_constant: f64,
    },
    /// Deficit `strength * exp(-c^2 / 2 sigma^2) * exp(-d / decay_length)`.
    Gaussian {
        /// Deficit directly behind the source at zero distance.
        strength: f64,
        /// Downstream e-folding length (m).
        decay_length_m: f64,
        /// Crosswind standard deviation (m).
        crosswind_sigma_m: f64,
        /// Contributions below this are outside the wake cone.
        cutoff: f64,
    },
}

impl DeficitModel {
    /// Fractional speed deficit a source imposes on a rotor `downstream_m`
    /// behind it and `crosswind_m` to the side. Zero when not downstream.
    pub fn deficit(&self, downstream_m: f64, crosswind_m: f64, rotor_diameter_m: f64) -> f64 {
        if downstream_m <= 0.0 {
            return 0.0;
        }
        match *self {
            Self::Jensen {
                thrust_coefficient,
                decay_constant,
            } => {
                let r = rotor_diameter_m / 2.0;
                if r <= 0.0 {
                    return 0.0;
                }
                let wake_r = r + decay_constant * downstream_m;
                let overlap = circle_overlap(wake_r, r, crosswind_m) / (std::f64::consts::PI * r * r);
                if overlap <= 0.0 {
                    return 0.0;
                }
                let centreline = (1.0 - (1.0 - thrust_coefficient).max(0.0).sqrt())
                    / (1.0 + decay_constant * downstream_m / r).powi(2);
                centreline * overlap.min(1.0)
            }
            Self::Gaussian {
                strength,
                decay_length_m,
                crosswind_sigma_m,
                cutoff,
            } => {
                let cross = (-(crosswind_m * crosswind_m)
                    / (2.0 * crosswind_sigma_m * crosswind_sigma_m))
                    .exp();
                let d = strength * cross * (-downstream_m / decay_length_m).exp();
                if d < cutoff { 0.0 } else { d }
            }
        }
    }
}

/// Area of the intersection of two circles whose centres are `dist` apart.
fn circle_overlap(r1: f64, r2: f64, dist: f64) -> f64 {
    let d = dist.abs();
    if d >= r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        let r = r1.min(r2);
        return std::f64::consts::PI * r * r;
    }
    let a1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0).acos();
    let a2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0).acos();
    let k = ((-d + r1 + r2) * (d + r1 - r2) * (d - r1 + r2) * (d + r1 + r2)).max(0.0);
    r1 * r1 * a1 + r2 * r2 * a2 - 0.5 * k.sqrt()
}

/// Strategy combining deficits from several upstream turbines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    /// Linear superposition: `sum(d_i)`.
    Linear,
    /// Root of the sum of squares: `sqrt(sum(d_i^2))`.
    SumOfSquares,
    /// Largest single deficit.
    Dominant,
    /// Multiplicative: `1 - prod(1 - d_i)`.
    Product,
}

impl CombinationRule {
    /// Configuration names, in declaration order.
    pub const NAMES: &[&str] = &["linear", "sum_of_squares", "dominant", "product"];

    /// Parses a configuration name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "sum_of_squares" => Some(Self::SumOfSquares),
            "dominant" => Some(Self::Dominant),
            "product" => Some(Self::Product),
            _ => None,
        }
    }

    /// Combines individual deficits into one fractional deficit.
    pub fn combine(self, deficits: &[f64]) -> f64 {
        match self {
            Self::Linear => deficits.iter().sum(),
            Self::SumOfSquares => deficits.iter().map(|d| d * d).sum::<f64>().sqrt(),
            Self::Dominant => deficits.iter().copied().fold(0.0, f64::max),
            Self::Product => 1.0 - deficits.iter().map(|d| 1.0 - d).product::<f64>(),
        }
    }
}

/// Wake interaction model: a deficit model plus a combination rule, or none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeModel {
    /// `None` disables wakes: effective speed equals ambient speed.
    pub deficit: Option<DeficitModel>,
    /// How multiple upstream deficits combine.
    pub combination: CombinationRule,
}

impl WakeModel {
    /// Model with wakes disabled.
    pub fn none() -> Self {
        Self {
            deficit: None,
            combination: CombinationRule::SumOfSquares,
        }
    }

    /// Model with the given deficit model and combination rule.
    pub fn new(deficit: DeficitModel, combination: CombinationRule) -> Self {
        Self {
            deficit: Some(deficit),
            combination,
        }
    }

    /// Whether any wake is applied.
    pub fn is_enabled(&self) -> bool {
        self.deficit.is_some()
    }

    /// Effective wind speed at every turbine, in input order.
    ///
    /// Upstream turbines are visited most-upwind first, ties broken by
    /// `turbine_id`, so the result depends on turbine identity and not on the
    /// order of `turbines`. The result is `ambient * (1 - combined)` and is not
    /// clamped; callers treat negative or non-finite values as divergence.
    ///
    /// # Arguments
    ///
    /// * `turbines` - Farm turbines
    /// * `ambient_mps` - Pre-wake hub-height speed per turbine, same order
    /// * `direction_deg` - Meteorological wind direction
    pub fn effective_speeds(
        &self,
        turbines: &[Turbine],
        ambient_mps: &[f64],
        direction_deg: f64,
    ) -> Vec<f64> {
        let Some(model) = &self.deficit else {
            return ambient_mps.to_vec();
        };

        let theta = direction_deg.to_radians();
        let (fx, fy) = (-theta.sin(), -theta.cos());
        let along = |t: &Turbine| t.x_m * fx + t.y_m * fy;

        let mut order: Vec<usize> = (0..turbines.len()).collect();
        order.sort_by(|&a, &b| {
            along(&turbines[a])
                .partial_cmp(&along(&turbines[b]))
                .unwrap_or(Ordering::Equal)
                .then_with(|| turbines[a].turbine_id.cmp(&turbines[b].turbine_id))
        });

        let mut deficits = Vec::with_capacity(turbines.len());
        turbines
            .iter()
            .zip(ambient_mps)
            .map(|(target, &ambient)| {
                deficits.clear();
                for &i in &order {
                    let src = &turbines[i];
                    if src.turbine_id == target.turbine_id {
                        continue;
                    }
                    let dx = target.x_m - src.x_m;
                    let dy = target.y_m - src.y_m;
                    let downstream = dx * fx + dy * fy;
                    let crosswind = (dx * fy - dy * fx).abs();
                    let d = model.deficit(downstream, crosswind, target.rotor_diameter_m);
                    if d > 0.0 {
                        deficits.push(d);
                    }
                }
                ambient * (1.0 - self.combination.combine(&deficits))
            })
            .collect()
    }
}
