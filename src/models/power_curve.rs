//! Turbine power curve: effective wind speed to electrical power.

use serde::{Deserialize, Serialize};

/// Standard sea-level air density (kg/m³) the curve is specified at.
pub const REFERENCE_AIR_DENSITY: f64 = 1.225;

/// Rotor speed at cut-in (rpm).
pub const ROTOR_CUT_IN_RPM: f64 = 6.0;
/// Rotor speed from rated wind speed up to cut-out (rpm).
pub const ROTOR_RATED_RPM: f64 = 18.0;

/// Operating state of a turbine at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurbineStatus {
    /// Generating between cut-in and cut-out.
    Running,
    /// Idle below cut-in.
    Stopped,
    /// Shut down at or above cut-out.
    CutOut,
}

impl TurbineStatus {
    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::CutOut => "CUT_OUT",
        }
    }

    /// Parses the stored representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(Self::Running),
            "STOPPED" => Some(Self::Stopped),
            "CUT_OUT" => Some(Self::CutOut),
            _ => None,
        }
    }
}

/// Controller output at one wind speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operation {
    /// Electrical power (kW).
    pub power_kw: f64,
    /// Operating state.
    pub status: TurbineStatus,
    /// Rotor speed (rpm); zero unless running.
    pub rotor_speed_rpm: f64,
}

/// Shape of the partial-load region between cut-in and rated speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveShape {
    /// `P = rated * ((v - cut_in) / (rated_speed - cut_in))^3`.
    Cubic,
    /// Piecewise-linear interpolation over `(speed_mps, power_kw)` points.
    ///
    /// Points must be sorted by speed with non-decreasing power; values
    /// outside the table are clamped to its end points.
    Table {
        /// Sorted curve points.
        points: Vec<(f64, f64)>,
    },
}

/// Power curve parameterised per turbine type.
///
/// Zero below cut-in, monotonically increasing up to rated speed, flat at
/// rated power until cut-out, zero at and above cut-out. Output is always in
/// `[0, rated_power_kw]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerCurve {
    /// Rated (maximum) electrical power in kW.
    pub rated_power_kw: f64,
    /// Cut-in wind speed (m/s).
    pub cut_in_mps: f64,
    /// Rated wind speed (m/s).
    pub rated_mps: f64,
    /// Cut-out wind speed (m/s).
    pub cut_out_mps: f64,
    /// Partial-load shape.
    pub shape: CurveShape,
}

impl PowerCurve {
    /// Creates a cubic power curve.
    pub fn cubic(rated_power_kw: f64, cut_in_mps: f64, rated_mps: f64, cut_out_mps: f64) -> Self {
        Self {
            rated_power_kw,
            cut_in_mps,
            rated_mps,
            cut_out_mps,
            shape: CurveShape::Cubic,
        }
    }

    /// Power output in kW for the given effective wind speed.
    ///
    /// # Arguments
    ///
    /// * `wind_speed_mps` - Effective hub-height wind speed
    /// * `air_density` - Optional air density (kg/m³); when present the speed is
    ///   converted to a density-equivalent speed `v * (rho / 1.225)^(1/3)`
    ///
    /// # Returns
    ///
    /// Power in `[0, rated_power_kw]`; non-finite inputs yield `0.0`.
    pub fn power_kw(&self, wind_speed_mps: f64, air_density: Option<f64>) -> f64 {
        if !wind_speed_mps.is_finite() {
            return 0.0;
        }
        // Cut-in/cut-out are evaluated on the measured speed, the partial-load
        // region on the density-equivalent speed.
        let v = wind_speed_mps;
        if v < self.cut_in_mps || v >= self.cut_out_mps {
            return 0.0;
        }
        let v_eq = match air_density {
            Some(rho) if rho > 0.0 => v * (rho / REFERENCE_AIR_DENSITY).cbrt(),
            _ => v,
        };
        if v_eq >= self.rated_mps {
            return self.rated_power_kw;
        }
        let p = match &self.shape {
            CurveShape::Cubic => {
                let x = ((v_eq - self.cut_in_mps) / (self.rated_mps - self.cut_in_mps)).max(0.0);
                self.rated_power_kw * x.powi(3)
            }
            CurveShape::Table { points } => interpolate_table(points, v_eq),
        };
        p.clamp(0.0, self.rated_power_kw)
    }

    /// Operating state at the given effective wind speed.
    pub fn status(&self, wind_speed_mps: f64) -> TurbineStatus {
        let v = wind_speed_mps;
        if !v.is_finite() || v < self.cut_in_mps {
            TurbineStatus::Stopped
        } else if v >= self.cut_out_mps {
            TurbineStatus::CutOut
        } else {
            TurbineStatus::Running
        }
    }

    /// Power, operating state and rotor speed at the given effective wind speed.
    ///
    /// Rotor speed rises linearly from [`ROTOR_CUT_IN_RPM`] at cut-in to
    /// [`ROTOR_RATED_RPM`] at rated speed and stays there until cut-out.
    pub fn operate(&self, wind_speed_mps: f64, air_density: Option<f64>) -> Operation {
        let status = self.status(wind_speed_mps);
        let rotor_speed_rpm = match status {
            TurbineStatus::Running => {
                let x = (wind_speed_mps.min(self.rated_mps) - self.cut_in_mps) / (self.rated_mps - self.cut_in_mps);
                ROTOR_CUT_IN_RPM + x.clamp(0.0, 1.0) * (ROTOR_RATED_RPM - ROTOR_CUT_IN_RPM)
            }
            TurbineStatus::Stopped | TurbineStatus::CutOut => 0.0,
        };
        Operation {
            power_kw: self.power_kw(wind_speed_mps, air_density),
            status,
            rotor_speed_rpm,
        }
    }

    /// Returns a description of the first violated parameter constraint, if any.
    pub fn check(&self) -> Option<String> {
        if !(self.rated_power_kw > 0.0) {
            return Some("rated_power_kw must be > 0".into());
        }
        if !(self.cut_in_mps >= 0.0 && self.cut_in_mps < self.rated_mps) {
            return Some("cut_in_mps must be >= 0 and < rated_mps".into());
        }
        if self.rated_mps >= self.cut_out_mps {
            return Some("rated_mps must be < cut_out_mps".into());
        }
        if let CurveShape::Table { points } = &self.shape {
            if points.len() < 2 {
                return Some("table curve needs at least two points".into());
            }
            let monotone = points
                .windows(2)
                .all(|w| w[1].0 > w[0].0 && w[1].1 >= w[0].1);
            if !monotone {
                return Some("table points must have increasing speed and non-decreasing power".into());
            }
        }
        None
    }
}

fn interpolate_table(points: &[(f64, f64)], v: f64) -> f64 {
    let Some(&(first_v, first_p)) = points.first() else {
        return 0.0;
    };
    if v <= first_v {
        return first_p;
    }
    for w in points.windows(2) {
        let (v0, p0) = w[0];
        let (v1, p1) = w[1];
        if v <= v1 {
            return p0 + (p1 - p0) * (v - v0) / (v1 - v0);
        }
    }
    points.last().map_or(0.0, |&(_, p)| p)
}
