//! Farm layout: turbine positions and per-turbine physical parameters.

use serde::{Deserialize, Serialize};

use super::power_curve::PowerCurve;

/// A single wind turbine within a farm.
///
/// Static for the lifetime of a farm definition and read-only during
/// simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turbine {
    /// Identifier unique within the farm (e.g. `"T001"`).
    pub turbine_id: String,
    /// Easting in metres relative to the farm origin.
    pub x_m: f64,
    /// Northing in metres relative to the farm origin.
    pub y_m: f64,
    /// Rotor diameter in metres.
    pub rotor_diameter_m: f64,
    /// Hub height above ground in metres.
    pub hub_height_m: f64,
    /// Power curve for this turbine type.
    pub power_curve: PowerCurve,
}

impl Turbine {
    /// Rated power in kilowatts.
    pub fn rated_power_kw(&self) -> f64 {
        self.power_curve.rated_power_kw
    }
}

/// Geographic reference of the farm origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoReference {
    /// Latitude in decimal degrees.
    pub latitude_deg: f64,
    /// Longitude in decimal degrees.
    pub longitude_deg: f64,
}

/// Ordered set of turbines making up one farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmLayout {
    /// Farm identifier.
    pub farm_id: String,
    /// Geographic reference of the layout origin.
    pub origin: GeoReference,
    /// Turbines in declaration order.
    pub turbines: Vec<Turbine>,
}

/// Turbine type shared by every position of a generated layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TurbineType {
    /// Rotor diameter in metres.
    pub rotor_diameter_m: f64,
    /// Hub height in metres.
    pub hub_height_m: f64,
    /// Power curve.
    pub power_curve: PowerCurve,
}

impl FarmLayout {
    /// Builds a rectangular grid farm with turbines numbered `T001..` row by row.
    ///
    /// Row `r` sits at `y = r * spacing_m`, column `c` at `x = c * spacing_m`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wind_farm_twin::models::layout::{FarmLayout, GeoReference, TurbineType};
    /// use wind_farm_twin::models::power_curve::PowerCurve;
    ///
    /// let kind = TurbineType {
    ///     rotor_diameter_m: 90.0,
    ///     hub_height_m: 80.0,
    ///     power_curve: PowerCurve::cubic(2000.0, 3.0, 12.0, 25.0),
    /// };
    /// let origin = GeoReference { latitude_deg: 55.0, longitude_deg: 8.0 };
    /// let farm = FarmLayout::grid("F001", origin, 3, 4, 600.0, &kind);
    /// assert_eq!(farm.turbines.len(), 12);
    /// assert_eq!(farm.turbines[11].turbine_id, "T012");
    /// ```
    pub fn grid(
        farm_id: &str,
        origin: GeoReference,
        rows: usize,
        cols: usize,
        spacing_m: f64,
        kind: &TurbineType,
    ) -> Self {
        let mut turbines = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let n = turbines.len() + 1;
                turbines.push(Turbine {
                    turbine_id: format!("T{n:03}"),
                    x_m: c as f64 * spacing_m,
                    y_m: r as f64 * spacing_m,
                    rotor_diameter_m: kind.rotor_diameter_m,
                    hub_height_m: kind.hub_height_m,
                    power_curve: kind.power_curve.clone(),
                });
            }
        }
        Self {
            farm_id: farm_id.to_string(),
            origin,
            turbines,
        }
    }

    /// Builds a farm from explicit `(turbine_id, x_m, y_m)` positions.
    pub fn from_positions(
        farm_id: &str,
        origin: GeoReference,
        positions: &[(String, f64, f64)],
        kind: &TurbineType,
    ) -> Self {
        let turbines = positions
            .iter()
            .map(|(id, x, y)| Turbine {
                turbine_id: id.clone(),
                x_m: *x,
                y_m: *y,
                rotor_diameter_m: kind.rotor_diameter_m,
                hub_height_m: kind.hub_height_m,
                power_curve: kind.power_curve.clone(),
            })
            .collect();
        Self {
            farm_id: farm_id.to_string(),
            origin,
            turbines,
        }
    }

    /// Sum of rated power across all turbines (kW).
    pub fn rated_capacity_kw(&self) -> f64 {
        self.turbines.iter().map(Turbine::rated_power_kw).sum()
    }

    /// Looks up a turbine by identifier.
    pub fn turbine(&self, turbine_id: &str) -> Option<&Turbine> {
        self.turbines.iter().find(|t| t.turbine_id == turbine_id)
    }
}
