//! Dispersion ellipses and their projection onto the water surface.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ballistics::BallisticTable;
use crate::constants::MIN_PROJECTION_RATIO;
use crate::error::{EngineError, EngineResult};

/// Source of raw dispersion radii for a gun
pub trait DispersionModel {
    /// Horizontal radius (m) when aiming at `aim_range`
    fn horizontal_radius(&self, aim_range: f64) -> f64;

    /// Vertical radius (m) when aiming at `aim_range` with a gun of `max_range`
    fn vertical_radius(&self, max_range: f64, aim_range: f64) -> f64;
}

/// Dispersion model built from two plain functions
pub struct FnDispersion<H, V> {
    horizontal: H,
    vertical: V,
}

impl<H, V> FnDispersion<H, V>
where
    H: Fn(f64) -> f64,
    V: Fn(f64, f64) -> f64,
{
    pub fn new(horizontal: H, vertical: V) -> Self {
        Self { horizontal, vertical }
    }
}

impl<H, V> DispersionModel for FnDispersion<H, V>
where
    H: Fn(f64) -> f64,
    V: Fn(f64, f64) -> f64,
{
    fn horizontal_radius(&self, aim_range: f64) -> f64 {
        (self.horizontal)(aim_range)
    }

    fn vertical_radius(&self, max_range: f64, aim_range: f64) -> f64 {
        (self.vertical)(max_range, aim_range)
    }
}

/// Game units of distance per meter scale (one unit = 30 m)
const UNIT_LENGTH_M: f64 = 30.0;

/// Piecewise-linear gun dispersion curve.
///
/// Radii are expressed in game units (30 m); the horizontal radius grows
/// linearly from `min_radius` to `ideal_radius` at `ideal_distance`, with
/// a taper close to the gun. The vertical radius is the horizontal one
/// scaled by a coefficient interpolated between zero range, the delimiter
/// range (`delim` × max range) and max range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GunDispersion {
    pub ideal_radius: f64,
    pub min_radius: f64,
    pub ideal_distance: f64,
    pub taper_dist: f64,
    pub radius_on_zero: f64,
    pub radius_on_delim: f64,
    pub radius_on_max: f64,
    pub delim: f64,
    #[serde(default = "unit_modifier")]
    pub horizontal_modifier: f64,
}

fn unit_modifier() -> f64 {
    1.0
}

impl DispersionModel for GunDispersion {
    fn horizontal_radius(&self, aim_range: f64) -> f64 {
        let x = aim_range / UNIT_LENGTH_M;
        let slope = (self.ideal_radius - self.min_radius) / self.ideal_distance;
        let radius = if x <= self.taper_dist {
            x * slope + self.min_radius * (x / self.taper_dist)
        } else {
            x * slope + self.min_radius
        };
        radius * UNIT_LENGTH_M * self.horizontal_modifier
    }

    fn vertical_radius(&self, max_range: f64, aim_range: f64) -> f64 {
        let x = aim_range / UNIT_LENGTH_M;
        let max = max_range / UNIT_LENGTH_M;
        let delim_dist = max * self.delim;

        let coefficient = if x < delim_dist {
            self.radius_on_zero + (self.radius_on_delim - self.radius_on_zero) * (x / delim_dist)
        } else {
            self.radius_on_delim
                + (self.radius_on_max - self.radius_on_delim) * ((x - delim_dist) / (max - delim_dist))
        };
        self.horizontal_radius(aim_range) * coefficient
    }
}

/// Dispersion ellipse at one aiming range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionEllipse {
    pub aim_range: f64,                        // meters
    pub horizontal_radius: f64,                // meters
    pub vertical_radius: f64,                  // meters, in the plane of fire
    pub vertical_radius_on_water: f64,         // meters, projected on the waterline
    pub vertical_radius_on_perpendicular: f64, // meters, projected perpendicular to the water
    pub waterline_ratio: f64,                  // sin(impact angle)
    pub perpendicular_ratio: f64,              // cos(impact angle)
    pub impact_angle: f64,                     // degrees
    pub valid: bool,
}

impl DispersionEllipse {
    /// Ellipse reporting that nothing can be drawn at `aim_range`
    pub fn invalid(aim_range: f64) -> Self {
        Self {
            aim_range,
            horizontal_radius: 0.0,
            vertical_radius: 0.0,
            vertical_radius_on_water: 0.0,
            vertical_radius_on_perpendicular: 0.0,
            waterline_ratio: 0.0,
            perpendicular_ratio: 0.0,
            impact_angle: 0.0,
            valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// `NoSolution` for an invalid ellipse, for callers that want `?`
    pub fn ensure_valid(&self) -> EngineResult<&Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(EngineError::NoSolution {
                aim_range: self.aim_range,
            })
        }
    }

    /// Calculate the ellipse for a gun aimed at `aim_range`.
    ///
    /// # Arguments
    /// * `model` - Raw dispersion radii
    /// * `table` - Ballistic table of the shell
    /// * `aim_range` - Aiming range in meters
    /// * `max_range` - Gun max range in meters
    ///
    /// # Returns
    /// A valid ellipse, or an invalid one when the table does not reach
    /// `aim_range`, the shell lands flat, or the radii are not finite
    pub fn calculate<M>(model: &M, table: &BallisticTable, aim_range: f64, max_range: f64) -> Self
    where
        M: DispersionModel + ?Sized,
    {
        if !aim_range.is_finite() || !max_range.is_finite() {
            return Self::invalid(aim_range);
        }

        let horizontal_radius = model.horizontal_radius(aim_range);
        let vertical_radius = model.vertical_radius(max_range, aim_range);

        let entry = match table.first_at_or_beyond(aim_range) {
            Some(entry) => entry,
            None => {
                debug!(aim_range, "no ballistic entry at or beyond aim range");
                return Self::invalid(aim_range);
            }
        };

        let impact_angle = entry.outcome.impact_angle;
        let waterline_ratio = impact_angle.to_radians().sin();
        let perpendicular_ratio = impact_angle.to_radians().cos();
        if waterline_ratio < MIN_PROJECTION_RATIO || perpendicular_ratio < MIN_PROJECTION_RATIO {
            debug!(aim_range, impact_angle, "degenerate projection ratio");
            return Self::invalid(aim_range);
        }

        let ellipse = Self {
            aim_range,
            horizontal_radius,
            vertical_radius,
            vertical_radius_on_water: vertical_radius / waterline_ratio,
            vertical_radius_on_perpendicular: vertical_radius / perpendicular_ratio,
            waterline_ratio,
            perpendicular_ratio,
            impact_angle,
            valid: true,
        };

        let radii = [
            ellipse.horizontal_radius,
            ellipse.vertical_radius,
            ellipse.vertical_radius_on_water,
            ellipse.vertical_radius_on_perpendicular,
        ];
        if radii.iter().all(|r| r.is_finite() && *r >= 0.0) {
            ellipse
        } else {
            debug!(aim_range, "dispersion model returned unusable radii");
            Self::invalid(aim_range)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballistics::{AngleSweep, BallisticSimulator, ShellKind, ShellSpec};

    fn table() -> BallisticTable {
        let shell = ShellSpec {
            caliber: 0.152,
            mass: 55.0,
            muzzle_velocity: 812.0,
            air_drag: 0.32,
            krupp: 2216.0,
            kind: ShellKind::Ap,
            flat_penetration: 0.0,
        };
        let sweep = AngleSweep::new(200, 0.00174533);
        BallisticSimulator::with_sweep(&sweep)
            .simulate(&shell, 15_000.0)
            .unwrap()
    }

    fn fixed_model() -> FnDispersion<impl Fn(f64) -> f64, impl Fn(f64, f64) -> f64> {
        FnDispersion::new(|_| 50.0, |_, _| 30.0)
    }

    fn cruiser_dispersion() -> GunDispersion {
        GunDispersion {
            ideal_radius: 10.0,
            min_radius: 2.8,
            ideal_distance: 1000.0,
            taper_dist: 2000.0 / 30.0,
            radius_on_zero: 0.2,
            radius_on_delim: 0.5,
            radius_on_max: 0.6,
            delim: 0.5,
            horizontal_modifier: 1.0,
        }
    }

    #[test]
    fn test_valid_ellipse_projections() {
        let table = table();
        let ellipse = DispersionEllipse::calculate(&fixed_model(), &table, 8_000.0, 15_000.0);
        assert!(ellipse.is_valid());
        assert_eq!(ellipse.horizontal_radius, 50.0);
        assert_eq!(ellipse.vertical_radius, 30.0);

        let ratio_sum = ellipse.waterline_ratio.powi(2) + ellipse.perpendicular_ratio.powi(2);
        assert!((ratio_sum - 1.0).abs() < 1e-12);
        assert!((ellipse.vertical_radius_on_water * ellipse.waterline_ratio - 30.0).abs() < 1e-9);
        assert!(ellipse.vertical_radius_on_water > ellipse.vertical_radius);
        assert!(ellipse.vertical_radius_on_perpendicular >= ellipse.vertical_radius);
    }

    #[test]
    fn test_uses_first_entry_at_or_beyond_aim() {
        let table = table();
        let ellipse = DispersionEllipse::calculate(&fixed_model(), &table, 8_000.0, 15_000.0);
        let entry = table.first_at_or_beyond(8_000.0).unwrap();
        assert_eq!(ellipse.impact_angle, entry.outcome.impact_angle);
    }

    #[test]
    fn test_aim_beyond_table_is_invalid() {
        let table = table();
        let beyond = table.max_range().unwrap() + 1.0;
        let ellipse = DispersionEllipse::calculate(&fixed_model(), &table, beyond, 15_000.0);
        assert!(!ellipse.is_valid());
        assert_eq!(ellipse.horizontal_radius, 0.0);
        assert_eq!(ellipse.vertical_radius_on_water, 0.0);
        assert_eq!(
            ellipse.ensure_valid(),
            Err(EngineError::NoSolution { aim_range: beyond })
        );
    }

    #[test]
    fn test_zero_aim_range_is_invalid() {
        // The zero-range entry has a flat impact angle
        let ellipse = DispersionEllipse::calculate(&fixed_model(), &table(), 0.0, 15_000.0);
        assert!(!ellipse.is_valid());
    }

    #[test]
    fn test_non_finite_model_is_invalid() {
        let model = FnDispersion::new(|_| f64::NAN, |_, _| 30.0);
        let ellipse = DispersionEllipse::calculate(&model, &table(), 5_000.0, 15_000.0);
        assert!(!ellipse.is_valid());
    }

    #[test]
    fn test_gun_dispersion_curve() {
        let gun = cruiser_dispersion();
        // Past the taper distance the radius is linear in range
        let at_10km = gun.horizontal_radius(10_000.0);
        let expected = (10_000.0 / 30.0 * (10.0 - 2.8) / 1000.0 + 2.8) * 30.0;
        assert!((at_10km - expected).abs() < 1e-9);

        // Inside the taper the min radius fades in
        assert_eq!(gun.horizontal_radius(0.0), 0.0);
        assert!(gun.horizontal_radius(1_000.0) < gun.horizontal_radius(2_000.0));

        // Vertical coefficient hits the delimiter value at half of max range
        let vertical = gun.vertical_radius(16_000.0, 8_000.0);
        assert!((vertical - gun.horizontal_radius(8_000.0) * 0.5).abs() < 1e-9);
        let at_max = gun.vertical_radius(16_000.0, 16_000.0);
        assert!((at_max - gun.horizontal_radius(16_000.0) * 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_modifier_scales_horizontal_only() {
        let mut gun = cruiser_dispersion();
        let base = gun.horizontal_radius(12_000.0);
        gun.horizontal_modifier = 0.9;
        assert!((gun.horizontal_radius(12_000.0) - base * 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_trait_object_model() {
        let gun: Box<dyn DispersionModel> = Box::new(cruiser_dispersion());
        let ellipse = DispersionEllipse::calculate(gun.as_ref(), &table(), 9_000.0, 15_000.0);
        assert!(ellipse.is_valid());
    }
}
