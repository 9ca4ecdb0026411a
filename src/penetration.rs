//! Empirical armor penetration of armor-piercing shells.

use crate::constants::{
    PENETRATION_CALIBER_EXP, PENETRATION_COEFFICIENT, PENETRATION_MASS_EXP,
    PENETRATION_REFERENCE_KRUPP, PENETRATION_VELOCITY_EXP,
};
use crate::error::{require_positive, EngineResult};

/// Calculate the penetration of an AP shell at a given impact velocity.
///
/// `C · v^1.4822 · d^-0.6521 · m^0.5506 · (k / 2400)`
///
/// # Arguments
/// * `velocity` - Impact velocity in m/s
/// * `caliber` - Shell diameter in meters
/// * `mass` - Shell mass in kg
/// * `krupp` - Armor-quality coefficient
///
/// # Returns
/// * Penetration in millimetres of armor, or `InvalidInput` if any argument
///   is not a finite positive number
pub fn penetration(velocity: f64, caliber: f64, mass: f64, krupp: f64) -> EngineResult<f64> {
    let velocity = require_positive("velocity", velocity)?;
    let caliber = require_positive("caliber", caliber)?;
    let mass = require_positive("mass", mass)?;
    let krupp = require_positive("krupp", krupp)?;

    Ok(PENETRATION_COEFFICIENT
        * velocity.powf(PENETRATION_VELOCITY_EXP)
        * caliber.powf(PENETRATION_CALIBER_EXP)
        * mass.powf(PENETRATION_MASS_EXP)
        * (krupp / PENETRATION_REFERENCE_KRUPP))
}
