//! Standard atmosphere used for shell drag.
//!
//! Single tropospheric layer: linear temperature lapse and the barometric
//! pressure formula. Shell apexes stay well inside that layer.

use crate::constants::{
    G_ACCEL_MPS2, MOLAR_MASS_AIR, SEA_LEVEL_PRESSURE_PA, SEA_LEVEL_TEMPERATURE_K,
    TEMPERATURE_LAPSE_RATE, UNIVERSAL_GAS_CONSTANT,
};

/// Altitude at which the linear lapse would reach absolute zero, with margin (m)
const LAYER_CEILING_M: f64 = 44_330.0;

/// Exponent of the barometric formula, g·M/(R·L)
const BAROMETRIC_EXPONENT: f64 =
    G_ACCEL_MPS2 * MOLAR_MASS_AIR / (UNIVERSAL_GAS_CONSTANT * TEMPERATURE_LAPSE_RATE);

/// Atmospheric conditions at one altitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphereState {
    pub temperature: f64, // K
    pub pressure: f64,    // Pa
    pub density: f64,     // kg/m³
}

/// Calculate standard atmosphere conditions at an altitude.
///
/// # Arguments
/// * `altitude_m` - Altitude in meters; clamped to `[0, 44330]`
///
/// # Returns
/// Temperature, pressure and density at that altitude
pub fn standard_atmosphere(altitude_m: f64) -> AtmosphereState {
    let altitude = altitude_m.clamp(0.0, LAYER_CEILING_M);

    let temperature = SEA_LEVEL_TEMPERATURE_K - TEMPERATURE_LAPSE_RATE * altitude;
    let pressure =
        SEA_LEVEL_PRESSURE_PA * (temperature / SEA_LEVEL_TEMPERATURE_K).powf(BAROMETRIC_EXPONENT);
    let density = pressure * MOLAR_MASS_AIR / (UNIVERSAL_GAS_CONSTANT * temperature);

    AtmosphereState {
        temperature,
        pressure,
        density,
    }
}

/// Air density at an altitude, kg/m³
#[inline]
pub fn air_density(altitude_m: f64) -> f64 {
    standard_atmosphere(altitude_m).density
}
