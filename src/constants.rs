/// Physical constants used by the shell and ship simulations

/// Gravitational acceleration used by both the atmosphere and the trajectory model, m/s²
pub const G_ACCEL_MPS2: f64 = 9.8;

/// Sea-level standard temperature (K)
pub const SEA_LEVEL_TEMPERATURE_K: f64 = 288.15;

/// Tropospheric temperature lapse rate (K/m)
pub const TEMPERATURE_LAPSE_RATE: f64 = 0.0065;

/// Sea-level standard pressure (Pa)
pub const SEA_LEVEL_PRESSURE_PA: f64 = 101325.0;

/// Universal gas constant, J/(mol·K)
pub const UNIVERSAL_GAS_CONSTANT: f64 = 8.31447;

/// Molar mass of dry air (kg/mol)
pub const MOLAR_MASS_AIR: f64 = 0.0289644;

/// Empirical penetration formula coefficient
///
/// Fitted so that `C · v^1.4822 · d^-0.6521 · m^0.5506` lands in millimetres
/// for a krupp value of 2400.
pub const PENETRATION_COEFFICIENT: f64 = 0.00046905491615181766;

/// Velocity exponent of the penetration formula
pub const PENETRATION_VELOCITY_EXP: f64 = 1.4822064892953855;

/// Caliber exponent of the penetration formula
pub const PENETRATION_CALIBER_EXP: f64 = -0.6521;

/// Mass exponent of the penetration formula
pub const PENETRATION_MASS_EXP: f64 = 0.5506;

/// Krupp value the penetration coefficient was fitted against
pub const PENETRATION_REFERENCE_KRUPP: f64 = 2400.0;

// Angle sweep
/// Number of elevation angles tried per shell
pub const SWEEP_ANGLE_COUNT: usize = 600;

/// Elevation increment between two sweep angles (rad, about 0.1°)
pub const SWEEP_ANGLE_STEP_RAD: f64 = 0.00174533;

// Numerical stability constants
/// Projection ratios below this are treated as zero (grazing impact)
pub const MIN_PROJECTION_RATIO: f64 = 1e-6;
