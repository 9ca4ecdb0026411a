//! # Shipcalc Engine
//!
//! Physics and statistics simulations behind ship statistics: shell
//! ballistic tables, dispersion ellipses with Monte Carlo hit sampling, and
//! ship acceleration curves.

// Re-export the main types and functions
pub use acceleration::{
    AccelerationCurve, AccelerationReport, AccelerationSettings, AccelerationSimulator,
    EngineParams, GearTransition, HullParams, ShipClass, SpeedModifiers, SpeedSample,
    FULL_AHEAD, FULL_ASTERN,
};
pub use atmosphere::{air_density, standard_atmosphere, AtmosphereState};
pub use ballistics::{
    AngleSweep, BallisticOutcome, BallisticSettings, BallisticSimulator, BallisticTable,
    ShellKind, ShellSpec, TableEntry, TrajectoryPoint,
};
pub use cancel::CancellationToken;
pub use dispersion::{DispersionEllipse, DispersionModel, FnDispersion, GunDispersion};
pub use error::{EngineError, EngineResult, Phase};
pub use hit_points::{
    compress_over_aim, half_hit_ratio, HitPointSampler, HitPointSet, ShotGrouping, MAX_SHOT_COUNT,
};
pub use penetration::penetration;

// Module declarations
pub mod acceleration;
pub mod atmosphere;
pub mod ballistics;
mod cancel;
pub mod constants;
pub mod dispersion;
mod error;
pub mod hit_points;
mod penetration;
