//! Shell flight integration and range-indexed ballistic tables.
//!
//! Every elevation of the angle sweep is flown with a fixed-step Euler
//! integrator under gravity and quadratic drag scaled by the standard
//! atmosphere. Only the ascending part of the range curve is kept, so the
//! resulting table is strictly ordered by range.

use nalgebra::Vector2;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, warn};

use crate::atmosphere::air_density;
use crate::cancel::{check_cancelled, CancellationToken};
use crate::constants::{G_ACCEL_MPS2, SWEEP_ANGLE_COUNT, SWEEP_ANGLE_STEP_RAD};
use crate::error::{require_non_negative, require_positive, EngineError, EngineResult, Phase};
use crate::penetration::penetration;

/// Shell type, decides how penetration is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShellKind {
    Ap,
    He,
    Sap,
}

impl ShellKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AP" => Some(ShellKind::Ap),
            "HE" => Some(ShellKind::He),
            "SAP" | "CS" => Some(ShellKind::Sap),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShellKind::Ap => "AP",
            ShellKind::He => "HE",
            ShellKind::Sap => "SAP",
        };
        write!(f, "{}", name)
    }
}

/// Shell parameters, already adjusted by any modifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellSpec {
    pub caliber: f64,          // meters
    pub mass: f64,             // kg
    pub muzzle_velocity: f64,  // m/s
    pub air_drag: f64,         // drag coefficient
    pub krupp: f64,            // armor-quality coefficient, AP only
    pub kind: ShellKind,
    #[serde(default)]
    pub flat_penetration: f64, // mm, HE and SAP only
}

impl ShellSpec {
    /// Check every field the simulation relies on.
    pub fn validate(&self) -> EngineResult<()> {
        require_positive("caliber", self.caliber)?;
        require_positive("mass", self.mass)?;
        require_positive("muzzle_velocity", self.muzzle_velocity)?;
        require_non_negative("air_drag", self.air_drag)?;
        match self.kind {
            ShellKind::Ap => {
                require_positive("krupp", self.krupp)?;
            }
            ShellKind::He | ShellKind::Sap => {
                require_non_negative("flat_penetration", self.flat_penetration)?;
            }
        }
        Ok(())
    }

    /// Penetration at an impact velocity: the empirical formula for AP,
    /// the flat value for every other kind.
    pub fn penetration_at(&self, velocity: f64) -> EngineResult<f64> {
        match self.kind {
            ShellKind::Ap => penetration(velocity, self.caliber, self.mass, self.krupp),
            ShellKind::He | ShellKind::Sap => Ok(self.flat_penetration),
        }
    }

    /// Drag factor `k = 0.5 · Cd · (d/2)² · π / m`
    pub fn drag_factor(&self) -> f64 {
        let radius = self.caliber / 2.0;
        0.5 * self.air_drag * radius * radius * PI / self.mass
    }
}

/// Point along a shell's flight path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub distance: f64, // meters
    pub altitude: f64, // meters
}

/// Result of firing a shell at one elevation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallisticOutcome {
    pub penetration: f64,     // mm
    pub impact_velocity: f64, // m/s
    pub flight_time: f64,     // seconds
    pub impact_angle: f64,    // degrees from horizontal
    pub trajectory: Vec<TrajectoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub range: f64, // meters
    pub outcome: BallisticOutcome,
}

/// Range → outcome mapping with strictly increasing ranges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BallisticTable {
    entries: Vec<TableEntry>,
}

impl BallisticTable {
    /// Append an entry. Ranges that do not extend the table are refused.
    fn push(&mut self, range: f64, outcome: BallisticOutcome) -> bool {
        if let Some(last) = self.entries.last() {
            if range <= last.range {
                return false;
            }
        }
        self.entries.push(TableEntry { range, outcome });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TableEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.iter()
    }

    pub fn ranges(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|entry| entry.range)
    }

    /// Longest range in the table
    pub fn max_range(&self) -> Option<f64> {
        self.entries.last().map(|entry| entry.range)
    }

    /// First entry whose range is at or beyond `range`
    pub fn first_at_or_beyond(&self, range: f64) -> Option<&TableEntry> {
        let index = self.entries.partition_point(|entry| entry.range < range);
        self.entries.get(index)
    }
}

/// Elevation angles tried for every shell, in increasing order
#[derive(Debug, Clone, PartialEq)]
pub struct AngleSweep {
    angles: Vec<f64>,
}

static STANDARD_SWEEP: Lazy<AngleSweep> =
    Lazy::new(|| AngleSweep::new(SWEEP_ANGLE_COUNT, SWEEP_ANGLE_STEP_RAD));

impl AngleSweep {
    /// `count` angles starting at 0 rad, `step` apart
    pub fn new(count: usize, step: f64) -> Self {
        let angles = (0..count).map(|i| i as f64 * step).collect();
        Self { angles }
    }

    /// 600 angles, 0.1° apart, computed once per process
    pub fn standard() -> &'static AngleSweep {
        &STANDARD_SWEEP
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }
}

/// Integration settings for shell flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallisticSettings {
    pub time_step: f64,       // seconds
    pub range_headroom: f64,  // multiplier on the requested max range
    pub max_flight_time: f64, // seconds
    pub gravity: f64,         // m/s²
}

impl Default for BallisticSettings {
    fn default() -> Self {
        Self {
            time_step: 0.02,
            range_headroom: 1.5,
            max_flight_time: 300.0,
            gravity: G_ACCEL_MPS2,
        }
    }
}

/// Where one elevation landed
struct Flight {
    range: f64,
    outcome: BallisticOutcome,
}

/// Builds ballistic tables by sweeping elevation angles
#[derive(Debug, Clone)]
pub struct BallisticSimulator<'a> {
    settings: BallisticSettings,
    sweep: &'a AngleSweep,
    cancel: Option<CancellationToken>,
}

impl Default for BallisticSimulator<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl BallisticSimulator<'static> {
    /// Simulator over the shared standard sweep
    pub fn new() -> Self {
        Self {
            settings: BallisticSettings::default(),
            sweep: AngleSweep::standard(),
            cancel: None,
        }
    }
}

impl<'a> BallisticSimulator<'a> {
    /// Simulator over a caller-owned sweep
    pub fn with_sweep(sweep: &'a AngleSweep) -> Self {
        Self {
            settings: BallisticSettings::default(),
            sweep,
            cancel: None,
        }
    }

    pub fn with_settings(mut self, settings: BallisticSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn settings(&self) -> &BallisticSettings {
        &self.settings
    }

    /// Build the ballistic table of a shell.
    ///
    /// # Arguments
    /// * `shell` - Shell parameters
    /// * `max_range` - Requested maximum range in meters; the table extends
    ///   to `max_range · range_headroom` so later range buffs stay covered
    ///
    /// # Returns
    /// The table, `InvalidInput` for bad parameters, `Diverged` if a flight
    /// never lands, `Cancelled` if the token fired
    pub fn simulate(&self, shell: &ShellSpec, max_range: f64) -> EngineResult<BallisticTable> {
        shell.validate()?;
        let max_range = require_positive("max_range", max_range)?;
        require_positive("time_step", self.settings.time_step)?;
        require_positive("range_headroom", self.settings.range_headroom)?;
        require_positive("max_flight_time", self.settings.max_flight_time)?;
        require_positive("gravity", self.settings.gravity)?;

        let effective_max_range = max_range * self.settings.range_headroom;
        let drag_factor = shell.drag_factor();

        let mut table = BallisticTable::default();
        table.push(
            0.0,
            BallisticOutcome {
                penetration: shell.penetration_at(shell.muzzle_velocity)?,
                impact_velocity: shell.muzzle_velocity,
                flight_time: 0.0,
                impact_angle: 0.0,
                trajectory: vec![TrajectoryPoint {
                    distance: 0.0,
                    altitude: 0.0,
                }],
            },
        );

        for &angle in self.sweep.angles() {
            check_cancelled(self.cancel.as_ref())?;

            let flight = self.fly(shell, angle, drag_factor)?;
            if flight.range > effective_max_range {
                debug!(
                    angle_deg = angle.to_degrees(),
                    range = flight.range,
                    "sweep stopped: beyond {:.0} m",
                    effective_max_range
                );
                break;
            }
            if !table.push(flight.range, flight.outcome) {
                debug!(
                    angle_deg = angle.to_degrees(),
                    range = flight.range,
                    "sweep stopped: past the range-maximizing elevation"
                );
                break;
            }
        }

        debug!(
            entries = table.len(),
            max_range = table.max_range().unwrap_or(0.0),
            "ballistic table built"
        );
        Ok(table)
    }

    /// Build tables for many shells in parallel, one result per shell.
    pub fn simulate_batch(
        &self,
        shells: &[ShellSpec],
        max_range: f64,
    ) -> Vec<EngineResult<BallisticTable>> {
        shells
            .par_iter()
            .map(|shell| self.simulate(shell, max_range))
            .collect()
    }

    /// Integrate one elevation until the shell drops below sea level.
    fn fly(&self, shell: &ShellSpec, angle: f64, drag_factor: f64) -> EngineResult<Flight> {
        let dt = self.settings.time_step;
        let gravity = self.settings.gravity;

        let mut position = Vector2::new(0.0, 0.0);
        let mut velocity = Vector2::new(angle.cos(), angle.sin()) * shell.muzzle_velocity;
        let mut time = 0.0;
        let mut trajectory = vec![TrajectoryPoint {
            distance: 0.0,
            altitude: 0.0,
        }];

        loop {
            let previous = position;
            position += velocity * dt;
            time += dt;

            if position.y < 0.0 {
                // Interpolate the sea-level crossing inside the last step
                let fraction = previous.y / (previous.y - position.y);
                let range = previous.x + (position.x - previous.x) * fraction;
                let flight_time = time - dt + dt * fraction;
                trajectory.push(TrajectoryPoint {
                    distance: range,
                    altitude: 0.0,
                });

                let impact_velocity = velocity.norm();
                let impact_angle = velocity.y.abs().atan2(velocity.x.abs()).to_degrees();
                let penetration = shell.penetration_at(impact_velocity)?;

                return Ok(Flight {
                    range,
                    outcome: BallisticOutcome {
                        penetration,
                        impact_velocity,
                        flight_time,
                        impact_angle,
                        trajectory,
                    },
                });
            }

            if time > self.settings.max_flight_time {
                warn!(
                    angle_deg = angle.to_degrees(),
                    "shell still airborne after {} s",
                    self.settings.max_flight_time
                );
                return Err(EngineError::diverged(
                    Phase::Trajectory,
                    self.settings.max_flight_time,
                ));
            }

            trajectory.push(TrajectoryPoint {
                distance: position.x,
                altitude: position.y,
            });

            let density = air_density(position.y);
            let speed = velocity.norm();
            let drag = drag_factor * density * speed;
            velocity.x -= dt * drag * velocity.x;
            velocity.y -= dt * (gravity + drag * velocity.y);

            if !(velocity.x.is_finite() && velocity.y.is_finite()) {
                warn!(angle_deg = angle.to_degrees(), "non-finite shell velocity");
                return Err(EngineError::diverged(Phase::Trajectory, time));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cruiser_ap() -> ShellSpec {
        ShellSpec {
            caliber: 0.203,
            mass: 118.0,
            muzzle_velocity: 820.0,
            air_drag: 0.321,
            krupp: 2400.0,
            kind: ShellKind::Ap,
            flat_penetration: 0.0,
        }
    }

    fn destroyer_he() -> ShellSpec {
        ShellSpec {
            caliber: 0.127,
            mass: 24.5,
            muzzle_velocity: 792.0,
            air_drag: 0.3,
            krupp: 0.0,
            kind: ShellKind::He,
            flat_penetration: 21.0,
        }
    }

    #[test]
    fn test_shell_kind_from_str() {
        assert_eq!(ShellKind::from_str("ap"), Some(ShellKind::Ap));
        assert_eq!(ShellKind::from_str("HE"), Some(ShellKind::He));
        assert_eq!(ShellKind::from_str("cs"), Some(ShellKind::Sap));
        assert_eq!(ShellKind::from_str("torpedo"), None);
    }

    #[test]
    fn test_drag_factor() {
        let shell = cruiser_ap();
        let expected = 0.5 * 0.321 * 0.1015 * 0.1015 * PI / 118.0;
        assert!((shell.drag_factor() - expected).abs() < 1e-15);
    }

    #[test]
    fn test_standard_sweep() {
        let sweep = AngleSweep::standard();
        assert_eq!(sweep.len(), 600);
        assert_eq!(sweep.angles()[0], 0.0);
        let last = sweep.angles()[599].to_degrees();
        assert!((last - 59.9).abs() < 0.01);
        assert!(std::ptr::eq(sweep, AngleSweep::standard()));
    }

    #[test]
    fn test_standard_sweep_concurrent_first_use() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| AngleSweep::standard() as *const AngleSweep as usize))
            .collect();
        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_ranges_strictly_increase() {
        let table = BallisticSimulator::new().simulate(&cruiser_ap(), 16_000.0).unwrap();
        assert!(table.len() > 10);
        let ranges: Vec<f64> = table.ranges().collect();
        assert!(ranges.windows(2).all(|pair| pair[1] > pair[0]));
        assert!(table.max_range().unwrap() <= 24_000.0);
    }

    #[test]
    fn test_zero_range_entry() {
        let shell = cruiser_ap();
        let table = BallisticSimulator::new().simulate(&shell, 16_000.0).unwrap();
        let zero = table.get(0).unwrap();
        assert_eq!(zero.range, 0.0);
        assert_eq!(
            zero.outcome.penetration,
            penetration(820.0, 0.203, 118.0, 2400.0).unwrap()
        );
        assert_eq!(zero.outcome.impact_velocity, 820.0);
        assert_eq!(zero.outcome.flight_time, 0.0);
    }

    #[test]
    fn test_flat_penetration_for_he() {
        let sweep = AngleSweep::new(40, 0.01);
        let table = BallisticSimulator::with_sweep(&sweep)
            .simulate(&destroyer_he(), 12_000.0)
            .unwrap();
        assert!(table.iter().all(|entry| entry.outcome.penetration == 21.0));
    }

    #[test]
    fn test_trajectory_ends_at_sea_level() {
        let sweep = AngleSweep::new(20, 0.02);
        let table = BallisticSimulator::with_sweep(&sweep)
            .simulate(&cruiser_ap(), 16_000.0)
            .unwrap();
        for entry in table.iter().skip(1) {
            let path = &entry.outcome.trajectory;
            let last = path.last().unwrap();
            assert_eq!(last.altitude, 0.0);
            assert!((last.distance - entry.range).abs() < 1e-9);
            assert!(path[..path.len() - 1].iter().all(|p| p.altitude >= 0.0));
            assert!(path.windows(2).all(|pair| pair[1].distance >= pair[0].distance));
        }
    }

    #[test]
    fn test_vacuum_flight_matches_closed_form() {
        let shell = ShellSpec {
            air_drag: 0.0,
            ..cruiser_ap()
        };
        let angle = 10f64.to_radians();
        let simulator = BallisticSimulator::new();
        let flight = simulator.fly(&shell, angle, shell.drag_factor()).unwrap();
        let expected = 820.0 * 820.0 * (2.0 * angle).sin() / G_ACCEL_MPS2;
        // Euler drift at a 0.02 s step stays well under one percent
        assert!((flight.range - expected).abs() / expected < 0.01);
        assert!((flight.outcome.impact_velocity - 820.0).abs() < 1.0);
    }

    #[test]
    fn test_first_at_or_beyond() {
        let sweep = AngleSweep::new(30, 0.01);
        let table = BallisticSimulator::with_sweep(&sweep)
            .simulate(&cruiser_ap(), 16_000.0)
            .unwrap();
        let third = table.get(3).unwrap().range;
        assert_eq!(table.first_at_or_beyond(third).unwrap().range, third);
        assert_eq!(table.first_at_or_beyond(third - 0.5).unwrap().range, third);
        assert!(table.first_at_or_beyond(1.0e9).is_none());
        assert_eq!(table.first_at_or_beyond(0.0).unwrap().range, 0.0);
    }

    #[test]
    fn test_invalid_shell_rejected() {
        let shell = ShellSpec {
            mass: 0.0,
            ..cruiser_ap()
        };
        let result = BallisticSimulator::new().simulate(&shell, 16_000.0);
        assert_eq!(
            result,
            Err(EngineError::InvalidInput { parameter: "mass", value: 0.0 })
        );

        let result = BallisticSimulator::new().simulate(&cruiser_ap(), -1.0);
        assert!(matches!(
            result,
            Err(EngineError::InvalidInput { parameter: "max_range", .. })
        ));
    }

    #[test]
    fn test_cancelled_before_sweep() {
        let token = CancellationToken::new();
        token.cancel();
        let result = BallisticSimulator::new()
            .with_cancellation(token)
            .simulate(&cruiser_ap(), 16_000.0);
        assert_eq!(result, Err(EngineError::Cancelled));
    }

    #[test]
    fn test_flight_time_ceiling() {
        let settings = BallisticSettings {
            max_flight_time: 1.0,
            ..Default::default()
        };
        let sweep = AngleSweep::new(1, 0.5);
        let mut shell = cruiser_ap();
        shell.muzzle_velocity = 900.0;
        let result = BallisticSimulator::with_sweep(&sweep)
            .with_settings(settings)
            .simulate(&shell, 16_000.0);
        assert!(matches!(
            result,
            Err(EngineError::Diverged { phase: Phase::Trajectory, .. })
        ));
    }

    #[test]
    fn test_batch_keeps_order() {
        let sweep = AngleSweep::new(25, 0.01);
        let bad = ShellSpec {
            caliber: -1.0,
            ..cruiser_ap()
        };
        let results = BallisticSimulator::with_sweep(&sweep)
            .simulate_batch(&[cruiser_ap(), bad, destroyer_he()], 12_000.0);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().get(0).unwrap().outcome.penetration, 21.0);
    }
}
