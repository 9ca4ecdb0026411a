//! Ship speed-over-time curves for throttle changes.
//!
//! Engine power follows the throttle with an asymmetric first-order lag
//! (separate spool-up times ahead and astern) and fights a quadratic hull
//! drag that balances full power exactly at top speed. Each requested
//! throttle is simulated from rest: accelerate to its speed limit, hold it
//! for a short sailing interval, then stop.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::{check_cancelled, CancellationToken};
use crate::error::{require_non_negative, require_positive, EngineError, EngineResult, Phase};

/// Highest throttle position (full ahead)
pub const FULL_AHEAD: i32 = 4;

/// Throttle position for full astern
pub const FULL_ASTERN: i32 = -1;

/// Reverse top speed as a fraction of forward top speed
pub const REVERSE_SPEED_FRACTION: f64 = 0.25;

/// Exponent applied to the power-to-weight ratio
const POWER_TO_WEIGHT_EXP: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipClass {
    Destroyer,
    Cruiser,
    Battleship,
    AirCarrier,
    Submarine,
}

impl ShipClass {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "destroyer" | "dd" => Some(ShipClass::Destroyer),
            "cruiser" | "ca" | "cl" => Some(ShipClass::Cruiser),
            "battleship" | "bb" => Some(ShipClass::Battleship),
            "aircarrier" | "carrier" | "cv" => Some(ShipClass::AirCarrier),
            "submarine" | "ss" => Some(ShipClass::Submarine),
            _ => None,
        }
    }

    /// Forward-to-backward engine power ratio
    pub fn power_asymmetry_ratio(self) -> f64 {
        match self {
            ShipClass::Battleship => 4.0,
            ShipClass::Cruiser => 3.0,
            ShipClass::Destroyer => 2.0,
            ShipClass::AirCarrier | ShipClass::Submarine => 4.0,
        }
    }
}

/// Hull data relevant to propulsion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HullParams {
    pub max_speed: f64,    // knots
    pub tonnage: f64,      // tonnes
    pub engine_power: f64, // horsepower
    /// Replaces the class power ratio for hulls that deviate from it
    #[serde(default)]
    pub power_ratio_override: Option<f64>,
}

/// Engine module data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    #[serde(default = "unit")]
    pub speed_coef: f64,
    pub forward_up_time: f64,  // seconds to full power ahead
    pub backward_up_time: f64, // seconds to full power astern
    /// Acceleration multiplier while inside the forward forsage band
    #[serde(default = "unit")]
    pub forward_forsage: f64,
    /// Forward forsage band, fraction of max forward speed
    #[serde(default)]
    pub forward_forsage_max_speed: f64,
    #[serde(default = "unit")]
    pub backward_forsage: f64,
    #[serde(default)]
    pub backward_forsage_max_speed: f64,
}

/// Resolved multipliers from upgrades, skills and signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedModifiers {
    pub speed: f64,
    pub forward_up_time: f64,
    pub backward_up_time: f64,
    pub power: f64,
}

impl Default for SpeedModifiers {
    fn default() -> Self {
        Self {
            speed: 1.0,
            forward_up_time: 1.0,
            backward_up_time: 1.0,
            power: 1.0,
        }
    }
}

fn unit() -> f64 {
    1.0
}

/// Integration settings for acceleration curves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelerationSettings {
    pub time_step: f64,            // seconds
    pub acceleration_ceiling: f64, // seconds
    pub deceleration_ceiling: f64, // seconds
    pub sail_time: f64,            // seconds at the reached speed before stopping
    pub speed_tolerance: f64,      // knots
}

impl Default for AccelerationSettings {
    fn default() -> Self {
        Self {
            time_step: 0.5,
            acceleration_ceiling: 180.0,
            deceleration_ceiling: 360.0,
            sail_time: 3.0,
            speed_tolerance: 0.005,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedSample {
    pub speed: f64, // knots, negative astern
    pub time: f64,  // seconds since the throttle change
}

/// Speed over time for one throttle change and the stop that follows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerationCurve {
    pub throttle: i32,
    pub samples: Vec<SpeedSample>,
    /// Samples up to and including the one where the speed limit was reached
    pub acceleration_len: usize,
    pub time_to_speed: f64, // seconds
    pub time_to_stop: f64,  // seconds, measured from the stop order
}

impl AccelerationCurve {
    pub fn acceleration_phase(&self) -> &[SpeedSample] {
        &self.samples[..self.acceleration_len]
    }
}

/// Outcome of one requested throttle
#[derive(Debug, Clone, PartialEq)]
pub struct GearTransition {
    pub throttle: i32,
    pub outcome: EngineResult<AccelerationCurve>,
}

/// Derived limits and per-throttle curves
#[derive(Debug, Clone, PartialEq)]
pub struct AccelerationReport {
    pub max_forward_speed: f64,  // knots
    pub max_reverse_speed: f64,  // knots
    pub max_power_forward: f64,  // knots/s
    pub max_power_backward: f64, // knots/s
    pub transitions: Vec<GearTransition>,
}

/// Limits derived from hull, engine, class and modifiers
#[derive(Debug, Clone, Copy)]
struct Propulsion {
    max_forward_speed: f64,
    max_reverse_speed: f64,
    max_power_forward: f64,
    max_power_backward: f64,
    forward_up_time: f64,
    backward_up_time: f64,
    forward_forsage: f64,
    forward_forsage_speed: f64,
    backward_forsage: f64,
    backward_forsage_speed: f64,
}

impl Propulsion {
    fn derive(
        hull: &HullParams,
        engine: &EngineParams,
        class: ShipClass,
        modifiers: &SpeedModifiers,
    ) -> EngineResult<Self> {
        require_positive("max_speed", hull.max_speed)?;
        require_positive("tonnage", hull.tonnage)?;
        require_positive("engine_power", hull.engine_power)?;
        require_positive("speed_coef", engine.speed_coef)?;
        require_positive("forward_up_time", engine.forward_up_time)?;
        require_positive("backward_up_time", engine.backward_up_time)?;
        require_positive("forward_forsage", engine.forward_forsage)?;
        require_positive("backward_forsage", engine.backward_forsage)?;
        require_non_negative("forward_forsage_max_speed", engine.forward_forsage_max_speed)?;
        require_non_negative("backward_forsage_max_speed", engine.backward_forsage_max_speed)?;
        require_positive("speed_modifier", modifiers.speed)?;
        require_positive("forward_up_time_modifier", modifiers.forward_up_time)?;
        require_positive("backward_up_time_modifier", modifiers.backward_up_time)?;
        require_positive("power_modifier", modifiers.power)?;

        let ratio = match hull.power_ratio_override {
            Some(ratio) => require_positive("power_ratio_override", ratio)?,
            None => class.power_asymmetry_ratio(),
        };

        let speed_multiplier = engine.speed_coef * modifiers.speed;
        let max_forward_speed = hull.max_speed * speed_multiplier;
        let max_reverse_speed = max_forward_speed * REVERSE_SPEED_FRACTION;
        let max_power_forward = (hull.engine_power / hull.tonnage).powf(POWER_TO_WEIGHT_EXP)
            * modifiers.speed
            * modifiers.speed
            * modifiers.power;

        Ok(Self {
            max_forward_speed,
            max_reverse_speed,
            max_power_forward,
            max_power_backward: max_power_forward / ratio,
            forward_up_time: engine.forward_up_time * modifiers.forward_up_time,
            backward_up_time: engine.backward_up_time * modifiers.backward_up_time,
            forward_forsage: engine.forward_forsage,
            forward_forsage_speed: engine.forward_forsage_max_speed * max_forward_speed,
            backward_forsage: engine.backward_forsage,
            backward_forsage_speed: engine.backward_forsage_max_speed * max_reverse_speed,
        })
    }

    fn speed_limit(&self, throttle: i32) -> f64 {
        if throttle >= 0 {
            throttle as f64 / FULL_AHEAD as f64 * self.max_forward_speed
        } else {
            -self.max_reverse_speed
        }
    }

    /// Hull drag at `speed`, `-v|v| / vmax² · maxPower` per direction
    fn drag(&self, speed: f64) -> f64 {
        if speed >= 0.0 {
            -speed * speed / (self.max_forward_speed * self.max_forward_speed)
                * self.max_power_forward
        } else {
            speed * speed / (self.max_reverse_speed * self.max_reverse_speed)
                * self.max_power_backward
        }
    }

    /// Power that keeps the ship steady at `speed`
    fn holding_power(&self, speed: f64) -> f64 {
        -self.drag(speed)
    }
}

/// Mutable state of one transition
#[derive(Debug, Clone, Copy, Default)]
struct EngineState {
    speed: f64,
    power: f64,
    time: f64,
}

/// Integrates ship speed for a list of throttle positions
#[derive(Debug, Clone, Default)]
pub struct AccelerationSimulator {
    settings: AccelerationSettings,
    cancel: Option<CancellationToken>,
}

impl AccelerationSimulator {
    /// Full ahead and full astern
    pub const DEFAULT_THROTTLES: [i32; 2] = [FULL_AHEAD, FULL_ASTERN];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: AccelerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Simulate every throttle in `throttles`, each from rest.
    ///
    /// # Returns
    /// The derived limits and one outcome per throttle. Invalid hull or
    /// engine data fails the whole call; a transition that does not
    /// converge is reported as `Diverged` in its own slot.
    pub fn simulate(
        &self,
        hull: &HullParams,
        engine: &EngineParams,
        class: ShipClass,
        throttles: &[i32],
        modifiers: &SpeedModifiers,
    ) -> EngineResult<AccelerationReport> {
        require_positive("time_step", self.settings.time_step)?;
        require_positive("acceleration_ceiling", self.settings.acceleration_ceiling)?;
        require_positive("deceleration_ceiling", self.settings.deceleration_ceiling)?;
        require_non_negative("sail_time", self.settings.sail_time)?;
        require_positive("speed_tolerance", self.settings.speed_tolerance)?;
        let propulsion = Propulsion::derive(hull, engine, class, modifiers)?;

        let mut transitions = Vec::with_capacity(throttles.len());
        for &throttle in throttles {
            let outcome = self.transition(&propulsion, throttle);
            if let Err(EngineError::Cancelled) = outcome {
                return Err(EngineError::Cancelled);
            }
            transitions.push(GearTransition { throttle, outcome });
        }

        Ok(AccelerationReport {
            max_forward_speed: propulsion.max_forward_speed,
            max_reverse_speed: propulsion.max_reverse_speed,
            max_power_forward: propulsion.max_power_forward,
            max_power_backward: propulsion.max_power_backward,
            transitions,
        })
    }

    /// From rest to `throttle`, a short sail, then back to rest.
    fn transition(&self, propulsion: &Propulsion, throttle: i32) -> EngineResult<AccelerationCurve> {
        if !(FULL_ASTERN..=FULL_AHEAD).contains(&throttle) {
            return Err(EngineError::invalid("throttle", throttle as f64));
        }

        let limit = propulsion.speed_limit(throttle);
        let mut state = EngineState::default();
        let mut samples = vec![SpeedSample {
            speed: 0.0,
            time: 0.0,
        }];

        self.run_phase(
            propulsion,
            &mut state,
            limit,
            Phase::Acceleration,
            self.settings.acceleration_ceiling,
            &mut samples,
        )?;
        let acceleration_len = samples.len();
        let time_to_speed = state.time;

        let sail_steps = (self.settings.sail_time / self.settings.time_step).round() as usize;
        for _ in 0..sail_steps {
            check_cancelled(self.cancel.as_ref())?;
            self.step(propulsion, &mut state, limit, Phase::Acceleration)?;
            samples.push(SpeedSample {
                speed: state.speed,
                time: state.time,
            });
        }

        let stop_ordered = state.time;
        self.run_phase(
            propulsion,
            &mut state,
            0.0,
            Phase::Deceleration,
            self.settings.deceleration_ceiling,
            &mut samples,
        )?;

        debug!(
            throttle,
            time_to_speed,
            time_to_stop = state.time - stop_ordered,
            "acceleration curve complete"
        );
        Ok(AccelerationCurve {
            throttle,
            samples,
            acceleration_len,
            time_to_speed,
            time_to_stop: state.time - stop_ordered,
        })
    }

    /// Step until the speed settles on `limit` or the phase runs out of time.
    fn run_phase(
        &self,
        propulsion: &Propulsion,
        state: &mut EngineState,
        limit: f64,
        phase: Phase,
        ceiling: f64,
        samples: &mut Vec<SpeedSample>,
    ) -> EngineResult<()> {
        let start = state.time;
        while (state.speed - limit).abs() > self.settings.speed_tolerance {
            if state.time - start >= ceiling {
                warn!(
                    %phase,
                    speed = state.speed,
                    limit,
                    "speed limit not reached within {} s",
                    ceiling
                );
                return Err(EngineError::diverged(phase, ceiling));
            }
            check_cancelled(self.cancel.as_ref())?;

            self.step(propulsion, state, limit, phase)?;
            samples.push(SpeedSample {
                speed: state.speed,
                time: state.time,
            });
        }

        state.speed = limit;
        state.power = propulsion.holding_power(limit);
        Ok(())
    }

    /// Advance the engine and hull by one time step toward `limit`.
    fn step(
        &self,
        propulsion: &Propulsion,
        state: &mut EngineState,
        limit: f64,
        phase: Phase,
    ) -> EngineResult<()> {
        let dt = self.settings.time_step;
        let tolerance = self.settings.speed_tolerance;
        let speed = state.speed;
        let gap = limit - speed;

        let target = if gap.abs() <= tolerance {
            propulsion.holding_power(limit)
        } else if gap > 0.0 {
            propulsion.max_power_forward
        } else {
            -propulsion.max_power_backward
        };

        // Spool toward the target with the time constant of that direction
        let power = if target > state.power {
            let rate = propulsion.max_power_forward / propulsion.forward_up_time;
            (state.power + rate * dt).min(target)
        } else {
            let rate = propulsion.max_power_backward / propulsion.backward_up_time;
            (state.power - rate * dt).max(target)
        };
        let power = power.clamp(-propulsion.max_power_backward, propulsion.max_power_forward);

        // Inside the forsage band the engine delivers boosted full power at once
        let drag = propulsion.drag(speed);
        let acceleration =
            if gap > tolerance && speed >= 0.0 && speed < propulsion.forward_forsage_speed {
                propulsion.forward_forsage * propulsion.max_power_forward + drag
            } else if gap < -tolerance && speed <= 0.0 && -speed < propulsion.backward_forsage_speed
            {
                -propulsion.backward_forsage * propulsion.max_power_backward + drag
            } else {
                power + drag
            };

        let mut new_speed = speed + acceleration * dt;
        let crossed = (speed < limit && new_speed >= limit) || (speed > limit && new_speed <= limit);
        state.power = power;
        if crossed || (new_speed - limit).abs() <= tolerance {
            new_speed = limit;
            state.power = propulsion.holding_power(limit);
        }

        state.speed = new_speed;
        state.time += dt;

        if !(state.speed.is_finite() && state.power.is_finite() && state.time.is_finite()) {
            warn!(%phase, time = state.time, "non-finite engine state");
            return Err(EngineError::diverged(phase, state.time));
        }
        Ok(())
    }
}
