// Error type shared by every simulation in the engine
use std::error::Error;
use std::fmt;

/// Integration loop that can run out of its time budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Trajectory,
    Acceleration,
    Deceleration,
    Sampling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Trajectory => "trajectory",
            Phase::Acceleration => "acceleration",
            Phase::Deceleration => "deceleration",
            Phase::Sampling => "sampling",
        };
        write!(f, "{}", name)
    }
}

/// Recoverable failure of an engine operation.
///
/// None of these abort the host: callers decide whether to show "N/A",
/// drop a chart or retry with corrected input.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A physical quantity was non-positive or non-finite
    InvalidInput {
        parameter: &'static str,
        value: f64,
    },
    /// No ballistic entry reaches the requested aiming range
    NoSolution {
        aim_range: f64,
    },
    /// An integration loop exceeded its ceiling or went non-finite
    Diverged {
        phase: Phase,
        limit: f64,
    },
    /// The caller's cancellation token was triggered
    Cancelled,
}

impl EngineError {
    pub(crate) fn invalid(parameter: &'static str, value: f64) -> Self {
        EngineError::InvalidInput { parameter, value }
    }

    pub(crate) fn diverged(phase: Phase, limit: f64) -> Self {
        EngineError::Diverged { phase, limit }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::InvalidInput { parameter, value } => {
                write!(f, "invalid input: {} = {}", parameter, value)
            }
            EngineError::NoSolution { aim_range } => {
                write!(f, "no ballistic solution at or beyond {:.0} m", aim_range)
            }
            EngineError::Diverged { phase, limit } => {
                write!(f, "{} did not converge within {}", phase, limit)
            }
            EngineError::Cancelled => write!(f, "simulation cancelled"),
        }
    }
}

impl Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject anything that is not a finite, strictly positive number.
pub(crate) fn require_positive(parameter: &'static str, value: f64) -> EngineResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::invalid(parameter, value))
    }
}

/// Like [`require_positive`] but zero is accepted.
pub(crate) fn require_non_negative(parameter: &'static str, value: f64) -> EngineResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::invalid(parameter, value))
    }
}
