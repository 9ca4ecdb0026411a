//! Monte Carlo shot grouping inside a dispersion ellipse.

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{StandardNormal, Uniform};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;
use tracing::warn;

use crate::dispersion::DispersionEllipse;
use crate::error::{require_positive, EngineError, EngineResult, Phase};

/// Draws per shot before the truncated normal is declared unreachable
const MAX_RESAMPLE_ATTEMPTS: usize = 10_000;

/// Largest number of shots one sampling run will allocate for
pub const MAX_SHOT_COUNT: usize = 10_000_000;

/// Compression scale for shots landing past the aim point (m)
const OVER_AIM_SCALE_M: f64 = 300.0;

/// Inputs for one sampling run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotGrouping {
    pub sigma: f64,
    pub horizontal_radius: f64,   // meters
    pub vertical_radius: f64,     // meters
    pub shot_count: usize,
    pub waterline_ratio: f64,     // sin(impact angle)
    pub perpendicular_ratio: f64, // cos(impact angle)
}

impl ShotGrouping {
    /// Grouping for a valid ellipse, `None` otherwise
    pub fn from_ellipse(ellipse: &DispersionEllipse, sigma: f64, shot_count: usize) -> Option<Self> {
        if !ellipse.is_valid() {
            return None;
        }
        Some(Self {
            sigma,
            horizontal_radius: ellipse.horizontal_radius,
            vertical_radius: ellipse.vertical_radius,
            shot_count,
            waterline_ratio: ellipse.waterline_ratio,
            perpendicular_ratio: ellipse.perpendicular_ratio,
        })
    }

    fn validate(&self) -> EngineResult<()> {
        require_positive("sigma", self.sigma)?;
        if self.shot_count > MAX_SHOT_COUNT {
            return Err(EngineError::InvalidInput {
                parameter: "shot_count",
                value: self.shot_count as f64,
            });
        }
        require_positive("waterline_ratio", self.waterline_ratio)?;
        require_positive("perpendicular_ratio", self.perpendicular_ratio)?;
        for (name, radius) in [
            ("horizontal_radius", self.horizontal_radius),
            ("vertical_radius", self.vertical_radius),
        ] {
            if !(radius.is_finite() && radius >= 0.0) {
                return Err(EngineError::InvalidInput {
                    parameter: name,
                    value: radius,
                });
            }
        }
        Ok(())
    }
}

/// Simulated hits plus the ellipse expected to hold half of them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitPointSet {
    pub real: Vec<Vector2<f64>>,
    pub on_water: Vec<Vector2<f64>>,
    pub on_perpendicular: Vec<Vector2<f64>>,
    pub horizontal_radius_half_hit: f64,
    pub vertical_radius_half_hit: f64,
    pub vertical_radius_on_water_half_hit: f64,
    pub vertical_radius_on_perpendicular_half_hit: f64,
    pub valid: bool,
}

impl HitPointSet {
    /// Result for an ellipse that cannot be drawn
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }
}

/// Fraction of the dispersion radius that holds half of all shots.
///
/// Shots follow a normal distribution truncated at ±sigma and scaled to the
/// ellipse radius, so the half-hit radius is the quantile leaving a quarter
/// of the truncated mass in each tail.
pub fn half_hit_ratio(sigma: f64) -> EngineResult<f64> {
    let sigma = require_positive("sigma", sigma)?;
    let normal = Normal::new(0.0, 1.0).map_err(|_| EngineError::invalid("sigma", sigma))?;
    let lower = normal.cdf(-sigma);
    let z = normal.cdf(sigma) - lower;
    let quantile = normal.inverse_cdf(0.25 * z + lower);

    let ratio = quantile / -sigma;
    if ratio.is_finite() {
        Ok(ratio)
    } else {
        Err(EngineError::invalid("sigma", sigma))
    }
}

/// Foreshortening applied to shots that land past the aim point
pub fn compress_over_aim(y: f64) -> f64 {
    OVER_AIM_SCALE_M * (0.1 * y / 30.0 + 1.0).ln()
}

/// Shot-grouping simulator over an injected random source
pub struct HitPointSampler<R: Rng> {
    rng: R,
}

impl HitPointSampler<StdRng> {
    /// Sampler seeded from the operating system
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible sampler
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> HitPointSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Sample shots for an ellipse; an invalid ellipse yields an empty set
    /// without touching the random source.
    pub fn sample_ellipse(
        &mut self,
        ellipse: &DispersionEllipse,
        sigma: f64,
        shot_count: usize,
    ) -> EngineResult<HitPointSet> {
        match ShotGrouping::from_ellipse(ellipse, sigma, shot_count) {
            Some(grouping) => self.sample(&grouping),
            None => Ok(HitPointSet::empty()),
        }
    }

    /// Draw `shot_count` hit points.
    ///
    /// # Returns
    /// Real, water-projected and perpendicular-projected points and the
    /// half-hit radii; `InvalidInput` for a bad grouping
    pub fn sample(&mut self, grouping: &ShotGrouping) -> EngineResult<HitPointSet> {
        grouping.validate()?;

        let ratio = half_hit_ratio(grouping.sigma)?;
        let angle_dist = Uniform::new(0.0, 2.0 * PI);

        let mut set = HitPointSet {
            real: Vec::with_capacity(grouping.shot_count),
            on_water: Vec::with_capacity(grouping.shot_count),
            on_perpendicular: Vec::with_capacity(grouping.shot_count),
            horizontal_radius_half_hit: grouping.horizontal_radius * ratio,
            vertical_radius_half_hit: grouping.vertical_radius * ratio,
            vertical_radius_on_water_half_hit: grouping.vertical_radius / grouping.waterline_ratio
                * ratio,
            vertical_radius_on_perpendicular_half_hit: grouping.vertical_radius
                / grouping.perpendicular_ratio
                * ratio,
            valid: true,
        };

        for _ in 0..grouping.shot_count {
            let theta = self.rng.sample(angle_dist);
            let r = self.adjusted_gaussian(grouping.sigma)?;

            let x = r * grouping.horizontal_radius * theta.cos();
            let mut y = r * grouping.vertical_radius * theta.sin();
            if y > 0.0 {
                y = compress_over_aim(y);
            }

            set.real.push(Vector2::new(x, y));
            set.on_water.push(Vector2::new(x, y / grouping.waterline_ratio));
            set.on_perpendicular.push(Vector2::new(x, y / grouping.perpendicular_ratio));
        }

        Ok(set)
    }

    /// Standard normal scaled by `1 / sigma`, redrawn until it lies in [-1, 1]
    fn adjusted_gaussian(&mut self, sigma: f64) -> EngineResult<f64> {
        for _ in 0..MAX_RESAMPLE_ATTEMPTS {
            let z: f64 = self.rng.sample(StandardNormal);
            let r = z / sigma;
            if (-1.0..=1.0).contains(&r) {
                return Ok(r);
            }
        }
        warn!(sigma, "no normal draw inside ±sigma after {} attempts", MAX_RESAMPLE_ATTEMPTS);
        Err(EngineError::diverged(Phase::Sampling, MAX_RESAMPLE_ATTEMPTS as f64))
    }
}
