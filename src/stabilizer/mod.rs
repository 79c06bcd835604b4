//! Temporal smoothing of noisy per-frame estimates.
//!
//! Each pose component gets its own Kalman filter so that jitter in the raw
//! PnP solution does not reach the output.

/// Kalman filter core and the scalar and point stabilizers built on it
pub mod kalman;

pub use kalman::{KalmanFilter, PointStabilizer, ScalarStabilizer};

use crate::{
    constants::{DEFAULT_COV_MEASURE, DEFAULT_COV_PROCESS, DEFAULT_MEASURE_NUM, DEFAULT_STATE_NUM},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Trait for all stabilizers
pub trait Stabilizer: Send {
    /// What one frame's observation looks like
    type Measurement;

    /// Run one predict and correct cycle
    fn update(&mut self, measurement: Self::Measurement);

    /// Reset filter state
    fn reset(&mut self);

    /// Get stabilizer name
    fn name(&self) -> &str;
}

/// Scalar stabilizer settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// 1 for a constant model, 2 for constant velocity
    pub state_num: usize,
    /// Always 1 for scalar input
    pub measure_num: usize,
    /// Process noise variance
    pub cov_process: f64,
    /// Measurement noise variance
    pub cov_measure: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            state_num: DEFAULT_STATE_NUM,
            measure_num: DEFAULT_MEASURE_NUM,
            cov_process: DEFAULT_COV_PROCESS,
            cov_measure: DEFAULT_COV_MEASURE,
        }
    }
}

impl StabilizerConfig {
    /// Check the settings describe a scalar filter
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `state_num` is not 1 or 2
    /// - `measure_num` is not 1
    /// - A covariance is not positive and finite
    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.state_num) {
            return Err(Error::FilterError(format!("state_num must be 1 or 2, got {}", self.state_num)));
        }
        if self.measure_num != 1 {
            return Err(Error::FilterError(format!("measure_num must be 1, got {}", self.measure_num)));
        }
        if !(self.cov_process.is_finite() && self.cov_process > 0.0) {
            return Err(Error::FilterError(format!("cov_process must be positive, got {}", self.cov_process)));
        }
        if !(self.cov_measure.is_finite() && self.cov_measure > 0.0) {
            return Err(Error::FilterError(format!("cov_measure must be positive, got {}", self.cov_measure)));
        }
        Ok(())
    }
}

/// Build `count` identical scalar stabilizers
///
/// # Errors
///
/// Returns an error if the configuration is invalid
pub fn create_bank(config: StabilizerConfig, count: usize) -> Result<Vec<ScalarStabilizer>> {
    (0..count).map(|_| ScalarStabilizer::new(config)).collect()
}
