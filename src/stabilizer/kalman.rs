use super::{Stabilizer, StabilizerConfig};
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};

/// Linear Kalman filter with runtime state and measurement sizes
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    // State estimate
    state: DVector<f64>,
    // Error covariance
    covariance: DMatrix<f64>,
    // Process noise
    process_noise: DMatrix<f64>,
    // Measurement noise
    measurement_noise: DMatrix<f64>,
    // State transition matrix
    transition: DMatrix<f64>,
    // Measurement matrix
    measurement: DMatrix<f64>,
}

impl KalmanFilter {
    /// Build a filter with zero state, identity covariance and isotropic noise
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The transition matrix is not square
    /// - The measurement matrix width differs from the state size
    /// - A noise covariance is not positive and finite
    pub fn new(transition: DMatrix<f64>, measurement: DMatrix<f64>, cov_process: f64, cov_measure: f64) -> Result<Self> {
        let state_num = transition.nrows();
        if state_num == 0 || !transition.is_square() {
            return Err(Error::FilterError(format!(
                "Transition matrix must be square and non-empty, got {}x{}",
                transition.nrows(),
                transition.ncols()
            )));
        }
        if measurement.nrows() == 0 || measurement.ncols() != state_num {
            return Err(Error::FilterError(format!(
                "Measurement matrix must be m x {state_num}, got {}x{}",
                measurement.nrows(),
                measurement.ncols()
            )));
        }
        for (name, value) in [("cov_process", cov_process), ("cov_measure", cov_measure)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::FilterError(format!("{name} must be positive, got {value}")));
            }
        }

        let measure_num = measurement.nrows();
        Ok(Self {
            state: DVector::zeros(state_num),
            covariance: DMatrix::identity(state_num, state_num),
            process_noise: DMatrix::identity(state_num, state_num) * cov_process,
            measurement_noise: DMatrix::identity(measure_num, measure_num) * cov_measure,
            transition,
            measurement,
        })
    }

    /// Constant-velocity transition for `dims` positions followed by their
    /// velocities, with a unit time step
    #[must_use]
    pub fn constant_velocity(dims: usize) -> DMatrix<f64> {
        let mut transition = DMatrix::identity(2 * dims, 2 * dims);
        for i in 0..dims {
            transition[(i, dims + i)] = 1.0;
        }
        transition
    }

    /// Measurement matrix observing the first `measure_num` state entries
    #[must_use]
    pub fn observe_leading(measure_num: usize, state_num: usize) -> DMatrix<f64> {
        DMatrix::identity(measure_num, state_num)
    }

    fn predict(&mut self) {
        let state = &self.transition * &self.state;
        let covariance = &self.transition * &self.covariance * self.transition.transpose() + &self.process_noise;

        if !(all_finite(state.iter()) && all_finite(covariance.iter())) {
            log::warn!("Prediction overflowed, holding the previous estimate");
            return;
        }
        self.state = state;
        self.covariance = covariance;
    }

    fn correct(&mut self, measurement: &DVector<f64>) {
        let innovation = measurement - &self.measurement * &self.state;
        if !all_finite(innovation.iter()) {
            log::warn!("Innovation overflowed, skipping correction");
            return;
        }
        let innovation_cov =
            &self.measurement * &self.covariance * self.measurement.transpose() + &self.measurement_noise;

        // K = P Hᵀ S⁻¹, computed as (S⁻¹ H P)ᵀ since P and S are symmetric
        let Some(cholesky) = innovation_cov.cholesky() else {
            log::warn!("Innovation covariance is not positive definite, skipping correction");
            return;
        };
        let gain = cholesky.solve(&(&self.measurement * &self.covariance)).transpose();

        let state = &self.state + &gain * innovation;

        // Joseph form keeps the covariance symmetric positive semi-definite
        let n = self.state.len();
        let residual = DMatrix::identity(n, n) - &gain * &self.measurement;
        let covariance = &residual * &self.covariance * residual.transpose()
            + &gain * &self.measurement_noise * gain.transpose();

        if !(all_finite(state.iter()) && all_finite(covariance.iter())) {
            log::warn!("Correction overflowed, keeping the predicted estimate");
            return;
        }
        self.state = state;
        self.covariance = covariance;
    }

    /// One predict and correct cycle
    ///
    /// A measurement with a wrong length or a non-finite entry is dropped
    /// after the predict step. A predict or correct result that overflows
    /// is discarded, so the state stays finite.
    pub fn step(&mut self, measurement: &DVector<f64>) {
        self.predict();
        if measurement.len() != self.measurement.nrows() || !all_finite(measurement.iter()) {
            log::trace!("Dropping unusable measurement {:?}", measurement.as_slice());
            return;
        }
        self.correct(measurement);
    }

    /// Restore the zero state and identity covariance
    pub fn reset(&mut self) {
        let n = self.state.len();
        self.state = DVector::zeros(n);
        self.covariance = DMatrix::identity(n, n);
    }

    #[must_use]
    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }

    #[must_use]
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}

/// Kalman smoother for a single scalar such as one pose component
#[derive(Debug, Clone)]
pub struct ScalarStabilizer {
    filter: KalmanFilter,
    config: StabilizerConfig,
}

impl ScalarStabilizer {
    /// # Errors
    ///
    /// Returns an error if the configuration is not a valid scalar setup
    pub fn new(config: StabilizerConfig) -> Result<Self> {
        config.validate()?;

        let transition = match config.state_num {
            1 => DMatrix::identity(1, 1),
            _ => KalmanFilter::constant_velocity(1),
        };
        let measurement = KalmanFilter::observe_leading(config.measure_num, config.state_num);
        let filter = KalmanFilter::new(transition, measurement, config.cov_process, config.cov_measure)?;

        Ok(Self { filter, config })
    }

    /// Filtered value, the first state entry
    #[must_use]
    pub fn value(&self) -> f64 {
        self.filter.state()[0]
    }

    /// Full filter state, `[value]` or `[value, rate]`
    #[must_use]
    pub fn state(&self) -> &[f64] {
        self.filter.state().as_slice()
    }

    #[must_use]
    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }
}

impl Stabilizer for ScalarStabilizer {
    type Measurement = f64;

    fn update(&mut self, measurement: f64) {
        self.filter.step(&DVector::from_element(1, measurement));
    }

    fn reset(&mut self) {
        self.filter.reset();
    }

    fn name(&self) -> &str {
        "ScalarStabilizer"
    }
}

/// Constant-velocity Kalman smoother for a 2D image point
#[derive(Debug, Clone)]
pub struct PointStabilizer {
    filter: KalmanFilter,
}

impl PointStabilizer {
    /// # Errors
    ///
    /// Returns an error if a noise covariance is not positive and finite
    pub fn new(cov_process: f64, cov_measure: f64) -> Result<Self> {
        let filter = KalmanFilter::new(
            KalmanFilter::constant_velocity(2),
            KalmanFilter::observe_leading(2, 4),
            cov_process,
            cov_measure,
        )?;
        Ok(Self { filter })
    }

    /// Filtered `[x, y]`
    #[must_use]
    pub fn value(&self) -> [f64; 2] {
        let state = self.filter.state();
        [state[0], state[1]]
    }

    /// Estimated per-frame velocity `[vx, vy]`
    #[must_use]
    pub fn velocity(&self) -> [f64; 2] {
        let state = self.filter.state();
        [state[2], state[3]]
    }
}

impl Stabilizer for PointStabilizer {
    type Measurement = [f64; 2];

    fn update(&mut self, measurement: [f64; 2]) {
        self.filter.step(&DVector::from_column_slice(&measurement));
    }

    fn reset(&mut self) {
        self.filter.reset();
    }

    fn name(&self) -> &str {
        "PointStabilizer"
    }
}
