//! Error types for the head pose tracking library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Face model file has the wrong shape or contents
    #[error("Model validation error: {0}")]
    ModelValidationError(String),

    /// The landmark configuration admits no consistent pose (too few,
    /// collinear or coincident points, or points behind the camera)
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Iterative pose refinement did not reach a finite solution
    #[error("Pose refinement did not converge after {iterations} iterations (rmse {rmse:.3} px)")]
    NoConvergence {
        /// Iterations spent before giving up
        iterations: usize,
        /// Root-mean-square reprojection error of the last accepted estimate
        rmse: f64,
    },

    /// Stabilizer initialization error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Landmark detector or detector worker failed
    #[error("Detector error: {0}")]
    DetectorError(String),
}

impl Error {
    /// Whether the error only means "no pose for this frame".
    ///
    /// The frame loop skips the frame on these and carries on.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DegenerateGeometry(_) | Self::NoConvergence { .. })
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
