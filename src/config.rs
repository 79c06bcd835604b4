//! Configuration management for the head pose tracker

use crate::{
    constants::{DEFAULT_QUEUE_CAPACITY, DEFAULT_RESEED_RMSE, MAX_DETECTOR_NOISE},
    face_model::{FaceModel, ModelVariant},
    pipeline::PosePipeline,
    pnp::RefineParams,
    pose_solver::PoseSolver,
    stabilizer::StabilizerConfig,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tracker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame size
    pub camera: CameraConfig,

    /// Pose solver configuration
    pub solver: SolverConfig,

    /// Per-component stabilizer configuration
    pub stabilizer: StabilizerConfig,

    /// Landmark detector configuration
    pub detector: DetectorConfig,
}

/// Frame dimensions the camera intrinsics are derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,
}

/// Pose solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Face model the detector output corresponds to
    pub variant: ModelVariant,

    /// Optional 68-point model file; the built-in model is used otherwise
    pub face_model: Option<PathBuf>,

    /// Reprojection error in pixels above which a seeded solve is redone
    /// from a linear estimate
    pub reseed_rmse: f64,

    /// Levenberg-Marquardt settings
    pub refine: RefineParams,
}

/// Landmark detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Frames that may wait for the detector thread
    pub queue_capacity: usize,

    /// Uniform pixel noise added by the synthetic detector
    pub noise: f64,

    /// Seed for the synthetic detector's noise
    pub seed: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { width: 640, height: 480 }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            variant: ModelVariant::Full,
            face_model: None,
            reseed_rmse: DEFAULT_RESEED_RMSE,
            refine: RefineParams::default(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            noise: 0.0,
            seed: 0,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Build the solver and stabilizer bank described by this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the face model
    /// file cannot be loaded
    pub fn build_pipeline(&self) -> Result<PosePipeline> {
        self.validate()?;

        let model = match &self.solver.face_model {
            Some(path) => FaceModel::from_file(path)?,
            None => FaceModel::canonical(),
        };
        let solver = PoseSolver::with_model(self.camera.height, self.camera.width, model)?
            .with_params(self.solver.refine)
            .with_reseed_rmse(self.solver.reseed_rmse);

        PosePipeline::new(solver, self.stabilizer)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        // Validate frame size
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError("Frame width and height must be greater than 0".to_string()));
        }

        // Validate solver settings
        let refine = &self.solver.refine;
        if refine.max_iterations == 0 {
            return Err(Error::ConfigError("max_iterations must be greater than 0".to_string()));
        }
        if !(refine.initial_damping.is_finite() && refine.initial_damping > 0.0) {
            return Err(Error::ConfigError("initial_damping must be positive".to_string()));
        }
        if !(refine.step_tolerance >= 0.0 && refine.cost_tolerance >= 0.0) {
            return Err(Error::ConfigError("Tolerances must not be negative".to_string()));
        }
        if !(self.solver.reseed_rmse.is_finite() && self.solver.reseed_rmse > 0.0) {
            return Err(Error::ConfigError("reseed_rmse must be positive".to_string()));
        }
        if let Some(path) = &self.solver.face_model {
            if !path.exists() {
                return Err(Error::ConfigError(format!("3D face model not found: {}", path.display())));
            }
        }

        // Validate stabilizer settings
        self.stabilizer
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid stabilizer settings: {e}")))?;

        // Validate detector settings
        if self.detector.queue_capacity == 0 {
            return Err(Error::ConfigError("Detector queue capacity must be greater than 0".to_string()));
        }
        if !(0.0..=MAX_DETECTOR_NOISE).contains(&self.detector.noise) {
            return Err(Error::ConfigError(format!(
                "Detector noise must be within 0..={MAX_DETECTOR_NOISE} px, got {}",
                self.detector.noise
            )));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Tracking Configuration

# Frame size the camera intrinsics are derived from
camera:
  width: 640
  height: 480

# Pose solver
solver:
  variant: full            # full (68 landmarks) or reduced (14 landmarks)
  face_model: null         # optional path to a 68-point model file
  reseed_rmse: 25.0
  refine:
    max_iterations: 50
    initial_damping: 0.001
    step_tolerance: 1.0e-12
    cost_tolerance: 1.0e-14

# One Kalman filter per pose component
stabilizer:
  state_num: 2
  measure_num: 1
  cov_process: 0.1
  cov_measure: 0.1

# Landmark detector thread
detector:
  queue_capacity: 1
  noise: 0.0
  seed: 0
"#;
