//! Head pose tracking library for real-time human head pose estimation.
//!
//! This library turns 2D facial landmarks into a stable 3D head pose:
//! - A Perspective-n-Point solver (linear DLT seed plus Levenberg-Marquardt
//!   refinement) against a fixed 3D face model
//! - A bank of Kalman filters smoothing the six pose components
//! - A detector interface with a worker thread so detection latency stays
//!   off the tracking loop
//!
//! The per-frame pipeline consists of:
//! 1. Landmark detection (external, behind [`detection::LandmarkDetector`])
//! 2. Pose estimation with [`pose_solver::PoseSolver`]
//! 3. Stabilization with one [`stabilizer::ScalarStabilizer`] per component
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```
//! use head_pose_tracking::{
//!     face_model::ModelVariant, geometry::Pose, landmarks::LandmarkSet, pose_solver::PoseSolver,
//! };
//! use nalgebra::Vector3;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut solver = PoseSolver::new(480, 640)?;
//!
//! // Landmarks as a detector would report them for a slightly turned head
//! let truth = Pose::new(Vector3::new(0.0, 0.3, 0.0), Vector3::new(0.0, 0.0, 700.0));
//! let points = solver
//!     .camera()
//!     .project_points(&truth, solver.model(ModelVariant::Full).points())
//!     .ok_or("face behind camera")?;
//!
//! let pose = solver.solve_pose(&LandmarkSet::new(points))?;
//! let angles = solver.get_euler_angles(&pose);
//! println!("Pitch: {:.2}°, Yaw: {:.2}°, Roll: {:.2}°", angles.pitch, angles.yaw, angles.roll);
//! # Ok(())
//! # }
//! ```
//!
//! ## Complete Pipeline Example
//!
//! ```
//! use head_pose_tracking::{
//!     config::Config,
//!     detection::DetectorWorker,
//!     face_model::ModelVariant,
//!     synthetic::SyntheticDetector,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut pipeline = config.build_pipeline()?;
//!
//! let detector = SyntheticDetector::new(480, 640, ModelVariant::Full, 0.5, 42)?;
//! let worker = DetectorWorker::spawn(detector, config.detector.queue_capacity)?;
//!
//! for frame in 0..30u64 {
//!     worker.submit(frame)?;
//!     let landmarks = worker.recv()?;
//!     if let Some(estimate) = pipeline.process(landmarks.as_ref()) {
//!         println!("yaw {:.1}° (steady {:.1}°)", estimate.angles.yaw, estimate.steady_angles.yaw);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Pinhole camera intrinsics
pub mod camera;

/// Configuration management
pub mod config;

/// Constants used throughout the library
pub mod constants;

/// Landmark detector interface and worker thread
pub mod detection;

/// Error types and result handling
pub mod error;

/// 3D face models
pub mod face_model;

/// Poses, Euler angles and annotation geometry
pub mod geometry;

/// Detected 2D landmarks
pub mod landmarks;

/// Solver plus stabilizers, one frame at a time
pub mod pipeline;

/// Perspective-n-Point numerics
pub mod pnp;

/// Head pose estimation using `PnP`
pub mod pose_solver;

/// Kalman filters for smoothing pose estimates
pub mod stabilizer;

/// Scripted landmark source for demos and tests
pub mod synthetic;

/// Utility functions for coordinate conversions
pub mod utils;

pub use error::{Error, Result};
pub use geometry::{EulerAngles, Pose};
pub use landmarks::LandmarkSet;
pub use pipeline::{FrameEstimate, PosePipeline};
pub use pose_solver::PoseSolver;
