//! Helper functions and utilities for tests

#![allow(dead_code)]

use head_pose_tracking::{
    face_model::ModelVariant, geometry::Pose, landmarks::LandmarkSet, pose_solver::PoseSolver, Error, Result,
};
use nalgebra::Vector3;

/// Frame height used across the integration tests
pub const HEIGHT: u32 = 480;

/// Frame width used across the integration tests
pub const WIDTH: u32 = 640;

/// Create a solver for the standard test frame size
pub fn create_test_solver() -> Result<PoseSolver> {
    PoseSolver::new(HEIGHT, WIDTH)
}

/// Project a model variant through a pose with the solver's camera
pub fn project_landmarks(solver: &PoseSolver, variant: ModelVariant, pose: &Pose) -> Result<LandmarkSet> {
    solver
        .camera()
        .project_points(pose, solver.model(variant).points())
        .map(LandmarkSet::new)
        .ok_or_else(|| Error::InvalidInput("Test pose puts the face behind the camera".to_string()))
}

/// Pose from Euler angles in degrees and a translation
pub fn pose_from_degrees(pitch: f64, yaw: f64, roll: f64, translation: [f64; 3]) -> Pose {
    let angles = head_pose_tracking::EulerAngles::new(pitch, yaw, roll);
    Pose::new(angles.to_rotation_vector(), Vector3::from(translation))
}

/// Assert that every pose component is finite
pub fn assert_pose_finite(pose: &Pose) -> Result<()> {
    for (i, value) in pose.to_array().iter().enumerate() {
        if !value.is_finite() {
            return Err(Error::InvalidInput(format!("Non-finite value at index {i}: {value}")));
        }
    }
    Ok(())
}

/// Assert two poses agree component-wise
pub fn assert_pose_close(actual: &Pose, expected: &Pose, tolerance: f64) {
    for (i, (a, e)) in actual.to_array().iter().zip(expected.to_array()).enumerate() {
        assert!(
            (a - e).abs() < tolerance,
            "component {i}: {a} vs {e} (tolerance {tolerance})"
        );
    }
}
