//! Per-frame pose estimation followed by stabilization.

use crate::{
    constants::POSE_DOF,
    geometry::{EulerAngles, Pose},
    landmarks::LandmarkSet,
    pose_solver::PoseSolver,
    stabilizer::{ScalarStabilizer, Stabilizer, StabilizerConfig},
    Result,
};

/// Everything produced for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEstimate {
    /// Pose straight from the solver
    pub raw: Pose,
    /// Pose after per-component smoothing
    pub steady: Pose,
    /// Euler angles of the raw pose
    pub angles: EulerAngles,
    /// Euler angles of the steady pose
    pub steady_angles: EulerAngles,
}

/// The solver and its six stabilizers, one per flattened pose component
#[derive(Debug, Clone)]
pub struct PosePipeline {
    solver: PoseSolver,
    stabilizers: [ScalarStabilizer; POSE_DOF],
}

impl PosePipeline {
    /// # Errors
    ///
    /// Returns an error if the stabilizer configuration is invalid
    pub fn new(solver: PoseSolver, config: StabilizerConfig) -> Result<Self> {
        let stabilizer = ScalarStabilizer::new(config)?;
        log::info!(
            "Pose pipeline ready: state_num {}, cov_process {}, cov_measure {}",
            config.state_num,
            config.cov_process,
            config.cov_measure
        );
        Ok(Self {
            solver,
            stabilizers: std::array::from_fn(|_| stabilizer.clone()),
        })
    }

    #[must_use]
    pub fn solver(&self) -> &PoseSolver {
        &self.solver
    }

    /// Handle one frame's detection
    ///
    /// Returns `None` when no face was found or the solve failed
    /// recoverably. The stabilizers only advance on frames with a pose.
    pub fn process(&mut self, landmarks: Option<&LandmarkSet>) -> Option<FrameEstimate> {
        let landmarks = landmarks?;

        let raw = match self.solver.solve_pose(landmarks) {
            Ok(pose) => pose,
            Err(e) if e.is_recoverable() => {
                log::debug!("No pose this frame: {e}");
                return None;
            }
            Err(e) => {
                log::warn!("Pose solve failed: {e}");
                return None;
            }
        };

        let steady = self.stabilize(&raw);
        Some(FrameEstimate {
            raw,
            steady,
            angles: raw.euler_angles(),
            steady_angles: steady.euler_angles(),
        })
    }

    /// Feed a raw pose through the stabilizer bank
    pub fn stabilize(&mut self, raw: &Pose) -> Pose {
        let mut values = raw.to_array();
        for (value, stabilizer) in values.iter_mut().zip(self.stabilizers.iter_mut()) {
            stabilizer.update(*value);
            *value = stabilizer.value();
        }
        Pose::from_array(values)
    }

    /// Clear the solver seed and all filter state
    pub fn reset(&mut self) {
        self.solver.reset();
        self.stabilizers.iter_mut().for_each(Stabilizer::reset);
    }
}
