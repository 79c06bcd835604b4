//! A stand-in landmark detector that renders a scripted head motion.
//!
//! Used by the command line demo and by tests that need a detector without
//! any image processing.

use crate::{
    camera::CameraModel,
    constants::MAX_DETECTOR_NOISE,
    detection::LandmarkDetector,
    face_model::{FaceModel, ModelVariant},
    geometry::{EulerAngles, Pose},
    landmarks::LandmarkSet,
    Error, Result,
};
use nalgebra::Vector3;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Head pose at a given frame of the scripted motion
///
/// The head sways in yaw, nods in pitch and tilts slightly in roll while
/// drifting toward and away from the camera.
#[must_use]
pub fn scripted_pose(frame: u64) -> Pose {
    let t = frame as f64 / 30.0;
    let angles = EulerAngles::new(
        15.0 * (0.7 * t).sin(),
        30.0 * (0.5 * t).sin(),
        8.0 * (0.3 * t).cos(),
    );
    let translation = Vector3::new(40.0 * (0.2 * t).sin(), -20.0, 650.0 + 80.0 * (0.25 * t).sin());
    Pose::new(angles.to_rotation_vector(), translation)
}

/// Detector that projects the face model through [`scripted_pose`]
#[derive(Debug, Clone)]
pub struct SyntheticDetector {
    camera: CameraModel,
    model: FaceModel,
    noise: f64,
    rng: StdRng,
}

impl SyntheticDetector {
    /// # Errors
    ///
    /// Returns an error if the frame size is zero, the noise is outside
    /// `0..=MAX_DETECTOR_NOISE` pixels, or the model cannot be reduced to
    /// `variant`
    pub fn new(height: u32, width: u32, variant: ModelVariant, noise: f64, seed: u64) -> Result<Self> {
        if !(0.0..=MAX_DETECTOR_NOISE).contains(&noise) {
            return Err(Error::InvalidInput(format!(
                "Detector noise must be within 0..={MAX_DETECTOR_NOISE} px, got {noise}"
            )));
        }
        let full = FaceModel::canonical();
        let model = match variant {
            ModelVariant::Full => full,
            ModelVariant::Reduced => full.reduced()?,
        };
        Ok(Self {
            camera: CameraModel::new(height, width)?,
            model,
            noise,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Landmarks for a pose, or `None` if any point leaves the frame
    pub fn render(&mut self, pose: &Pose) -> Option<LandmarkSet> {
        let (height, width) = self.camera.frame_size();
        let mut points = self.camera.project_points(pose, self.model.points())?;

        if self.noise > 0.0 {
            for p in &mut points {
                p.x += self.rng.gen_range(-self.noise..=self.noise);
                p.y += self.rng.gen_range(-self.noise..=self.noise);
            }
        }

        let inside = points
            .iter()
            .all(|p| (0.0..f64::from(width)).contains(&p.x) && (0.0..f64::from(height)).contains(&p.y));
        inside.then(|| LandmarkSet::new(points))
    }
}

impl LandmarkDetector<u64> for SyntheticDetector {
    fn detect(&mut self, frame: &u64) -> Result<Option<LandmarkSet>> {
        let pose = scripted_pose(*frame);
        Ok(self.render(&pose))
    }
}
