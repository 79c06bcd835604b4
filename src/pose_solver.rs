use crate::{
    camera::CameraModel,
    constants::DEFAULT_RESEED_RMSE,
    face_model::{FaceModel, ModelVariant},
    geometry::{annotation_box_points, axis_points, EulerAngles, Pose, ProjectedAxes, ProjectedBox},
    landmarks::LandmarkSet,
    pnp::{self, RefineParams, Refinement},
    Error, Result,
};
use nalgebra::{Point2, Point3};
use std::path::Path;

/// Head pose solver using `PnP` against a fixed 3D face model
///
/// Holds the camera intrinsics, both face model variants and the pose found
/// on the previous frame, which seeds the next solve.
#[derive(Debug, Clone)]
pub struct PoseSolver {
    camera: CameraModel,
    full_model: FaceModel,
    reduced_model: FaceModel,
    previous: Option<Pose>,
    params: RefineParams,
    reseed_rmse: f64,
}

impl PoseSolver {
    /// Create a solver for frames of the given size using the built-in model
    ///
    /// # Errors
    ///
    /// Returns an error if either frame dimension is zero
    pub fn new(height: u32, width: u32) -> Result<Self> {
        Self::with_model(height, width, FaceModel::canonical())
    }

    /// Create a solver with a 68-point model loaded from a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The model file cannot be read
    /// - The model file has an invalid format
    /// - Either frame dimension is zero
    pub fn from_model_file<P: AsRef<Path>>(model_path: P, height: u32, width: u32) -> Result<Self> {
        let model = FaceModel::from_file(model_path)?;
        Self::with_model(height, width, model)
    }

    /// Create a solver with an explicit 68-point model
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either frame dimension is zero
    /// - The model does not have 68 points
    pub fn with_model(height: u32, width: u32, model: FaceModel) -> Result<Self> {
        log::info!("Initializing PoseSolver for {width}x{height} frames");
        let camera = CameraModel::new(height, width)?;
        let reduced_model = model.reduced()?;

        Ok(Self {
            camera,
            full_model: model,
            reduced_model,
            previous: None,
            params: RefineParams::default(),
            reseed_rmse: DEFAULT_RESEED_RMSE,
        })
    }

    /// Override the refinement settings
    #[must_use]
    pub fn with_params(mut self, params: RefineParams) -> Self {
        self.params = params;
        self
    }

    /// Error above which a seeded solve is retried from a linear estimate
    #[must_use]
    pub fn with_reseed_rmse(mut self, reseed_rmse: f64) -> Self {
        self.reseed_rmse = reseed_rmse;
        self
    }

    #[must_use]
    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    #[must_use]
    pub fn model(&self, variant: ModelVariant) -> &FaceModel {
        match variant {
            ModelVariant::Full => &self.full_model,
            ModelVariant::Reduced => &self.reduced_model,
        }
    }

    #[must_use]
    pub fn params(&self) -> &RefineParams {
        &self.params
    }

    /// Pose that will seed the next solve, if any
    #[must_use]
    pub fn previous_pose(&self) -> Option<&Pose> {
        self.previous.as_ref()
    }

    /// Forget the previous pose so the next solve starts from scratch
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Estimate head pose, choosing the model from the landmark count
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The number of landmarks matches neither 68 nor 14
    /// - The landmarks are degenerate (collinear, coincident, non-finite)
    /// - The solver does not converge
    pub fn solve_pose(&mut self, landmarks: &LandmarkSet) -> Result<Pose> {
        let variant = ModelVariant::from_num_points(landmarks.len()).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Expected {} or {} landmarks, got {}",
                ModelVariant::Full.num_points(),
                ModelVariant::Reduced.num_points(),
                landmarks.len()
            ))
        })?;
        self.solve_pose_with(variant, landmarks)
    }

    /// Estimate head pose against an explicit model variant
    ///
    /// On failure the previous pose is kept as the seed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The landmark count does not match the variant
    /// - The landmarks are degenerate (collinear, coincident, non-finite)
    /// - The solver does not converge
    pub fn solve_pose_with(&mut self, variant: ModelVariant, landmarks: &LandmarkSet) -> Result<Pose> {
        let model = self.model(variant);
        if landmarks.len() != model.len() {
            return Err(Error::InvalidInput(format!(
                "Expected {} landmarks for the {variant:?} model, got {}",
                model.len(),
                landmarks.len()
            )));
        }

        let world = model.points();
        let image = landmarks.points();
        pnp::check_correspondences(world, image)?;

        let seeded = self.previous.map(|seed| pnp::refine_lm(world, image, &self.camera, &seed, &self.params));
        let refinement = match seeded {
            Some(Ok(result)) if result.rmse <= self.reseed_rmse => result,
            Some(outcome) => {
                log::debug!("Seeded solve rejected ({}), retrying from linear estimate", describe(&outcome));
                self.solve_from_scratch(world, image)?
            }
            None => self.solve_from_scratch(world, image)?,
        };

        log::trace!(
            "Solved {variant:?} pose in {} iterations, rmse {:.3} px",
            refinement.iterations,
            refinement.rmse
        );
        self.previous = Some(refinement.pose);
        Ok(refinement.pose)
    }

    fn solve_from_scratch(
        &self,
        world: &[Point3<f64>],
        image: &[Point2<f64>],
    ) -> Result<Refinement> {
        let seed = pnp::solve_dlt(world, image, &self.camera)?;
        pnp::refine_lm(world, image, &self.camera, &seed, &self.params)
    }

    /// Convert a pose to Euler angles in degrees
    #[must_use]
    pub fn get_euler_angles(&self, pose: &Pose) -> EulerAngles {
        pose.euler_angles()
    }

    /// Root-mean-square reprojection error of a pose against landmarks
    ///
    /// Returns `None` if the counts do not match a model or a point falls
    /// behind the camera.
    #[must_use]
    pub fn reprojection_rmse(&self, pose: &Pose, landmarks: &LandmarkSet) -> Option<f64> {
        let variant = ModelVariant::from_num_points(landmarks.len())?;
        pnp::reprojection_rmse(self.model(variant).points(), landmarks.points(), &self.camera, pose)
    }

    /// Project the annotation box through a pose
    ///
    /// # Errors
    ///
    /// Returns an error if a box corner falls behind the camera
    pub fn project_annotation_box(&self, pose: &Pose) -> Result<ProjectedBox> {
        let projected = self
            .camera
            .project_points(pose, &annotation_box_points())
            .ok_or_else(|| Error::DegenerateGeometry("Annotation box is behind the camera".to_string()))?;
        let mut points = [Point2::origin(); 10];
        points.copy_from_slice(&projected);
        Ok(ProjectedBox { points })
    }

    /// Project the head axes through a pose
    ///
    /// # Errors
    ///
    /// Returns an error if an axis tip falls behind the camera
    pub fn project_axes(&self, pose: &Pose) -> Result<ProjectedAxes> {
        let projected = self
            .camera
            .project_points(pose, &axis_points())
            .ok_or_else(|| Error::DegenerateGeometry("Axes are behind the camera".to_string()))?;
        Ok(ProjectedAxes {
            origin: projected[0],
            x: projected[1],
            y: projected[2],
            z: projected[3],
        })
    }
}

fn describe(outcome: &Result<Refinement>) -> String {
    match outcome {
        Ok(result) => format!("rmse {:.2} px", result.rmse),
        Err(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{NUM_FACIAL_LANDMARKS, NUM_REDUCED_LANDMARKS};
    use nalgebra::Vector3;

    fn project(solver: &PoseSolver, variant: ModelVariant, pose: &Pose) -> LandmarkSet {
        let points = solver
            .camera()
            .project_points(pose, solver.model(variant).points())
            .unwrap();
        LandmarkSet::new(points)
    }

    fn assert_pose_close(a: &Pose, b: &Pose, tol: f64) {
        for (x, y) in a.to_array().iter().zip(b.to_array()) {
            assert!((x - y).abs() < tol, "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn test_solve_full_and_reduced() {
        let truth = Pose::new(Vector3::new(-0.15, 0.3, 0.1), Vector3::new(-20.0, 30.0, 800.0));

        for variant in [ModelVariant::Full, ModelVariant::Reduced] {
            let mut solver = PoseSolver::new(480, 640).unwrap();
            let landmarks = project(&solver, variant, &truth);
            let pose = solver.solve_pose(&landmarks).unwrap();
            assert_pose_close(&pose, &truth, 1e-6);
            assert_eq!(solver.previous_pose(), Some(&pose));
        }
    }

    #[test]
    fn test_wrong_landmark_count() {
        let mut solver = PoseSolver::new(480, 640).unwrap();
        let landmarks = LandmarkSet::new(vec![Point2::new(1.0, 1.0); 10]);
        assert!(matches!(solver.solve_pose(&landmarks), Err(Error::InvalidInput(_))));

        let landmarks = LandmarkSet::new(vec![Point2::new(1.0, 1.0); NUM_REDUCED_LANDMARKS]);
        assert!(matches!(
            solver.solve_pose_with(ModelVariant::Full, &landmarks),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_failure_keeps_seed() {
        let mut solver = PoseSolver::new(480, 640).unwrap();
        let truth = Pose::new(Vector3::new(0.0, 0.1, 0.0), Vector3::new(0.0, 0.0, 700.0));
        let seed = solver.solve_pose(&project(&solver, ModelVariant::Full, &truth)).unwrap();

        let collinear = LandmarkSet::new(
            (0..NUM_FACIAL_LANDMARKS)
                .map(|i| Point2::new(10.0 * i as f64, 240.0))
                .collect(),
        );
        let err = solver.solve_pose(&collinear).unwrap_err();
        assert!(matches!(err, Error::DegenerateGeometry(_)));
        assert!(err.is_recoverable());
        assert_eq!(solver.previous_pose(), Some(&seed));

        solver.reset();
        assert!(solver.previous_pose().is_none());
    }

    #[test]
    fn test_recovers_from_stale_seed() {
        let mut solver = PoseSolver::new(480, 640).unwrap();
        let first = Pose::new(Vector3::new(0.0, 0.5, 0.0), Vector3::new(50.0, 0.0, 900.0));
        solver.solve_pose(&project(&solver, ModelVariant::Full, &first)).unwrap();

        let second = Pose::new(Vector3::new(0.2, -0.2, 0.1), Vector3::new(-60.0, 20.0, 600.0));
        let pose = solver.solve_pose(&project(&solver, ModelVariant::Full, &second)).unwrap();
        assert_pose_close(&pose, &second, 1e-6);
    }

    #[test]
    fn test_reprojection_rmse() {
        let mut solver = PoseSolver::new(480, 640).unwrap();
        let truth = Pose::new(Vector3::new(0.05, 0.0, 0.0), Vector3::new(0.0, 0.0, 750.0));
        let landmarks = project(&solver, ModelVariant::Reduced, &truth);
        let pose = solver.solve_pose(&landmarks).unwrap();

        assert!(solver.reprojection_rmse(&pose, &landmarks).unwrap() < 1e-6);
        assert!(solver.reprojection_rmse(&pose, &LandmarkSet::default()).is_none());
    }

    #[test]
    fn test_project_annotation_box_and_axes() {
        let solver = PoseSolver::new(480, 640).unwrap();
        let pose = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1000.0));

        let projected = solver.project_annotation_box(&pose).unwrap();
        // Rear corner (-75, -75, 0) at depth 1000
        assert!((projected.points[0].x - (320.0 - 48.0)).abs() < 1e-9);
        assert!((projected.points[0].y - (240.0 - 48.0)).abs() < 1e-9);
        assert_eq!(projected.segments().count(), 12);

        let axes = solver.project_axes(&pose).unwrap();
        assert_eq!(axes.origin, Point2::new(320.0, 240.0));
        assert!(axes.x.x > axes.origin.x);
        assert!(axes.y.y > axes.origin.y);

        let behind = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -1000.0));
        assert!(solver.project_annotation_box(&behind).is_err());
    }

    #[test]
    fn test_get_euler_angles() {
        let solver = PoseSolver::new(480, 640).unwrap();
        let angles = EulerAngles::new(10.0, -20.0, 5.0);
        let pose = Pose::new(angles.to_rotation_vector(), Vector3::new(0.0, 0.0, 500.0));
        let recovered = solver.get_euler_angles(&pose);
        assert!((recovered.pitch - 10.0).abs() < 1e-9);
        assert!((recovered.yaw + 20.0).abs() < 1e-9);
        assert!((recovered.roll - 5.0).abs() < 1e-9);
    }
}
