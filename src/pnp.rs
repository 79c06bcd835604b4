//! Perspective-n-Point numerics.
//!
//! A linear Direct Linear Transform gives a pose without any prior guess;
//! Levenberg-Marquardt then minimizes the pixel reprojection error starting
//! either from that linear pose or from the previous frame's pose.

use crate::{
    camera::CameraModel,
    constants::{
        DEFAULT_COST_TOLERANCE, DEFAULT_INITIAL_DAMPING, DEFAULT_MAX_ITERATIONS, DEFAULT_STEP_TOLERANCE, EPSILON,
        MAX_DAMPING, MIN_PNP_POINTS,
    },
    geometry::Pose,
    Error, Result,
};
use nalgebra::{Matrix3, Matrix3x4, Matrix6, Point2, Point3, Rotation3, SMatrix, Vector2, Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// Smallest-to-largest spread ratio below which image points count as collinear
const COLLINEARITY_RATIO: f64 = 1e-9;

/// Gap required between the two smallest DLT eigenvalues for a unique solution
const NULLSPACE_RATIO: f64 = 1e-12;

/// Levenberg-Marquardt settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Maximum number of accepted or rejected linearizations
    pub max_iterations: usize,
    /// Starting damping factor
    pub initial_damping: f64,
    /// Relative parameter step below which refinement stops
    pub step_tolerance: f64,
    /// Relative cost decrease below which refinement stops
    pub cost_tolerance: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial_damping: DEFAULT_INITIAL_DAMPING,
            step_tolerance: DEFAULT_STEP_TOLERANCE,
            cost_tolerance: DEFAULT_COST_TOLERANCE,
        }
    }
}

/// Result of an iterative refinement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refinement {
    /// Refined pose
    pub pose: Pose,
    /// Root-mean-square reprojection error in pixels
    pub rmse: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether a stopping tolerance was reached before the iteration cap
    pub converged: bool,
}

/// Reject correspondences that cannot determine a pose
///
/// # Errors
///
/// - `InvalidInput` if the two slices differ in length
/// - `DegenerateGeometry` for too few, non-finite, coincident or collinear points
pub fn check_correspondences(world: &[Point3<f64>], image: &[Point2<f64>]) -> Result<()> {
    if world.len() != image.len() {
        return Err(Error::InvalidInput(format!(
            "Got {} image points for {} model points",
            image.len(),
            world.len()
        )));
    }
    if image.len() < MIN_PNP_POINTS {
        return Err(Error::DegenerateGeometry(format!(
            "Need at least {MIN_PNP_POINTS} correspondences, got {}",
            image.len()
        )));
    }
    if !image.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
        return Err(Error::DegenerateGeometry("Non-finite landmark coordinates".to_string()));
    }

    // Eigenvalues of the 2x2 scatter matrix of the image points
    let n = image.len() as f64;
    let mean = image.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in image {
        let d = p.coords - mean;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        syy += d.y * d.y;
    }
    let half_trace = 0.5 * (sxx + syy);
    let radius = (0.25 * (sxx - syy) * (sxx - syy) + sxy * sxy).sqrt();
    let (largest, smallest) = (half_trace + radius, half_trace - radius);

    if largest <= EPSILON {
        return Err(Error::DegenerateGeometry("Landmarks are coincident".to_string()));
    }
    if smallest <= COLLINEARITY_RATIO * largest {
        return Err(Error::DegenerateGeometry("Landmarks are collinear".to_string()));
    }
    Ok(())
}

/// Similarity transform moving points to zero mean and a fixed mean distance
fn normalization<const D: usize>(points: &[SMatrix<f64, D, 1>], target: f64) -> (SMatrix<f64, D, 1>, f64) {
    let n = points.len() as f64;
    let centroid = points.iter().fold(SMatrix::<f64, D, 1>::zeros(), |acc, p| acc + p) / n;
    let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;
    let scale = if mean_dist > EPSILON { target / mean_dist } else { 1.0 };
    (centroid, scale)
}

/// Linear pose estimate by the Direct Linear Transform
///
/// Needs six or more non-coplanar model points.
///
/// # Errors
///
/// Returns `DegenerateGeometry` if the correspondences do not fix a unique
/// projection matrix or the result puts points behind the camera
pub fn solve_dlt(world: &[Point3<f64>], image: &[Point2<f64>], camera: &CameraModel) -> Result<Pose> {
    check_correspondences(world, image)?;

    // Condition both sides before building the design matrix
    let world_coords: Vec<Vector3<f64>> = world.iter().map(|p| p.coords).collect();
    let image_coords: Vec<Vector2<f64>> = image.iter().map(|p| camera.normalize(p).coords).collect();
    let (world_centroid, world_scale) = normalization(&world_coords, 3f64.sqrt());
    let (image_centroid, image_scale) = normalization(&image_coords, 2f64.sqrt());

    let mut ata = SMatrix::<f64, 12, 12>::zeros();
    for (pw, pi) in world_coords.iter().zip(&image_coords) {
        let x = (pw - world_centroid) * world_scale;
        let uv = (pi - image_centroid) * image_scale;

        let mut row_u = SMatrix::<f64, 12, 1>::zeros();
        let mut row_v = SMatrix::<f64, 12, 1>::zeros();
        for k in 0..3 {
            row_u[k] = x[k];
            row_u[8 + k] = -uv.x * x[k];
            row_v[4 + k] = x[k];
            row_v[8 + k] = -uv.y * x[k];
        }
        row_u[3] = 1.0;
        row_u[11] = -uv.x;
        row_v[7] = 1.0;
        row_v[11] = -uv.y;

        ata += row_u * row_u.transpose() + row_v * row_v.transpose();
    }

    let eigen = ata.symmetric_eigen();
    let mut order: Vec<usize> = (0..12).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let largest = eigen.eigenvalues[order[11]];
    if !largest.is_finite() || eigen.eigenvalues[order[1]] <= NULLSPACE_RATIO * largest {
        return Err(Error::DegenerateGeometry(
            "Correspondences do not determine a unique projection".to_string(),
        ));
    }

    let p_vec = eigen.eigenvectors.column(order[0]);
    let mut normalized_p = Matrix3x4::<f64>::zeros();
    for r in 0..3 {
        for c in 0..4 {
            normalized_p[(r, c)] = p_vec[4 * r + c];
        }
    }

    // Undo the conditioning: P = H⁻¹ · P' · T
    let image_denorm = Matrix3::new(
        1.0 / image_scale,
        0.0,
        image_centroid.x,
        0.0,
        1.0 / image_scale,
        image_centroid.y,
        0.0,
        0.0,
        1.0,
    );
    let mut world_norm = nalgebra::Matrix4::<f64>::identity() * world_scale;
    world_norm[(3, 3)] = 1.0;
    for k in 0..3 {
        world_norm[(k, 3)] = -world_scale * world_centroid[k];
    }
    let mut projection = image_denorm * normalized_p * world_norm;

    // The null vector is only defined up to sign; pick the one with det(M) > 0
    if projection.fixed_view::<3, 3>(0, 0).into_owned().determinant() < 0.0 {
        projection = -projection;
    }

    let m = projection.fixed_view::<3, 3>(0, 0).into_owned();
    let svd = m.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(Error::DegenerateGeometry("SVD of the projection failed".to_string()));
    };
    let scale = svd.singular_values.mean();
    if scale <= EPSILON || !scale.is_finite() {
        return Err(Error::DegenerateGeometry("Projection matrix has no scale".to_string()));
    }

    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        rotation = u_flipped * v_t;
    }
    let translation: Vector3<f64> = projection.column(3).into_owned() / scale;

    let pose = Pose::from_rotation(&Rotation3::from_matrix_unchecked(rotation), translation);
    if camera.project_points(&pose, world).is_none() {
        return Err(Error::DegenerateGeometry("Linear pose puts landmarks behind the camera".to_string()));
    }
    Ok(pose)
}

/// Sum of squared reprojection residuals, `None` if a point falls behind the camera
fn reprojection_cost(
    world: &[Point3<f64>],
    image: &[Point2<f64>],
    camera: &CameraModel,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Option<f64> {
    world.iter().zip(image).try_fold(0.0, |acc, (pw, pi)| {
        let projected = camera.project(&(rotation * pw + translation))?;
        Some(acc + (projected - pi).norm_squared())
    })
}

/// Root-mean-square reprojection error of a pose in pixels
#[must_use]
pub fn reprojection_rmse(world: &[Point3<f64>], image: &[Point2<f64>], camera: &CameraModel, pose: &Pose) -> Option<f64> {
    if world.is_empty() || world.len() != image.len() {
        return None;
    }
    let cost = reprojection_cost(world, image, camera, &pose.rotation_matrix(), &pose.translation)?;
    Some((cost / world.len() as f64).sqrt())
}

/// Gauss-Newton normal equations for a left-multiplied rotation update
/// followed by a translation update
fn normal_equations(
    world: &[Point3<f64>],
    image: &[Point2<f64>],
    camera: &CameraModel,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Option<(Matrix6<f64>, Vector6<f64>)> {
    let mut jtj = Matrix6::zeros();
    let mut jtr = Vector6::zeros();

    for (pw, pi) in world.iter().zip(image) {
        let rotated = rotation * pw.coords;
        let (projected, d_pixel) = camera.project_with_jacobian(&Point3::from(rotated + translation))?;
        let residual = projected - pi;

        let mut jacobian = SMatrix::<f64, 2, 6>::zeros();
        jacobian
            .fixed_view_mut::<2, 3>(0, 0)
            .copy_from(&(d_pixel * -rotated.cross_matrix()));
        jacobian.fixed_view_mut::<2, 3>(0, 3).copy_from(&d_pixel);

        jtj += jacobian.transpose() * jacobian;
        jtr += jacobian.transpose() * residual;
    }
    Some((jtj, jtr))
}

/// Minimize reprojection error with Levenberg-Marquardt starting at `initial`
///
/// # Errors
///
/// - `DegenerateGeometry` if the starting pose puts points behind the camera
/// - `NoConvergence` if the result is not finite
pub fn refine_lm(
    world: &[Point3<f64>],
    image: &[Point2<f64>],
    camera: &CameraModel,
    initial: &Pose,
    params: &RefineParams,
) -> Result<Refinement> {
    check_correspondences(world, image)?;

    let mut rotation = initial.rotation_matrix();
    let mut translation = initial.translation;
    let mut cost = reprojection_cost(world, image, camera, &rotation, &translation)
        .ok_or_else(|| Error::DegenerateGeometry("Initial pose puts landmarks behind the camera".to_string()))?;

    let mut damping = params.initial_damping;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < params.max_iterations && !converged {
        iterations += 1;

        let Some((jtj, jtr)) = normal_equations(world, image, camera, &rotation, &translation) else {
            break;
        };

        // Raise the damping until a step lowers the cost
        loop {
            if damping > MAX_DAMPING {
                // No descent direction left: already at a minimum
                converged = true;
                break;
            }

            let mut augmented = jtj;
            for i in 0..6 {
                augmented[(i, i)] += damping * jtj[(i, i)].max(EPSILON);
            }
            let Some(cholesky) = augmented.cholesky() else {
                damping *= 10.0;
                continue;
            };
            let delta = cholesky.solve(&(-jtr));

            let omega: Vector3<f64> = delta.fixed_rows::<3>(0).into_owned();
            let tau: Vector3<f64> = delta.fixed_rows::<3>(3).into_owned();
            let mut candidate_rotation = Rotation3::new(omega) * rotation;
            candidate_rotation.renormalize();
            let candidate_translation = translation + tau;

            match reprojection_cost(world, image, camera, &candidate_rotation, &candidate_translation) {
                Some(candidate_cost) if candidate_cost < cost => {
                    let decrease = cost - candidate_cost;
                    let scale = 1.0 + translation.norm();
                    rotation = candidate_rotation;
                    translation = candidate_translation;
                    cost = candidate_cost;
                    damping = (damping / 10.0).max(EPSILON);

                    if delta.norm() <= params.step_tolerance * scale || decrease <= params.cost_tolerance * cost {
                        converged = true;
                    }
                    break;
                }
                _ => damping *= 10.0,
            }
        }
    }

    let pose = Pose::from_rotation(&rotation, translation);
    let rmse = (cost / world.len() as f64).sqrt();
    if !pose.is_finite() || !rmse.is_finite() {
        return Err(Error::NoConvergence { iterations, rmse });
    }

    log::trace!("LM refinement: {iterations} iterations, rmse {rmse:.4} px, converged {converged}");
    Ok(Refinement {
        pose,
        rmse,
        iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_model::FaceModel;

    fn setup() -> (CameraModel, FaceModel, Pose) {
        let camera = CameraModel::new(480, 640).unwrap();
        let model = FaceModel::canonical();
        let pose = Pose::new(Vector3::new(0.1, -0.25, 0.05), Vector3::new(15.0, -10.0, 900.0));
        (camera, model, pose)
    }

    fn rotation_error(a: &Pose, b: &Pose) -> f64 {
        (a.rotation_matrix().inverse() * b.rotation_matrix()).angle()
    }

    #[test]
    fn test_dlt_recovers_exact_pose() {
        let (camera, model, truth) = setup();
        let image = camera.project_points(&truth, model.points()).unwrap();

        let pose = solve_dlt(model.points(), &image, &camera).unwrap();
        assert!(rotation_error(&pose, &truth) < 1e-6);
        assert!((pose.translation - truth.translation).norm() < 1e-3);
    }

    #[test]
    fn test_refine_from_rough_guess() {
        let (camera, model, truth) = setup();
        let image = camera.project_points(&truth, model.points()).unwrap();
        let guess = Pose::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1000.0));

        let refined = refine_lm(model.points(), &image, &camera, &guess, &RefineParams::default()).unwrap();
        assert!(refined.rmse < 1e-6, "rmse {}", refined.rmse);
        assert!(rotation_error(&refined.pose, &truth) < 1e-6);
        assert!((refined.pose.translation - truth.translation).norm() < 1e-4);
    }

    #[test]
    fn test_refine_at_solution_stays_put() {
        let (camera, model, truth) = setup();
        let image = camera.project_points(&truth, model.points()).unwrap();

        let refined = refine_lm(model.points(), &image, &camera, &truth, &RefineParams::default()).unwrap();
        assert!(refined.converged);
        assert!(rotation_error(&refined.pose, &truth) < 1e-9);
        assert!((refined.pose.translation - truth.translation).norm() < 1e-6);
    }

    #[test]
    fn test_refine_rejects_guess_behind_camera() {
        let (camera, model, truth) = setup();
        let image = camera.project_points(&truth, model.points()).unwrap();
        let behind = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -500.0));

        let err = refine_lm(model.points(), &image, &camera, &behind, &RefineParams::default()).unwrap_err();
        assert!(matches!(err, Error::DegenerateGeometry(_)));
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let (camera, model, _) = setup();
        let image: Vec<Point2<f64>> = (0..model.len()).map(|i| Point2::new(100.0 + i as f64, 200.0)).collect();

        assert!(matches!(
            solve_dlt(model.points(), &image, &camera),
            Err(Error::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_coincident_points_are_degenerate() {
        let (camera, model, _) = setup();
        let image = vec![Point2::new(320.0, 240.0); model.len()];
        assert!(matches!(
            check_correspondences(model.points(), &image),
            Err(Error::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_too_few_points() {
        let (_, model, _) = setup();
        let image = vec![Point2::new(1.0, 2.0); 4];
        assert!(matches!(
            check_correspondences(&model.points()[..4], &image),
            Err(Error::DegenerateGeometry(_))
        ));
        assert!(matches!(
            check_correspondences(model.points(), &image),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reprojection_rmse() {
        let (camera, model, truth) = setup();
        let mut image = camera.project_points(&truth, model.points()).unwrap();
        assert!(reprojection_rmse(model.points(), &image, &camera, &truth).unwrap() < 1e-9);

        for p in &mut image {
            p.x += 3.0;
            p.y -= 4.0;
        }
        let rmse = reprojection_rmse(model.points(), &image, &camera, &truth).unwrap();
        assert!((rmse - 5.0).abs() < 1e-9);
    }
}
