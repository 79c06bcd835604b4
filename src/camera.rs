//! Pinhole camera intrinsics derived from the frame size.

use crate::{
    constants::{CAMERA_CENTER_FACTOR, EPSILON, NUM_DISTORTION_COEFFS},
    geometry::Pose,
    Error, Result,
};
use nalgebra::{Matrix2, Matrix2x3, Matrix3, Point2, Point3};

/// Fixed-point iterations used to invert lens distortion
const UNDISTORT_ITERATIONS: usize = 10;

/// Camera intrinsic parameters
///
/// The focal length equals the frame width and the principal point sits at
/// the frame centre. Distortion follows the `k1, k2, p1, p2` radial-tangential
/// model and is zero unless set explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    height: u32,
    width: u32,
    focal_length: f64,
    center: Point2<f64>,
    dist_coeffs: [f64; NUM_DISTORTION_COEFFS],
}

impl CameraModel {
    /// Build the intrinsics for frames of the given size
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero
    pub fn new(height: u32, width: u32) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(Error::InvalidInput(format!(
                "Frame dimensions must be positive, got {height}x{width}"
            )));
        }

        let focal_length = f64::from(width);
        let center = Point2::new(
            f64::from(width) / CAMERA_CENTER_FACTOR,
            f64::from(height) / CAMERA_CENTER_FACTOR,
        );

        Ok(Self {
            height,
            width,
            focal_length,
            center,
            dist_coeffs: [0.0; NUM_DISTORTION_COEFFS],
        })
    }

    /// Replace the distortion coefficients
    #[must_use]
    pub fn with_distortion(mut self, dist_coeffs: [f64; NUM_DISTORTION_COEFFS]) -> Self {
        self.dist_coeffs = dist_coeffs;
        self
    }

    /// Frame size as `(height, width)`
    #[must_use]
    pub fn frame_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    #[must_use]
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    #[must_use]
    pub fn center(&self) -> Point2<f64> {
        self.center
    }

    #[must_use]
    pub fn dist_coeffs(&self) -> &[f64; NUM_DISTORTION_COEFFS] {
        &self.dist_coeffs
    }

    /// The 3×3 intrinsic matrix
    #[must_use]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal_length,
            0.0,
            self.center.x,
            0.0,
            self.focal_length,
            self.center.y,
            0.0,
            0.0,
            1.0,
        )
    }

    fn has_distortion(&self) -> bool {
        self.dist_coeffs.iter().any(|&c| c != 0.0)
    }

    /// Apply lens distortion to a normalized image point
    fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let [k1, k2, p1, p2] = self.dist_coeffs;
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (xd, yd)
    }

    /// Project a point given in camera coordinates to pixels
    ///
    /// Returns `None` for points on or behind the image plane.
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= EPSILON || !point.coords.iter().all(|v| v.is_finite()) {
            return None;
        }

        let (mut x, mut y) = (point.x / point.z, point.y / point.z);
        if self.has_distortion() {
            (x, y) = self.distort(x, y);
        }

        Some(Point2::new(
            self.focal_length * x + self.center.x,
            self.focal_length * y + self.center.y,
        ))
    }

    /// Project a camera-frame point and return the derivative of the pixel
    /// position with respect to that point
    #[must_use]
    pub fn project_with_jacobian(&self, point: &Point3<f64>) -> Option<(Point2<f64>, Matrix2x3<f64>)> {
        let pixel = self.project(point)?;

        let inv_z = 1.0 / point.z;
        let (x, y) = (point.x * inv_z, point.y * inv_z);
        let normalize = Matrix2x3::new(inv_z, 0.0, -x * inv_z, 0.0, inv_z, -y * inv_z);

        let distortion = if self.has_distortion() {
            let [k1, k2, p1, p2] = self.dist_coeffs;
            let r2 = x * x + y * y;
            let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
            let d_radial = 2.0 * (k1 + 2.0 * k2 * r2);
            Matrix2::new(
                radial + x * x * d_radial + 2.0 * p1 * y + 6.0 * p2 * x,
                x * y * d_radial + 2.0 * p1 * x + 2.0 * p2 * y,
                x * y * d_radial + 2.0 * p1 * x + 2.0 * p2 * y,
                radial + y * y * d_radial + 6.0 * p1 * y + 2.0 * p2 * x,
            )
        } else {
            Matrix2::identity()
        };

        Some((pixel, self.focal_length * distortion * normalize))
    }

    /// Project model points through a pose
    ///
    /// Returns `None` if any point lands behind the camera.
    #[must_use]
    pub fn project_points(&self, pose: &Pose, points: &[Point3<f64>]) -> Option<Vec<Point2<f64>>> {
        let rotation = pose.rotation_matrix();
        points
            .iter()
            .map(|p| self.project(&(rotation * p + pose.translation)))
            .collect()
    }

    /// Map a pixel to normalized image coordinates, undoing distortion
    #[must_use]
    pub fn normalize(&self, pixel: &Point2<f64>) -> Point2<f64> {
        let xd = (pixel.x - self.center.x) / self.focal_length;
        let yd = (pixel.y - self.center.y) / self.focal_length;

        if !self.has_distortion() {
            return Point2::new(xd, yd);
        }

        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_ITERATIONS {
            let (dx, dy) = self.distort(x, y);
            x += xd - dx;
            y += yd - dy;
        }
        Point2::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_intrinsics_from_frame_size() {
        let camera = CameraModel::new(480, 640).unwrap();
        assert_eq!(camera.focal_length(), 640.0);
        assert_eq!(camera.center(), Point2::new(320.0, 240.0));
        assert_eq!(camera.dist_coeffs(), &[0.0; 4]);
        assert_eq!(camera.frame_size(), (480, 640));

        let k = camera.matrix();
        assert_eq!(k[(0, 0)], 640.0);
        assert_eq!(k[(1, 1)], 640.0);
        assert_eq!(k[(0, 2)], 320.0);
        assert_eq!(k[(1, 2)], 240.0);
        assert_eq!(k[(2, 2)], 1.0);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(CameraModel::new(0, 640).is_err());
        assert!(CameraModel::new(480, 0).is_err());
    }

    #[test]
    fn test_project_principal_axis() {
        let camera = CameraModel::new(480, 640).unwrap();
        let p = camera.project(&Point3::new(0.0, 0.0, 500.0)).unwrap();
        assert_eq!(p, Point2::new(320.0, 240.0));

        let p = camera.project(&Point3::new(100.0, -50.0, 640.0)).unwrap();
        assert!((p.x - 420.0).abs() < 1e-12);
        assert!((p.y - 190.0).abs() < 1e-12);
    }

    #[test]
    fn test_project_behind_camera() {
        let camera = CameraModel::new(480, 640).unwrap();
        assert!(camera.project(&Point3::new(0.0, 0.0, -10.0)).is_none());
        assert!(camera.project(&Point3::new(0.0, 0.0, 0.0)).is_none());
        assert!(camera.project(&Point3::new(f64::NAN, 0.0, 10.0)).is_none());
    }

    #[test]
    fn test_project_points_through_pose() {
        let camera = CameraModel::new(480, 640).unwrap();
        let pose = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1000.0));
        let projected = camera
            .project_points(&pose, &[Point3::origin(), Point3::new(0.0, 0.0, -2000.0)]);
        assert!(projected.is_none());

        let projected = camera.project_points(&pose, &[Point3::origin()]).unwrap();
        assert_eq!(projected[0], Point2::new(320.0, 240.0));
    }

    #[test]
    fn test_projection_jacobian_matches_finite_differences() {
        let camera = CameraModel::new(480, 640).unwrap().with_distortion([0.1, -0.02, 0.003, 0.001]);
        let point = Point3::new(40.0, -25.0, 600.0);
        let (_, jacobian) = camera.project_with_jacobian(&point).unwrap();

        let h = 1e-4;
        for axis in 0..3 {
            let mut plus = point;
            let mut minus = point;
            plus[axis] += h;
            minus[axis] -= h;
            let numeric = (camera.project(&plus).unwrap() - camera.project(&minus).unwrap()) / (2.0 * h);
            assert!((numeric.x - jacobian[(0, axis)]).abs() < 1e-6, "d u / d axis {axis}");
            assert!((numeric.y - jacobian[(1, axis)]).abs() < 1e-6, "d v / d axis {axis}");
        }
    }

    #[test]
    fn test_normalize_inverts_projection() {
        let camera = CameraModel::new(480, 640).unwrap().with_distortion([0.05, -0.01, 0.001, -0.002]);
        let point = Point3::new(60.0, -40.0, 700.0);
        let pixel = camera.project(&point).unwrap();
        let normalized = camera.normalize(&pixel);

        assert!((normalized.x - point.x / point.z).abs() < 1e-9);
        assert!((normalized.y - point.y / point.z).abs() < 1e-9);
    }
}
