//! Pose representation, Euler angle conversion and static annotation geometry.
//!
//! Coordinates follow the pinhole camera frame: x to the right, y down and
//! z pointing away from the camera into the scene. A pose maps face model
//! points into that frame: `p_cam = R · p_model + t`.

use crate::{
    constants::{
        ANNOTATION_FRONT_DEPTH, ANNOTATION_FRONT_SIZE, ANNOTATION_REAR_DEPTH, ANNOTATION_REAR_SIZE, AXIS_LENGTH,
        GIMBAL_LOCK_EPSILON, POSE_DOF,
    },
    utils::safe_cast::{f64_to_i32, f64_to_i32_clamp},
    Result,
};
use nalgebra::{Point2, Point3, Rotation3, UnitQuaternion, Vector3};

/// Rigid head pose relative to the camera
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Rotation in axis-angle form (axis scaled by angle in radians)
    pub rotation: Vector3<f64>,
    /// Translation in model units
    pub translation: Vector3<f64>,
}

impl Pose {
    /// Create a pose from a rotation vector and a translation vector
    #[must_use]
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self { rotation, translation }
    }

    /// Create a pose from a rotation matrix and a translation vector
    #[must_use]
    pub fn from_rotation(rotation: &Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation: rotation_to_vector(rotation),
            translation,
        }
    }

    /// Rotation matrix of this pose (Rodrigues conversion)
    #[must_use]
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        UnitQuaternion::from_scaled_axis(self.rotation).to_rotation_matrix()
    }

    /// Map a model point into the camera frame
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation_matrix() * point + self.translation
    }

    /// Flatten into `[rx, ry, rz, tx, ty, tz]`
    #[must_use]
    pub fn to_array(&self) -> [f64; POSE_DOF] {
        [
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
            self.translation.x,
            self.translation.y,
            self.translation.z,
        ]
    }

    /// Rebuild a pose from the layout produced by [`Pose::to_array`]
    #[must_use]
    pub fn from_array(values: [f64; POSE_DOF]) -> Self {
        Self {
            rotation: Vector3::new(values[0], values[1], values[2]),
            translation: Vector3::new(values[3], values[4], values[5]),
        }
    }

    /// Whether all six components are finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Pitch, yaw and roll of this pose
    #[must_use]
    pub fn euler_angles(&self) -> EulerAngles {
        EulerAngles::from_rotation(&self.rotation_matrix())
    }
}

/// Convert a rotation matrix to its axis-angle vector.
///
/// Goes through the quaternion so rotations close to 180° keep their axis.
#[must_use]
pub fn rotation_to_vector(rotation: &Rotation3<f64>) -> Vector3<f64> {
    UnitQuaternion::from_rotation_matrix(rotation).scaled_axis()
}

/// Head orientation in degrees.
///
/// Convention: `R = Ry(yaw) · Rx(pitch) · Rz(roll)` in the camera frame.
/// Positive pitch tilts the face downward, positive yaw turns the nose toward
/// the image left, positive roll spins the face clockwise in the image. At gimbal lock
/// (pitch = ±90°) yaw and roll act on the same axis; roll is reported as 0
/// and the whole in-plane angle is attributed to yaw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    /// Rotation about the camera x axis, degrees
    pub pitch: f64,
    /// Rotation about the camera y axis, degrees
    pub yaw: f64,
    /// Rotation about the camera z axis, degrees
    pub roll: f64,
}

impl EulerAngles {
    /// Create a new set of angles in degrees
    #[must_use]
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Decompose a rotation matrix
    #[must_use]
    pub fn from_rotation(rotation: &Rotation3<f64>) -> Self {
        let m = rotation.matrix();

        // Clamped so round-off past ±1 cannot turn asin into NaN
        let sin_pitch = (-m[(1, 2)]).clamp(-1.0, 1.0);
        let pitch = sin_pitch.asin();

        let (yaw, roll) = if sin_pitch.abs() >= 1.0 - GIMBAL_LOCK_EPSILON {
            ((sin_pitch.signum() * m[(0, 1)]).atan2(m[(0, 0)]), 0.0)
        } else {
            (m[(0, 2)].atan2(m[(2, 2)]), m[(1, 0)].atan2(m[(1, 1)]))
        };

        Self {
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
            roll: roll.to_degrees(),
        }
    }

    /// Decompose an axis-angle rotation vector
    #[must_use]
    pub fn from_rotation_vector(rotation: &Vector3<f64>) -> Self {
        Self::from_rotation(&UnitQuaternion::from_scaled_axis(*rotation).to_rotation_matrix())
    }

    /// Compose the rotation matrix described by these angles
    #[must_use]
    pub fn to_rotation(&self) -> Rotation3<f64> {
        let yaw = Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw.to_radians());
        let pitch = Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch.to_radians());
        let roll = Rotation3::from_axis_angle(&Vector3::z_axis(), self.roll.to_radians());
        yaw * pitch * roll
    }

    /// Axis-angle vector of these angles
    #[must_use]
    pub fn to_rotation_vector(&self) -> Vector3<f64> {
        rotation_to_vector(&self.to_rotation())
    }
}

/// Vertices of the annotation box: a closed rear square followed by a
/// closed front square, five points each
#[must_use]
pub fn annotation_box_points() -> [Point3<f64>; 10] {
    let rear = ANNOTATION_REAR_SIZE;
    let front = ANNOTATION_FRONT_SIZE;
    [
        Point3::new(-rear, -rear, ANNOTATION_REAR_DEPTH),
        Point3::new(-rear, rear, ANNOTATION_REAR_DEPTH),
        Point3::new(rear, rear, ANNOTATION_REAR_DEPTH),
        Point3::new(rear, -rear, ANNOTATION_REAR_DEPTH),
        Point3::new(-rear, -rear, ANNOTATION_REAR_DEPTH),
        Point3::new(-front, -front, ANNOTATION_FRONT_DEPTH),
        Point3::new(-front, front, ANNOTATION_FRONT_DEPTH),
        Point3::new(front, front, ANNOTATION_FRONT_DEPTH),
        Point3::new(front, -front, ANNOTATION_FRONT_DEPTH),
        Point3::new(-front, -front, ANNOTATION_FRONT_DEPTH),
    ]
}

/// Line segments of the annotation box as index pairs into
/// [`annotation_box_points`]: the polyline through all ten vertices plus the
/// three remaining rear-to-front edges
pub const ANNOTATION_BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (8, 9),
    (1, 6),
    (2, 7),
    (3, 8),
];

/// Origin followed by the x, y and z axis tips
#[must_use]
pub fn axis_points() -> [Point3<f64>; 4] {
    [
        Point3::origin(),
        Point3::new(AXIS_LENGTH, 0.0, 0.0),
        Point3::new(0.0, AXIS_LENGTH, 0.0),
        Point3::new(0.0, 0.0, AXIS_LENGTH),
    ]
}

/// Annotation box projected into the image
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedBox {
    /// Image positions of [`annotation_box_points`]
    pub points: [Point2<f64>; 10],
}

impl ProjectedBox {
    /// Segments to draw, as pairs of image points
    pub fn segments(&self) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
        ANNOTATION_BOX_EDGES
            .iter()
            .map(move |&(a, b)| (self.points[a], self.points[b]))
    }

    /// Round all vertices to integer pixel coordinates
    ///
    /// # Errors
    ///
    /// Returns an error if a vertex lies outside the `i32` range
    pub fn to_pixels(&self) -> Result<Vec<(i32, i32)>> {
        self.points.iter().map(to_pixel).collect()
    }

    /// Round all vertices to pixels, clamped to a frame of the given size
    #[must_use]
    pub fn to_pixels_clamped(&self, width: i32, height: i32) -> Vec<(i32, i32)> {
        self.points
            .iter()
            .map(|p| {
                (
                    f64_to_i32_clamp(p.x.round(), 0, width - 1),
                    f64_to_i32_clamp(p.y.round(), 0, height - 1),
                )
            })
            .collect()
    }
}

/// Head axes projected into the image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedAxes {
    /// Image position of the model origin
    pub origin: Point2<f64>,
    /// Tip of the x axis
    pub x: Point2<f64>,
    /// Tip of the y axis
    pub y: Point2<f64>,
    /// Tip of the z axis
    pub z: Point2<f64>,
}

/// Round an image point to integer pixels
///
/// # Errors
///
/// Returns an error if either coordinate is not finite or out of range
pub fn to_pixel(point: &Point2<f64>) -> Result<(i32, i32)> {
    Ok((f64_to_i32(point.x.round())?, f64_to_i32(point.y.round())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_angles_close(a: &EulerAngles, b: &EulerAngles, tol: f64) {
        assert!((a.pitch - b.pitch).abs() < tol, "pitch {} vs {}", a.pitch, b.pitch);
        assert!((a.yaw - b.yaw).abs() < tol, "yaw {} vs {}", a.yaw, b.yaw);
        assert!((a.roll - b.roll).abs() < tol, "roll {} vs {}", a.roll, b.roll);
    }

    #[test]
    fn test_identity_rotation_is_zero_angles() {
        let angles = EulerAngles::from_rotation(&Rotation3::identity());
        assert_angles_close(&angles, &EulerAngles::default(), 1e-12);
    }

    #[test]
    fn test_single_axis_rotations() {
        let pitch_only = Rotation3::from_axis_angle(&Vector3::x_axis(), 20f64.to_radians());
        assert_angles_close(&EulerAngles::from_rotation(&pitch_only), &EulerAngles::new(20.0, 0.0, 0.0), 1e-9);

        let yaw_only = Rotation3::from_axis_angle(&Vector3::y_axis(), (-35f64).to_radians());
        assert_angles_close(&EulerAngles::from_rotation(&yaw_only), &EulerAngles::new(0.0, -35.0, 0.0), 1e-9);

        let roll_only = Rotation3::from_axis_angle(&Vector3::z_axis(), 10f64.to_radians());
        assert_angles_close(&EulerAngles::from_rotation(&roll_only), &EulerAngles::new(0.0, 0.0, 10.0), 1e-9);
    }

    #[test]
    fn test_gimbal_lock_pins_roll_to_zero() {
        for pitch in [90.0, -90.0] {
            let angles = EulerAngles::new(pitch, 30.0, 15.0);
            let decoded = EulerAngles::from_rotation(&angles.to_rotation());

            assert!(decoded.pitch.is_finite() && decoded.yaw.is_finite() && decoded.roll.is_finite());
            assert_eq!(decoded.roll, 0.0);
            assert!((decoded.pitch - pitch).abs() < 1e-6);

            // Same rotation even though the split between yaw and roll changed
            let diff = angles.to_rotation().inverse() * decoded.to_rotation();
            assert!(diff.angle() < 1e-6);
        }
    }

    #[test]
    fn test_gimbal_lock_with_round_off() {
        // Matrix entry slightly past -1 from accumulated error
        let mut m = EulerAngles::new(90.0, 0.0, 0.0).to_rotation().into_inner();
        m[(1, 2)] = -1.0 - 1e-12;
        let angles = EulerAngles::from_rotation(&Rotation3::from_matrix_unchecked(m));
        assert!((angles.pitch - 90.0).abs() < 1e-6);
        assert_eq!(angles.roll, 0.0);
    }

    #[test]
    fn test_pose_flatten_order() {
        let pose = Pose::new(Vector3::new(0.1, 0.2, 0.3), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.to_array(), [0.1, 0.2, 0.3, 1.0, 2.0, 3.0]);
        assert_eq!(Pose::from_array(pose.to_array()), pose);
    }

    #[test]
    fn test_rotation_vector_near_half_turn() {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::PI - 1e-9);
        let vector = rotation_to_vector(&rotation);
        assert!((vector.norm() - std::f64::consts::PI).abs() < 1e-6);
        assert!(vector.x.abs() < 1e-9 && vector.y.abs() < 1e-9);
    }

    #[test]
    fn test_transform_point() {
        let pose = Pose::new(
            Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vector3::new(0.0, 0.0, 100.0),
        );
        let p = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!((p - Point3::new(0.0, 1.0, 100.0)).norm() < 1e-12);
    }

    #[test]
    fn test_annotation_box_layout() {
        let points = annotation_box_points();
        assert_eq!(points[0], points[4]);
        assert_eq!(points[5], points[9]);
        assert!(points[..5].iter().all(|p| p.z == ANNOTATION_REAR_DEPTH));
        assert!(points[5..].iter().all(|p| p.z == ANNOTATION_FRONT_DEPTH));
        assert!(ANNOTATION_BOX_EDGES.iter().all(|&(a, b)| a < 10 && b < 10));
    }

    #[test]
    fn test_to_pixels_clamped() {
        let mut points = [Point2::new(10.0, 10.0); 10];
        points[3] = Point2::new(-50.0, 900.0);
        points[7] = Point2::new(f64::NAN, 5.0);
        let projected = ProjectedBox { points };

        assert!(projected.to_pixels().is_err());
        let pixels = projected.to_pixels_clamped(640, 480);
        assert_eq!(pixels[0], (10, 10));
        assert_eq!(pixels[3], (0, 479));
        assert_eq!(pixels[7], (0, 5));
    }

    #[test]
    fn test_to_pixel_rejects_non_finite() {
        assert_eq!(to_pixel(&Point2::new(10.4, 20.6)).unwrap(), (10, 21));
        assert!(to_pixel(&Point2::new(f64::NAN, 0.0)).is_err());
        assert!(to_pixel(&Point2::new(1e12, 0.0)).is_err());
    }

    proptest! {
        #[test]
        fn prop_euler_round_trip(
            pitch in -89.0f64..89.0,
            yaw in -179.0f64..179.0,
            roll in -179.0f64..179.0,
        ) {
            let angles = EulerAngles::new(pitch, yaw, roll);
            let decoded = EulerAngles::from_rotation_vector(&angles.to_rotation_vector());
            prop_assert!((decoded.pitch - pitch).abs() < 1e-6);
            prop_assert!((decoded.yaw - yaw).abs() < 1e-6);
            prop_assert!((decoded.roll - roll).abs() < 1e-6);
        }
    }
}
