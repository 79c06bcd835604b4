//! Constants used throughout the library

/// Number of facial landmarks for full face
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Number of landmarks in the reduced face model
pub const NUM_REDUCED_LANDMARKS: usize = 14;

/// Indices into the 68-point layout that make up the reduced model:
/// brow corners, eye corners, nostril wings, mouth corners, lower lip, chin
pub const REDUCED_LANDMARK_INDICES: [usize; NUM_REDUCED_LANDMARKS] =
    [17, 21, 22, 26, 36, 39, 42, 45, 31, 35, 48, 54, 57, 8];

/// Total number of 3D model coordinates (68 points × 3 dimensions)
pub const MODEL_POINTS_TOTAL_VALUES: usize = 204;

/// Camera matrix center factor
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

/// Number of lens distortion coefficients (k1, k2, p1, p2)
pub const NUM_DISTORTION_COEFFS: usize = 4;

/// Minimum number of correspondences for the linear PnP seed
pub const MIN_PNP_POINTS: usize = 6;

/// Number of scalar degrees of freedom in a pose
pub const POSE_DOF: usize = 6;

/// Annotation box geometry
pub const ANNOTATION_REAR_SIZE: f64 = 75.0;
pub const ANNOTATION_REAR_DEPTH: f64 = 0.0;
pub const ANNOTATION_FRONT_SIZE: f64 = 100.0;
pub const ANNOTATION_FRONT_DEPTH: f64 = 100.0;

/// Length of the drawn head axes in model units
pub const AXIS_LENGTH: f64 = 30.0;

/// Default stabilizer parameters
pub const DEFAULT_STATE_NUM: usize = 2;
pub const DEFAULT_MEASURE_NUM: usize = 1;
pub const DEFAULT_COV_PROCESS: f64 = 0.1;
pub const DEFAULT_COV_MEASURE: f64 = 0.1;

/// Default Levenberg-Marquardt parameters
pub const DEFAULT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_INITIAL_DAMPING: f64 = 1e-3;
pub const DEFAULT_STEP_TOLERANCE: f64 = 1e-12;
pub const DEFAULT_COST_TOLERANCE: f64 = 1e-14;

/// Largest damping factor before refinement gives up
pub const MAX_DAMPING: f64 = 1e12;

/// Reprojection error above which a seeded solve is retried from scratch
pub const DEFAULT_RESEED_RMSE: f64 = 25.0;

/// Default capacity of the detector frame queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// Largest synthetic landmark noise in pixels
pub const MAX_DETECTOR_NOISE: f64 = 100.0;

/// Closeness of |sin(pitch)| to 1 treated as gimbal lock
pub const GIMBAL_LOCK_EPSILON: f64 = 1e-6;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
