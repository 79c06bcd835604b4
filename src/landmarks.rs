//! Detected 2D facial landmarks.

use crate::{Error, Result};
use nalgebra::Point2;

/// Face bounding box in pixels, as returned by a face detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl FaceBox {
    #[must_use]
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Ordered 2D landmark positions in pixel coordinates
///
/// Index `i` must correspond to point `i` of the face model it is solved
/// against: 68 points for the full model, 14 for the reduced one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkSet {
    points: Vec<Point2<f64>>,
}

impl LandmarkSet {
    #[must_use]
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Build from `(x, y)` tuples as produced by most detectors
    #[must_use]
    pub fn from_tuples(points: &[(f32, f32)]) -> Self {
        Self {
            points: points
                .iter()
                .map(|&(x, y)| Point2::new(f64::from(x), f64::from(y)))
                .collect(),
        }
    }

    /// Map landmarks normalized to a square face crop back to frame pixels.
    ///
    /// Both axes are scaled by the box width, since the crop handed to the
    /// landmark network is square.
    #[must_use]
    pub fn from_normalized(points: &[(f32, f32)], face_box: &FaceBox) -> Self {
        let scale = face_box.width();
        Self {
            points: points
                .iter()
                .map(|&(x, y)| {
                    Point2::new(
                        f64::from(x).mul_add(scale, face_box.left),
                        f64::from(y).mul_add(scale, face_box.top),
                    )
                })
                .collect(),
        }
    }

    /// Extract a subset of points, e.g. the reduced-model landmarks out of a
    /// 68-point detection
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of range
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let points = indices
            .iter()
            .map(|&i| {
                self.points.get(i).copied().ok_or_else(|| {
                    Error::InvalidInput(format!("Landmark index {i} out of range for {} points", self.points.len()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { points })
    }

    #[must_use]
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether every coordinate is finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }
}

impl From<Vec<Point2<f64>>> for LandmarkSet {
    fn from(points: Vec<Point2<f64>>) -> Self {
        Self::new(points)
    }
}
