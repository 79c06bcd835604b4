//! 3D face models used as the object side of the PnP problem.
//!
//! Points use the 68-landmark iBUG layout: jaw 0-16, brows 17-26, nose
//! 27-35, eyes 36-47, mouth 48-67. Coordinates are in model units (roughly
//! millimetres) with x toward the image right, y down and z away from the
//! camera, so the identity pose is a frontal face.

use crate::{
    constants::{MODEL_POINTS_TOTAL_VALUES, NUM_FACIAL_LANDMARKS, NUM_REDUCED_LANDMARKS, REDUCED_LANDMARK_INDICES},
    Error, Result,
};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Canonical 68-point face geometry
#[rustfmt::skip]
const CANONICAL_FACE: [[f64; 3]; NUM_FACIAL_LANDMARKS] = [
    // Jaw contour
    [-70.0, -5.0, 60.0], [-68.7, 9.2, 50.2], [-64.7, 22.9, 40.9], [-58.2, 35.6, 32.2],
    [-49.5, 46.6, 24.6], [-38.9, 55.7, 18.4], [-26.8, 62.4, 13.8], [-13.7, 66.6, 11.0],
    [0.0, 68.0, 10.0],
    [13.7, 66.6, 11.0], [26.8, 62.4, 13.8], [38.9, 55.7, 18.4], [49.5, 46.6, 24.6],
    [58.2, 35.6, 32.2], [64.7, 22.9, 40.9], [68.7, 9.2, 50.2], [70.0, -5.0, 60.0],
    // Brows
    [-55.0, -38.0, 25.0], [-45.0, -45.0, 18.0], [-34.0, -48.0, 14.0], [-23.0, -47.0, 12.0],
    [-13.0, -43.0, 11.0],
    [13.0, -43.0, 11.0], [23.0, -47.0, 12.0], [34.0, -48.0, 14.0], [45.0, -45.0, 18.0],
    [55.0, -38.0, 25.0],
    // Nose bridge and tip
    [0.0, -30.0, 10.0], [0.0, -18.0, 2.0], [0.0, -6.0, -7.0], [0.0, 5.0, -15.0],
    // Nostrils
    [-14.0, 14.0, 0.0], [-7.0, 16.0, -5.0], [0.0, 18.0, -8.0], [7.0, 16.0, -5.0], [14.0, 14.0, 0.0],
    // Right eye (image left)
    [-45.0, -20.0, 20.0], [-37.0, -24.0, 15.0], [-28.0, -24.0, 14.0], [-20.0, -20.0, 15.0],
    [-28.0, -16.0, 14.0], [-37.0, -16.0, 15.0],
    // Left eye (image right)
    [20.0, -20.0, 15.0], [28.0, -24.0, 14.0], [37.0, -24.0, 15.0], [45.0, -20.0, 20.0],
    [37.0, -16.0, 15.0], [28.0, -16.0, 14.0],
    // Outer lips
    [-25.0, 40.0, 12.0], [-15.0, 34.0, 6.0], [-6.0, 32.0, 3.0], [0.0, 33.0, 2.0],
    [6.0, 32.0, 3.0], [15.0, 34.0, 6.0], [25.0, 40.0, 12.0], [15.0, 47.0, 6.0],
    [6.0, 50.0, 4.0], [0.0, 50.0, 3.0], [-6.0, 50.0, 4.0], [-15.0, 47.0, 6.0],
    // Inner lips
    [-20.0, 40.0, 10.0], [-7.0, 37.0, 5.0], [0.0, 37.0, 4.0], [7.0, 37.0, 5.0],
    [20.0, 40.0, 10.0], [7.0, 42.0, 5.0], [0.0, 42.0, 4.0], [-7.0, 42.0, 5.0],
];

/// Which face model a landmark set corresponds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// All 68 landmarks
    Full,
    /// The 14-point subset at [`REDUCED_LANDMARK_INDICES`]
    Reduced,
}

impl ModelVariant {
    /// Number of landmarks this variant expects
    #[must_use]
    pub fn num_points(self) -> usize {
        match self {
            Self::Full => NUM_FACIAL_LANDMARKS,
            Self::Reduced => NUM_REDUCED_LANDMARKS,
        }
    }

    /// Pick the variant matching a detector's output size
    #[must_use]
    pub fn from_num_points(count: usize) -> Option<Self> {
        match count {
            NUM_FACIAL_LANDMARKS => Some(Self::Full),
            NUM_REDUCED_LANDMARKS => Some(Self::Reduced),
            _ => None,
        }
    }
}

impl std::str::FromStr for ModelVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full" | "68" => Ok(Self::Full),
            "reduced" | "14" => Ok(Self::Reduced),
            _ => Err(Error::InvalidInput(format!("Unknown model variant: {s}"))),
        }
    }
}

/// Fixed 3D landmark positions of a face
#[derive(Debug, Clone, PartialEq)]
pub struct FaceModel {
    points: Vec<Point3<f64>>,
}

impl FaceModel {
    /// The built-in 68-point model
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            points: CANONICAL_FACE.iter().map(|&[x, y, z]| Point3::new(x, y, z)).collect(),
        }
    }

    /// Load a 68-point model from a text file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold exactly
    /// 204 numbers
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::info!("Loading face model from {}", path.as_ref().display());
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse the model file format: one number per line, all x values, then
    /// all y values, then all z values. The stored z axis points toward the
    /// viewer and is flipped on load.
    ///
    /// # Errors
    ///
    /// Returns an error on a malformed or non-finite number or a wrong
    /// value count
    pub fn parse(content: &str) -> Result<Self> {
        let values = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let value = line
                    .parse::<f64>()
                    .map_err(|e| Error::ModelValidationError(format!("Invalid model value '{line}': {e}")))?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(Error::ModelValidationError(format!("Model value '{line}' is not finite")))
                }
            })
            .collect::<Result<Vec<f64>>>()?;

        if values.len() != MODEL_POINTS_TOTAL_VALUES {
            return Err(Error::ModelValidationError(format!(
                "Expected {} coordinate values ({} points × 3), got {}",
                MODEL_POINTS_TOTAL_VALUES,
                NUM_FACIAL_LANDMARKS,
                values.len()
            )));
        }

        let (xs, rest) = values.split_at(NUM_FACIAL_LANDMARKS);
        let (ys, zs) = rest.split_at(NUM_FACIAL_LANDMARKS);
        let points = xs
            .iter()
            .zip(ys)
            .zip(zs)
            .map(|((&x, &y), &z)| Point3::new(x, y, -z))
            .collect();

        Ok(Self { points })
    }

    /// Build a model from explicit points
    ///
    /// # Errors
    ///
    /// Returns an error if the point count matches neither variant or a
    /// coordinate is not finite
    pub fn from_points(points: Vec<Point3<f64>>) -> Result<Self> {
        if ModelVariant::from_num_points(points.len()).is_none() {
            return Err(Error::ModelValidationError(format!(
                "Face model must have {} or {} points, got {}",
                NUM_FACIAL_LANDMARKS,
                NUM_REDUCED_LANDMARKS,
                points.len()
            )));
        }
        if !points.iter().all(|p| p.coords.iter().all(|v| v.is_finite())) {
            return Err(Error::ModelValidationError("Face model has non-finite coordinates".to_string()));
        }
        Ok(Self { points })
    }

    /// The 14-point subset of a 68-point model
    ///
    /// # Errors
    ///
    /// Returns an error if this model is not a full 68-point model
    pub fn reduced(&self) -> Result<Self> {
        if self.points.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::ModelValidationError(format!(
                "Reduced model needs a {}-point source, got {}",
                NUM_FACIAL_LANDMARKS,
                self.points.len()
            )));
        }
        Ok(Self {
            points: REDUCED_LANDMARK_INDICES.iter().map(|&i| self.points[i]).collect(),
        })
    }

    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
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

    /// Variant matching this model's size
    #[must_use]
    pub fn variant(&self) -> Option<ModelVariant> {
        ModelVariant::from_num_points(self.points.len())
    }
}

impl Default for FaceModel {
    fn default() -> Self {
        Self::canonical()
    }
}
