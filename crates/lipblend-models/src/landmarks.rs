//! 68-point facial landmark sets.
//!
//! The landmark layout follows the standard 68-point anatomical ordering
//! (jaw 0-16, brows 17-26, nose 27-35, eyes 36-47, mouth 48-67). Only the
//! mouth range is interpreted by this pipeline; everything else is carried
//! opaquely.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of points in a complete landmark set.
pub const LANDMARK_COUNT: usize = 68;

/// First mouth landmark index (inclusive).
pub const MOUTH_START: usize = 48;

/// One past the last mouth landmark index.
pub const MOUTH_END: usize = 68;

/// Number of trailing inner-lip points dropped from the mouth range when
/// forming the external mouth polygon. The inner-lip points sit inside the
/// outer boundary and would shrink the usable contour.
pub const INNER_LIP_TRIM: usize = 7;

/// Result type for landmark validation.
pub type LandmarkResult<T> = Result<T, LandmarkError>;

/// Errors produced when constructing a landmark set.
#[derive(Debug, Error)]
pub enum LandmarkError {
    #[error("expected {LANDMARK_COUNT} landmark points, got {0}")]
    WrongPointCount(usize),
}

/// A single 2-D landmark point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: i32,
    pub y: i32,
}

impl LandmarkPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An ordered set of 68 landmark points for one detected face.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    /// Create a landmark set, validating the point count.
    pub fn new(points: Vec<LandmarkPoint>) -> LandmarkResult<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(LandmarkError::WrongPointCount(points.len()));
        }
        Ok(Self { points })
    }

    /// All 68 points in anatomical order.
    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    /// The full mouth range (points 48..68).
    pub fn mouth(&self) -> &[LandmarkPoint] {
        &self.points[MOUTH_START..MOUTH_END]
    }

    /// The external mouth polygon: the mouth range minus the trailing
    /// inner-lip points. This is the seed region for mask construction.
    pub fn external_mouth_shape(&self) -> &[LandmarkPoint] {
        let mouth = self.mouth();
        &mouth[..mouth.len() - INNER_LIP_TRIM]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential_points() -> Vec<LandmarkPoint> {
        (0..LANDMARK_COUNT as i32)
            .map(|i| LandmarkPoint::new(i, i * 2))
            .collect()
    }

    #[test]
    fn test_rejects_wrong_point_count() {
        let err = LandmarkSet::new(vec![LandmarkPoint::new(0, 0); 12]).unwrap_err();
        assert!(matches!(err, LandmarkError::WrongPointCount(12)));
    }

    #[test]
    fn test_mouth_slice_bounds() {
        let set = LandmarkSet::new(sequential_points()).unwrap();
        let mouth = set.mouth();
        assert_eq!(mouth.len(), MOUTH_END - MOUTH_START);
        assert_eq!(mouth[0].x, MOUTH_START as i32);
        assert_eq!(mouth[mouth.len() - 1].x, MOUTH_END as i32 - 1);
    }

    #[test]
    fn test_external_mouth_shape_drops_inner_lip() {
        let set = LandmarkSet::new(sequential_points()).unwrap();
        let outer = set.external_mouth_shape();
        assert_eq!(outer.len(), MOUTH_END - MOUTH_START - INNER_LIP_TRIM);
        // The dropped points are the last seven of the mouth range.
        assert_eq!(outer.last().unwrap().x, (MOUTH_END - INNER_LIP_TRIM) as i32 - 1);
    }
}
