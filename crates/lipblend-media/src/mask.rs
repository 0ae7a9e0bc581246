//! Soft mouth-region mask construction from facial landmarks.
//!
//! For each detected face the external mouth polygon is rasterized, dilated
//! outward to guarantee coverage of the lip-sync model's imprecise mouth
//! region, re-rasterized from its outer contour (polygon-filled and
//! hole-free even if dilation coarsened the boundary), and accumulated into
//! a frame-sized mask. A Gaussian blur softens the accumulated mask so the
//! blend has no visible seam.

use lipblend_models::LandmarkSet;
use opencv::core::{self, AlgorithmHint, Mat, Point, Scalar, Size, Vector};
use opencv::imgproc;
use opencv::prelude::{MatExprTraitConst, MatTraitConst};

use crate::error::{MediaError, MediaResult};

/// Side length of the square dilation structuring element.
pub const DILATE_KERNEL_SIZE: i32 = 3;

/// Dilation iterations; with the 3x3 kernel this grows the mask by
/// roughly 8 pixels in every direction.
pub const DILATE_ITERATIONS: i32 = 8;

/// Gaussian blur kernel side; sigma is derived from the kernel size.
pub const BLUR_KERNEL_SIZE: i32 = 15;

/// Builds soft compositing masks for mouth regions.
pub struct MouthMaskBuilder {
    kernel: Mat,
}

impl MouthMaskBuilder {
    pub fn new() -> MediaResult<Self> {
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(DILATE_KERNEL_SIZE, DILATE_KERNEL_SIZE),
            Point::new(-1, -1),
        )?;
        Ok(Self { kernel })
    }

    /// A zeroed 3-channel mask sized for the frame. Seed for accumulation.
    pub fn blank_mask(size: Size) -> MediaResult<Mat> {
        Ok(Mat::zeros(size.height, size.width, core::CV_8UC3)?.to_mat()?)
    }

    /// Rasterize, dilate, and re-fill one face's mouth region into the
    /// cumulative frame-sized mask.
    pub fn add_face(&self, landmarks: &LandmarkSet, cumulative: &mut Mat) -> MediaResult<()> {
        let size = cumulative.size()?;

        let polygon: Vector<Point> = landmarks
            .external_mouth_shape()
            .iter()
            .map(|p| Point::new(p.x, p.y))
            .collect();

        // Filled external mouth polygon on a single-channel canvas.
        let mut mouth_mask = Mat::zeros(size.height, size.width, core::CV_8UC1)?.to_mat()?;
        imgproc::fill_convex_poly(
            &mut mouth_mask,
            &polygon,
            Scalar::all(255.0),
            imgproc::LINE_8,
            0,
        )?;

        // Grow outward so the mask covers the generated mouth region plus
        // the margin the blur needs.
        let mut dilated = Mat::default();
        imgproc::dilate(
            &mouth_mask,
            &mut dilated,
            &self.kernel,
            Point::new(-1, -1),
            DILATE_ITERATIONS,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        // Re-derive the outer contour of the dilated region and fill it as a
        // polygon. The dilated raster is simply connected, so a single
        // external contour is expected.
        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            &dilated,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        if contours.is_empty() {
            return Err(MediaError::detection_failed(
                "dilated mouth mask produced no contour",
            ));
        }
        let contour = contours.get(0)?;

        imgproc::fill_convex_poly(
            cumulative,
            &contour,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            imgproc::LINE_8,
            0,
        )?;

        Ok(())
    }

    /// Blur the accumulated mask into the final soft compositing mask.
    pub fn soften(&self, cumulative: &Mat) -> MediaResult<Mat> {
        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            cumulative,
            &mut blurred,
            Size::new(BLUR_KERNEL_SIZE, BLUR_KERNEL_SIZE),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        Ok(blurred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipblend_models::{LandmarkPoint, LANDMARK_COUNT};
    use opencv::prelude::MatTraitConstManual;

    /// A landmark set whose mouth points form a circle of `radius` around
    /// `(cx, cy)`; non-mouth points are parked away from the mouth.
    fn synthetic_landmarks(cx: i32, cy: i32, radius: f64) -> LandmarkSet {
        let mut points = vec![LandmarkPoint::new(1, 1); LANDMARK_COUNT];
        for (i, point) in points.iter_mut().enumerate().skip(48) {
            let angle = (i - 48) as f64 / 20.0 * std::f64::consts::TAU;
            // Inner-lip points (the trailing seven) sit at half radius.
            let r = if i >= 61 { radius / 2.0 } else { radius };
            *point = LandmarkPoint::new(
                cx + (r * angle.cos()).round() as i32,
                cy + (r * angle.sin()).round() as i32,
            );
        }
        LandmarkSet::new(points).unwrap()
    }

    fn nonzero_support(mask: &Mat) -> Vec<bool> {
        mask.data_bytes()
            .unwrap()
            .iter()
            .map(|&b| b > 0)
            .collect()
    }

    #[test]
    fn test_mask_strictly_contains_mouth_polygon() {
        let builder = MouthMaskBuilder::new().unwrap();
        let landmarks = synthetic_landmarks(48, 48, 10.0);
        let size = Size::new(96, 96);

        let mut cumulative = MouthMaskBuilder::blank_mask(size).unwrap();
        builder.add_face(&landmarks, &mut cumulative).unwrap();
        let mask = builder.soften(&cumulative).unwrap();

        // Reference: the raw external mouth polygon, 3-channel for
        // byte-aligned comparison.
        let polygon: Vector<Point> = landmarks
            .external_mouth_shape()
            .iter()
            .map(|p| Point::new(p.x, p.y))
            .collect();
        let mut raw = MouthMaskBuilder::blank_mask(size).unwrap();
        imgproc::fill_convex_poly(
            &mut raw,
            &polygon,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let mask_support = nonzero_support(&mask);
        let raw_support = nonzero_support(&raw);

        // Dilation only grows coverage: every polygon pixel stays covered.
        for (i, &in_polygon) in raw_support.iter().enumerate() {
            if in_polygon {
                assert!(mask_support[i], "polygon pixel {i} lost by mask");
            }
        }
        // And the containment is strict.
        let grown = mask_support
            .iter()
            .zip(&raw_support)
            .any(|(&m, &r)| m && !r);
        assert!(grown, "dilated mask did not grow beyond the polygon");
    }

    #[test]
    fn test_faces_accumulate_into_one_mask() {
        let builder = MouthMaskBuilder::new().unwrap();
        let size = Size::new(192, 96);
        let mut cumulative = MouthMaskBuilder::blank_mask(size).unwrap();

        builder
            .add_face(&synthetic_landmarks(48, 48, 10.0), &mut cumulative)
            .unwrap();
        builder
            .add_face(&synthetic_landmarks(144, 48, 10.0), &mut cumulative)
            .unwrap();

        let support = nonzero_support(&cumulative);
        let width = size.width as usize * 3;
        let row = 48 * width;
        assert!(support[row + 48 * 3], "first face missing from mask");
        assert!(support[row + 144 * 3], "second face missing from mask");
    }
}
