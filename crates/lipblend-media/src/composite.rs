//! Alpha-blend compositing of a synthesized frame into an accumulator.
//!
//! Per pixel, with the mask normalized to [0,1]:
//! `result = accumulator * (1 - m) + synthesized * m`
//! The blend is convex, so no clamping is needed; mask 0 leaves the
//! accumulator byte untouched and mask 255 takes the synthesized byte.

use opencv::core::Mat;
use opencv::prelude::{MatTraitConst, MatTraitConstManual, MatTraitManual};

use crate::error::{MediaError, MediaResult};

/// Blend `synthesized` into `accumulator` through `mask`, in place.
///
/// All three Mats must be continuous 3-channel 8-bit images of the same
/// dimensions; the mask carries its intensity replicated across channels.
pub fn blend_through_mask(
    accumulator: &mut Mat,
    synthesized: &Mat,
    mask: &Mat,
) -> MediaResult<()> {
    check_same_shape(accumulator, synthesized)?;
    check_same_shape(accumulator, mask)?;

    if !accumulator.is_continuous() || !synthesized.is_continuous() || !mask.is_continuous() {
        return Err(MediaError::internal("non-continuous Mat in blend"));
    }

    let synth = synthesized.data_bytes()?;
    let mask_bytes = mask.data_bytes()?;
    let acc = accumulator.data_bytes_mut()?;

    for ((a, &s), &m) in acc.iter_mut().zip(synth).zip(mask_bytes) {
        let alpha = m as f32 / 255.0;
        *a = (*a as f32 * (1.0 - alpha) + s as f32 * alpha).round() as u8;
    }

    Ok(())
}

fn check_same_shape(a: &Mat, b: &Mat) -> MediaResult<()> {
    let (sa, sb) = (a.size()?, b.size()?);
    if sa != sb || a.channels() != b.channels() {
        return Err(MediaError::internal(format!(
            "mismatched blend shapes: {}x{}x{} vs {}x{}x{}",
            sa.width,
            sa.height,
            a.channels(),
            sb.width,
            sb.height,
            b.channels(),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Scalar};
    use opencv::prelude::MatExprTraitConst;

    fn solid(value: f64, rows: i32, cols: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, core::CV_8UC3, Scalar::all(value)).unwrap()
    }

    #[test]
    fn test_mask_zero_keeps_accumulator_exactly() {
        let mut acc = solid(17.0, 4, 4);
        let synth = solid(200.0, 4, 4);
        let mask = Mat::zeros(4, 4, core::CV_8UC3).unwrap().to_mat().unwrap();

        blend_through_mask(&mut acc, &synth, &mask).unwrap();
        assert!(acc.data_bytes().unwrap().iter().all(|&b| b == 17));
    }

    #[test]
    fn test_mask_full_takes_synthesized_exactly() {
        let mut acc = solid(17.0, 4, 4);
        let synth = solid(200.0, 4, 4);
        let mask = solid(255.0, 4, 4);

        blend_through_mask(&mut acc, &synth, &mask).unwrap();
        assert!(acc.data_bytes().unwrap().iter().all(|&b| b == 200));
    }

    #[test]
    fn test_intermediate_mask_interpolates() {
        let mut acc = solid(0.0, 2, 2);
        let synth = solid(200.0, 2, 2);
        let mask = solid(128.0, 2, 2);

        blend_through_mask(&mut acc, &synth, &mask).unwrap();
        // 0 * (1 - 128/255) + 200 * 128/255 = 100.39 -> 100
        assert!(acc.data_bytes().unwrap().iter().all(|&b| b == 100));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut acc = solid(0.0, 2, 2);
        let synth = solid(0.0, 4, 4);
        let mask = solid(0.0, 2, 2);

        assert!(blend_through_mask(&mut acc, &synth, &mask).is_err());
    }
}
