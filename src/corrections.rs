// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Dark / flash / flat / shutter-shading corrections (C6). Each operates
 * line-by-line against a same-binning reference image; size mismatch is a
 * hard failure.
 */

use crate::error::{CalError, CalResult};
use crate::image::ImageTriplet;
use crate::reference::ReferenceImage;
use crate::trailer;

fn check_same_size(image: &ImageTriplet, reference: &ReferenceImage) -> CalResult<()> {
    let (ref_ny, ref_nx) = reference.data.dim();
    if reference.data.dim() != (image.ny(), image.nx()) {
        return Err(CalError::SizeMismatch {
            sci_nx: image.nx(),
            sci_ny: image.ny(),
            ref_nx,
            ref_ny,
        });
    }
    Ok(())
}

/// Time-scaled dark subtraction (§4.6). `gain_of_column` maps a column to
/// the per-amp gain that column's segment belongs to (the reference is
/// scaled by `exptime / gain` before subtraction). Returns the
/// good-pixel-weighted mean subtracted, for `MEANDARK`.
pub fn subtract_dark(
    image: &mut ImageTriplet,
    dark: &ReferenceImage,
    exptime: f64,
    gain_of_column: impl Fn(usize) -> f64,
) -> CalResult<f64> {
    check_same_size(image, dark)?;
    let (ny, nx) = (image.ny(), image.nx());
    let mut weighted_sum = 0.0;
    let mut weighted_n = 0.0;
    for j in 0..ny {
        let mut good_in_row = 0usize;
        for i in 0..nx {
            let gain = gain_of_column(i);
            let scaled = dark.data[[j, i]] * exptime / gain;
            image.sci[[j, i]] -= scaled;
            if image.dq[[j, i]] == 0 {
                good_in_row += 1;
            }
        }
        let fraction = good_in_row as f64 / nx as f64;
        weighted_sum += fraction * dark_row_mean(dark, j, exptime, &gain_of_column);
        weighted_n += fraction;
    }
    Ok(if weighted_n > 0.0 {
        weighted_sum / weighted_n
    } else {
        0.0
    })
}

fn dark_row_mean(
    dark: &ReferenceImage,
    row: usize,
    exptime: f64,
    gain_of_column: &impl Fn(usize) -> f64,
) -> f64 {
    let nx = dark.data.ncols();
    let mut sum = 0.0;
    for i in 0..nx {
        sum += dark.data[[row, i]] * exptime / gain_of_column(i);
    }
    sum / nx as f64
}

/// Post-flash subtraction (§4.6): identical to the dark scaling, but by
/// `flashdur` instead of `exptime`. Skips with a warning if `flashdur <=
/// 0`; warns (but still applies) if `flashstatus == "ABORTED"`.
pub fn subtract_flash(
    image: &mut ImageTriplet,
    flash: &ReferenceImage,
    flashdur: f64,
    flashstatus: &str,
    gain_of_column: impl Fn(usize) -> f64,
) -> CalResult<Option<f64>> {
    if flashdur <= 0.0 {
        trailer::warn_anomaly("flashcorr", "flashdur <= 0, skipping post-flash subtraction");
        return Ok(None);
    }
    if flashstatus.eq_ignore_ascii_case("ABORTED") {
        trailer::warn_anomaly("flashcorr", "flash status ABORTED, continuing anyway");
    }
    check_same_size(image, flash)?;
    let (ny, nx) = (image.ny(), image.nx());
    let mut weighted_sum = 0.0;
    let mut weighted_n = 0.0;
    for j in 0..ny {
        let mut good_in_row = 0usize;
        for i in 0..nx {
            let gain = gain_of_column(i);
            let scaled = flash.data[[j, i]] * flashdur / gain;
            image.sci[[j, i]] -= scaled;
            if image.dq[[j, i]] == 0 {
                good_in_row += 1;
            }
        }
        let fraction = good_in_row as f64 / nx as f64;
        weighted_sum += fraction * dark_row_mean(flash, j, flashdur, &gain_of_column);
        weighted_n += fraction;
    }
    Ok(Some(if weighted_n > 0.0 {
        weighted_sum / weighted_n
    } else {
        0.0
    }))
}

/// One of the three flat-field stages (§4.6): pixel-to-pixel (`PFLT`,
/// pre-divided by the mean gain so this pass also converts DN to
/// electrons), delta (`DFLT`), and low-order (`LFLT`). All three divide
/// `sci`/`err`/propagate `dq` the same way; callers apply them in
/// sequence.
pub fn divide_flat(image: &mut ImageTriplet, flat: &ReferenceImage) -> CalResult<()> {
    check_same_size(image, flat)?;
    ndarray::Zip::from(&mut image.sci)
        .and(&mut image.err)
        .and(&mut image.dq)
        .and(&flat.data)
        .for_each(|s, e, dqv, &f| {
            if f == 0.0 {
                *dqv |= crate::dq::CALIBDEFECT;
            } else {
                *e = (*e / f).abs();
                *s /= f;
            }
        });
    Ok(())
}

/// Pre-scale the pixel-to-pixel flat by the mean gain (§4.6: "pre-divided
/// by the mean gain before being applied"), converting the subsequent
/// `divide_flat` call into a DN -> electrons conversion in one pass.
pub fn prescale_pflt_by_gain(pflt: &mut ReferenceImage, mean_gain: f64) {
    pflt.data.mapv_inplace(|v| v * mean_gain);
}

/// Interpolating a coarser `LFLT` to the science image's size is a
/// known-unreliable path; fail explicitly rather than guessing (§4.6).
pub fn check_lflt_size_matches(image: &ImageTriplet, lflt: &ReferenceImage) -> CalResult<()> {
    check_same_size(image, lflt)
}

/// Shutter-shading correction (§4.6): `eff_exptime = exptime / ncombine`;
/// divide science by `(1 + shading / eff_exptime)` line-wise.
pub fn apply_shutter_shading(
    image: &mut ImageTriplet,
    shading: &ReferenceImage,
    exptime: f64,
    ncombine: u32,
) -> CalResult<()> {
    check_same_size(image, shading)?;
    let eff_exptime = exptime / ncombine.max(1) as f64;
    if eff_exptime <= 0.0 {
        return Ok(());
    }
    ndarray::Zip::from(&mut image.sci)
        .and(&mut image.err)
        .and(&shading.data)
        .for_each(|s, e, &r| {
            let factor = 1.0 + r / eff_exptime;
            if factor != 0.0 {
                *s /= factor;
                *e /= factor.abs();
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{ArtifactMeta, Pedigree};
    use ndarray::Array2;

    fn ref_image(ny: usize, nx: usize, value: f64) -> ReferenceImage {
        ReferenceImage {
            meta: ArtifactMeta {
                filetype: "DARK".into(),
                pedigree: Pedigree("INFLIGHT".into()),
            },
            data: Array2::from_elem((ny, nx), value),
        }
    }

    #[test]
    fn dark_subtraction_scales_by_exptime_over_gain() {
        let mut image = ImageTriplet::zeros(2, 2);
        image.sci.fill(1000.0);
        let dark = ref_image(2, 2, 10.0);
        let mean = subtract_dark(&mut image, &dark, 100.0, |_| 2.0).unwrap();
        // 10.0 * 100 / 2.0 = 500 subtracted.
        assert_eq!(image.sci[[0, 0]], 500.0);
        assert!((mean - 500.0).abs() < 1e-6);
    }

    #[test]
    fn flash_skips_when_flashdur_non_positive() {
        let mut image = ImageTriplet::zeros(1, 1);
        image.sci[[0, 0]] = 100.0;
        let flash = ref_image(1, 1, 10.0);
        let result = subtract_flash(&mut image, &flash, 0.0, "NOT_PERFORMED", |_| 1.0).unwrap();
        assert!(result.is_none());
        assert_eq!(image.sci[[0, 0]], 100.0);
    }

    #[test]
    fn flat_of_constant_one_leaves_image_bit_exact() {
        let mut image = ImageTriplet::zeros(2, 2);
        image.sci.fill(42.0);
        image.err.fill(3.0);
        image.dq.fill(5);
        let flat = ref_image(2, 2, 1.0);
        divide_flat(&mut image, &flat).unwrap();
        assert_eq!(image.sci[[0, 0]], 42.0);
        assert_eq!(image.err[[0, 0]], 3.0);
        assert_eq!(image.dq[[0, 0]], 5);
    }

    #[test]
    fn flat_division_by_zero_flags_calibdefect() {
        let mut image = ImageTriplet::zeros(1, 1);
        image.sci[[0, 0]] = 42.0;
        let flat = ref_image(1, 1, 0.0);
        divide_flat(&mut image, &flat).unwrap();
        assert_eq!(image.sci[[0, 0]], 42.0);
        assert!(image.dq[[0, 0]] & crate::dq::CALIBDEFECT != 0);
    }

    #[test]
    fn shutter_shading_divides_by_one_plus_shading_over_exptime() {
        let mut image = ImageTriplet::zeros(1, 1);
        image.sci[[0, 0]] = 110.0;
        let shading = ref_image(1, 1, 10.0);
        apply_shutter_shading(&mut image, &shading, 100.0, 1).unwrap();
        assert!((image.sci[[0, 0]] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut image = ImageTriplet::zeros(2, 2);
        let dark = ref_image(3, 3, 1.0);
        let err = subtract_dark(&mut image, &dark, 1.0, |_| 1.0).unwrap_err();
        assert_eq!(err.code(), 120);
    }
}
