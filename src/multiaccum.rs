// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * MultiAccum (non-destructive) IR readout processing (C10): zero-read
 * signal estimation, non-linearity correction, saturation propagation,
 * reference-pixel bias drift, and units conversion.
 */

use ndarray::Array2;

use crate::dq::{SATPIXEL, ZEROSIG};
use crate::image::ImageTriplet;
use crate::stats::resistant_mean;

/// The default zero-signal clip sigma (`ZTHRESH`), matching the reference
/// implementation's documented default (§4.10, DESIGN.md open question).
pub const ZTHRESH: f64 = 4.0;

/// Outcome of zero-signal estimation (§4.10 step 2): the estimated signal
/// to add back for non-linearity correction, plus how many pixels were
/// flagged as having real zero-read signal.
#[derive(Debug, Clone)]
pub struct ZeroSignalResult {
    pub zsig: Array2<f64>,
    pub n_flagged: usize,
}

/// `zsig = read[zeroth] - super_zero_ref`; flag pixels where `zsig >
/// threshold * noise` as real signal (kept), others zeroed out. Also
/// flags `SATPIXEL | ZEROSIG` wherever the zeroth-read or first-read
/// value exceeds the per-pixel saturation node (§4.10 step 2).
pub fn estimate_zero_signal(
    zeroth_read: &mut ImageTriplet,
    first_read: &mut ImageTriplet,
    super_zero_ref: &Array2<f64>,
    super_zero_err: &Array2<f64>,
    saturation_node: &Array2<f64>,
    threshold: f64,
) -> ZeroSignalResult {
    let (ny, nx) = (zeroth_read.ny(), zeroth_read.nx());
    let mut zsig = Array2::zeros((ny, nx));
    let mut n_flagged = 0usize;

    ndarray::Zip::from(&mut zsig)
        .and(&zeroth_read.sci)
        .and(&zeroth_read.err)
        .and(super_zero_ref)
        .and(super_zero_err)
        .for_each(|z, &sci0, &err0, &ref_val, &ref_err| {
            let raw_zsig = sci0 - ref_val;
            let noise = (err0 * err0 + ref_err * ref_err).sqrt();
            if noise > 0.0 && raw_zsig > threshold * noise {
                *z = raw_zsig;
                n_flagged += 1;
            } else {
                *z = 0.0;
            }
        });

    ndarray::Zip::from(&zeroth_read.sci)
        .and(&mut zeroth_read.dq)
        .and(saturation_node)
        .for_each(|&sci0, dqv, &node| {
            if sci0 > node {
                *dqv |= SATPIXEL | ZEROSIG;
            }
        });
    ndarray::Zip::from(&first_read.sci)
        .and(&mut first_read.dq)
        .and(saturation_node)
        .for_each(|&sci1, dqv, &node| {
            if sci1 > node {
                *dqv |= SATPIXEL;
            }
        });

    ZeroSignalResult { zsig, n_flagged }
}

/// Non-linearity coefficients for one pixel: `c[0..ncoeff)` plus the
/// per-pixel saturation node `n1` (§4.10 step 3).
#[derive(Debug, Clone)]
pub struct NonLinearityRef {
    /// `coeffs[k][y][x]` is the `k`-th coefficient for pixel `(y, x)`.
    pub coeffs: Vec<Array2<f64>>,
    pub saturation_node: Array2<f64>,
    pub dq: Array2<u16>,
}

/// Apply the non-linearity polynomial correction (§4.10 step 3): add the
/// estimated zero-signal back, correct, subtract it again. Pixels above
/// `n1` get `SATPIXEL`. Reference pixels (given by `border`) are skipped
/// entirely, including `nlin.dq` propagation.
pub fn apply_nonlinearity(
    read: &mut ImageTriplet,
    zsig: &Array2<f64>,
    nlin: &NonLinearityRef,
    border: crate::image::Border,
) {
    let (ny, nx) = (read.ny(), read.nx());
    let (x0, x1) = (border.left, nx.saturating_sub(border.right));
    let (y0, y1) = (border.bottom, ny.saturating_sub(border.top));

    for y in 0..ny {
        for x in 0..nx {
            if y < y0 || y >= y1 || x < x0 || x >= x1 {
                continue;
            }
            read.dq[[y, x]] |= nlin.dq[[y, x]];
            let n1 = nlin.saturation_node[[y, x]];
            let sval = read.sci[[y, x]] + zsig[[y, x]];
            if sval > n1 {
                read.dq[[y, x]] |= SATPIXEL;
                continue;
            }
            let mut poly_sum = 0.0;
            let mut power = 1.0;
            for coeff in &nlin.coeffs {
                poly_sum += coeff[[y, x]] * power;
                power *= sval;
            }
            let corrected = sval * (1.0 + poly_sum);
            read.sci[[y, x]] = corrected - zsig[[y, x]];
        }
    }
}

/// Saturation propagation across a MultiAccum cube (§4.10 step 4, same
/// rule as C3): if flagged in read `k`, OR into read `k-1`.
pub fn propagate_saturation(reads: &mut [ImageTriplet]) {
    crate::dqinit::propagate_saturation(reads);
}

/// Collect reference-pixel values from the four edge strips of a read
/// (top/bottom rows and left/right columns of width `border`), for the
/// bias-drift resistant mean.
pub fn collect_reference_pixels(read: &ImageTriplet, border: usize) -> Vec<f64> {
    let (ny, nx) = (read.ny(), read.nx());
    let mut values = Vec::new();
    for y in 0..border.min(ny) {
        for x in 0..nx {
            values.push(read.sci[[y, x]]);
        }
    }
    for y in ny.saturating_sub(border)..ny {
        for x in 0..nx {
            values.push(read.sci[[y, x]]);
        }
    }
    for x in 0..border.min(nx) {
        for y in border.min(ny)..ny.saturating_sub(border) {
            values.push(read.sci[[y, x]]);
        }
    }
    for x in nx.saturating_sub(border)..nx {
        for y in border.min(ny)..ny.saturating_sub(border) {
            values.push(read.sci[[y, x]]);
        }
    }
    values
}

/// Bias-drift correction (`BLEVCORR`, §4.10 step 5): subtract a single
/// per-read constant, the resistant mean (`sigma_rej = 3`) of that read's
/// reference-pixel edge strips. Returns the subtracted mean (`MEANBLEV`).
pub fn correct_bias_drift(read: &mut ImageTriplet, border: usize) -> f64 {
    let values = collect_reference_pixels(read, border);
    let mean = resistant_mean(&values, 3.0, 20).mean;
    read.sci.mapv_inplace(|v| v - mean);
    mean
}

/// Units conversion (`UNITCORR`, §4.10 step 6): divide `sci`/`err` by a
/// per-pixel exposure time, skipping the reference-pixel border. The
/// zeroth read instead divides by the scalar `sampzero`.
pub fn convert_to_countrate(
    read: &mut ImageTriplet,
    exptime: &Array2<f64>,
    border: crate::image::Border,
) {
    let (ny, nx) = (read.ny(), read.nx());
    let (x0, x1) = (border.left, nx.saturating_sub(border.right));
    let (y0, y1) = (border.bottom, ny.saturating_sub(border.top));
    for y in y0..y1.max(y0) {
        for x in x0..x1.max(x0) {
            let t = exptime[[y, x]];
            if t > 0.0 {
                read.sci[[y, x]] /= t;
                read.err[[y, x]] /= t;
            }
        }
    }
}

/// The zeroth-read special case of units conversion: divide by the scalar
/// `sampzero` rather than a per-pixel time array.
pub fn convert_zeroth_read_to_countrate(
    read: &mut ImageTriplet,
    sampzero: f64,
    border: crate::image::Border,
) {
    if sampzero <= 0.0 {
        return;
    }
    let (ny, nx) = (read.ny(), read.nx());
    let (x0, x1) = (border.left, nx.saturating_sub(border.right));
    let (y0, y1) = (border.bottom, ny.saturating_sub(border.top));
    for y in y0..y1.max(y0) {
        for x in x0..x1.max(x0) {
            read.sci[[y, x]] /= sampzero;
            read.err[[y, x]] /= sampzero;
        }
    }
}

/// `BUNIT` after `UNITCORR`: electrons/s once a flat has been applied,
/// counts/s otherwise (§4.10 step 6).
pub fn bunit_after_unit_conversion(flat_applied: bool) -> &'static str {
    if flat_applied {
        "ELECTRONS/S"
    } else {
        "COUNTS/S"
    }
}
