// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Overscan bias fit (C5): row-wise serial bias level and column-wise
 * parallel-virtual drift, each with the iterative "clean bias fit"
 * rejection of §4.5.
 */

use crate::geometry::Rect;
use crate::image::ImageTriplet;
use crate::stats::{clean_bias_fit, fit_line, fit_line_through_point, mean_std, median};

/// Outcome of the row-wise serial bias fit for one amp.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiasFit {
    pub slope: f64,
    pub intercept_at_mid: f64,
    pub xmid: f64,
    pub n_rejected: usize,
    /// Whether a drift (parallel-virtual) correction was also applied.
    pub driftcorr: bool,
}

impl BiasFit {
    pub fn eval(&self, row: f64) -> f64 {
        self.slope * (row - self.xmid) + self.intercept_at_mid
    }
}

/// The median of every pixel in `row`, restricted to `rect`'s columns,
/// whose DQ does not intersect `sdqflags`. `None` if the row has no good
/// pixels in this rectangle.
fn row_median(image: &ImageTriplet, rect: &Rect, row: usize, sdqflags: u16) -> Option<f64> {
    let mut values = Vec::with_capacity(rect.width());
    for x in rect.x0..rect.x1 {
        let dq = image.dq[[row, x]];
        if dq & sdqflags == 0 {
            values.push(image.sci[[row, x]]);
        }
    }
    median(&values)
}

/// The median of every pixel in `col`, restricted to `rect`'s rows, whose
/// DQ does not intersect `sdqflags`.
fn col_median(image: &ImageTriplet, rect: &Rect, col: usize, sdqflags: u16) -> Option<f64> {
    let mut values = Vec::with_capacity(rect.height());
    for y in rect.y0..rect.y1 {
        let dq = image.dq[[y, col]];
        if dq & sdqflags == 0 {
            values.push(image.sci[[y, col]]);
        }
    }
    median(&values)
}

/// Fit the row-wise serial bias level for one amp's overscan rectangle(s)
/// (§4.5 steps 1-4). `rects` should already reflect the fallback order
/// (serial-virtual preferred, else serial-physical); if `rects` is empty
/// the caller should fall back to the tabulated `ccdbias[amp]` default and
/// set `driftcorr = false` itself (this function has no table to fall
/// back to).
pub fn fit_row_bias(
    image: &ImageTriplet,
    rects: &[Rect],
    sdqflags: u16,
    read_noise: f64,
) -> Option<BiasFit> {
    if rects.is_empty() {
        return None;
    }
    let ny = image.ny();
    let mut rows = Vec::new();
    let mut medians = Vec::new();
    for j in 0..ny {
        // Splice medians from every overscan rectangle present on this row.
        let mut row_values = Vec::new();
        for rect in rects {
            if j < rect.y0 || j >= rect.y1 {
                continue;
            }
            if let Some(m) = row_median(image, rect, j, sdqflags) {
                row_values.push(m);
            }
        }
        if let Some(spliced) = median(&row_values) {
            rows.push(j as f64);
            medians.push(spliced);
        }
    }
    if medians.is_empty() {
        return None;
    }

    let (survivors, rejected_stage1) = clean_bias_fit_with_rows(&rows, &medians, read_noise);
    let fit = fit_line(&survivors.0, &survivors.1)?;
    Some(BiasFit {
        slope: fit.slope,
        intercept_at_mid: fit.intercept_at_mid,
        xmid: fit.xmid,
        n_rejected: rejected_stage1,
        driftcorr: false,
    })
}

/// `clean_bias_fit` operates on values alone; this keeps the paired `x`
/// coordinate (row or column index) alongside each surviving value.
fn clean_bias_fit_with_rows(xs: &[f64], ys: &[f64], read_noise: f64) -> ((Vec<f64>, Vec<f64>), usize) {
    let n_total = ys.len();
    let (mean1, std1_raw) = mean_std(ys);
    let poisson = mean1.max(0.0).sqrt();
    let sigma1 = if std1_raw > poisson { poisson } else { std1_raw };
    let threshold1 = mean1 + 3.5 * sigma1;
    let pass1: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter(|(_, &y)| y <= threshold1)
        .map(|(&x, &y)| (x, y))
        .collect();

    let pass1_ys: Vec<f64> = pass1.iter().map(|(_, y)| *y).collect();
    let (mean2, _) = mean_std(&pass1_ys);
    let threshold2 = mean2 + 2.0 * read_noise;
    let pass2: Vec<(f64, f64)> = pass1.into_iter().filter(|(_, y)| *y <= threshold2).collect();

    let n_rejected = n_total - pass2.len();
    let xs_out = pass2.iter().map(|(x, _)| *x).collect();
    let ys_out = pass2.iter().map(|(_, y)| *y).collect();
    ((xs_out, ys_out), n_rejected)
}

/// Fit the column-wise parallel-virtual drift (§4.5 steps 1-4 for columns).
/// `i_zero` is the midpoint of the serial-overscan rectangle, the drift's
/// coordinate origin. Returns `(slope, n_rejected)`.
pub fn fit_column_drift(
    image: &ImageTriplet,
    vrect: Option<&Rect>,
    sdqflags: u16,
    i_zero: f64,
) -> Option<(f64, usize)> {
    let vrect = vrect?;
    let mut cols = Vec::new();
    let mut medians = Vec::new();
    for i in vrect.x0..vrect.x1 {
        if let Some(m) = col_median(image, vrect, i, sdqflags) {
            cols.push(i as f64);
            medians.push(m);
        }
    }
    if medians.is_empty() {
        return None;
    }
    let (survivors, n_rejected) = clean_bias_fit_with_rows(&cols, &medians, 0.0);
    let slope = fit_line_through_point(&survivors.0, &survivors.1, i_zero)?;
    Some((slope, n_rejected))
}

/// Subtract `bias(j) + drift_mean` from every science pixel in `sci_rect`
/// of one amp, where `bias` is the fitted row-wise level and `drift` (if
/// present) evaluates the column-wise offset relative to `i_zero` (§4.5).
pub fn subtract_bias_and_drift(
    image: &mut ImageTriplet,
    sci_rect: &Rect,
    bias: &BiasFit,
    drift_slope: Option<f64>,
    i_zero: f64,
) {
    let drift_mean = 0.0;
    for y in sci_rect.y0..sci_rect.y1 {
        let b = bias.eval(y as f64) + drift_mean;
        for x in sci_rect.x0..sci_rect.x1 {
            let d = drift_slope.map(|m| m * (x as f64 - i_zero)).unwrap_or(0.0);
            image.sci[[y, x]] -= b + d;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_overscan_fits_zero_slope_and_the_constant_level() {
        let mut image = ImageTriplet::zeros(10, 30);
        for y in 0..10 {
            for x in 0..30 {
                image.sci[[y, x]] = 3100.0;
            }
        }
        let rect = Rect::new(0, 25, 0, 10);
        let fit = fit_row_bias(&image, &[rect], 0, 3.0).unwrap();
        assert!(fit.slope.abs() < 1e-9);
        assert!((fit.eval(5.0) - 3100.0).abs() < 1e-6);
    }

    #[test]
    fn outlier_row_is_rejected() {
        let mut image = ImageTriplet::zeros(20, 25);
        for y in 0..20 {
            for x in 0..25 {
                image.sci[[y, x]] = 100.0;
            }
        }
        // One wildly deviant row.
        for x in 0..25 {
            image.sci[[10, x]] = 100_000.0;
        }
        let rect = Rect::new(0, 25, 0, 20);
        let fit = fit_row_bias(&image, &[rect], 0, 3.0).unwrap();
        assert!(fit.n_rejected >= 1);
        assert!((fit.eval(0.0) - 100.0).abs() < 1.0);
    }

    #[test]
    fn dq_masked_pixels_are_excluded_from_the_median() {
        let mut image = ImageTriplet::zeros(1, 4);
        for x in 0..4 {
            image.sci[[0, x]] = 100.0;
        }
        image.sci[[0, 0]] = 999999.0;
        image.dq[[0, 0]] = 1;
        let rect = Rect::new(0, 4, 0, 1);
        let fit = fit_row_bias(&image, &[rect], 1, 3.0).unwrap();
        assert!((fit.eval(0.0) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn empty_rects_yields_no_fit() {
        let image = ImageTriplet::zeros(5, 5);
        assert!(fit_row_bias(&image, &[], 0, 3.0).is_none());
    }

    #[test]
    fn drift_fit_forces_zero_at_izero() {
        let mut image = ImageTriplet::zeros(5, 10);
        for y in 0..5 {
            for x in 0..10 {
                image.sci[[y, x]] = 2.0 * (x as f64 - 4.5);
            }
        }
        let rect = Rect::new(0, 10, 0, 5);
        let (slope, _) = fit_column_drift(&image, Some(&rect), 0, 4.5).unwrap();
        assert!((slope - 2.0).abs() < 1e-6);
    }
}
