// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Shared robust statistics: median, iterative resistant mean, and the
 * midpoint-shifted least-squares line fit. Used by the overscan bias fit
 * (C5), the CTE residual-bias measurement (C9 step 1), and the MultiAccum
 * reference-pixel bias drift (C10 step 5) -- all three are instances of
 * "iterative sigma-clip then summarize", just with different clip scales.
 */

/// The median of a slice of values. `None` if empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = v.len();
    Some(if n % 2 == 1 {
        v[n / 2]
    } else {
        0.5 * (v[n / 2 - 1] + v[n / 2])
    })
}

/// Sample mean and (population) standard deviation of `values`. `(0, 0)`
/// for an empty slice.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, var.sqrt())
}

/// Outcome of an iterative resistant-mean calculation.
#[derive(Debug, Clone, Copy)]
pub struct ResistantMean {
    pub mean: f64,
    pub std: f64,
    pub n_used: usize,
    pub n_rejected: usize,
}

/// Iteratively reject samples more than `sigma_rej` standard deviations
/// from the running mean, recomputing mean/std on the survivors each pass,
/// until a pass rejects nothing or `max_iters` is reached. Used (with
/// different `sigma_rej`) by the CTE post-scan residual-bias measurement
/// (`sigma_rej = 7.5`, §4.9 step 1) and the MultiAccum reference-pixel
/// bias-drift estimator (`sigma_rej = 3`, §4.10 step 5).
pub fn resistant_mean(values: &[f64], sigma_rej: f64, max_iters: usize) -> ResistantMean {
    let mut survivors: Vec<f64> = values.to_vec();
    if survivors.is_empty() {
        return ResistantMean {
            mean: 0.0,
            std: 0.0,
            n_used: 0,
            n_rejected: 0,
        };
    }
    let n_total = survivors.len();
    for _ in 0..max_iters {
        let (mean, std) = mean_std(&survivors);
        if std == 0.0 {
            break;
        }
        let before = survivors.len();
        survivors.retain(|&v| (v - mean).abs() <= sigma_rej * std);
        if survivors.len() == before || survivors.is_empty() {
            break;
        }
    }
    let (mean, std) = mean_std(&survivors);
    ResistantMean {
        mean,
        std,
        n_used: survivors.len(),
        n_rejected: n_total - survivors.len(),
    }
}

/// The overscan-specific two-pass rejection of §4.5 step 3 ("clean bias
/// fit"): first clamp the measured sigma to the Poisson scale
/// `sqrt(mean)` when the data are noisier than that, reject anything above
/// `mean + 3.5*sigma`, then recompute the mean on the survivors and reject
/// anything above `mean + 2*read_noise`. Returns the final survivors and
/// the total number rejected across both passes.
pub fn clean_bias_fit(values: &[f64], read_noise: f64) -> (Vec<f64>, usize) {
    if values.is_empty() {
        return (Vec::new(), 0);
    }
    let n_total = values.len();
    let (mean1, std1_raw) = mean_std(values);
    let poisson = mean1.max(0.0).sqrt();
    let sigma1 = if std1_raw > poisson { poisson } else { std1_raw };
    let threshold1 = mean1 + 3.5 * sigma1;
    let pass1: Vec<f64> = values.iter().copied().filter(|&v| v <= threshold1).collect();

    let (mean2, _std2) = mean_std(&pass1);
    let threshold2 = mean2 + 2.0 * read_noise;
    let pass2: Vec<f64> = pass1.into_iter().filter(|&v| v <= threshold2).collect();

    let n_rejected = n_total - pass2.len();
    (pass2, n_rejected)
}

/// A least-squares line fit `y = m*(x - xmid) + b`, with `xmid` chosen as
/// the mean of the `x` sample to reduce round-off (§4.5 step 4: "with row
/// indices shifted to the mid-row").
#[derive(Debug, Clone, Copy)]
pub struct LineFit {
    pub slope: f64,
    pub intercept_at_mid: f64,
    pub xmid: f64,
}

impl LineFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * (x - self.xmid) + self.intercept_at_mid
    }
}

/// Fit `y = m*(x - xmid) + b` by ordinary least squares.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<LineFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let xmid = xs.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|x| (x - xmid).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let ybar = ys.iter().sum::<f64>() / n;
    let sxy: f64 = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| (x - xmid) * (y - ybar))
        .sum();
    let slope = sxy / sxx;
    Some(LineFit {
        slope,
        intercept_at_mid: ybar,
        xmid,
    })
}

/// Fit `y = m*(x - xmid)` with the intercept forced to zero (§4.5's drift
/// fit: "intercept forced to zero; the bias baseline belongs to the row
/// fit"). `xmid` is still supplied by the caller (the serial-overscan
/// rectangle's midpoint, `i_zero`) rather than derived from the
/// sample, since the drift zero-point is a property of the geometry, not
/// of this particular column sample.
pub fn fit_line_through_point(xs: &[f64], ys: &[f64], xmid: f64) -> Option<f64> {
    if xs.len() != ys.len() || xs.is_empty() {
        return None;
    }
    let sxx: f64 = xs.iter().map(|x| (x - xmid).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = xs.iter().zip(ys.iter()).map(|(x, y)| (x - xmid) * y).sum();
    Some(sxy / sxx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn median_of_odd_and_even_length() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn resistant_mean_rejects_a_single_outlier() {
        let mut values = vec![10.0; 20];
        values.push(1000.0);
        let r = resistant_mean(&values, 3.0, 20);
        assert_relative_eq!(r.mean, 10.0, epsilon = 1e-9);
        assert_eq!(r.n_rejected, 1);
    }

    #[test]
    fn clean_bias_fit_rejects_high_outliers_only() {
        let mut values = vec![100.0; 30];
        values.push(10_000.0);
        let (survivors, rejected) = clean_bias_fit(&values, 3.0);
        assert_eq!(rejected, 1);
        assert!(survivors.iter().all(|&v| v == 100.0));
    }

    #[test]
    fn fit_line_recovers_known_slope_and_intercept() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 2.0 * x + 5.0).collect();
        let fit = fit_line(&xs, &ys).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.eval(0.0), 5.0, epsilon = 1e-9);
        assert_relative_eq!(fit.eval(9.0), 23.0, epsilon = 1e-9);
    }

    #[test]
    fn fit_line_through_point_forces_zero_at_xmid() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let xmid = 4.5;
        let ys: Vec<f64> = xs.iter().map(|&x| 3.0 * (x - xmid)).collect();
        let slope = fit_line_through_point(&xs, &ys, xmid).unwrap();
        assert_relative_eq!(slope, 3.0, epsilon = 1e-9);
    }
}
