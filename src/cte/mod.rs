// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * CTE correction (C9, §4.9): the central algorithm. Consumes the raw
 * per-amp quadrants after a dedicated CTE bias subtraction, reorders them
 * into RAZ layout, runs the forward/inverse model, and hands back a
 * CTE-corrected set of quadrants plus the `PCTEFRAC` summary statistic.
 */

pub mod model;
pub mod params;

use ndarray::Array2;

use crate::error::{CalError, CalResult};
use crate::geometry::Amp;
use crate::image::ImageTriplet;
use crate::raz::{raz, undo_raz};
use crate::switches::{CalSwitches, Status, Step};

pub use params::{ColumnScale, CteOptions, CteParams, Trap, TrailProfiles, TrapTable};

/// The outcome of a CTE run: the corrected per-amp quadrants and the
/// fraction of total signal the correction moved (`PCTEFRAC`).
#[derive(Debug, Clone)]
pub struct CteOutput {
    pub quadrants: Vec<(Amp, Array2<f64>)>,
    pub pctefrac: f64,
}

/// Run the full CTE correction (§4.9) on a set of already-CTE-bias
/// subtracted amp quadrants (gain in electrons/DN, same for every amp on a
/// chip).
///
/// Preconditions enforced here (§4.9 failure modes):
/// - `switches` must not already show `Biascorr == Complete` (refuse to
///   double-subtract).
/// - `subarray` must be `false` (CTE correction is explicitly unsupported
///   on subarrays).
pub fn correct_cte(
    quadrants: &[(Amp, Array2<f64>)],
    gain: f64,
    subarray: bool,
    switches: &CalSwitches,
    traps: &TrapTable,
    profiles: &TrailProfiles,
    col_scales: &[ColumnScale],
    params: &CteParams,
    options: &CteOptions,
) -> CalResult<CteOutput> {
    if switches.status(Step::Biascorr) == Status::Complete {
        return Err(CalError::Generic(
            "BIASCORR already complete; refusing to double-subtract before CTE".to_string(),
        ));
    }
    if subarray {
        return Err(CalError::Generic(
            "CTE correction does not support subarray input".to_string(),
        ));
    }
    if params.pctensmd != 0 {
        return Err(CalError::Generic(format!(
            "unrecognized read-noise mitigation mode {}",
            params.pctensmd
        )));
    }

    let quad_w = quadrants[0].1.ncols();
    if col_scales.len() != 4 * quad_w {
        return Err(CalError::TableError(
            "SCLBYCOL column count does not match 4x quadrant width".to_string(),
        ));
    }

    let mut razzed = raz(quadrants);
    let (nrows, ncols) = razzed.dim();

    let postscan_x0 = ncols.saturating_sub(ncols / 20).max(1);
    model::gain_convert_and_subtract_residual(&mut razzed, gain, postscan_x0, ncols);

    let rsz = model::smooth_read_noise(&razzed, params.pcternoi, options);
    let fff = model::build_scale_map(col_scales, nrows);
    let rsc = model::inverse_forward_model(&rsz, &fff, traps, profiles, params, options);
    let corrected = model::reassemble(&razzed, &rsc, &rsz, gain);

    let total_signal: f64 = razzed.iter().map(|v| v.abs()).sum();
    let total_correction: f64 = corrected
        .iter()
        .zip(razzed.iter())
        .map(|(&c, &r)| (c - r).abs())
        .sum();
    let pctefrac = if total_signal > 0.0 {
        total_correction / total_signal
    } else {
        0.0
    };

    let amps: Vec<Amp> = quadrants.iter().map(|(a, _)| *a).collect();
    Ok(CteOutput {
        quadrants: undo_raz(&amps, &corrected),
        pctefrac,
    })
}

/// Apply the CTE-specific bias reference image subtraction required
/// before reformatting into RAZ layout (§4.9 inputs). This is a plain
/// pixel-wise subtraction distinct from the main pipeline's `BIASCORR`.
pub fn subtract_cte_bias(image: &mut ImageTriplet, cte_bias: &Array2<f64>) -> CalResult<()> {
    if cte_bias.dim() != (image.ny(), image.nx()) {
        let (ref_ny, ref_nx) = cte_bias.dim();
        return Err(CalError::SizeMismatch {
            sci_nx: image.nx(),
            sci_ny: image.ny(),
            ref_nx,
            ref_ny,
        });
    }
    image.sci -= cte_bias;
    Ok(())
}
