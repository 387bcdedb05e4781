// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The CTE forward/inverse model proper (§4.9 steps 1-5): gain conversion
 * and residual bias, read-noise smoothing, the per-column scale map, the
 * inverse forward model (the dominant cost, parallel across columns), and
 * reassembly.
 */

use ndarray::Array2;

use super::params::{ColumnScale, CteOptions, CteParams, Trap, TrailProfiles, TrapTable};
use crate::stats::resistant_mean;

/// Step 1: convert to electrons by `gain`, then measure and subtract the
/// per-amp post-scan residual bias with a `sigma_rej = 7.5` resistant mean
/// (§4.9). Returns the subtracted residual.
pub fn gain_convert_and_subtract_residual(
    raz: &mut Array2<f64>,
    gain: f64,
    postscan_x0: usize,
    postscan_x1: usize,
) -> f64 {
    raz.mapv_inplace(|v| v * gain);
    let mut values = Vec::new();
    for x in postscan_x0..postscan_x1.min(raz.ncols()) {
        for y in 0..raz.nrows() {
            values.push(raz[[y, x]]);
        }
    }
    let residual = resistant_mean(&values, 7.5, 10).mean;
    raz.mapv_inplace(|v| v - residual);
    residual
}

/// Step 1 diagnostic-only companion: measure (without subtracting) the
/// pre-scan residual, using the same resistant-mean recipe.
pub fn measure_prescan_residual(raz: &Array2<f64>, prescan_x0: usize, prescan_x1: usize) -> f64 {
    let mut values = Vec::new();
    for x in prescan_x0..prescan_x1.min(raz.ncols()) {
        for y in 0..raz.nrows() {
            values.push(raz[[y, x]]);
        }
    }
    resistant_mean(&values, 7.5, 10).mean
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Step 2: read-noise smoothing (`raz -> rsz`, §4.9). Skipped (returns a
/// clone of `raz`) when `rn < 0.1`. Iterates up to 100 times, stopping
/// early once the RMS of `raz - rsz` exceeds `rn`.
pub fn smooth_read_noise(raz: &Array2<f64>, rn: f64, options: &CteOptions) -> Array2<f64> {
    if rn < 0.1 {
        return raz.clone();
    }
    let (nrows, ncols) = raz.dim();
    let mut rsz = raz.clone();

    for _iteration in 0..100 {
        let mut next = rsz.clone();
        for r in 1..nrows.saturating_sub(1) {
            for c in 1..ncols.saturating_sub(1) {
                let dval0 = raz[[r, c]] - rsz[[r, c]];
                let mut local_sum = 0.0;
                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        let rr = (r as i64 + dr) as usize;
                        let cc = (c as i64 + dc) as usize;
                        local_sum += raz[[rr, cc]] - rsz[[rr, cc]];
                    }
                }
                let dval9 = local_sum / 9.0;
                let dmod1 = rsz[[r - 1, c]] - rsz[[r, c]];
                let dmod2 = rsz[[r + 1, c]] - rsz[[r, c]];

                let rn2 = rn * rn;
                let w0 = dval0 * dval0 / (dval0 * dval0 + 4.0 * rn2);
                let w9 = dval9 * dval9 / (dval9 * dval9 + 18.0 * rn2);
                let w1 = 4.0 * rn2 / (dmod1 * dmod1 + 4.0 * rn2);
                let w2 = 4.0 * rn2 / (dmod2 * dmod2 + 4.0 * rn2);

                let d = 0.25
                    * (clamp(dval0, -1.0, 1.0) * w0
                        + clamp(dval9, -rn / 3.0, rn / 3.0) * w9
                        + clamp(dmod1, -rn / 3.0, rn / 3.0) * w1
                        + clamp(dmod2, -rn / 3.0, rn / 3.0) * w2);

                next[[r, c]] = rsz[[r, c]] + 0.75 * d;
            }
        }
        rsz = next;

        let rms = rms_of_residual(raz, &rsz, options);
        if rms > rn {
            break;
        }
    }
    rsz
}

/// The RMS of `raz - rsz`, computed with a `rayon` fold/reduce (§5,
/// §9 design notes) rather than a hand-rolled mutex-guarded accumulator.
fn rms_of_residual(raz: &Array2<f64>, rsz: &Array2<f64>, options: &CteOptions) -> f64 {
    let diffs: Vec<f64> = raz.iter().zip(rsz.iter()).map(|(&a, &b)| a - b).collect();
    let (sum_sq, count) = if options.single_threaded || cfg!(feature = "single-threaded") {
        diffs.iter().fold((0.0_f64, 0usize), |(s, n), &d| (s + d * d, n + 1))
    } else {
        use rayon::prelude::*;
        diffs
            .par_iter()
            .fold(|| (0.0_f64, 0usize), |(s, n), &d| (s + d * d, n + 1))
            .reduce(|| (0.0, 0), |(s1, n1), (s2, n2)| (s1 + s2, n1 + n2))
    };
    if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt()
    }
}

/// Step 3: the per-column CTE-scale map (§4.9). For each column, linearly
/// interpolate its four `SCLBYCOL` anchors by row, then attenuate by
/// `(row+1)/2048`.
pub fn build_scale_map(col_scales: &[ColumnScale], nrows: usize) -> Array2<f64> {
    let ncols = col_scales.len();
    let mut fff = Array2::zeros((nrows, ncols));
    for (c, scale) in col_scales.iter().enumerate() {
        for r in 0..nrows {
            let row = (r + 1) as f64;
            let interp = scale.interpolate(row);
            fff[[r, c]] = interp * (row / 2048.0);
        }
    }
    fff
}

/// The read-out simulation (`sim_readout`, §4.9): walk a column in
/// readout direction (increasing index), filling/emitting traps as the
/// charge packet crosses each trap's `qlevq`.
///
/// Mirrors `sim_colreadout_l` (original_source `wf3cte.c`): a trap only
/// emits (`padd2`/`padd3`) while it is still "warm" (`ttrap < trail_len`),
/// and `ttrap` is incremented *before* it is used to index the `rprof`/
/// `cprof` trail-shape tables, not after. The capture term `prem3` is
/// scaled by `n_par` because this function runs once per inner
/// (`PCTENPAR`) iteration, and the reference trap population is defined
/// per full parallel transfer.
pub fn sim_readout(
    column: &[f64],
    fff_col: &[f64],
    active_traps: &[Trap],
    profiles: &TrailProfiles,
    trail_len: usize,
    n_par: usize,
) -> Vec<f64> {
    let n = column.len();
    let n_par = n_par.max(1) as f64;
    let mut out = vec![0.0; n];
    let mut ftrap = vec![0.0_f64; active_traps.len()];
    let mut ttrap = vec![trail_len; active_traps.len()];
    let mut fcarry = 0.0_f64;

    for j in 0..n {
        let raw = column[j] + fcarry;
        let mut pix = raw.floor();
        fcarry = raw - pix;

        for (ti, trap) in active_traps.iter().enumerate() {
            let live = ttrap[ti] < trail_len || pix >= trap.qlevq - 1.0;
            if !live {
                continue;
            }
            if j > 0 && fff_col[j] < fff_col[j - 1] && fff_col[j - 1] > 0.0 {
                ftrap[ti] *= fff_col[j] / fff_col[j - 1];
            }
            let mut padd2 = 0.0;
            if ttrap[ti] < trail_len {
                ttrap[ti] += 1;
                padd2 = profiles.rprof_at(trap.w, ttrap[ti]) * ftrap[ti];
            }
            let mut padd3 = 0.0;
            let mut prem3 = 0.0;
            if pix >= trap.qlevq {
                prem3 = (trap.dpdew / n_par) * fff_col[j];
                if ttrap[ti] < trail_len {
                    padd3 = profiles.cprof_at(trap.w, ttrap[ti]) * ftrap[ti];
                }
                ttrap[ti] = 0;
                ftrap[ti] = prem3;
            }
            pix += padd2 + padd3 - prem3;
        }
        out[j] = pix;
    }
    out
}

/// Scan `pix_modl` for a readout-CR signature (§4.9): two or three
/// consecutive pixels dropping below `threshold`. Walks back up to 10
/// pixels to find the peak (least-negative) residual, returning the
/// `[jmax, j]` range to down-weight.
fn detect_readout_cr(pix_modl: &[f64], threshold: f64) -> Option<(usize, usize)> {
    for j in 1..pix_modl.len() {
        let run_is_low = pix_modl[j] < threshold && pix_modl[j - 1] < threshold;
        if run_is_low {
            let start = j.saturating_sub(10);
            let jmax = (start..=j)
                .max_by(|&a, &b| pix_modl[a].partial_cmp(&pix_modl[b]).unwrap())
                .unwrap_or(start);
            return Some((jmax, j));
        }
    }
    None
}

/// The per-column inverse model (§4.9 step 4): up to 5 readout-CR retries,
/// each running `pctenfor` outer inverse iterations of `pctenpar` inner
/// `sim_readout` passes, with damping on all but the last outer iteration.
pub fn inverse_model_column(
    observed: &[f64],
    fff_col: &[f64],
    traps: &TrapTable,
    profiles: &TrailProfiles,
    params: &CteParams,
) -> Vec<f64> {
    let max_charge = observed.iter().cloned().fold(f64::MIN, f64::max);
    let active = traps.active_for_column(max_charge);
    let mut fff_col = fff_col.to_vec();
    let n_forward = params.pctenfor.max(1);
    let n_par = params.pctenpar.max(1);

    let mut pix_modl = observed.to_vec();
    for _redo in 0..5 {
        pix_modl = observed.to_vec();
        let mut pix_read = pix_modl.clone();

        for nitinv in 1..=n_forward {
            let mut pix_curr = pix_modl.clone();
            for _nitcte in 1..=n_par {
                pix_curr = sim_readout(
                    &pix_curr,
                    &fff_col,
                    &active,
                    profiles,
                    params.pctetlen,
                    n_par,
                );
            }
            pix_read = pix_curr;

            let mut dmod: Vec<f64> = observed
                .iter()
                .zip(pix_read.iter())
                .map(|(&o, &r)| o - r)
                .collect();
            if nitinv < n_forward {
                for d in dmod.iter_mut() {
                    *d = *d * (*d * *d) / (*d * *d + 3.25 * 3.25);
                }
            }
            for (m, d) in pix_modl.iter_mut().zip(dmod.iter()) {
                *m += d;
            }
        }

        if params.fixrocr {
            if let Some((jmax, j)) = detect_readout_cr(&pix_modl, params.pctetrsh) {
                for k in jmax..=j.min(fff_col.len() - 1) {
                    fff_col[k] *= 0.75;
                }
                continue;
            }
        }
        break;
    }
    pix_modl
}

/// Step 4 in full: run `inverse_model_column` over every column, in
/// parallel unless `options.single_threaded` (or the `single-threaded`
/// crate feature) is set (§5).
pub fn inverse_forward_model(
    rsz: &Array2<f64>,
    fff: &Array2<f64>,
    traps: &TrapTable,
    profiles: &TrailProfiles,
    params: &CteParams,
    options: &CteOptions,
) -> Array2<f64> {
    let (nrows, ncols) = rsz.dim();
    let column_data: Vec<(Vec<f64>, Vec<f64>)> = (0..ncols)
        .map(|c| {
            let observed: Vec<f64> = (0..nrows).map(|r| rsz[[r, c]]).collect();
            let fff_col: Vec<f64> = (0..nrows).map(|r| fff[[r, c]]).collect();
            (observed, fff_col)
        })
        .collect();

    let results: Vec<Vec<f64>> = if options.single_threaded || cfg!(feature = "single-threaded") {
        column_data
            .iter()
            .map(|(observed, fff_col)| inverse_model_column(observed, fff_col, traps, profiles, params))
            .collect()
    } else {
        use rayon::prelude::*;
        column_data
            .par_iter()
            .map(|(observed, fff_col)| inverse_model_column(observed, fff_col, traps, profiles, params))
            .collect()
    };

    let mut rsc = Array2::zeros((nrows, ncols));
    for (c, col) in results.into_iter().enumerate() {
        for (r, v) in col.into_iter().enumerate() {
            rsc[[r, c]] = v;
        }
    }
    rsc
}

/// Step 5: reassemble, `final = raz + (rsc - rsz) / gain` (§4.9).
pub fn reassemble(raz: &Array2<f64>, rsc: &Array2<f64>, rsz: &Array2<f64>, gain: f64) -> Array2<f64> {
    let mut out = raz.clone();
    ndarray::Zip::from(&mut out)
        .and(rsc)
        .and(rsz)
        .for_each(|o, &c, &z| {
            *o += (c - z) / gain;
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_profiles(n_traps: usize, trail_len: usize) -> TrailProfiles {
        TrailProfiles {
            rprof: Array2::from_elem((n_traps.max(1), trail_len + 1), 0.1),
            cprof: Array2::from_elem((n_traps.max(1), trail_len + 1), 0.05),
        }
    }

    #[test]
    fn gain_conversion_scales_and_residual_is_subtracted() {
        let mut raz = Array2::from_elem((4, 10), 100.0);
        let residual = gain_convert_and_subtract_residual(&mut raz, 2.0, 8, 10);
        assert!((residual - 200.0).abs() < 1e-6);
        assert!(raz.iter().all(|&v| v.abs() < 1e-6));
    }

    #[test]
    fn zero_traps_leaves_sim_readout_near_identity() {
        let column = vec![100.0; 50];
        let fff_col = vec![1.0; 50];
        let profiles = flat_profiles(1, 60);
        let out = sim_readout(&column, &fff_col, &[], &profiles, 60, 1);
        for (a, b) in column.iter().zip(out.iter()) {
            assert!((a - b).abs() < 1.0);
        }
    }

    #[test]
    fn cte_identity_with_zero_forward_iterations_matches_observed() {
        let observed = vec![100.0; 20];
        let fff_col = vec![1.0; 20];
        let traps = TrapTable { traps: vec![] };
        let profiles = flat_profiles(1, 60);
        let params = CteParams {
            cte_name: "X".into(),
            cte_ver: "1".into(),
            ctedate0: 0.0,
            ctedate1: 0.0,
            pctetlen: 60,
            pcternoi: 2.5,
            pctenfor: 0,
            pctenpar: 0,
            pctensmd: 0,
            pctetrsh: -1e9,
            fixrocr: false,
        };
        let modelled = inverse_model_column(&observed, &fff_col, &traps, &profiles, &params);
        for (o, m) in observed.iter().zip(modelled.iter()) {
            assert!((o - m).abs() < 1e-6);
        }
    }

    #[test]
    fn reassemble_adds_scaled_residual() {
        let raz = Array2::from_elem((1, 1), 1000.0);
        let rsc = Array2::from_elem((1, 1), 110.0);
        let rsz = Array2::from_elem((1, 1), 100.0);
        let out = reassemble(&raz, &rsc, &rsz, 2.0);
        assert!((out[[0, 0]] - 1005.0).abs() < 1e-9);
    }

    #[test]
    fn smooth_read_noise_skips_below_threshold() {
        let raz = Array2::from_elem((5, 5), 42.0);
        let rsz = smooth_read_noise(&raz, 0.05, &CteOptions::default());
        assert_eq!(rsz, raz);
    }

    #[test]
    fn column_scale_map_attenuates_toward_the_readout_register() {
        let scales = vec![ColumnScale {
            at_512: 1.0,
            at_1024: 1.0,
            at_1536: 1.0,
            at_2048: 1.0,
        }];
        let fff = build_scale_map(&scales, 2048);
        assert!(fff[[0, 0]] < fff[[2047, 0]]);
    }
}
