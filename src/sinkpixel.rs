// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Sink-pixel flagging (C8): propagate a trap DQ flag along the read-out
 * direction from a per-pixel "turn-on MJD" reference map.
 *
 * Operates in RAZ coordinates (`raz::raz`/`undo_raz`); the caller is
 * responsible for reordering the science image and the reference map
 * into RAZ layout before calling `flag_sink_pixels`, and for undoing it
 * afterwards.
 */

use ndarray::Array2;

use crate::dq::TRAP;

/// Flag `TRAP` into `dq` wherever the reference map's per-pixel turn-on
/// MJD (`sink_map`) precedes `exp_start_mjd`, then walk upstream (§4.8):
///
/// 1. The turned-on pixel itself is flagged.
/// 2. If the immediately downstream pixel (row-1) carries a negative
///    marker, it is flagged too (the one-pixel tail).
/// 3. Walking upstream (row+1, row+2, ...) while the reference value is
///    in `(0, 1000)` and the science intensity at that row is `<=` the
///    reference intensity there, flag `TRAP`; stop at the first failure
///    or at a reference value of exactly `0`.
///
/// `sink_map` values `> 50000` are real turn-on MJDs; `-1` marks the
/// one-pixel downstream tail; `0` means inert.
pub fn flag_sink_pixels(sci: &Array2<f64>, sink_map: &Array2<f64>, dq: &mut Array2<u16>, exp_start_mjd: f64) {
    let (ny, nx) = sink_map.dim();
    for x in 0..nx {
        for y in 0..ny {
            let turn_on = sink_map[[y, x]];
            if turn_on <= 50000.0 || turn_on >= exp_start_mjd {
                continue;
            }
            dq[[y, x]] |= TRAP;

            if y > 0 && sink_map[[y - 1, x]] < 0.0 {
                dq[[y - 1, x]] |= TRAP;
            }

            let mut row = y + 1;
            while row < ny {
                let ref_val = sink_map[[row, x]];
                if ref_val <= 0.0 || ref_val >= 1000.0 {
                    break;
                }
                if sci[[row, x]] > ref_val {
                    break;
                }
                dq[[row, x]] |= TRAP;
                row += 1;
            }
        }
    }
}
