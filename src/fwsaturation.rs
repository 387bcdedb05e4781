// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Full-well saturation flagging by reference image (C7): a per-pixel
 * electron threshold, converted to DN by the mean gain, with the
 * subarray/serial-virtual-overscan-gap bookkeeping of §4.7.
 *
 * This deliberately does *not* flag overscan pixels -- that remains the
 * scalar path's job (`dqinit::flag_scalar_saturation`), per the §9 open
 * question that both behaviors are required.
 */

use crate::dq::SATPIXEL;
use crate::error::{CalError, CalResult};
use crate::image::ImageTriplet;
use crate::reference::ReferenceImage;

/// How a subarray's science columns map onto the full-frame saturation
/// map's columns (§4.7).
#[derive(Debug, Clone, Copy)]
pub enum ColumnMap {
    /// The subarray lies entirely before the amp-crossover gap: direct
    /// 1:1 mapping.
    Direct,
    /// The subarray starts beyond the gap: shift every column by
    /// `-size_sv_overscan`.
    ShiftedPast { size_sv_overscan: usize },
    /// The subarray straddles the gap: columns `< end_pix_ac_amp` map
    /// directly, columns `>= end_pix_ac_amp + size_sv_overscan` shift by
    /// `-size_sv_overscan`, and the gap itself (if it appears in the
    /// subarray) is skipped.
    Straddling {
        end_pix_ac_amp: usize,
        size_sv_overscan: usize,
    },
}

impl ColumnMap {
    /// Map a science-image column to the corresponding saturation-map
    /// column, or `None` if it falls in the excluded serial-virtual gap.
    fn map(&self, col: usize) -> Option<usize> {
        match *self {
            ColumnMap::Direct => Some(col),
            ColumnMap::ShiftedPast { size_sv_overscan } => Some(col + size_sv_overscan),
            ColumnMap::Straddling {
                end_pix_ac_amp,
                size_sv_overscan,
            } => {
                if col < end_pix_ac_amp {
                    Some(col)
                } else {
                    Some(col + size_sv_overscan)
                }
            }
        }
    }
}

/// Flag pixels whose science value (still in DN) exceeds the saturation
/// map's per-pixel electron threshold divided by `mean_gain` (§4.7). Only
/// the rectangle `[y0,y1) x [x0,x1)` of the science image is scanned,
/// which the caller derives per-amp from the region geometry (C2); the
/// `column_map` translates science columns into saturation-map columns.
pub fn flag_image_saturation(
    image: &mut ImageTriplet,
    sat_map: &ReferenceImage,
    mean_gain: f64,
    y0: usize,
    y1: usize,
    x0: usize,
    x1: usize,
    column_map: &ColumnMap,
) -> CalResult<()> {
    if mean_gain <= 0.0 {
        return Err(CalError::Generic("mean_gain must be positive".to_string()));
    }
    let (map_ny, map_nx) = sat_map.data.dim();
    for y in y0..y1.min(image.ny()) {
        for x in x0..x1.min(image.nx()) {
            let Some(mx) = column_map.map(x) else {
                continue;
            };
            if y >= map_ny || mx >= map_nx {
                continue;
            }
            let threshold_dn = sat_map.data[[y, mx]] / mean_gain;
            if image.sci[[y, x]] > threshold_dn {
                image.dq[[y, x]] |= SATPIXEL;
            }
        }
    }
    Ok(())
}
