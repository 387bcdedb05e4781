// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * A/D correction (C4): replace a raw integer DN with a table-looked-up
 * corrected value.
 */

use crate::dq::SATPIXEL;
use crate::error::{CalError, CalResult};
use crate::image::ImageTriplet;

/// One selected row of the A/D table: the `atod[]` lookup array plus the
/// keyword value it was matched on (for the "closest absolute value" tie
/// break, §4.4).
#[derive(Debug, Clone)]
pub struct AtodTable {
    pub atod: Vec<f64>,
}

impl AtodTable {
    /// Among `candidates` (rows already filtered to `ccdamp == amp &&
    /// ccdgain == gain`), pick the one whose `keyword_value` is closest in
    /// absolute value to `header_value`.
    pub fn select_closest<'a>(
        candidates: &'a [(f64, AtodTable)],
        header_value: f64,
    ) -> CalResult<&'a AtodTable> {
        candidates
            .iter()
            .min_by(|(a, _), (b, _)| {
                (a - header_value)
                    .abs()
                    .partial_cmp(&(b - header_value).abs())
                    .unwrap()
            })
            .map(|(_, t)| t)
            .ok_or_else(|| CalError::RowNotFound("no A/D table row matched amp/gain".into()))
    }
}

/// Apply the A/D lookup in place (§4.4). Requires `NCOMBINE == 1` (A/D must
/// be applied exactly once before any other arithmetic).
pub fn apply_atod(image: &mut ImageTriplet, table: &AtodTable, ncombine: u32) -> CalResult<()> {
    if ncombine > 1 {
        return Err(CalError::Generic(
            "A/D correction requires NCOMBINE == 1".to_string(),
        ));
    }
    let nelem = table.atod.len();
    ndarray::Zip::from(&mut image.sci)
        .and(&mut image.dq)
        .for_each(|s, dqv| {
            let v = *s;
            if v < 0.0 {
                return;
            }
            let idx = v.round() as i64;
            if idx as usize >= nelem {
                *s = table.atod[nelem - 1];
                *dqv |= SATPIXEL;
            } else {
                *s = table.atod[idx as usize];
            }
        });
    Ok(())
}
