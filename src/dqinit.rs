// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * DQ initialization (C3): bad-pixel table application, A/D and scalar
 * full-well saturation flagging, and saturation propagation across
 * MultiAccum reads.
 */

use crate::dq::{ATODSAT, SATPIXEL};
use crate::image::ImageTriplet;
use crate::reference::{Axis, BadPixelRow};

/// Apply every row of `rows` to `image.dq`, OR-ing `value` into a run of
/// `length` pixels starting at `(pix1-1, pix2-1)` along the row's axis.
/// Pixels outside the image are silently skipped; runs that start inside
/// and extend past the edge are clipped (§4.3).
pub fn apply_bad_pixel_table(image: &mut ImageTriplet, rows: &[BadPixelRow]) {
    let (ny, nx) = (image.ny(), image.nx());
    for row in rows {
        let x0 = row.pix1 as i64 - 1;
        let y0 = row.pix2 as i64 - 1;
        match row.axis {
            Axis::X => {
                if y0 < 0 || y0 as usize >= ny {
                    continue;
                }
                let y = y0 as usize;
                for k in 0..row.length {
                    let x = x0 + k as i64;
                    if x < 0 || x as usize >= nx {
                        continue;
                    }
                    image.dq[[y, x as usize]] |= row.value;
                }
            }
            Axis::Y => {
                if x0 < 0 || x0 as usize >= nx {
                    continue;
                }
                let x = x0 as usize;
                for k in 0..row.length {
                    let y = y0 + k as i64;
                    if y < 0 || y as usize >= ny {
                        continue;
                    }
                    image.dq[[y as usize, x]] |= row.value;
                }
            }
        }
    }
}

/// A/D saturation flagging (§4.3): any science pixel above `atod_saturate`
/// gets `ATODSAT`.
pub fn flag_atod_saturation(image: &mut ImageTriplet, atod_saturate: f64) {
    ndarray::Zip::from(&image.sci)
        .and(&mut image.dq)
        .for_each(|&s, dqv| {
            if s > atod_saturate {
                *dqv |= ATODSAT;
            }
        });
}

/// Scalar full-well saturation flagging (§4.3): any science pixel above
/// `threshold` gets `SATPIXEL`. This is the scalar-fallback path; it is
/// also the path responsible for flagging saturation in overscan regions,
/// which the image-based path (C7) deliberately does not touch (§4.7,
/// §9 open question).
pub fn flag_scalar_saturation(image: &mut ImageTriplet, threshold: f64) {
    ndarray::Zip::from(&image.sci)
        .and(&mut image.dq)
        .for_each(|&s, dqv| {
            if s > threshold {
                *dqv |= SATPIXEL;
            }
        });
}

/// Propagate `SATPIXEL` across a MultiAccum cube: if a pixel is flagged in
/// read `k`, OR it into read `k-1` too (the temporally-next-earlier read,
/// since reads are stored last-to-first -- index 0 is the final read,
/// index `nsamp-1` is the zeroth read). Load-bearing because a saturated
/// pixel's `sci` can drop back below threshold in a later (smaller index)
/// read (§4.3).
pub fn propagate_saturation(reads: &mut [ImageTriplet]) {
    for k in (1..reads.len()).rev() {
        let (left, right) = reads.split_at_mut(k);
        let earlier = left.last_mut().unwrap();
        let later = &right[0];
        ndarray::Zip::from(&mut earlier.dq)
            .and(&later.dq)
            .for_each(|prev, &cur| {
                if cur & SATPIXEL != 0 {
                    *prev |= SATPIXEL;
                }
            });
    }
}
