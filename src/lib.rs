// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The CORE calibration pipeline: deterministic, reproducible per-pixel
 * transformations turning raw CCD/IR detector readouts into calibrated,
 * uncertainty-bearing, flag-bearing 2-D images.
 *
 * Module layout mirrors the component table: `image`/`geometry`/`dq` are
 * the shared data model (C1-C2), `dqinit`/`atod`/`overscan`/`corrections`/
 * `fwsaturation`/`sinkpixel` are the CCD calibration steps (C3-C8),
 * `cte` is the CTE forward/inverse model (C9), `multiaccum` is the IR
 * MultiAccum path (C10), and `photometry` materializes photometric
 * keywords (C11).
 */

pub mod atod;
pub mod config;
pub mod corrections;
pub mod cte;
pub mod dq;
pub mod dqinit;
pub mod error;
pub mod fwsaturation;
pub mod geometry;
pub mod image;
pub mod multiaccum;
pub mod overscan;
pub mod photometry;
pub mod raz;
pub mod reference;
pub mod sinkpixel;
pub mod stats;
pub mod switches;
pub mod trailer;
