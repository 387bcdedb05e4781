// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Data-quality bit assignments. Fixed, part of the on-disk format (§3).
 */

use std::ops::{BitOr, BitOrAssign};

/// Soft transmission error.
pub const SOFTERR: u16 = 1;
/// Data replaced by fill value.
pub const DATAREJECT: u16 = 2;
/// Bad detector pixel / beyond aperture.
pub const BADPIXEL: u16 = 4;
/// Masked or deviant zero-read pixel.
pub const ZEROSIG: u16 = 8;
/// Hot pixel.
pub const HOTPIXEL: u16 = 16;
/// CTE tail / IR unstable pixel.
pub const UNSTABLE: u16 = 32;
/// Warm pixel.
pub const WARMPIXEL: u16 = 64;
/// Bad bias value.
pub const BADBIAS: u16 = 128;
/// Full-well saturated pixel.
pub const SATPIXEL: u16 = 256;
/// Bad flat-field value.
pub const BADFLAT: u16 = 512;
/// Charge trap / sink pixel / cosmic-ray spike.
pub const TRAP: u16 = 1024;
/// A/D saturated, or IR zero-read correction applied. The same bit also
/// carries the "calibration defect" meaning used by `div()` (§4.1) - the
/// on-disk format does not allocate CALIBDEFECT a bit of its own.
pub const ATODSAT: u16 = 2048;
pub const CALIBDEFECT: u16 = ATODSAT;
/// Pixel rejected while combining multiple images.
pub const REJECTED: u16 = 8192;
/// High curvature / crosstalk.
pub const CROSSTALK: u16 = 16384;

/// A 16-bit data-quality bitmap for a single pixel.
///
/// Combining two `DqFlags` is always OR; OR is idempotent and has `0` as its
/// identity, matching the invariants of §8.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DqFlags(pub u16);

impl DqFlags {
    pub const NONE: DqFlags = DqFlags(0);

    pub fn new(bits: u16) -> Self {
        DqFlags(bits)
    }

    pub fn contains(self, mask: u16) -> bool {
        (self.0 & mask) != 0
    }

    pub fn set(&mut self, mask: u16) {
        self.0 |= mask;
    }
}

impl BitOr for DqFlags {
    type Output = DqFlags;
    fn bitor(self, rhs: DqFlags) -> DqFlags {
        DqFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for DqFlags {
    fn bitor_assign(&mut self, rhs: DqFlags) {
        self.0 |= rhs.0;
    }
}

impl From<u16> for DqFlags {
    fn from(bits: u16) -> Self {
        DqFlags(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_is_idempotent_and_has_zero_identity() {
        let a = DqFlags::new(HOTPIXEL | SATPIXEL);
        assert_eq!(a | a, a);
        assert_eq!(a | DqFlags::NONE, a);
        assert_eq!(DqFlags::NONE | a, a);
    }

    #[test]
    fn contains_checks_any_bit_in_mask() {
        let a = DqFlags::new(HOTPIXEL);
        assert!(a.contains(HOTPIXEL));
        assert!(!a.contains(SATPIXEL));
        assert!(a.contains(HOTPIXEL | SATPIXEL));
    }
}
