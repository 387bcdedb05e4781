// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Reference-pixel and region geometry (C2): per-amplifier rectangles and
 * the exposure metadata record they're derived from.
 */

use crate::error::{CalError, CalResult};

/// Detector kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    UvisCcd,
    Ir,
}

/// One of the (up to four) amplifiers reading out a CCD chip, in canonical
/// order. Corner-anchored per §4.2: A -> (0,1), B -> (1,1), C -> (0,0),
/// D -> (1,0) in (xhalf, yhalf) grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Amp {
    A,
    B,
    C,
    D,
}

impl Amp {
    pub fn from_char(c: char) -> Option<Amp> {
        match c {
            'A' => Some(Amp::A),
            'B' => Some(Amp::B),
            'C' => Some(Amp::C),
            'D' => Some(Amp::D),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Amp::A => 'A',
            Amp::B => 'B',
            Amp::C => 'C',
            Amp::D => 'D',
        }
    }

    /// `(xhalf, yhalf)` grid quadrant this amp occupies, each in `{0, 1}`.
    pub fn quadrant(self) -> (usize, usize) {
        match self {
            Amp::A => (0, 1),
            Amp::B => (1, 1),
            Amp::C => (0, 0),
            Amp::D => (1, 0),
        }
    }

    /// Parse the active-amplifier string (a subset of "ABCD") into amps, in
    /// canonical order regardless of input order.
    pub fn parse_active(s: &str) -> Vec<Amp> {
        let mut amps: Vec<Amp> = s.chars().filter_map(Amp::from_char).collect();
        amps.sort();
        amps.dedup();
        amps
    }
}

/// An axis-aligned pixel rectangle, half-open: `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl Rect {
    pub fn new(x0: usize, x1: usize, y0: usize, y1: usize) -> Self {
        Rect { x0, x1, y0, y1 }
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Clip this rectangle to `[0, nx) x [0, ny)`.
    pub fn clip(&self, nx: usize, ny: usize) -> Rect {
        Rect {
            x0: self.x0.min(nx),
            x1: self.x1.min(nx),
            y0: self.y0.min(ny),
            y1: self.y1.min(ny),
        }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

/// The geometry computed for one amp: the science rectangle and the
/// associated overscan rectangles (§4.2, §4.5 vocabulary).
#[derive(Debug, Clone, Default)]
pub struct AmpGeometry {
    pub science: Option<Rect>,
    /// Leading and trailing serial-physical overscan (image-edge columns).
    pub serial_physical: Vec<Rect>,
    /// Serial-virtual overscan: columns between two amps on the same chip.
    pub serial_virtual: Vec<Rect>,
    /// Parallel-virtual overscan: rows past the last illuminated row.
    pub parallel_virtual: Option<Rect>,
}

/// Read-only per-exposure record (§3). Immutable to downstream components
/// with one exception: overscan-fit results (C5) update `measured_bias`.
#[derive(Debug, Clone)]
pub struct ExposureInfo {
    pub detector: Detector,
    pub chip: u8,
    pub gain_commanded: f64,
    /// Commanded bias offset per amp, indexed by `Amp as usize` via `amp_index`.
    pub bias_offset: [f64; 4],
    pub binning: (u8, u8),
    pub active_amps: Vec<Amp>,
    pub aperture: String,
    pub filter: String,
    pub samp_seq: String,
    pub subarray: bool,
    pub exp_start_mjd: f64,
    pub exp_end_mjd: f64,
    pub exptime: f64,
    pub flashdur: f64,
    pub flashstatus: String,
    pub nsamp: usize,
    /// Calibrated per-amp gain (electrons/DN).
    pub gain_amp: [f64; 4],
    /// Read noise per amp (electrons).
    pub read_noise_amp: [f64; 4],
    /// Measured bias level per amp, filled in by C5.
    pub measured_bias: [f64; 4],
    pub mean_gain: f64,
    /// Widths of the four trim regions removed from each row, in image
    /// pixels: leading physical, trailing physical, and (for 4-amp
    /// readouts) the two serial-virtual gaps either side of center.
    pub trimx: [usize; 4],
    /// Heights trimmed from the bottom/top of each column.
    pub trimy: [usize; 2],
    /// Leading and trailing serial overscan column rectangles.
    pub biassect: [Option<Rect>; 2],
    /// Parallel-virtual overscan rectangle (may be split per amp by the
    /// caller using `ampx`/`ampy`).
    pub vx_vy: Option<Rect>,
    /// Column/row at which the first amp transitions to the next.
    pub ampx: usize,
    pub ampy: usize,
    pub saturate_threshold: f64,
    pub scalar_satflag: bool,
    pub ncombine: u32,
}

impl ExposureInfo {
    pub fn amp_index(amp: Amp) -> usize {
        match amp {
            Amp::A => 0,
            Amp::B => 1,
            Amp::C => 2,
            Amp::D => 3,
        }
    }
}

/// Compute, for every active amp, the science rectangle and overscan
/// rectangles implied by `info`'s binning/subarray/amp configuration.
///
/// Invariants enforced: science + overscan rectangles tile the detector
/// without overlap; `x1 <= nx`, `y1 <= ny`; for 4-amp readouts the
/// serial-virtual gap is excluded from the science region.
pub fn compute_geometry(
    info: &ExposureInfo,
    nx: usize,
    ny: usize,
) -> CalResult<std::collections::BTreeMap<Amp, AmpGeometry>> {
    if info.active_amps.is_empty() {
        return Err(CalError::KeywordMissing("CCDAMP".to_string()));
    }
    if info.subarray && info.active_amps.len() != 1 {
        return Err(CalError::Generic(
            "subarrays must have exactly one active amp".to_string(),
        ));
    }

    let bx = info.binning.0.max(1) as usize;
    let by = info.binning.1.max(1) as usize;
    let trimx: Vec<usize> = info.trimx.iter().map(|&t| t / bx.max(1)).collect();
    let trimy: Vec<usize> = info.trimy.iter().map(|&t| t / by.max(1)).collect();

    let xhalf = nx / 2;
    let yhalf = ny / 2;

    let mut out = std::collections::BTreeMap::new();

    for &amp in &info.active_amps {
        let (qx, qy) = amp.quadrant();
        let mut geom = AmpGeometry::default();

        // Science region for this quadrant, trimmed of leading/trailing
        // serial overscan and parallel-virtual overscan, and (for 4-amp
        // readouts) the serial-virtual gap between amp pairs.
        let (sci_x0, sci_x1) = if info.subarray {
            (
                trimx.get(0).copied().unwrap_or(0),
                nx.saturating_sub(trimx.get(1).copied().unwrap_or(0)),
            )
        } else if qx == 0 {
            (
                trimx.get(0).copied().unwrap_or(0),
                xhalf.saturating_sub(trimx.get(2).copied().unwrap_or(0) / 2),
            )
        } else {
            (
                xhalf + trimx.get(2).copied().unwrap_or(0) / 2,
                nx.saturating_sub(trimx.get(1).copied().unwrap_or(0)),
            )
        };
        let (sci_y0, sci_y1) = if info.subarray {
            (
                trimy.get(0).copied().unwrap_or(0),
                ny.saturating_sub(trimy.get(1).copied().unwrap_or(0)),
            )
        } else if qy == 0 {
            (0, yhalf)
        } else {
            (yhalf, ny)
        };

        let science = Rect::new(sci_x0, sci_x1, sci_y0, sci_y1).clip(nx, ny);
        if science.is_empty() {
            return Err(CalError::Generic(format!(
                "empty science region for amp {:?}",
                amp
            )));
        }
        geom.science = Some(science);

        // Leading/trailing serial physical overscan, on the outer edge of
        // this amp's quadrant only.
        if qx == 0 {
            if trimx[0] > 0 {
                geom.serial_physical
                    .push(Rect::new(0, trimx[0], sci_y0, sci_y1).clip(nx, ny));
            }
        } else if trimx[1] > 0 {
            geom.serial_physical
                .push(Rect::new(nx - trimx[1], nx, sci_y0, sci_y1).clip(nx, ny));
        }

        // Serial-virtual overscan: the gap between amp pairs on a 4-amp
        // (or 2-amp side-by-side) readout, excluded from both the science
        // region above and any row-wise bias fit.
        if !info.subarray && info.active_amps.len() > 1 && (trimx[2] > 0 || trimx[3] > 0) {
            let half_gap = trimx[2].max(trimx[3]) / 2;
            if half_gap > 0 {
                geom.serial_virtual.push(
                    Rect::new(xhalf - half_gap, xhalf + half_gap, sci_y0, sci_y1).clip(nx, ny),
                );
            }
        }

        // Parallel-virtual overscan: rows past the last illuminated row,
        // split per amp along the x range of this amp's quadrant.
        if let Some(vxvy) = info.vx_vy {
            let (x0, x1) = if info.subarray {
                (vxvy.x0, vxvy.x1)
            } else if qx == 0 {
                (0, xhalf)
            } else {
                (xhalf, nx)
            };
            geom.parallel_virtual = Some(Rect::new(x0, x1, vxvy.y0, vxvy.y1).clip(nx, ny));
        }

        out.insert(amp, geom);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_info(active: &str) -> ExposureInfo {
        ExposureInfo {
            detector: Detector::UvisCcd,
            chip: 1,
            gain_commanded: 1.5,
            bias_offset: [0.0; 4],
            binning: (1, 1),
            active_amps: Amp::parse_active(active),
            aperture: "WFC3-UVIS".into(),
            filter: "F606W".into(),
            samp_seq: "NONE".into(),
            subarray: false,
            exp_start_mjd: 56000.0,
            exp_end_mjd: 56000.01,
            exptime: 100.0,
            flashdur: 0.0,
            flashstatus: "NOT_PERFORMED".into(),
            nsamp: 1,
            gain_amp: [1.5; 4],
            read_noise_amp: [3.0; 4],
            measured_bias: [0.0; 4],
            mean_gain: 1.5,
            trimx: [25, 25, 0, 0],
            trimy: [0, 0],
            biassect: [None, None],
            vx_vy: None,
            ampx: 0,
            ampy: 0,
            saturate_threshold: 65535.0,
            scalar_satflag: true,
            ncombine: 1,
        }
    }

    #[test]
    fn single_amp_full_frame_tiles_without_overlap() {
        let info = base_info("A");
        let geoms = compute_geometry(&info, 2172, 2068).unwrap();
        let g = &geoms[&Amp::A];
        let sci = g.science.unwrap();
        assert!(sci.x1 <= 2172);
        assert!(sci.y1 <= 2068);
        for r in &g.serial_physical {
            assert!(!r.overlaps(&sci));
        }
    }

    #[test]
    fn four_amp_readout_excludes_serial_virtual_gap_from_science() {
        let mut info = base_info("ABCD");
        info.trimx = [25, 25, 60, 60];
        let geoms = compute_geometry(&info, 4246, 2068).unwrap();
        for (_amp, g) in &geoms {
            let sci = g.science.unwrap();
            for gap in &g.serial_virtual {
                assert!(!gap.overlaps(&sci));
            }
        }
    }

    #[test]
    fn subarray_requires_single_amp() {
        let mut info = base_info("AB");
        info.subarray = true;
        let err = compute_geometry(&info, 100, 100).unwrap_err();
        matches!(err, CalError::Generic(_));
    }

    #[test]
    fn binning_scales_trims_inversely() {
        let mut info = base_info("A");
        info.binning = (2, 2);
        let geoms = compute_geometry(&info, 1086, 1034).unwrap();
        let sci = geoms[&Amp::A].science.unwrap();
        // trimx[0]=25 unbinned -> 12 binned.
        assert_eq!(sci.x0, 12);
    }
}
