// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Photometry keyword materialization (C11, §4.11): map an observation
 * mode to a photometry-table row and derive the scalar keywords the
 * header-materialization collaborator writes out.
 */

use crate::error::{CalError, CalResult};
use crate::reference::{ArtifactMeta, Pedigree, SelectionRow};
use crate::switches::{CalSwitches, Status, Step};

/// The fixed AB/ST zero-point the reference pipeline writes
/// unconditionally once any photometry row is resolved (§4.11, DESIGN.md
/// open question).
pub const PHOTZPT: f64 = -21.10;

/// One resolved row of the photometry table.
#[derive(Debug, Clone, Copy)]
pub struct PhotometryRow {
    pub photflam: f64,
    pub photplam: f64,
    pub photbw: f64,
    pub photfnu: f64,
}

/// One photometry-table row plus its selection columns and pedigree, as
/// the table is held in memory.
#[derive(Debug, Clone)]
pub struct PhotometryTableRow {
    pub selection: SelectionRow,
    pub meta: ArtifactMeta,
    pub row: PhotometryRow,
}

/// The materialized photometry keywords for a one-chip detector, or the
/// per-chip pair for a two-chip detector.
#[derive(Debug, Clone, Copy)]
pub struct PhotometryKeywords {
    pub photflam: f64,
    pub photzpt: f64,
    pub photplam: f64,
    pub photbw: f64,
    pub photfnu: f64,
}

/// Resolve the photometry row for a single-chip observation mode (§4.11).
/// `DUMMY*` pedigree degrades `Photcorr` to `Skipped` and returns `Ok(None)`
/// rather than writing any keywords; a genuinely missing row is
/// `ROW_NOT_FOUND`.
fn lookup_row<'a>(
    table: &'a [PhotometryTableRow],
    mode: &SelectionRow,
) -> CalResult<&'a PhotometryTableRow> {
    table
        .iter()
        .find(|row| row.selection.matches(mode))
        .ok_or_else(|| CalError::RowNotFound("no photometry-table row matched observation mode".into()))
}

/// Resolve a single chip's row without touching `switches`' completion
/// state, so a two-chip caller can check both chips' pedigree before
/// deciding whether the step as a whole completes (§4.11).
fn resolve_row(
    table: &[PhotometryTableRow],
    mode: &SelectionRow,
) -> CalResult<Option<PhotometryKeywords>> {
    let selected = lookup_row(table, mode)?;
    if selected.meta.pedigree.is_dummy() {
        return Ok(None);
    }
    Ok(Some(PhotometryKeywords {
        photflam: selected.row.photflam,
        photzpt: PHOTZPT,
        photplam: selected.row.photplam,
        photbw: selected.row.photbw,
        photfnu: selected.row.photfnu,
    }))
}

/// Resolve the photometry row for a single-chip observation mode and
/// complete (or skip) `Step::Photcorr` accordingly.
pub fn resolve_photometry(
    table: &[PhotometryTableRow],
    mode: &SelectionRow,
    switches: &mut CalSwitches,
) -> CalResult<Option<PhotometryKeywords>> {
    let selected = lookup_row(table, mode)?;
    if !switches.gate_on_pedigree(Step::Photcorr, &selected.meta.pedigree) {
        return Ok(None);
    }
    switches.complete(Step::Photcorr);

    Ok(Some(PhotometryKeywords {
        photflam: selected.row.photflam,
        photzpt: PHOTZPT,
        photplam: selected.row.photplam,
        photbw: selected.row.photbw,
        photfnu: selected.row.photfnu,
    }))
}

/// The two-chip variant (§4.11): resolve once per chip, returning
/// `PHTFLAM1`/`PHTFLAM2` and their ratio `PHTRATIO = PHTFLAM2 / PHTFLAM1`.
/// Which chip's value becomes the primary `PHOTFLAM` is left to the
/// header-materialization collaborator; this returns both.
#[derive(Debug, Clone, Copy)]
pub struct TwoChipPhotometry {
    pub chip1: PhotometryKeywords,
    pub chip2: PhotometryKeywords,
    pub phtflam1: f64,
    pub phtflam2: f64,
    pub phtratio: f64,
}

pub fn resolve_two_chip_photometry(
    table: &[PhotometryTableRow],
    mode_chip1: &SelectionRow,
    mode_chip2: &SelectionRow,
    switches: &mut CalSwitches,
) -> CalResult<Option<TwoChipPhotometry>> {
    let chip1 = resolve_row(table, mode_chip1)?;
    let chip2 = resolve_row(table, mode_chip2)?;
    let (chip1, chip2) = match (chip1, chip2) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            switches.skip(Step::Photcorr);
            return Ok(None);
        }
    };
    switches.complete(Step::Photcorr);

    let phtratio = if chip1.photflam != 0.0 {
        chip2.photflam / chip1.photflam
    } else {
        0.0
    };
    Ok(Some(TwoChipPhotometry {
        chip1,
        chip2,
        phtflam1: chip1.photflam,
        phtflam2: chip2.photflam,
        phtratio,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::SelectValue;

    fn make_row(photflam: f64, pedigree: &str) -> PhotometryTableRow {
        PhotometryTableRow {
            selection: SelectionRow(vec![("FILTER".into(), SelectValue::Str("F606W".into()))]),
            meta: ArtifactMeta {
                filetype: "IMPHTTAB".into(),
                pedigree: Pedigree(pedigree.into()),
            },
            row: PhotometryRow {
                photflam,
                photplam: 6000.0,
                photbw: 500.0,
                photfnu: 1e-20,
            },
        }
    }

    #[test]
    fn resolves_matching_row_and_writes_fixed_zeropoint() {
        let table = vec![make_row(1.5e-19, "INFLIGHT")];
        let mode = SelectionRow(vec![("FILTER".into(), SelectValue::Str("F606W".into()))]);
        let mut switches = CalSwitches::new();
        switches.set(Step::Photcorr, Status::Perform);
        let kw = resolve_photometry(&table, &mode, &mut switches).unwrap().unwrap();
        assert_eq!(kw.photflam, 1.5e-19);
        assert_eq!(kw.photzpt, PHOTZPT);
        assert_eq!(switches.status(Step::Photcorr), Status::Complete);
    }

    #[test]
    fn missing_row_is_row_not_found() {
        let table = vec![make_row(1.0, "INFLIGHT")];
        let mode = SelectionRow(vec![("FILTER".into(), SelectValue::Str("F850LP".into()))]);
        let mut switches = CalSwitches::new();
        let err = resolve_photometry(&table, &mode, &mut switches).unwrap_err();
        assert_eq!(err.code(), 144);
    }

    #[test]
    fn dummy_pedigree_skips_without_writing_keywords() {
        let table = vec![make_row(1.0, "DUMMY")];
        let mode = SelectionRow(vec![("FILTER".into(), SelectValue::Str("F606W".into()))]);
        let mut switches = CalSwitches::new();
        switches.set(Step::Photcorr, Status::Perform);
        let result = resolve_photometry(&table, &mode, &mut switches).unwrap();
        assert!(result.is_none());
        assert_eq!(switches.status(Step::Photcorr), Status::Skipped);
    }

    #[test]
    fn two_chip_ratio_is_chip2_over_chip1() {
        let table = vec![
            PhotometryTableRow {
                selection: SelectionRow(vec![("CCDCHIP".into(), SelectValue::Int(1))]),
                meta: ArtifactMeta {
                    filetype: "IMPHTTAB".into(),
                    pedigree: Pedigree("INFLIGHT".into()),
                },
                row: PhotometryRow {
                    photflam: 2.0e-19,
                    photplam: 6000.0,
                    photbw: 500.0,
                    photfnu: 1e-20,
                },
            },
            PhotometryTableRow {
                selection: SelectionRow(vec![("CCDCHIP".into(), SelectValue::Int(2))]),
                meta: ArtifactMeta {
                    filetype: "IMPHTTAB".into(),
                    pedigree: Pedigree("INFLIGHT".into()),
                },
                row: PhotometryRow {
                    photflam: 4.0e-19,
                    photplam: 6000.0,
                    photbw: 500.0,
                    photfnu: 1e-20,
                },
            },
        ];
        let mode1 = SelectionRow(vec![("CCDCHIP".into(), SelectValue::Int(1))]);
        let mode2 = SelectionRow(vec![("CCDCHIP".into(), SelectValue::Int(2))]);
        let mut switches = CalSwitches::new();
        switches.set(Step::Photcorr, Status::Perform);
        let result = resolve_two_chip_photometry(&table, &mode1, &mode2, &mut switches)
            .unwrap()
            .unwrap();
        assert!((result.phtratio - 2.0).abs() < 1e-9);
    }
}
