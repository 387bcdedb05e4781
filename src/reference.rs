// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Reference-artifact bookkeeping: pedigree, file-type validation, and the
 * single wildcard-aware row-selection predicate (§3, §9).
 */

use ndarray::Array2;

use crate::error::{CalError, CalResult};

/// A reference artifact's pedigree string. `DUMMY*` marks it as
/// present-but-not-calibrating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pedigree(pub String);

impl Pedigree {
    pub fn is_dummy(&self) -> bool {
        self.0.to_ascii_uppercase().starts_with("DUMMY")
    }
}

/// Metadata common to every reference artifact: its declared type (checked
/// against the role it was fetched for) and pedigree.
#[derive(Debug, Clone)]
pub struct ArtifactMeta {
    pub filetype: String,
    pub pedigree: Pedigree,
}

impl ArtifactMeta {
    /// Validate `self.filetype` against the tag expected for `role`
    /// (case-insensitive, matching the on-disk convention of e.g. `"BIAS"`,
    /// `"DARK"`, `"CCD PARAMETERS"`).
    pub fn check_filetype(&self, expected: &str) -> CalResult<()> {
        if self.filetype.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(CalError::CalFileMissing(format!(
                "expected FILETYPE {:?}, found {:?}",
                expected, self.filetype
            )))
        }
    }
}

/// A reference image: a 2-D array plus the shared artifact metadata.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub meta: ArtifactMeta,
    pub data: Array2<f64>,
}

/// A single selection-column value used to match against a reference-table
/// row. Each variant knows its own wildcard sentinel (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum SelectValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl SelectValue {
    /// True if this value is the "match anything" sentinel for its type:
    /// `-999`/`-1` for integers, `-999.0`/`-1.0` for floats, `"ANY"` (or the
    /// integer-style sentinel `"-999"`) for strings. `"N/A"` is an "ignore"
    /// marker, also treated as a wildcard by the match predicate (the
    /// column is simply not discriminating for this row).
    fn is_wildcard(&self) -> bool {
        match self {
            SelectValue::Int(v) => *v == -999 || *v == -1,
            SelectValue::Float(v) => *v == -999.0 || *v == -1.0,
            SelectValue::Str(s) => {
                let up = s.to_ascii_uppercase();
                up == "ANY" || up == "N/A" || up == "-999"
            }
        }
    }

    /// Whether `self` (a table-row column) matches `exposure_value` (the
    /// exposure's corresponding value), per the single "match predicate"
    /// design note (§9): every non-wildcard column must equal the
    /// exposure's value; wildcards and absent columns always match.
    fn matches(&self, exposure_value: &SelectValue) -> bool {
        if self.is_wildcard() {
            return true;
        }
        match (self, exposure_value) {
            (SelectValue::Int(a), SelectValue::Int(b)) => a == b,
            (SelectValue::Float(a), SelectValue::Float(b)) => a == b,
            (SelectValue::Str(a), SelectValue::Str(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

/// A reference-table row's selection columns, as an ordered list of
/// `(column name, value)` pairs. Absent columns are treated as wildcards.
#[derive(Debug, Clone, Default)]
pub struct SelectionRow(pub Vec<(String, SelectValue)>);

impl SelectionRow {
    /// True if every column present in this row matches the corresponding
    /// column in `exposure`. A column named in `exposure` but absent from
    /// `self` is treated as a wildcard match (§3: "if a column is absent
    /// from the table, treat it as a wildcard match").
    pub fn matches(&self, exposure: &SelectionRow) -> bool {
        self.0.iter().all(|(name, value)| {
            match exposure.0.iter().find(|(n, _)| n == name) {
                Some((_, exp_value)) => value.matches(exp_value),
                None => true,
            }
        })
    }
}

/// Select the unique row of `rows` matching `exposure`. If more than one
/// row matches, the first in table order wins (tables are expected to be
/// unambiguous after wildcard resolution; ties are a data-authoring
/// concern, not this function's).
pub fn select_row<'a>(
    rows: &'a [SelectionRow],
    exposure: &SelectionRow,
) -> CalResult<&'a SelectionRow> {
    rows.iter()
        .find(|row| row.matches(exposure))
        .ok_or_else(|| CalError::RowNotFound("no reference-table row matched selection".into()))
}

/// One row of the bad-pixel table (§4.3): OR `value` into a run of `length`
/// pixels starting at `(pix1-1, pix2-1)` along `axis`.
#[derive(Debug, Clone, Copy)]
pub struct BadPixelRow {
    pub pix1: u32,
    pub pix2: u32,
    pub length: u32,
    pub axis: Axis,
    pub value: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 1,
    Y = 2,
}
