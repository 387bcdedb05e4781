// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The calibration pipeline's single error type.
 *
 * The reference pipeline threads a process-global `int status` through every
 * function; this crate replaces that with an explicit `Result<T, CalError>`
 * returned from every step, while preserving the numeric exit-code contract
 * (§7 of the design) that downstream tooling keys off of.
 */

use thiserror::Error;

/// Every error a calibration step can produce, tagged with the numeric exit
/// code the reference pipeline used for the same condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalError {
    /// A required reference file (image or table) could not be found, or its
    /// `FILETYPE` did not match what the step expected.
    #[error("required reference file missing or wrong type: {0}")]
    CalFileMissing(String),

    /// No calibration step was enabled (all `OMIT`/`COMPLETE`/`DUMMY`).
    #[error("nothing to do: no calibration step is enabled")]
    NothingToDo,

    /// A mandatory header keyword was absent.
    #[error("mandatory keyword missing: {0}")]
    KeywordMissing(String),

    /// A science/reference array shape disagreement.
    #[error("size mismatch: science is {sci_nx}x{sci_ny}, reference is {ref_nx}x{ref_ny}")]
    SizeMismatch {
        sci_nx: usize,
        sci_ny: usize,
        ref_nx: usize,
        ref_ny: usize,
    },

    /// A step that requires a prerequisite step to be `COMPLETE` found it was
    /// not.
    #[error("prerequisite step not done: {0}")]
    CalStepNotDone(String),

    /// A reference-table I/O or parse error.
    #[error("reference table error: {0}")]
    TableError(String),

    /// A required table column was absent.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// No table row matched the exposure's selection columns.
    #[error("no row matched selection: {0}")]
    RowNotFound(String),

    /// A region had no pixels left after DQ masking.
    #[error("no good data: {0}")]
    NoGoodData(String),

    /// A generic/unclassified failure, equivalent to the reference
    /// pipeline's catch-all `ERROR_RETURN`.
    #[error("{0}")]
    Generic(String),
}

impl CalError {
    /// The numeric exit code the reference pipeline associated with this
    /// error class. Part of the interface contract (§7); must not be
    /// renumbered.
    pub fn code(&self) -> i32 {
        match self {
            CalError::CalFileMissing(_) => 115,
            CalError::NothingToDo => 116,
            CalError::KeywordMissing(_) => 117,
            CalError::SizeMismatch { .. } => 120,
            CalError::CalStepNotDone(_) => 130,
            CalError::TableError(_) => 141,
            CalError::ColumnNotFound(_) => 142,
            CalError::RowNotFound(_) => 144,
            CalError::NoGoodData(_) => 151,
            CalError::Generic(_) => 2,
        }
    }
}

/// The crate-wide result alias; every step function returns this.
pub type CalResult<T> = Result<T, CalError>;
