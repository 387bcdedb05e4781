// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The single parameterized "keyword fetch" operation (§9 design notes):
 * `(name, value, default, required)` resolved into one `Result`, instead of
 * one getter per primitive type.
 */

use crate::error::{CalError, CalResult};

/// A header/table keyword fetch, parameterized over the value type.
///
/// Backs both `ExposureInfo` construction from a primary header and the
/// CTE parameter state machine (§4.9's "header overrides table" rule),
/// which is exactly the header-overrides-a-tabulated-default shape this
/// type is built to express once.
pub struct Keyword<T> {
    pub name: &'static str,
    pub value: Option<T>,
    pub default: Option<T>,
    pub required: bool,
}

impl<T: Clone> Keyword<T> {
    pub fn new(name: &'static str, value: Option<T>) -> Self {
        Keyword {
            name,
            value,
            default: None,
            required: false,
        }
    }

    pub fn with_default(mut self, default: T) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Resolve to a concrete value: present value wins, then default, then
    /// `KEYWORD_MISSING` regardless of `required` -- callers that don't
    /// require the keyword must use `resolve_optional` instead.
    pub fn resolve(&self) -> CalResult<T> {
        if let Some(v) = &self.value {
            return Ok(v.clone());
        }
        if let Some(d) = &self.default {
            return Ok(d.clone());
        }
        Err(CalError::KeywordMissing(self.name.to_string()))
    }

    pub fn resolve_optional(&self) -> Option<T> {
        self.value.clone().or_else(|| self.default.clone())
    }
}

/// Resolve a numeric CTE parameter that may be overridden by a header
/// keyword: the header value wins only when both present and "positive
/// valid" (§4.9's state machine); otherwise the table value is kept (and,
/// conceptually, written back into the header by the caller).
pub fn resolve_override_if_positive(header_value: Option<f64>, table_value: f64) -> f64 {
    match header_value {
        Some(v) if v > 0.0 => v,
        _ => table_value,
    }
}
