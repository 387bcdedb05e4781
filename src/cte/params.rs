// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * CTE reference-table parameters (§4.9): the header scalar block plus the
 * three table/image extensions (`QPROF`, `SCLBYCOL`, `RPROF`/`CPROF`).
 */

use ndarray::Array2;

use crate::config::resolve_override_if_positive;

/// A single trap: the charge-packet size at which it activates (`qlevq`)
/// and the charge lost per electron at that level (`dpdew`). `w` is its
/// index into the `RPROF`/`CPROF` trail-shape tables.
#[derive(Debug, Clone, Copy)]
pub struct Trap {
    pub w: usize,
    pub qlevq: f64,
    pub dpdew: f64,
}

/// The ordered trap population (`QPROF`). Terminated at the first row with
/// `qlevq >= 999999`; `active` is the number of traps before that row
/// (§4.9).
#[derive(Debug, Clone)]
pub struct TrapTable {
    pub traps: Vec<Trap>,
}

impl TrapTable {
    /// Build from a raw `(qlevq, dpdew)` row list, stopping at the
    /// terminator row and assigning `w` by ordinal position.
    pub fn from_rows(rows: &[(f64, f64)]) -> Self {
        let mut traps = Vec::new();
        for (w, &(qlevq, dpdew)) in rows.iter().enumerate() {
            if qlevq >= 999_999.0 {
                break;
            }
            traps.push(Trap { w, qlevq, dpdew });
        }
        TrapTable { traps }
    }

    /// Traps in largest-`qlevq`-first order, as `sim_readout` (§4.9) walks
    /// them, restricted to those active for a column whose maximum charge
    /// is `max_charge`.
    pub fn active_for_column(&self, max_charge: f64) -> Vec<Trap> {
        let mut active: Vec<Trap> = self
            .traps
            .iter()
            .copied()
            .filter(|t| t.qlevq <= max_charge)
            .collect();
        active.sort_by(|a, b| b.qlevq.partial_cmp(&a.qlevq).unwrap());
        active
    }
}

/// Per-column CTE scaling anchors at rows 512/1024/1536/2048 (`SCLBYCOL`).
#[derive(Debug, Clone, Copy)]
pub struct ColumnScale {
    pub at_512: f64,
    pub at_1024: f64,
    pub at_1536: f64,
    pub at_2048: f64,
}

impl ColumnScale {
    fn anchors(&self) -> [(f64, f64); 4] {
        [
            (512.0, self.at_512),
            (1024.0, self.at_1024),
            (1536.0, self.at_1536),
            (2048.0, self.at_2048),
        ]
    }

    /// Linear interpolation between the two flanking anchors (§4.9 step 3),
    /// clamped at the ends.
    pub fn interpolate(&self, row: f64) -> f64 {
        let anchors = self.anchors();
        if row <= anchors[0].0 {
            return anchors[0].1;
        }
        if row >= anchors[3].0 {
            return anchors[3].1;
        }
        for w in anchors.windows(2) {
            let (r0, v0) = w[0];
            let (r1, v1) = w[1];
            if row >= r0 && row <= r1 {
                let t = (row - r0) / (r1 - r0);
                return v0 + t * (v1 - v0);
            }
        }
        anchors[3].1
    }
}

/// The trail-shape tables `RPROF` (differential emission probability) and
/// `CPROF` (cumulative emission probability), each `[trap_index,
/// downstream_pixel]`.
#[derive(Debug, Clone)]
pub struct TrailProfiles {
    pub rprof: Array2<f64>,
    pub cprof: Array2<f64>,
}

impl TrailProfiles {
    pub fn rprof_at(&self, trap_w: usize, pixels_since_emission: usize) -> f64 {
        let len = self.rprof.ncols();
        self.rprof[[trap_w, pixels_since_emission.min(len - 1)]]
    }

    pub fn cprof_at(&self, trap_w: usize, pixels_since_emission: usize) -> f64 {
        let len = self.cprof.ncols();
        self.cprof[[trap_w, pixels_since_emission.min(len - 1)]]
    }
}

/// The header scalar block (§4.9). `CTE_NAME`/`CTE_VER`/`CTEDATE0`/
/// `CTEDATE1`/`PCTETRSH` are always taken from the table; the remaining
/// numeric fields may be overridden by the header when the override is
/// "positive-valid" (§4.9's state machine).
#[derive(Debug, Clone)]
pub struct CteParams {
    pub cte_name: String,
    pub cte_ver: String,
    pub ctedate0: f64,
    pub ctedate1: f64,
    pub pctetlen: usize,
    pub pcternoi: f64,
    pub pctenfor: usize,
    pub pctenpar: usize,
    pub pctensmd: u32,
    pub pctetrsh: f64,
    pub fixrocr: bool,
}

impl CteParams {
    /// Resolve the final parameter block given a table-derived base and
    /// optional header overrides, per §4.9's rule that numeric overrides
    /// are only honored when positive-valid; identifiers and dates always
    /// come from the table.
    pub fn resolve(
        table: &CteParams,
        header_pctenfor: Option<f64>,
        header_pctenpar: Option<f64>,
        header_pcternoi: Option<f64>,
    ) -> CteParams {
        let mut resolved = table.clone();
        resolved.pctenfor =
            resolve_override_if_positive(header_pctenfor, table.pctenfor as f64) as usize;
        resolved.pctenpar =
            resolve_override_if_positive(header_pctenpar, table.pctenpar as f64) as usize;
        resolved.pcternoi = resolve_override_if_positive(header_pcternoi, table.pcternoi);
        resolved
    }
}

/// Runtime knobs that aren't part of the reference-table contract: the
/// "one-thread switch" for reproducibility/debugging (§5).
#[derive(Debug, Clone, Copy, Default)]
pub struct CteOptions {
    pub single_threaded: bool,
}
