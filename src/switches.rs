// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The calibration graph state machine (C1 of §3): a mapping from step name
 * to status, with the fixed transition rules of §3/§7.
 */

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::error::{CalError, CalResult};
use crate::reference::Pedigree;

/// A calibration step's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Perform,
    Complete,
    Skipped,
    Omit,
    Ignored,
    Dummy,
}

/// The set of calibration steps this crate knows how to gate. Named after
/// the reference pipeline's switch keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Dqicorr,
    Atodcorr,
    Blevcorr,
    Biascorr,
    Darkcorr,
    Flashcorr,
    Flatcorr,
    Shadcorr,
    Satflag,
    Sinkcorr,
    Ctecorr,
    Zsigcorr,
    Nlincorr,
    Unitcorr,
    Photcorr,
}

/// The calibration graph: {step -> status}.
#[derive(Debug, Clone, Default)]
pub struct CalSwitches(BTreeMap<Step, Status>);

impl CalSwitches {
    pub fn new() -> Self {
        CalSwitches(BTreeMap::new())
    }

    pub fn set(&mut self, step: Step, status: Status) {
        self.0.insert(step, status);
    }

    pub fn status(&self, step: Step) -> Status {
        self.0.get(&step).copied().unwrap_or(Status::Omit)
    }

    /// Transition `step` from `Perform` to `Complete`. A step not currently
    /// `Perform` is left untouched (re-running a `Complete` step is a no-op
    /// per §3: "once COMPLETE, re-running the pipeline omits it").
    pub fn complete(&mut self, step: Step) {
        if self.status(step) == Status::Perform {
            self.set(step, Status::Complete);
        }
    }

    /// Transition `step` from `Perform` to `Skipped` (used when a required
    /// reference artifact's pedigree is `DUMMY*`).
    pub fn skip(&mut self, step: Step) {
        if self.status(step) == Status::Perform {
            self.set(step, Status::Skipped);
        }
    }

    /// Downgrade `step` to `Ignored` (a class-3 recoverable anomaly: warn
    /// and proceed without performing the step).
    pub fn ignore(&mut self, step: Step) {
        if self.status(step) == Status::Perform {
            self.set(step, Status::Ignored);
        }
    }

    /// True if `step` should actually run (i.e. is enabled and not already
    /// satisfied).
    pub fn should_run(&self, step: Step) -> bool {
        self.status(step) == Status::Perform
    }

    /// Gate a step on a reference artifact's pedigree: a `DUMMY*` pedigree
    /// degrades the step to `Skipped` rather than running it (§3, §7 class
    /// 1 exception). Returns whether the step should still run.
    pub fn gate_on_pedigree(&mut self, step: Step, pedigree: &Pedigree) -> bool {
        if pedigree.is_dummy() {
            self.skip(step);
            false
        } else {
            self.should_run(step)
        }
    }

    /// Fail unless `prereq` is `Complete`. Used by steps with cross-step
    /// dependencies (e.g. cosmic-ray rejection requires bias subtracted).
    pub fn require_complete(&self, prereq: Step) -> CalResult<()> {
        if self.status(prereq) == Status::Complete {
            Ok(())
        } else {
            Err(CalError::CalStepNotDone(format!("{:?}", prereq)))
        }
    }

    /// True if every known step is `Omit`, `Complete`, or `Dummy` -- i.e.
    /// there is nothing left to do.
    pub fn nothing_to_do(&self) -> bool {
        self.0
            .values()
            .all(|s| matches!(s, Status::Omit | Status::Complete | Status::Dummy))
    }

    /// A comma-joined summary of every step still `Perform`, for the
    /// trailer message logged before a run starts.
    pub fn pending_steps(&self) -> String {
        self.0
            .iter()
            .filter(|(_, &status)| status == Status::Perform)
            .map(|(step, _)| format!("{:?}", step))
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_only_transitions_from_perform() {
        let mut sw = CalSwitches::new();
        sw.set(Step::Biascorr, Status::Omit);
        sw.complete(Step::Biascorr);
        assert_eq!(sw.status(Step::Biascorr), Status::Omit);

        sw.set(Step::Biascorr, Status::Perform);
        sw.complete(Step::Biascorr);
        assert_eq!(sw.status(Step::Biascorr), Status::Complete);
    }

    #[test]
    fn dummy_pedigree_degrades_to_skipped() {
        let mut sw = CalSwitches::new();
        sw.set(Step::Darkcorr, Status::Perform);
        let should_run = sw.gate_on_pedigree(Step::Darkcorr, &Pedigree("DUMMY".into()));
        assert!(!should_run);
        assert_eq!(sw.status(Step::Darkcorr), Status::Skipped);
    }

    #[test]
    fn require_complete_fails_when_prereq_not_done() {
        let mut sw = CalSwitches::new();
        sw.set(Step::Biascorr, Status::Perform);
        let err = sw.require_complete(Step::Biascorr).unwrap_err();
        assert_eq!(err.code(), 130);
        sw.complete(Step::Biascorr);
        assert!(sw.require_complete(Step::Biascorr).is_ok());
    }

    #[test]
    fn nothing_to_do_when_all_omit_or_complete() {
        let mut sw = CalSwitches::new();
        sw.set(Step::Biascorr, Status::Omit);
        sw.set(Step::Darkcorr, Status::Complete);
        assert!(sw.nothing_to_do());
        sw.set(Step::Flatcorr, Status::Perform);
        assert!(!sw.nothing_to_do());
    }

    #[test]
    fn pending_steps_lists_only_perform_status_steps() {
        let mut sw = CalSwitches::new();
        sw.set(Step::Biascorr, Status::Perform);
        sw.set(Step::Darkcorr, Status::Complete);
        sw.set(Step::Flatcorr, Status::Perform);
        let pending = sw.pending_steps();
        assert!(pending.contains("Biascorr"));
        assert!(pending.contains("Flatcorr"));
        assert!(!pending.contains("Darkcorr"));
    }
}
