//! The user-visible outcome of a run: `{assignment, cost, duration, status}`
//! (spec.md §7). The core substrate never assembles this on its own — a
//! harness driving one or more `Agent`s reads each computation's final value
//! and cost back via `Agent::result_of`/`Agent::results` once they've all
//! finished (captured by `Agent::stop` right before a finished computation is
//! evicted) and reports it through this shape — but the shape itself, and
//! its error classifier, are part of the boundary this crate exposes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assignment::Assignment;
use crate::error::DcopError;

/// How a run ended. `Error` is not carried here: a run that fails reports
/// `DcopError` instead of a `RunResult` (see `RunOutcome`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Finished,
    Timeout,
    Stopped,
}

/// A completed (or cut-off) run: every computation's chosen value, the total
/// cost of that assignment, how long the run took, and why it stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub assignment: Assignment,
    pub cost: i64,
    pub duration: Duration,
    pub status: RunStatus,
}

/// Either a successful `RunResult`, or a `DcopError` together with its
/// taxonomy classifier — the `{status: ERROR, classifier}` shape from
/// spec.md §7.
pub type RunOutcome = Result<RunResult, DcopError>;

/// The classifier string to report alongside a failed run, per spec.md §7's
/// "a classifier string names the taxonomy class".
pub fn classifier_of(outcome: &RunOutcome) -> Option<&'static str> {
    outcome.as_ref().err().map(DcopError::classifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;
    use crate::error::ConfigurationError;

    #[test]
    fn successful_outcome_has_no_classifier() {
        let outcome: RunOutcome = Ok(RunResult {
            assignment: Assignment::default(),
            cost: 0,
            duration: Duration::from_millis(5),
            status: RunStatus::Finished,
        });
        assert_eq!(None, classifier_of(&outcome));
    }

    #[test]
    fn failed_outcome_reports_its_taxonomy_class() {
        let outcome: RunOutcome =
            Err(ConfigurationError::UnknownAlgorithm("nope".to_string()).into());
        assert_eq!(Some("ConfigurationError"), classifier_of(&outcome));
    }

    #[test]
    fn assignment_map_round_trips_through_serde() {
        let mut assignment = Assignment::default();
        assignment.insert("x1".to_string(), Value::Int(1));
        let result = RunResult {
            assignment,
            cost: 3,
            duration: Duration::from_secs(1),
            status: RunStatus::Stopped,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: RunResult = serde_json::from_str(&json).unwrap();
        assert_eq!(RunStatus::Stopped, back.status);
        assert_eq!(3, back.cost);
    }
}
