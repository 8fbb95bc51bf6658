// src/job/group.rs

//! Grouping of steps that share a position number and run concurrently.

use crate::job::step::{Step, StepStatus};

/// Aggregated outcome of a group or of the whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ok => "OK",
            RunStatus::Error => "ERROR",
        }
    }
}

/// Non-empty set of steps assigned the same position number.
///
/// The group stores no status of its own; the outcome is derived from
/// the members once they are all terminal.
#[derive(Debug)]
pub struct StepGroup {
    pub steps: Vec<Step>,
}

impl StepGroup {
    pub fn new(steps: Vec<Step>) -> Self {
        debug_assert!(!steps.is_empty(), "step groups are non-empty by construction");
        Self { steps }
    }

    /// True once every member has reached ok or error.
    pub fn all_terminal(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_terminal())
    }

    /// Derived group outcome: error if any member is error. Only
    /// meaningful once [`all_terminal`](Self::all_terminal) holds.
    pub fn status(&self) -> RunStatus {
        if self.steps.iter().any(|s| s.status == StepStatus::Error) {
            RunStatus::Error
        } else {
            RunStatus::Ok
        }
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Error)
    }
}
