//! Pipeline stages.
//!
//! Each stage processes one title against the backend and reports a
//! [`StageOutcome`]. Nothing is kept locally between runs: every run re-reads
//! the remote records and derives what is left to do from them.
//!
//! Runs for the same title must not overlap. Each step reads a record, edits
//! it and writes it back without a conditional check, so two concurrent runs
//! can overwrite each other's changes. The caller's scheduler is expected to
//! serialize runs per title.

pub mod import;
pub mod promote;
pub mod sync;

use std::fmt;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

pub use import::{ImportOptions, ImportStage};
pub use promote::{PromoteOptions, PromoteStage};
pub use sync::{AttachOutcome, SyncEngine, SyncOutcome};

/// Source of the current local time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Import,
    Promote,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Import => f.write_str("import"),
            Stage::Promote => f.write_str("promote"),
        }
    }
}

/// What a completed stage changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub title: String,
    pub version: String,
    /// Id of the policy the stage finished on
    pub policy_id: u64,
}

/// Result of one stage run.
///
/// `Waiting` and `Skipped` are normal, recurring states: the run made no
/// progress this time and the scheduler should try again later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed(StageSummary),
    /// A gate constraint is not met yet
    Waiting(String),
    /// Nothing to do, or the inputs were not understood
    Skipped(String),
}

impl StageOutcome {
    pub fn summary(&self) -> Option<&StageSummary> {
        match self {
            StageOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}
