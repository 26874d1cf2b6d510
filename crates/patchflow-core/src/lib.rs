//! Patchflow Core Library
//!
//! Moves software packages through a staged release pipeline on a
//! device-management server: upload to a test track, then gated promotion
//! to stable, keeping deployment policies, patch definitions and patch
//! policies consistent with each other.

pub mod backend;
pub mod config;
pub mod error;
pub mod gate;
pub mod model;
pub mod pipeline;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, PatchflowConfig, PromoteConfigEntry};

    // Backend
    pub use crate::backend::{Backend, Credentials, JamfClient, RetryPolicy, ThreadSleeper};

    // Gate
    pub use crate::gate::{DwellReference, GateConfig, GateDecision, WeekdaySet};

    // Model
    pub use crate::model::{
        DeploymentPolicy, Package, PackageRef, PatchDefinition, PatchPolicy, PatchTrack,
    };

    // Pipeline
    pub use crate::pipeline::{
        ImportOptions, ImportStage, PromoteOptions, PromoteStage, StageOutcome, StageSummary,
        SystemClock,
    };

    // Errors
    pub use crate::error::{BackendError, PipelineError};
}
