//! Promotion from the test track to stable.

use tracing::info;

use crate::backend::Backend;
use crate::error::Result;
use crate::gate::{self, DwellReference, GateConfig, GateDecision, WaitReason};
use crate::model::PatchTrack;

use super::sync::{SyncEngine, SyncOutcome, find_track};
use super::{Clock, Stage, StageOutcome, StageSummary};

/// Options for one promotion run.
#[derive(Debug, Clone)]
pub struct PromoteOptions {
    /// Software title, as used in policy names
    pub title: String,
    /// Patch title, when it differs from the software title
    pub patch_title: Option<String>,
    pub gate: GateConfig,
    /// Patch policy whose stamp measures the dwell time
    pub dwell_from: PatchTrack,
}

impl PromoteOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            patch_title: None,
            gate: GateConfig::default(),
            dwell_from: PatchTrack::Stable,
        }
    }

    pub fn with_patch_title(mut self, patch_title: impl Into<String>) -> Self {
        self.patch_title = Some(patch_title.into());
        self
    }

    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_dwell_from(mut self, track: PatchTrack) -> Self {
        self.dwell_from = track;
        self
    }

    pub fn patch_title(&self) -> &str {
        self.patch_title.as_deref().unwrap_or(&self.title)
    }
}

/// Gate check followed by the synchronization engine.
pub struct PromoteStage<'a> {
    backend: &'a dyn Backend,
    clock: &'a dyn Clock,
}

impl<'a> PromoteStage<'a> {
    pub fn new(backend: &'a dyn Backend, clock: &'a dyn Clock) -> Self {
        Self { backend, clock }
    }

    pub fn run(&self, options: &PromoteOptions) -> Result<StageOutcome> {
        let engine = SyncEngine::new(self.backend);
        let now = self.clock.now();
        info!("Promoting {} ({})", options.title, options.patch_title());

        let (test_policy, package) = engine.lookup_test(&options.title, options.patch_title())?;
        if !test_policy.enabled {
            return Ok(wait(WaitReason::TestTrackDisabled));
        }

        let dwell = if options.gate.requires_dwell() {
            self.dwell_reference(&engine, options)?
        } else {
            DwellReference::NotRequired
        };
        match gate::evaluate(now, &options.gate, dwell) {
            GateDecision::Go => {}
            GateDecision::Wait(reason) => return Ok(wait(reason)),
            GateDecision::Skip(reason) => {
                info!("Skipping {}: {}", options.title, reason);
                return Ok(StageOutcome::Skipped(reason));
            }
        }

        let outcome = match engine.promote(&package, now.date())? {
            SyncOutcome::Promoted {
                version_label,
                stable_patch_policy_id,
                ..
            } => StageOutcome::Completed(StageSummary {
                stage: Stage::Promote,
                title: package.title.clone(),
                version: version_label,
                policy_id: stable_patch_policy_id,
            }),
            SyncOutcome::AlreadyAttached { version_label } => StageOutcome::Skipped(format!(
                "version {version_label} already attached to '{}'",
                package.patch_title
            )),
            SyncOutcome::NotDeclared { version } => StageOutcome::Skipped(format!(
                "version {version} not declared under '{}'",
                package.patch_title
            )),
        };
        Ok(outcome)
    }

    /// Read the stage entry stamp from the configured patch policy.
    fn dwell_reference(
        &self,
        engine: &SyncEngine<'_>,
        options: &PromoteOptions,
    ) -> Result<DwellReference> {
        let title = engine.locate_patch_title(options.patch_title())?;
        let policies = self.backend.list_patch_policies(title.id)?;
        let summary = find_track(&policies, options.dwell_from, options.patch_title())?;
        let policy = self.backend.get_patch_policy(summary.id)?;
        if policy.entered_stage.is_none() {
            info!(
                "Patch policy '{}' description not understood: '{}'",
                policy.name, policy.self_service_description
            );
        }
        Ok(DwellReference::from(policy.entered_stage))
    }
}

fn wait(reason: WaitReason) -> StageOutcome {
    info!("Not promoting yet: {}", reason);
    StageOutcome::Waiting(reason.to_string())
}
