//! Synchronization engine
//!
//! Moves the package referenced by a title's Test deployment policy onto the
//! stable track, updating the dependent records one at a time:
//!
//! 1. look up the Test deployment policy
//! 2. point the Stable deployment policy at its package
//! 3. locate the patch definition of the patch title
//! 4. attach the package to the matching declared version
//! 5. retarget the Stable patch policy at that version
//! 6. disable the Test patch policy
//!
//! The order is fixed. Clients must find a committed package behind the
//! stable policy before the patch definition points at it, and patch
//! policies must never target a version that has no package attached.
//! A failure stops the run where it is; re-running picks up from the
//! records as they now stand.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::{PipelineError, Result};
use crate::model::{
    DeploymentPolicy, Package, PatchDefinition, PatchPolicySummary, PatchTitleSummary,
    PatchTrack, stable_policy_name, test_policy_name,
};

/// Result of attaching the package to the patch definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The package was attached to the declared version with this label
    Attached { version_label: String },
    /// The matching declared version already carries a package
    AlreadyAttached { version_label: String },
    /// No declared version matches the package version
    NotDeclared,
}

/// Terminal state of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Promoted {
        version_label: String,
        stable_policy_id: u64,
        stable_patch_policy_id: u64,
    },
    /// A previous run already attached this version; nothing left to do
    AlreadyAttached { version_label: String },
    /// The version is not declared under the patch title yet
    NotDeclared { version: String },
}

pub struct SyncEngine<'a> {
    backend: &'a dyn Backend,
}

impl<'a> SyncEngine<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Run every step for `title`, stamping the Stable patch policy with
    /// `today`.
    pub fn run(&self, title: &str, patch_title: &str, today: NaiveDate) -> Result<SyncOutcome> {
        let (_, package) = self.lookup_test(title, patch_title)?;
        self.promote(&package, today)
    }

    /// Fetch the Test deployment policy and the package it references.
    pub fn lookup_test(
        &self,
        title: &str,
        patch_title: &str,
    ) -> Result<(DeploymentPolicy, Package)> {
        let name = test_policy_name(title);
        let policy = self.backend.get_policy(&name)?;
        let reference = policy
            .package()
            .ok_or_else(|| PipelineError::MissingTestPackage {
                policy: name.clone(),
            })?;
        let package = Package::from_reference(title, patch_title, reference)?;
        debug!(
            "Test policy {} carries {} (id {}), version {}",
            policy.id, package.file_name, package.artifact_id, package.version
        );
        Ok((policy, package))
    }

    /// Steps 2 to 6 for a package already looked up.
    pub fn promote(&self, package: &Package, today: NaiveDate) -> Result<SyncOutcome> {
        let stable_policy_id = self.update_stable_policy(package)?;

        let title = self.locate_patch_title(&package.patch_title)?;
        let mut definition = self.backend.get_patch_definition(title.id)?;

        let version_label = match self.attach_version(&mut definition, package)? {
            AttachOutcome::Attached { version_label } => version_label,
            AttachOutcome::AlreadyAttached { version_label } => {
                info!(
                    "{} version {} already attached to '{}', nothing to do",
                    package.title, version_label, definition.name
                );
                return Ok(SyncOutcome::AlreadyAttached { version_label });
            }
            AttachOutcome::NotDeclared => {
                info!(
                    "Version {} of {} is not declared under '{}' yet",
                    package.version, package.title, definition.name
                );
                return Ok(SyncOutcome::NotDeclared {
                    version: package.version.clone(),
                });
            }
        };

        let policies = self.backend.list_patch_policies(title.id)?;
        let stable = find_track(&policies, PatchTrack::Stable, &package.patch_title)?;
        let test = find_track(&policies, PatchTrack::Test, &package.patch_title)?;

        let stable_patch_policy_id =
            self.update_stable_patch_policy(stable.id, &version_label, package, today)?;
        self.disable_test_patch_policy(test.id)?;

        info!(
            "Promoted {} {} to stable (patch policy {})",
            package.title, version_label, stable_patch_policy_id
        );
        Ok(SyncOutcome::Promoted {
            version_label,
            stable_policy_id,
            stable_patch_policy_id,
        })
    }

    fn update_stable_policy(&self, package: &Package) -> Result<u64> {
        let policy = self
            .backend
            .get_policy(&stable_policy_name(&package.title))?
            .with_package(package.reference());
        let id = self.backend.put_policy(&policy)?;
        debug!("Stable policy {} now installs {}", id, package.file_name);
        Ok(id)
    }

    /// Find the patch title by exact name.
    pub fn locate_patch_title(&self, patch_title: &str) -> Result<PatchTitleSummary> {
        self.backend
            .list_patch_titles()?
            .into_iter()
            .find(|title| title.name == patch_title)
            .ok_or_else(|| PipelineError::MissingPatchTitle(patch_title.to_string()))
    }

    /// Attach the package to the first declared version matching its version.
    ///
    /// Writes the definition back only when something was attached.
    pub fn attach_version(
        &self,
        definition: &mut PatchDefinition,
        package: &Package,
    ) -> Result<AttachOutcome> {
        let Some(index) = definition.find_version(&package.version) else {
            return Ok(AttachOutcome::NotDeclared);
        };

        let declared = &mut definition.versions[index];
        let version_label = declared.software_version.clone();
        if declared.is_attached() {
            return Ok(AttachOutcome::AlreadyAttached { version_label });
        }

        declared.package = Some(package.reference());
        self.backend.put_patch_definition(definition)?;
        debug!(
            "Attached {} to version {} of '{}'",
            package.file_name, version_label, definition.name
        );
        Ok(AttachOutcome::Attached { version_label })
    }

    fn update_stable_patch_policy(
        &self,
        id: u64,
        version_label: &str,
        package: &Package,
        today: NaiveDate,
    ) -> Result<u64> {
        let policy = self
            .backend
            .get_patch_policy(id)?
            .retarget(version_label, &package.title, today);
        Ok(self.backend.put_patch_policy(&policy)?)
    }

    fn disable_test_patch_policy(&self, id: u64) -> Result<u64> {
        let policy = self.backend.get_patch_policy(id)?.with_enabled(false);
        let id = self.backend.put_patch_policy(&policy)?;
        debug!("Disabled test patch policy {}", id);
        Ok(id)
    }
}

/// First patch policy of `track` in the list.
pub fn find_track<'p>(
    policies: &'p [PatchPolicySummary],
    track: PatchTrack,
    patch_title: &str,
) -> Result<&'p PatchPolicySummary> {
    policies
        .iter()
        .find(|policy| track.matches(&policy.name))
        .ok_or_else(|| PipelineError::MissingPatchPolicy {
            track,
            patch_title: patch_title.to_string(),
        })
}
