//! Record model for the release pipeline.
//!
//! Plain data mirroring the remote records this system reads and rewrites:
//! - [`Package`]: the artifact moving through the pipeline
//! - [`DeploymentPolicy`]: `TEST-<title>` and `Install <title>` policies
//! - [`PatchDefinition`]: declared versions of a patch title
//! - [`PatchPolicy`]: the Test and Stable patch policies of a patch title

pub mod package;
pub mod patch;
pub mod policy;

use serde::{Deserialize, Serialize};

pub use package::{Package, derive_version, title_from_file_name};
pub use patch::{
    Deadline, PatchDefinition, PatchPolicy, PatchPolicySummary, PatchTitleSummary, PatchTrack,
    PatchVersion, parse_entered_stage, render_description,
};
pub use policy::{DeploymentPolicy, PolicyPackage, stable_policy_name, test_policy_name};

/// Reference to an uploaded package, as embedded in other records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    /// Backend-assigned package id
    pub id: u64,
    /// Package file name, `<title>-<version>.<ext>`
    pub name: String,
}

impl PackageRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Metadata written onto a freshly uploaded package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub category: String,
    pub notes: String,
}
