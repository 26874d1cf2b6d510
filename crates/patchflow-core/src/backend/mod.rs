//! Backend gateway
//!
//! The operations the pipeline needs from the device-management server.
//! Stages only depend on [`Backend`]; [`JamfClient`] is the HTTP
//! implementation used by the CLI.

pub mod jamf;
pub mod retry;
pub mod xml;

use std::path::Path;

use crate::error::BackendResult;
use crate::model::{
    DeploymentPolicy, PackageMetadata, PatchDefinition, PatchPolicy, PatchPolicySummary,
    PatchTitleSummary,
};

pub use jamf::{Credentials, JamfClient};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};

/// Fetch and replace operations on the remote records.
///
/// Every write replaces the fields this system owns and reports the id the
/// server echoes back. Calls are blocking.
pub trait Backend {
    /// Id of an uploaded package with this file name, if one exists.
    fn find_package(&self, name: &str) -> BackendResult<Option<u64>>;

    /// Upload a package file and return its new id.
    fn upload_artifact(&self, path: &Path) -> BackendResult<u64>;

    /// Update the metadata of an uploaded package.
    fn put_package(&self, id: u64, metadata: &PackageMetadata) -> BackendResult<()>;

    /// Fetch a deployment policy by name.
    fn get_policy(&self, name: &str) -> BackendResult<DeploymentPolicy>;

    fn put_policy(&self, policy: &DeploymentPolicy) -> BackendResult<u64>;

    fn list_patch_titles(&self) -> BackendResult<Vec<PatchTitleSummary>>;

    fn get_patch_definition(&self, id: u64) -> BackendResult<PatchDefinition>;

    fn put_patch_definition(&self, definition: &PatchDefinition) -> BackendResult<()>;

    /// Patch policies configured for one patch title.
    fn list_patch_policies(&self, patch_title_id: u64) -> BackendResult<Vec<PatchPolicySummary>>;

    fn get_patch_policy(&self, id: u64) -> BackendResult<PatchPolicy>;

    fn put_patch_policy(&self, policy: &PatchPolicy) -> BackendResult<u64>;
}
