//! Upload of a new package onto the test track.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::backend::{Backend, RetryPolicy, Sleeper};
use crate::error::{PipelineError, Result};
use crate::model::{PackageMetadata, PackageRef, derive_version, test_policy_name, title_from_file_name};

use super::{Clock, Stage, StageOutcome, StageSummary};

pub const DEFAULT_CATEGORY: &str = "Applications";
pub const DEFAULT_NOTES: &str = "Built by Autopkg.";

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Local package file, named `<title>-<version>.<ext>`
    pub package_path: PathBuf,
    /// Category assigned to the uploaded package
    pub category: String,
    /// Notes prefix; the upload date is appended
    pub notes: String,
}

impl ImportOptions {
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
            category: DEFAULT_CATEGORY.to_string(),
            notes: DEFAULT_NOTES.to_string(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Uploads a package and points the title's Test deployment policy at it.
pub struct ImportStage<'a> {
    backend: &'a dyn Backend,
    clock: &'a dyn Clock,
    sleeper: &'a dyn Sleeper,
    retry: RetryPolicy,
}

impl<'a> ImportStage<'a> {
    pub fn new(backend: &'a dyn Backend, clock: &'a dyn Clock, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            backend,
            clock,
            sleeper,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn run(&self, options: &ImportOptions) -> Result<StageOutcome> {
        let path = options.package_path.as_path();
        if !path.is_file() {
            return Err(PipelineError::ArtifactMissing(path.to_path_buf()));
        }
        let file_name = file_name(path)?;
        let title = title_from_file_name(&file_name)?;
        let version = derive_version(&title, &file_name)?;
        info!("Importing {} ({} {})", file_name, title, version);

        if let Some(existing) = self.backend.find_package(&file_name)? {
            warn!("Package {} already uploaded as {}", file_name, existing);
            return Ok(StageOutcome::Skipped(format!(
                "package {file_name} already uploaded"
            )));
        }

        let artifact_id = self.backend.upload_artifact(path)?;
        info!("Uploaded {} as package {}", file_name, artifact_id);

        // The server may still be processing the upload; the first write
        // against it is retried until it settles.
        let metadata = PackageMetadata {
            category: options.category.clone(),
            notes: format!(
                "{} Uploaded {}",
                options.notes,
                self.clock.now().format("%d-%b-%Y")
            ),
        };
        self.retry.run(
            &format!("update package {artifact_id}"),
            self.sleeper,
            || self.backend.put_package(artifact_id, &metadata),
        )?;

        let policy = self
            .backend
            .get_policy(&test_policy_name(&title))?
            .with_package(PackageRef::new(artifact_id, file_name.clone()))
            .with_enabled(false);
        let policy_id = self.backend.put_policy(&policy)?;
        info!("Test policy {} now carries {}", policy_id, file_name);

        Ok(StageOutcome::Completed(StageSummary {
            stage: Stage::Import,
            title,
            version,
            policy_id,
        }))
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::InvalidPackageName(path.display().to_string()))
}
