//! The package moving through the pipeline.

use serde::Serialize;

use crate::error::{PipelineError, Result};

use super::PackageRef;

/// One release artifact of a software title.
///
/// Built once per run from the Test deployment policy and passed by
/// reference through every later step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    /// Software title, as used in policy names
    pub title: String,
    /// Name of the patch definition tracking this title
    pub patch_title: String,
    /// Package file name, `<title>-<version>.<ext>`
    pub file_name: String,
    /// Version derived from the file name
    pub version: String,
    /// Backend-assigned package id
    pub artifact_id: u64,
}

impl Package {
    /// Build the package carried by a policy's package reference.
    pub fn from_reference(
        title: impl Into<String>,
        patch_title: impl Into<String>,
        reference: &PackageRef,
    ) -> Result<Self> {
        let title = title.into();
        let version = derive_version(&title, &reference.name)?;
        Ok(Self {
            title,
            patch_title: patch_title.into(),
            file_name: reference.name.clone(),
            version,
            artifact_id: reference.id,
        })
    }

    pub fn reference(&self) -> PackageRef {
        PackageRef::new(self.artifact_id, self.file_name.clone())
    }
}

/// Extract the version from a `<title>-<version>.<ext>` file name.
///
/// The `<title>-` prefix is stripped when present, otherwise everything up to
/// the first `-` is. The last extension is dropped.
pub fn derive_version(title: &str, file_name: &str) -> Result<String> {
    let rest = match file_name
        .strip_prefix(title)
        .and_then(|rest| rest.strip_prefix('-'))
    {
        Some(rest) => rest,
        None => file_name
            .split_once('-')
            .map(|(_, rest)| rest)
            .ok_or_else(|| PipelineError::InvalidPackageName(file_name.to_string()))?,
    };

    let version = rest.rsplit_once('.').map_or(rest, |(stem, _)| stem);
    if version.is_empty() {
        return Err(PipelineError::InvalidPackageName(file_name.to_string()));
    }
    Ok(version.to_string())
}

/// Title part of a package file name: the text before the first `-`.
pub fn title_from_file_name(file_name: &str) -> Result<String> {
    match file_name.split_once('-') {
        Some((title, _)) if !title.is_empty() => Ok(title.to_string()),
        _ => Err(PipelineError::InvalidPackageName(file_name.to_string())),
    }
}
