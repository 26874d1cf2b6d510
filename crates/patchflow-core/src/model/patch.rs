//! Patch definitions and patch policies.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::PackageRef;

const STAMP_DATE_FORMAT: &str = "%Y-%m-%d";

/// Entry of the patch title list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchTitleSummary {
    pub id: u64,
    pub name: String,
}

/// Entry of the patch policy list of one patch title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchPolicySummary {
    pub id: u64,
    pub name: String,
}

/// A declared software version and the package attached to it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchVersion {
    pub software_version: String,
    pub package: Option<PackageRef>,
}

impl PatchVersion {
    pub fn is_attached(&self) -> bool {
        self.package.is_some()
    }
}

/// Versions declared under one patch title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchDefinition {
    pub id: u64,
    pub name: String,
    pub versions: Vec<PatchVersion>,
}

impl PatchDefinition {
    /// Index of the first declared version whose label contains `version`.
    ///
    /// Labels are matched as text. `"3.2"` also matches a declared `"3.2.1"`.
    pub fn find_version(&self, version: &str) -> Option<usize> {
        self.versions
            .iter()
            .position(|declared| declared.software_version.contains(version))
    }
}

/// Which of the two patch policies of a patch title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchTrack {
    Test,
    Stable,
}

impl PatchTrack {
    /// Text a policy name must contain to belong to this track.
    pub fn marker(self) -> &'static str {
        match self {
            PatchTrack::Test => "Test",
            PatchTrack::Stable => "Stable",
        }
    }

    pub fn matches(self, policy_name: &str) -> bool {
        policy_name.contains(self.marker())
    }
}

impl fmt::Display for PatchTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Deployment deadline of a patch policy. Read only; never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deadline {
    pub enabled: bool,
    /// `None` when the server's period is blank or not a number
    pub period_days: Option<u32>,
}

/// A patch policy enforcing one declared version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchPolicy {
    pub id: u64,
    pub name: String,
    pub enabled: bool,
    pub target_version: String,
    pub release_date: Option<String>,
    pub self_service_description: String,
    /// Date the enforced version entered this track, read from the
    /// self-service description
    pub entered_stage: Option<NaiveDate>,
    pub deadline: Option<Deadline>,
}

impl PatchPolicy {
    /// Point the policy at a new version, entered on `today`.
    pub fn retarget(mut self, version_label: &str, title: &str, today: NaiveDate) -> Self {
        self.target_version = version_label.to_string();
        self.release_date = None;
        self.self_service_description = render_description(title, today);
        self.entered_stage = Some(today);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Self-service description carrying the stage entry date.
pub fn render_description(title: &str, date: NaiveDate) -> String {
    format!("Update {} ({})", title, date.format(STAMP_DATE_FORMAT))
}

/// Recover the stage entry date from a self-service description.
///
/// The description must split into exactly three whitespace-separated tokens,
/// `Update <title> (YYYY-MM-DD)`. Anything else yields `None`.
pub fn parse_entered_stage(description: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = description.split_whitespace().collect();
    let [_, _, stamp] = tokens.as_slice() else {
        return None;
    };
    let date = stamp.strip_prefix('(')?.strip_suffix(')')?;
    NaiveDate::parse_from_str(date, STAMP_DATE_FORMAT).ok()
}
