//! Deployment policies.

use serde::Serialize;

use super::PackageRef;

/// Name of the test-stage deployment policy for a title.
pub fn test_policy_name(title: &str) -> String {
    format!("TEST-{title}")
}

/// Name of the stable deployment policy for a title.
pub fn stable_policy_name(title: &str) -> String {
    format!("Install {title}")
}

/// One entry of a policy's package list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyPackage {
    pub reference: PackageRef,
    /// Server-side action such as `Install` or `Cache`, kept as read
    pub action: Option<String>,
}

impl PolicyPackage {
    pub fn new(reference: PackageRef) -> Self {
        Self {
            reference,
            action: None,
        }
    }
}

/// A remote policy binding packages to an activation state.
///
/// Created by an administrator. This system only rewrites the first package
/// reference and the enabled flag; further entries are carried through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPolicy {
    pub id: u64,
    pub name: String,
    pub enabled: bool,
    pub packages: Vec<PolicyPackage>,
}

impl DeploymentPolicy {
    /// The package this pipeline manages: the first in the list.
    pub fn package(&self) -> Option<&PackageRef> {
        self.packages.first().map(|entry| &entry.reference)
    }

    /// Point the managed entry at `package`, keeping its action and every
    /// other entry.
    pub fn with_package(mut self, package: PackageRef) -> Self {
        match self.packages.first_mut() {
            Some(entry) => entry.reference = package,
            None => self.packages.push(PolicyPackage::new(package)),
        }
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
