//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use patchflow_core::backend::{Backend, Sleeper};
use patchflow_core::error::{BackendError, BackendResult};
use patchflow_core::model::{
    DeploymentPolicy, PackageMetadata, PackageRef, PatchDefinition, PatchPolicy,
    PatchPolicySummary, PatchTitleSummary, PatchVersion, PolicyPackage, parse_entered_stage,
};
use patchflow_core::pipeline::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FindPackage,
    Upload,
    PutPackage,
    GetPolicy,
    PutPolicy,
    ListPatchTitles,
    GetPatchDefinition,
    PutPatchDefinition,
    ListPatchPolicies,
    GetPatchPolicy,
    PutPatchPolicy,
}

impl Op {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Op::Upload | Op::PutPackage | Op::PutPolicy | Op::PutPatchDefinition | Op::PutPatchPolicy
        )
    }
}

/// Remote records held by [`FakeBackend`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteState {
    pub packages: HashMap<String, u64>,
    pub package_metadata: HashMap<u64, PackageMetadata>,
    pub policies: Vec<DeploymentPolicy>,
    pub patch_titles: Vec<PatchTitleSummary>,
    pub definitions: HashMap<u64, PatchDefinition>,
    pub patch_policy_lists: HashMap<u64, Vec<PatchPolicySummary>>,
    pub patch_policies: HashMap<u64, PatchPolicy>,
    pub next_id: u64,
}

impl RemoteState {
    pub fn policy(&self, name: &str) -> &DeploymentPolicy {
        self.policies
            .iter()
            .find(|p| p.name == name)
            .unwrap_or_else(|| panic!("no policy {name}"))
    }
}

/// In-memory backend with a call log and injectable failures.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub state: RefCell<RemoteState>,
    calls: RefCell<Vec<(Op, String)>>,
    faults: RefCell<HashMap<Op, VecDeque<BackendError>>>,
}

impl FakeBackend {
    pub fn new(state: RemoteState) -> Self {
        Self {
            state: RefCell::new(state),
            ..Default::default()
        }
    }

    /// Make the next `times` calls of `op` fail with `status`.
    pub fn fail(&self, op: Op, times: usize, status: u16) {
        let mut faults = self.faults.borrow_mut();
        let queue = faults.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(BackendError::Status {
                operation: format!("{op:?}"),
                status,
            });
        }
    }

    pub fn calls(&self) -> Vec<Op> {
        self.calls.borrow().iter().map(|(op, _)| *op).collect()
    }

    /// Write calls with the record they targeted, in order.
    pub fn writes(&self) -> Vec<(Op, String)> {
        self.calls
            .borrow()
            .iter()
            .filter(|(op, _)| op.is_write())
            .cloned()
            .collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls.borrow().iter().filter(|(o, _)| *o == op).count()
    }

    pub fn snapshot(&self) -> RemoteState {
        self.state.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, op: Op, target: impl Into<String>) -> BackendResult<()> {
        self.calls.borrow_mut().push((op, target.into()));
        match self.faults.borrow_mut().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn not_found(what: impl Into<String>) -> BackendError {
    BackendError::NotFound { what: what.into() }
}

impl Backend for FakeBackend {
    fn find_package(&self, name: &str) -> BackendResult<Option<u64>> {
        self.record(Op::FindPackage, name)?;
        Ok(self.state.borrow().packages.get(name).copied())
    }

    fn upload_artifact(&self, path: &Path) -> BackendResult<u64> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.record(Op::Upload, name.clone())?;
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.packages.insert(name, id);
        Ok(id)
    }

    fn put_package(&self, id: u64, metadata: &PackageMetadata) -> BackendResult<()> {
        self.record(Op::PutPackage, id.to_string())?;
        self.state
            .borrow_mut()
            .package_metadata
            .insert(id, metadata.clone());
        Ok(())
    }

    fn get_policy(&self, name: &str) -> BackendResult<DeploymentPolicy> {
        self.record(Op::GetPolicy, name)?;
        self.state
            .borrow()
            .policies
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| not_found(format!("policy '{name}'")))
    }

    fn put_policy(&self, policy: &DeploymentPolicy) -> BackendResult<u64> {
        self.record(Op::PutPolicy, policy.name.clone())?;
        let mut state = self.state.borrow_mut();
        let slot = state
            .policies
            .iter_mut()
            .find(|p| p.id == policy.id)
            .ok_or_else(|| not_found(format!("policy {}", policy.id)))?;
        *slot = policy.clone();
        Ok(policy.id)
    }

    fn list_patch_titles(&self) -> BackendResult<Vec<PatchTitleSummary>> {
        self.record(Op::ListPatchTitles, "")?;
        Ok(self.state.borrow().patch_titles.clone())
    }

    fn get_patch_definition(&self, id: u64) -> BackendResult<PatchDefinition> {
        self.record(Op::GetPatchDefinition, id.to_string())?;
        self.state
            .borrow()
            .definitions
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("patch definition {id}")))
    }

    fn put_patch_definition(&self, definition: &PatchDefinition) -> BackendResult<()> {
        self.record(Op::PutPatchDefinition, definition.name.clone())?;
        self.state
            .borrow_mut()
            .definitions
            .insert(definition.id, definition.clone());
        Ok(())
    }

    fn list_patch_policies(&self, patch_title_id: u64) -> BackendResult<Vec<PatchPolicySummary>> {
        self.record(Op::ListPatchPolicies, patch_title_id.to_string())?;
        Ok(self
            .state
            .borrow()
            .patch_policy_lists
            .get(&patch_title_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_patch_policy(&self, id: u64) -> BackendResult<PatchPolicy> {
        self.record(Op::GetPatchPolicy, id.to_string())?;
        self.state
            .borrow()
            .patch_policies
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("patch policy {id}")))
    }

    fn put_patch_policy(&self, policy: &PatchPolicy) -> BackendResult<u64> {
        self.record(Op::PutPatchPolicy, policy.name.clone())?;
        self.state
            .borrow_mut()
            .patch_policies
            .insert(policy.id, policy.clone());
        Ok(policy.id)
    }
}

pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    pub fn at(value: &str) -> Self {
        Self(NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Default)]
pub struct RecordingSleeper(pub RefCell<Vec<Duration>>);

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub fn install(reference: PackageRef) -> PolicyPackage {
    PolicyPackage {
        reference,
        action: Some("Install".to_string()),
    }
}

fn patch_policy(id: u64, name: &str, target: &str, description: &str) -> PatchPolicy {
    PatchPolicy {
        id,
        name: name.to_string(),
        enabled: true,
        target_version: target.to_string(),
        release_date: Some("2023-12-01".to_string()),
        self_service_description: description.to_string(),
        entered_stage: parse_entered_stage(description),
        deadline: None,
    }
}

/// `MyApp` 3.2.1 sitting in test, 3.1.0 on stable, with patch title `MyApp`
/// declaring 3.3.0, 3.2.1 and 3.1.0.
pub fn my_app_state() -> RemoteState {
    let mut state = RemoteState {
        next_id: 900,
        ..Default::default()
    };
    state.packages.insert("MyApp-3.1.0.pkg".to_string(), 400);
    state.packages.insert("MyApp-3.2.1.pkg".to_string(), 501);
    state.policies = vec![
        DeploymentPolicy {
            id: 10,
            name: "TEST-MyApp".to_string(),
            enabled: true,
            packages: vec![install(PackageRef::new(501, "MyApp-3.2.1.pkg"))],
        },
        DeploymentPolicy {
            id: 11,
            name: "Install MyApp".to_string(),
            enabled: true,
            packages: vec![install(PackageRef::new(400, "MyApp-3.1.0.pkg"))],
        },
    ];
    state.patch_titles = vec![
        PatchTitleSummary {
            id: 3,
            name: "Zoom".to_string(),
        },
        PatchTitleSummary {
            id: 7,
            name: "MyApp".to_string(),
        },
    ];
    state.definitions.insert(
        7,
        PatchDefinition {
            id: 7,
            name: "MyApp".to_string(),
            versions: vec![
                PatchVersion {
                    software_version: "3.3.0".to_string(),
                    package: None,
                },
                PatchVersion {
                    software_version: "3.2.1".to_string(),
                    package: None,
                },
                PatchVersion {
                    software_version: "3.1.0".to_string(),
                    package: Some(PackageRef::new(400, "MyApp-3.1.0.pkg")),
                },
            ],
        },
    );
    state.patch_policy_lists.insert(
        7,
        vec![
            PatchPolicySummary {
                id: 20,
                name: "MyApp Test".to_string(),
            },
            PatchPolicySummary {
                id: 21,
                name: "MyApp Stable".to_string(),
            },
        ],
    );
    state.patch_policies.insert(
        20,
        patch_policy(20, "MyApp Test", "3.2.1", "Update MyApp (2024-01-12)"),
    );
    state.patch_policies.insert(
        21,
        patch_policy(21, "MyApp Stable", "3.1.0", "Update MyApp (2024-01-10)"),
    );
    state
}
