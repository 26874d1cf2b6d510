//! XML wire records of the Classic API.
//!
//! Reads decode the full record and keep the fields the model needs. Writes
//! send only the elements this system owns; the server leaves omitted
//! elements untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};
use crate::model::{
    Deadline, DeploymentPolicy, PackageMetadata, PackageRef, PatchDefinition, PatchPolicy,
    PatchPolicySummary, PatchTitleSummary, PatchVersion, PolicyPackage, parse_entered_stage,
};

pub fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> BackendResult<T> {
    quick_xml::de::from_str(body).map_err(|e| BackendError::Decode {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

pub fn encode<T: Serialize>(operation: &str, value: &T) -> BackendResult<String> {
    quick_xml::se::to_string(value).map_err(|e| BackendError::Decode {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

/// Package reference as it appears inside records. Unattached references come
/// back as an empty element.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PackageRefXml {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
}

impl PackageRefXml {
    fn into_model(self) -> Option<PackageRef> {
        let id = self.id.trim().parse::<u64>().ok()?;
        let name = self.name.trim();
        if name.is_empty() || name == "None" {
            return None;
        }
        Some(PackageRef::new(id, name))
    }
}

impl From<&PackageRef> for PackageRefXml {
    fn from(value: &PackageRef) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name.clone(),
            action: None,
        }
    }
}

impl PackageRefXml {
    fn into_policy_package(self) -> Option<PolicyPackage> {
        let action = self.action.clone().filter(|a| !a.trim().is_empty());
        self.into_model()
            .map(|reference| PolicyPackage { reference, action })
    }
}

impl From<&PolicyPackage> for PackageRefXml {
    fn from(value: &PolicyPackage) -> Self {
        Self {
            action: value.action.clone(),
            ..Self::from(&value.reference)
        }
    }
}

/// `<anything><id>N</id></anything>` as echoed by writes and uploads.
#[derive(Debug, Deserialize)]
struct IdEcho {
    #[serde(default)]
    id: String,
}

pub fn parse_id_echo(operation: &str, body: &str) -> BackendResult<u64> {
    let echo: IdEcho = decode(operation, body)?;
    echo.id.trim().parse().map_err(|_| BackendError::Decode {
        operation: operation.to_string(),
        message: format!("response carried no id: '{}'", echo.id),
    })
}

// Packages

#[derive(Debug, Serialize)]
#[serde(rename = "package")]
struct PackageUpdateXml<'a> {
    id: u64,
    category: &'a str,
    notes: &'a str,
}

pub fn package_body(id: u64, metadata: &PackageMetadata) -> BackendResult<String> {
    encode(
        "encode package",
        &PackageUpdateXml {
            id,
            category: &metadata.category,
            notes: &metadata.notes,
        },
    )
}

// Deployment policies

#[derive(Debug, Default, Serialize, Deserialize)]
struct PolicyGeneralXml {
    #[serde(default, skip_serializing)]
    id: u64,
    #[serde(default, skip_serializing)]
    name: String,
    #[serde(default)]
    enabled: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PackagesXml {
    #[serde(rename = "package", default)]
    packages: Vec<PackageRefXml>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PackageConfigurationXml {
    #[serde(default)]
    packages: PackagesXml,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "policy")]
struct PolicyXml {
    general: PolicyGeneralXml,
    #[serde(default)]
    package_configuration: PackageConfigurationXml,
}

pub fn parse_policy(body: &str) -> BackendResult<DeploymentPolicy> {
    let policy: PolicyXml = decode("decode policy", body)?;
    Ok(DeploymentPolicy {
        id: policy.general.id,
        name: policy.general.name,
        enabled: policy.general.enabled,
        packages: policy
            .package_configuration
            .packages
            .packages
            .into_iter()
            .filter_map(PackageRefXml::into_policy_package)
            .collect(),
    })
}

pub fn policy_body(policy: &DeploymentPolicy) -> BackendResult<String> {
    let wire = PolicyXml {
        general: PolicyGeneralXml {
            enabled: policy.enabled,
            ..PolicyGeneralXml::default()
        },
        package_configuration: PackageConfigurationXml {
            packages: PackagesXml {
                packages: policy.packages.iter().map(PackageRefXml::from).collect(),
            },
        },
    };
    encode("encode policy", &wire)
}

// Patch titles and definitions

#[derive(Debug, Deserialize)]
struct SummaryXml {
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct PatchTitleListXml {
    #[serde(rename = "patch_software_title", default)]
    titles: Vec<SummaryXml>,
}

pub fn parse_patch_titles(body: &str) -> BackendResult<Vec<PatchTitleSummary>> {
    let list: PatchTitleListXml = decode("decode patch title list", body)?;
    Ok(list
        .titles
        .into_iter()
        .map(|t| PatchTitleSummary {
            id: t.id,
            name: t.name,
        })
        .collect())
}

#[derive(Debug, Serialize, Deserialize)]
struct PatchVersionXml {
    software_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    package: Option<PackageRefXml>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PatchVersionsXml {
    #[serde(rename = "version", default)]
    versions: Vec<PatchVersionXml>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "patch_software_title")]
struct PatchDefinitionXml {
    #[serde(default, skip_serializing)]
    id: u64,
    #[serde(default, skip_serializing)]
    name: String,
    #[serde(default)]
    versions: PatchVersionsXml,
}

pub fn parse_patch_definition(body: &str) -> BackendResult<PatchDefinition> {
    let definition: PatchDefinitionXml = decode("decode patch definition", body)?;
    Ok(PatchDefinition {
        id: definition.id,
        name: definition.name,
        versions: definition
            .versions
            .versions
            .into_iter()
            .map(|v| PatchVersion {
                software_version: v.software_version,
                package: v.package.and_then(PackageRefXml::into_model),
            })
            .collect(),
    })
}

pub fn patch_definition_body(definition: &PatchDefinition) -> BackendResult<String> {
    let wire = PatchDefinitionXml {
        id: definition.id,
        name: definition.name.clone(),
        versions: PatchVersionsXml {
            versions: definition
                .versions
                .iter()
                .map(|v| PatchVersionXml {
                    software_version: v.software_version.clone(),
                    package: v.package.as_ref().map(PackageRefXml::from),
                })
                .collect(),
        },
    };
    encode("encode patch definition", &wire)
}

// Patch policies

#[derive(Debug, Deserialize)]
struct PatchPolicyListXml {
    #[serde(rename = "patch_policy", default)]
    policies: Vec<SummaryXml>,
}

pub fn parse_patch_policies(body: &str) -> BackendResult<Vec<PatchPolicySummary>> {
    let list: PatchPolicyListXml = decode("decode patch policy list", body)?;
    Ok(list
        .policies
        .into_iter()
        .map(|p| PatchPolicySummary {
            id: p.id,
            name: p.name,
        })
        .collect())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PatchPolicyGeneralXml {
    #[serde(default, skip_serializing)]
    id: u64,
    #[serde(default, skip_serializing)]
    name: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    target_version: String,
    #[serde(default)]
    release_date: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeadlinesXml {
    #[serde(default)]
    deadline_enabled: bool,
    #[serde(default)]
    deadline_period: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserInteractionXml {
    #[serde(default)]
    self_service_description: String,
    #[serde(default, skip_serializing)]
    deadlines: Option<DeadlinesXml>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "patch_policy")]
struct PatchPolicyXml {
    general: PatchPolicyGeneralXml,
    #[serde(default)]
    user_interaction: UserInteractionXml,
}

pub fn parse_patch_policy(body: &str) -> BackendResult<PatchPolicy> {
    let policy: PatchPolicyXml = decode("decode patch policy", body)?;
    let general = policy.general;
    let interaction = policy.user_interaction;
    let release_date = Some(general.release_date.trim().to_string()).filter(|d| !d.is_empty());
    let deadline = interaction.deadlines.map(|d| Deadline {
        enabled: d.deadline_enabled,
        period_days: d.deadline_period.trim().parse().ok(),
    });

    Ok(PatchPolicy {
        id: general.id,
        name: general.name,
        enabled: general.enabled,
        target_version: general.target_version,
        release_date,
        entered_stage: parse_entered_stage(&interaction.self_service_description),
        self_service_description: interaction.self_service_description,
        deadline,
    })
}

pub fn patch_policy_body(policy: &PatchPolicy) -> BackendResult<String> {
    let wire = PatchPolicyXml {
        general: PatchPolicyGeneralXml {
            enabled: policy.enabled,
            target_version: policy.target_version.clone(),
            release_date: policy.release_date.clone().unwrap_or_default(),
            ..PatchPolicyGeneralXml::default()
        },
        user_interaction: UserInteractionXml {
            self_service_description: policy.self_service_description.clone(),
            deadlines: None,
        },
    };
    encode("encode patch policy", &wire)
}
