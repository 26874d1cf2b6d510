//! Configuration schema for patchflow.toml

use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::backend::Credentials;
use crate::gate::{GateConfig, WeekdaySet, parse_time_of_day};
use crate::model::PatchTrack;
use crate::pipeline::import::{DEFAULT_CATEGORY, DEFAULT_NOTES};

/// Root configuration structure for patchflow.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatchflowConfig {
    /// Server endpoint and API account
    #[serde(default)]
    pub server: ServerConfig,

    /// Metadata applied to uploaded packages
    #[serde(default)]
    pub import: ImportConfig,

    /// Per-title promotion defaults, keyed by software title
    #[serde(default)]
    pub promote: HashMap<String, PromoteConfigEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// Base URL, e.g. https://example.jamfcloud.com
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,
}

impl ServerConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_category")]
    pub category: String,

    /// Notes prefix; the upload date is appended
    #[serde(default = "default_notes")]
    pub notes: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            notes: default_notes(),
        }
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_notes() -> String {
    DEFAULT_NOTES.to_string()
}

/// Promotion defaults for one title. Command-line flags override each field.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PromoteConfigEntry {
    /// Patch title, when it differs from the software title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    /// Permitted weekdays as digits, 0 = Monday
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<String>,

    /// Earliest time of day, HH:MM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,

    /// Latest time of day, HH:MM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,

    /// Minimum days in the measured stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_days: Option<u32>,

    /// Patch policy carrying the dwell stamp (stable or test)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dwell_from: Option<PatchTrack>,
}

impl PromoteConfigEntry {
    /// Overlay `other` on top of this entry, field by field.
    pub fn overridden_by(&self, other: &PromoteConfigEntry) -> PromoteConfigEntry {
        PromoteConfigEntry {
            patch: other.patch.clone().or_else(|| self.patch.clone()),
            weekdays: other.weekdays.clone().or_else(|| self.weekdays.clone()),
            not_before: other.not_before.clone().or_else(|| self.not_before.clone()),
            not_after: other.not_after.clone().or_else(|| self.not_after.clone()),
            min_days: other.min_days.or(self.min_days),
            dwell_from: other.dwell_from.or(self.dwell_from),
        }
    }

    /// Parse the textual gate fields.
    pub fn gate(&self) -> anyhow::Result<GateConfig> {
        let weekdays = self
            .weekdays
            .as_deref()
            .map(WeekdaySet::from_digits)
            .transpose()
            .context("Invalid weekdays")?;
        let not_before = self
            .not_before
            .as_deref()
            .map(parse_time_of_day)
            .transpose()
            .context("Invalid not_before")?;
        let not_after = self
            .not_after
            .as_deref()
            .map(parse_time_of_day)
            .transpose()
            .context("Invalid not_after")?;

        Ok(GateConfig {
            weekdays,
            not_before,
            not_after,
            min_dwell_days: self.min_days,
        })
    }
}

impl PatchflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Promotion defaults for a title, empty when none are configured.
    pub fn promote_defaults(&self, title: &str) -> PromoteConfigEntry {
        self.promote.get(title).cloned().unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (title, entry) in &self.promote {
            entry
                .gate()
                .with_context(|| format!("Invalid promote settings for '{}'", title))?;
            if let (Some(before), Some(after)) = (&entry.not_before, &entry.not_after)
                && parse_time_of_day(before)? > parse_time_of_day(after)?
            {
                anyhow::bail!(
                    "Promote settings for '{}': not_before {} is later than not_after {}",
                    title,
                    before,
                    after
                );
            }
        }
        Ok(())
    }

    /// Check the server section before connecting.
    pub fn require_server(&self) -> anyhow::Result<&ServerConfig> {
        if self.server.url.trim().is_empty() {
            anyhow::bail!("Server URL is not configured. Set [server] url in patchflow.toml");
        }
        if self.server.user.trim().is_empty() {
            anyhow::bail!("API user is not configured. Set [server] user in patchflow.toml");
        }
        Ok(&self.server)
    }
}
