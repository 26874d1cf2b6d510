//! TOML parser with helpful error messages

use super::schema::PatchflowConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse patchflow.toml with detailed error messages
pub fn parse_config_toml(path: &Path) -> Result<PatchflowConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse patchflow.toml content from string
pub fn parse_config_toml_str(content: &str) -> Result<PatchflowConfig> {
    let config: PatchflowConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.message().to_string();

    let line_num = error
        .span()
        .map(|span| content[..span.start.min(content.len())].matches('\n').count() + 1);

    if let Some(line_num) = line_num {
        let context = get_line_context(content, line_num);
        anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            context,
            error_msg
        )
    } else {
        anyhow::anyhow!("TOML parsing error: {}", error_msg)
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 1).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &PatchflowConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
[server]
url = "https://example.jamfcloud.com"
user = "api"
password = "secret"

[import]
category = "Productivity"

[promote.Firefox]
patch = "Mozilla Firefox"
weekdays = "0123"
not_before = "09:00"
not_after = "16:00"
min_days = 7
dwell_from = "test"
"#;

        let config = parse_config_toml_str(toml).unwrap();
        assert_eq!(config.server.url, "https://example.jamfcloud.com");
        assert_eq!(config.import.category, "Productivity");
        assert_eq!(config.import.notes, "Built by Autopkg.");

        let firefox = config.promote_defaults("Firefox");
        assert_eq!(firefox.patch.as_deref(), Some("Mozilla Firefox"));
        assert_eq!(firefox.min_days, Some(7));
        assert_eq!(
            firefox.dwell_from,
            Some(crate::model::PatchTrack::Test)
        );
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config_toml_str("").unwrap();
        assert!(config.server.url.is_empty());
        assert!(config.promote.is_empty());
        assert_eq!(config.import.category, "Applications");
    }

    #[test]
    fn test_parse_invalid_weekdays() {
        let toml = r#"
[promote.Zoom]
weekdays = "19"
"#;
        let err = parse_config_toml_str(toml).unwrap_err();
        assert!(format!("{err:#}").contains("Zoom"));
    }

    #[test]
    fn test_parse_inverted_window() {
        let toml = r#"
[promote.Zoom]
not_before = "17:00"
not_after = "09:00"
"#;
        assert!(parse_config_toml_str(toml).is_err());
    }

    #[test]
    fn test_parse_error_shows_line() {
        let toml = "[server]\nurl = \"https://x\"\nuser = \n";
        let err = parse_config_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_parse_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nurl = \"https://example.com\"\nuser = \"api\"").unwrap();

        let config = parse_config_toml(file.path()).unwrap();
        assert_eq!(config.server.user, "api");
    }

    #[test]
    fn test_error_at_line_start_points_at_that_line() {
        let err = parse_config_toml_str("[server]\nurl = \"x\"\n!bad = 1\n").unwrap_err();
        let message = err.to_string();

        assert!(message.contains("at line 3"), "{message}");
        assert!(message.contains(">>>    3 | !bad = 1"), "{message}");
    }

    #[test]
    fn test_to_toml_roundtrip_keeps_promote_entries() {
        let mut config = PatchflowConfig::new();
        config.promote.insert(
            "Zoom".to_string(),
            crate::config::PromoteConfigEntry {
                min_days: Some(2),
                ..Default::default()
            },
        );

        let text = to_toml(&config).unwrap();
        let parsed = parse_config_toml_str(&text).unwrap();
        assert_eq!(parsed.promote_defaults("Zoom").min_days, Some(2));
    }
}
