//! Configure command: the settings surface for endpoint and operator label.
//!
//! Edits the TOML config file in place, keeping keys it does not manage.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use toml::{Table, Value};

const ENDPOINT_KEY: &str = "endpoint_url";
const OPERATOR_KEY: &str = "operator_label";

/// Requested settings changes.
#[derive(Debug, Default, Clone)]
pub struct SettingsUpdate<'a> {
    pub endpoint: Option<&'a str>,
    pub clear_endpoint: bool,
    pub operator: Option<&'a str>,
}

fn load_table(path: &Path) -> Result<Table> {
    match fs::read_to_string(path) {
        Ok(content) => content
            .parse::<Table>()
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Table::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

pub fn run<W: Write>(writer: &mut W, path: &Path, update: &SettingsUpdate<'_>) -> Result<()> {
    let mut table = load_table(path)?;

    if let Some(endpoint) = update.endpoint {
        let endpoint = endpoint.trim();
        et_http::parse_endpoint(endpoint)?;
        table.insert(ENDPOINT_KEY.to_string(), Value::String(endpoint.to_string()));
    }
    if update.clear_endpoint {
        table.remove(ENDPOINT_KEY);
    }
    if let Some(operator) = update.operator {
        let operator = operator.trim();
        if operator.is_empty() {
            table.remove(OPERATOR_KEY);
        } else {
            table.insert(OPERATOR_KEY.to_string(), Value::String(operator.to_string()));
        }
    }

    let changed = update.endpoint.is_some() || update.clear_endpoint || update.operator.is_some();
    if changed {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let content = toml::to_string_pretty(&table).context("failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "configuration saved");
        writeln!(writer, "Configuration saved to {}", path.display())?;
    }

    let endpoint = table
        .get(ENDPOINT_KEY)
        .and_then(Value::as_str)
        .unwrap_or("(not set)");
    let operator = table
        .get(OPERATOR_KEY)
        .and_then(Value::as_str)
        .unwrap_or(et_core::DEFAULT_OPERATOR);
    writeln!(writer, "Endpoint: {endpoint}")?;
    writeln!(writer, "Operator: {operator}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::Config;

    #[test]
    fn test_writes_settings_and_keeps_other_keys() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "database_path = \"/tmp/et.db\"\n").unwrap();

        let mut output = Vec::new();
        let update = SettingsUpdate {
            endpoint: Some(" https://hooks.example.com/sessions "),
            operator: Some("Dana"),
            ..SettingsUpdate::default()
        };
        run(&mut output, &path, &update).unwrap();

        let table = load_table(&path).unwrap();
        assert_eq!(table["database_path"].as_str(), Some("/tmp/et.db"));
        assert_eq!(
            table[ENDPOINT_KEY].as_str(),
            Some("https://hooks.example.com/sessions")
        );
        assert_eq!(table[OPERATOR_KEY].as_str(), Some("Dana"));

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Endpoint: https://hooks.example.com/sessions"));
        assert!(output.contains("Operator: Dana"));
    }

    #[test]
    fn test_written_file_loads_as_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let update = SettingsUpdate {
            endpoint: Some("http://localhost:5678/webhook"),
            ..SettingsUpdate::default()
        };
        run(&mut Vec::new(), &path, &update).unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(
            config.endpoint_url.as_deref(),
            Some("http://localhost:5678/webhook")
        );
    }

    #[test]
    fn test_clear_endpoint_and_blank_operator_remove_keys() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "endpoint_url = \"https://a.example.com\"\noperator_label = \"Dana\"\n",
        )
        .unwrap();

        let mut output = Vec::new();
        let update = SettingsUpdate {
            clear_endpoint: true,
            operator: Some("  "),
            ..SettingsUpdate::default()
        };
        run(&mut output, &path, &update).unwrap();

        let table = load_table(&path).unwrap();
        assert!(table.is_empty());
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Endpoint: (not set)"));
        assert!(output.contains("Operator: Unknown"));
    }

    #[test]
    fn test_rejects_invalid_endpoint_without_writing() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");

        let update = SettingsUpdate {
            endpoint: Some("ftp://example.com"),
            ..SettingsUpdate::default()
        };
        assert!(run(&mut Vec::new(), &path, &update).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_no_changes_only_prints_current_settings() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");

        let mut output = Vec::new();
        run(&mut output, &path, &SettingsUpdate::default()).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Endpoint: (not set)\nOperator: Unknown\n"
        );
        assert!(!path.exists());
    }
}
