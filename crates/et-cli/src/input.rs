//! JSON-lines activity source read by `et run`.
//!
//! Each line is one message:
//!
//! ```text
//! {"type":"activity","contact":"Bob","approxTime":1738152000000}
//! {"type":"activity","contact":"Ana","prePlainText":"[14:05, 29/01/2025] Ana: "}
//! {"type":"clear","contact":"Bob"}
//! {"type":"reload-config"}
//! ```

use anyhow::{Context, Result};
use et_core::ActivityEvent;
use serde::Deserialize;

/// One line of tracker input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InputLine {
    /// Outgoing activity detected for a contact.
    Activity(ActivityEvent),
    /// Drop a contact's session without delivering it.
    Clear { contact: String },
    /// Re-read configuration.
    ReloadConfig,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<InputLine>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let input: InputLine = serde_json::from_str(line).context("failed to parse input line")?;
    match &input {
        InputLine::Activity(ActivityEvent { contact, .. }) | InputLine::Clear { contact }
            if contact.trim().is_empty() =>
        {
            anyhow::bail!("contact cannot be empty");
        }
        _ => {}
    }
    Ok(Some(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_activity_with_timestamp() {
        let input = parse_line(r#"{"type":"activity","contact":"Bob","approxTime":30000}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            input,
            InputLine::Activity(ActivityEvent::new("Bob", Some(30_000)))
        );
    }

    #[test]
    fn test_parses_activity_with_message_prefix() {
        let input = parse_line(
            r#"{"type":"activity","contact":"Ana","prePlainText":"[14:05, 29/01/2025] Ana: "}"#,
        )
        .unwrap()
        .unwrap();
        let InputLine::Activity(event) = input else {
            panic!("expected activity");
        };
        assert!(event.approx_time.is_none());
        assert!(event.event_time().is_some());
    }

    #[test]
    fn test_parses_control_lines() {
        assert_eq!(
            parse_line(r#"{"type":"clear","contact":"Bob"}"#).unwrap(),
            Some(InputLine::Clear {
                contact: "Bob".to_string()
            })
        );
        assert_eq!(
            parse_line(r#"{"type":"reload-config"}"#).unwrap(),
            Some(InputLine::ReloadConfig)
        );
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_rejects_empty_contact() {
        let err = parse_line(r#"{"type":"activity","contact":"  "}"#).unwrap_err();
        assert!(err.to_string().contains("contact"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(parse_line("{not json").is_err());
        assert!(parse_line(r#"{"type":"explode"}"#).is_err());
    }
}
