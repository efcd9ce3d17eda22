//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use et_core::{
    DEFAULT_OPERATOR, INACTIVITY_TIMEOUT, LifecycleSettings, STALE_TOLERANCE_MS, StalePolicy,
    TrackerConfig,
};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the session database file.
    pub database_path: PathBuf,
    /// Where finalized sessions are POSTed. Unset disables delivery.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Operator label stamped on new sessions.
    pub operator_label: String,
    /// Inactivity before a session is finalized.
    pub inactivity_timeout_ms: u64,
    /// Allowed skew between a page timestamp and the session start.
    pub stale_tolerance_ms: i64,
    /// Handling of activity that predates the live session.
    pub stale_policy: StalePolicy,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field(
                "endpoint_url",
                &self.endpoint_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("operator_label", &self.operator_label)
            .field("inactivity_timeout_ms", &self.inactivity_timeout_ms)
            .field("stale_tolerance_ms", &self.stale_tolerance_ms)
            .field("stale_policy", &self.stale_policy)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("et.db"),
            endpoint_url: None,
            operator_label: DEFAULT_OPERATOR.to_string(),
            inactivity_timeout_ms: u64::try_from(INACTIVITY_TIMEOUT.as_millis())
                .unwrap_or(60_000),
            stale_tolerance_ms: STALE_TOLERANCE_MS,
            stale_policy: StalePolicy::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup and on reload"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ET_*)
        figment = figment.merge(Env::prefixed("ET_"));

        figment.extract()
    }

    /// Per-call configuration handed to the session lifecycle.
    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            endpoint_url: self.endpoint_url.clone(),
            operator_label: self.operator_label.clone(),
        }
    }

    /// Session lifecycle settings. A negative stale tolerance counts as zero.
    pub const fn lifecycle(&self) -> LifecycleSettings {
        let stale_tolerance_ms = if self.stale_tolerance_ms < 0 {
            0
        } else {
            self.stale_tolerance_ms
        };
        LifecycleSettings {
            inactivity_timeout: Duration::from_millis(self.inactivity_timeout_ms),
            stale_tolerance_ms,
            stale_policy: self.stale_policy,
        }
    }
}

/// The file `et configure` writes: the explicit config file, or the default one.
pub fn settings_file_path(config_path: Option<&Path>) -> Option<PathBuf> {
    config_path
        .map(Path::to_path_buf)
        .or_else(|| dirs_config_path().map(|dir| dir.join("config.toml")))
}

/// Returns the platform-specific config directory for et.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("et"))
}

/// Returns the platform-specific data directory for et.
///
/// On Linux: `~/.local/share/et`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("et"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_et() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "et");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("et.db"));
        assert_eq!(config.operator_label, "Unknown");
        assert_eq!(config.inactivity_timeout_ms, 60_000);
        assert_eq!(config.stale_policy, StalePolicy::Restart);
        assert!(config.endpoint_url.is_none());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_path = "/tmp/et-test.db"
endpoint_url = "https://hooks.example.com/sessions"
operator_label = "Dana"
inactivity_timeout_ms = 5000
stale_policy = "drop"
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/et-test.db"));
        assert_eq!(
            config.tracker().endpoint(),
            Some("https://hooks.example.com/sessions")
        );
        assert_eq!(config.tracker().operator(), "Dana");

        let settings = config.lifecycle();
        assert_eq!(settings.inactivity_timeout, Duration::from_secs(5));
        assert_eq!(settings.stale_policy, StalePolicy::Drop);
        assert_eq!(settings.stale_tolerance_ms, 1_000);
    }

    #[test]
    fn test_negative_stale_tolerance_is_zero() {
        let config = Config {
            stale_tolerance_ms: i64::MIN,
            ..Config::default()
        };
        assert_eq!(config.lifecycle().stale_tolerance_ms, 0);
    }

    #[test]
    fn test_debug_redacts_endpoint() {
        let config = Config {
            endpoint_url: Some("https://hooks.example.com/s?token=secret".to_string()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_settings_file_prefers_explicit_path() {
        let explicit = PathBuf::from("/etc/et.toml");
        assert_eq!(settings_file_path(Some(&explicit)), Some(explicit));
        assert!(
            settings_file_path(None)
                .unwrap()
                .ends_with("et/config.toml")
        );
    }
}
