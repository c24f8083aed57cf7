//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use st_core::StickySettings;

/// Delay before checking whether a pause took effect.
const DEFAULT_PAUSE_RETRY_DELAY_MS: u64 = 700;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Enable the timer as soon as `st run` starts.
    #[serde(default = "default_true")]
    pub start_enabled: bool,

    /// Session policy durations.
    #[serde(default)]
    pub settings: StickySettings,

    /// Shell commands used to act on the media player.
    #[serde(default)]
    pub actions: ActionsConfig,
}

/// Shell commands the action sink runs. All optional; without a pause
/// command, actions are only logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Pauses playback, e.g. `playerctl pause`.
    #[serde(default)]
    pub pause_command: Option<String>,

    /// Fades playback out; `{ms}` is replaced with the fade duration.
    #[serde(default)]
    pub fade_command: Option<String>,

    /// Undoes a fade once the player is paused, e.g. restoring the volume.
    #[serde(default)]
    pub restore_command: Option<String>,

    /// Prints the current playback state, e.g. `playerctl status`.
    #[serde(default)]
    pub status_command: Option<String>,

    /// How long to wait before re-checking that a pause took effect.
    #[serde(default = "default_pause_retry_delay_ms")]
    pub pause_retry_delay_ms: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_pause_retry_delay_ms() -> u64 {
    DEFAULT_PAUSE_RETRY_DELAY_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_enabled: true,
            settings: StickySettings::default(),
            actions: ActionsConfig::default(),
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            pause_command: None,
            fade_command: None,
            restore_command: None,
            status_command: None,
            pause_retry_delay_ms: DEFAULT_PAUSE_RETRY_DELAY_MS,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Durations are clamped to their supported ranges after merging.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
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

        // Load from environment variables (ST_*, nested keys split on `__`)
        figment = figment.merge(Env::prefixed("ST_").split("__"));

        let mut config: Self = figment.extract()?;
        config.settings = config.settings.clamped();
        Ok(config)
    }
}

/// Returns the platform-specific config directory for st.
///
/// On Linux: `~/.config/sticky-timer`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sticky-timer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_dirs_config_path_ends_with_sticky_timer() {
        let path = dirs_config_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "sticky-timer");
    }

    #[test]
    fn test_default_config_serializes() {
        let json = serde_json::to_string_pretty(&Config::default()).unwrap();
        insta::assert_snapshot!(json, @r#"
        {
          "start_enabled": true,
          "settings": {
            "session_duration_sec": 300,
            "fade_duration_sec": 10,
            "reengagement_window_sec": 30,
            "max_active_window_min": 90
          },
          "actions": {
            "pause_command": null,
            "fade_command": null,
            "restore_command": null,
            "status_command": null,
            "pause_retry_delay_ms": 700
          }
        }
        "#);
    }

    #[test]
    fn test_file_overrides_and_clamps() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
start_enabled = false

[settings]
session_duration_sec = 10
fade_duration_sec = 0

[actions]
pause_command = "playerctl pause"
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert!(!config.start_enabled);
        assert_eq!(config.settings.session_duration_sec, 60);
        assert_eq!(config.settings.fade_duration_sec, 0);
        assert_eq!(config.actions.pause_command.as_deref(), Some("playerctl pause"));
        assert_eq!(config.actions.pause_retry_delay_ms, DEFAULT_PAUSE_RETRY_DELAY_MS);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config::load_from(Some(&temp.path().join("absent.toml"))).unwrap();
        assert_eq!(config.settings.fade_duration_sec, 10);
    }
}
