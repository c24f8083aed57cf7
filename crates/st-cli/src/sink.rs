//! Action sink that drives a media player through shell commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use st_core::{ActionSink, PlaybackState};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ActionsConfig;

/// Placeholder in `fade_command` replaced with the fade duration.
const FADE_MS_PLACEHOLDER: &str = "{ms}";

/// Runs the configured `[actions]` commands.
///
/// Failures are logged and swallowed: the engine only requests a pause.
#[derive(Debug)]
pub struct CommandSink {
    actions: ActionsConfig,
    /// Set while a fade has run and `restore_command` has not.
    faded: AtomicBool,
}

impl CommandSink {
    pub const fn new(actions: ActionsConfig) -> Self {
        Self {
            actions,
            faded: AtomicBool::new(false),
        }
    }

    /// Runs `restore_command` once per fade.
    async fn restore_if_faded(&self) {
        if !self.faded.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(restore) = self.actions.restore_command.as_deref() else {
            return;
        };
        debug!("restoring after fade");
        if let Err(err) = run_shell(restore).await {
            warn!(error = %err, "restore command failed");
        }
    }

    /// Pauses, waits, and pauses again if the player still reports playing.
    async fn pause_with_retry(&self) {
        let Some(pause) = self.actions.pause_command.as_deref() else {
            info!("no pause command configured, skipping pause");
            return;
        };
        if let Err(err) = run_shell(pause).await {
            warn!(error = %err, "pause command failed");
        }

        if self.actions.status_command.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(self.actions.pause_retry_delay_ms)).await;
        if self.is_playing().await {
            debug!("player still playing after pause, retrying");
            if let Err(err) = run_shell(pause).await {
                warn!(error = %err, "pause retry failed");
            }
        }
    }

    async fn is_playing(&self) -> bool {
        let Some(status) = self.actions.status_command.as_deref() else {
            return false;
        };
        match run_shell(status).await {
            Ok(output) => output.parse::<PlaybackState>() == Ok(PlaybackState::Playing),
            Err(err) => {
                warn!(error = %err, "status command failed");
                false
            }
        }
    }
}

#[async_trait]
impl ActionSink for CommandSink {
    async fn fade_and_pause(&self, fade_duration_ms: i64) {
        info!(fade_duration_ms, "fading out");
        match self.actions.fade_command.as_deref() {
            Some(fade) => {
                self.faded.store(true, Ordering::SeqCst);
                let command = fade.replace(FADE_MS_PLACEHOLDER, &fade_duration_ms.to_string());
                if let Err(err) = run_shell(&command).await {
                    warn!(error = %err, "fade command failed");
                }
            }
            None => {
                tokio::time::sleep(Duration::from_millis(fade_duration_ms.max(0).unsigned_abs()))
                    .await;
            }
        }
        self.pause_with_retry().await;
        self.restore_if_faded().await;
    }

    async fn pause_now(&self) {
        info!("pausing");
        self.pause_with_retry().await;
    }

    async fn on_disabled(&self) {
        info!("sticky mode off");
        self.restore_if_faded().await;
    }
}

/// Runs `command` through `sh -c` and returns its trimmed stdout.
async fn run_shell(command: &str) -> Result<String> {
    debug!(command, "running shell command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to spawn `{command}`"))?;

    if !output.status.success() {
        bail!(
            "`{command}` exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(dir: &std::path::Path) -> ActionsConfig {
        let log = dir.join("actions.log");
        ActionsConfig {
            pause_command: Some(format!("echo pause >> {}", log.display())),
            fade_command: Some(format!("echo fade {{ms}} >> {}", log.display())),
            restore_command: Some(format!("echo restore >> {}", log.display())),
            status_command: None,
            pause_retry_delay_ms: 0,
        }
    }

    fn read_log(dir: &std::path::Path) -> String {
        std::fs::read_to_string(dir.join("actions.log")).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_fade_substitutes_duration_then_pauses() {
        let temp = tempfile::tempdir().unwrap();
        let sink = CommandSink::new(actions(temp.path()));

        sink.fade_and_pause(2_500).await;
        assert_eq!(read_log(temp.path()), "fade 2500\npause\nrestore\n");
    }

    #[tokio::test]
    async fn test_disable_restores_only_an_unrestored_fade() {
        let temp = tempfile::tempdir().unwrap();
        let sink = CommandSink::new(actions(temp.path()));

        sink.on_disabled().await;
        assert_eq!(read_log(temp.path()), "");

        sink.faded.store(true, Ordering::SeqCst);
        sink.on_disabled().await;
        sink.on_disabled().await;
        assert_eq!(read_log(temp.path()), "restore\n");
    }

    #[tokio::test]
    async fn test_pause_now_does_not_restore() {
        let temp = tempfile::tempdir().unwrap();
        let sink = CommandSink::new(actions(temp.path()));

        sink.pause_now().await;
        assert_eq!(read_log(temp.path()), "pause\n");
    }

    #[tokio::test]
    async fn test_pause_retries_while_still_playing() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = actions(temp.path());
        config.status_command = Some("echo Playing".to_string());
        let sink = CommandSink::new(config);

        sink.pause_now().await;
        assert_eq!(read_log(temp.path()), "pause\npause\n");
    }

    #[tokio::test]
    async fn test_pause_not_retried_once_paused() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = actions(temp.path());
        config.status_command = Some("echo Paused".to_string());
        let sink = CommandSink::new(config);

        sink.pause_now().await;
        assert_eq!(read_log(temp.path()), "pause\n");
    }

    #[tokio::test]
    async fn test_failing_command_is_swallowed() {
        let sink = CommandSink::new(ActionsConfig {
            pause_command: Some("exit 3".to_string()),
            ..ActionsConfig::default()
        });
        sink.pause_now().await;
    }

    #[tokio::test]
    async fn test_run_shell_reports_exit_status() {
        let err = run_shell("echo nope >&2; exit 2").await.unwrap_err();
        assert!(err.to_string().contains("nope"), "{err}");
    }
}
