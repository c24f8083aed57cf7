//! Run command: drives the engine from a line-oriented playback source.

use std::io::Write;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use st_core::{
    ActionSink, Clock, DisableReason, MonotonicClock, PlaybackState, StickyEngine, StickySnapshot,
    SystemClock,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::Config;
use crate::sink::CommandSink;

/// A parsed input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Enable,
    Disable,
    Status,
    Playback(PlaybackState),
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "enable" => Some(Self::Enable),
            "disable" => Some(Self::Disable),
            "status" => Some(Self::Status),
            other => match other.parse() {
                Ok(state) => Some(Self::Playback(state)),
                Err(err) => {
                    warn!(error = %err, "ignoring input line");
                    None
                }
            },
        }
    }
}

/// Runs the timer against stdin or the stdout of `source`.
pub async fn run(config: &Config, source: Option<&str>, json: bool) -> Result<()> {
    let sink: Arc<dyn ActionSink> = Arc::new(CommandSink::new(config.actions.clone()));
    let mut stdout = std::io::stdout();

    match source {
        Some(command) => {
            info!(command, "reading playback states from source command");
            let mut child = Command::new("sh")
                .arg("-c")
                .arg(command)
                .stdout(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .with_context(|| format!("failed to spawn source `{command}`"))?;
            let output = child
                .stdout
                .take()
                .context("source command has no stdout")?;
            run_with_input(BufReader::new(output), &mut stdout, config, sink, json).await
        }
        None => {
            let input = BufReader::new(tokio::io::stdin());
            run_with_input(input, &mut stdout, config, sink, json).await
        }
    }
}

/// Feeds `input` lines to a fresh engine and writes each distinct snapshot.
///
/// At end of input the engine is disabled and the final snapshot written.
pub async fn run_with_input<R, W>(
    input: R,
    writer: &mut W,
    config: &Config,
    sink: Arc<dyn ActionSink>,
    json: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let settings = config.settings;
    let engine = StickyEngine::spawn(MonotonicClock::new(), move || settings, sink);
    let mut updates = engine.subscribe();
    let mut printer = SnapshotPrinter::new(json);
    let mut lines = input.lines();

    if config.start_enabled {
        engine.enable();
    }

    loop {
        tokio::select! {
            biased;
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                match Input::parse(&line) {
                    Some(Input::Enable) => engine.enable(),
                    Some(Input::Disable) => engine.disable(DisableReason::ManualStop),
                    Some(Input::Status) => {
                        let snapshot = engine.settle().await?;
                        printer.print(writer, &snapshot)?;
                    }
                    Some(Input::Playback(state)) => {
                        engine.on_playback_state_changed(state, SystemClock.now_ms());
                    }
                    None => {}
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *updates.borrow_and_update();
                printer.print(writer, &snapshot)?;
            }
        }
    }

    debug!("input closed, disabling");
    engine.disable(DisableReason::ManualStop);
    let snapshot = engine.settle().await?;
    printer.print(writer, &snapshot)?;
    Ok(())
}

/// Writes snapshots, skipping repeats of the last one written.
struct SnapshotPrinter {
    json: bool,
    last: Option<StickySnapshot>,
}

impl SnapshotPrinter {
    const fn new(json: bool) -> Self {
        Self { json, last: None }
    }

    fn print<W: Write>(&mut self, writer: &mut W, snapshot: &StickySnapshot) -> Result<()> {
        if self.last.as_ref() == Some(snapshot) {
            return Ok(());
        }
        self.last = Some(*snapshot);

        if self.json {
            writeln!(writer, "{}", serde_json::to_string(snapshot)?)?;
        } else {
            writeln!(writer, "{}", render_status(snapshot))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Human-readable one-line status.
pub fn render_status(snapshot: &StickySnapshot) -> String {
    if !snapshot.is_enabled {
        return snapshot.phase.to_string();
    }
    format!(
        "{} session={} window={}",
        snapshot.phase,
        format_remaining(snapshot.remaining_session_ms),
        format_remaining(snapshot.max_window_remaining_ms)
    )
}

/// Formats milliseconds as `mm:ss`, rounding up to whole seconds.
fn format_remaining(ms: i64) -> String {
    let secs = (ms.max(0) + 999) / 1_000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use st_core::Phase;

    fn dry_run_sink() -> Arc<dyn ActionSink> {
        Arc::new(CommandSink::new(crate::ActionsConfig::default()))
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(1), "00:01");
        assert_eq!(format_remaining(299_500), "05:00");
        assert_eq!(format_remaining(5_400_000), "90:00");
        assert_eq!(format_remaining(-10), "00:00");
    }

    #[test]
    fn test_render_status() {
        let running = StickySnapshot {
            is_enabled: true,
            phase: Phase::SessionRunning,
            remaining_session_ms: 61_000,
            max_window_remaining_ms: 3_600_000,
        };
        assert_snapshot!(render_status(&running), @"session_running session=01:01 window=60:00");
        assert_snapshot!(render_status(&StickySnapshot::off()), @"off");
    }

    #[test]
    fn test_input_parse() {
        assert_eq!(Input::parse("enable"), Some(Input::Enable));
        assert_eq!(Input::parse(" Disable "), Some(Input::Disable));
        assert_eq!(Input::parse("Playing"), Some(Input::Playback(PlaybackState::Playing)));
        assert_eq!(Input::parse(""), None);
        assert_eq!(Input::parse("volume up"), None);
    }

    #[tokio::test]
    async fn test_run_prints_distinct_snapshots() {
        let config = Config {
            start_enabled: false,
            ..Config::default()
        };
        let input: &[u8] = b"enable\nstatus\nstatus\ndisable\nstatus\n";
        let mut output = Vec::new();

        run_with_input(input, &mut output, &config, dry_run_sink(), false)
            .await
            .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        on_idle session=00:00 window=00:00
        off
        ");
    }

    #[tokio::test]
    async fn test_run_json_ends_disabled() {
        let config = Config::default();
        let input: &[u8] = b"playing\nstatus\n";
        let mut output = Vec::new();

        run_with_input(input, &mut output, &config, dry_run_sink(), true)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        let last: StickySnapshot = serde_json::from_str(output.lines().last().unwrap()).unwrap();
        assert_eq!(last, StickySnapshot::off());
        let first: StickySnapshot = serde_json::from_str(output.lines().next().unwrap()).unwrap();
        assert_eq!(first.phase, Phase::OnIdle);
    }
}
