//! Session timer settings.
//!
//! Durations are stored in the units users configure them in (seconds, and
//! minutes for the max active window) and exposed to the engine as
//! milliseconds.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Default session length: 5 minutes.
pub const DEFAULT_SESSION_DURATION_SEC: u32 = 5 * 60;
/// Default fade length before pausing.
pub const DEFAULT_FADE_DURATION_SEC: u32 = 10;
/// Default grace period for instant re-arm after a stop.
pub const DEFAULT_REENGAGEMENT_WINDOW_SEC: u32 = 30;
/// Default ceiling on total active time.
pub const DEFAULT_MAX_ACTIVE_WINDOW_MIN: u32 = 90;

const SESSION_DURATION_RANGE_SEC: RangeInclusive<u32> = 60..=1800;
const FADE_DURATION_RANGE_SEC: RangeInclusive<u32> = 0..=60;
const REENGAGEMENT_WINDOW_RANGE_SEC: RangeInclusive<u32> = 5..=180;
const MAX_ACTIVE_WINDOW_RANGE_MIN: RangeInclusive<u32> = 15..=300;

/// The four durations that drive the session policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickySettings {
    /// How long playback may continue before an automatic pause.
    #[serde(default = "default_session_duration_sec")]
    pub session_duration_sec: u32,

    /// Fade length before pausing. Zero pauses immediately.
    #[serde(default = "default_fade_duration_sec")]
    pub fade_duration_sec: u32,

    /// Resuming within this long after a stop re-arms without debounce.
    #[serde(default = "default_reengagement_window_sec")]
    pub reengagement_window_sec: u32,

    /// Hard ceiling on active time before the feature turns itself off.
    #[serde(default = "default_max_active_window_min")]
    pub max_active_window_min: u32,
}

const fn default_session_duration_sec() -> u32 {
    DEFAULT_SESSION_DURATION_SEC
}

const fn default_fade_duration_sec() -> u32 {
    DEFAULT_FADE_DURATION_SEC
}

const fn default_reengagement_window_sec() -> u32 {
    DEFAULT_REENGAGEMENT_WINDOW_SEC
}

const fn default_max_active_window_min() -> u32 {
    DEFAULT_MAX_ACTIVE_WINDOW_MIN
}

impl Default for StickySettings {
    fn default() -> Self {
        Self {
            session_duration_sec: DEFAULT_SESSION_DURATION_SEC,
            fade_duration_sec: DEFAULT_FADE_DURATION_SEC,
            reengagement_window_sec: DEFAULT_REENGAGEMENT_WINDOW_SEC,
            max_active_window_min: DEFAULT_MAX_ACTIVE_WINDOW_MIN,
        }
    }
}

impl StickySettings {
    pub fn session_duration_ms(&self) -> i64 {
        i64::from(self.session_duration_sec) * 1_000
    }

    pub fn fade_duration_ms(&self) -> i64 {
        i64::from(self.fade_duration_sec) * 1_000
    }

    pub fn reengagement_window_ms(&self) -> i64 {
        i64::from(self.reengagement_window_sec) * 1_000
    }

    pub fn max_active_window_ms(&self) -> i64 {
        i64::from(self.max_active_window_min) * 60_000
    }

    /// Returns a copy with every duration forced into its supported range.
    ///
    /// The engine accepts any value; clamping belongs to whoever loads
    /// settings from user input.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            session_duration_sec: clamp(self.session_duration_sec, &SESSION_DURATION_RANGE_SEC),
            fade_duration_sec: clamp(self.fade_duration_sec, &FADE_DURATION_RANGE_SEC),
            reengagement_window_sec: clamp(
                self.reengagement_window_sec,
                &REENGAGEMENT_WINDOW_RANGE_SEC,
            ),
            max_active_window_min: clamp(self.max_active_window_min, &MAX_ACTIVE_WINDOW_RANGE_MIN),
        }
    }
}

fn clamp(value: u32, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

/// Source of the current settings.
///
/// Read once per decision; the value may change between reads.
pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> StickySettings;
}

impl<F> SettingsProvider for F
where
    F: Fn() -> StickySettings + Send + Sync,
{
    fn settings(&self) -> StickySettings {
        self()
    }
}

impl SettingsProvider for watch::Receiver<StickySettings> {
    fn settings(&self) -> StickySettings {
        *self.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_accessors() {
        let settings = StickySettings {
            session_duration_sec: 10,
            fade_duration_sec: 5,
            reengagement_window_sec: 30,
            max_active_window_min: 1,
        };
        assert_eq!(settings.session_duration_ms(), 10_000);
        assert_eq!(settings.fade_duration_ms(), 5_000);
        assert_eq!(settings.reengagement_window_ms(), 30_000);
        assert_eq!(settings.max_active_window_ms(), 60_000);
    }

    #[test]
    fn clamped_forces_values_into_range() {
        let settings = StickySettings {
            session_duration_sec: 10,
            fade_duration_sec: 600,
            reengagement_window_sec: 1,
            max_active_window_min: 1_000,
        }
        .clamped();
        assert_eq!(settings.session_duration_sec, 60);
        assert_eq!(settings.fade_duration_sec, 60);
        assert_eq!(settings.reengagement_window_sec, 5);
        assert_eq!(settings.max_active_window_min, 300);
    }

    #[test]
    fn clamped_keeps_defaults() {
        assert_eq!(StickySettings::default().clamped(), StickySettings::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: StickySettings =
            serde_json::from_str(r#"{"fade_duration_sec": 0}"#).unwrap();
        assert_eq!(settings.fade_duration_sec, 0);
        assert_eq!(settings.session_duration_sec, DEFAULT_SESSION_DURATION_SEC);
        assert_eq!(settings.max_active_window_min, DEFAULT_MAX_ACTIVE_WINDOW_MIN);
    }

    #[test]
    fn watch_receiver_reads_latest_value() {
        let (tx, rx) = watch::channel(StickySettings::default());
        assert_eq!(rx.settings().fade_duration_sec, DEFAULT_FADE_DURATION_SEC);

        tx.send_modify(|s| s.fade_duration_sec = 0);
        assert_eq!(rx.settings().fade_duration_sec, 0);
    }
}
