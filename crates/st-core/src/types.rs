//! Playback, phase and disable-reason vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing vocabulary strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown playback state: {0}")]
    PlaybackState(String),

    #[error("unknown phase: {0}")]
    Phase(String),

    #[error("unknown disable reason: {0}")]
    DisableReason(String),
}

/// Playback state as reported by the media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    Buffering,
    Unknown,
}

impl PlaybackState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Buffering => "buffering",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackState {
    type Err = ParseError;

    /// Case-insensitive. Accepts the transport-state aliases media players
    /// commonly print (`Playing`, `pause`, `rewinding`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "playing" | "play" => Ok(Self::Playing),
            "paused" | "pause" => Ok(Self::Paused),
            "stopped" | "stop" => Ok(Self::Stopped),
            "buffering" | "connecting" | "fast_forwarding" | "rewinding" => Ok(Self::Buffering),
            "unknown" | "none" => Ok(Self::Unknown),
            _ => Err(ParseError::PlaybackState(s.to_string())),
        }
    }
}

/// Discrete state of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Off,
    OnIdle,
    SessionRunning,
    Fading,
    StoppedRecently,
    Expired,
}

impl Phase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::OnIdle => "on_idle",
            Self::SessionRunning => "session_running",
            Self::Fading => "fading",
            Self::StoppedRecently => "stopped_recently",
            Self::Expired => "expired",
        }
    }

    /// Phases from which a `PLAYING` event may arm a new session.
    pub const fn accepts_new_session(&self) -> bool {
        matches!(self, Self::OnIdle | Self::StoppedRecently)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "on_idle" => Ok(Self::OnIdle),
            "session_running" => Ok(Self::SessionRunning),
            "fading" => Ok(Self::Fading),
            "stopped_recently" => Ok(Self::StoppedRecently),
            "expired" => Ok(Self::Expired),
            _ => Err(ParseError::Phase(s.to_string())),
        }
    }
}

/// Why the feature was turned off. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    #[default]
    ManualStop,
    MaxWindowExpired,
}

impl DisableReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManualStop => "manual_stop",
            Self::MaxWindowExpired => "max_window_expired",
        }
    }
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisableReason {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_stop" => Ok(Self::ManualStop),
            "max_window_expired" => Ok(Self::MaxWindowExpired),
            _ => Err(ParseError::DisableReason(s.to_string())),
        }
    }
}

/// A playback state change together with when the source observed it.
///
/// The timestamp is advisory; the engine does deadline math on its own clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackUpdate {
    pub state: PlaybackState,
    pub timestamp_ms: i64,
}

impl PlaybackUpdate {
    pub const fn new(state: PlaybackState, timestamp_ms: i64) -> Self {
        Self {
            state,
            timestamp_ms,
        }
    }
}
