//! Immutable projection of engine state for observers.

use serde::{Deserialize, Serialize};

use crate::types::Phase;

/// What status publishers see after each state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickySnapshot {
    pub is_enabled: bool,
    pub phase: Phase,
    /// Time left in the current session, 0 when none is running.
    pub remaining_session_ms: i64,
    /// Time left before the feature turns itself off, 0 before anchoring.
    pub max_window_remaining_ms: i64,
}

impl StickySnapshot {
    /// The snapshot of a disabled engine.
    pub const fn off() -> Self {
        Self {
            is_enabled: false,
            phase: Phase::Off,
            remaining_session_ms: 0,
            max_window_remaining_ms: 0,
        }
    }

    /// Builds a snapshot, projecting deadlines onto remaining time at `now_ms`.
    pub(crate) fn at(
        is_enabled: bool,
        phase: Phase,
        session_end_ms: Option<i64>,
        max_window_end_ms: Option<i64>,
        now_ms: i64,
    ) -> Self {
        let remaining = |deadline: Option<i64>| deadline.map_or(0, |end| (end - now_ms).max(0));
        Self {
            is_enabled,
            phase,
            remaining_session_ms: remaining(session_end_ms),
            max_window_remaining_ms: remaining(max_window_end_ms),
        }
    }
}

impl Default for StickySnapshot {
    fn default() -> Self {
        Self::off()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_time_never_negative() {
        let snapshot = StickySnapshot::at(true, Phase::SessionRunning, Some(1_000), Some(5_000), 2_000);
        assert_eq!(snapshot.remaining_session_ms, 0);
        assert_eq!(snapshot.max_window_remaining_ms, 3_000);
    }

    #[test]
    fn missing_deadlines_project_to_zero() {
        let snapshot = StickySnapshot::at(true, Phase::OnIdle, None, None, 2_000);
        assert_eq!(snapshot.remaining_session_ms, 0);
        assert_eq!(snapshot.max_window_remaining_ms, 0);
    }

    #[test]
    fn off_snapshot_json() {
        let json = serde_json::to_string(&StickySnapshot::off()).unwrap();
        insta::assert_snapshot!(json, @r#"{"is_enabled":false,"phase":"off","remaining_session_ms":0,"max_window_remaining_ms":0}"#);
    }
}
