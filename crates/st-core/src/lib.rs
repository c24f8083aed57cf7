//! Core logic for the sticky auto-pause timer.
//!
//! This crate contains:
//! - The timer engine: an actor that owns the session state machine and its
//!   four scheduled actions (play debounce, session expiry, max-window expiry,
//!   periodic tick)
//! - Settings: the four configurable durations and their sane ranges
//! - Snapshots: the immutable view of engine state published to observers
//! - The action sink seam through which the engine requests pauses

pub mod clock;
mod engine;
mod scheduled;
pub mod settings;
pub mod sink;
mod snapshot;
pub mod types;

pub use clock::{Clock, MonotonicClock, SystemClock};
pub use engine::{EngineError, PLAYBACK_STABLE_DEBOUNCE_MS, StickyEngine, TICK_INTERVAL_MS};
pub use settings::{SettingsProvider, StickySettings};
pub use sink::ActionSink;
pub use snapshot::StickySnapshot;
pub use types::{DisableReason, ParseError, Phase, PlaybackState, PlaybackUpdate};
