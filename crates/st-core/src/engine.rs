//! The sticky timer engine.
//!
//! A single actor task owns all session state. Public operations on
//! [`StickyEngine`] enqueue commands; expired scheduled actions and finished
//! pause requests re-enter the same queue, so every read-modify-write of state
//! is serialized in arrival order.
//!
//! ## Phases
//!
//! ```text
//! Off -> OnIdle -> SessionRunning -> (Fading ->) StoppedRecently -> SessionRunning ...
//!          any enabled phase -> Expired -> Off      (max active window reached)
//!          any enabled phase -> Off                 (disable)
//! ```
//!
//! Action sink calls run on their own tasks, outside the actor, and report
//! back with the enabled lifetime they were started in. Completions from a
//! previous lifetime are dropped.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::scheduled::TimerSlot;
use crate::settings::SettingsProvider;
use crate::sink::ActionSink;
use crate::snapshot::StickySnapshot;
use crate::types::{DisableReason, Phase, PlaybackState, PlaybackUpdate};

/// Sustained `PLAYING` required before a session is armed outside the
/// re-engagement window.
pub const PLAYBACK_STABLE_DEBOUNCE_MS: i64 = 1_500;

/// Interval of the snapshot refresh tick while enabled.
pub const TICK_INTERVAL_MS: i64 = 1_000;

/// Engine handle errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// The actor task has exited (runtime shut down).
    #[error("sticky engine is no longer running")]
    Stopped,
}

/// Handle to a running engine.
///
/// Cheap to clone; all clones feed the same actor. The actor stops once every
/// handle has been dropped.
#[derive(Debug, Clone)]
pub struct StickyEngine {
    commands: UnboundedSender<Command>,
    snapshot: watch::Receiver<StickySnapshot>,
}

impl StickyEngine {
    /// Starts the engine on the current tokio runtime, disabled.
    pub fn spawn<C, P>(clock: C, settings: P, sink: Arc<dyn ActionSink>) -> Self
    where
        C: Clock + 'static,
        P: SettingsProvider + 'static,
    {
        let (commands, inbox) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(StickySnapshot::off());
        let actor = EngineActor::new(clock, settings, sink, commands.downgrade(), snapshot_tx);
        tokio::spawn(actor.run(inbox));
        Self { commands, snapshot }
    }

    /// Turns the feature on. No-op if already enabled.
    pub fn enable(&self) {
        self.send(Command::Enable);
    }

    /// Turns the feature off. No-op if already off.
    pub fn disable(&self, reason: DisableReason) {
        self.send(Command::Disable(reason));
    }

    /// Reports a playback state change from the media source.
    ///
    /// `timestamp_ms` is advisory; deadlines use the engine's own clock.
    pub fn on_playback_state_changed(&self, state: PlaybackState, timestamp_ms: i64) {
        self.submit(PlaybackUpdate::new(state, timestamp_ms));
    }

    /// Reports a playback state change already packaged as an update.
    pub fn submit(&self, update: PlaybackUpdate) {
        self.send(Command::Playback(update));
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> StickySnapshot {
        *self.snapshot.borrow()
    }

    /// Observes published snapshots with latest-value semantics.
    pub fn subscribe(&self) -> watch::Receiver<StickySnapshot> {
        self.snapshot.clone()
    }

    /// Waits until every command submitted before this call has been handled.
    pub async fn settle(&self) -> Result<StickySnapshot, EngineError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Settle(reply))
            .map_err(|_| EngineError::Stopped)?;
        done.await.map_err(|_| EngineError::Stopped)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("sticky engine is no longer running, command dropped");
        }
    }
}

#[derive(Debug)]
enum Command {
    Enable,
    Disable(DisableReason),
    Playback(PlaybackUpdate),
    DebounceElapsed { generation: u64 },
    SessionExpired { generation: u64 },
    MaxWindowExpired { generation: u64 },
    Tick { generation: u64 },
    PauseSettled { lifetime: u64, cause: PauseCause },
    Settle(oneshot::Sender<StickySnapshot>),
}

/// Which flow requested a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseCause {
    SessionExpiry,
    MaxWindowExpiry,
}

/// Mutable engine state. Only the actor touches it.
#[derive(Debug)]
struct EngineState {
    enabled: bool,
    phase: Phase,
    latest_playback: PlaybackState,
    last_stopped_at_ms: Option<i64>,
    session_end_ms: Option<i64>,
    max_window_end_ms: Option<i64>,
}

impl EngineState {
    const fn disabled() -> Self {
        Self {
            enabled: false,
            phase: Phase::Off,
            latest_playback: PlaybackState::Unknown,
            last_stopped_at_ms: None,
            session_end_ms: None,
            max_window_end_ms: None,
        }
    }

    const fn enabled() -> Self {
        Self {
            enabled: true,
            phase: Phase::OnIdle,
            ..Self::disabled()
        }
    }

    fn max_window_passed(&self, now_ms: i64) -> bool {
        self.max_window_end_ms.is_some_and(|end| now_ms >= end)
    }
}

struct EngineActor<C, P> {
    clock: C,
    settings: P,
    sink: Arc<dyn ActionSink>,
    inbox: WeakUnboundedSender<Command>,
    snapshot: watch::Sender<StickySnapshot>,
    state: EngineState,
    /// Bumped on every enable; tags in-flight sink calls.
    lifetime: u64,
    debounce: TimerSlot,
    session: TimerSlot,
    max_window: TimerSlot,
    tick: TimerSlot,
}

impl<C, P> EngineActor<C, P>
where
    C: Clock,
    P: SettingsProvider,
{
    fn new(
        clock: C,
        settings: P,
        sink: Arc<dyn ActionSink>,
        inbox: WeakUnboundedSender<Command>,
        snapshot: watch::Sender<StickySnapshot>,
    ) -> Self {
        Self {
            clock,
            settings,
            sink,
            inbox,
            snapshot,
            state: EngineState::disabled(),
            lifetime: 0,
            debounce: TimerSlot::new("debounce"),
            session: TimerSlot::new("session"),
            max_window: TimerSlot::new("max_window"),
            tick: TimerSlot::new("tick"),
        }
    }

    async fn run(mut self, mut inbox: UnboundedReceiver<Command>) {
        while let Some(command) = inbox.recv().await {
            self.handle(command);
        }
        debug!("all engine handles dropped, stopping");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enable => self.enable(),
            Command::Disable(reason) => self.disable(reason),
            Command::Playback(update) => self.on_playback(update),
            Command::DebounceElapsed { generation } => self.on_debounce_elapsed(generation),
            Command::SessionExpired { generation } => self.on_session_expired(generation),
            Command::MaxWindowExpired { generation } => {
                if self.max_window.take_fired(generation) {
                    self.expire_max_window();
                } else {
                    debug!(generation, "stale max window expiry ignored");
                }
            }
            Command::Tick { generation } => {
                if self.tick.is_current(generation) && self.state.enabled {
                    self.publish();
                }
            }
            Command::PauseSettled { lifetime, cause } => self.on_pause_settled(lifetime, cause),
            Command::Settle(reply) => {
                let _ = reply.send(*self.snapshot.borrow());
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    fn enable(&mut self) {
        if self.state.enabled {
            return;
        }
        self.state = EngineState::enabled();
        self.lifetime += 1;
        self.cancel_all();
        self.tick.schedule_every(
            Duration::from_millis(TICK_INTERVAL_MS.unsigned_abs()),
            &self.inbox,
            |generation| Command::Tick { generation },
        );
        info!(lifetime = self.lifetime, "sticky mode enabled");
        self.publish();
    }

    fn disable(&mut self, reason: DisableReason) {
        if !self.state.enabled && self.state.phase == Phase::Off {
            return;
        }
        self.state = EngineState::disabled();
        self.cancel_all();
        self.publish();
        info!(%reason, "sticky mode disabled");

        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move { sink.on_disabled().await });
    }

    fn on_playback(&mut self, update: PlaybackUpdate) {
        if !self.state.enabled {
            return;
        }
        let previous = mem::replace(&mut self.state.latest_playback, update.state);
        let now = self.clock.now_ms();
        debug!(
            state = %update.state,
            %previous,
            phase = %self.state.phase,
            reported_at_ms = update.timestamp_ms,
            "playback state changed"
        );

        // The expiry action may not have fired yet if its task was delayed.
        if self.state.max_window_passed(now) {
            self.expire_max_window();
            return;
        }

        if update.state != PlaybackState::Playing {
            self.debounce.cancel();
            return;
        }
        if !self.state.phase.accepts_new_session() || previous == PlaybackState::Playing {
            return;
        }

        if self.within_reengagement_window(now) {
            self.debounce.cancel();
            self.arm_session();
        } else {
            self.debounce.schedule(
                Duration::from_millis(PLAYBACK_STABLE_DEBOUNCE_MS.unsigned_abs()),
                &self.inbox,
                |generation| Command::DebounceElapsed { generation },
            );
        }
    }

    // ── Scheduled actions ────────────────────────────────────────────

    fn on_debounce_elapsed(&mut self, generation: u64) {
        if !self.debounce.take_fired(generation) {
            debug!(generation, "stale debounce ignored");
            return;
        }
        if self.state.phase.accepts_new_session() {
            self.arm_session();
        }
    }

    fn on_session_expired(&mut self, generation: u64) {
        if !self.session.take_fired(generation) {
            debug!(generation, "stale session expiry ignored");
            return;
        }
        if !self.state.enabled || self.state.phase != Phase::SessionRunning {
            return;
        }

        let fade_ms = self.settings.settings().fade_duration_ms();
        self.state.session_end_ms = None;
        self.state.phase = if fade_ms > 0 {
            Phase::Fading
        } else {
            Phase::StoppedRecently
        };
        debug!(phase = %self.state.phase, fade_ms, "session expired");
        self.publish();
        self.request_pause(fade_ms, PauseCause::SessionExpiry);
    }

    fn on_pause_settled(&mut self, lifetime: u64, cause: PauseCause) {
        if lifetime != self.lifetime || !self.state.enabled {
            debug!(lifetime, ?cause, "pause from an earlier lifetime ignored");
            return;
        }
        match cause {
            PauseCause::SessionExpiry => {
                // A resume inside the re-engagement window may already have re-armed.
                if !matches!(self.state.phase, Phase::Fading | Phase::StoppedRecently) {
                    return;
                }
                let now = self.clock.now_ms();
                self.state.latest_playback = PlaybackState::Paused;
                self.state.last_stopped_at_ms = Some(now);
                self.state.session_end_ms = None;
                self.state.phase = Phase::StoppedRecently;
                debug!(stopped_at_ms = now, "session pause settled");
                self.publish();

                if self.state.max_window_passed(now) {
                    self.expire_max_window();
                }
            }
            PauseCause::MaxWindowExpiry => self.disable(DisableReason::MaxWindowExpired),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm_session(&mut self) {
        if !self.state.enabled || self.state.latest_playback != PlaybackState::Playing {
            return;
        }
        let settings = self.settings.settings();
        let now = self.clock.now_ms();

        let max_window_end = match self.state.max_window_end_ms {
            Some(end) => end,
            None => {
                let window_ms = settings.max_active_window_ms();
                self.max_window.schedule(
                    Duration::from_millis(window_ms.max(0).unsigned_abs()),
                    &self.inbox,
                    |generation| Command::MaxWindowExpired { generation },
                );
                debug!(window_ms, "max active window anchored");
                *self.state.max_window_end_ms.insert(now + window_ms)
            }
        };
        if now >= max_window_end {
            self.expire_max_window();
            return;
        }

        let session_ms = settings.session_duration_ms();
        self.state.phase = Phase::SessionRunning;
        self.state.session_end_ms = Some(now + session_ms);
        self.state.last_stopped_at_ms = None;
        self.session.schedule(
            Duration::from_millis(session_ms.max(0).unsigned_abs()),
            &self.inbox,
            |generation| Command::SessionExpired { generation },
        );
        debug!(session_ms, "session armed");
        self.publish();
    }

    fn expire_max_window(&mut self) {
        if !self.state.enabled || self.state.phase == Phase::Expired {
            return;
        }
        self.state.phase = Phase::Expired;
        self.state.session_end_ms = None;
        self.debounce.cancel();
        self.session.cancel();
        self.max_window.cancel();
        info!(playback = %self.state.latest_playback, "max active window reached");
        self.publish();

        if self.state.latest_playback == PlaybackState::Playing {
            let fade_ms = self.settings.settings().fade_duration_ms();
            self.request_pause(fade_ms, PauseCause::MaxWindowExpiry);
        } else {
            self.disable(DisableReason::MaxWindowExpired);
        }
    }

    /// Runs the sink's pause path on its own task and reports back when done.
    ///
    /// `fade_ms` is captured here so a settings change mid-fade has no effect.
    fn request_pause(&self, fade_ms: i64, cause: PauseCause) {
        let sink = Arc::clone(&self.sink);
        let inbox = self.inbox.clone();
        let lifetime = self.lifetime;
        info!(fade_ms, ?cause, "requesting pause");

        tokio::spawn(async move {
            if fade_ms > 0 {
                sink.fade_and_pause(fade_ms).await;
            } else {
                sink.pause_now().await;
            }
            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(Command::PauseSettled { lifetime, cause });
            }
        });
    }

    fn within_reengagement_window(&self, now_ms: i64) -> bool {
        self.state.last_stopped_at_ms.is_some_and(|stopped_at| {
            now_ms - stopped_at <= self.settings.settings().reengagement_window_ms()
        })
    }

    fn cancel_all(&mut self) {
        for slot in [
            &mut self.debounce,
            &mut self.session,
            &mut self.max_window,
            &mut self.tick,
        ] {
            if slot.is_pending() {
                debug!(timer = slot.name(), "cancelling scheduled action");
            }
            slot.cancel();
        }
    }

    fn publish(&self) {
        let state = &self.state;
        self.snapshot.send_replace(StickySnapshot::at(
            state.enabled,
            state.phase,
            state.session_end_ms,
            state.max_window_end_ms,
            self.clock.now_ms(),
        ));
    }
}
