//! The capability through which the engine requests pauses.

use async_trait::async_trait;

/// Performs the physical side effects the engine asks for.
///
/// Calls are fire-and-continue: the engine never inspects their outcome and
/// moves on once they return. Implementations own their own error handling.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Fade playback out over `fade_duration_ms`, then pause it.
    async fn fade_and_pause(&self, fade_duration_ms: i64);

    /// Pause playback without fading.
    async fn pause_now(&self);

    /// The feature was turned off; release anything held for it.
    async fn on_disabled(&self);
}
