//! Cancellable delayed actions that re-enter the engine as messages.

use std::time::Duration;

use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;

/// Holds at most one pending delayed action.
///
/// Every schedule replaces (and aborts) the previous task and bumps the
/// generation. A message that was already in flight when its task was
/// replaced or cancelled carries a stale generation and is rejected by
/// [`TimerSlot::take_fired`] or [`TimerSlot::is_current`].
#[derive(Debug)]
pub(crate) struct TimerSlot {
    name: &'static str,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self {
            name,
            generation: 0,
            task: None,
        }
    }

    pub(crate) const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) const fn is_pending(&self) -> bool {
        self.task.is_some()
    }

    /// Sends `message(generation)` into `inbox` once `delay` has elapsed.
    pub(crate) fn schedule<M, F>(&mut self, delay: Duration, inbox: &WeakUnboundedSender<M>, message: F)
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M + Send + 'static,
    {
        let generation = self.next_generation();
        let inbox = inbox.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(message(generation));
            }
        }));
    }

    /// Sends `message(generation)` into `inbox` every `period` until cancelled.
    pub(crate) fn schedule_every<M, F>(
        &mut self,
        period: Duration,
        inbox: &WeakUnboundedSender<M>,
        message: F,
    ) where
        M: Send + 'static,
        F: Fn(u64) -> M + Send + 'static,
    {
        let generation = self.next_generation();
        let inbox = inbox.clone();
        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                let Some(inbox) = inbox.upgrade() else { break };
                if inbox.send(message(generation)).is_err() {
                    break;
                }
            }
        }));
    }

    /// Aborts the pending task, if any. Already-sent messages become stale.
    pub(crate) fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Accepts a one-shot firing if it belongs to the live schedule.
    ///
    /// Clears the slot on success, since the task has finished.
    pub(crate) fn take_fired(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.task = None;
            true
        } else {
            false
        }
    }

    /// Whether a periodic firing belongs to the live schedule.
    pub(crate) const fn is_current(&self, generation: u64) -> bool {
        self.task.is_some() && self.generation == generation
    }

    fn next_generation(&mut self) -> u64 {
        self.cancel();
        self.generation += 1;
        self.generation
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::new("test");
        slot.schedule(Duration::from_millis(100), &tx.downgrade(), |g| g);

        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        let generation = rx.recv().await.unwrap();
        assert!(slot.take_fired(generation));
        assert!(!slot.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_makes_earlier_generation_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inbox = tx.downgrade();
        let mut slot = TimerSlot::new("test");

        slot.schedule(Duration::ZERO, &inbox, |g| g);
        let first = rx.recv().await.unwrap();

        slot.schedule(Duration::from_millis(50), &inbox, |g| g);
        assert!(!slot.take_fired(first));
        assert!(slot.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut slot = TimerSlot::new("test");
        slot.schedule(Duration::from_millis(10), &tx.downgrade(), |g| g);
        slot.cancel();

        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_keeps_firing_with_same_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::new("tick");
        slot.schedule_every(Duration::from_millis(1_000), &tx.downgrade(), |g| g);

        for _ in 0..3 {
            tokio::time::advance(Duration::from_millis(1_000)).await;
            let generation = rx.recv().await.unwrap();
            assert!(slot.is_current(generation));
        }
    }
}
