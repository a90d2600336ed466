//! Reconciling phase countdown
//!
//! The timer ticks at a fine granularity but never decrements a counter: each
//! tick recomputes the remaining whole seconds from the phase start instant, so
//! dropped ticks, scheduler stalls or a suspended host cannot make it drift.
//! A timer only acts while the session's active [`PhaseTag`] still equals the
//! tag it was armed with; once the session moves on, the timer goes inert.

use crate::session::Phase;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Identity of one phase instance
///
/// `generation` is bumped on every phase entry, so re-entering the same phase
/// for the same question (e.g. after an authoritative resync) still produces a
/// distinct tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseTag {
    pub phase: Phase,
    pub question_index: usize,
    pub generation: u64,
}

/// Deadline of an armed phase
#[derive(Debug, Clone, Copy)]
pub struct TimerDeadline {
    pub started_at: Instant,
    pub duration_secs: u64,
    pub tag: PhaseTag,
}

impl TimerDeadline {
    pub fn remaining_at(&self, now: Instant) -> u64 {
        remaining_secs(self.duration_secs, self.started_at, now)
    }
}

/// `duration - floor(elapsed_ms / 1000)`, saturating at zero
pub fn remaining_secs(duration_secs: u64, started_at: Instant, now: Instant) -> u64 {
    let elapsed_secs = now.saturating_duration_since(started_at).as_millis() / 1000;
    let elapsed_secs = u64::try_from(elapsed_secs).unwrap_or(u64::MAX);
    duration_secs.saturating_sub(elapsed_secs)
}

/// Single-slot phase countdown; arming replaces whatever was armed before
pub struct PhaseTimer {
    tick: Duration,
    active: watch::Receiver<PhaseTag>,
    remaining: Arc<watch::Sender<u64>>,
    deadline: Option<TimerDeadline>,
    handle: Option<JoinHandle<()>>,
}

impl PhaseTimer {
    /// `active` publishes the session's current phase tag
    pub fn new(active: watch::Receiver<PhaseTag>, tick: Duration) -> Self {
        let (remaining, _) = watch::channel(0);
        Self {
            tick,
            active,
            remaining: Arc::new(remaining),
            deadline: None,
            handle: None,
        }
    }

    /// Start a countdown for `tag` beginning now
    pub fn arm<F>(&mut self, duration_secs: u64, tag: PhaseTag, on_expire: F)
    where
        F: FnOnce(PhaseTag) + Send + 'static,
    {
        self.arm_at(Instant::now(), duration_secs, tag, on_expire);
    }

    /// Start a countdown for `tag` from an explicit phase start instant
    ///
    /// `on_expire` runs at most once, and only if `tag` is still the active
    /// tag when the remaining time reaches zero.
    pub fn arm_at<F>(&mut self, started_at: Instant, duration_secs: u64, tag: PhaseTag, on_expire: F)
    where
        F: FnOnce(PhaseTag) + Send + 'static,
    {
        self.cancel();

        let deadline = TimerDeadline {
            started_at,
            duration_secs,
            tag,
        };
        self.remaining
            .send_replace(deadline.remaining_at(Instant::now()));
        self.deadline = Some(deadline);

        let tick = self.tick;
        let active = self.active.clone();
        let remaining = Arc::clone(&self.remaining);

        debug!(
            "Arming {} timer for question {} ({}s, generation {})",
            tag.phase, tag.question_index, duration_secs, tag.generation
        );

        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                if *active.borrow() != tag {
                    debug!(
                        "Phase {} (generation {}) superseded, timer going inert",
                        tag.phase, tag.generation
                    );
                    return;
                }

                let left = deadline.remaining_at(Instant::now());
                remaining.send_replace(left);

                if left == 0 {
                    debug!("{} timer expired for question {}", tag.phase, tag.question_index);
                    on_expire(tag);
                    return;
                }
            }
        }));
    }

    /// Stop the countdown; a cancelled timer never fires
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.deadline = None;
        self.remaining.send_replace(0);
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn deadline(&self) -> Option<TimerDeadline> {
        self.deadline
    }

    /// Whole seconds left on the armed phase, as of the last tick
    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn subscribe_remaining(&self) -> watch::Receiver<u64> {
        self.remaining.subscribe()
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
