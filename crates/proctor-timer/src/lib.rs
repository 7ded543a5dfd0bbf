//! Per-session countdown timers for Proctor.
//!
//! Each in-progress quiz session gets exactly one countdown task that
//! decrements the remaining time by one every fixed interval and pushes
//! [`TimerEvent`]s into the session's event channel. The session engine
//! persists each value and relays ticks to the bound connection (if any —
//! a tick with no live connection is simply dropped, not queued).
//!
//! The countdown is what makes the timing server-authoritative: a client
//! can't stretch its time by manipulating local clocks or dropping its
//! connection, because the task keeps ticking regardless.
//!
//! # Integration
//!
//! The countdown feeds the session actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle client actions */ }
//!         Some(ev) = timer_rx.recv() => match ev {
//!             TimerEvent::Tick { remaining } => { /* persist + relay */ }
//!             TimerEvent::Expired => { /* auto-submit */ }
//!         }
//!     }
//! }
//! ```
//!
//! # Resume semantics
//!
//! The starting value is whatever the caller passes in — on reconnect or
//! server restart the engine seeds the countdown from the last persisted
//! `time_remaining`, so an interrupted session resumes counting down
//! instead of resetting.

use std::collections::HashMap;
use std::time::Duration;

use proctor_protocol::SessionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for countdown timers.
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// How often the countdown decrements. One authoritative second per
    /// tick — tests shrink this to run fast under a paused clock.
    ///
    /// Default: 1 second.
    pub interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What a countdown task reports to its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One decrement happened; `remaining` is the new authoritative
    /// value. The final tick carries `remaining: 0`.
    Tick { remaining: u32 },

    /// The countdown reached zero. Sent once, after `Tick { 0 }`; the
    /// task exits afterwards.
    Expired,
}

// ---------------------------------------------------------------------------
// Countdown task
// ---------------------------------------------------------------------------

/// Handle to a running countdown task.
///
/// Dropping the handle does NOT stop the task — time must keep running
/// when nobody is watching. Call [`cancel`](Self::cancel) to stop it
/// (session completed, server shutdown).
#[derive(Debug)]
pub struct CountdownHandle {
    session_id: SessionId,
    handle: JoinHandle<()>,
}

impl CountdownHandle {
    /// The session this countdown belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Stops the countdown immediately.
    ///
    /// Abort is safe here: the task holds no state of its own — the last
    /// persisted `time_remaining` lives in the registry, written by the
    /// session actor on every tick.
    pub fn cancel(&self) {
        self.handle.abort();
        debug!(session_id = %self.session_id, "countdown cancelled");
    }

    /// Whether the task has finished (expired, cancelled, or orphaned).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a countdown for one session, starting from `remaining` seconds.
///
/// Every interval the task decrements its counter and sends
/// [`TimerEvent::Tick`]; at zero it sends [`TimerEvent::Expired`] and
/// exits. If the event receiver is gone (the session actor stopped),
/// the task exits quietly — there is nothing left to drive.
pub fn spawn_countdown(
    session_id: SessionId,
    remaining: u32,
    config: &TimerConfig,
    events: mpsc::Sender<TimerEvent>,
) -> CountdownHandle {
    let interval = config.interval;
    let id = session_id.clone();

    let handle = tokio::spawn(async move {
        let mut remaining = remaining;

        // A session resumed with no time left expires right away.
        if remaining == 0 {
            let _ = events.send(TimerEvent::Expired).await;
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        // Skip missed ticks instead of bursting to catch up: a stalled
        // runtime must not fire a volley of decrements at once.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // `interval`'s first tick completes immediately — consume it so
        // the first decrement lands one full interval from now.
        ticker.tick().await;

        debug!(session_id = %id, remaining, "countdown started");

        loop {
            ticker.tick().await;
            remaining -= 1;

            if events.send(TimerEvent::Tick { remaining }).await.is_err() {
                debug!(
                    session_id = %id,
                    "countdown receiver gone, stopping"
                );
                return;
            }

            if remaining == 0 {
                let _ = events.send(TimerEvent::Expired).await;
                debug!(session_id = %id, "countdown expired");
                return;
            }
        }
    });

    CountdownHandle { session_id, handle }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Errors that can occur when starting a countdown.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// A countdown for this session is already running. Exactly one may
    /// exist per session at any instant — the engine checks before
    /// starting, so hitting this is a caller bug.
    #[error("countdown already running for session {0}")]
    AlreadyRunning(SessionId),
}

/// Tracks every live countdown, keyed by session id, so timers can be
/// found and cancelled when their session completes or the server shuts
/// down. Finished tasks are pruned lazily — no dangling entries
/// accumulate for completed sessions.
#[derive(Default)]
pub struct TimerSupervisor {
    config: TimerConfig,
    timers: HashMap<SessionId, CountdownHandle>,
}

impl TimerSupervisor {
    /// Creates a supervisor with the given timer config.
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            timers: HashMap::new(),
        }
    }

    /// Starts a countdown for `session_id` from `remaining` seconds.
    ///
    /// # Errors
    /// [`TimerError::AlreadyRunning`] if a live countdown already exists
    /// for this session.
    pub fn start(
        &mut self,
        session_id: SessionId,
        remaining: u32,
        events: mpsc::Sender<TimerEvent>,
    ) -> Result<(), TimerError> {
        // Prune a finished entry before deciding: an expired countdown
        // doesn't block a restart (the restart will re-expire instantly
        // if there is truly no time left).
        if let Some(existing) = self.timers.get(&session_id) {
            if existing.is_finished() {
                self.timers.remove(&session_id);
            } else {
                warn!(%session_id, "refusing second countdown");
                return Err(TimerError::AlreadyRunning(session_id));
            }
        }

        let handle =
            spawn_countdown(session_id.clone(), remaining, &self.config, events);
        self.timers.insert(session_id, handle);
        Ok(())
    }

    /// Whether a live (unfinished) countdown exists for this session.
    pub fn is_running(&self, session_id: &SessionId) -> bool {
        self.timers
            .get(session_id)
            .is_some_and(|h| !h.is_finished())
    }

    /// Cancels and removes a session's countdown.
    ///
    /// Returns `true` if one existed.
    pub fn cancel(&mut self, session_id: &SessionId) -> bool {
        match self.timers.remove(session_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every countdown. Used at server shutdown.
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.cancel();
        }
    }

    /// Number of tracked countdowns (live or finished-but-unpruned).
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns `true` if no countdowns are tracked.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
