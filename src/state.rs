//! Process-wide show state and shared actuator access.
//!
//! [`SharedShowState`] is the one place that knows whether a show is running.
//! It only changes through the transition methods, each taken under a single
//! lock, so two scheduler ticks can never both start a show.
//!
//! ```text
//!         try_begin             finish               expire_cooldown
//!  Idle ─────────────► Playing ────────► CoolingDown ────────────────► Idle
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rs_conductor::{SharedShowState, ShowResult, StateLabel};
//! use tokio::time::Instant;
//!
//! let state = SharedShowState::new();
//! let now = Instant::now();
//!
//! let show = state.try_begin(now).expect("idle");
//! assert!(state.try_begin(now).is_none()); // dropped, not queued
//!
//! state.finish(show, ShowResult::Completed, now, Duration::from_secs(300));
//! assert_eq!(state.label(), StateLabel::CoolingDown);
//!
//! state.expire_cooldown(now + Duration::from_secs(300));
//! assert_eq!(state.label(), StateLabel::Idle);
//! ```

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use heapless::HistoryBuffer;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::MAX_BREAK_TIME_SECS;
use crate::traits::Actuator;

/// Transition history retained for diagnostics.
pub const STATE_HISTORY: usize = 32;

/// Identifier of one show since process start.
pub type ShowId = u64;

/// Step of a running show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowPhase {
    /// Intro track playing, motor idle.
    Intro,
    /// Motor enabled, speed curve started.
    SpinUp,
    /// Playing the playlist slot with this index.
    Playlist(usize),
    /// Waiting for the train to pass the sensor.
    AwaitPresence,
    /// Linear stop in progress.
    SpinDown,
    /// Show over, about to cool down.
    Done,
}

/// How a show ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowResult {
    /// Every planned track played and the train was on time.
    Completed,
    /// The shop closed mid-show; remaining tracks were skipped.
    AbortedShopClosed,
    /// The train missed its presence deadline by this much.
    AbortedLate(Duration),
}

/// The single show state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowState {
    /// Ready for the next show.
    Idle,
    /// A show is running.
    Playing {
        /// Which show.
        show_id: ShowId,
        /// When it started.
        started_at: Instant,
        /// Where it is.
        phase: ShowPhase,
    },
    /// Mandatory pause after a show.
    CoolingDown {
        /// When the next show may start.
        until: Instant,
    },
}

/// Data-free discriminant of [`ShowState`], plus phases for history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateLabel {
    /// [`ShowState::Idle`]
    Idle,
    /// [`ShowState::Playing`] entering the given phase.
    Playing(ShowPhase),
    /// [`ShowState::CoolingDown`]
    CoolingDown,
}

impl ShowState {
    /// Discriminant without timestamps.
    pub fn label(&self) -> StateLabel {
        match self {
            ShowState::Idle => StateLabel::Idle,
            ShowState::Playing { phase, .. } => StateLabel::Playing(*phase),
            ShowState::CoolingDown { .. } => StateLabel::CoolingDown,
        }
    }
}

struct Inner {
    state: ShowState,
    next_id: ShowId,
    last_result: Option<ShowResult>,
    history: HistoryBuffer<StateLabel, STATE_HISTORY>,
}

impl Inner {
    fn set(&mut self, state: ShowState) {
        self.state = state;
        self.history.write(state.label());
    }
}

/// Mutex-guarded [`ShowState`] shared by the scheduler and the sequencer.
pub struct SharedShowState {
    inner: Mutex<Inner>,
}

impl Default for SharedShowState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedShowState {
    /// Start in [`ShowState::Idle`].
    pub fn new() -> Self {
        let mut history = HistoryBuffer::new();
        history.write(StateLabel::Idle);
        Self {
            inner: Mutex::new(Inner {
                state: ShowState::Idle,
                next_id: 1,
                last_result: None,
                history,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state snapshot.
    pub fn get(&self) -> ShowState {
        self.inner().state
    }

    /// Current state label.
    pub fn label(&self) -> StateLabel {
        self.inner().state.label()
    }

    /// Whether a show is running (the `has_running_show` flag).
    pub fn has_running_show(&self) -> bool {
        matches!(self.inner().state, ShowState::Playing { .. })
    }

    /// Whether a new show may start (the `ready_for_next_run` flag).
    pub fn is_ready(&self) -> bool {
        matches!(self.inner().state, ShowState::Idle)
    }

    /// Result of the most recently finished show.
    pub fn last_result(&self) -> Option<ShowResult> {
        self.inner().last_result
    }

    /// Labels of recent transitions, oldest first.
    pub fn history(&self) -> Vec<StateLabel> {
        self.inner().history.oldest_ordered().copied().collect()
    }

    /// `Idle → Playing(Intro)`. Returns `None` in any other state.
    pub fn try_begin(&self, now: Instant) -> Option<ShowId> {
        let mut inner = self.inner();
        if inner.state != ShowState::Idle {
            return None;
        }
        let show_id = inner.next_id;
        inner.next_id += 1;
        inner.set(ShowState::Playing {
            show_id,
            started_at: now,
            phase: ShowPhase::Intro,
        });
        info!(show_id, "show starting");
        Some(show_id)
    }

    /// Record the running show's phase. Ignored for a stale `show_id`.
    pub fn set_phase(&self, show_id: ShowId, phase: ShowPhase) {
        let mut inner = self.inner();
        match inner.state {
            ShowState::Playing {
                show_id: current,
                started_at,
                ..
            } if current == show_id => {
                inner.set(ShowState::Playing {
                    show_id,
                    started_at,
                    phase,
                });
                debug!(show_id, ?phase, "show phase");
            }
            _ => warn!(show_id, ?phase, "phase change for a show that is not running"),
        }
    }

    /// `Playing → CoolingDown(now + cooldown)`.
    ///
    /// Returns `false` if `show_id` is not the running show.
    pub fn finish(
        &self,
        show_id: ShowId,
        result: ShowResult,
        now: Instant,
        cooldown: Duration,
    ) -> bool {
        let mut inner = self.inner();
        match inner.state {
            ShowState::Playing {
                show_id: current, ..
            } if current == show_id => {
                inner.last_result = Some(result);
                let until = now.checked_add(cooldown).unwrap_or_else(|| {
                    warn!(cooldown_secs = cooldown.as_secs(), "cooldown out of range, capping");
                    now + Duration::from_secs(MAX_BREAK_TIME_SECS)
                });
                inner.set(ShowState::CoolingDown { until });
                info!(
                    show_id,
                    ?result,
                    cooldown_secs = cooldown.as_secs(),
                    "show finished"
                );
                true
            }
            _ => false,
        }
    }

    /// `CoolingDown → Idle` once the deadline has passed.
    ///
    /// Returns `true` when the state changed.
    pub fn expire_cooldown(&self, now: Instant) -> bool {
        let mut inner = self.inner();
        match inner.state {
            ShowState::CoolingDown { until } if now >= until => {
                inner.set(ShowState::Idle);
                info!("cooldown over, ready for next show");
                true
            }
            _ => false,
        }
    }

    /// Drop a running show without a cooldown (used on shutdown).
    pub fn abandon(&self) {
        let mut inner = self.inner();
        if matches!(inner.state, ShowState::Playing { .. }) {
            inner.set(ShowState::Idle);
        }
    }
}

// ============================================================================
// Shared Actuator
// ============================================================================

/// Mutex-wrapped [`Actuator`] shared by the scheduler and the running show.
///
/// The scheduler only writes the open line; the show owns the motor lines
/// for its duration. Every write is logged on failure and otherwise ignored,
/// except through [`try_with_actuator`](Self::try_with_actuator).
pub struct SharedActuator<A: Actuator> {
    actuator: Mutex<A>,
}

impl<A: Actuator> SharedActuator<A> {
    /// Wrap an actuator.
    pub fn new(actuator: A) -> Self {
        Self {
            actuator: Mutex::new(actuator),
        }
    }

    fn lock(&self) -> MutexGuard<'_, A> {
        self.actuator.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access and return its result.
    ///
    /// The closure form keeps the lock from being held across `.await`.
    pub fn try_with_actuator<R, F>(&self, f: F) -> Result<R, A::Error>
    where
        F: FnOnce(&mut A) -> Result<R, A::Error>,
    {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    /// Read-only access, e.g. to check outputs in tests.
    pub fn inspect<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        f(&*self.lock())
    }

    /// Best-effort write: failures are logged with `what` and swallowed.
    pub fn with_actuator<F>(&self, what: &'static str, f: F)
    where
        F: FnOnce(&mut A) -> Result<(), A::Error>,
    {
        if let Err(e) = self.try_with_actuator(f) {
            warn!(error = ?e, "actuator write failed: {what}");
        }
    }

    /// Set motor duty cycle, best effort.
    pub fn set_duty_cycle(&self, percent: f32) {
        self.with_actuator("duty cycle", |a| a.set_duty_cycle(percent));
    }

    /// Switch the motor-enable relay, best effort.
    pub fn set_enable(&self, on: bool) {
        self.with_actuator("motor enable", |a| a.set_enable(on));
    }

    /// Drive the open line, best effort.
    pub fn set_open_signal(&self, on: bool) {
        self.with_actuator("open signal", |a| a.set_open_signal(on));
    }

    /// Force all outputs low.
    pub fn shutdown(&self) -> Result<(), A::Error> {
        self.try_with_actuator(|a| a.shutdown())
    }

    /// Consume the wrapper, returning the actuator.
    pub fn into_inner(self) -> A {
        self.actuator
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
