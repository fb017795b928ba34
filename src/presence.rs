//! Train presence ("trainspotting") monitoring.
//!
//! A reed sensor at a fixed point on the track fires each time the train
//! passes. The sensor callback only pushes a timestamp onto a channel via
//! [`PresenceSender::notify`]; a listener task drains the channel into the
//! [`PresenceMonitor`], which the sequencer queries after the playlist ends
//! to confirm the train is still moving.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rs_conductor::presence::{presence_channel, PresenceMonitor, Sighting};
//! use tokio::time::Instant;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let monitor = Arc::new(PresenceMonitor::new(Duration::from_millis(200)));
//! let t0 = Instant::now();
//!
//! assert_eq!(monitor.record_event(t0), Some(Sighting::First));
//! assert_eq!(
//!     monitor.record_event(t0 + Duration::from_secs(5)),
//!     Some(Sighting::Again { since_last: Duration::from_secs(5) }),
//! );
//!
//! // Sensor side
//! let (sender, receiver) = presence_channel();
//! let listener = tokio::spawn(Arc::clone(&monitor).listen(receiver));
//! sender.notify();
//! drop(sender);
//! listener.await.unwrap();
//! assert_eq!(monitor.sightings(), 3);
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use heapless::HistoryBuffer;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Sightings kept per show. Older ones are dropped; only the latest matters
/// for the deadline check.
pub const SIGHTING_HISTORY: usize = 64;

/// Classification of a recorded sensor event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sighting {
    /// First pass since the last reset.
    First,
    /// A later pass, with the time since the previous one.
    Again {
        /// Interval since the previous sighting.
        since_last: Duration,
    },
}

/// Result of waiting for the train after the playlist ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeadlineOutcome {
    /// The train passed the sensor within the limit.
    Spotted {
        /// Time from the deadline start to the sighting.
        after: Duration,
    },
    /// The limit elapsed without a sighting.
    Late {
        /// How long we had waited when giving up.
        delay: Duration,
    },
    /// The caller asked to stop waiting (shop closed).
    Cancelled,
}

struct PresenceLog {
    reset_at: Instant,
    sightings: HistoryBuffer<Instant, SIGHTING_HISTORY>,
    total: u64,
}

/// Thread-safe record of train sightings.
pub struct PresenceMonitor {
    log: Mutex<PresenceLog>,
    poll_interval: Duration,
}

impl PresenceMonitor {
    /// Create a monitor that polls at `poll_interval` while waiting on a deadline.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            log: Mutex::new(PresenceLog {
                reset_at: Instant::now(),
                sightings: HistoryBuffer::new(),
                total: 0,
            }),
            poll_interval,
        }
    }

    fn log(&self) -> MutexGuard<'_, PresenceLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a sensor event.
    ///
    /// Returns `None` for a stale event stamped before the last reset.
    /// Timestamps older than the latest sighting are moved up to it so the
    /// history stays ordered.
    pub fn record_event(&self, at: Instant) -> Option<Sighting> {
        let mut log = self.log();
        if at < log.reset_at {
            debug!("dropping presence event from before show start");
            return None;
        }

        let previous = log.sightings.recent().copied();
        let at = previous.map_or(at, |prev| at.max(prev));
        log.sightings.write(at);
        log.total += 1;
        let since_start = at.saturating_duration_since(log.reset_at).as_secs_f64();
        drop(log);

        let sighting = match previous {
            None => {
                info!(since_start_secs = since_start, "train spotted for the first time");
                Sighting::First
            }
            Some(prev) => {
                let since_last = at.saturating_duration_since(prev);
                info!(
                    interval_secs = since_last.as_secs_f64(),
                    "train spotted, {:.1}s since last sighting",
                    since_last.as_secs_f64()
                );
                Sighting::Again { since_last }
            }
        };
        Some(sighting)
    }

    /// Forget all sightings; the next event counts as the first.
    pub fn reset(&self, at: Instant) {
        let mut log = self.log();
        log.reset_at = at;
        log.sightings = HistoryBuffer::new();
        log.total = 0;
    }

    /// Timestamp of the most recent sighting since the last reset.
    pub fn latest(&self) -> Option<Instant> {
        self.log().sightings.recent().copied()
    }

    /// Number of sightings since the last reset.
    pub fn sightings(&self) -> u64 {
        self.log().total
    }

    /// Seconds elapsed since the last reset (the current show's start).
    pub fn seconds_since_start(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.log().reset_at)
            .as_secs_f64()
    }

    /// Earliest retained sighting at or after `start`.
    pub fn spotted_since(&self, start: Instant) -> Option<Instant> {
        self.log()
            .sightings
            .oldest_ordered()
            .copied()
            .find(|&at| at >= start)
    }

    /// Wait until the train passes after `start`, `limit` elapses, or
    /// `keep_waiting` returns false.
    pub async fn check_deadline<F>(
        &self,
        start: Instant,
        limit: Duration,
        keep_waiting: F,
    ) -> DeadlineOutcome
    where
        F: Fn() -> bool,
    {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            poll.tick().await;

            if let Some(at) = self.spotted_since(start) {
                return DeadlineOutcome::Spotted {
                    after: at.saturating_duration_since(start),
                };
            }
            let waited = Instant::now().saturating_duration_since(start);
            if waited > limit {
                return DeadlineOutcome::Late { delay: waited };
            }
            if !keep_waiting() {
                return DeadlineOutcome::Cancelled;
            }
        }
    }

    /// Drain sensor events into this monitor until every sender is dropped.
    pub async fn listen(self: Arc<Self>, mut events: PresenceReceiver) {
        while let Some(at) = events.rx.recv().await {
            self.record_event(at);
        }
        debug!("presence channel closed");
    }
}

/// Sensor-side handle. Cheap to clone; safe to call from any thread.
#[derive(Clone, Debug)]
pub struct PresenceSender {
    tx: mpsc::UnboundedSender<Instant>,
}

impl PresenceSender {
    /// Report a rising edge now.
    ///
    /// Returns `false` if the listener has gone away.
    pub fn notify(&self) -> bool {
        self.notify_at(Instant::now())
    }

    /// Report a rising edge with an explicit timestamp.
    pub fn notify_at(&self, at: Instant) -> bool {
        self.tx.send(at).is_ok()
    }
}

/// Listener side of the presence channel.
#[derive(Debug)]
pub struct PresenceReceiver {
    rx: mpsc::UnboundedReceiver<Instant>,
}

/// Create a sensor channel.
pub fn presence_channel() -> (PresenceSender, PresenceReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PresenceSender { tx }, PresenceReceiver { rx })
}
