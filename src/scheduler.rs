//! The always-on control loop.
//!
//! Every tick the scheduler expires the cooldown, drives the open line,
//! starts a show when the shop is open and the state is idle, reaps the
//! finished show task, and logs a heartbeat at most once per heartbeat
//! interval. A show already running makes a new start a no-op; nothing is
//! queued.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rs_conductor::config::{ConductorConfig, PresenceConfig};
//! use rs_conductor::hal::{MockActuator, MockAlerts, MockClock, MockMedia};
//! use rs_conductor::scheduler::Scheduler;
//! use rs_conductor::sequencer::ShowSequencer;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let config = ConductorConfig::default()
//!     .with_presence(PresenceConfig::default().with_enabled(false));
//! let media = MockMedia::new()
//!     .with_upbeat("upbeat.mp3", 30)
//!     .with_track("a.mp3", 60);
//! let sequencer = Arc::new(
//!     ShowSequencer::new(
//!         &config,
//!         MockActuator::new(),
//!         media,
//!         Arc::new(MockAlerts::new()),
//!         Arc::new(MockClock::at(12, 0)),
//!     )
//!     .unwrap(),
//! );
//!
//! let scheduler = Scheduler::new(Arc::clone(&sequencer), config.scheduler.clone());
//! scheduler
//!     .run(tokio::time::sleep(Duration::from_secs(10)))
//!     .await
//!     .unwrap();
//!
//! // Shutdown mid-show leaves every output low.
//! sequencer.actuator().inspect(|a| assert!(!a.enabled && !a.open_signal));
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::ConductorError;
use crate::sequencer::ShowSequencer;
use crate::state::{ShowResult, ShowState};
use crate::traits::{Actuator, MediaSource};

/// What one tick observed and did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Shop hours say open.
    pub shop_open: bool,
    /// A show task is running after this tick.
    pub show_running: bool,
    /// This tick launched a show.
    pub started: bool,
}

/// Polls shop hours and launches at most one show at a time.
pub struct Scheduler<A: Actuator, M: MediaSource> {
    sequencer: Arc<ShowSequencer<A, M>>,
    config: SchedulerConfig,
    show: Option<JoinHandle<ShowResult>>,
    open_line: Option<bool>,
    last_heartbeat: Option<Instant>,
}

impl<A, M> Scheduler<A, M>
where
    A: Actuator + Send + 'static,
    M: MediaSource + Send + 'static,
{
    /// Create a scheduler for `sequencer`.
    pub fn new(sequencer: Arc<ShowSequencer<A, M>>, config: SchedulerConfig) -> Self {
        Self {
            sequencer,
            config,
            show: None,
            open_line: None,
            last_heartbeat: None,
        }
    }

    /// Whether a show task is held and not yet finished.
    pub fn has_show_task(&self) -> bool {
        self.show.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Run one scheduler step at `now`.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        self.reap().await;

        let state = Arc::clone(self.sequencer.state());
        state.expire_cooldown(now);

        let shop_open = self.sequencer.shop_is_open();
        self.drive_open_line(shop_open || state.has_running_show());

        let mut started = false;
        if shop_open {
            if let Some(show_id) = state.try_begin(now) {
                let sequencer = Arc::clone(&self.sequencer);
                self.show = Some(tokio::spawn(sequencer.run_show(show_id)));
                started = true;
            }
        }

        let report = TickReport {
            shop_open,
            show_running: state.has_running_show(),
            started,
        };
        self.heartbeat(now, &report);
        report
    }

    /// Collect a finished show task. A panicked show leaves the state
    /// stuck in `Playing`, so it is abandoned and the outputs forced low.
    async fn reap(&mut self) {
        if !self.show.as_ref().is_some_and(|h| h.is_finished()) {
            return;
        }
        let Some(handle) = self.show.take() else {
            return;
        };
        match handle.await {
            Ok(result) => debug!(?result, "show task finished"),
            Err(e) => {
                error!(error = %e, "show task failed");
                self.sequencer.state().abandon();
                match self.sequencer.actuator().shutdown() {
                    Ok(()) => self.open_line = Some(false),
                    Err(e) => error!(error = ?e, "failed to force outputs low"),
                }
            }
        }
    }

    /// Write the open line when it changes. A failed write is retried on
    /// the next tick.
    fn drive_open_line(&mut self, on: bool) {
        if self.open_line == Some(on) {
            return;
        }
        match self
            .sequencer
            .actuator()
            .try_with_actuator(|a| a.set_open_signal(on))
        {
            Ok(()) => {
                info!(on, "open line");
                self.open_line = Some(on);
            }
            Err(e) => warn!(error = ?e, on, "failed to set open line"),
        }
    }

    fn heartbeat(&mut self, now: Instant, report: &TickReport) {
        if self
            .last_heartbeat
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.heartbeat())
        {
            return;
        }
        self.last_heartbeat = Some(now);

        let presence = self.sequencer.presence();
        let state = self.sequencer.state().get();
        let phase = match state {
            ShowState::Playing { phase, .. } => Some(phase),
            _ => None,
        };
        info!(
            state = ?state.label(),
            ?phase,
            shop_open = report.shop_open,
            show_running = report.show_running,
            sightings = presence.sightings(),
            since_start_secs = presence.seconds_since_start(now),
            "heartbeat"
        );
    }

    /// Tick until `shutdown` resolves, then stop any show and force every
    /// output low.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), ConductorError>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(tick_ms = self.config.tick_ms, "scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick(Instant::now()).await;
                }
            }
        }

        self.stop().await
    }

    /// Abort the running show and force every output low.
    pub async fn stop(&mut self) -> Result<(), ConductorError> {
        info!("scheduler stopping");
        if let Some(handle) = self.show.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = %e, "show task panicked");
                }
            }
        }
        self.sequencer.stop_media();
        self.sequencer.state().abandon();
        self.open_line = Some(false);
        self.sequencer
            .actuator()
            .shutdown()
            .map_err(|e| ConductorError::Actuator(format!("{e:?}")))
    }
}
