//! One complete show, from intro track to cooldown.
//!
//! [`ShowSequencer`] owns everything a show touches: the actuator, the media
//! source, the presence monitor and the shared show state. The scheduler
//! calls [`ShowSequencer::run_show`] on a fresh task after
//! [`SharedShowState::try_begin`] succeeds.
//!
//! ```text
//! Intro ─► SpinUp ─► Playlist(0..n) ─► AwaitPresence ─► SpinDown ─► Done
//!                        │ shop closed                      ▲
//!                        └──────────────────────────────────┘
//! ```
//!
//! Media failures never stop a show: the slot waits
//! [`ShowConfig::fallback_duration`] instead, so the speed curve keeps
//! running. Actuator failures are logged and ignored until shutdown.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{ConductorConfig, PresenceConfig, ShowConfig};
use crate::error::{ConfigError, MediaError};
use crate::hours::ShopHours;
use crate::presence::{DeadlineOutcome, PresenceMonitor};
use crate::speed_profile::{SpeedProfile, SpinDown};
use crate::state::{SharedActuator, SharedShowState, ShowId, ShowPhase, ShowResult};
use crate::traits::{Actuator, AlertSink, Clock, MediaSource, TrackRef};

/// Pause after the motor line drops, before the show counts as done.
pub const RELEASE_DELAY: Duration = Duration::from_secs(1);

/// Volume used between tracks.
const MUTED: u8 = 0;

/// One playlist slot chosen at spin-up.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedSlot {
    /// The track, or `None` when picking failed.
    pub track: Option<TrackRef>,
    /// How long the slot lasts on the speed curve.
    pub duration: Duration,
}

struct MediaCursor<M> {
    source: M,
    last_pick: Option<TrackRef>,
}

/// Runs shows against shared hardware and state.
pub struct ShowSequencer<A: Actuator, M: MediaSource> {
    state: Arc<SharedShowState>,
    actuator: Arc<SharedActuator<A>>,
    presence: Arc<PresenceMonitor>,
    media: Mutex<MediaCursor<M>>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock + Send + Sync>,
    hours: ShopHours,
    profile: SpeedProfile,
    show: ShowConfig,
    presence_config: PresenceConfig,
}

impl<A, M> ShowSequencer<A, M>
where
    A: Actuator + Send + 'static,
    M: MediaSource + Send + 'static,
{
    /// Build a sequencer from validated configuration.
    ///
    /// Creates a fresh [`SharedShowState`] and [`PresenceMonitor`]; feed
    /// sensor events to [`presence`](Self::presence).
    pub fn new(
        config: &ConductorConfig,
        actuator: A,
        media: M,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(SharedShowState::new()),
            actuator: Arc::new(SharedActuator::new(actuator)),
            presence: Arc::new(PresenceMonitor::new(config.presence.poll_interval())),
            media: Mutex::new(MediaCursor {
                source: media,
                last_pick: None,
            }),
            alerts,
            clock,
            hours: config.hours,
            profile: SpeedProfile::new(config.speed)?,
            show: config.show.clone(),
            presence_config: config.presence.clone(),
        })
    }

    /// The shared show state.
    pub fn state(&self) -> &Arc<SharedShowState> {
        &self.state
    }

    /// The shared actuator.
    pub fn actuator(&self) -> &Arc<SharedActuator<A>> {
        &self.actuator
    }

    /// The presence monitor.
    pub fn presence(&self) -> &Arc<PresenceMonitor> {
        &self.presence
    }

    /// Whether the shop is open right now.
    pub fn shop_is_open(&self) -> bool {
        self.hours.is_open(self.clock.time_of_day())
    }

    fn media(&self) -> MutexGuard<'_, MediaCursor<M>> {
        self.media.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, show_id: ShowId, phase: ShowPhase) {
        self.state.set_phase(show_id, phase);
    }

    /// Run show `show_id` to completion and move the state to cooldown.
    ///
    /// `show_id` must come from [`SharedShowState::try_begin`].
    pub async fn run_show(self: Arc<Self>, show_id: ShowId) -> ShowResult {
        self.presence.reset(Instant::now());

        // Intro: music only, train still. `try_begin` already entered Intro.
        let wait = self
            .off_runtime("intro", |seq| {
                let intro = seq.media().source.pick_upbeat_track();
                seq.start_track(intro, seq.show.intro_volume, "intro")
            })
            .await
            .unwrap_or_else(|| self.show.fallback_duration());
        sleep(wait).await;

        self.enter(show_id, ShowPhase::SpinUp);
        let plan = match self.off_runtime("playlist", |seq| seq.plan_playlist()).await {
            Some(plan) => plan,
            None => (0..self.show.tracks_to_play)
                .map(|_| PlannedSlot {
                    track: None,
                    duration: self.show.fallback_duration(),
                })
                .collect(),
        };
        let run_time: Duration = plan.iter().map(|slot| slot.duration).sum();
        info!(
            show_id,
            tracks = plan.len(),
            run_time_secs = run_time.as_secs_f64(),
            "spinning up"
        );
        self.actuator.set_enable(true);
        let ramp = Ramp::start(
            Arc::clone(&self.actuator),
            self.profile,
            run_time,
            self.show.ramp_tick(),
        );

        let mut result = ShowResult::Completed;
        for (index, slot) in plan.iter().enumerate() {
            if !self.shop_is_open() {
                info!(show_id, skipped = plan.len() - index, "shop closed, cutting show short");
                result = ShowResult::AbortedShopClosed;
                break;
            }
            self.enter(show_id, ShowPhase::Playlist(index));
            let next = slot.clone();
            let wait = self
                .off_runtime("playlist", move |seq| seq.play_slot(&next))
                .await
                .unwrap_or(slot.duration);
            sleep(wait).await;
            self.set_volume(MUTED);
        }

        if result == ShowResult::Completed && self.presence_config.enabled {
            self.enter(show_id, ShowPhase::AwaitPresence);
            result = self.await_presence(show_id).await;
        }

        self.enter(show_id, ShowPhase::SpinDown);
        let from = ramp.stop().await;
        let plan = SpinDown::new(from, self.show.spin_down(), self.show.spin_down_step);
        debug!(show_id, from, steps = plan.len(), "spinning down");
        spin_down(&self.actuator, plan).await;
        sleep(RELEASE_DELAY).await;

        self.enter(show_id, ShowPhase::Done);
        match result {
            ShowResult::Completed => info!(show_id, "show completed"),
            ShowResult::AbortedShopClosed => info!(show_id, "show aborted: shop closed"),
            ShowResult::AbortedLate(delay) => warn!(
                show_id,
                delay_secs = delay.as_secs_f64(),
                "show aborted: train late"
            ),
        }
        self.state
            .finish(show_id, result, Instant::now(), self.show.break_time());
        result
    }

    /// Run a media call on the blocking pool, since duration lookups and
    /// player spawns touch the filesystem under the media lock. Returns
    /// `None` if the call panicked.
    async fn off_runtime<R, F>(self: &Arc<Self>, what: &'static str, call: F) -> Option<R>
    where
        F: FnOnce(&Self) -> R + Send + 'static,
        R: Send + 'static,
    {
        let seq = Arc::clone(self);
        match tokio::task::spawn_blocking(move || call(&*seq)).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "{what} media call failed");
                None
            }
        }
    }

    /// Pick every playlist track up front so the speed curve knows the
    /// total run time.
    ///
    /// No pick repeats the one before it (including the last pick of the
    /// previous show) when the library offers a choice.
    pub fn plan_playlist(&self) -> Vec<PlannedSlot> {
        let mut media = self.media();
        let cursor = &mut *media;
        (0..self.show.tracks_to_play)
            .map(|_| match cursor.source.pick_next_track(cursor.last_pick.as_ref()) {
                Ok(track) => {
                    cursor.last_pick = Some(track.clone());
                    PlannedSlot {
                        duration: track.duration,
                        track: Some(track),
                    }
                }
                Err(e) => PlannedSlot {
                    track: None,
                    duration: self.fallback_duration("playlist pick", &e),
                },
            })
            .collect()
    }

    fn play_slot(&self, slot: &PlannedSlot) -> Duration {
        match &slot.track {
            Some(track) => self.start_track(Ok(track.clone()), self.show.playlist_volume, "playlist"),
            None => slot.duration,
        }
    }

    /// Start `track` at `volume` and return how long to wait for it.
    fn start_track(&self, track: Result<TrackRef, MediaError>, volume: u8, what: &str) -> Duration {
        let track = match track {
            Ok(track) => track,
            Err(e) => return self.fallback_duration(what, &e),
        };

        let mut media = self.media();
        if let Err(e) = media.source.set_volume(volume) {
            warn!(error = %e, volume, "failed to set volume");
        }
        match media.source.play(&track) {
            Ok(duration) => {
                info!(track = %track.name(), secs = duration.as_secs_f64(), "playing {what} track");
                duration
            }
            Err(e) => {
                drop(media);
                warn!(track = %track.name(), "cannot play {what} track");
                self.fallback_duration(what, &e)
            }
        }
    }

    /// Stop whatever the media source is playing.
    pub fn stop_media(&self) {
        if let Err(e) = self.media().source.stop() {
            warn!(error = %e, "failed to stop playback");
        }
    }

    fn set_volume(&self, level: u8) {
        if let Err(e) = self.media().source.set_volume(level) {
            warn!(error = %e, level, "failed to set volume");
        }
    }

    /// Duration substituted for a track the media source could not provide.
    pub fn fallback_duration(&self, what: &str, error: &MediaError) -> Duration {
        let fallback = self.show.fallback_duration();
        warn!(
            error = %error,
            fallback_secs = fallback.as_secs(),
            "{what} track unavailable, using fallback duration"
        );
        fallback
    }

    async fn await_presence(&self, show_id: ShowId) -> ShowResult {
        let playlist_end = Instant::now();
        let outcome = self
            .presence
            .check_deadline(playlist_end, self.presence_config.limit(), || {
                self.shop_is_open()
            })
            .await;

        let result = match outcome {
            DeadlineOutcome::Spotted { after } => {
                info!(show_id, after_secs = after.as_secs_f64(), "train on time");
                ShowResult::Completed
            }
            DeadlineOutcome::Late { delay } => {
                self.alerts.send_alert(&format!(
                    "Train is late by {:.1}s (show {show_id}, limit {}s)",
                    delay.as_secs_f64(),
                    self.presence_config.limit_secs
                ));
                ShowResult::AbortedLate(delay)
            }
            DeadlineOutcome::Cancelled => return ShowResult::AbortedShopClosed,
        };

        sleep(self.presence_config.settle()).await;
        result
    }
}

/// Step the duty cycle down along `plan`, then release the motor line.
pub async fn spin_down<A: Actuator>(actuator: &SharedActuator<A>, plan: SpinDown) {
    let delay = plan.step_delay();
    for duty in plan.iter() {
        sleep(delay).await;
        actuator.set_duty_cycle(duty);
    }
    if plan.is_empty() {
        actuator.set_duty_cycle(0.0);
    }
    actuator.set_enable(false);
}

// ============================================================================
// Ramp Task
// ============================================================================

/// Background task following the speed curve.
///
/// Dropping a `Ramp` aborts the task, so an aborted show never leaves a
/// ramp writing duty cycles.
pub struct Ramp {
    handle: JoinHandle<()>,
    last_duty: Arc<AtomicU32>,
}

impl Ramp {
    /// Spawn a task that writes `profile.at(t, run_time)` every `tick`.
    pub fn start<A>(
        actuator: Arc<SharedActuator<A>>,
        profile: SpeedProfile,
        run_time: Duration,
        tick: Duration,
    ) -> Self
    where
        A: Actuator + Send + 'static,
    {
        let last_duty = Arc::new(AtomicU32::new(0f32.to_bits()));
        let last = Arc::clone(&last_duty);
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let duty = profile.at(start.elapsed(), run_time) as f32;
                actuator.set_duty_cycle(duty);
                last.store(duty.to_bits(), Ordering::Relaxed);
            }
        });
        Self { handle, last_duty }
    }

    /// Last duty cycle the task commanded.
    pub fn last_duty(&self) -> f32 {
        f32::from_bits(self.last_duty.load(Ordering::Relaxed))
    }

    /// Stop the task and return its last commanded duty cycle.
    pub async fn stop(mut self) -> f32 {
        self.handle.abort();
        if let Err(e) = (&mut self.handle).await {
            if e.is_panic() {
                warn!("ramp task panicked");
            }
        }
        self.last_duty()
    }
}

impl Drop for Ramp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
