//! End-to-end show tests: scheduler, sequencer and mocks on tokio's paused clock

use std::sync::Arc;
use std::time::Duration;

use rs_conductor::{
    config::{ConductorConfig, PresenceConfig, ShowConfig},
    hal::{MockActuator, MockAlerts, MockClock, MockMedia},
    presence::presence_channel,
    scheduler::Scheduler,
    sequencer::ShowSequencer,
    ConductorError, ShowPhase, ShowResult, StateLabel,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

type Sequencer = ShowSequencer<MockActuator, MockMedia>;

struct Rig {
    sequencer: Arc<Sequencer>,
    media: MockMedia,
    clock: MockClock,
    alerts: MockAlerts,
    stop: Option<oneshot::Sender<()>>,
    run: Option<JoinHandle<Result<(), ConductorError>>>,
}

impl Rig {
    fn new(config: ConductorConfig, clock: MockClock) -> Self {
        let media = MockMedia::new()
            .with_upbeat("upbeat_intro.mp3", 30)
            .with_track("a.mp3", 60)
            .with_track("b.mp3", 90);
        Self::with_media(config, clock, media)
    }

    fn with_media(config: ConductorConfig, clock: MockClock, media: MockMedia) -> Self {
        let alerts = MockAlerts::new();
        let sequencer = ShowSequencer::new(
            &config,
            MockActuator::new(),
            media.clone(),
            Arc::new(alerts.clone()),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let sequencer = Arc::new(sequencer);

        let scheduler = Scheduler::new(Arc::clone(&sequencer), config.scheduler.clone());
        let (stop, stopped) = oneshot::channel::<()>();
        let run = tokio::spawn(scheduler.run(async {
            let _ = stopped.await;
        }));

        Self {
            sequencer,
            media,
            clock,
            alerts,
            stop: Some(stop),
            run: Some(run),
        }
    }

    async fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(run) = self.run.take() {
            run.await.unwrap().unwrap();
        }
    }

    fn label(&self) -> StateLabel {
        self.sequencer.state().label()
    }
}

fn config() -> ConductorConfig {
    ConductorConfig::default()
        .with_show(
            ShowConfig::default()
                .with_tracks_to_play(2)
                .with_break_time_secs(300),
        )
        .with_presence(PresenceConfig::default().with_enabled(false))
}

fn position(history: &[StateLabel], label: StateLabel) -> usize {
    history
        .iter()
        .position(|l| *l == label)
        .unwrap_or_else(|| panic!("{label:?} not in {history:?}"))
}

// ============================================================================
// Full Show Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn one_show_end_to_end() {
    let mut rig = Rig::new(config(), MockClock::at(12, 0));
    sleep(Duration::from_secs(200)).await;

    assert_eq!(rig.sequencer.state().last_result(), Some(ShowResult::Completed));
    assert_eq!(rig.label(), StateLabel::CoolingDown);
    assert_eq!(rig.media.upbeat_picks(), 1);
    assert_eq!(
        rig.media.played_names(),
        vec!["upbeat_intro.mp3", "a.mp3", "b.mp3"]
    );

    let history = rig.sequencer.state().history();
    let spin_up = position(&history, StateLabel::Playing(ShowPhase::SpinUp));
    let first = position(&history, StateLabel::Playing(ShowPhase::Playlist(0)));
    let second = position(&history, StateLabel::Playing(ShowPhase::Playlist(1)));
    let spin_down = position(&history, StateLabel::Playing(ShowPhase::SpinDown));
    let cooling = position(&history, StateLabel::CoolingDown);
    assert!(spin_up < first && first < second && second < spin_down && spin_down < cooling);

    rig.sequencer.actuator().inspect(|a| {
        assert!(a.open_signal);
        assert!(!a.enabled);
        assert_eq!(a.duty_cycle, 0.0);
        assert_eq!(a.enable_writes(), vec![true, false]);
        // Never above the configured top speed
        assert!(a.duty_writes().iter().all(|d| (0.0..=50.0).contains(d)));
    });

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn next_show_waits_for_cooldown() {
    let mut rig = Rig::new(config(), MockClock::at(12, 0));

    sleep(Duration::from_secs(200)).await;
    assert_eq!(rig.media.upbeat_picks(), 1);

    // Show ends around 183 s, cooldown is 300 s
    sleep(Duration::from_secs(250)).await;
    assert_eq!(rig.media.upbeat_picks(), 1);
    assert_eq!(rig.label(), StateLabel::CoolingDown);

    sleep(Duration::from_secs(70)).await;
    assert_eq!(rig.media.upbeat_picks(), 2);
    assert!(rig.sequencer.state().has_running_show());

    // The previous show ended on b.mp3, so the new one must not open with it
    sleep(Duration::from_secs(60)).await;
    let played = rig.media.played_names();
    assert_eq!(played[2], "b.mp3");
    assert_eq!(played[3], "upbeat_intro.mp3");
    assert_ne!(played[4], "b.mp3");

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn closing_mid_playlist_skips_remaining_tracks() {
    let mut rig = Rig::new(config(), MockClock::at(19, 59));

    // First playlist track runs from 30 s to 90 s
    sleep(Duration::from_secs(60)).await;
    rig.clock.set_hms(20, 0, 30);

    sleep(Duration::from_secs(10)).await;
    // Still running, so the open line stays on
    rig.sequencer.actuator().inspect(|a| assert!(a.open_signal));

    sleep(Duration::from_secs(60)).await;
    assert_eq!(
        rig.sequencer.state().last_result(),
        Some(ShowResult::AbortedShopClosed)
    );
    assert_eq!(rig.media.played_names(), vec!["upbeat_intro.mp3", "a.mp3"]);
    rig.sequencer.actuator().inspect(|a| {
        assert!(!a.open_signal);
        assert!(!a.enabled);
    });

    // Cooldown over, shop still closed: nothing starts
    sleep(Duration::from_secs(400)).await;
    assert_eq!(rig.label(), StateLabel::Idle);
    assert_eq!(rig.media.upbeat_picks(), 1);

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn starts_at_opening_time() {
    let mut rig = Rig::new(config(), MockClock::at(7, 59));

    sleep(Duration::from_secs(5)).await;
    assert_eq!(rig.media.upbeat_picks(), 0);
    rig.sequencer.actuator().inspect(|a| assert!(!a.open_signal));

    rig.clock.set_hms(8, 0, 0);
    sleep(Duration::from_millis(300)).await;
    assert_eq!(rig.media.upbeat_picks(), 1);
    rig.sequencer.actuator().inspect(|a| assert!(a.open_signal));

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_show_forces_outputs_low() {
    let mut rig = Rig::new(config(), MockClock::at(12, 0));

    sleep(Duration::from_secs(60)).await;
    rig.sequencer
        .actuator()
        .inspect(|a| assert!(a.enabled && a.duty_cycle > 0.0));

    rig.shutdown().await;
    assert_eq!(rig.label(), StateLabel::Idle);
    rig.sequencer.actuator().inspect(|a| {
        assert!(!a.enabled);
        assert!(!a.open_signal);
        assert_eq!(a.duty_cycle, 0.0);
    });

    // Nothing keeps writing after shutdown
    let events = rig.sequencer.actuator().inspect(|a| a.events.len());
    sleep(Duration::from_secs(10)).await;
    assert_eq!(rig.sequencer.actuator().inspect(|a| a.events.len()), events);
}

// ============================================================================
// Presence Tests
// ============================================================================

fn presence_config() -> ConductorConfig {
    config().with_presence(
        PresenceConfig::default()
            .with_enabled(true)
            .with_limit_secs(40)
            .with_settle_secs(3),
    )
}

#[tokio::test(start_paused = true)]
async fn late_train_raises_alert() {
    let mut rig = Rig::new(presence_config(), MockClock::at(12, 0));
    sleep(Duration::from_secs(260)).await;

    match rig.sequencer.state().last_result() {
        Some(ShowResult::AbortedLate(delay)) => {
            assert!(delay > Duration::from_secs(40));
        }
        other => panic!("expected AbortedLate, got {other:?}"),
    }
    let alerts = rig.alerts.messages();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].starts_with("Train is late"));
    rig.sequencer.actuator().inspect(|a| assert!(!a.enabled));

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn sensor_pulses_keep_show_on_time() {
    let mut rig = Rig::new(presence_config(), MockClock::at(12, 0));

    let (sensor, events) = presence_channel();
    tokio::spawn(Arc::clone(rig.sequencer.presence()).listen(events));
    tokio::spawn(async move {
        loop {
            sleep(Duration::from_secs(15)).await;
            if !sensor.notify() {
                break;
            }
        }
    });

    sleep(Duration::from_secs(240)).await;
    assert_eq!(rig.sequencer.state().last_result(), Some(ShowResult::Completed));
    assert!(rig.alerts.messages().is_empty());
    assert!(rig.sequencer.presence().sightings() > 0);

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn closing_during_presence_wait_ends_show() {
    let mut rig = Rig::new(
        presence_config().with_presence(
            PresenceConfig::default()
                .with_enabled(true)
                .with_limit_secs(600),
        ),
        MockClock::at(19, 59),
    );

    // Playlist ends at 180 s; close while waiting for the train
    sleep(Duration::from_secs(200)).await;
    assert_eq!(
        rig.label(),
        StateLabel::Playing(ShowPhase::AwaitPresence)
    );
    rig.clock.set_hms(20, 1, 0);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(
        rig.sequencer.state().last_result(),
        Some(ShowResult::AbortedShopClosed)
    );
    assert!(rig.alerts.messages().is_empty());

    rig.shutdown().await;
}
