//! Edge case and boundary condition tests for the conductor

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use rs_conductor::{
    config::{ConductorConfig, PresenceConfig, ShowConfig},
    hal::{MockActuator, MockAlerts, MockClock, MockMedia},
    scheduler::Scheduler,
    sequencer::ShowSequencer,
    ConfigError, PresenceMonitor, ShopHours, ShowResult, SpeedCurveParams, SpeedProfile,
    SpinDown, StateLabel,
};
use tokio::time::{sleep, Instant};

fn t(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap()
}

fn quiet_config() -> ConductorConfig {
    ConductorConfig::default()
        .with_show(ShowConfig::default().with_tracks_to_play(2))
        .with_presence(PresenceConfig::default().with_enabled(false))
}

// ============================================================================
// Business Hours Boundaries
// ============================================================================

#[test]
fn hours_boundaries_are_inclusive() {
    let hours = ShopHours::new(t(8, 0, 0), t(20, 0, 0));
    assert!(!hours.is_open(t(7, 59, 59)));
    assert!(hours.is_open(t(8, 0, 0)));
    assert!(hours.is_open(t(20, 0, 0)));
    assert!(!hours.is_open(t(20, 0, 1)));
}

#[test]
fn hours_wrapping_midnight() {
    let hours = ShopHours::new(t(22, 0, 0), t(2, 0, 0));
    assert!(hours.is_open(t(23, 30, 0)));
    assert!(hours.is_open(t(1, 0, 0)));
    assert!(!hours.is_open(t(12, 0, 0)));
}

#[tokio::test(start_paused = true)]
async fn night_shift_starts_show_after_midnight() {
    let config = quiet_config().with_hours(ShopHours::new(t(22, 0, 0), t(2, 0, 0)));
    let media = MockMedia::new()
        .with_upbeat("upbeat.mp3", 30)
        .with_track("a.mp3", 60);
    let sequencer = Arc::new(
        ShowSequencer::new(
            &config,
            MockActuator::new(),
            media.clone(),
            Arc::new(MockAlerts::new()),
            Arc::new(MockClock::at(1, 0)),
        )
        .unwrap(),
    );

    let scheduler = Scheduler::new(Arc::clone(&sequencer), config.scheduler.clone());
    scheduler.run(sleep(Duration::from_secs(1))).await.unwrap();
    assert_eq!(media.upbeat_picks(), 1);
}

// ============================================================================
// Speed Curve Boundaries
// ============================================================================

#[test]
fn curve_endpoints_sit_near_min_speed() {
    let params = SpeedCurveParams::default();
    let profile = SpeedProfile::new(params).unwrap();
    for d in [30.0, 90.0, 300.0] {
        let start = profile.compute(0.0, d);
        let end = profile.compute(d, d);
        assert!((start - params.min_speed).abs() <= params.transition_threshold + 1e-6);
        assert!((end - params.min_speed).abs() <= params.transition_threshold + 1e-6);
    }
}

#[test]
fn short_duration_is_floored() {
    let profile = SpeedProfile::new(SpeedCurveParams::default()).unwrap();
    assert_eq!(profile.compute(5.0, 10.0), profile.compute(5.0, 30.0));
    assert_eq!(profile.compute(-3.0, 60.0), profile.compute(0.0, 60.0));
}

#[test]
fn curve_stays_in_range() {
    let profile = SpeedProfile::new(
        SpeedCurveParams::default()
            .with_speeds(0.0, 100.0)
            .with_transition_threshold(1.0),
    )
    .unwrap();
    for i in 0..=400 {
        let v = profile.compute(i as f64 * 0.5, 180.0);
        assert!((0.0..=100.0).contains(&v), "{v} at {i}");
    }
}

#[test]
fn invalid_curves_are_rejected() {
    let bad = [
        SpeedCurveParams::default().with_speeds(50.0, 10.0),
        SpeedCurveParams::default().with_speeds(10.0, 120.0),
        SpeedCurveParams::default().with_coefficients(1.0, 2.0),
        SpeedCurveParams::default().with_coefficients(4.0, 0.5),
        SpeedCurveParams::default().with_transition_threshold(0.0),
        SpeedCurveParams::default().with_transition_threshold(40.0),
    ];
    for params in bad {
        assert!(
            matches!(SpeedProfile::new(params), Err(ConfigError::OutOfRange { .. })),
            "{params:?} accepted"
        );
    }
}

#[test]
fn spin_down_from_fraction() {
    let plan = SpinDown::new(12.5, Duration::from_secs(2), 1.0);
    let values: Vec<f32> = plan.iter().collect();
    assert_eq!(values.len(), 13);
    assert_eq!(values[0], 11.5);
    assert_eq!(*values.last().unwrap(), 0.0);
}

#[test]
fn spin_down_from_zero_is_empty() {
    assert!(SpinDown::new(0.0, Duration::from_secs(2), 1.0).is_empty());
}

// ============================================================================
// Media Edge Cases
// ============================================================================

#[tokio::test(start_paused = true)]
async fn empty_library_runs_on_fallback_durations() {
    let config = quiet_config();
    let sequencer = Arc::new(
        ShowSequencer::new(
            &config,
            MockActuator::new(),
            MockMedia::new(),
            Arc::new(MockAlerts::new()),
            Arc::new(MockClock::at(12, 0)),
        )
        .unwrap(),
    );

    let began = Instant::now();
    let id = sequencer.state().try_begin(began).unwrap();
    let result = Arc::clone(&sequencer).run_show(id).await;

    assert_eq!(result, ShowResult::Completed);
    // 40 s intro fallback + two 40 s slots, then spin-down and release
    let took = began.elapsed();
    assert!(took >= Duration::from_secs(122), "took {took:?}");
    assert!(took < Duration::from_secs(125), "took {took:?}");
    assert_eq!(sequencer.state().label(), StateLabel::CoolingDown);
}

#[tokio::test(start_paused = true)]
async fn single_track_library_may_repeat() {
    let config = quiet_config();
    let media = MockMedia::new()
        .with_upbeat("upbeat.mp3", 10)
        .with_track("only.mp3", 30);
    let sequencer = Arc::new(
        ShowSequencer::new(
            &config,
            MockActuator::new(),
            media.clone(),
            Arc::new(MockAlerts::new()),
            Arc::new(MockClock::at(12, 0)),
        )
        .unwrap(),
    );
    let id = sequencer.state().try_begin(Instant::now()).unwrap();
    Arc::clone(&sequencer).run_show(id).await;
    assert_eq!(
        media.played_names(),
        vec!["upbeat.mp3", "only.mp3", "only.mp3"]
    );
}

// ============================================================================
// Presence Edge Cases
// ============================================================================

#[tokio::test(start_paused = true)]
async fn event_exactly_at_deadline_start_counts() {
    let monitor = PresenceMonitor::new(Duration::from_millis(200));
    let start = Instant::now();
    monitor.reset(start);
    monitor.record_event(start);
    let outcome = monitor
        .check_deadline(start, Duration::from_secs(40), || true)
        .await;
    assert_eq!(
        outcome,
        rs_conductor::DeadlineOutcome::Spotted {
            after: Duration::ZERO
        }
    );
}

#[tokio::test(start_paused = true)]
async fn zero_limit_is_late_on_first_poll_after_start() {
    let monitor = PresenceMonitor::new(Duration::from_millis(200));
    let start = Instant::now();
    monitor.reset(start);
    let outcome = monitor
        .check_deadline(start, Duration::ZERO, || true)
        .await;
    assert!(matches!(outcome, rs_conductor::DeadlineOutcome::Late { .. }));
}

// ============================================================================
// Configuration Edge Cases
// ============================================================================

#[test]
fn partial_toml_keeps_defaults() {
    let config = ConductorConfig::from_toml_str(
        r#"
        [hours]
        open = "09:30"
        close = "18:00:00"

        [show]
        tracks_to_play = 3
        "#,
    )
    .unwrap();
    assert_eq!(config.hours, ShopHours::new(t(9, 30, 0), t(18, 0, 0)));
    assert_eq!(config.show.tracks_to_play, 3);
    assert_eq!(config.show.break_time_secs, 300);
    assert!(config.presence.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn malformed_hours_are_rejected() {
    let result = ConductorConfig::from_toml_str(
        r#"
        [hours]
        open = "nine"
        close = "18:00"
        "#,
    );
    let err = result.unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().contains("invalid time of day 'nine'"), "{err}");
}
