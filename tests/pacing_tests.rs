//! Integration tests for the closed-loop pacing detector
//!
//! Tests validate:
//! - Peak detection from the derivative sign pattern
//! - APD90 crossing and stimulus scheduling at APD90 + offset
//! - Offsets drawn in order and exhaustion
//! - Samples at or before the last consumed time are ignored

use paci_sim::protocol::{PacingConfig, PacingEvent, PacingScheduler};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upstroke to a +20 mV peak at t = 0.03 s from a -75 mV baseline
fn feed_upstroke(scheduler: &mut PacingScheduler, t0: f64) -> Option<PacingEvent> {
    scheduler.observe(t0 + 0.01, -0.02, 5.0);
    scheduler.observe(t0 + 0.02, 0.01, 2.0);
    scheduler.observe(t0 + 0.03, 0.02, -0.5)
}

/// Repolarisation through the APD90 level (-65.5 mV for the beat above)
fn feed_repolarisation(scheduler: &mut PacingScheduler, t0: f64) -> Option<PacingEvent> {
    assert_eq!(scheduler.observe(t0 + 0.20, -0.03, -0.5), None);
    scheduler.observe(t0 + 0.30, -0.07, -0.1)
}

#[test]
fn test_detects_peak_and_schedules_stimulus() {
    let mut scheduler = PacingScheduler::new(PacingConfig::default(), vec![0.4, 0.1]);

    match feed_upstroke(&mut scheduler, 0.0) {
        Some(PacingEvent::Peak {
            t_sec,
            voltage_V,
            apd90_target_V,
        }) => {
            assert_eq!(t_sec, 0.03);
            assert_eq!(voltage_V, 0.02);
            assert!((apd90_target_V - (0.02 - 0.9 * 0.095)).abs() < 1e-12);
        }
        other => panic!("expected a peak, got {:?}", other),
    }

    match feed_repolarisation(&mut scheduler, 0.0) {
        Some(PacingEvent::Apd90 {
            t_sec,
            stimulation_sec,
        }) => {
            assert_eq!(t_sec, 0.30);
            let s = stimulation_sec.expect("first offset available");
            assert!((s - 0.70).abs() < 1e-12, "stimulus at APD90 + 0.4 s, got {}", s);
        }
        other => panic!("expected APD90, got {:?}", other),
    }

    let info = scheduler.info();
    assert_eq!(info.peak_times_sec, vec![0.03]);
    assert_eq!(info.apd90_times_sec, vec![0.30]);
    assert_eq!(info.next_offset_index, 1);
    assert_eq!(info.baseline_V, -0.07, "baseline resets at APD90");

    let stimulus_end = 0.70 + scheduler.config().stimulus_duration_sec;
    assert!((stimulus_end - 0.705).abs() < 1e-12, "default 5 ms stimulus");
    assert!(!scheduler.should_stimulate(0.69));
    assert!(scheduler.should_stimulate(0.7005));
    assert!(scheduler.should_stimulate(0.704));
    assert!(!scheduler.should_stimulate(0.706), "stimulus lasts 5 ms");
}

#[test]
fn test_offsets_drawn_in_order_until_exhausted() {
    let mut scheduler = PacingScheduler::new(PacingConfig::default(), vec![0.4]);

    feed_upstroke(&mut scheduler, 0.0);
    assert!(matches!(
        feed_repolarisation(&mut scheduler, 0.0),
        Some(PacingEvent::Apd90 { stimulation_sec: Some(_), .. })
    ));

    // Second beat from the new -70 mV baseline
    scheduler.observe(1.0, -0.07, 0.0);
    assert!(matches!(
        feed_upstroke(&mut scheduler, 1.0),
        Some(PacingEvent::Peak { .. })
    ));
    assert_eq!(
        feed_repolarisation(&mut scheduler, 1.0),
        Some(PacingEvent::Apd90 {
            t_sec: 1.3,
            stimulation_sec: None
        })
    );

    let info = scheduler.info();
    assert_eq!(info.peak_times_sec.len(), 2);
    assert_eq!(info.stimulation_times_sec.len(), 1, "offsets exhausted");
}

#[test]
fn test_small_peaks_ignored() {
    let mut scheduler = PacingScheduler::new(PacingConfig::default(), vec![0.1]);
    scheduler.observe(0.01, -0.07, 1.0);
    scheduler.observe(0.02, -0.06, 1.0);
    assert_eq!(
        scheduler.observe(0.03, -0.05, -1.0),
        None,
        "25 mV above baseline is below the 40 mV threshold"
    );
    assert!(scheduler.info().peak_times_sec.is_empty());
}

#[test]
fn test_stale_samples_do_not_disturb_detector() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut scheduler = PacingScheduler::new(PacingConfig::default(), vec![0.4]);

    let samples = [
        (0.01, -0.02, 5.0),
        (0.02, 0.01, 2.0),
        (0.03, 0.02, -0.5),
        (0.20, -0.03, -0.5),
        (0.30, -0.07, -0.1),
    ];
    let mut events = Vec::new();
    for &(t, v, dv) in &samples {
        if let Some(event) = scheduler.observe(t, v, dv) {
            events.push(event);
        }
        // Probes at already-consumed times with arbitrary values
        for _ in 0..5 {
            let stale_t = rng.gen_range(0.0..=t);
            let stale_v = rng.gen_range(-0.1..0.05);
            let stale_dv = rng.gen_range(-10.0..10.0);
            assert_eq!(scheduler.observe(stale_t, stale_v, stale_dv), None);
        }
    }

    assert_eq!(events.len(), 2, "one peak and one APD90: {:?}", events);
    assert_eq!(scheduler.info().peak_times_sec, vec![0.03]);
    assert_eq!(scheduler.info().apd90_times_sec, vec![0.30]);
}
