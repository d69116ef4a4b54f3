// Integration tests for the RC discharge thermistor reader

use std::sync::Arc;
use std::time::Duration;

use krusty_delta::hardware::{ReadState, RcThermistor, ThermistorParams};
use krusty_delta::{IoLevel, ManualClock, PinId, SimPin};
use krusty_shared::config::ThermistorConfig;
use krusty_shared::hardware_traits::{PinAction, PinTrace};

fn create_test_params() -> ThermistorParams {
    ThermistorParams {
        series_resistor: 500.0,
        capacitance: 100e-12,
        vcc: 3.3,
        threshold: 1.5,
        t0_celsius: 25.0,
        r0: 100_000.0,
        beta: 3950.0,
        min_r: 0.0,
        max_r: 200_000.0,
    }
}

#[test]
fn test_resistance_round_trip() {
    let params = create_test_params();
    let secs = params.discharge_time(150_000.0);
    let estimate = params.estimate_resistance(secs);
    assert!((estimate - 150_000.0).abs() <= 2.0, "estimate {estimate}");
}

#[test]
fn test_reference_resistance_gives_reference_temperature() {
    let params = create_test_params();
    assert!((params.temperature_from_resistance(100_000.0) - 25.0).abs() < 1e-9);
    // above R0 the thermistor is colder than T0
    assert!(params.temperature_from_resistance(150_000.0) < 25.0);
}

#[test]
fn test_params_from_config_match_defaults() {
    let params = ThermistorParams::from_config(&ThermistorConfig::default());
    let expected = create_test_params();
    assert!((params.capacitance - expected.capacitance).abs() < 1e-24);
    assert_eq!(params.max_r, expected.max_r);
    assert_eq!(params.series_resistor, expected.series_resistor);
}

#[test]
fn test_read_cycle_with_scripted_pin() {
    // 100nF keeps the discharge in the millisecond range, where nanosecond
    // clock resolution is far finer than the 2 ohm search resolution
    let params = ThermistorParams {
        capacitance: 100e-9,
        ..create_test_params()
    };
    let discharge = Duration::from_secs_f64(params.discharge_time(150_000.0));

    let trace = PinTrace::new();
    let pin = SimPin::new(23, &trace);
    let probe = pin.clone();
    let clock = Arc::new(ManualClock::new());
    let mut sensor = RcThermistor::with_clock(pin, params, clock.clone());

    assert_eq!(sensor.state(), ReadState::Idle);
    sensor.start_read();
    assert_eq!(sensor.state(), ReadState::Discharging);
    probe.script_input(&[IoLevel::High, IoLevel::High, IoLevel::Low]);

    let first = discharge / 3;
    clock.advance(first);
    assert!(!sensor.is_ready());
    clock.advance(first);
    assert!(!sensor.is_ready());
    clock.advance(discharge - first * 2);
    assert!(sensor.is_ready());
    assert_eq!(sensor.state(), ReadState::Ready);

    // input while discharging, then driven high to recharge
    assert_eq!(
        trace.actions(),
        vec![
            PinAction::MakeInput(PinId(23)),
            PinAction::MakeOutput(PinId(23), IoLevel::High),
        ]
    );

    assert_eq!(sensor.discharge_time(), Some(discharge));
    let temperature = sensor.value().unwrap();
    let expected = params.temperature_from_resistance(150_000.0);
    assert!((temperature - expected).abs() < 0.01, "{temperature} vs {expected}");

    // polling again does not touch the pin or move the reading
    clock.advance(Duration::from_millis(5));
    assert!(sensor.is_ready());
    assert_eq!(trace.actions().len(), 2);
    assert_eq!(sensor.value(), Some(temperature));
}

#[test]
fn test_stuck_read_is_visible_through_elapsed_time() {
    let trace = PinTrace::new();
    let pin = SimPin::new(24, &trace);
    let probe = pin.clone();
    let clock = Arc::new(ManualClock::new());
    let mut sensor = RcThermistor::with_clock(pin, create_test_params(), clock.clone());

    sensor.start_read();
    probe.script_input(&[IoLevel::High]);
    for _ in 0..100 {
        assert!(!sensor.is_ready());
        clock.advance(Duration::from_millis(1));
    }
    assert_eq!(sensor.time_since_start_read(), Duration::from_millis(100));
    assert_eq!(sensor.value(), None);

    // abandoning the read restarts the timer
    sensor.start_read();
    assert_eq!(sensor.time_since_start_read(), Duration::ZERO);
    assert_eq!(sensor.state(), ReadState::Discharging);
}
