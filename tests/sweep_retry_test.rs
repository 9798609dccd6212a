//! Tests for the bounded telemetry retry during a ramp traversal.

use eload_sweep::{
    adapters::{MockLineSource, MockTransport},
    error::{BenchError, ProtocolError},
    instrument::{load::level_command, ElectronicLoad, InstrumentLink},
    sweep::{Ramp, SweepController},
    telemetry::TelemetryLink,
    timing::{RecordingSettle, RETRY_SETTLE, STEP_SETTLE},
    LinkRole,
};

/// Helper to create a load backed by a scripted transport.
fn create_load(handle: &MockTransport) -> ElectronicLoad {
    ElectronicLoad::new(InstrumentLink::new(
        LinkRole::Load,
        "RIGOL_DC_ELoad",
        Box::new(handle.clone()),
    ))
}

#[test]
fn test_retry_yields_second_reading_after_one_reissued_level() {
    let load_handle = MockTransport::new();
    let sensor = MockLineSource::new();
    sensor.push_line("{\"current\": ");
    sensor.push_line("{\"current\": 2.5}");

    let mut load = create_load(&load_handle);
    let mut telemetry = TelemetryLink::new("COM3", Box::new(sensor.clone()));
    let ramp = Ramp::from_currents(&[1.2]).expect("Failed to create ramp");
    let settle = RecordingSettle::new();
    let mut settle_handle = settle.clone();

    let trial = SweepController::new(&ramp, &mut settle_handle)
        .run_ramp(&mut load, &mut telemetry)
        .expect("Retry should recover from one malformed line");

    assert_eq!(trial.sensor_currents(), vec![2.5]);

    // First command is the ramp step itself, the second is the re-issue
    assert_eq!(
        load_handle.commands(),
        vec![level_command(1.2), level_command(1.2)]
    );
    assert_eq!(settle.delays(), vec![STEP_SETTLE, RETRY_SETTLE]);

    // Stale input is flushed before each of the two reads
    assert_eq!(sensor.clears(), 2);
    assert_eq!(sensor.reads(), 2);
}

#[test]
fn test_retry_exhaustion_is_protocol_error_without_frame() {
    let load_handle = MockTransport::new();
    let sensor = MockLineSource::new();
    sensor.push_line("{\"voltage\": 24.0}");
    sensor.push_bytes(&[0xc3, 0x28, b'\n']);

    let mut load = create_load(&load_handle);
    let mut telemetry = TelemetryLink::new("COM3", Box::new(sensor.clone()));
    let ramp = Ramp::from_currents(&[0.6]).expect("Failed to create ramp");
    let mut settle = RecordingSettle::new();

    let result = SweepController::new(&ramp, &mut settle).run_ramp(&mut load, &mut telemetry);

    match result {
        Err(BenchError::Protocol(ProtocolError::Exhausted { attempts, last, .. })) => {
            assert_eq!(attempts, 2);
            assert_eq!(*last, ProtocolError::Encoding);
        }
        other => panic!("Expected retry exhaustion, got {:?}", other),
    }

    // Exactly one re-issue, and no third read
    assert_eq!(load_handle.count(&level_command(0.6)), 2);
    assert_eq!(sensor.reads(), 2);
}

#[test]
fn test_retry_is_per_step() {
    // One glitch on each of two steps is recovered independently
    let load_handle = MockTransport::new();
    let sensor = MockLineSource::new();
    for line in [
        "bad",
        "{\"current\": 0.1}",
        "bad",
        "{\"current\": 0.3}",
    ] {
        sensor.push_line(line);
    }

    let mut load = create_load(&load_handle);
    let mut telemetry = TelemetryLink::new("COM3", Box::new(sensor));
    let ramp = Ramp::new(0.2, 0.2).expect("Failed to create ramp");
    let mut settle = RecordingSettle::new();

    let trial = SweepController::new(&ramp, &mut settle)
        .run_ramp(&mut load, &mut telemetry)
        .expect("Each step should recover on its own retry");

    assert_eq!(trial.load_currents(), vec![0.0, 0.2]);
    assert_eq!(trial.sensor_currents(), vec![0.1, 0.3]);
}

#[test]
fn test_sensor_timeout_is_retried() {
    let load_handle = MockTransport::new();
    let sensor = MockLineSource::new();
    sensor.push_error("read timed out");
    sensor.push_line("{\"current\": 0.0}");

    let mut load = create_load(&load_handle);
    let mut telemetry = TelemetryLink::new("COM3", Box::new(sensor));
    let ramp = Ramp::from_currents(&[0.0]).expect("Failed to create ramp");
    let mut settle = RecordingSettle::new();

    let trial = SweepController::new(&ramp, &mut settle)
        .run_ramp(&mut load, &mut telemetry)
        .expect("A timeout should be retried like a malformed line");
    assert_eq!(trial.len(), 1);
}
