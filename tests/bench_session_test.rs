//! End-to-end tests of a bench run against the simulated bench.

use eload_sweep::{
    connection::LinkStatus,
    data::{CsvReportWriter, RecordingReportWriter, ReportWriter},
    instrument::load::level_command,
    simulation::SimulatedConnector,
    sweep::{Ramp, SweepCase, SweepPlan},
    teardown::TeardownAction,
    timing::{RecordingSettle, CASE_LEAD_IN},
    BenchError, BenchSession, ConnectionManager, LinkRole,
};

/// Helper to create a session with a recording clock.
fn create_session(
    connector: SimulatedConnector,
    ramp: Ramp,
    writer: Box<dyn ReportWriter>,
) -> (BenchSession, RecordingSettle) {
    let settle = RecordingSettle::new();
    let session = BenchSession::new(
        ConnectionManager::new(Box::new(connector)),
        ramp,
        Box::new(settle.clone()),
        writer,
    );
    (session, settle)
}

fn three_step_ramp() -> Ramp {
    Ramp::from_currents(&[0.0, 0.2, 0.4]).expect("Failed to create ramp")
}

#[test]
fn test_end_to_end_single_case() {
    let connector = SimulatedConnector::new().with_sensor(|level| level * 2.0);
    let writer = RecordingReportWriter::new();
    let (mut session, settle) =
        create_session(connector, three_step_ramp(), Box::new(writer.clone()));
    let plan = SweepPlan::new(vec![SweepCase::new(12.0, 1)]).expect("Failed to create plan");

    let summary = session.run(&plan);

    assert!(summary.is_success(), "Run should succeed: {:?}", summary);
    let matrix = &summary.matrix;
    assert_eq!(matrix.column_names(), vec!["Load", "Vo_12V_1"]);
    assert_eq!(matrix.column("Load"), Some(&[0.0, 0.2, 0.4][..]));
    assert_eq!(matrix.column("Vo_12V_1"), Some(&[0.0, 0.4, 0.8][..]));

    // The persisted matrix is the accumulated one
    let reports = writer.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(&reports[0], matrix);
    assert!(summary.report_path.is_some());

    assert_eq!(settle.delays()[0], CASE_LEAD_IN);
}

#[test]
fn test_partial_readiness_skips_sweep_and_tears_down_connected_links() {
    let connector = SimulatedConnector::new().with_unavailable(LinkRole::Load);
    let load = connector.load_handle();
    let supply = connector.supply_handle();
    let sensor = connector.sensor_handle();
    let writer = RecordingReportWriter::new();
    let (mut session, _settle) =
        create_session(connector, three_step_ramp(), Box::new(writer.clone()));
    let plan = SweepPlan::new(vec![SweepCase::new(24.0, 1)]).expect("Failed to create plan");

    let summary = session.run(&plan);

    let skipped = summary.skipped.as_ref().expect("Sweep should be skipped");
    assert_eq!(skipped.unavailable, vec![LinkRole::Load]);
    assert!(summary.completed_cases.is_empty());
    assert!(matches!(
        summary.links.iter().find(|(role, _)| *role == LinkRole::Load),
        Some((_, LinkStatus::Unavailable(_)))
    ));

    // No sweep: the sensor was never read and the load was never touched
    assert_eq!(sensor.reads(), 0);
    assert!(load.commands().is_empty());

    // Telemetry is closed; the unavailable load is skipped
    let teardown = summary.teardown.as_ref().expect("Teardown should run");
    assert_eq!(teardown.telemetry, TeardownAction::Closed);
    assert_eq!(teardown.load, TeardownAction::Skipped);
    assert!(sensor.is_closed());

    // The supply connected, so its gate still runs
    assert_eq!(teardown.supply, TeardownAction::SwitchedOff);
    assert_eq!(supply.count("*RST"), 0);
}

#[test]
fn test_only_telemetry_connected_skips_instrument_teardown_queries() {
    let connector = SimulatedConnector::new()
        .with_unavailable(LinkRole::Load)
        .with_unavailable(LinkRole::Supply);
    let load = connector.load_handle();
    let supply = connector.supply_handle();
    let sensor = connector.sensor_handle();
    let writer = RecordingReportWriter::new();
    let (mut session, _settle) =
        create_session(connector, three_step_ramp(), Box::new(writer.clone()));
    let plan = SweepPlan::new(vec![SweepCase::new(24.0, 1)]).expect("Failed to create plan");

    let summary = session.run(&plan);

    assert!(summary.skipped.is_some());
    assert!(sensor.is_closed());
    assert_eq!(load.count(":SOUR:INP:STAT?"), 0);
    assert_eq!(supply.count(":OUTPut:STATe? CH1"), 0);
    assert_eq!(writer.count(), 0);
}

#[test]
fn test_empty_matrix_is_not_persisted() {
    let writer = RecordingReportWriter::new();
    let (mut session, _settle) = create_session(
        SimulatedConnector::new(),
        three_step_ramp(),
        Box::new(writer.clone()),
    );

    let summary = session.run(&SweepPlan::default());

    assert!(summary.matrix.is_empty());
    assert_eq!(writer.count(), 0);
    assert!(summary.report_path.is_none());
    assert!(summary.teardown.is_some());
}

#[test]
fn test_instrument_failure_aborts_sweep_but_keeps_collected_data() {
    let connector = SimulatedConnector::new();
    let load = connector.load_handle();

    // The load drops off the bus once the first case reaches the top of the ramp
    let failing_load = load.clone();
    let connector = connector.with_sensor(move |level| {
        if level >= 0.4 {
            failing_load.set_offline(true);
        }
        level
    });
    let writer = RecordingReportWriter::new();
    let (mut session, _settle) =
        create_session(connector, three_step_ramp(), Box::new(writer.clone()));
    let plan = SweepPlan::new(vec![SweepCase::new(12.0, 1), SweepCase::new(24.0, 1)])
        .expect("Failed to create plan");

    let summary = session.run(&plan);

    assert_eq!(summary.completed_cases, vec![SweepCase::new(12.0, 1)]);
    assert!(matches!(summary.aborted, Some(BenchError::Instrument(_))));
    assert!(summary.failed_cases.is_empty());

    // Data from the completed case is still reported
    assert_eq!(summary.matrix.column_names(), vec!["Load", "Vo_12V_1"]);
    assert_eq!(writer.count(), 1);

    // The load gate fails, the others still run
    let teardown = summary.teardown.as_ref().expect("Teardown should run");
    assert!(matches!(teardown.load, TeardownAction::Failed(_)));
    assert_eq!(teardown.supply, TeardownAction::SwitchedOff);
    assert!(load.is_closed());
}

#[test]
fn test_csv_report_written_under_report_directory() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let out = dir.path().join("ELOAD_Reports");
    let writer = CsvReportWriter::new(&out, "Test");
    let (mut session, _settle) = create_session(
        SimulatedConnector::new().with_sensor(|level| level * 2.0),
        three_step_ramp(),
        Box::new(writer),
    );
    let plan = SweepPlan::new(vec![SweepCase::new(12.0, 1), SweepCase::new(24.5, 1)])
        .expect("Failed to create plan");

    let summary = session.run(&plan);

    let path = summary.report_path.expect("Report should be written");
    assert!(path.starts_with(&out));
    let content = std::fs::read_to_string(&path).expect("Failed to read report");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Load,Vo_12V_1,Vo_24.5V_1",
            "0,0,0",
            "0.2,0.4,0.4",
            "0.4,0.8,0.8"
        ]
    );
}

#[test]
fn test_ramp_levels_are_commanded_in_order() {
    let connector = SimulatedConnector::new();
    let load = connector.load_handle();
    let writer = RecordingReportWriter::new();
    let (mut session, _settle) =
        create_session(connector, three_step_ramp(), Box::new(writer));
    let plan = SweepPlan::new(vec![SweepCase::new(12.0, 1)]).expect("Failed to create plan");

    session.run(&plan);

    let levels: Vec<String> = load
        .commands()
        .into_iter()
        .filter(|c| c.starts_with(":SOUR:CURR:LEV:IMM"))
        .collect();
    assert_eq!(
        levels,
        vec![level_command(0.0), level_command(0.2), level_command(0.4)]
    );
}
