//! Run orchestration.
//!
//! A [`BenchSession`] owns the connection manager, the report writer and the
//! settling clock for exactly one run:
//!
//! 1. connect the three links independently,
//! 2. run the sweep only if all three are up,
//! 3. write the report if any data was collected,
//! 4. tear down whatever connected.
//!
//! Teardown runs on every exit path. If [`BenchSession::run`] or
//! [`BenchSession::check`] did not get to it (a panic mid-case), dropping the
//! session does it.

use crate::connection::{ConnectionManager, LinkRole, LinkStatus};
use crate::data::{ReportWriter, ResultAccumulator, ResultMatrix};
use crate::error::{BenchError, PartialReadinessError};
use crate::instrument::InstrumentIdentity;
use crate::sweep::{Ramp, SweepCase, SweepController, SweepPlan};
use crate::teardown::{TeardownCoordinator, TeardownReport};
use crate::timing::Settle;
use log::{error, info, warn};
use std::path::PathBuf;

/// Outcome of one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Status of every link after bring-up, in connection order.
    pub links: Vec<(LinkRole, LinkStatus)>,
    /// Identities of the instruments that connected.
    pub identities: Vec<(LinkRole, InstrumentIdentity)>,
    /// Set when the sweep phase was skipped.
    pub skipped: Option<PartialReadinessError>,
    /// Cases whose columns reached the matrix, in plan order.
    pub completed_cases: Vec<SweepCase>,
    /// Cases whose data was discarded, with the reason.
    pub failed_cases: Vec<(SweepCase, BenchError)>,
    /// Set when an instrument failure stopped the remaining sweep.
    pub aborted: Option<BenchError>,
    /// Everything collected before the sweep ended.
    pub matrix: ResultMatrix,
    /// Report file, if one was written.
    pub report_path: Option<PathBuf>,
    /// Why the report could not be written.
    pub report_error: Option<BenchError>,
    /// Per link teardown outcome.
    pub teardown: Option<TeardownReport>,
}

impl RunSummary {
    /// True when the whole plan ran and every step after it succeeded.
    pub fn is_success(&self) -> bool {
        self.skipped.is_none()
            && self.failed_cases.is_empty()
            && self.aborted.is_none()
            && self.report_error.is_none()
            && self.teardown.as_ref().map_or(true, TeardownReport::is_clean)
    }

    /// Write the summary to the log.
    pub fn log(&self) {
        for (role, status) in &self.links {
            match status {
                LinkStatus::Connected => info!("{}: connected", role),
                LinkStatus::NotAttempted => info!("{}: not attempted", role),
                LinkStatus::Unavailable(err) => error!("{}: {}", role, err.description),
            }
        }
        for (role, identity) in &self.identities {
            info!(
                "{} ({}): {}",
                role,
                identity.resource,
                identity.idn.as_deref().unwrap_or("unidentified")
            );
        }
        if let Some(skipped) = &self.skipped {
            error!("{}", skipped);
        }
        info!("Completed cases: {}", self.completed_cases.len());
        for (case, err) in &self.failed_cases {
            error!("Case {} V failed: {}", case.target_voltage, err);
        }
        if let Some(err) = &self.aborted {
            error!("Sweep aborted: {}", err);
        }
        match (&self.report_path, &self.report_error) {
            (Some(path), _) => info!("Report: {}", path.display()),
            (None, Some(err)) => error!("{}", err),
            (None, None) => info!("No data collected, no report written"),
        }
        if let Some(teardown) = &self.teardown {
            for (role, err) in teardown.failures() {
                warn!("Teardown of {} failed: {}", role, err);
            }
        }
    }
}

/// One bench run: connect, sweep, persist, tear down.
///
/// Teardown runs at most once; dropping a session that never tore down runs it.
pub struct BenchSession {
    links: ConnectionManager,
    ramp: Ramp,
    settle: Box<dyn Settle>,
    writer: Box<dyn ReportWriter>,
    connected: bool,
    torn_down: bool,
}

impl BenchSession {
    /// Session over unconnected links.
    pub fn new(
        links: ConnectionManager,
        ramp: Ramp,
        settle: Box<dyn Settle>,
        writer: Box<dyn ReportWriter>,
    ) -> Self {
        Self {
            links,
            ramp,
            settle,
            writer,
            connected: false,
            torn_down: false,
        }
    }

    /// Connect, sweep `plan`, persist and tear down.
    pub fn run(&mut self, plan: &SweepPlan) -> RunSummary {
        let mut summary = RunSummary::default();
        self.connect(&mut summary);

        match self.links.readiness() {
            Ok(()) => {
                let accumulator = self.sweep(plan, &mut summary);
                summary.matrix = accumulator.into_matrix();
            }
            Err(err) => {
                error!("{}", err);
                summary.skipped = Some(err);
            }
        }

        if summary.matrix.is_empty() {
            info!("Result matrix is empty, skipping report");
        } else {
            match self.writer.write_report(&summary.matrix) {
                Ok(path) => summary.report_path = Some(path),
                Err(err) => {
                    let err = BenchError::Report(format!("{:#}", err));
                    error!("{}", err);
                    summary.report_error = Some(err);
                }
            }
        }

        summary.teardown = self.teardown();
        summary
    }

    /// Connect every link, report readiness and identities, then tear down.
    pub fn check(&mut self) -> RunSummary {
        let mut summary = RunSummary::default();
        self.connect(&mut summary);
        match self.links.readiness() {
            Ok(()) => info!("All links ready"),
            Err(err) => {
                error!("{}", err);
                summary.skipped = Some(err);
            }
        }
        summary.teardown = self.teardown();
        summary
    }

    /// Run teardown unless it already ran.
    pub fn teardown(&mut self) -> Option<TeardownReport> {
        if self.torn_down {
            return None;
        }
        self.torn_down = true;
        info!("Tearing down");
        Some(TeardownCoordinator::new(&mut *self.settle).run(&mut self.links))
    }

    fn connect(&mut self, summary: &mut RunSummary) {
        if !self.connected {
            self.links.connect_all();
            self.connected = true;
        }
        summary.links = LinkRole::ALL
            .into_iter()
            .map(|role| (role, self.links.status(role).clone()))
            .collect();
        summary.identities = self
            .links
            .identities()
            .into_iter()
            .map(|(role, identity)| (role, identity.clone()))
            .collect();
    }

    fn sweep(&mut self, plan: &SweepPlan, summary: &mut RunSummary) -> ResultAccumulator {
        let mut accumulator = ResultAccumulator::new();
        let Some((supply, load, telemetry)) = self.links.sweep_links() else {
            return accumulator;
        };
        let mut controller = SweepController::new(&self.ramp, &mut *self.settle);

        for case in plan.cases() {
            let outcome = controller
                .run_case(supply, load, telemetry, case)
                .and_then(|trials| {
                    accumulator
                        .record_case(case, &trials)
                        .map_err(BenchError::from)
                });
            match outcome {
                Ok(()) => summary.completed_cases.push(*case),
                Err(err) if err.is_case_local() => {
                    error!("Case {} V failed, data discarded: {}", case.target_voltage, err);
                    summary.failed_cases.push((*case, err));
                }
                Err(err) => {
                    error!("Sweep aborted at {} V: {}", case.target_voltage, err);
                    summary.aborted = Some(err);
                    break;
                }
            }
        }
        accumulator
    }
}

impl Drop for BenchSession {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!("Session ended without teardown, tearing down now");
            let _ = self.teardown();
        }
    }
}
