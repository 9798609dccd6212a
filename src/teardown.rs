//! Bringing the bench back to a safe state.
//!
//! Each link has its own gate: an instrument that never connected is skipped,
//! and a failure on one link never prevents the others from being torn down.

use crate::connection::{ConnectionManager, LinkRole};
use crate::error::{AppResult, BenchError, InstrumentError};
use crate::instrument::{ElectronicLoad, PowerSupply};
use crate::timing::{Settle, TEARDOWN_SETTLE};
use log::{info, warn};

/// What teardown did for one link.
#[derive(Debug, Clone, PartialEq)]
pub enum TeardownAction {
    /// The link never connected.
    Skipped,
    /// Telemetry port closed.
    Closed,
    /// Output or input was on and has been switched off.
    SwitchedOff,
    /// Output or input was already off.
    AlreadyOff,
    /// The state query, the switch-off command or the port close failed.
    Failed(InstrumentError),
}

/// Outcome of each teardown gate.
#[derive(Debug, Clone, PartialEq)]
pub struct TeardownReport {
    /// Port close.
    pub telemetry: TeardownAction,
    /// Load input switch-off.
    pub load: TeardownAction,
    /// Supply output switch-off.
    pub supply: TeardownAction,
}

impl TeardownReport {
    /// True when no gate failed.
    pub fn is_clean(&self) -> bool {
        self.failures().is_empty()
    }

    /// Failed gates in teardown order.
    pub fn failures(&self) -> Vec<(LinkRole, &InstrumentError)> {
        [
            (LinkRole::Telemetry, &self.telemetry),
            (LinkRole::Load, &self.load),
            (LinkRole::Supply, &self.supply),
        ]
        .into_iter()
        .filter_map(|(role, action)| match action {
            TeardownAction::Failed(err) => Some((role, err)),
            _ => None,
        })
        .collect()
    }

    /// Collapse into a single error if any gate failed.
    pub fn into_result(self) -> AppResult<()> {
        let errors: Vec<BenchError> = self
            .failures()
            .into_iter()
            .map(|(_, err)| BenchError::Instrument(err.clone()))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BenchError::TeardownFailed(errors))
        }
    }
}

/// Switches off and releases every connected link.
pub struct TeardownCoordinator<'a> {
    settle: &'a mut dyn Settle,
}

impl<'a> TeardownCoordinator<'a> {
    /// Coordinator using `settle` for the post switch-off delays.
    pub fn new(settle: &'a mut dyn Settle) -> Self {
        Self { settle }
    }

    /// Tear down every connected link and release the instrument sessions.
    pub fn run(&mut self, links: &mut ConnectionManager) -> TeardownReport {
        let telemetry = match links.telemetry_mut() {
            Some(telemetry) => {
                let result = telemetry
                    .close()
                    .map(|()| TeardownAction::Closed)
                    .map_err(|err| InstrumentError {
                        role: LinkRole::Telemetry,
                        command: format!("close {}", telemetry.port()),
                        reason: err.to_string(),
                    });
                settle_action(LinkRole::Telemetry, result)
            }
            None => TeardownAction::Skipped,
        };

        let load = match links.load_mut() {
            Some(load) => {
                let action = self.switch_off_load(load);
                release(load.link_mut());
                action
            }
            None => TeardownAction::Skipped,
        };

        let supply = match links.supply_mut() {
            Some(supply) => {
                let action = self.switch_off_supply(supply);
                release(supply.link_mut());
                action
            }
            None => TeardownAction::Skipped,
        };

        TeardownReport {
            telemetry,
            load,
            supply,
        }
    }

    /// Disable the load input if it is on.
    pub fn switch_off_load(&mut self, load: &mut ElectronicLoad) -> TeardownAction {
        let result = load.input_enabled().and_then(|enabled| {
            if !enabled {
                return Ok(TeardownAction::AlreadyOff);
            }
            load.disable_input()?;
            self.settle.settle(TEARDOWN_SETTLE);
            Ok(TeardownAction::SwitchedOff)
        });
        settle_action(LinkRole::Load, result)
    }

    /// Disable supply channel 1 if it is on.
    pub fn switch_off_supply(&mut self, supply: &mut PowerSupply) -> TeardownAction {
        let result = supply.output_enabled().and_then(|enabled| {
            if !enabled {
                return Ok(TeardownAction::AlreadyOff);
            }
            supply.disable_output()?;
            self.settle.settle(TEARDOWN_SETTLE);
            Ok(TeardownAction::SwitchedOff)
        });
        settle_action(LinkRole::Supply, result)
    }
}

fn settle_action(role: LinkRole, result: Result<TeardownAction, InstrumentError>) -> TeardownAction {
    match result {
        Ok(action) => {
            info!("Teardown {}: {:?}", role, action);
            action
        }
        Err(err) => {
            warn!("Teardown of {} failed: {}", role, err);
            TeardownAction::Failed(err)
        }
    }
}

fn release(link: &mut crate::instrument::InstrumentLink) {
    if let Err(err) = link.release() {
        warn!("Releasing {} failed: {}", link.role(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulatedConnector;
    use crate::timing::RecordingSettle;

    #[test]
    fn test_switches_off_enabled_outputs() {
        let connector = SimulatedConnector::new();
        let load = connector.load_handle();
        let supply = connector.supply_handle();
        let sensor = connector.sensor_handle();
        let mut manager = ConnectionManager::new(Box::new(connector));
        manager.connect_all();

        let settle = RecordingSettle::new();
        let mut handle = settle.clone();
        let report = TeardownCoordinator::new(&mut handle).run(&mut manager);

        assert_eq!(report.telemetry, TeardownAction::Closed);
        assert_eq!(report.load, TeardownAction::SwitchedOff);
        assert_eq!(report.supply, TeardownAction::SwitchedOff);
        assert!(report.is_clean());
        assert_eq!(load.count(":SOURCE:INPUT:STATE Off"), 1);
        assert_eq!(supply.count(":OUTP:STAT CH1,OFF"), 1);
        assert_eq!(settle.delays(), vec![TEARDOWN_SETTLE, TEARDOWN_SETTLE]);
        assert!(sensor.is_closed() && load.is_closed() && supply.is_closed());
    }

    #[test]
    fn test_already_off_needs_no_command() {
        let connector = SimulatedConnector::new();
        connector.load_handle().set_response(":SOUR:INP:STAT?", "0");
        connector.supply_handle().set_response(":OUTPut:STATe? CH1", "OFF");
        let load = connector.load_handle();
        let mut manager = ConnectionManager::new(Box::new(connector));
        manager.connect_all();

        let mut settle = RecordingSettle::new();
        let report = TeardownCoordinator::new(&mut settle).run(&mut manager);
        assert_eq!(report.load, TeardownAction::AlreadyOff);
        assert_eq!(report.supply, TeardownAction::AlreadyOff);
        assert_eq!(load.count(":SOURCE:INPUT:STATE Off"), 0);
        assert!(settle.delays().is_empty());
    }

    #[test]
    fn test_failure_on_one_gate_does_not_block_others() {
        let connector = SimulatedConnector::new();
        let load = connector.load_handle();
        let supply = connector.supply_handle();
        let mut manager = ConnectionManager::new(Box::new(connector));
        manager.connect_all();
        load.set_offline(true);

        let mut settle = RecordingSettle::new();
        let report = TeardownCoordinator::new(&mut settle).run(&mut manager);
        assert!(matches!(report.load, TeardownAction::Failed(_)));
        assert_eq!(report.supply, TeardownAction::SwitchedOff);
        assert_eq!(supply.count(":OUTP:STAT CH1,OFF"), 1);
        assert!(matches!(
            report.into_result(),
            Err(BenchError::TeardownFailed(errors)) if errors.len() == 1
        ));
    }

    #[test]
    fn test_missing_links_are_skipped() {
        let connector = SimulatedConnector::new()
            .with_unavailable(LinkRole::Load)
            .with_unavailable(LinkRole::Supply);
        let mut manager = ConnectionManager::new(Box::new(connector));
        manager.connect_all();

        let mut settle = RecordingSettle::new();
        let report = TeardownCoordinator::new(&mut settle).run(&mut manager);
        assert_eq!(report.telemetry, TeardownAction::Closed);
        assert_eq!(report.load, TeardownAction::Skipped);
        assert_eq!(report.supply, TeardownAction::Skipped);
    }

    #[test]
    fn test_failed_port_close_is_a_failed_gate() {
        let connector = SimulatedConnector::new();
        let sensor = connector.sensor_handle();
        let supply = connector.supply_handle();
        sensor.fail_close("device disconnected");
        let mut manager = ConnectionManager::new(Box::new(connector));
        manager.connect_all();

        let mut settle = RecordingSettle::new();
        let report = TeardownCoordinator::new(&mut settle).run(&mut manager);
        match &report.telemetry {
            TeardownAction::Failed(err) => {
                assert_eq!(err.role, LinkRole::Telemetry);
                assert!(err.reason.contains("device disconnected"));
            }
            other => panic!("Expected a failed telemetry gate, got {:?}", other),
        }
        assert_eq!(report.load, TeardownAction::SwitchedOff);
        assert_eq!(supply.count(":OUTP:STAT CH1,OFF"), 1);
        assert_eq!(report.failures().len(), 1);
    }
}
