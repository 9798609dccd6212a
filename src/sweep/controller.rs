//! Case initialization and ramp traversal.
//!
//! Every instrument interaction is followed by its settling delay from
//! [`crate::timing`]. The controller borrows the links for the duration of a
//! case; it never owns them.

use super::plan::SweepCase;
use super::ramp::{Ramp, RampStep};
use super::retry::{retry_bounded, Recoverable, RetryPolicy};
use crate::error::{AppResult, ProtocolError};
use crate::instrument::{ElectronicLoad, PowerSupply};
use crate::telemetry::{TelemetryFrame, TelemetryLink};
use crate::timing::{
    Settle, CASE_LEAD_IN, COMMAND_SETTLE, MODE_QUERY_SETTLE, RESET_SETTLE, STEP_SETTLE,
};
use log::info;

/// Supply current limit programmed for every case, in amps.
pub const SUPPLY_CURRENT_LIMIT_AMPS: f64 = 5.0;
/// Load current range programmed for every case, in amps.
pub const LOAD_CURRENT_RANGE_AMPS: f64 = 40.0;

/// One complete ramp traversal: a frame per step, in step order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTrial {
    /// One reading per ramp step, in step order.
    pub readings: Vec<(RampStep, TelemetryFrame)>,
}

impl SampleTrial {
    /// Number of readings.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// True when no step was read.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Commanded load currents, in step order.
    pub fn load_currents(&self) -> Vec<f64> {
        self.readings.iter().map(|(step, _)| step.load_current).collect()
    }

    /// Sensor currents, in step order.
    pub fn sensor_currents(&self) -> Vec<f64> {
        self.readings.iter().map(|(_, frame)| frame.current).collect()
    }
}

/// Reads one frame at a fixed load level; recovery re-commands that level.
struct FrameRead<'a> {
    load: &'a mut ElectronicLoad,
    telemetry: &'a mut TelemetryLink,
    step: RampStep,
}

impl Recoverable for FrameRead<'_> {
    type Output = TelemetryFrame;

    fn attempt(&mut self) -> Result<TelemetryFrame, ProtocolError> {
        self.telemetry.read_frame()
    }

    fn recover(&mut self) -> AppResult<()> {
        self.load.set_current_level(self.step.load_current)?;
        Ok(())
    }

    fn label(&self) -> String {
        format!("telemetry read at {} A", self.step.load_current)
    }
}

/// Initializes each case and drives its load ramp.
pub struct SweepController<'a> {
    ramp: &'a Ramp,
    settle: &'a mut dyn Settle,
    retry_policy: RetryPolicy,
}

impl<'a> SweepController<'a> {
    /// Controller with the default retry policy.
    pub fn new(ramp: &'a Ramp, settle: &'a mut dyn Settle) -> Self {
        Self {
            ramp,
            settle,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replace the telemetry retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Reset both instruments and program the operating point for one case.
    pub fn initialize_case(
        &mut self,
        supply: &mut PowerSupply,
        load: &mut ElectronicLoad,
        target_voltage: f64,
    ) -> AppResult<()> {
        supply.reset()?;
        self.settle.settle(RESET_SETTLE);
        load.reset()?;
        self.settle.settle(RESET_SETTLE);

        supply.set_voltage(target_voltage)?;
        self.settle.settle(COMMAND_SETTLE);
        supply.set_current_limit(SUPPLY_CURRENT_LIMIT_AMPS)?;
        self.settle.settle(COMMAND_SETTLE);
        supply.enable_output()?;
        self.settle.settle(COMMAND_SETTLE);

        load.set_list_mode_cc()?;
        self.settle.settle(COMMAND_SETTLE);
        let mode = load.list_mode()?;
        info!("Mode: {}", mode);
        self.settle.settle(MODE_QUERY_SETTLE);
        load.set_turn_on_voltage(target_voltage)?;
        self.settle.settle(COMMAND_SETTLE);
        load.set_current_range(LOAD_CURRENT_RANGE_AMPS)?;
        self.settle.settle(COMMAND_SETTLE);
        load.enable_input()?;
        self.settle.settle(COMMAND_SETTLE);
        Ok(())
    }

    /// Traverse the ramp once, reading one frame per step.
    ///
    /// A read that still fails after the bounded retry ends the traversal
    /// with a [`ProtocolError`]; the partial trial is dropped.
    pub fn run_ramp(
        &mut self,
        load: &mut ElectronicLoad,
        telemetry: &mut TelemetryLink,
    ) -> AppResult<SampleTrial> {
        let mut trial = SampleTrial {
            readings: Vec::with_capacity(self.ramp.len()),
        };
        for &step in self.ramp.steps() {
            load.set_current_level(step.load_current)?;
            info!("Current Load: {}", step.load_current);
            self.settle.settle(STEP_SETTLE);

            let mut read = FrameRead {
                load: &mut *load,
                telemetry: &mut *telemetry,
                step,
            };
            let frame = retry_bounded(&mut read, &self.retry_policy, &mut *self.settle)?;
            info!("recv: {}", frame.current);
            trial.readings.push((step, frame));
        }
        Ok(trial)
    }

    /// Initialize the instruments for `case`, then run its samples in order.
    pub fn run_case(
        &mut self,
        supply: &mut PowerSupply,
        load: &mut ElectronicLoad,
        telemetry: &mut TelemetryLink,
        case: &SweepCase,
    ) -> AppResult<Vec<SampleTrial>> {
        info!("********** Voltage {} **********", case.target_voltage);
        self.settle.settle(CASE_LEAD_IN);
        self.initialize_case(supply, load, case.target_voltage)?;

        let mut trials = Vec::with_capacity(case.sample_count as usize);
        for sample in 0..case.sample_count {
            info!("********** Sample {} **********", sample + 1);
            trials.push(self.run_ramp(load, telemetry)?);
        }
        Ok(trials)
    }
}
