//! In-process bench for `--simulate` and for tests.
//!
//! The load and supply are scripted [`MockTransport`]s that answer like the
//! real instruments after initialization. The sensor reports a current
//! derived from the last level commanded on the simulated load, so a
//! complete run produces a meaningful report without hardware.

use crate::adapters::{LineSource, MockLineSource, MockTransport, ScpiTransport};
use crate::connection::{Connector, LinkRole};
use crate::instrument::load::last_level;
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

type SensorResponse = Box<dyn Fn(f64) -> f64>;

struct SensorModel {
    response: SensorResponse,
    glitch_every: Option<u32>,
    reads: u32,
}

/// In-process bench: mock load and supply, and a sensor that follows the
/// last commanded load level.
pub struct SimulatedConnector {
    load: MockTransport,
    supply: MockTransport,
    sensor: MockLineSource,
    model: Rc<RefCell<SensorModel>>,
    unavailable: HashSet<LinkRole>,
}

impl SimulatedConnector {
    /// Bench where the sensor reads back exactly the commanded load current.
    pub fn new() -> Self {
        let load = MockTransport::new()
            .with_response("*IDN?", "RIGOL TECHNOLOGIES,DL3021,SIMULATED,00.01.05")
            .with_response(":SOURCE:LIST:MODE?", "CC")
            .with_response(":SOUR:INP:STAT?", "1");
        let supply = MockTransport::new()
            .with_response("*IDN?", "RIGOL TECHNOLOGIES,DP832,SIMULATED,00.01.14")
            .with_response(":OUTPut:STATe? CH1", "ON");
        let model = Rc::new(RefCell::new(SensorModel {
            response: Box::new(|level| level),
            glitch_every: None,
            reads: 0,
        }));

        let commanded = load.clone();
        let sensor_model = Rc::clone(&model);
        let sensor = MockLineSource::from_fn(move || {
            let mut model = sensor_model.borrow_mut();
            model.reads += 1;
            if let Some(every) = model.glitch_every {
                if model.reads % every == 0 {
                    return Ok(b"{\"cur\r\n".to_vec());
                }
            }
            let level = last_level(&commanded.commands()).unwrap_or(0.0);
            let current = (model.response)(level);
            Ok(format!("{{\"current\": {}}}\r\n", current).into_bytes())
        });

        Self {
            load,
            supply,
            sensor,
            model,
            unavailable: HashSet::new(),
        }
    }

    /// Sensor current as a function of the commanded load level.
    pub fn with_sensor(self, response: impl Fn(f64) -> f64 + 'static) -> Self {
        self.model.borrow_mut().response = Box::new(response);
        self
    }

    /// Make `role` fail to connect.
    pub fn with_unavailable(mut self, role: LinkRole) -> Self {
        self.unavailable.insert(role);
        self
    }

    /// Emit a truncated line on every `every`-th sensor read.
    pub fn with_glitches(self, every: u32) -> Self {
        self.model.borrow_mut().glitch_every = (every > 0).then_some(every);
        self
    }

    /// Shared handle on the simulated load.
    pub fn load_handle(&self) -> MockTransport {
        self.load.clone()
    }

    /// Shared handle on the simulated supply.
    pub fn supply_handle(&self) -> MockTransport {
        self.supply.clone()
    }

    /// Shared handle on the simulated sensor.
    pub fn sensor_handle(&self) -> MockLineSource {
        self.sensor.clone()
    }

    fn check_available(&self, role: LinkRole) -> Result<()> {
        if self.unavailable.contains(&role) {
            Err(anyhow!("simulated {} is switched off", role))
        } else {
            Ok(())
        }
    }
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for SimulatedConnector {
    fn resource(&self, role: LinkRole) -> String {
        match role {
            LinkRole::Telemetry => "SIM::SENSOR".to_string(),
            LinkRole::Load => "SIM::ELOAD".to_string(),
            LinkRole::Supply => "SIM::RPS".to_string(),
        }
    }

    fn open_line_source(&mut self) -> Result<Box<dyn LineSource>> {
        self.check_available(LinkRole::Telemetry)?;
        Ok(Box::new(self.sensor.clone()))
    }

    fn open_transport(&mut self, role: LinkRole) -> Result<Box<dyn ScpiTransport>> {
        self.check_available(role)?;
        match role {
            LinkRole::Load => Ok(Box::new(self.load.clone())),
            LinkRole::Supply => Ok(Box::new(self.supply.clone())),
            LinkRole::Telemetry => Err(anyhow!("the telemetry sensor is not a SCPI instrument")),
        }
    }
}
