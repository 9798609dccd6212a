//! Link bring-up and readiness.
//!
//! The three links (telemetry sensor, electronic load, power supply) are
//! attempted independently: one failing never prevents trying the others.
//! The manager owns every link for the run and hands out borrows; the sweep
//! only runs when [`ConnectionManager::all_connected`] holds.

use crate::adapters::{LineSource, ScpiTransport};
use crate::config::Settings;
use crate::error::{ConnectionError, PartialReadinessError};
use crate::instrument::{ElectronicLoad, InstrumentIdentity, InstrumentLink, PowerSupply};
use crate::telemetry::TelemetryLink;
use anyhow::{anyhow, Result};
use log::{error, info};
use std::fmt;
#[cfg(feature = "instrument_serial")]
use std::time::Duration;

/// The three links a run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRole {
    /// Serial current sensor.
    Telemetry,
    /// Electronic load.
    Load,
    /// Programmable power supply.
    Supply,
}

impl LinkRole {
    /// Connection order.
    pub const ALL: [LinkRole; 3] = [LinkRole::Telemetry, LinkRole::Supply, LinkRole::Load];
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRole::Telemetry => f.write_str("telemetry sensor"),
            LinkRole::Load => f.write_str("electronic load"),
            LinkRole::Supply => f.write_str("power supply"),
        }
    }
}

/// Classification of one link after bring-up.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkStatus {
    /// `connect_all` has not run yet.
    NotAttempted,
    /// Link is up.
    Connected,
    /// Connecting failed.
    Unavailable(ConnectionError),
}

/// Opens the raw channels behind each link.
pub trait Connector {
    /// Resource string or port name used for `role`.
    fn resource(&self, role: LinkRole) -> String;

    /// Open the sensor channel.
    fn open_line_source(&mut self) -> Result<Box<dyn LineSource>>;

    /// Open the channel to the load or the supply.
    fn open_transport(&mut self, role: LinkRole) -> Result<Box<dyn ScpiTransport>>;
}

/// Connector for the real bench, driven by [`Settings`].
pub struct HardwareConnector {
    settings: Settings,
}

impl HardwareConnector {
    /// Connector for the resources named in `settings`.
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

impl Connector for HardwareConnector {
    fn resource(&self, role: LinkRole) -> String {
        match role {
            LinkRole::Telemetry => self.settings.telemetry.port.clone(),
            LinkRole::Load => self.settings.load.resource.clone(),
            LinkRole::Supply => self.settings.supply.resource.clone(),
        }
    }

    #[cfg(feature = "instrument_serial")]
    fn open_line_source(&mut self) -> Result<Box<dyn LineSource>> {
        let config = &self.settings.telemetry;
        let mut adapter = crate::adapters::SerialAdapter::new(config.port.clone(), config.baud_rate)
            .with_timeout(Duration::from_millis(config.timeout_ms));
        adapter.open()?;
        Ok(Box::new(adapter))
    }

    #[cfg(not(feature = "instrument_serial"))]
    fn open_line_source(&mut self) -> Result<Box<dyn LineSource>> {
        Err(anyhow!(
            "Serial support not enabled. Rebuild with --features instrument_serial"
        ))
    }

    fn open_transport(&mut self, role: LinkRole) -> Result<Box<dyn ScpiTransport>> {
        let config = match role {
            LinkRole::Load => &self.settings.load,
            LinkRole::Supply => &self.settings.supply,
            LinkRole::Telemetry => return Err(anyhow!("the telemetry sensor is not a SCPI instrument")),
        };
        let timeout = std::time::Duration::from_millis(config.timeout_ms);

        if let Some(address) = crate::adapters::socket_adapter::parse_socket_resource(&config.resource)
        {
            return Ok(Box::new(crate::adapters::SocketAdapter::connect(&address, timeout)?));
        }
        open_visa(&config.resource, timeout)
    }
}

#[cfg(feature = "instrument_visa")]
fn open_visa(resource: &str, timeout: std::time::Duration) -> Result<Box<dyn ScpiTransport>> {
    Ok(Box::new(crate::adapters::VisaAdapter::open(resource, timeout)?))
}

#[cfg(not(feature = "instrument_visa"))]
fn open_visa(resource: &str, _timeout: std::time::Duration) -> Result<Box<dyn ScpiTransport>> {
    Err(anyhow!(
        "'{}' is not a socket resource and VISA support is not enabled. Rebuild with --features instrument_visa",
        resource
    ))
}

/// Owns the three links for the duration of one run.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    telemetry: Option<TelemetryLink>,
    load: Option<ElectronicLoad>,
    supply: Option<PowerSupply>,
    telemetry_status: LinkStatus,
    load_status: LinkStatus,
    supply_status: LinkStatus,
}

impl ConnectionManager {
    /// Manager with every link not yet attempted.
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            telemetry: None,
            load: None,
            supply: None,
            telemetry_status: LinkStatus::NotAttempted,
            load_status: LinkStatus::NotAttempted,
            supply_status: LinkStatus::NotAttempted,
        }
    }

    /// Attempt every link, in order, regardless of earlier failures.
    pub fn connect_all(&mut self) {
        for role in LinkRole::ALL {
            // Failures are logged and recorded in the link status
            let _ = match role {
                LinkRole::Telemetry => self.connect_telemetry().map(|_| ()),
                LinkRole::Load => self.connect_load().map(|_| ()),
                LinkRole::Supply => self.connect_supply().map(|_| ()),
            };
        }
    }

    /// Open the sensor channel.
    pub fn connect_telemetry(&mut self) -> Result<&mut TelemetryLink, ConnectionError> {
        let role = LinkRole::Telemetry;
        let port = self.connector.resource(role);
        match self.connector.open_line_source() {
            Ok(source) => {
                info!("Connected to {} on {}", role, port);
                self.telemetry_status = LinkStatus::Connected;
                Ok(self.telemetry.insert(TelemetryLink::new(&port, source)))
            }
            Err(cause) => Err(self.record_failure(ConnectionError::from_cause(role, &port, &cause))),
        }
    }

    /// Open the load channel and identify the instrument.
    pub fn connect_load(&mut self) -> Result<&mut ElectronicLoad, ConnectionError> {
        let link = self.open_instrument(LinkRole::Load)?;
        self.load_status = LinkStatus::Connected;
        Ok(self.load.insert(ElectronicLoad::new(link)))
    }

    /// Open the supply channel and identify the instrument.
    pub fn connect_supply(&mut self) -> Result<&mut PowerSupply, ConnectionError> {
        let link = self.open_instrument(LinkRole::Supply)?;
        self.supply_status = LinkStatus::Connected;
        Ok(self.supply.insert(PowerSupply::new(link)))
    }

    fn open_instrument(&mut self, role: LinkRole) -> Result<InstrumentLink, ConnectionError> {
        let resource = self.connector.resource(role);
        let transport = match self.connector.open_transport(role) {
            Ok(transport) => transport,
            Err(cause) => {
                return Err(self.record_failure(ConnectionError::from_cause(role, &resource, &cause)))
            }
        };

        let mut link = InstrumentLink::new(role, &resource, transport);
        match link.identify() {
            Ok(idn) => {
                info!("Connected to {} ({}): {}", role, resource, idn);
                Ok(link)
            }
            Err(e) => {
                let _ = link.release();
                Err(self.record_failure(ConnectionError {
                    role,
                    resource,
                    code: None,
                    description: e.to_string(),
                }))
            }
        }
    }

    fn record_failure(&mut self, err: ConnectionError) -> ConnectionError {
        error!("Cannot connect to {}: {}", err.role, err);
        if let Some(code) = err.code {
            error!("Error-Code: {}", code);
        }
        let status = LinkStatus::Unavailable(err.clone());
        match err.role {
            LinkRole::Telemetry => self.telemetry_status = status,
            LinkRole::Load => self.load_status = status,
            LinkRole::Supply => self.supply_status = status,
        }
        err
    }

    /// Connection outcome of `role`.
    pub fn status(&self, role: LinkRole) -> &LinkStatus {
        match role {
            LinkRole::Telemetry => &self.telemetry_status,
            LinkRole::Load => &self.load_status,
            LinkRole::Supply => &self.supply_status,
        }
    }

    /// True only when all three links are up.
    pub fn all_connected(&self) -> bool {
        self.telemetry.is_some() && self.load.is_some() && self.supply.is_some()
    }

    /// Readiness verdict for the sweep phase.
    pub fn readiness(&self) -> Result<(), PartialReadinessError> {
        let unavailable: Vec<LinkRole> = LinkRole::ALL
            .into_iter()
            .filter(|role| match role {
                LinkRole::Telemetry => self.telemetry.is_none(),
                LinkRole::Load => self.load.is_none(),
                LinkRole::Supply => self.supply.is_none(),
            })
            .collect();
        if unavailable.is_empty() {
            Ok(())
        } else {
            Err(PartialReadinessError { unavailable })
        }
    }

    /// All three links at once, for the sweep phase.
    pub fn sweep_links(
        &mut self,
    ) -> Option<(&mut PowerSupply, &mut ElectronicLoad, &mut TelemetryLink)> {
        match (&mut self.supply, &mut self.load, &mut self.telemetry) {
            (Some(supply), Some(load), Some(telemetry)) => Some((supply, load, telemetry)),
            _ => None,
        }
    }

    /// Telemetry link, if connected.
    pub fn telemetry_mut(&mut self) -> Option<&mut TelemetryLink> {
        self.telemetry.as_mut()
    }

    /// Electronic load, if connected.
    pub fn load_mut(&mut self) -> Option<&mut ElectronicLoad> {
        self.load.as_mut()
    }

    /// Power supply, if connected.
    pub fn supply_mut(&mut self) -> Option<&mut PowerSupply> {
        self.supply.as_mut()
    }

    /// Identities of the connected instruments.
    pub fn identities(&self) -> Vec<(LinkRole, &InstrumentIdentity)> {
        let mut identities = Vec::new();
        if let Some(supply) = &self.supply {
            identities.push((LinkRole::Supply, supply.link().identity()));
        }
        if let Some(load) = &self.load {
            identities.push((LinkRole::Load, load.link().identity()));
        }
        identities
    }
}
