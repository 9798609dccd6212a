//! SCPI instruments on the bench.
//!
//! [`InstrumentLink`] is the opaque request/response channel plus the
//! identity bookkeeping owned by the connection manager. The two device roles
//! used by a run wrap it with their command vocabulary:
//! [`ElectronicLoad`] and [`PowerSupply`].

pub mod load;
pub mod supply;

pub use load::ElectronicLoad;
pub use supply::PowerSupply;

use crate::adapters::ScpiTransport;
use crate::connection::LinkRole;
use crate::error::InstrumentError;
use log::debug;

/// What is known about one connected instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentIdentity {
    /// Resource string the link was opened with.
    pub resource: String,
    /// `*IDN?` answer, once identified.
    pub idn: Option<String>,
    /// False once the link has been released or a transport error occurred.
    pub connected: bool,
    /// Most recent failure on this link.
    pub last_error: Option<String>,
}

/// Request/response channel to a single instrument.
pub struct InstrumentLink {
    role: LinkRole,
    identity: InstrumentIdentity,
    transport: Box<dyn ScpiTransport>,
}

impl InstrumentLink {
    /// Link over an open transport; call `identify` before use.
    pub fn new(role: LinkRole, resource: &str, transport: Box<dyn ScpiTransport>) -> Self {
        Self {
            role,
            identity: InstrumentIdentity {
                resource: resource.to_string(),
                idn: None,
                connected: true,
                last_error: None,
            },
            transport,
        }
    }

    /// Which instrument this link talks to.
    pub fn role(&self) -> LinkRole {
        self.role
    }

    /// Resource, identification and last error.
    pub fn identity(&self) -> &InstrumentIdentity {
        &self.identity
    }

    /// Query `*IDN?` and remember the answer.
    pub fn identify(&mut self) -> Result<String, InstrumentError> {
        let idn = self.query("*IDN?")?;
        if idn.is_empty() {
            return Err(self.fail("*IDN?", "empty identity response".to_string()));
        }
        self.identity.idn = Some(idn.clone());
        Ok(idn)
    }

    /// Send a command.
    pub fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        debug!("[{}] {}", self.role, command);
        match self.transport.write_line(command) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(command, format!("{:#}", e))),
        }
    }

    /// Send a query and return the trimmed response.
    pub fn query(&mut self, command: &str) -> Result<String, InstrumentError> {
        match self.transport.query(command) {
            Ok(response) => {
                debug!("[{}] {} -> {}", self.role, command, response.trim());
                Ok(response.trim().to_string())
            }
            Err(e) => Err(self.fail(command, format!("{:#}", e))),
        }
    }

    /// Builds an error for an answer that could not be interpreted. The link
    /// itself stays usable.
    pub fn unexpected(&mut self, command: &str, response: &str) -> InstrumentError {
        let err = InstrumentError {
            role: self.role,
            command: command.to_string(),
            reason: format!("unexpected response '{}'", response),
        };
        self.identity.last_error = Some(err.reason.clone());
        err
    }

    /// Close the transport. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), InstrumentError> {
        if !self.identity.connected {
            return Ok(());
        }
        self.identity.connected = false;
        self.transport.close().map_err(|e| InstrumentError {
            role: self.role,
            command: "close".to_string(),
            reason: format!("{:#}", e),
        })
    }

    fn fail(&mut self, command: &str, reason: String) -> InstrumentError {
        self.identity.last_error = Some(reason.clone());
        InstrumentError {
            role: self.role,
            command: command.to_string(),
            reason,
        }
    }
}

/// Interprets a boolean state answer (`1`/`0`, `ON`/`OFF`).
pub fn parse_state(response: &str) -> Option<bool> {
    match response.trim().to_ascii_uppercase().as_str() {
        "1" | "ON" => Some(true),
        "0" | "OFF" => Some(false),
        _ => None,
    }
}
