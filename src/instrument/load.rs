//! Electronic load (Rigol DL3000 series command set).

use super::{parse_state, InstrumentLink};
use crate::error::InstrumentError;

const LEVEL_PREFIX: &str = ":SOUR:CURR:LEV:IMM ";

/// Programmable DC electronic load.
pub struct ElectronicLoad {
    link: InstrumentLink,
}

impl ElectronicLoad {
    /// Load over an identified link.
    pub fn new(link: InstrumentLink) -> Self {
        Self { link }
    }

    /// Underlying link.
    pub fn link(&self) -> &InstrumentLink {
        &self.link
    }

    /// Underlying link, for release.
    pub fn link_mut(&mut self) -> &mut InstrumentLink {
        &mut self.link
    }

    /// Restore factory defaults.
    pub fn reset(&mut self) -> Result<(), InstrumentError> {
        self.link.write("*RST")
    }

    /// Constant-current list mode.
    pub fn set_list_mode_cc(&mut self) -> Result<(), InstrumentError> {
        self.link.write(":SOUR:LIST:MODE CC")
    }

    /// Query the configured list mode.
    pub fn list_mode(&mut self) -> Result<String, InstrumentError> {
        self.link.query(":SOURCE:LIST:MODE?")
    }

    /// Input voltage at which the load starts sinking current.
    pub fn set_turn_on_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        self.link.write(&format!(":SOUR:CURR:VON {}", volts))
    }

    /// Select the current range covering `amps`.
    pub fn set_current_range(&mut self, amps: f64) -> Result<(), InstrumentError> {
        self.link.write(&format!(":SOUR:CURR:RANG {}", amps))
    }

    /// Command the constant-current level.
    pub fn set_current_level(&mut self, amps: f64) -> Result<(), InstrumentError> {
        self.link.write(&level_command(amps))
    }

    /// Switch the load input on.
    pub fn enable_input(&mut self) -> Result<(), InstrumentError> {
        self.link.write(":SOURCE:INPUT:STATE On")
    }

    /// Switch the load input off.
    pub fn disable_input(&mut self) -> Result<(), InstrumentError> {
        self.link.write(":SOURCE:INPUT:STATE Off")
    }

    /// Whether the load input is currently sinking.
    pub fn input_enabled(&mut self) -> Result<bool, InstrumentError> {
        let command = ":SOUR:INP:STAT?";
        let response = self.link.query(command)?;
        parse_state(&response).ok_or_else(|| self.link.unexpected(command, &response))
    }
}

/// Command that sets the load current level.
pub fn level_command(amps: f64) -> String {
    format!("{}{}", LEVEL_PREFIX, amps)
}

/// Load current level set by `command`, if it is a level command.
pub fn parse_level_command(command: &str) -> Option<f64> {
    command.strip_prefix(LEVEL_PREFIX)?.trim().parse().ok()
}

/// Most recent level commanded in a command log.
pub fn last_level(commands: &[String]) -> Option<f64> {
    commands.iter().rev().find_map(|c| parse_level_command(c))
}
