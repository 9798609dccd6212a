//! Hardware adapter implementations
//!
//! Low-level, blocking I/O behind two small traits: [`ScpiTransport`] for the
//! request/response instruments and [`LineSource`] for the line-oriented
//! telemetry sensor. Everything above this layer only sees these traits.

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial_adapter;
pub mod socket_adapter;
#[cfg(feature = "instrument_visa")]
pub mod visa_adapter;

pub use mock::{MockLineSource, MockTransport};
#[cfg(feature = "instrument_serial")]
pub use serial_adapter::SerialAdapter;
pub use socket_adapter::SocketAdapter;
#[cfg(feature = "instrument_visa")]
pub use visa_adapter::VisaAdapter;

use anyhow::Result;

/// Request/response channel to one SCPI instrument.
pub trait ScpiTransport {
    /// Send a command; no response is read.
    fn write_line(&mut self, command: &str) -> Result<()>;

    /// Send a query and return the response line with the terminator removed.
    fn query(&mut self, command: &str) -> Result<String>;

    /// Release the underlying session.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Line-oriented input channel.
pub trait LineSource {
    /// Read one complete line, including its terminator if one was received.
    fn read_line(&mut self) -> Result<Vec<u8>>;

    /// Discard anything already buffered on the input side.
    fn clear_input(&mut self) -> Result<()>;

    /// Release the underlying port.
    fn close(&mut self) -> Result<()>;
}
