//! Serial port line source for the telemetry sensor.

use super::LineSource;
use anyhow::{anyhow, Context, Result};
use log::debug;
use serialport::{ClearBuffer, SerialPort};
use std::io::Read;
use std::time::{Duration, Instant};

/// Serial adapter for the RS-232 / USB-serial telemetry sensor
///
/// This adapter wraps the serialport crate with blocking, line-delimited reads.
pub struct SerialAdapter {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    port_name: String,

    /// Baud rate (e.g., 9600, 115200)
    baud_rate: u32,

    /// Time allowed for one complete line
    timeout: Duration,

    /// Response line ending character (e.g., '\n')
    response_delimiter: u8,

    port: Option<Box<dyn SerialPort>>,
}

impl SerialAdapter {
    /// Create a new serial adapter with default settings
    ///
    /// # Arguments
    /// * `port_name` - Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    /// * `baud_rate` - Communication speed (e.g., 9600, 115200)
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            timeout: Duration::from_secs(2),
            response_delimiter: b'\n',
            port: None,
        }
    }

    /// Set the time allowed for one complete line
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Port this adapter opens.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Open the port.
    pub fn open(&mut self) -> Result<()> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(100)) // Internal read timeout
            .open()
            .with_context(|| {
                format!(
                    "Failed to open serial port '{}' at {} baud",
                    self.port_name, self.baud_rate
                )
            })?;

        self.port = Some(port);

        debug!(
            "Serial port '{}' opened at {} baud",
            self.port_name, self.baud_rate
        );
        Ok(())
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        let name = &self.port_name;
        self.port
            .as_mut()
            .ok_or_else(|| anyhow!("Serial port '{}' not connected", name))
    }
}

impl LineSource for SerialAdapter {
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let delimiter = self.response_delimiter;
        let port = self.port_mut()?;

        let mut line = Vec::new();
        let mut buffer = [0u8; 1];
        let start = Instant::now();

        loop {
            if start.elapsed() > timeout {
                return Err(anyhow!(
                    "Serial read timeout after {:?} ({} bytes received)",
                    timeout,
                    line.len()
                ));
            }

            match port.read(&mut buffer) {
                Ok(1) => {
                    line.push(buffer[0]);
                    if buffer[0] == delimiter {
                        break;
                    }
                }
                Ok(0) => {
                    return Err(anyhow!("Unexpected EOF from serial port"));
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    // Port timeout is shorter than our overall timeout
                    continue;
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e).context("Serial read error"));
                }
                Ok(_) => return Err(anyhow!("Read into single-byte buffer returned >1")),
            }
        }

        debug!(
            "Received serial line: {}",
            String::from_utf8_lossy(&line).trim_end()
        );
        Ok(line)
    }

    fn clear_input(&mut self) -> Result<()> {
        self.port_mut()?
            .clear(ClearBuffer::Input)
            .context("Failed to clear serial input buffer")
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Serial port '{}' closed", self.port_name);
        }
        Ok(())
    }
}
