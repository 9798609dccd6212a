//! Raw SCPI over TCP (LXI "socket" port, usually 5555).

use super::ScpiTransport;
use anyhow::{anyhow, Context, Result};
use log::debug;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Extracts `host:port` from a socket resource.
///
/// Accepts VISA style `TCPIP0::192.168.1.100::5555::SOCKET` and plain
/// `192.168.1.100:5555`. Anything else (INSTR resources, aliases) is left to
/// the VISA adapter.
pub fn parse_socket_resource(resource: &str) -> Option<String> {
    let resource = resource.trim();
    if resource.to_ascii_uppercase().starts_with("TCPIP") {
        let parts: Vec<&str> = resource.split("::").collect();
        return match parts.as_slice() {
            [_, host, port, kind]
                if kind.eq_ignore_ascii_case("SOCKET") && port.parse::<u16>().is_ok() =>
            {
                Some(format!("{}:{}", host, port))
            }
            _ => None,
        };
    }
    let (host, port) = resource.rsplit_once(':')?;
    if host.is_empty() || host.contains(':') || port.parse::<u16>().is_err() {
        return None;
    }
    Some(resource.to_string())
}

/// Blocking SCPI session over a TCP socket.
pub struct SocketAdapter {
    address: String,
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    terminator: &'static str,
}

impl SocketAdapter {
    /// Connect to `address` (`host:port`).
    ///
    /// # Errors
    /// Returns error if the address does not resolve or the connection fails
    pub fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let socket_addr = address
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve '{}'", address))?
            .next()
            .ok_or_else(|| anyhow!("'{}' resolved to no address", address))?;

        let stream = TcpStream::connect_timeout(&socket_addr, timeout)
            .with_context(|| format!("Failed to connect to {}", address))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let reader = BufReader::new(stream.try_clone()?);
        debug!("SCPI socket connected to {}", address);

        Ok(Self {
            address: address.to_string(),
            writer: stream,
            reader,
            terminator: "\n",
        })
    }

    fn send(&mut self, command: &str) -> Result<()> {
        self.writer
            .write_all(format!("{}{}", command, self.terminator).as_bytes())
            .and_then(|()| self.writer.flush())
            .with_context(|| format!("Failed to write '{}' to {}", command, self.address))
    }
}

impl ScpiTransport for SocketAdapter {
    fn write_line(&mut self, command: &str) -> Result<()> {
        self.send(command)?;
        debug!("[{}] Sent command: {}", self.address, command);
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.send(command)?;

        let mut response = String::new();
        let read = self
            .reader
            .read_line(&mut response)
            .with_context(|| format!("Failed to read response to '{}'", command))?;
        if read == 0 {
            return Err(anyhow!("{} closed the connection", self.address));
        }

        let response = response.trim().to_string();
        debug!("[{}] '{}' -> '{}'", self.address, command, response);
        Ok(response)
    }

    fn close(&mut self) -> Result<()> {
        self.writer
            .shutdown(std::net::Shutdown::Both)
            .or_else(|e| match e.kind() {
                std::io::ErrorKind::NotConnected => Ok(()),
                _ => Err(e),
            })
            .with_context(|| format!("Failed to close socket to {}", self.address))
    }
}
