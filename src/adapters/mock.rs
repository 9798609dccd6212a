//! In-process adapters for tests and the simulated bench.
//!
//! Both mocks are cheap handles over shared state: clone one before boxing it
//! and the clone still observes every command, read and close.

use super::{LineSource, ScpiTransport};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

#[derive(Default)]
struct TransportState {
    log: Vec<String>,
    responses: HashMap<String, String>,
    offline: bool,
    closed: bool,
}

/// Scripted SCPI instrument.
///
/// Writes and queries are appended to a shared log. Queries answer from a
/// fixed response table; an unscripted query is an error.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<TransportState>>,
}

impl MockTransport {
    /// Transport that answers every query with an empty line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `response` from now on.
    pub fn with_response(self, query: &str, response: &str) -> Self {
        self.set_response(query, response);
        self
    }

    /// Answer `query` with `response` from now on.
    pub fn set_response(&self, query: &str, response: &str) {
        self.state
            .borrow_mut()
            .responses
            .insert(query.to_string(), response.to_string());
    }

    /// Make every subsequent write and query fail.
    pub fn set_offline(&self, offline: bool) {
        self.state.borrow_mut().offline = offline;
    }

    /// Commands and queries seen so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().log.clone()
    }

    /// Number of logged entries equal to `command`.
    pub fn count(&self, command: &str) -> usize {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl ScpiTransport for MockTransport {
    fn write_line(&mut self, command: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.offline {
            return Err(anyhow!("mock instrument offline"));
        }
        state.log.push(command.to_string());
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        let mut state = self.state.borrow_mut();
        if state.offline {
            return Err(anyhow!("mock instrument offline"));
        }
        state.log.push(command.to_string());
        state
            .responses
            .get(command)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted response for '{}'", command))
    }

    fn close(&mut self) -> Result<()> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

type LineFn = Box<dyn FnMut() -> Result<Vec<u8>>>;

#[derive(Default)]
struct LineState {
    scripted: VecDeque<Result<Vec<u8>, String>>,
    generator: Option<LineFn>,
    reads: usize,
    clears: usize,
    closed: bool,
    close_error: Option<String>,
}

/// Scripted line source.
///
/// Lines come from a queue first, then from an optional generator. With both
/// exhausted a read fails like a serial timeout would.
#[derive(Clone, Default)]
pub struct MockLineSource {
    state: Rc<RefCell<LineState>>,
}

impl MockLineSource {
    /// Source with nothing queued; reads time out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines produced by `generator`, called once per read.
    pub fn from_fn(generator: impl FnMut() -> Result<Vec<u8>> + 'static) -> Self {
        let source = Self::default();
        source.state.borrow_mut().generator = Some(Box::new(generator));
        source
    }

    /// Queue a line (a trailing newline is added).
    pub fn push_line(&self, line: &str) {
        self.state
            .borrow_mut()
            .scripted
            .push_back(Ok(format!("{}\n", line).into_bytes()));
    }

    /// Queue raw bytes exactly as given.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state.borrow_mut().scripted.push_back(Ok(bytes.to_vec()));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, message: &str) {
        self.state
            .borrow_mut()
            .scripted
            .push_back(Err(message.to_string()));
    }

    /// Make `close` report `message` (the port still counts as closed).
    pub fn fail_close(&self, message: &str) {
        self.state.borrow_mut().close_error = Some(message.to_string());
    }

    /// Reads attempted so far.
    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }

    /// Input buffer flushes so far.
    pub fn clears(&self) -> usize {
        self.state.borrow().clears
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl LineSource for MockLineSource {
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(anyhow!("mock line source closed"));
        }
        state.reads += 1;
        if let Some(next) = state.scripted.pop_front() {
            return next.map_err(|message| anyhow!(message));
        }
        match state.generator.as_mut() {
            Some(generator) => generator(),
            None => Err(anyhow!("mock line source timed out")),
        }
    }

    fn clear_input(&mut self) -> Result<()> {
        self.state.borrow_mut().clears += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        match &state.close_error {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_logs_and_answers() {
        let handle = MockTransport::new().with_response("*IDN?", "MOCK,LOAD,0,1");
        let mut transport: Box<dyn ScpiTransport> = Box::new(handle.clone());
        transport.write_line("*RST").unwrap();
        assert_eq!(transport.query("*IDN?").unwrap(), "MOCK,LOAD,0,1");
        assert!(transport.query(":MEAS:VOLT?").is_err());
        assert_eq!(handle.commands(), vec!["*RST", "*IDN?", ":MEAS:VOLT?"]);
        assert_eq!(handle.count("*RST"), 1);
    }

    #[test]
    fn test_offline_transport_fails() {
        let handle = MockTransport::new();
        handle.set_offline(true);
        let mut transport = handle.clone();
        assert!(transport.write_line("*RST").is_err());
        assert!(handle.commands().is_empty());
    }

    #[test]
    fn test_line_source_queue_then_generator() {
        let mut counter = 0;
        let handle = MockLineSource::from_fn(move || {
            counter += 1;
            Ok(format!("{{\"current\": {}}}\n", counter).into_bytes())
        });
        handle.push_line("garbage");
        handle.push_error("timeout");

        let mut source = handle.clone();
        assert_eq!(source.read_line().unwrap(), b"garbage\n");
        assert!(source.read_line().is_err());
        assert_eq!(source.read_line().unwrap(), b"{\"current\": 1}\n");
        assert_eq!(handle.reads(), 3);
    }

    #[test]
    fn test_empty_line_source_times_out() {
        let mut source = MockLineSource::new();
        assert!(source.read_line().is_err());
        source.close().unwrap();
        assert!(source.is_closed());
    }
}
