//! Settling delays.
//!
//! Real-time waits are the only scheduling primitive of a run: the load and
//! the supply do not reliably accept the next command while they are still
//! settling from the previous one. The constants below are minimum waits,
//! not pacing, and every component asks a [`Settle`] implementation for them
//! so that tests can observe the contract without sleeping.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// After `*RST` on either instrument.
pub const RESET_SETTLE: Duration = Duration::from_secs(1);
/// After each programming command.
pub const COMMAND_SETTLE: Duration = Duration::from_millis(100);
/// After reading back the load list mode.
pub const MODE_QUERY_SETTLE: Duration = Duration::from_secs(1);
/// After commanding a new load current level.
pub const STEP_SETTLE: Duration = Duration::from_millis(200);
/// After re-issuing a load current level before retrying a sensor read.
pub const RETRY_SETTLE: Duration = Duration::from_secs(1);
/// After switching a load input or supply output off.
pub const TEARDOWN_SETTLE: Duration = Duration::from_secs(1);
/// Before initializing the instruments for a new case.
pub const CASE_LEAD_IN: Duration = Duration::from_secs(2);

/// Something that can wait out an instrument settling window.
pub trait Settle {
    /// Block for at least `delay`.
    fn settle(&mut self, delay: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSettle;

impl Settle for ThreadSettle {
    fn settle(&mut self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Records requested delays instead of sleeping.
///
/// Clones share the same log, so a handle kept by a test still sees the
/// delays requested through a boxed copy.
#[derive(Debug, Default, Clone)]
pub struct RecordingSettle {
    delays: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSettle {
    /// Clock with no recorded delays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        self.delays.borrow().iter().sum()
    }
}

impl Settle for RecordingSettle {
    fn settle(&mut self, delay: Duration) {
        self.delays.borrow_mut().push(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_settle_shares_log_between_clones() {
        let handle = RecordingSettle::new();
        let mut boxed: Box<dyn Settle> = Box::new(handle.clone());
        boxed.settle(STEP_SETTLE);
        boxed.settle(RETRY_SETTLE);
        assert_eq!(handle.delays(), vec![STEP_SETTLE, RETRY_SETTLE]);
        assert_eq!(handle.total(), Duration::from_millis(1200));
    }

    #[test]
    fn test_retry_wait_is_longer_than_step_wait() {
        assert!(RETRY_SETTLE > STEP_SETTLE);
    }
}
