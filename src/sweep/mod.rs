//! Measurement sequencing: sweep plan, load ramp, bounded retry and the
//! per-case controller.

pub mod controller;
pub mod plan;
pub mod ramp;
pub mod retry;

pub use controller::{SampleTrial, SweepController};
pub use plan::{SweepCase, SweepPlan};
pub use ramp::{Ramp, RampStep};
pub use retry::{retry_bounded, Recoverable, RetryPolicy};
