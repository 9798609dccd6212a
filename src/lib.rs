//! Core library for the eload_sweep bench.
//!
//! Drives a power supply / electronic load pair against a serial telemetry
//! sensor: for each input voltage of a sweep plan the load current is ramped
//! and one sensor reading is captured per step. Readings accumulate into a
//! column-oriented matrix that is written out as a timestamped CSV report.
//!
//! The run is single-threaded and blocking. Settling delays between
//! instrument commands are the only scheduling primitive (see [`timing`]).

pub mod adapters;
pub mod config;
pub mod connection;
pub mod data;
pub mod error;
pub mod instrument;
pub mod session;
pub mod simulation;
pub mod sweep;
pub mod teardown;
pub mod telemetry;
pub mod timing;

pub use connection::{ConnectionManager, Connector, HardwareConnector, LinkRole};
pub use error::{AppResult, BenchError};
pub use session::{BenchSession, RunSummary};
