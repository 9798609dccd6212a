//! Error taxonomy for a bench run.
//!
//! Every failure path of a run is classified into one of the types below,
//! using the `thiserror` crate. The classes map directly onto how the
//! orchestrator reacts:
//!
//! - **`ConnectionError`**: an instrument or the sensor could not be reached at
//!   startup. Non-fatal to the process; it only disables the phases that need
//!   that link.
//! - **`PartialReadinessError`**: at least one of the three required links is
//!   unavailable. The sweep phase is skipped entirely; teardown still runs for
//!   the links that did connect.
//! - **`ProtocolError`**: the sensor link produced a malformed or missing
//!   frame. After the bounded retry is exhausted it fails the current case,
//!   and no substitute value ever reaches the result matrix.
//! - **`InstrumentError`**: a command or query on an already connected
//!   instrument failed, or answered something that cannot be interpreted.
//! - **`PlanError`** / **`MatrixError`** / **`ConfigError`**: invalid sweep plan,
//!   result matrix invariant violations, and configuration problems.
//!
//! `BenchError` consolidates the failures that can end a case or a sweep, so
//! `?` works across the sweep and teardown code. Startup failures stay in their
//! own types and are reported per link in the run summary.

use crate::connection::LinkRole;
use crate::data::MatrixError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, BenchError>;

/// A link could not be established at startup.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{role} at '{resource}' unavailable: {description}")]
pub struct ConnectionError {
    /// Which of the three links failed.
    pub role: LinkRole,
    /// Resource string or port name that was tried.
    pub resource: String,
    /// Transport or instrument reported error code, when one is available.
    pub code: Option<i32>,
    /// Human readable cause.
    pub description: String,
}

impl ConnectionError {
    /// Builds a connection error from an adapter level failure, keeping the
    /// first OS error code found in the cause chain.
    pub fn from_cause(role: LinkRole, resource: &str, cause: &anyhow::Error) -> Self {
        let code = cause
            .chain()
            .find_map(|c| c.downcast_ref::<std::io::Error>())
            .and_then(std::io::Error::raw_os_error);
        Self {
            role,
            resource: resource.to_string(),
            code,
            description: format!("{:#}", cause),
        }
    }
}

/// Malformed or missing telemetry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// The serial port reported an error or timed out.
    #[error("Telemetry transport error: {0}")]
    Transport(String),

    /// The line is not valid UTF-8.
    #[error("Telemetry line is not valid UTF-8")]
    Encoding,

    /// The line is not a JSON object with a numeric `current`.
    #[error("Malformed telemetry frame '{line}': {reason}")]
    Malformed { line: String, reason: String },

    /// The port was closed by teardown.
    #[error("Telemetry link is closed")]
    Closed,

    /// Every attempt of a retried read failed.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        /// What was being retried.
        operation: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// Error of the final attempt.
        last: Box<ProtocolError>,
    },
}

/// One or more of the required links is unavailable.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Sweep skipped, unavailable: {}", join_roles(.unavailable))]
pub struct PartialReadinessError {
    /// Links that did not connect, in connection order.
    pub unavailable: Vec<LinkRole>,
}

fn join_roles(roles: &[LinkRole]) -> String {
    roles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A command or query on a connected instrument failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{role} command '{command}' failed: {reason}")]
pub struct InstrumentError {
    /// Instrument the command was sent to.
    pub role: LinkRole,
    /// Command or query text, without terminator.
    pub command: String,
    /// Transport error or the unexpected answer.
    pub reason: String,
}

/// Invalid sweep plan.
#[derive(Error, Debug)]
pub enum PlanError {
    /// The file could not be opened or a row could not be parsed.
    #[error("Failed to read sweep plan: {0}")]
    Read(#[from] csv::Error),

    /// A row with a non-positive voltage or sample count.
    #[error("Sweep plan row {row}: {reason}")]
    InvalidCase { row: usize, reason: String },

    /// Two rows share an input voltage, which would collide in the report.
    #[error("Sweep plan lists input voltage {0} V more than once")]
    DuplicateVoltage(f64),
}

/// Failure of a case, of the sweep or of the run's persistence and teardown.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Telemetry failure; fails only the current case.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Load or supply failure; aborts the sweep.
    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    /// A case did not fit the accumulated matrix.
    #[error("Result matrix error: {0}")]
    Matrix(#[from] MatrixError),

    /// The report could not be written.
    #[error("Report error: {0}")]
    Report(String),

    /// One or more teardown gates failed.
    #[error("Teardown failed with errors")]
    TeardownFailed(Vec<BenchError>),
}

impl BenchError {
    /// True for failures that invalidate only the current case.
    pub fn is_case_local(&self) -> bool {
        matches!(self, BenchError::Protocol(_))
    }
}
