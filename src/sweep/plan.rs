//! Sweep plan: the ordered list of input-voltage cases.
//!
//! Loaded from a CSV file with `input_voltage` and `samples` columns. Row
//! order is case order, and case order is report column order.

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One programmed operating point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepCase {
    /// Supply voltage and load turn-on voltage, in volts.
    #[serde(rename = "input_voltage")]
    pub target_voltage: f64,
    /// Number of ramp traversals at this voltage.
    #[serde(rename = "samples")]
    pub sample_count: u32,
}

impl SweepCase {
    /// Case at `target_voltage` volts, ramped `sample_count` times.
    pub fn new(target_voltage: f64, sample_count: u32) -> Self {
        Self {
            target_voltage,
            sample_count,
        }
    }
}

/// Validated, ordered list of sweep cases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepPlan {
    cases: Vec<SweepCase>,
}

impl SweepPlan {
    /// Validated plan from cases given in order.
    pub fn new(cases: Vec<SweepCase>) -> Result<Self, PlanError> {
        for (i, case) in cases.iter().enumerate() {
            let row = i + 1;
            if !(case.target_voltage.is_finite() && case.target_voltage > 0.0) {
                return Err(PlanError::InvalidCase {
                    row,
                    reason: format!("input voltage must be positive, got {}", case.target_voltage),
                });
            }
            if case.sample_count == 0 {
                return Err(PlanError::InvalidCase {
                    row,
                    reason: "samples must be at least 1".to_string(),
                });
            }
            if cases[..i].iter().any(|c| c.target_voltage == case.target_voltage) {
                return Err(PlanError::DuplicateVoltage(case.target_voltage));
            }
        }
        Ok(Self { cases })
    }

    /// Read a plan CSV with `input_voltage` and `samples` columns.
    pub fn from_csv_path(path: &Path) -> Result<Self, PlanError> {
        Self::from_csv(
            csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(path)?,
        )
    }

    /// Read a plan CSV from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PlanError> {
        Self::from_csv(
            csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_reader(reader),
        )
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, PlanError> {
        let cases = reader
            .deserialize::<SweepCase>()
            .collect::<Result<Vec<_>, csv::Error>>()?;
        Self::new(cases)
    }

    /// Cases in plan order.
    pub fn cases(&self) -> &[SweepCase] {
        &self.cases
    }

    /// Number of cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// True when the plan has no cases.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Total number of ramp traversals over all cases.
    pub fn total_trials(&self) -> u64 {
        self.cases.iter().map(|c| u64::from(c.sample_count)).sum()
    }
}
