//! Turns completed cases into result matrix columns.

use super::matrix::{MatrixError, ResultMatrix};
use crate::sweep::{SampleTrial, SweepCase};
use log::debug;

/// Name of the commanded load current column.
pub const LOAD_COLUMN: &str = "Load";

/// Column name for sample `sample_index` (0-based) of a case.
pub fn sample_column_name(target_voltage: f64, sample_index: usize) -> String {
    format!("Vo_{}V_{}", target_voltage, sample_index + 1)
}

/// Owns the result matrix for the duration of a run.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    matrix: ResultMatrix,
}

impl ResultAccumulator {
    /// Accumulator over an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one column per trial of `case`, preceded by the load column
    /// on the first recorded case.
    ///
    /// Either every column of the case is appended or none is.
    pub fn record_case(
        &mut self,
        case: &SweepCase,
        trials: &[SampleTrial],
    ) -> Result<(), MatrixError> {
        let first = trials.first().ok_or(MatrixError::NoTrials {
            voltage: case.target_voltage,
        })?;
        let load_currents = match self.matrix.column(LOAD_COLUMN) {
            Some(existing) => existing.to_vec(),
            None => first.load_currents(),
        };
        let needs_load_column = !self.matrix.has_column(LOAD_COLUMN);
        if needs_load_column {
            self.matrix.check_column(LOAD_COLUMN, load_currents.len())?;
        }

        let mut columns = Vec::with_capacity(trials.len());
        for (i, trial) in trials.iter().enumerate() {
            if trial.load_currents() != load_currents {
                return Err(MatrixError::StepMismatch {
                    voltage: case.target_voltage,
                    sample: i + 1,
                });
            }
            let name = sample_column_name(case.target_voltage, i);
            self.matrix.check_column(&name, trial.len())?;
            if columns.iter().any(|(n, _): &(String, Vec<f64>)| *n == name) {
                return Err(MatrixError::DuplicateColumn(name));
            }
            columns.push((name, trial.sensor_currents()));
        }

        if needs_load_column {
            self.matrix.append_column(LOAD_COLUMN, load_currents)?;
        }
        for (name, values) in columns {
            debug!("Appending column {}", name);
            self.matrix.append_column(&name, values)?;
        }
        Ok(())
    }

    /// Matrix accumulated so far.
    pub fn matrix(&self) -> &ResultMatrix {
        &self.matrix
    }

    /// Hand the matrix over for persistence.
    pub fn into_matrix(self) -> ResultMatrix {
        self.matrix
    }
}
