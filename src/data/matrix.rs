//! Column-oriented result matrix.
//!
//! Columns are only ever appended. Every column holds exactly one value per
//! ramp row, and the first column appended fixes the row count.

use thiserror::Error;

/// Rejected column or case.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    /// A column without values.
    #[error("Column '{0}' has no values")]
    EmptyColumn(String),

    /// A column whose length differs from the fixed row count.
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    RowCountMismatch {
        /// Offending column.
        column: String,
        /// Row count fixed by the first column.
        expected: usize,
        /// Length of the rejected column.
        actual: usize,
    },

    /// A column name already in the matrix.
    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    /// A case recorded without any trials.
    #[error("Case at {voltage} V has no trials")]
    NoTrials { voltage: f64 },

    /// A trial whose set-points differ from the `Load` column.
    #[error("Trial {sample} at {voltage} V does not follow the recorded ramp")]
    StepMismatch { voltage: f64, sample: usize },
}

/// Named columns of equal length, in append order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMatrix {
    columns: Vec<(String, Vec<f64>)>,
}

impl ResultMatrix {
    /// Empty matrix; the first appended column fixes the row count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column after all existing ones.
    pub fn append_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), MatrixError> {
        self.check_column(name, values.len())?;
        self.columns.push((name.to_string(), values));
        Ok(())
    }

    /// Whether a column called `name` with `len` values could be appended.
    pub fn check_column(&self, name: &str, len: usize) -> Result<(), MatrixError> {
        if len == 0 {
            return Err(MatrixError::EmptyColumn(name.to_string()));
        }
        if let Some(expected) = self.row_count() {
            if len != expected {
                return Err(MatrixError::RowCountMismatch {
                    column: name.to_string(),
                    expected,
                    actual: len,
                });
            }
        }
        if self.has_column(name) {
            return Err(MatrixError::DuplicateColumn(name.to_string()));
        }
        Ok(())
    }

    /// Shared row count, once the first column exists.
    pub fn row_count(&self) -> Option<usize> {
        self.columns.first().map(|(_, values)| values.len())
    }

    /// Number of columns, `Load` included.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// True until at least one row and one column exist.
    pub fn is_empty(&self) -> bool {
        self.row_count().map_or(true, |rows| rows == 0)
    }

    /// True if a column named `name` exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Values of the named column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Column names in append order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Values of row `index`, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.row_count()? {
            return None;
        }
        Some(self.columns.iter().map(|(_, values)| values[index]).collect())
    }

    /// All rows, in ramp order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.row_count().unwrap_or(0))
            .map(move |i| self.columns.iter().map(|(_, values)| values[i]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matrix_is_empty() {
        let matrix = ResultMatrix::new();
        assert!(matrix.is_empty());
        assert_eq!(matrix.row_count(), None);
        assert_eq!(matrix.rows().count(), 0);
    }

    #[test]
    fn test_first_column_fixes_row_count() {
        let mut matrix = ResultMatrix::new();
        matrix.append_column("Load", vec![0.0, 0.2, 0.4]).unwrap();
        let err = matrix.append_column("Vo_24V_1", vec![1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            MatrixError::RowCountMismatch {
                column: "Vo_24V_1".to_string(),
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(matrix.column_count(), 1);
    }

    #[test]
    fn test_duplicate_and_empty_columns_rejected() {
        let mut matrix = ResultMatrix::new();
        assert!(matches!(
            matrix.append_column("Load", vec![]),
            Err(MatrixError::EmptyColumn(_))
        ));
        matrix.append_column("Load", vec![0.0]).unwrap();
        assert!(matches!(
            matrix.append_column("Load", vec![1.0]),
            Err(MatrixError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_rows_follow_column_order() {
        let mut matrix = ResultMatrix::new();
        matrix.append_column("Load", vec![0.0, 0.2]).unwrap();
        matrix.append_column("Vo_12V_1", vec![0.1, 0.3]).unwrap();
        assert_eq!(matrix.column_names(), vec!["Load", "Vo_12V_1"]);
        assert_eq!(matrix.row(1), Some(vec![0.2, 0.3]));
        assert_eq!(matrix.row(2), None);
        assert_eq!(matrix.rows().collect::<Vec<_>>(), vec![vec![0.0, 0.1], vec![0.2, 0.3]]);
    }
}
