//! Result matrix, accumulation and report storage.

pub mod accumulator;
pub mod matrix;
pub mod storage;

pub use accumulator::{sample_column_name, ResultAccumulator, LOAD_COLUMN};
pub use matrix::{MatrixError, ResultMatrix};
pub use storage::{CsvReportWriter, RecordingReportWriter, ReportWriter};
