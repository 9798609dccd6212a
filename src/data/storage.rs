//! Report writers.
//!
//! A report is one tabular file per run. The orchestrator only calls a writer
//! when the result matrix holds data.
use super::matrix::ResultMatrix;
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Timestamp format embedded in report file names (second resolution).
pub const REPORT_TIMESTAMP_FORMAT: &str = "%d_%m_%y_%H_%M_%S";

/// Persists a finished result matrix.
pub trait ReportWriter {
    /// Write `matrix` and return where it went.
    fn write_report(&mut self, matrix: &ResultMatrix) -> Result<PathBuf>;
}

// ============================================================================
// CSV Writer
// ============================================================================

/// Writes `{prefix}_{timestamp}.csv` under a report directory.
pub struct CsvReportWriter {
    output_dir: PathBuf,
    file_prefix: String,
}

impl CsvReportWriter {
    /// Writer for `{output_dir}/{file_prefix}_{timestamp}.csv`.
    pub fn new(output_dir: impl Into<PathBuf>, file_prefix: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: file_prefix.to_string(),
        }
    }

    /// Directory reports are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Report path for a run that finishes now.
    pub fn report_path(&self) -> PathBuf {
        let file_name = format!(
            "{}_{}.csv",
            self.file_prefix,
            chrono::Local::now().format(REPORT_TIMESTAMP_FORMAT)
        );
        self.output_dir.join(file_name)
    }
}

impl ReportWriter for CsvReportWriter {
    fn write_report(&mut self, matrix: &ResultMatrix) -> Result<PathBuf> {
        if !self.output_dir.exists() {
            std::fs::create_dir_all(&self.output_dir).with_context(|| {
                format!("Failed to create report directory at {:?}", self.output_dir)
            })?;
        }
        let path = self.report_path();

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create CSV file at {:?}", path))?;
        writer
            .write_record(matrix.column_names())
            .context("Failed to write CSV header")?;
        for row in matrix.rows() {
            writer
                .write_record(row.iter().map(ToString::to_string))
                .context("Failed to write CSV row")?;
        }
        writer.flush().context("Failed to flush CSV writer")?;

        log::info!("Report written to '{}'.", path.display());
        Ok(path)
    }
}

// ============================================================================
// Recording Writer
// ============================================================================

/// Keeps every matrix it is asked to persist. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingReportWriter {
    reports: Rc<RefCell<Vec<ResultMatrix>>>,
}

impl RecordingReportWriter {
    /// Writer with no reports yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every matrix handed over, oldest first.
    pub fn reports(&self) -> Vec<ResultMatrix> {
        self.reports.borrow().clone()
    }

    /// Number of reports written.
    pub fn count(&self) -> usize {
        self.reports.borrow().len()
    }
}

impl ReportWriter for RecordingReportWriter {
    fn write_report(&mut self, matrix: &ResultMatrix) -> Result<PathBuf> {
        let mut reports = self.reports.borrow_mut();
        reports.push(matrix.clone());
        Ok(PathBuf::from(format!("memory://report/{}", reports.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> ResultMatrix {
        let mut matrix = ResultMatrix::new();
        matrix.append_column("Load", vec![0.0, 0.2, 0.4]).unwrap();
        matrix.append_column("Vo_12V_1", vec![0.0, 0.4, 0.8]).unwrap();
        matrix
    }

    #[test]
    fn test_csv_report_creates_directory_and_writes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("ELOAD_Reports");
        let mut writer = CsvReportWriter::new(&out, "Test");

        let path = writer.write_report(&sample_matrix()).unwrap();

        assert!(out.is_dir());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Test_") && name.ends_with(".csv"));
        // Test_dd_mm_yy_HH_MM_SS.csv
        assert_eq!(name.len(), "Test_".len() + 17 + ".csv".len());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["Load,Vo_12V_1", "0,0", "0.2,0.4", "0.4,0.8"]);
    }

    #[test]
    fn test_recording_writer_shares_reports() {
        let handle = RecordingReportWriter::new();
        let mut writer = handle.clone();
        writer.write_report(&sample_matrix()).unwrap();
        assert_eq!(handle.count(), 1);
        assert_eq!(handle.reports()[0].column_names(), vec!["Load", "Vo_12V_1"]);
    }
}
