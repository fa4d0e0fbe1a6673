// src/report.rs
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::errors::Result;
use crate::job::EvaluationRecord;
use crate::results::read_log;

/// Pass@1 tally for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub pass_rate: f64,
}

impl RunSummary {
    /// `total` is the number of problems submitted. Problems with no record
    /// (a job that died) count as failures.
    pub fn from_records(records: &[EvaluationRecord], total: usize) -> Self {
        let passed = records.iter().filter(|r| r.status.is_pass()).count();
        let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 };
        Self { total, passed, pass_rate }
    }

    /// Recomputes the summary from a persisted log.
    pub fn from_log(path: &Path) -> Result<Self> {
        let records = read_log(path)?;
        Ok(Self::from_records(&records, records.len()))
    }

    pub fn percentage(&self) -> f64 {
        self.pass_rate * 100.0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total problems: {}", self.total)?;
        writeln!(f, "Passed: {}", self.passed)?;
        write!(f, "Pass@1: {:.2}%", self.percentage())
    }
}

/// Prints the end-of-run summary.
pub fn print_summary(summary: &RunSummary, log_path: &Path) {
    let separator = "=".repeat(40);
    println!("\n{}", separator);
    println!("📊 Evaluation finished!");
    println!("{}", summary);
    println!("{}", separator);

    let shown = std::fs::canonicalize(log_path).unwrap_or_else(|_| log_path.to_path_buf());
    println!("Detailed results saved to: {}", shown.display());
}
