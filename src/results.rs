// src/results.rs
//! JSON Lines result log: one `EvaluationRecord` per line, in completion order.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::errors::{EvalError, Result};
use crate::job::EvaluationRecord;

/// Append-only writer. Each record is flushed before `append` returns.
pub struct ResultLog {
    path: PathBuf,
    file: tokio::fs::File,
}

impl ResultLog {
    /// Creates the log, truncating any previous run and creating parent directories.
    pub async fn create(path: &Path) -> Result<Self> {
        let wrap = |source| EvalError::ResultLog { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(wrap)?;
        }
        let file = tokio::fs::File::create(path).await.map_err(wrap)?;

        Ok(Self { path: path.to_path_buf(), file })
    }

    pub async fn append(&mut self, record: &EvaluationRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = &self.path;
        let wrap = |source| EvalError::ResultLog { path: path.clone(), source };
        self.file.write_all(line.as_bytes()).await.map_err(wrap)?;
        self.file.flush().await.map_err(wrap)?;
        Ok(())
    }
}

/// Orders `HumanEval/2` before `HumanEval/10`.
pub fn compare_task_ids(a: &str, b: &str) -> Ordering {
    fn key(id: &str) -> (&str, Option<u64>) {
        match id.rsplit_once('/') {
            Some((prefix, n)) => match n.parse() {
                Ok(n) => (prefix, Some(n)),
                Err(_) => (id, None),
            },
            None => (id, None),
        }
    }
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// Reads every record from a log, keeping the last record per task and
/// returning them in task order.
pub fn read_log(path: &Path) -> Result<Vec<EvaluationRecord>> {
    let text = std::fs::read_to_string(path)?;
    parse_log(&text)
}

pub fn parse_log(text: &str) -> Result<Vec<EvaluationRecord>> {
    let mut by_task: HashMap<String, EvaluationRecord> = HashMap::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: EvaluationRecord = serde_json::from_str(line)
            .map_err(|source| EvalError::LogParse { line: idx + 1, source })?;
        by_task.insert(record.task_id.clone(), record);
    }

    let mut records: Vec<_> = by_task.into_values().collect();
    records.sort_by(|a, b| compare_task_ids(&a.task_id, &b.task_id));
    Ok(records)
}
