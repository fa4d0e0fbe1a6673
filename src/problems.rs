// src/problems.rs
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{EvalError, Result};

/// One benchmark item in HumanEval layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// e.g. `HumanEval/0`
    pub task_id: String,
    /// Signature plus docstring shown to the model.
    pub prompt: String,
    /// Name of the function the test harness calls.
    pub entry_point: String,
    /// Hidden tests; defines `check(candidate)`.
    pub test: String,
    /// Reference body, when the dataset ships one.
    #[serde(default)]
    pub canonical_solution: Option<String>,
}

/// Parses a JSON Lines document of problems, keeping file order.
pub fn parse_problems(text: &str) -> Result<Vec<Problem>> {
    let mut problems = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let problem = serde_json::from_str(line)
            .map_err(|source| EvalError::ProblemParse { line: idx + 1, source })?;
        problems.push(problem);
    }
    Ok(problems)
}

/// Loads problems from disk, optionally keeping only the first `limit`.
pub fn load_problems(path: &Path, limit: Option<usize>) -> Result<Vec<Problem>> {
    log::info!("Loading problems from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let mut problems = parse_problems(&text)?;

    if let Some(limit) = limit {
        if limit < problems.len() {
            log::warn!("Test mode: only the first {} of {} problems will run", limit, problems.len());
            problems.truncate(limit);
        }
    }

    log::info!("Loaded {} problems", problems.len());
    Ok(problems)
}
