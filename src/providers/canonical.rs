// src/providers/canonical.rs

use std::collections::HashMap;

use crate::errors::{EvalError, Result};
use crate::problems::Problem;
use crate::providers::Generator;

/// Answers every prompt with the dataset's own reference solution.
///
/// Useful as a dry run: a healthy harness should score close to 100% with it,
/// and it needs no network access.
pub struct CanonicalProvider {
    solutions: HashMap<String, String>,
}

impl CanonicalProvider {
    pub fn from_problems(problems: &[Problem]) -> Self {
        let solutions = problems
            .iter()
            .filter_map(|p| {
                p.canonical_solution
                    .as_ref()
                    .map(|body| (p.prompt.clone(), format!("{}{}", p.prompt, body)))
            })
            .collect();
        Self { solutions }
    }
}

impl Generator for CanonicalProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.solutions
            .get(prompt)
            .cloned()
            .ok_or_else(|| EvalError::UnexpectedResponse("No canonical solution for prompt".to_string()))
    }
}
