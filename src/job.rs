// src/job.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use crate::config::{BenchConfig, DEFAULT_HEADER};
use crate::errors::EvalError;
use crate::extract::extract_code;
use crate::problems::Problem;
use crate::providers::Generator;
use crate::sandbox::{ExecutionOutcome, Sandbox};

/// What gets recorded for one problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Verdict {
    /// The candidate reached the sandbox.
    Executed(ExecutionOutcome),
    /// Generation produced nothing to run.
    ApiError,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Executed(ExecutionOutcome::Success))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Executed(ExecutionOutcome::Success) => write!(f, "Passed"),
            Verdict::Executed(ExecutionOutcome::AssertionFailure) => write!(f, "Failed: Assertion Error"),
            Verdict::Executed(ExecutionOutcome::RuntimeError { kind, message }) => {
                write!(f, "Failed: {}: {}", kind, message)
            }
            Verdict::Executed(ExecutionOutcome::Timeout) => write!(f, "Timeout"),
            Verdict::Executed(ExecutionOutcome::ProcessCrash) => write!(f, "Failed: Unknown Error"),
            Verdict::ApiError => write!(f, "API_Error"),
        }
    }
}

impl FromStr for Verdict {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let outcome = match s {
            "Passed" => ExecutionOutcome::Success,
            "Timeout" => ExecutionOutcome::Timeout,
            "API_Error" => return Ok(Verdict::ApiError),
            "Failed: Assertion Error" => ExecutionOutcome::AssertionFailure,
            "Failed: Unknown Error" => ExecutionOutcome::ProcessCrash,
            other => {
                let detail = other
                    .strip_prefix("Failed: ")
                    .ok_or_else(|| EvalError::InvalidStatus(s.to_string()))?;
                let (kind, message) = detail.split_once(": ").unwrap_or((detail, ""));
                ExecutionOutcome::RuntimeError {
                    kind: kind.to_string(),
                    message: message.to_string(),
                }
            }
        };
        Ok(Verdict::Executed(outcome))
    }
}

impl From<Verdict> for String {
    fn from(verdict: Verdict) -> Self {
        verdict.to_string()
    }
}

impl TryFrom<String> for Verdict {
    type Error = EvalError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One line of the result log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub task_id: String,
    pub prompt: String,
    /// Raw generator output.
    pub completion: String,
    /// Code pulled out of `completion`.
    pub clean_code: String,
    /// Body handed to the sandbox, before header and tests are attached.
    #[serde(default)]
    pub final_code: String,
    pub status: Verdict,
    /// Generation latency, e.g. `"1.23s"`.
    pub gen_time: String,
}

/// Complete program text for one sandboxed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateProgram(String);

impl CandidateProgram {
    /// `header + code + "\n" + test_code + "\n" + "\ncheck(<entry_point>)"`.
    /// Purely textual; nothing is parsed or validated here.
    pub fn compose(header: &str, code: &str, test_code: &str, entry_point: &str) -> Self {
        let trigger = format!("\ncheck({})", entry_point);
        CandidateProgram(format!("{}{}\n{}\n{}", header, code, test_code, trigger))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Does `code` define `entry_point` itself?
///
/// Matches a `def` (optionally `async def`) line for exactly that name, with
/// any indentation or spacing before the parenthesis. A name that merely
/// starts with `entry_point` does not count.
pub fn declares_entry_point(code: &str, entry_point: &str) -> bool {
    static DEF_LINE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+(\w+)[ \t]*\(").expect("valid def line regex")
    });
    DEF_LINE
        .captures_iter(code)
        .any(|caps| &caps[1] == entry_point)
}

/// The parts of the run configuration a single job needs.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub header: String,
    pub timeout: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&BenchConfig> for JobSettings {
    fn from(config: &BenchConfig) -> Self {
        Self {
            header: config.header.clone(),
            timeout: config.timeout(),
        }
    }
}

fn format_gen_time(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

/// Generate, extract, execute and classify one problem.
///
/// Never fails: every per-problem failure ends up as the record's verdict.
pub async fn evaluate_problem<G: Generator>(
    problem: &Problem,
    generator: &G,
    sandbox: &Sandbox,
    settings: &JobSettings,
) -> EvaluationRecord {
    let gen_start = Instant::now();
    let completion = match generator.generate(&problem.prompt).await {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Generation for {} failed: {}", problem.task_id, e);
            String::new()
        }
    };
    let gen_time = gen_start.elapsed();

    let clean_code = extract_code(&completion);

    if clean_code.trim().is_empty() {
        log::warn!("{}: nothing to evaluate, recording API_Error", problem.task_id);
        return EvaluationRecord {
            task_id: problem.task_id.clone(),
            prompt: problem.prompt.clone(),
            completion,
            clean_code,
            final_code: String::new(),
            status: Verdict::ApiError,
            gen_time: format_gen_time(Duration::ZERO),
        };
    }

    let final_code = if declares_entry_point(&clean_code, &problem.entry_point) {
        clean_code.clone()
    } else {
        log::debug!(
            "{}: candidate does not define {}, appending it to the prompt",
            problem.task_id,
            problem.entry_point
        );
        format!("{}\n{}", problem.prompt, clean_code)
    };

    let program = CandidateProgram::compose(
        &settings.header,
        &final_code,
        &problem.test,
        &problem.entry_point,
    );

    let outcome = match sandbox.run(program.as_str(), settings.timeout).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("{}: sandbox could not run candidate: {}", problem.task_id, e);
            ExecutionOutcome::ProcessCrash
        }
    };

    EvaluationRecord {
        task_id: problem.task_id.clone(),
        prompt: problem.prompt.clone(),
        completion,
        clean_code,
        final_code,
        status: Verdict::Executed(outcome),
        gen_time: format_gen_time(gen_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;

    struct Fixed(&'static str);

    impl Generator for Fixed {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl Generator for Failing {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(EvalError::EmptyResponse)
        }
    }

    fn add_problem() -> Problem {
        Problem {
            task_id: "Test/0".to_string(),
            prompt: "def add(a, b):\n    \"\"\"Add two numbers.\"\"\"\n".to_string(),
            entry_point: "add".to_string(),
            test: "def check(c):\n    assert c(1, 1) == 2\n    assert c(2, 3) == 5".to_string(),
            canonical_solution: None,
        }
    }

    fn unreachable_sandbox() -> Sandbox {
        Sandbox::new("/nonexistent/python-interpreter")
    }

    #[test]
    fn verdict_strings_round_trip() {
        let verdicts = [
            Verdict::Executed(ExecutionOutcome::Success),
            Verdict::Executed(ExecutionOutcome::AssertionFailure),
            Verdict::Executed(ExecutionOutcome::RuntimeError {
                kind: "TypeError".into(),
                message: "unsupported operand type(s) for +: 'int' and 'str'".into(),
            }),
            Verdict::Executed(ExecutionOutcome::RuntimeError {
                kind: "StopIteration".into(),
                message: String::new(),
            }),
            Verdict::Executed(ExecutionOutcome::Timeout),
            Verdict::Executed(ExecutionOutcome::ProcessCrash),
            Verdict::ApiError,
        ];
        for verdict in verdicts {
            let text = verdict.to_string();
            assert_eq!(text.parse::<Verdict>().unwrap(), verdict, "text: {text}");
        }
    }

    #[test]
    fn verdict_wire_strings() {
        assert_eq!(Verdict::Executed(ExecutionOutcome::Success).to_string(), "Passed");
        assert_eq!(Verdict::ApiError.to_string(), "API_Error");
        assert_eq!(
            Verdict::Executed(ExecutionOutcome::RuntimeError {
                kind: "NameError".into(),
                message: "name 'x' is not defined".into()
            })
            .to_string(),
            "Failed: NameError: name 'x' is not defined"
        );
        assert!(matches!("Passd".parse::<Verdict>(), Err(EvalError::InvalidStatus(_))));
    }

    #[test]
    fn record_serializes_status_as_string() {
        let record = EvaluationRecord {
            task_id: "HumanEval/3".into(),
            prompt: "p".into(),
            completion: "c".into(),
            clean_code: "c".into(),
            final_code: "c".into(),
            status: Verdict::Executed(ExecutionOutcome::Timeout),
            gen_time: "1.23s".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "Timeout");
        assert_eq!(json["gen_time"], "1.23s");
        let back: EvaluationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn program_is_plain_concatenation() {
        let program = CandidateProgram::compose("import math\n\n", "def add(a, b):\n    return a + b", "def check(c):\n    pass", "add");
        assert_eq!(
            program.as_str(),
            "import math\n\ndef add(a, b):\n    return a + b\ndef check(c):\n    pass\n\ncheck(add)"
        );
    }

    #[test]
    fn entry_point_detection() {
        assert!(declares_entry_point("def add(a, b):\n    return a + b", "add"));
        assert!(declares_entry_point("import math\n\ndef  add (a, b):\n    pass", "add"));
        assert!(declares_entry_point("class X:\n    def add(self):\n        pass", "add"));
        assert!(declares_entry_point("async def add():\n    pass", "add"));
        assert!(!declares_entry_point("def add_all(xs):\n    pass", "add"));
        assert!(!declares_entry_point("return a + b", "add"));
        assert!(!declares_entry_point("# def add(a, b):", "add"));
        assert!(!declares_entry_point("def add(a, b):\n    pass", "a.d"));
        assert!(declares_entry_point("def helper():\n    pass\ndef add(a, b):\n    pass", "add"));
    }

    #[tokio::test]
    async fn empty_completion_skips_sandbox() {
        // The sandbox interpreter does not exist, so reaching it would record a crash.
        let record = evaluate_problem(&add_problem(), &Fixed("   \n"), &unreachable_sandbox(), &JobSettings::default()).await;
        assert_eq!(record.status, Verdict::ApiError);
        assert_eq!(record.gen_time, "0.00s");
        assert!(record.final_code.is_empty());
    }

    #[tokio::test]
    async fn generation_error_is_api_error() {
        let record = evaluate_problem(&add_problem(), &Failing, &unreachable_sandbox(), &JobSettings::default()).await;
        assert_eq!(record.status, Verdict::ApiError);
        assert!(record.completion.is_empty());
    }

    #[tokio::test]
    async fn bare_body_is_appended_to_prompt() {
        let problem = add_problem();
        let record = evaluate_problem(&problem, &Fixed("```python\n    return a + b\n```"), &unreachable_sandbox(), &JobSettings::default()).await;
        assert_eq!(record.clean_code, "return a + b");
        assert_eq!(record.final_code, format!("{}\nreturn a + b", problem.prompt));
    }

    #[tokio::test]
    async fn sandbox_failure_is_recorded_as_crash() {
        let record = evaluate_problem(&add_problem(), &Fixed("def add(a, b):\n    return a + b"), &unreachable_sandbox(), &JobSettings::default()).await;
        assert_eq!(record.final_code, "def add(a, b):\n    return a + b");
        assert_eq!(record.status, Verdict::Executed(ExecutionOutcome::ProcessCrash));
    }
}
