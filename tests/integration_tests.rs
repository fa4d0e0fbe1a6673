// tests/integration_tests.rs
use codeeval::config::AppConfig;
use codeeval::dispatcher::Dispatcher;
use codeeval::errors::{EvalError, Result};
use codeeval::job::{JobSettings, Verdict};
use codeeval::problems::Problem;
use codeeval::providers::{Generator, build_provider};
use codeeval::report::RunSummary;
use codeeval::results::read_log;
use codeeval::sandbox::{ExecutionOutcome, Sandbox};
use std::collections::HashMap;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const CHECK_ADD: &str = "def check(c):\n    assert c(1, 1) == 2\n    assert c(2, 3) == 5";

/// Replies from a prompt-keyed script; panics on prompts marked as poison.
#[derive(Default)]
struct Scripted {
    replies: HashMap<String, String>,
    poison: Vec<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Generator for Scripted {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.poison.iter().any(|p| p == prompt) {
            panic!("scripted generator poisoned for {prompt}");
        }
        self.replies
            .get(prompt)
            .cloned()
            .ok_or(EvalError::EmptyResponse)
    }
}

fn add_problem(id: usize) -> Problem {
    Problem {
        task_id: format!("Test/{id}"),
        prompt: format!("# problem {id}\ndef add(a, b):\n"),
        entry_point: "add".to_string(),
        test: CHECK_ADD.to_string(),
        canonical_solution: Some("    return a + b\n".to_string()),
    }
}

fn python_available() -> bool {
    let ok = Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !ok {
        eprintln!("python3 not found, skipping");
    }
    ok
}

fn settings(timeout_secs: u64) -> JobSettings {
    JobSettings {
        timeout: Duration::from_secs(timeout_secs),
        ..JobSettings::default()
    }
}

#[tokio::test]
async fn every_problem_gets_exactly_one_record() {
    if !python_available() {
        return;
    }
    let problems: Vec<Problem> = (0..5).map(add_problem).collect();
    let replies = [
        "```python\ndef add(a, b):\n    return a + b\n```",
        "def add(a, b):\n    while True: pass",
        "def add(a, b):\n    return a - b",
        "def add(a, b):\n    return undefined_name",
        "",
    ];
    let generator = Scripted {
        replies: problems
            .iter()
            .zip(replies)
            .map(|(p, r)| (p.prompt.clone(), r.to_string()))
            .collect(),
        ..Scripted::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("results.jsonl");
    let dispatcher = Dispatcher::new(generator, Sandbox::default(), settings(2), 3);

    let mut seen = Vec::new();
    let records = dispatcher
        .run(problems.clone(), &log_path, |r| seen.push(r.task_id.clone()))
        .await
        .unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(seen.len(), 5);

    let logged = read_log(&log_path).unwrap();
    assert_eq!(std::fs::read_to_string(&log_path).unwrap().lines().count(), 5);
    let status: HashMap<_, _> = logged.iter().map(|r| (r.task_id.as_str(), &r.status)).collect();

    assert_eq!(status["Test/0"], &Verdict::Executed(ExecutionOutcome::Success));
    assert_eq!(status["Test/1"], &Verdict::Executed(ExecutionOutcome::Timeout));
    assert_eq!(status["Test/2"], &Verdict::Executed(ExecutionOutcome::AssertionFailure));
    assert!(matches!(
        status["Test/3"],
        Verdict::Executed(ExecutionOutcome::RuntimeError { kind, .. }) if kind == "NameError"
    ));
    assert_eq!(status["Test/4"], &Verdict::ApiError);

    let in_memory = RunSummary::from_records(&records, problems.len());
    let from_log = RunSummary::from_log(&log_path).unwrap();
    assert_eq!(in_memory, from_log);
    assert_eq!(in_memory.passed, 1);
}

#[tokio::test]
async fn concurrency_is_bounded_by_workers() {
    let problems: Vec<Problem> = (0..12).map(add_problem).collect();
    let generator = Scripted {
        delay: Duration::from_millis(50),
        ..Scripted::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("results.jsonl");
    let dispatcher = Dispatcher::new(generator, Sandbox::default(), settings(5), 3);

    let records = dispatcher.run(problems, &log_path, |_| {}).await.unwrap();
    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|r| r.status == Verdict::ApiError));
    assert_eq!(read_log(&log_path).unwrap().len(), 12);
}

#[tokio::test]
async fn peak_in_flight_never_exceeds_limit() {
    use std::sync::Arc;

    struct Shared(Arc<Scripted>);

    impl Generator for Shared {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.0.generate(prompt).await
        }
    }

    let scripted = Arc::new(Scripted {
        delay: Duration::from_millis(30),
        ..Scripted::default()
    });
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Dispatcher::new(Shared(Arc::clone(&scripted)), Sandbox::default(), settings(5), 2);

    dispatcher
        .run((0..10).map(add_problem).collect(), &dir.path().join("r.jsonl"), |_| {})
        .await
        .unwrap();

    let peak = scripted.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak in-flight was {peak}");
}

#[tokio::test]
async fn panicking_job_is_skipped_without_stopping_others() {
    let problems: Vec<Problem> = (0..4).map(add_problem).collect();
    let generator = Scripted {
        poison: vec![problems[1].prompt.clone()],
        ..Scripted::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("results.jsonl");
    let dispatcher = Dispatcher::new(generator, Sandbox::default(), settings(5), 2);

    let records = dispatcher.run(problems, &log_path, |_| {}).await.unwrap();
    let mut ids: Vec<_> = records.iter().map(|r| r.task_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["Test/0", "Test/2", "Test/3"]);

    let summary = RunSummary::from_records(&records, 4);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.passed, 0);
}

#[tokio::test]
async fn unwritable_log_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();
    let log_path = blocker.join("results.jsonl");

    let dispatcher = Dispatcher::new(Scripted::default(), Sandbox::default(), settings(5), 2);
    let result = dispatcher.run(vec![add_problem(0)], &log_path, |_| {}).await;
    assert!(matches!(result, Err(EvalError::ResultLog { .. })));
}

#[tokio::test]
async fn canonical_solutions_pass_end_to_end() {
    if !python_available() {
        return;
    }
    let problems: Vec<Problem> = (0..3).map(add_problem).collect();
    let provider = build_provider(
        &AppConfig::default(),
        "canonical",
        &reqwest::Client::new(),
        &Default::default(),
        &problems,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("results.jsonl");
    let dispatcher = Dispatcher::new(provider, Sandbox::default(), settings(10), 2);

    let records = dispatcher.run(problems, &log_path, |_| {}).await.unwrap();
    let summary = RunSummary::from_records(&records, 3);
    assert_eq!(summary.passed, 3, "records: {records:#?}");
    assert!(records.iter().all(|r| r.gen_time.ends_with('s')));
}
