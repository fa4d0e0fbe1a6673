// src/dispatcher.rs
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::errors::Result;
use crate::job::{EvaluationRecord, JobSettings, evaluate_problem};
use crate::problems::Problem;
use crate::providers::Generator;
use crate::results::ResultLog;
use crate::sandbox::Sandbox;

/// Bounded worker pool that runs one evaluation job per problem.
pub struct Dispatcher<G> {
    generator: Arc<G>,
    sandbox: Arc<Sandbox>,
    settings: Arc<JobSettings>,
    workers: usize,
}

impl<G: Generator + 'static> Dispatcher<G> {
    pub fn new(generator: G, sandbox: Sandbox, settings: JobSettings, workers: usize) -> Self {
        Self {
            generator: Arc::new(generator),
            sandbox: Arc::new(sandbox),
            settings: Arc::new(settings),
            workers: workers.max(1),
        }
    }

    /// Evaluates every problem with at most `workers` jobs in flight.
    ///
    /// Records are appended to `log_path` as they complete, in completion
    /// order, and handed to `on_record`. A job that panics is logged and
    /// skipped; a failed write to the log aborts the whole run.
    pub async fn run<F>(
        &self,
        problems: Vec<Problem>,
        log_path: &Path,
        mut on_record: F,
    ) -> Result<Vec<EvaluationRecord>>
    where
        F: FnMut(&EvaluationRecord),
    {
        let run_start = Instant::now();
        let total = problems.len();
        let mut log = ResultLog::create(log_path).await?;

        log::info!("Evaluating {} problems with {} workers", total, self.workers);

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut jobs = JoinSet::new();

        for problem in problems {
            let permits = Arc::clone(&permits);
            let generator = Arc::clone(&self.generator);
            let sandbox = Arc::clone(&self.sandbox);
            let settings = Arc::clone(&self.settings);

            jobs.spawn(async move {
                // The semaphore is never closed, so this only waits.
                let _permit = permits.acquire_owned().await.ok();
                evaluate_problem(&problem, generator.as_ref(), &sandbox, &settings).await
            });
        }

        let mut records = Vec::with_capacity(total);
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(record) => {
                    log.append(&record).await?;
                    on_record(&record);
                    records.push(record);
                }
                Err(e) => {
                    log::error!("Evaluation job failed, skipping it: {}", e);
                }
            }
        }

        log::info!(
            "Finished {} of {} problems in {}ms",
            records.len(),
            total,
            run_start.elapsed().as_millis()
        );

        Ok(records)
    }
}
