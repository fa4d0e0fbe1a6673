use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use codeeval::banner;
use codeeval::config::{AppConfig, BenchConfig};
use codeeval::dispatcher::Dispatcher;
use codeeval::errors::Result;
use codeeval::job::JobSettings;
use codeeval::problems::load_problems;
use codeeval::providers::{RetryingGenerator, build_provider};
use codeeval::report::{RunSummary, print_summary};
use codeeval::sandbox::Sandbox;

#[derive(Parser, Debug)]
#[clap(name = "codeeval", version, about = "Sandboxed pass@1 benchmark for generated code")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, global = true, default_value = "info", help = "Log filter, overridden by RUST_LOG")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate, execute and score every problem
    Run(RunArgs),
    /// Recompute the summary from an existing result log
    Summarize {
        #[clap(help = "JSONL result log written by `run`")]
        log: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[clap(long, short, help = "HumanEval-format JSONL problem file")]
    problems: PathBuf,

    #[clap(
        long,
        short,
        env = "CODEEVAL_MODEL",
        default_value = "openai",
        help = "Generator as provider:model (openai, ollama) or `canonical`"
    )]
    model: String,

    #[clap(long, short, help = "TOML file with run settings")]
    config: Option<PathBuf>,

    #[clap(long, short, help = "Jobs in flight at once")]
    workers: Option<usize>,

    #[clap(long, help = "Seconds before a candidate is killed")]
    timeout: Option<u64>,

    #[clap(long, short, help = "Result log path")]
    output: Option<PathBuf>,

    #[clap(long, short = 'n', help = "Only evaluate the first N problems")]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let dotenv = dotenvy::dotenv();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(cli.log_level.as_str()));
    if let Err(e) = dotenv {
        log::debug!("No .env file loaded: {}", e);
    }

    let result = match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Summarize { log } => summarize(&log),
    };

    if let Err(e) = result {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(args: RunArgs) -> Result<()> {
    banner::print_banner();

    let mut config = match &args.config {
        Some(path) => BenchConfig::from_file(path)?,
        None => BenchConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if args.limit.is_some() {
        config.limit = args.limit;
    }
    config.validate()?;

    let problems = load_problems(&args.problems, config.limit)?;
    let total = problems.len();

    let app_config = AppConfig::from_env();
    let client = reqwest::Client::new();
    let provider = build_provider(&app_config, &args.model, &client, &config.generation, &problems)?;
    let generator = RetryingGenerator::from_config(provider, &config.generation);

    let dispatcher = Dispatcher::new(
        generator,
        Sandbox::new(config.python.clone()),
        JobSettings::from(&config),
        config.workers,
    );

    println!("🚀 Starting evaluation ({} problems, {} workers)...", total, config.workers);

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Evaluating [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
            .expect("Invalid progress template")
            .progress_chars("=>-"),
    );

    let records = dispatcher
        .run(problems, &config.output, |record| {
            progress.println(format!(
                "Done {}, gen time: {}, status: {}",
                record.task_id, record.gen_time, record.status
            ));
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    let summary = RunSummary::from_records(&records?, total);
    print_summary(&summary, &config.output);
    Ok(())
}

fn summarize(log_path: &Path) -> Result<()> {
    let summary = RunSummary::from_log(log_path)?;
    print_summary(&summary, log_path);
    Ok(())
}
