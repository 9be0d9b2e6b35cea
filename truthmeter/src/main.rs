//! TruthMeter CLI

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use truthmeter::{
    config::{Config, Credentials},
    evaluation::EvaluationRequest,
    judge::{prompt, JudgeInfo},
    reporting::{print_console_report, print_evaluation, print_judge_info, EvaluationRecord, ResultsFile},
    runner::Evaluator,
};

#[derive(Parser)]
#[command(name = "truthmeter")]
#[command(about = "Evaluate LLM answers to educational questions against reference answers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one provider a question and judge the answer
    Evaluate {
        /// Question text
        #[arg(short, long)]
        question: String,

        /// Expert reference answer
        #[arg(short, long)]
        reference: String,

        /// Provider: openai, google, anthropic, meta, deepseek
        #[arg(short, long)]
        provider: String,

        /// Model id, or "auto" for the provider default
        #[arg(short, long, default_value = "auto")]
        model: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate every entry of a JSON file
    Batch {
        /// JSON array of {question_id?, question_text, reference_answer, provider, model_name?}
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent evaluations (overrides config)
        #[arg(long)]
        parallel: Option<usize>,
    },

    /// Show judge metadata and readiness
    JudgeInfo,

    /// Print the judge prompt for the given inputs
    DumpPrompt {
        #[arg(short, long)]
        question: String,

        #[arg(short, long)]
        reference: String,

        /// Candidate answer to grade
        #[arg(short, long)]
        candidate: String,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/truthmeter.toml")]
        output: PathBuf,
    },
}

/// One row of a batch input file
#[derive(Debug, Deserialize)]
struct BatchEntry {
    #[serde(default)]
    question_id: Option<u64>,
    question_text: String,
    reference_answer: String,
    provider: String,
    #[serde(default)]
    model_name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("truthmeter=debug,info")
    } else {
        EnvFilter::new("truthmeter=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::Evaluate {
            question,
            reference,
            provider,
            model,
            json,
        } => {
            evaluate(&config, &question, &reference, &provider, &model, json).await?;
        }

        Commands::Batch {
            input,
            output,
            parallel,
        } => {
            run_batch(config, input, output, parallel).await?;
        }

        Commands::JudgeInfo => {
            judge_info(&config)?;
        }

        Commands::DumpPrompt {
            question,
            reference,
            candidate,
        } => {
            println!("{}", prompt::build(&question, &reference, &candidate));
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

/// Cancel in-flight calls on Ctrl-C
fn cancel_on_interrupt(evaluator: &Evaluator) {
    let token = evaluator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding requests");
            token.cancel();
        }
    });
}

async fn evaluate(
    config: &Config,
    question: &str,
    reference: &str,
    provider: &str,
    model: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = Credentials::from_env(config);
    let evaluator = Evaluator::new(config, &credentials);
    cancel_on_interrupt(&evaluator);

    let result = evaluator.evaluate(question, reference, provider, model).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_evaluation(&result);
    }
    Ok(())
}

async fn run_batch(
    mut config: Config,
    input: PathBuf,
    output: Option<PathBuf>,
    parallel: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let started_at = Utc::now();
    let run_id = started_at.format("%Y%m%d-%H%M%S").to_string();

    if let Some(parallel) = parallel {
        config.runner.parallel_requests = parallel.max(1);
    }

    let entries: Vec<BatchEntry> = serde_json::from_str(&std::fs::read_to_string(&input)?)?;

    // Invalid rows are reported and skipped; the rest still run
    let mut question_ids = Vec::new();
    let mut requests = Vec::new();
    for (i, entry) in entries.into_iter().enumerate() {
        match EvaluationRequest::new(
            entry.question_text,
            entry.reference_answer,
            &entry.provider,
            entry.model_name,
        ) {
            Ok(request) => {
                question_ids.push(entry.question_id);
                requests.push(request);
            }
            Err(e) => eprintln!("Skipping entry {}: {}", i + 1, e),
        }
    }

    if requests.is_empty() {
        eprintln!("Error: No valid entries in {}", input.display());
        std::process::exit(1);
    }

    println!("=== TruthMeter Batch ===");
    println!("Run ID:      {}", run_id);
    println!("Evaluations: {}", requests.len());
    println!("Parallel:    {}", config.runner.parallel_requests);

    let credentials = Credentials::from_env(&config);
    let configured = credentials.configured();
    if configured.is_empty() {
        eprintln!("Warning: no API keys set; every evaluation will score 0");
    } else {
        println!("Keys:        {}", configured.join(", "));
    }

    let evaluator = Evaluator::new(&config, &credentials);
    cancel_on_interrupt(&evaluator);

    let results = evaluator.evaluate_batch(requests).await;
    let records: Vec<EvaluationRecord> = results
        .iter()
        .zip(question_ids)
        .map(|(result, question_id)| result.to_record(question_id))
        .collect();

    print_console_report(&records);

    let output = output.unwrap_or_else(|| PathBuf::from(format!("results/{}.json", run_id)));
    ResultsFile::new(&run_id, &evaluator.judge().info(), records).write_to_file(&output)?;
    println!("Results written to: {}", output.display());

    let elapsed = Utc::now() - started_at;
    println!("Completed in {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    Ok(())
}

fn judge_info(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = Credentials::from_env(config);
    let evaluator = Evaluator::new(config, &credentials);
    let info: JudgeInfo = evaluator.judge().info();
    print_judge_info(&info);

    let health = evaluator.judge().health();
    println!("\nStatus: {} (engine {})", health.status, config.judge.engine_model);
    if !health.ready {
        println!("Set {} to enable judging.", config.judge.api_key_env);
    }
    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    Config::sample().save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
