//! preform CLI - preference dataset formatting and fine-tuning job submission.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use preform::models::TrainingMethod;
use preform::{Config, FineTuneClient, FormatPipeline, JobRequest};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "preform")]
#[command(author = "Infernet <dev@infernet.org>")]
#[command(version)]
#[command(about = "Format preference datasets and submit DPO/SFT fine-tuning jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Format the configured dataset splits into preference and SFT JSONL files
    Format,

    /// Validate and upload the formatted files, printing their file ids
    Upload,

    /// Create a fine-tuning job from uploaded file ids
    Train {
        /// Training file id returned by upload
        #[arg(long)]
        training_file: String,

        /// Validation file id returned by upload
        #[arg(long)]
        validation_file: Option<String>,

        /// Start from a prior fine-tuned model or checkpoint instead of the
        /// configured base model
        #[arg(long)]
        from: Option<String>,

        /// Poll until the job reaches a terminal status
        #[arg(long)]
        wait: bool,
    },

    /// Show the status of a fine-tuning job
    Status {
        /// Job id
        #[arg(long)]
        job: String,

        /// Poll until the job reaches a terminal status
        #[arg(long)]
        wait: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# preform configuration file

[api]
# API key (can also use OPENAI_API_KEY env var)
# api_key = "sk-..."
base_url = "https://api.openai.com/v1"
timeout_secs = 180
max_retries = 3

[dataset]
train = "data/train.jsonl"
validation = "data/validation.jsonl"

[output]
dir = "output"

[format]
# Reject records with an empty prompt
strict = false

[training]
base_model = "gpt-4o-mini-2024-07-18"
method = "dpo"          # "dpo" or "supervised"
beta = 0.1              # DPO conservativeness
n_epochs = 1
# learning_rate_multiplier = 1.0
# suffix = "preform"
poll_interval_secs = 30
"#;
    println!("{example}");
}

fn load_config(path: &PathBuf) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

fn build_client(config: &Config) -> Result<FineTuneClient> {
    let api_key = config
        .resolve_api_key()
        .context("Failed to resolve API key")?;

    FineTuneClient::new(
        api_key,
        Some(config.api.base_url.clone()),
        Some(config.api.timeout_secs),
        Some(config.api.max_retries),
    )
    .context("Failed to build client")
}

fn print_job(job: &preform::FineTuneJob) {
    println!("\n=== Fine-Tuning Job ===");
    println!("Id:          {}", job.id);
    println!("Model:       {}", job.model);
    println!("Status:      {:?}", job.status);
    if let Some(tuned) = &job.fine_tuned_model {
        println!("Result:      {tuned}");
    }
    if let Some(tokens) = job.trained_tokens {
        println!("Tokens:      {tokens}");
    }
    if let Some(error) = &job.error {
        println!(
            "Error:       {} ({})",
            error.message.as_deref().unwrap_or("unknown"),
            error.code.as_deref().unwrap_or("-")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;

            config
                .resolve_api_key()
                .context("Failed to resolve API key")?;

            info!("Configuration is valid");
            info!("  Dataset: {:?} / {:?}", config.dataset.train, config.dataset.validation);
            info!("  Output:  {:?}", config.output.dir);
            info!(
                "  Training: {:?} on {} (beta {})",
                config.training.method, config.training.base_model, config.training.beta
            );
            return Ok(());
        }

        Commands::Format => {
            let config = load_config(&cli.config)?;

            let pipeline = FormatPipeline::new(&config);
            let stats = pipeline.run()?;

            println!("\n=== Format Complete ===");
            println!(
                "Train:       {} examples -> {} preference, {} sft ({} skipped)",
                stats.train.raw_examples,
                stats.train.preference_written,
                stats.train.supervised_written,
                stats.train.supervised_failed
            );
            println!(
                "Validation:  {} examples -> {} preference, {} sft ({} skipped)",
                stats.validation.raw_examples,
                stats.validation.preference_written,
                stats.validation.supervised_written,
                stats.validation.supervised_failed
            );
            println!("Runtime:     {:.1}s", stats.runtime_secs);
            println!("Output:      {:?}", config.output.dir);
        }

        Commands::Upload => {
            let config = load_config(&cli.config)?;
            let client = build_client(&config)?;

            let pipeline = FormatPipeline::new(&config);

            let mut uploads = Vec::new();
            for path in pipeline.output_files() {
                let records = preform::dataset::count_jsonl_records(&path)
                    .with_context(|| format!("Pre-upload validation failed for {path:?}"))?;

                let uploaded = client
                    .upload_file(&path)
                    .await
                    .with_context(|| format!("Upload failed for {path:?}"))?;

                uploads.push((uploaded, records));
            }

            println!("\n=== Upload Complete ===");
            for (uploaded, records) in &uploads {
                println!(
                    "{}:  {} ({} records, {} bytes)",
                    uploaded.filename, uploaded.id, records, uploaded.bytes
                );
            }
        }

        Commands::Train {
            training_file,
            validation_file,
            from,
            wait,
        } => {
            let config = load_config(&cli.config)?;
            let client = build_client(&config)?;

            // A prior fine-tuned model or checkpoint id chains this job onto
            // an earlier run.
            let model = from.unwrap_or_else(|| config.training.base_model.clone());
            if config.training.method == TrainingMethod::Dpo {
                info!(beta = config.training.beta, "Creating DPO job");
            }

            let request = JobRequest::from_training(
                &config.training,
                model,
                training_file,
                validation_file,
            );

            let job = client.create_job(&request).await?;
            print_job(&job);

            if wait {
                let interval = Duration::from_secs(config.training.poll_interval_secs);
                let finished = client.wait_for_job(&job.id, interval).await?;
                print_job(&finished);
            }
        }

        Commands::Status { job, wait } => {
            let config = load_config(&cli.config)?;
            let client = build_client(&config)?;

            if wait {
                let interval = Duration::from_secs(config.training.poll_interval_secs);
                let finished = client.wait_for_job(&job, interval).await?;
                print_job(&finished);
            } else {
                let job = client.retrieve_job(&job).await?;
                print_job(&job);
            }
        }
    }

    Ok(())
}
