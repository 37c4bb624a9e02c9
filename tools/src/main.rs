//! CLI for offline work with the PhishGuard model.
//!
//! Subcommands:
//!   init      -- Write a randomly initialised weights file
//!   score     -- Print the phishing probability for each URL argument
//!   evaluate  -- Score a labelled CSV and report classification metrics

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use phishguard_core::ModelConfig;
use phishguard_model::{Device, PhishDetector, UrlTransformer, DEFAULT_VOCAB_SIZE};
use phishguard_tools::{dataset, run_evaluation};

#[derive(Parser)]
#[command(name = "phishguard", about = "PhishGuard model utilities")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write freshly initialised model weights.
    Init {
        /// Output path for the safetensors file.
        #[arg(long)]
        output: PathBuf,

        /// Rows in the embedding table.
        #[arg(long, default_value_t = DEFAULT_VOCAB_SIZE)]
        vocab_size: usize,
    },

    /// Score one or more URLs.
    Score {
        /// Path to model weights.
        #[arg(long)]
        weights: String,

        /// Rows in the embedding table.
        #[arg(long, default_value_t = DEFAULT_VOCAB_SIZE)]
        vocab_size: usize,

        /// URLs to score.
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Evaluate the model on a labelled `URL,label` CSV.
    Evaluate {
        /// Path to model weights.
        #[arg(long)]
        weights: String,

        /// Labelled dataset.
        #[arg(long)]
        csv: PathBuf,

        /// Rows in the embedding table.
        #[arg(long, default_value_t = DEFAULT_VOCAB_SIZE)]
        vocab_size: usize,

        /// Scores above this count as phishing.
        #[arg(long, default_value = "0.5")]
        threshold: f64,

        /// URLs per forward pass.
        #[arg(long, default_value = "256")]
        batch_size: usize,

        /// Print metrics as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn load_detector(weights: String, vocab_size: usize) -> anyhow::Result<PhishDetector> {
    let config = ModelConfig {
        weights_path: Some(weights),
        vocab_size,
        ..ModelConfig::default()
    };
    Ok(PhishDetector::load(&config, &Device::Cpu)?)
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init { output, vocab_size } => {
            UrlTransformer::new_random(vocab_size, &Device::Cpu)?.save(&output)?;
            println!("Wrote random weights to {}", output.display());
        }
        Command::Score {
            weights,
            vocab_size,
            urls,
        } => {
            let detector = load_detector(weights, vocab_size)?;
            let scores = detector.classify_batch(&urls)?;
            for (url, score) in urls.iter().zip(scores) {
                println!("{score:.6}\t{url}");
            }
        }
        Command::Evaluate {
            weights,
            csv,
            vocab_size,
            threshold,
            batch_size,
            json,
        } => {
            let detector = load_detector(weights, vocab_size)?;
            let rows = dataset::load_csv(&csv)?;
            tracing::info!(rows = rows.len(), path = %csv.display(), "Loaded dataset");

            let metrics = run_evaluation(&detector, &rows, batch_size, threshold)
                .context("evaluation failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!("{} URLs: {metrics}", rows.len());
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
