//! SignAura NMF Trainer CLI
//!
//! `train` runs the full pipeline; `predict` scores one feature vector
//! with an exported bundle.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use signaura_nmf_core::{ModelBundle, FEATURE_DIM};
use signaura_nmf_trainer::{pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "nmf-train")]
#[command(author = "SignAura Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Trainer for the SignAura non-manual-feature classifier", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train, evaluate and export a classifier
    Train(TrainArgs),
    /// Predict the label of one feature vector with an exported bundle
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV dataset path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory for the artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Classical model: random_forest or logistic
    #[arg(long)]
    model_type: Option<String>,

    /// Fraction of each class held out for testing
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the neural network
    #[arg(long)]
    no_neural: bool,

    /// Write the effective configuration to this file
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Exported model bundle
    #[arg(short, long, default_value = "nmf_classifier.bin")]
    model: PathBuf,

    /// Comma-separated feature values in column order
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    features: Vec<f32>,

    /// Print the prediction as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    info!("SignAura NMF Trainer v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════");

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path).context("Failed to load configuration")?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid NMF_* environment override")?;

    if let Some(input) = args.input {
        config.dataset_path = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(model_type) = args.model_type {
        config.model_type = model_type;
    }
    if let Some(fraction) = args.test_fraction {
        config.test_fraction = fraction;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.no_neural {
        config.neural.enabled = false;
    }

    if let Some(path) = &args.dump_config {
        config
            .save_to_file(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Effective configuration written to {}", path.display());
    }

    let outcome = pipeline::run(&config).context("Training failed")?;

    info!("═══════════════════════════════════════════");
    info!("Training complete!");
    info!("  Samples: {}", outcome.samples);
    info!("  Accuracy: {:.2}%", outcome.report.accuracy * 100.0);
    if let Some(neural) = &outcome.neural {
        info!("  Neural accuracy: {:.2}%", neural.test_accuracy * 100.0);
    }
    info!("  Bundle: {}", outcome.artifacts.bundle.display());
    info!("  Label mapping: {}", outcome.artifacts.label_mapping.display());

    Ok(())
}

fn predict(args: PredictArgs) -> Result<()> {
    if args.features.len() != FEATURE_DIM {
        bail!(
            "expected {} feature values, got {}",
            FEATURE_DIM,
            args.features.len()
        );
    }

    let bundle = ModelBundle::load(&args.model)
        .with_context(|| format!("Failed to load {}", args.model.display()))?;
    let prediction = bundle.predict_label(&args.features)?;

    if args.json {
        let probabilities: serde_json::Map<String, serde_json::Value> = bundle
            .codec()
            .classes()
            .iter()
            .zip(&prediction.probabilities)
            .map(|(label, &p)| (label.clone(), serde_json::json!(p)))
            .collect();
        let out = serde_json::json!({
            "label": prediction.label,
            "index": prediction.index,
            "probabilities": probabilities,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", prediction.label);
    for (label, p) in bundle.codec().classes().iter().zip(&prediction.probabilities) {
        println!("  {:<16} {:.4}", label, p);
    }
    Ok(())
}
