//! Photo Verifier CLI - checks civic-issue photos against their reported category.
//!
//! Usage:
//!   photo-verifier verify photo.jpg --model mobilenet_v2.onnx --labels imagenet_class_index.json --category POTHOLE
//!   photo-verifier verify uploads/ --model mobilenet_v2.onnx --labels labels.txt --format json --images-only
//!   photo-verifier categories
//!   photo-verifier health --model mobilenet_v2.onnx --labels labels.txt

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verifier_core::categories::load_vocabulary;
use verifier_core::config::load_config;
use verifier_core::report::{print_results, OutputFormat};
use verifier_core::verify::{run_batch, BatchConfig, DEFAULT_CATEGORY};
use verifier_core::{CategoryVocabulary, ErrorKind, OnnxClassifier, Verifier, VerifierConfig};

#[derive(Parser)]
#[command(name = "photo-verifier")]
#[command(about = "Checks whether a photo supports the civic issue it was reported as")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify images (files or directories) against a reported category
    Verify(VerifyArgs),
    /// Print the supported categories and their keywords
    Categories {
        /// JSON file overriding the built-in category keywords
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },
    /// Load the model and report its identity
    Health(ModelArgs),
}

#[derive(Args)]
struct ModelArgs {
    /// Path to the ONNX model file
    #[arg(short, long)]
    model: PathBuf,

    /// Class labels: Keras imagenet_class_index.json or one label per line
    #[arg(short, long)]
    labels: PathBuf,

    /// Path to a verifier config JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Paths to verify (files or directories)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,

    /// Reported issue category
    #[arg(long, default_value = DEFAULT_CATEGORY)]
    category: String,

    /// Declared content type for every file (default: derived from the extension)
    #[arg(long)]
    content_type: Option<String>,

    /// JSON file overriding the built-in category keywords
    #[arg(long)]
    vocabulary: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Only verify files whose contents look like an image
    #[arg(long)]
    images_only: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "photo_verifier=info,verifier_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_verifier_config(path: Option<&Path>) -> Result<VerifierConfig> {
    match path {
        Some(p) => {
            info!("Loading verifier config from {}", p.display());
            load_config(p).with_context(|| format!("cannot load config {}", p.display()))
        }
        None => Ok(VerifierConfig::default()),
    }
}

fn load_vocab(path: Option<&Path>) -> Result<CategoryVocabulary> {
    match path {
        Some(p) => {
            info!("Loading category vocabulary from {}", p.display());
            load_vocabulary(p).with_context(|| format!("cannot load vocabulary {}", p.display()))
        }
        None => Ok(CategoryVocabulary::builtin()),
    }
}

fn build_verifier(args: &ModelArgs, vocabulary: CategoryVocabulary) -> Result<Verifier> {
    let config = load_verifier_config(args.config.as_deref())?;

    info!("Loading model from {}", args.model.display());
    let classifier = OnnxClassifier::load(&args.model, &args.labels, &config)?;

    Ok(Verifier::new(Arc::new(classifier), Arc::new(vocabulary), config)?)
}

fn verify(args: VerifyArgs) -> Result<ExitCode> {
    let vocabulary = load_vocab(args.vocabulary.as_deref())?;
    let verifier = build_verifier(&args.model, vocabulary)?;

    let batch = BatchConfig {
        target_paths: args.paths,
        category: args.category,
        content_type: args.content_type,
        images_only: args.images_only,
    };

    info!("Verifying against category {}...", batch.category);
    let entries = run_batch(&verifier, &batch);
    info!("Verified {} files", entries.len());

    if entries.is_empty() {
        info!("No files to verify.");
        return Ok(ExitCode::SUCCESS);
    }

    print_results(&entries, args.format);

    let kinds: Vec<_> = entries.iter().filter_map(|e| e.error_kind).collect();
    let code = if kinds.contains(&ErrorKind::Server) {
        ExitCode::from(1)
    } else if !kinds.is_empty() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    };
    Ok(code)
}

/// Output of `categories`; mappings are emitted in declaration order.
#[derive(Serialize)]
struct CategoriesOutput<'a> {
    categories: Vec<&'static str>,
    mappings: &'a CategoryVocabulary,
}

fn categories(vocabulary: Option<PathBuf>) -> Result<ExitCode> {
    let vocab = load_vocab(vocabulary.as_deref())?;
    let output = CategoriesOutput {
        categories: vocab.categories().iter().map(|c| c.as_str()).collect(),
        mappings: &vocab,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

fn health(args: ModelArgs) -> Result<ExitCode> {
    let verifier = build_verifier(&args, CategoryVocabulary::builtin())?;
    println!("{}", serde_json::to_string_pretty(&verifier.health())?);
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Verify(args) => verify(args),
        Command::Categories { vocabulary } => categories(vocabulary),
        Command::Health(args) => health(args),
    }
}
