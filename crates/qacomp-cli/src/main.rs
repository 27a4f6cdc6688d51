//! qacomp CLI: compare two systems' answers to the same questions.

mod commands;
mod input;
mod report;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pairwise LLM grading of question-answering outputs
#[derive(Parser, Debug)]
#[command(name = "qacomp", version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Grade predictions A and B against the examples
    Compare(CompareArgs),

    /// Check that a prompt template is usable for comparison
    CheckPrompt {
        /// YAML prompt template
        path: PathBuf,
    },

    /// List available LLM providers
    Providers,
}

#[derive(clap::Args, Debug)]
struct CompareArgs {
    /// Examples (JSON array or JSON Lines)
    #[arg(long)]
    examples: PathBuf,

    /// Predictions from system A
    #[arg(long)]
    predictions_a: PathBuf,

    /// Predictions from system B
    #[arg(long)]
    predictions_b: PathBuf,

    /// Runtime configuration (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prompt template (YAML); defaults to the built-in comparison prompt
    #[arg(short, long)]
    prompt: Option<PathBuf>,

    /// Override the provider from the config
    #[arg(long)]
    provider: Option<String>,

    /// Override the model from the config
    #[arg(short, long)]
    model: Option<String>,

    #[arg(long)]
    question_key: Option<String>,

    #[arg(long)]
    answer_key: Option<String>,

    #[arg(long)]
    prediction_key: Option<String>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compare(args) => commands::compare(args).await,
        Commands::CheckPrompt { path } => commands::check_prompt(&path),
        Commands::Providers => commands::providers(),
    }
}
