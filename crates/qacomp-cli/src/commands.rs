//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use qacomp_core::{validate_comparison_prompt, PromptTemplate};
use qacomp_runtime::providers::{LlmProvider, ProviderRegistry};
use qacomp_runtime::{QaCompChain, RuntimeConfig};

use crate::input::load_records;
use crate::report::ComparisonReport;
use crate::CompareArgs;

fn load_config(args: &CompareArgs) -> Result<RuntimeConfig> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    if let Some(provider) = &args.provider {
        config.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.completion.model = model.clone();
    }
    if let Some(key) = &args.question_key {
        config.keys.question_key = key.clone();
    }
    if let Some(key) = &args.answer_key {
        config.keys.answer_key = key.clone();
    }
    if let Some(key) = &args.prediction_key {
        config.keys.prediction_key = key.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Refuse to start a batch against a provider that reports itself unusable.
async fn ensure_healthy(llm: &dyn LlmProvider) -> Result<()> {
    if !llm.health_check().await {
        bail!("Provider '{}' failed its health check", llm.name());
    }
    tracing::debug!(provider = llm.name(), "Provider health check passed");
    Ok(())
}

pub async fn compare(args: CompareArgs) -> Result<()> {
    let config = load_config(&args)?;

    let prompt = args
        .prompt
        .as_deref()
        .map(PromptTemplate::from_yaml_file)
        .transpose()
        .context("Failed to load prompt template")?;

    let llm = ProviderRegistry::with_defaults().create(&config.provider, &config.provider_config)?;
    ensure_healthy(llm.as_ref()).await?;
    let chain = QaCompChain::from_llm(llm, prompt, config.chain_options()?)?;

    let examples = load_records(&args.examples)?;
    let predictions_a = load_records(&args.predictions_a)?;
    let predictions_b = load_records(&args.predictions_b)?;
    tracing::info!(
        examples = examples.len(),
        predictions_a = predictions_a.len(),
        predictions_b = predictions_b.len(),
        provider = %config.provider,
        model = %config.completion.model,
        "Starting comparison"
    );

    let results = chain
        .evaluate(&examples, &predictions_a, &predictions_b, &config.keys)
        .await?;

    let report = ComparisonReport::new(
        &config.provider,
        &config.completion.model,
        &config.output_key,
        results,
    );
    tracing::info!(
        student_a = report.preferences.student_a,
        student_b = report.preferences.student_b,
        tie = report.preferences.tie,
        unparsed = report.preferences.unparsed,
        "Comparison finished"
    );

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

pub fn check_prompt(path: &Path) -> Result<()> {
    let prompt = PromptTemplate::from_yaml_file(path)
        .with_context(|| format!("Failed to load prompt template {}", path.display()))?;
    validate_comparison_prompt(&prompt)?;

    let unused: Vec<_> = prompt
        .input_variables()
        .difference(&prompt.placeholders())
        .cloned()
        .collect();
    if !unused.is_empty() {
        tracing::warn!(?unused, "Declared variables never appear in the template");
    }

    println!(
        "OK: {} ({} messages, variables {:?})",
        path.display(),
        prompt.messages().len(),
        prompt.input_variables()
    );
    Ok(())
}

pub fn providers() -> Result<()> {
    let registry = ProviderRegistry::with_defaults();
    let providers = registry.describe();
    if providers.is_empty() {
        println!("No providers compiled in; rebuild with --features anthropic");
    }
    for (name, description) in providers {
        println!("{:<12} {}", name, description);
    }
    Ok(())
}
