use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::run::{
    RunManifest, build_pipeline, finish_run, open_store, raw_output_path, write_manifest,
};
use crate::cli::{BackoffMode, GenerateArgs};
use crate::error::ConfigError;
use crate::export::error_chain;
use crate::llm::{Backoff, GenerationConfig, GenerationRequest, LlmClient, PromptTemplate, RetryPolicy};
use crate::util::{sha256_text, write_text};

pub fn run(args: GenerateArgs) -> Result<()> {
    let config = generation_config(&args)?;
    let policy = retry_policy(&args)?;
    let template = load_template(&args)?;
    let request = GenerationRequest {
        topic: args.topic.clone(),
        count: args.count,
        difficulty: args.difficulty.clone(),
    };

    let mut manifest = RunManifest::start(
        "generate",
        format!("{}@{}", config.model, config.base_url),
        &args.run,
    );
    info!(
        run_id = %manifest.run_id,
        model = %config.model,
        topic = %request.topic,
        count = request.count,
        "generation run started"
    );

    let client = LlmClient::new(config, template).context("failed to build model client")?;
    let store = open_store(&args.run.store)?;
    let mut pipeline = build_pipeline(&store, &args.run)?;

    let raw = match pipeline.generate(&client, &request, &policy) {
        Ok(raw) => raw,
        Err(err) => {
            manifest.fail(pipeline.stage(), error_chain(&err));
            write_manifest(&args.run.output, &manifest)?;
            return Err(err).context("question generation failed");
        }
    };

    manifest.raw_sha256 = Some(sha256_text(&raw));
    let raw_path = raw_output_path(&args.run.output);
    match write_text(&raw_path, &raw) {
        Ok(()) => manifest.raw_path = Some(raw_path.display().to_string()),
        Err(err) => warn!(path = %raw_path.display(), error = %err, "failed to keep raw model output"),
    }

    let report = pipeline.process(&raw);
    finish_run(&args.run, manifest, report)
}

fn generation_config(args: &GenerateArgs) -> Result<GenerationConfig> {
    let api_key = args
        .llm_api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingApiKey)?;

    Ok(GenerationConfig {
        base_url: args.llm_base_url.clone(),
        model: args.llm_model.clone(),
        api_key,
        temperature: args.temperature,
        timeout: Duration::from_secs(args.timeout_secs),
    })
}

fn retry_policy(args: &GenerateArgs) -> Result<RetryPolicy> {
    let delay = Duration::from_millis(args.retry_delay_ms);
    let backoff = match args.backoff {
        BackoffMode::Fixed => Backoff::Fixed(delay),
        BackoffMode::Linear => Backoff::Linear(delay),
    };
    Ok(RetryPolicy::new(args.max_attempts, backoff)?)
}

fn load_template(args: &GenerateArgs) -> Result<PromptTemplate> {
    let Some(path) = &args.prompt_template else {
        return Ok(PromptTemplate::default());
    };

    let template = fs::read_to_string(path)
        .with_context(|| format!("failed to read prompt template {}", path.display()))?;
    PromptTemplate::new(template)
        .with_context(|| format!("invalid prompt template {}", path.display()))
}
