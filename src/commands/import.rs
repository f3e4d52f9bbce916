use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use super::run::{RunManifest, build_pipeline, finish_run, open_store};
use crate::cli::ImportArgs;
use crate::util::sha256_text;

pub fn run(args: ImportArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let mut manifest = RunManifest::start("import", args.input.display().to_string(), &args.run);
    manifest.raw_sha256 = Some(sha256_text(&raw));
    manifest.raw_path = Some(args.input.display().to_string());
    info!(
        run_id = %manifest.run_id,
        input = %args.input.display(),
        bytes = raw.len(),
        "importing question text"
    );

    let store = open_store(&args.run.store)?;
    let mut pipeline = build_pipeline(&store, &args.run)?;
    let report = pipeline.process(&raw);

    finish_run(&args.run, manifest, report)
}
