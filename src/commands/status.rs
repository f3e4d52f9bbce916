use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::run::{RunManifestSummary, manifest_path};
use crate::cli::StatusArgs;
use crate::store::{QuestionStore, SqliteStore};

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_path = manifest_path(&args.output);
    let db_path = &args.store.db_path;

    info!(
        output_dir = %args.output.output_dir.display(),
        stem = %args.output.output_stem,
        "status requested"
    );

    if manifest_path.exists() {
        let raw = fs::read(&manifest_path)
            .with_context(|| format!("failed to read {}", manifest_path.display()))?;
        let manifest: RunManifestSummary = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

        let report = manifest.report.as_ref();
        let written_exports = report
            .and_then(|report| report.exports.as_ref())
            .map(|exports| {
                exports
                    .iter()
                    .filter(|export| export.written)
                    .map(|export| export.format.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();

        info!(
            run_id = %manifest.run_id.unwrap_or_default(),
            command = %manifest.command.unwrap_or_default(),
            status = %manifest.status.unwrap_or_default(),
            updated_at = %manifest.updated_at.unwrap_or_default(),
            failure_reason = %manifest.failure_reason.unwrap_or_default(),
            parsed = report.and_then(|report| report.parsed_count).unwrap_or(0),
            dropped = report.and_then(|report| report.dropped_count).unwrap_or(0),
            duplicates = report.and_then(|report| report.duplicate_count).unwrap_or(0),
            persisted = report.and_then(|report| report.persisted_count).unwrap_or(0),
            exports = %written_exports,
            "loaded run manifest"
        );
    } else {
        warn!(path = %manifest_path.display(), "run manifest missing");
    }

    if db_path.exists() {
        let store = SqliteStore::new(db_path);
        let has_schema = store
            .has_schema()
            .with_context(|| format!("failed to inspect {}", db_path.display()))?;

        if has_schema {
            let questions = store
                .count()
                .with_context(|| format!("failed to count questions in {}", db_path.display()))?;
            info!(path = %db_path.display(), questions, "database status");
        } else {
            warn!(
                path = %db_path.display(),
                questions = 0,
                "mcqs table missing; run init-db to create it"
            );
        }
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}
