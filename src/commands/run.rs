use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cli::{OnStoreUnavailable, OutputArgs, RunArgs, StoreArgs};
use crate::dedupe::DedupeOptions;
use crate::export::ExportReport;
use crate::parser::McqParser;
use crate::pipeline::{
    Pipeline, PipelineOptions, RunOutcome, RunReport, Stage, StoreUnavailablePolicy,
};
use crate::store::SqliteStore;
use crate::util::{ensure_parent_directory, now_utc_string, utc_compact_string, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub command: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub source: String,
    pub raw_sha256: Option<String>,
    pub raw_path: Option<String>,
    pub db_path: String,
    pub on_store_unavailable: String,
    pub dedupe_within_batch: bool,
    pub failed_stage: Option<Stage>,
    pub failure_reason: Option<String>,
    pub report: Option<RunReport>,
}

// Read side of `RunManifest`; tolerant of manifests from older runs.
#[derive(Debug, Clone, Deserialize)]
pub struct RunManifestSummary {
    pub run_id: Option<String>,
    pub command: Option<String>,
    pub status: Option<String>,
    pub updated_at: Option<String>,
    pub failure_reason: Option<String>,
    pub report: Option<RunReportSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunReportSummary {
    pub parsed_count: Option<usize>,
    pub dropped_count: Option<usize>,
    pub duplicate_count: Option<usize>,
    pub persisted_count: Option<usize>,
    pub exports: Option<Vec<ExportSummary>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSummary {
    pub format: String,
    pub written: bool,
}

impl RunManifest {
    pub fn start(command: &str, source: String, args: &RunArgs) -> Self {
        let started_ts = Utc::now();
        let started_at = now_utc_string();

        Self {
            manifest_version: MANIFEST_VERSION,
            run_id: format!("run-{}", utc_compact_string(started_ts)),
            command: command.to_string(),
            status: "running".to_string(),
            updated_at: started_at.clone(),
            started_at,
            source,
            raw_sha256: None,
            raw_path: None,
            db_path: args.store.db_path.display().to_string(),
            on_store_unavailable: args.on_store_unavailable.as_str().to_string(),
            dedupe_within_batch: args.dedupe_within_batch,
            failed_stage: None,
            failure_reason: None,
            report: None,
        }
    }

    pub fn fail(&mut self, stage: Stage, reason: String) {
        self.status = "failed".to_string();
        self.failed_stage = Some(stage);
        self.failure_reason = Some(reason);
        self.updated_at = now_utc_string();
    }
}

pub fn manifest_path(output: &OutputArgs) -> PathBuf {
    output
        .output_dir
        .join(format!("{}_manifest.json", output.output_stem))
}

pub fn raw_output_path(output: &OutputArgs) -> PathBuf {
    output
        .output_dir
        .join(format!("{}_raw.txt", output.output_stem))
}

pub fn open_store(args: &StoreArgs) -> Result<SqliteStore> {
    ensure_parent_directory(&args.db_path)?;
    Ok(SqliteStore::new(&args.db_path))
}

pub fn build_pipeline<'s>(store: &'s SqliteStore, args: &RunArgs) -> Result<Pipeline<'s>> {
    let options = PipelineOptions {
        dedupe: DedupeOptions {
            within_batch: args.dedupe_within_batch,
        },
        on_store_unavailable: store_policy(args.on_store_unavailable),
        output_dir: args.output.output_dir.clone(),
        output_stem: args.output.output_stem.clone(),
    };
    Ok(Pipeline::new(store, McqParser::new()?, options))
}

fn store_policy(option: OnStoreUnavailable) -> StoreUnavailablePolicy {
    match option {
        OnStoreUnavailable::Abort => StoreUnavailablePolicy::Abort,
        OnStoreUnavailable::TreatAsUnique => StoreUnavailablePolicy::TreatAsUnique,
    }
}

pub fn write_manifest(output: &OutputArgs, manifest: &RunManifest) -> Result<()> {
    let path = manifest_path(output);
    write_json_pretty(&path, manifest)?;
    info!(path = %path.display(), run_id = %manifest.run_id, "wrote run manifest");
    Ok(())
}

pub fn finish_run(args: &RunArgs, mut manifest: RunManifest, report: RunReport) -> Result<()> {
    manifest.updated_at = now_utc_string();

    let outcome = report.outcome;
    if let Some(reason) = report.failure.clone() {
        manifest.fail(report.stage, reason);
    } else {
        manifest.status = match outcome {
            RunOutcome::NothingToPersist => "nothing-to-persist",
            _ => "completed",
        }
        .to_string();
    }

    for warning in &report.warnings {
        warn!(warning = %warning, "run warning");
    }
    log_exports(&report.exports);

    let failure = manifest.failure_reason.clone();
    manifest.report = Some(report);
    write_manifest(&args.output, &manifest)?;

    if outcome == RunOutcome::Failed {
        bail!(
            "run {} failed: {}",
            manifest.run_id,
            failure.unwrap_or_default()
        );
    }

    Ok(())
}

fn log_exports(exports: &[ExportReport]) {
    for export in exports {
        if export.written {
            info!(format = %export.format, path = %export.path, "export available");
        } else {
            warn!(
                format = %export.format,
                error = %export.error.clone().unwrap_or_default(),
                "export missing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_policy_maps_every_cli_choice() {
        assert_eq!(
            store_policy(OnStoreUnavailable::Abort),
            StoreUnavailablePolicy::Abort
        );
        assert_eq!(
            store_policy(OnStoreUnavailable::TreatAsUnique),
            StoreUnavailablePolicy::TreatAsUnique
        );
    }
}
