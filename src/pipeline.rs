use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::dedupe::{DedupeOptions, DedupeOutcome, dedupe};
use crate::error::McqError;
use crate::export::{ExportReport, error_chain, write_exports};
use crate::llm::{GenerationRequest, Generator, RetryPolicy, generate_with_retry};
use crate::parser::{DelimiterStyle, McqParser};
use crate::store::QuestionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Idle,
    Generating,
    Parsing,
    Deduplicating,
    Persisting,
    Exporting,
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    Completed,
    NothingToPersist,
    Failed,
}

// What to do with parsed records when existing questions cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreUnavailablePolicy {
    // Export the unfiltered batch without persisting it, then fail the run.
    Abort,
    // Keep every candidate and carry on with persisting and exporting.
    TreatAsUnique,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub dedupe: DedupeOptions,
    pub on_store_unavailable: StoreUnavailablePolicy,
    pub output_dir: PathBuf,
    pub output_stem: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stage: Stage,
    pub outcome: RunOutcome,
    pub delimiter_style: Option<DelimiterStyle>,
    pub parsed_count: usize,
    pub dropped_count: usize,
    pub duplicate_count: usize,
    pub unique_count: usize,
    pub persisted_count: usize,
    pub store_available: bool,
    pub exports: Vec<ExportReport>,
    pub warnings: Vec<String>,
    pub failure: Option<String>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            outcome: RunOutcome::Completed,
            delimiter_style: None,
            parsed_count: 0,
            dropped_count: 0,
            duplicate_count: 0,
            unique_count: 0,
            persisted_count: 0,
            store_available: true,
            exports: Vec::new(),
            warnings: Vec::new(),
            failure: None,
        }
    }
}

pub struct Pipeline<'s> {
    store: &'s dyn QuestionStore,
    parser: McqParser,
    options: PipelineOptions,
    stage: Stage,
}

impl<'s> Pipeline<'s> {
    pub fn new(store: &'s dyn QuestionStore, parser: McqParser, options: PipelineOptions) -> Self {
        Self {
            store,
            parser,
            options,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        info!(from = ?self.stage, to = ?stage, "pipeline stage");
        self.stage = stage;
    }

    pub fn generate(
        &mut self,
        generator: &dyn Generator,
        request: &GenerationRequest,
        policy: &RetryPolicy,
    ) -> Result<String, McqError> {
        self.enter(Stage::Generating);
        info!(
            topic = %request.topic,
            count = request.count,
            difficulty = %request.difficulty,
            max_attempts = policy.max_attempts,
            "requesting questions"
        );

        generate_with_retry(generator, request, policy).inspect_err(|_| self.enter(Stage::Error))
    }

    // Only an `Abort` store policy ends in `Stage::Error`, and only after the
    // unfiltered batch has been exported; every other failure is recorded in
    // the report and the run carries on.
    pub fn process(&mut self, raw: &str) -> RunReport {
        let mut report = RunReport::new();

        self.enter(Stage::Parsing);
        let parsed = self.parser.parse(raw);
        report.delimiter_style = parsed.style;
        report.parsed_count = parsed.records.len();
        report.dropped_count = parsed.dropped.len();
        report.warnings.extend(parsed.dropped.into_iter().map(|dropped| {
            McqError::MalformedSegment {
                index: dropped.index,
                defect: dropped.defect,
            }
            .to_string()
        }));

        if parsed.records.is_empty() {
            warn!("no well-formed questions parsed, nothing to persist");
            return self.finish(report, RunOutcome::NothingToPersist);
        }

        self.enter(Stage::Deduplicating);
        let store = self.store;
        let outcome = dedupe(
            parsed.records,
            || {
                store.ensure_schema()?;
                store.fetch_existing_questions()
            },
            self.options.dedupe,
        );

        let mut abort_reason = None;
        let unique = match outcome {
            DedupeOutcome::Filtered { unique, duplicates } => {
                report.duplicate_count = duplicates.len();
                unique
            }
            DedupeOutcome::StoreUnavailable { candidates, error } => {
                report.store_available = false;
                let message = error_chain(&error);
                match self.options.on_store_unavailable {
                    StoreUnavailablePolicy::Abort => {
                        warn!(
                            error = %message,
                            candidates = candidates.len(),
                            "store unavailable, exporting without persisting before aborting"
                        );
                        abort_reason = Some(message);
                    }
                    StoreUnavailablePolicy::TreatAsUnique => {
                        warn!(
                            error = %message,
                            candidates = candidates.len(),
                            "store unavailable, treating every candidate as unique"
                        );
                        report.warnings.push(message);
                    }
                }
                candidates
            }
        };
        report.unique_count = unique.len();

        if unique.is_empty() {
            info!("every generated question already exists, nothing to persist");
            return self.finish(report, RunOutcome::NothingToPersist);
        }

        if abort_reason.is_none() {
            self.enter(Stage::Persisting);
            match self.store.insert_batch(&unique) {
                Ok(inserted) => report.persisted_count = inserted,
                Err(err) => {
                    let message = error_chain(&err);
                    warn!(error = %message, "persisting failed, continuing with file export");
                    report.store_available = false;
                    report.warnings.push(message);
                }
            }
        }

        self.enter(Stage::Exporting);
        report.exports = write_exports(
            &unique,
            &self.options.output_dir,
            &self.options.output_stem,
        );
        report.warnings.extend(
            report
                .exports
                .iter()
                .filter_map(|export| export.error.clone()),
        );

        if let Some(reason) = abort_reason {
            self.enter(Stage::Error);
            report.failure = Some(reason);
            report.stage = self.stage;
            report.outcome = RunOutcome::Failed;
            return report;
        }

        self.finish(report, RunOutcome::Completed)
    }

    fn finish(&mut self, mut report: RunReport, outcome: RunOutcome) -> RunReport {
        self.enter(Stage::Done);
        report.stage = self.stage;
        report.outcome = outcome;
        info!(
            outcome = ?outcome,
            parsed = report.parsed_count,
            dropped = report.dropped_count,
            duplicates = report.duplicate_count,
            persisted = report.persisted_count,
            "pipeline finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    use super::*;
    use crate::error::{LlmError, StoreOperation};
    use crate::export::ExportFormat;
    use crate::llm::Backoff;
    use crate::model::McqRecord;

    const LAMBDA: &str = "**Q1. What is AWS Lambda?**\na) A compute service\nb) A storage service\nc) A database service\nd) An analytics service\n**Correct answer: 1**\nDifficulty: Easy\nSubject: AWS\nTopic: Compute\nSub-topic: Lambda\nTags: Compute, AWS, Lambda\n";

    const TWO_QUESTIONS: &str = "Q1. What is AWS Lambda?\na) Compute\nb) Storage\nc) Database\nd) Analytics\nCorrect answer: 1\n\n\
Q2. What is Amazon S3?\na) Compute\nb) Object storage\nc) Queue\nd) DNS\nCorrect answer: b\n";

    #[derive(Default)]
    struct MemoryStore {
        rows: RefCell<Vec<String>>,
        fail_fetch: Cell<bool>,
        fail_insert: Cell<bool>,
        insert_calls: Cell<u32>,
    }

    impl MemoryStore {
        fn with_rows(rows: &[&str]) -> Self {
            let store = Self::default();
            store
                .rows
                .borrow_mut()
                .extend(rows.iter().map(|row| row.to_string()));
            store
        }

        fn offline() -> Self {
            let store = Self::default();
            store.fail_fetch.set(true);
            store.fail_insert.set(true);
            store
        }
    }

    fn offline_error(operation: StoreOperation) -> McqError {
        McqError::StoreUnavailable {
            operation,
            source: rusqlite::Error::InvalidQuery,
        }
    }

    impl QuestionStore for MemoryStore {
        fn ensure_schema(&self) -> Result<(), McqError> {
            Ok(())
        }

        fn fetch_existing_questions(&self) -> Result<Vec<String>, McqError> {
            if self.fail_fetch.get() {
                return Err(offline_error(StoreOperation::FetchExisting));
            }
            Ok(self.rows.borrow().clone())
        }

        fn insert_batch(&self, records: &[McqRecord]) -> Result<usize, McqError> {
            self.insert_calls.set(self.insert_calls.get() + 1);
            if self.fail_insert.get() {
                return Err(offline_error(StoreOperation::InsertBatch));
            }
            self.rows
                .borrow_mut()
                .extend(records.iter().map(|record| record.question.clone()));
            Ok(records.len())
        }

        fn count(&self) -> Result<i64, McqError> {
            Ok(self.rows.borrow().len() as i64)
        }
    }

    fn pipeline<'s>(
        store: &'s MemoryStore,
        dir: &tempfile::TempDir,
        policy: StoreUnavailablePolicy,
    ) -> Pipeline<'s> {
        Pipeline::new(
            store,
            McqParser::new().expect("parser should build"),
            PipelineOptions {
                dedupe: DedupeOptions::default(),
                on_store_unavailable: policy,
                output_dir: dir.path().to_path_buf(),
                output_stem: "run".to_string(),
            },
        )
    }

    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().expect("tempdir should be created")
    }

    #[test]
    fn full_run_persists_and_exports_every_format() {
        let dir = tempdir();
        let store = MemoryStore::default();
        let mut pipeline = pipeline(&store, &dir, StoreUnavailablePolicy::TreatAsUnique);

        let report = pipeline.process(LAMBDA);

        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.delimiter_style, Some(DelimiterStyle::Emphasis));
        assert_eq!(report.persisted_count, 1);
        assert_eq!(*store.rows.borrow(), vec!["What is AWS Lambda?".to_string()]);
        assert!(report.exports.iter().all(|export| export.written));
        for format in ExportFormat::ALL {
            assert!(dir.path().join(format!("run.{}", format.extension())).is_file());
        }

        let json = std::fs::read_to_string(dir.path().join("run.json")).expect("json should exist");
        let records: Vec<McqRecord> = serde_json::from_str(&json).expect("json should decode");
        assert_eq!(records[0].option_a, "A compute service");
        assert_eq!(records[0].difficulty, "Easy");
    }

    #[test]
    fn existing_questions_are_not_persisted_again() {
        let dir = tempdir();
        let store = MemoryStore::with_rows(&["  what is aws lambda?"]);
        let mut pipeline = pipeline(&store, &dir, StoreUnavailablePolicy::TreatAsUnique);

        let report = pipeline.process(TWO_QUESTIONS);

        assert_eq!(report.parsed_count, 2);
        assert_eq!(report.duplicate_count, 1);
        assert_eq!(report.persisted_count, 1);
        assert_eq!(
            store.rows.borrow().last().map(String::as_str),
            Some("What is Amazon S3?")
        );
    }

    #[test]
    fn unparseable_output_completes_with_nothing_to_persist() {
        let dir = tempdir();
        let store = MemoryStore::default();
        let mut pipeline = pipeline(&store, &dir, StoreUnavailablePolicy::TreatAsUnique);

        let report = pipeline.process("Q1. Only a stem?\na) one option\n");

        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(report.outcome, RunOutcome::NothingToPersist);
        assert_eq!(report.dropped_count, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(store.insert_calls.get(), 0);
        assert!(report.exports.is_empty());
    }

    #[test]
    fn all_duplicates_complete_with_nothing_to_persist() {
        let dir = tempdir();
        let store = MemoryStore::with_rows(&["What is AWS Lambda?"]);
        let mut pipeline = pipeline(&store, &dir, StoreUnavailablePolicy::TreatAsUnique);

        let report = pipeline.process(LAMBDA);

        assert_eq!(report.outcome, RunOutcome::NothingToPersist);
        assert_eq!(store.insert_calls.get(), 0);
    }

    #[test]
    fn offline_store_still_exports_files_when_treating_as_unique() {
        let dir = tempdir();
        let store = MemoryStore::offline();
        let mut pipeline = pipeline(&store, &dir, StoreUnavailablePolicy::TreatAsUnique);

        let report = pipeline.process(TWO_QUESTIONS);

        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(!report.store_available);
        assert_eq!(report.unique_count, 2);
        assert_eq!(report.persisted_count, 0);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.exports.iter().all(|export| export.written));
    }

    #[test]
    fn offline_store_abort_skips_persisting_but_still_exports() {
        let dir = tempdir();
        let store = MemoryStore::offline();
        let mut pipeline = pipeline(&store, &dir, StoreUnavailablePolicy::Abort);

        let report = pipeline.process(TWO_QUESTIONS);

        assert_eq!(pipeline.stage(), Stage::Error);
        assert_eq!(report.stage, Stage::Error);
        assert_eq!(report.outcome, RunOutcome::Failed);
        assert!(report.failure.is_some());
        assert!(!report.store_available);
        assert_eq!(report.parsed_count, 2);
        assert_eq!(report.unique_count, 2);
        assert_eq!(report.persisted_count, 0);
        assert_eq!(store.insert_calls.get(), 0);
        assert!(report.exports.iter().all(|export| export.written));

        let json = std::fs::read_to_string(dir.path().join("run.json")).expect("json should exist");
        let records: Vec<McqRecord> = serde_json::from_str(&json).expect("json should decode");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].question, "What is Amazon S3?");
    }

    struct FailingGenerator;

    impl Generator for FailingGenerator {
        fn generate(&self, _request: &GenerationRequest) -> Result<String, LlmError> {
            Err(LlmError::BadStatus {
                endpoint: "http://localhost/chat/completions".to_string(),
                status: 503,
                message: "overloaded".to_string(),
            })
        }
    }

    #[test]
    fn exhausted_generation_moves_pipeline_to_error() {
        let dir = tempdir();
        let store = MemoryStore::default();
        let mut pipeline = pipeline(&store, &dir, StoreUnavailablePolicy::TreatAsUnique);
        let request = GenerationRequest {
            topic: "AWS".to_string(),
            count: 3,
            difficulty: "Easy".to_string(),
        };
        let policy =
            RetryPolicy::new(2, Backoff::Fixed(Duration::ZERO)).expect("policy should be valid");

        let err = pipeline
            .generate(&FailingGenerator, &request, &policy)
            .expect_err("generation should fail");

        assert!(matches!(err, McqError::GenerationFailed { attempts: 2, .. }));
        assert_eq!(pipeline.stage(), Stage::Error);
    }
}
