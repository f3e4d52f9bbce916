use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::export::ExportFormat;

#[derive(Debug, Error)]
pub enum McqError {
    #[error("segment {index} dropped: {defect}")]
    MalformedSegment { index: usize, defect: SegmentDefect },

    #[error("question store unavailable during {operation}")]
    StoreUnavailable {
        operation: StoreOperation,
        #[source]
        source: rusqlite::Error,
    },

    #[error("generation failed after {attempts} attempt(s)")]
    GenerationFailed {
        attempts: u32,
        #[source]
        source: LlmError,
    },

    #[error("failed to write {format} output to {}", path.display())]
    SerializationFailed {
        format: ExportFormat,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentDefect {
    #[error("block does not open with a question marker")]
    Unmarked,
    #[error("no question text")]
    MissingQuestion,
    #[error("expected 4 option lines, found {found}")]
    OptionCount { found: usize },
    #[error("option {position} is empty")]
    EmptyOption { position: u8 },
    #[error("option {position} appears more than once")]
    RepeatedOption { position: u8 },
    #[error("no correct-answer line")]
    MissingAnswer,
    #[error("correct answer {raw:?} is not a digit 1-4 or a letter a-d")]
    UnresolvedAnswer { raw: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    CreateSchema,
    InspectSchema,
    FetchExisting,
    InsertBatch,
    Count,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CreateSchema => "create-schema",
            Self::InspectSchema => "inspect-schema",
            Self::FetchExisting => "fetch-existing",
            Self::InsertBatch => "insert-batch",
            Self::Count => "count",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to {endpoint} failed")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {message}")]
    BadStatus {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("model {model} returned no content")]
    EmptyContent { model: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API key configured; pass --llm-api-key or set MCQGEN_LLM_API_KEY")]
    MissingApiKey,
    #[error("--max-attempts must be at least 1")]
    ZeroAttempts,
    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),
}
