use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::McqError;
use crate::model::McqRecord;

pub const CSV_COLUMNS: [&str; 14] = [
    "question",
    "option_a",
    "option_b",
    "option_c",
    "option_d",
    "correct_answer",
    "difficulty",
    "subject_name",
    "topic_name",
    "sub_topic_name",
    "tags",
    "blooms_taxonomy",
    "course_outcome",
    "program_outcome",
];

pub const DB_COLUMNS: [&str; 10] = [
    "question",
    "option_a",
    "option_b",
    "option_c",
    "option_d",
    "correct_answer",
    "difficulty",
    "subject_name",
    "topic_name",
    "sub_topic_name",
];

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Text,
    Json,
    Csv,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [Self::Text, Self::Json, Self::Csv];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    fn render(self, records: &[McqRecord]) -> Result<String, BoxError> {
        Ok(match self {
            Self::Text => render_text(records),
            Self::Json => render_json(records)?,
            Self::Csv => render_csv(records)?,
        })
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbRow<'r> {
    pub question: &'r str,
    pub option_a: &'r str,
    pub option_b: &'r str,
    pub option_c: &'r str,
    pub option_d: &'r str,
    pub correct_answer: i64,
    pub difficulty: &'r str,
    pub subject_name: &'r str,
    pub topic_name: &'r str,
    pub sub_topic_name: &'r str,
}

pub fn to_db_row(record: &McqRecord) -> DbRow<'_> {
    DbRow {
        question: &record.question,
        option_a: &record.option_a,
        option_b: &record.option_b,
        option_c: &record.option_c,
        option_d: &record.option_d,
        correct_answer: i64::from(record.correct_answer),
        difficulty: &record.difficulty,
        subject_name: &record.subject_name,
        topic_name: &record.topic_name,
        sub_topic_name: &record.sub_topic_name,
    }
}

struct TextBlock<'r> {
    number: usize,
    record: &'r McqRecord,
}

impl fmt::Display for TextBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record;
        writeln!(f, "**Q{}. {}**", self.number, record.question)?;
        for (letter, option) in ['a', 'b', 'c', 'd'].iter().zip(record.options()) {
            writeln!(f, "{letter}) {option}")?;
        }
        writeln!(f, "**Correct answer: {}**", record.correct_answer)?;
        writeln!(f, "Difficulty: {}", record.difficulty)?;
        writeln!(f, "Subject: {}", record.subject_name)?;
        writeln!(f, "Topic: {}", record.topic_name)?;
        writeln!(f, "Sub-topic: {}", record.sub_topic_name)?;
        writeln!(f, "Tags: {}", record.tags)?;
        writeln!(f, "Blooms Taxonomy: {}", record.blooms_taxonomy)?;
        writeln!(f, "Course Outcome: {}", record.course_outcome)?;
        writeln!(f, "Program Outcome: {}", record.program_outcome)?;
        writeln!(f)
    }
}

// Emits the emphasis layout the parser reads, so a text export can be re-imported.
pub fn render_text(records: &[McqRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            TextBlock {
                number: index + 1,
                record,
            }
            .to_string()
        })
        .collect()
}

pub fn render_json(records: &[McqRecord]) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    Ok(json)
}

pub fn render_csv(records: &[McqRecord]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;

    for record in records {
        let correct_answer = record.correct_answer.to_string();
        writer.write_record([
            record.question.as_str(),
            record.option_a.as_str(),
            record.option_b.as_str(),
            record.option_c.as_str(),
            record.option_d.as_str(),
            correct_answer.as_str(),
            record.difficulty.as_str(),
            record.subject_name.as_str(),
            record.topic_name.as_str(),
            record.sub_topic_name.as_str(),
            record.tags.as_str(),
            record.blooms_taxonomy.as_str(),
            record.course_outcome.as_str(),
            record.program_outcome.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|err| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, err)))
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub format: ExportFormat,
    pub path: String,
    pub written: bool,
    pub error: Option<String>,
}

pub fn export_path(output_dir: &Path, stem: &str, format: ExportFormat) -> PathBuf {
    output_dir.join(format!("{stem}.{}", format.extension()))
}

// Each format is attempted independently; one failure never blocks the others.
pub fn write_exports(records: &[McqRecord], output_dir: &Path, stem: &str) -> Vec<ExportReport> {
    ExportFormat::ALL
        .iter()
        .map(|&format| {
            let path = export_path(output_dir, stem, format);
            let result = write_export(records, format, &path);

            match &result {
                Ok(()) => info!(
                    format = %format,
                    path = %path.display(),
                    records = records.len(),
                    "wrote export"
                ),
                Err(err) => warn!(error = %error_chain(err), "export failed"),
            }

            ExportReport {
                format,
                path: path.display().to_string(),
                written: result.is_ok(),
                error: result.err().map(|err| error_chain(&err)),
            }
        })
        .collect()
}

fn write_export(records: &[McqRecord], format: ExportFormat, path: &Path) -> Result<(), McqError> {
    let write = || -> Result<(), BoxError> {
        let rendered = format.render(records)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, rendered)?;
        Ok(())
    };

    write().map_err(|source| McqError::SerializationFailed {
        format,
        path: path.to_path_buf(),
        source,
    })
}

pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
