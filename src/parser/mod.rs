use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::error::SegmentDefect;
use crate::model::{McqDraft, McqRecord, OptionSlot};

mod fields;
mod segment;

use fields::*;
use segment::*;

pub use segment::DelimiterStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedSegment {
    pub index: usize,
    pub defect: SegmentDefect,
    pub first_line: String,
}

#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub style: Option<DelimiterStyle>,
    pub records: Vec<McqRecord>,
    pub dropped: Vec<DroppedSegment>,
}

pub struct McqParser {
    markers: SegmentMarkers,
    question_label: Regex,
    option_line: Regex,
    field_line: Regex,
}

impl McqParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            markers: SegmentMarkers {
                emphasis: Regex::new(r"(?i)^\*\*\s*q(?:uestion)?\s*(?:\d+|[.):])")
                    .context("failed to compile emphasis marker regex")?,
                heading: Regex::new(r"(?i)^#{1,6}\s*(?:\*\*)?\s*question\b")
                    .context("failed to compile heading marker regex")?,
                numbered: Regex::new(r"(?i)^q\s*\d+\s*[.):]")
                    .context("failed to compile numbered marker regex")?,
            },
            question_label: Regex::new(r"(?i)^#{0,6}\s*(?:question|q)\s*\d*\s*[.):]?\s*(.*)$")
                .context("failed to compile question label regex")?,
            option_line: Regex::new(r"^\(?([a-dA-D])(?:\)|\.\s)\s*(.*)$")
                .context("failed to compile option line regex")?,
            field_line: Regex::new(
                r"(?i)^(correct\s+(?:answer|option)|answer|difficulty(?:\s+level)?|subject|sub[\s-]?topic|topic|tags?|bloom'?s?\s+taxonomy|course\s+outcome|program\s+outcome)\s*:\s*(.*)$",
            )
            .context("failed to compile field marker regex")?,
        })
    }

    pub fn parse(&self, raw: &str) -> ParseOutcome {
        let lines = strip_code_fences(raw);
        let Some(style) = self.markers.sniff(&lines) else {
            warn!(
                line_count = lines.len(),
                "no question markers found in generation output"
            );
            return ParseOutcome::default();
        };

        let mut outcome = ParseOutcome {
            style: Some(style),
            ..ParseOutcome::default()
        };

        for segment in self.markers.split(&lines, |line| self.is_body_line(line)) {
            if !segment.marked && !segment.has_body {
                debug!(
                    segment = segment.index,
                    first_line = %segment.first_line(),
                    "skipping commentary between question blocks"
                );
                continue;
            }

            let finished = if segment.marked {
                self.extract(&segment).finish()
            } else {
                Err(SegmentDefect::Unmarked)
            };

            match finished {
                Ok(record) => outcome.records.push(record),
                Err(defect) => {
                    warn!(
                        segment = segment.index,
                        first_line = %segment.first_line(),
                        defect = %defect,
                        "dropping malformed segment"
                    );
                    outcome.dropped.push(DroppedSegment {
                        index: segment.index,
                        defect,
                        first_line: segment.first_line().to_string(),
                    });
                }
            }
        }

        debug!(
            style = ?style,
            records = outcome.records.len(),
            dropped = outcome.dropped.len(),
            "parsed generation output"
        );

        outcome
    }

    fn is_body_line(&self, line: &str) -> bool {
        let cleaned = clean_line(line);
        self.option_line.is_match(&cleaned) || self.field_line.is_match(&cleaned)
    }

    fn extract(&self, segment: &Segment<'_>) -> McqDraft {
        let mut draft = McqDraft::default();
        let mut question_parts = Vec::<String>::new();
        let mut lines = segment.lines.iter();

        if let Some(first) = lines.next() {
            let cleaned = clean_line(first);
            let text = self
                .question_label
                .captures(&cleaned)
                .and_then(|captures| captures.get(1))
                .map_or(cleaned.as_str(), |m| m.as_str())
                .trim();
            if !text.is_empty() {
                question_parts.push(text.to_string());
            }
        }

        let mut body_started = false;
        for line in lines {
            let cleaned = clean_line(line);
            if cleaned.is_empty() {
                continue;
            }

            if let Some(captures) = self.option_line.captures(&cleaned) {
                let slot = captures
                    .get(1)
                    .and_then(|m| m.as_str().chars().next())
                    .and_then(OptionSlot::from_letter);
                if let Some(slot) = slot {
                    let text = captures.get(2).map_or("", |m| m.as_str()).trim();
                    draft.options.push((slot, text.to_string()));
                    body_started = true;
                    continue;
                }
            }

            if let Some(captures) = self.field_line.captures(&cleaned) {
                let marker = captures
                    .get(1)
                    .and_then(|m| FieldMarker::from_label(m.as_str()));
                if let Some(marker) = marker {
                    let value = captures.get(2).map_or("", |m| m.as_str());
                    if !marker.assign(&mut draft, value) {
                        trace!(segment = segment.index, marker = ?marker, "ignored field line");
                    }
                    body_started = true;
                    continue;
                }
            }

            if body_started {
                trace!(segment = segment.index, line = %cleaned, "ignored unrecognized line");
            } else {
                question_parts.push(cleaned);
            }
        }

        if !question_parts.is_empty() {
            draft.question = Some(question_parts.join(" "));
        }

        draft
    }
}
