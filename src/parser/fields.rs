use crate::model::McqDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMarker {
    CorrectAnswer,
    Difficulty,
    Subject,
    Topic,
    SubTopic,
    Tags,
    BloomsTaxonomy,
    CourseOutcome,
    ProgramOutcome,
}

impl FieldMarker {
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let marker = if label.starts_with("correct") || label == "answer" {
            Self::CorrectAnswer
        } else if label.starts_with("difficulty") {
            Self::Difficulty
        } else if label.starts_with("sub") && label.ends_with("topic") {
            Self::SubTopic
        } else if label == "topic" {
            Self::Topic
        } else if label == "subject" {
            Self::Subject
        } else if label.starts_with("tag") {
            Self::Tags
        } else if label.ends_with("taxonomy") {
            Self::BloomsTaxonomy
        } else if label == "course outcome" {
            Self::CourseOutcome
        } else if label == "program outcome" {
            Self::ProgramOutcome
        } else {
            return None;
        };

        Some(marker)
    }

    fn slot(self, draft: &mut McqDraft) -> &mut Option<String> {
        match self {
            Self::CorrectAnswer => &mut draft.correct_answer,
            Self::Difficulty => &mut draft.difficulty,
            Self::Subject => &mut draft.subject_name,
            Self::Topic => &mut draft.topic_name,
            Self::SubTopic => &mut draft.sub_topic_name,
            Self::Tags => &mut draft.tags,
            Self::BloomsTaxonomy => &mut draft.blooms_taxonomy,
            Self::CourseOutcome => &mut draft.course_outcome,
            Self::ProgramOutcome => &mut draft.program_outcome,
        }
    }

    // First occurrence wins; returns false when the value was ignored.
    pub fn assign(self, draft: &mut McqDraft, value: &str) -> bool {
        let value = value.trim();
        let slot = self.slot(draft);
        if value.is_empty() || slot.is_some() {
            return false;
        }
        *slot = Some(value.to_string());
        true
    }
}

const EMPHASIS_DELIMITERS: [&str; 4] = ["**", "__", "*", "_"];

// Removes heading hashes, a list bullet, and emphasis that wraps either the
// whole line or a leading label such as `**Correct answer:**` or `__a)__`.
// Emphasis characters inside the content are kept as written.
pub fn clean_line(line: &str) -> String {
    let mut text = line.trim();

    let unhashed = text.trim_start_matches('#');
    if unhashed.len() != text.len() && unhashed.starts_with(char::is_whitespace) {
        text = unhashed.trim_start();
    }

    for bullet in ["- ", "• ", "* "] {
        if let Some(rest) = text.strip_prefix(bullet) {
            text = rest.trim_start();
            break;
        }
    }

    unwrap_emphasis(text)
}

fn unwrap_emphasis(text: &str) -> String {
    for delimiter in EMPHASIS_DELIMITERS {
        let Some(rest) = text.strip_prefix(delimiter) else {
            continue;
        };

        if let Some(inner) = rest.strip_suffix(delimiter) {
            let inner = inner.trim();
            if !inner.is_empty() && !inner.contains(delimiter) {
                return inner.to_string();
            }
        }

        if let Some(end) = rest.find(delimiter) {
            let label = rest[..end].trim();
            let tail = rest[end + delimiter.len()..].trim();
            if tail.starts_with(':') {
                return format!("{label}{tail}");
            }
            if is_label(label) {
                return format!("{label} {tail}").trim_end().to_string();
            }
        }

        break;
    }

    text.to_string()
}

fn is_label(label: &str) -> bool {
    !label.is_empty() && label.ends_with([':', '.', ')'])
}
