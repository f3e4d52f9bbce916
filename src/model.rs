use serde::{Deserialize, Serialize};

use crate::error::SegmentDefect;

pub const DEFAULT_DIFFICULTY: &str = "Medium";
pub const DEFAULT_SUBJECT: &str = "General";
pub const DEFAULT_TOPIC: &str = "Unknown";
pub const DEFAULT_SUB_TOPIC: &str = "";
pub const DEFAULT_TAGS: &str = "";
pub const DEFAULT_BLOOMS_TAXONOMY: &str = "Evaluate";
pub const DEFAULT_COURSE_OUTCOME: &str = "CO1";
pub const DEFAULT_PROGRAM_OUTCOME: &str = "PO1";

/// One well-formed multiple-choice question. Only produced by
/// [`McqDraft::finish`] or by deserializing a previous export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqRecord {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: u8,
    pub difficulty: String,
    pub subject_name: String,
    pub topic_name: String,
    pub sub_topic_name: String,
    pub tags: String,
    pub blooms_taxonomy: String,
    pub course_outcome: String,
    pub program_outcome: String,
}

impl McqRecord {
    pub fn normalized_key(&self) -> String {
        normalize_question(&self.question)
    }

    pub fn options(&self) -> [&str; 4] {
        [
            &self.option_a,
            &self.option_b,
            &self.option_c,
            &self.option_d,
        ]
    }
}

pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSlot {
    A,
    B,
    C,
    D,
}

impl OptionSlot {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'a' => Some(Self::A),
            'b' => Some(Self::B),
            'c' => Some(Self::C),
            'd' => Some(Self::D),
            _ => None,
        }
    }

    pub fn position(self) -> u8 {
        match self {
            Self::A => 1,
            Self::B => 2,
            Self::C => 3,
            Self::D => 4,
        }
    }

    fn index(self) -> usize {
        usize::from(self.position() - 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct McqDraft {
    pub question: Option<String>,
    pub options: Vec<(OptionSlot, String)>,
    pub correct_answer: Option<String>,
    pub difficulty: Option<String>,
    pub subject_name: Option<String>,
    pub topic_name: Option<String>,
    pub sub_topic_name: Option<String>,
    pub tags: Option<String>,
    pub blooms_taxonomy: Option<String>,
    pub course_outcome: Option<String>,
    pub program_outcome: Option<String>,
}

impl McqDraft {
    pub fn finish(self) -> Result<McqRecord, SegmentDefect> {
        let question = self
            .question
            .filter(|value| !value.trim().is_empty())
            .ok_or(SegmentDefect::MissingQuestion)?;

        if self.options.len() != 4 {
            return Err(SegmentDefect::OptionCount {
                found: self.options.len(),
            });
        }

        let mut slots: [Option<String>; 4] = Default::default();
        for (slot, text) in self.options {
            if text.trim().is_empty() {
                return Err(SegmentDefect::EmptyOption {
                    position: slot.position(),
                });
            }
            let entry = &mut slots[slot.index()];
            if entry.is_some() {
                return Err(SegmentDefect::RepeatedOption {
                    position: slot.position(),
                });
            }
            *entry = Some(text);
        }
        let [Some(option_a), Some(option_b), Some(option_c), Some(option_d)] = slots else {
            // four distinct slots out of four always fill every position
            return Err(SegmentDefect::OptionCount { found: 4 });
        };

        let raw_answer = self.correct_answer.ok_or(SegmentDefect::MissingAnswer)?;
        let correct_answer =
            resolve_answer(&raw_answer).ok_or(SegmentDefect::UnresolvedAnswer { raw: raw_answer })?;

        Ok(McqRecord {
            question,
            option_a,
            option_b,
            option_c,
            option_d,
            correct_answer,
            difficulty: or_default(self.difficulty, DEFAULT_DIFFICULTY),
            subject_name: or_default(self.subject_name, DEFAULT_SUBJECT),
            topic_name: or_default(self.topic_name, DEFAULT_TOPIC),
            sub_topic_name: or_default(self.sub_topic_name, DEFAULT_SUB_TOPIC),
            tags: or_default(self.tags, DEFAULT_TAGS),
            blooms_taxonomy: or_default(self.blooms_taxonomy, DEFAULT_BLOOMS_TAXONOMY),
            course_outcome: or_default(self.course_outcome, DEFAULT_COURSE_OUTCOME),
            program_outcome: or_default(self.program_outcome, DEFAULT_PROGRAM_OUTCOME),
        })
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

// Accepts "2", "b", "b)", "(b)", "B.", "2) Some text"; rejects bare option text.
pub fn resolve_answer(raw: &str) -> Option<u8> {
    let trimmed = raw.trim().trim_start_matches('(');
    let mut chars = trimmed.chars();
    let head = chars.next()?;
    let closed = matches!(chars.next(), None | Some(')' | '.' | ':'));

    match head {
        '1'..='4' if closed || trimmed[1..].starts_with(' ') => {
            head.to_digit(10).and_then(|value| u8::try_from(value).ok())
        }
        _ if closed => OptionSlot::from_letter(head).map(OptionSlot::position),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> McqDraft {
        McqDraft {
            question: Some("What is AWS Lambda?".to_string()),
            options: vec![
                (OptionSlot::A, "A compute service".to_string()),
                (OptionSlot::B, "A storage service".to_string()),
                (OptionSlot::C, "A database service".to_string()),
                (OptionSlot::D, "An analytics service".to_string()),
            ],
            correct_answer: Some("1".to_string()),
            ..McqDraft::default()
        }
    }

    #[test]
    fn finish_applies_documented_defaults() {
        let record = complete_draft().finish().expect("complete draft should finish");
        assert_eq!(record.difficulty, "Medium");
        assert_eq!(record.subject_name, "General");
        assert_eq!(record.topic_name, "Unknown");
        assert_eq!(record.sub_topic_name, "");
        assert_eq!(record.tags, "");
        assert_eq!(record.blooms_taxonomy, "Evaluate");
        assert_eq!(record.course_outcome, "CO1");
        assert_eq!(record.program_outcome, "PO1");
    }

    #[test]
    fn finish_places_options_by_letter_not_by_line_order() {
        let mut draft = complete_draft();
        draft.options.reverse();
        let record = draft.finish().expect("reordered draft should finish");
        assert_eq!(record.option_a, "A compute service");
        assert_eq!(record.option_d, "An analytics service");
    }

    #[test]
    fn finish_rejects_repeated_option_letters() {
        let mut draft = complete_draft();
        draft.options[3] = (OptionSlot::C, "Another".to_string());
        assert_eq!(
            draft.finish(),
            Err(SegmentDefect::RepeatedOption { position: 3 })
        );
    }

    #[test]
    fn finish_rejects_three_options() {
        let mut draft = complete_draft();
        draft.options.pop();
        assert_eq!(draft.finish(), Err(SegmentDefect::OptionCount { found: 3 }));
    }

    #[test]
    fn resolve_answer_handles_digit_and_letter_forms() {
        assert_eq!(resolve_answer("2"), Some(2));
        assert_eq!(resolve_answer("b)"), Some(2));
        assert_eq!(resolve_answer("(B)"), Some(2));
        assert_eq!(resolve_answer("d. An analytics service"), Some(4));
        assert_eq!(resolve_answer("4"), Some(4));
    }

    #[test]
    fn resolve_answer_rejects_option_text_and_out_of_range_digits() {
        assert_eq!(resolve_answer("A compute service"), None);
        assert_eq!(resolve_answer("b is correct"), None);
        assert_eq!(resolve_answer("5"), None);
        assert_eq!(resolve_answer("12"), None);
        assert_eq!(resolve_answer("e)"), None);
        assert_eq!(resolve_answer(""), None);
    }

    #[test]
    fn normalized_key_trims_and_case_folds() {
        let record = complete_draft().finish().expect("complete draft should finish");
        assert_eq!(record.normalized_key(), "what is aws lambda?");
        assert_eq!(normalize_question("  What IS aws Lambda?\n"), "what is aws lambda?");
    }
}
