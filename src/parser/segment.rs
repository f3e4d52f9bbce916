use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelimiterStyle {
    /// `**Q1. text**`
    Emphasis,
    /// `## Question 1`
    Heading,
    /// `Q1. text` opening a blank-line separated block
    BlankLine,
}

#[derive(Debug, Clone)]
pub struct Segment<'a> {
    pub index: usize,
    pub lines: Vec<&'a str>,
    pub marked: bool,
    pub has_body: bool,
}

impl<'a> Segment<'a> {
    fn open(index: usize, line: &'a str, marked: bool) -> Self {
        Self {
            index,
            lines: vec![line],
            marked,
            has_body: false,
        }
    }

    pub fn first_line(&self) -> &'a str {
        self.lines.first().copied().map(str::trim).unwrap_or_default()
    }
}

pub struct SegmentMarkers {
    pub emphasis: Regex,
    pub heading: Regex,
    pub numbered: Regex,
}

impl SegmentMarkers {
    pub fn sniff(&self, lines: &[&str]) -> Option<DelimiterStyle> {
        let trimmed = || lines.iter().map(|line| line.trim());

        if trimmed().any(|line| self.emphasis.is_match(line)) {
            Some(DelimiterStyle::Emphasis)
        } else if trimmed().any(|line| self.heading.is_match(line)) {
            Some(DelimiterStyle::Heading)
        } else if trimmed().any(|line| self.numbered.is_match(line)) {
            Some(DelimiterStyle::BlankLine)
        } else {
            None
        }
    }

    // Any marker opens a segment whatever the dominant style, so a batch that
    // mixes `**Q1.**` and `Q2.` blocks still splits per question.
    fn opens_segment(&self, line: &str) -> bool {
        self.emphasis.is_match(line) || self.heading.is_match(line) || self.numbered.is_match(line)
    }

    // Lines before the first marker are preamble and never reach a segment.
    // After a blank line, a line that is neither a marker nor an option or
    // field line closes a segment that already has a body and opens an
    // unmarked one, so stray blocks never merge into a neighbour.
    pub fn split<'a, F>(&self, lines: &[&'a str], is_body: F) -> Vec<Segment<'a>>
    where
        F: Fn(&str) -> bool,
    {
        let mut segments: Vec<Segment<'a>> = Vec::new();
        let mut after_blank = false;

        for &line in lines {
            let trimmed = line.trim();
            if self.opens_segment(trimmed) {
                segments.push(Segment::open(segments.len() + 1, line, true));
                after_blank = false;
                continue;
            }

            let next_index = segments.len() + 1;
            let Some(current) = segments.last_mut() else {
                continue;
            };

            if trimmed.is_empty() {
                after_blank = true;
                current.lines.push(line);
                continue;
            }

            let body = is_body(line);
            if after_blank && current.has_body && !body {
                segments.push(Segment::open(next_index, line, false));
            } else {
                current.has_body |= body;
                current.lines.push(line);
            }
            after_blank = false;
        }

        segments
    }
}

// An unterminated fence swallows the rest of the input.
pub fn strip_code_fences(raw: &str) -> Vec<&str> {
    let mut in_fence = false;
    let mut kept = Vec::new();

    for line in raw.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            kept.push(line);
        }
    }

    kept
}
