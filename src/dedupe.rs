use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::McqError;
use crate::model::{McqRecord, normalize_question};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeOptions {
    /// Also drop later candidates whose key repeats an earlier candidate.
    pub within_batch: bool,
}

#[derive(Debug)]
pub enum DedupeOutcome {
    Filtered {
        unique: Vec<McqRecord>,
        duplicates: Vec<McqRecord>,
    },
    // No filtering happened; the caller decides what to do with the batch.
    StoreUnavailable {
        candidates: Vec<McqRecord>,
        error: McqError,
    },
}

// `existing` is called exactly once per invocation.
pub fn dedupe<F>(candidates: Vec<McqRecord>, existing: F, options: DedupeOptions) -> DedupeOutcome
where
    F: FnOnce() -> Result<Vec<String>, McqError>,
{
    let existing = match existing() {
        Ok(questions) => questions,
        Err(error) => {
            warn!(
                error = %error,
                candidates = candidates.len(),
                "existing questions unavailable, skipping deduplication"
            );
            return DedupeOutcome::StoreUnavailable { candidates, error };
        }
    };

    let mut seen: HashSet<String> = existing
        .iter()
        .map(|question| normalize_question(question))
        .collect();
    debug!(existing = seen.len(), "built existing question keys");

    let mut unique = Vec::with_capacity(candidates.len());
    let mut duplicates = Vec::new();

    for candidate in candidates {
        let key = candidate.normalized_key();
        if seen.contains(&key) {
            info!(question = %key, "duplicate question removed");
            duplicates.push(candidate);
            continue;
        }
        if options.within_batch {
            seen.insert(key);
        }
        unique.push(candidate);
    }

    info!(
        unique = unique.len(),
        duplicates = duplicates.len(),
        "deduplication complete"
    );

    DedupeOutcome::Filtered { unique, duplicates }
}
