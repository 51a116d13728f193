//! Transcript post-processing for synchronization.
//!
//! Raw transcription output is noisy: sub-second fragments, stuck
//! repetitions, and spans too short or too long to carry alignable
//! meaning. Cleaning runs in two passes (merge, then filter) and all
//! functions here are pure.

use std::collections::HashMap;

use crate::models::Segment;

/// Fragments shorter than this try to merge with their neighbor.
const MIN_FRAGMENT_SECS: f64 = 1.0;

/// Largest silence a merge may bridge.
const MERGE_GAP_SECS: f64 = 2.0;

/// The trailing segment is kept only when it spans at least this long.
const TAIL_MIN_SECS: f64 = 2.0;

/// Acceptable duration range for a cleaned segment.
const MAX_SEGMENT_SECS: f64 = 30.0;

/// Minimum words for a segment to carry alignable meaning.
const MIN_WORDS: usize = 3;

/// A single word above this share of the text marks a stuck repetition.
const MAX_REPETITION_RATIO: f64 = 0.3;

/// Merge and filter raw transcription segments.
///
/// Malformed spans (`end <= start`) are dropped up front; fragments
/// below [`MIN_FRAGMENT_SECS`] absorb their successor while the gap
/// stays within [`MERGE_GAP_SECS`]; the survivors must sit inside the
/// duration window, carry at least [`MIN_WORDS`] words, and not repeat
/// one word past [`MAX_REPETITION_RATIO`].
pub fn clean_segments(raw: &[Segment]) -> Vec<Segment> {
    let mut well_formed = raw.iter().filter(|s| s.is_well_formed());

    let Some(first) = well_formed.next() else {
        return Vec::new();
    };

    let mut merged: Vec<Segment> = Vec::new();
    let mut current = first.clone();

    for segment in well_formed {
        if current.duration() < MIN_FRAGMENT_SECS {
            if segment.start - current.end <= MERGE_GAP_SECS {
                current.text = format!("{} {}", current.text.trim(), segment.text.trim());
                current.end = segment.end;
                current.confidence = current.confidence.min(segment.confidence);
            } else {
                // An isolated fragment cannot reach the tail minimum; drop it.
                current = segment.clone();
            }
        } else {
            merged.push(current);
            current = segment.clone();
        }
    }
    if current.duration() >= TAIL_MIN_SECS {
        merged.push(current);
    }

    merged.into_iter().filter(is_acceptable).collect()
}

fn is_acceptable(segment: &Segment) -> bool {
    let duration = segment.duration();
    (MIN_FRAGMENT_SECS..=MAX_SEGMENT_SECS).contains(&duration)
        && segment.word_count() >= MIN_WORDS
        && !is_excessively_repetitive(&segment.text)
}

/// True when one word dominates the text past the repetition ratio.
///
/// Texts with fewer than three words count as repetitive: they carry
/// too little signal to distinguish speech from a recognition loop.
fn is_excessively_repetitive(text: &str) -> bool {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if words.len() < MIN_WORDS {
        return true;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in &words {
        *counts.entry(word.as_str()).or_insert(0) += 1;
    }

    let max_count = counts.values().copied().max().unwrap_or(0);
    max_count as f64 / words.len() as f64 > MAX_REPETITION_RATIO
}
