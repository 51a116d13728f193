//! Semantic pairing of transcript segments.
//!
//! Embeds a bounded sample of segments from each track and looks for
//! the most similar cross-track pair. The pair's start-time difference
//! is the offset candidate, subject to a plausibility ceiling.

use std::collections::HashSet;

use crate::capability::{Embedding, EmbeddingClient};
use crate::config::EstimatorSettings;
use crate::error::{SyncError, SyncResult};
use crate::models::{OffsetEstimate, Segment};

/// Segments with fewer words than this carry too little meaning to
/// match on.
const MIN_MATCH_WORDS: usize = 3;

pub(super) async fn semantic_offset(
    original: &[Segment],
    dubbed: &[Segment],
    settings: &EstimatorSettings,
    embedder: &dyn EmbeddingClient,
) -> SyncResult<Option<OffsetEstimate>> {
    let orig = prepare_segments(original, settings.max_segments);
    let dub = prepare_segments(dubbed, settings.max_segments);
    if orig.is_empty() || dub.is_empty() {
        tracing::debug!("Not enough usable segments for semantic matching");
        return Ok(None);
    }

    tracing::debug!(
        original = orig.len(),
        dubbed = dub.len(),
        "Embedding candidate segments"
    );
    let orig_vectors = embed_all(embedder, &orig, settings.embed_batch_size).await?;
    let dub_vectors = embed_all(embedder, &dub, settings.embed_batch_size).await?;

    let Some((i, j, similarity)) =
        best_pair(&orig_vectors, &dub_vectors, settings.similarity_threshold)
    else {
        tracing::debug!("No segment pair reached the similarity threshold");
        return Ok(None);
    };

    let candidate = dub[j].start - orig[i].start;
    if candidate.abs() > settings.max_semantic_offset_secs {
        return Err(SyncError::offset_out_of_range(
            candidate,
            settings.max_semantic_offset_secs,
        ));
    }

    tracing::info!(
        similarity = format!("{:.3}", similarity),
        offset = format!("{:+.3}s", candidate),
        original_text = %preview(&orig[i].text),
        dubbed_text = %preview(&dub[j].text),
        "Matched segment pair"
    );
    Ok(Some(OffsetEstimate::semantic(candidate, similarity)))
}

/// Drops blank, too-short, and content-duplicate segments (earliest
/// occurrence wins), then subsamples with an even stride so the sample
/// spans the whole track instead of just its head.
fn prepare_segments(segments: &[Segment], max: usize) -> Vec<&Segment> {
    let mut seen = HashSet::new();
    let filtered: Vec<&Segment> = segments
        .iter()
        .filter(|s| {
            if s.text.trim().is_empty() || s.word_count() < MIN_MATCH_WORDS {
                return false;
            }
            seen.insert(s.normalized_text())
        })
        .collect();

    if max == 0 || filtered.len() <= max {
        return filtered;
    }
    let step = filtered.len().div_ceil(max);
    filtered.into_iter().step_by(step).collect()
}

async fn embed_all(
    embedder: &dyn EmbeddingClient,
    segments: &[&Segment],
    batch_size: usize,
) -> SyncResult<Vec<Embedding>> {
    let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size.max(1)) {
        vectors.extend(embedder.embed(chunk).await?);
    }
    Ok(vectors)
}

/// Highest-similarity cross-track pair at or above the threshold.
/// Ties keep the earliest pair encountered.
fn best_pair(orig: &[Embedding], dub: &[Embedding], threshold: f64) -> Option<(usize, usize, f64)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for (i, o) in orig.iter().enumerate() {
        for (j, d) in dub.iter().enumerate() {
            let similarity = f64::from(o.cosine_similarity(d));
            if similarity < threshold {
                continue;
            }
            match best {
                Some((_, _, s)) if similarity <= s => {}
                _ => best = Some((i, j, similarity)),
            }
        }
    }
    best
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 60;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{}...", head)
    }
}
