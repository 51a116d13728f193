//! Offset estimation.
//!
//! Three methods in fixed precedence: semantic matching over embedded
//! transcript segments, a statistical median over position-matched
//! segment starts, and a duration-difference fallback. Estimation
//! itself never fails; each method hands off to the next when it
//! cannot produce a value.
//!
//! The sign convention is `dubbed start - original start`: a positive
//! offset means the dubbed track lags the original.

mod semantic;
mod statistical;

use crate::capability::EmbeddingClient;
use crate::config::EstimatorSettings;
use crate::models::{OffsetEstimate, Segment};

pub struct OffsetEstimator {
    settings: EstimatorSettings,
}

impl OffsetEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self { settings }
    }

    /// Estimates the offset between the two tracks in seconds.
    ///
    /// `durations` carries the probed media durations `(original,
    /// dubbed)` for the last-resort fallback; `embedder` enables the
    /// semantic method when present.
    pub async fn estimate(
        &self,
        original: &[Segment],
        dubbed: &[Segment],
        durations: Option<(f64, f64)>,
        embedder: Option<&dyn EmbeddingClient>,
    ) -> OffsetEstimate {
        if let Some(embedder) = embedder {
            if !original.is_empty() && !dubbed.is_empty() {
                match semantic::semantic_offset(original, dubbed, &self.settings, embedder).await {
                    Ok(Some(estimate)) => {
                        tracing::info!(%estimate, "Semantic estimation succeeded");
                        return estimate;
                    }
                    Ok(None) => {
                        tracing::warn!("Semantic matching found no confident pair, falling back");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Semantic estimation unavailable, falling back");
                    }
                }
            }
        }

        if let Some(estimate) = statistical::statistical_offset(original, dubbed, &self.settings) {
            tracing::info!(%estimate, "Statistical estimation succeeded");
            return estimate;
        }

        let estimate = match durations {
            Some((original_secs, dubbed_secs)) => {
                OffsetEstimate::duration((dubbed_secs - original_secs) / 2.0)
            }
            None => OffsetEstimate::duration(0.0),
        };
        tracing::warn!(%estimate, "No usable segments, using duration difference");
        estimate
    }
}
