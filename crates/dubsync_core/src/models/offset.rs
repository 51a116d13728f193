//! Offset estimation results.

use serde::{Deserialize, Serialize};

use super::enums::OffsetMethod;

/// The scalar offset inferred between the two tracks.
///
/// Sign convention: positive means the dubbed track lags the original
/// (its matching speech plays later), so alignment trims the dubbed
/// track's lead-in. Negative means the dubbed track runs early and gets
/// silence padded at its start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetEstimate {
    /// Offset in seconds.
    pub offset: f64,
    /// Cosine similarity of the winning pair for the semantic method;
    /// 0.0 for the fallback methods.
    pub confidence: f64,
    /// Which estimation path produced this value.
    pub method: OffsetMethod,
}

impl OffsetEstimate {
    /// Result of the semantic path.
    pub fn semantic(offset: f64, similarity: f64) -> Self {
        Self {
            offset,
            confidence: similarity,
            method: OffsetMethod::Semantic,
        }
    }

    /// Result of the statistical fallback.
    pub fn statistical(offset: f64) -> Self {
        Self {
            offset,
            confidence: 0.0,
            method: OffsetMethod::Statistical,
        }
    }

    /// Result of the duration-difference fallback.
    pub fn duration(offset: f64) -> Self {
        Self {
            offset,
            confidence: 0.0,
            method: OffsetMethod::Duration,
        }
    }
}

impl std::fmt::Display for OffsetEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+.3}s via {}", self.offset, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_tag_method() {
        assert_eq!(OffsetEstimate::semantic(2.0, 0.9).method, OffsetMethod::Semantic);
        assert_eq!(OffsetEstimate::statistical(2.0).method, OffsetMethod::Statistical);
        assert_eq!(OffsetEstimate::duration(1.0).method, OffsetMethod::Duration);
    }

    #[test]
    fn display_includes_sign_and_method() {
        let est = OffsetEstimate::semantic(-1.25, 0.8);
        let text = est.to_string();
        assert!(text.contains("-1.250"));
        assert!(text.contains("semantic"));
    }
}
