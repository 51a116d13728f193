//! Median of position-matched segment start deltas.
//!
//! Pairs the i-th original segment with the i-th dubbed segment and
//! takes the median of their start-time differences. The sample covers
//! the head of both tracks plus two anchors deeper in, and widens to
//! an evenly-strided sample when the deltas vary too much.

use crate::config::EstimatorSettings;
use crate::models::{OffsetEstimate, Segment};

pub(super) fn statistical_offset(
    original: &[Segment],
    dubbed: &[Segment],
    settings: &EstimatorSettings,
) -> Option<OffsetEstimate> {
    let n = original.len().min(dubbed.len());
    if n == 0 {
        return None;
    }

    let positions = anchor_positions(n, settings.base_sample_size);
    let deltas = position_deltas(original, dubbed, &positions);
    let spread = std_dev(&deltas);

    let offset = if spread > settings.delta_std_dev_ceiling_secs {
        tracing::warn!(
            std_dev = format!("{:.2}s", spread),
            "High variation across matched positions, widening sample"
        );
        let widened = strided_positions(n, settings.widened_sample_size);
        median(position_deltas(original, dubbed, &widened))
    } else {
        median(deltas)
    };

    tracing::debug!(
        pairs = n,
        offset = format!("{:+.3}s", offset),
        "Computed median start delta"
    );
    Some(OffsetEstimate::statistical(offset))
}

/// Head of both tracks, plus the midpoint and three-quarter anchors
/// when the tracks are longer than the head sample.
fn anchor_positions(n: usize, base: usize) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..n.min(base)).collect();
    if n > base {
        for extra in [n / 2, (3 * n) / 4] {
            if extra < n && !positions.contains(&extra) {
                positions.push(extra);
            }
        }
    }
    positions
}

fn strided_positions(n: usize, max: usize) -> Vec<usize> {
    if n == 0 || max == 0 {
        return Vec::new();
    }
    let step = n.div_ceil(max).max(1);
    (0..n).step_by(step).collect()
}

fn position_deltas(original: &[Segment], dubbed: &[Segment], positions: &[usize]) -> Vec<f64> {
    positions
        .iter()
        .map(|&i| dubbed[i].start - original[i].start)
        .collect()
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OffsetMethod;

    fn track(deltas: &[(f64, f64)]) -> (Vec<Segment>, Vec<Segment>) {
        let original = deltas
            .iter()
            .map(|(start, _)| Segment::new(*start, start + 3.0, "one two three four"))
            .collect();
        let dubbed = deltas
            .iter()
            .map(|(start, delta)| Segment::new(start + delta, start + delta + 3.0, "uno dos tres cuatro"))
            .collect();
        (original, dubbed)
    }

    #[test]
    fn uniform_delta_is_returned_exactly() {
        let pairs: Vec<(f64, f64)> = (0..5).map(|i| (i as f64 * 10.0, 2.0)).collect();
        let (original, dubbed) = track(&pairs);

        let estimate =
            statistical_offset(&original, &dubbed, &EstimatorSettings::default()).unwrap();
        assert!((estimate.offset - 2.0).abs() < 1e-9);
        assert_eq!(estimate.method, OffsetMethod::Statistical);
    }

    #[test]
    fn median_shrugs_off_an_outlier() {
        let mut pairs: Vec<(f64, f64)> = (0..9).map(|i| (i as f64 * 10.0, 2.0)).collect();
        pairs.push((90.0, 50.0));
        let (original, dubbed) = track(&pairs);

        let estimate =
            statistical_offset(&original, &dubbed, &EstimatorSettings::default()).unwrap();
        assert!((estimate.offset - 2.0).abs() < 1e-9);
    }

    #[test]
    fn noisy_head_triggers_the_wider_sample() {
        // Head deltas swing between 90 and 10; the rest of the track
        // agrees on 2.0. The wider sample must win.
        let pairs: Vec<(f64, f64)> = (0..40)
            .map(|i| {
                let delta = if i < 10 {
                    if i % 2 == 0 {
                        90.0
                    } else {
                        10.0
                    }
                } else {
                    2.0
                };
                (i as f64 * 10.0, delta)
            })
            .collect();
        let (original, dubbed) = track(&pairs);

        let estimate =
            statistical_offset(&original, &dubbed, &EstimatorSettings::default()).unwrap();
        assert!((estimate.offset - 2.0).abs() < 1e-9);
    }

    #[test]
    fn empty_side_yields_nothing() {
        let (original, _) = track(&[(0.0, 2.0)]);
        assert!(statistical_offset(&original, &[], &EstimatorSettings::default()).is_none());
        assert!(statistical_offset(&[], &original, &EstimatorSettings::default()).is_none());
    }

    #[test]
    fn anchors_reach_past_the_head() {
        let positions = anchor_positions(40, 10);
        assert!(positions.contains(&20));
        assert!(positions.contains(&30));

        // Anchors already inside the head are not duplicated.
        let positions = anchor_positions(15, 10);
        assert_eq!(positions.iter().filter(|&&p| p == 7).count(), 1);
        assert!(positions.contains(&11));
    }

    #[test]
    fn strided_positions_cover_the_whole_track() {
        let positions = strided_positions(45, 20);
        assert!(positions.len() <= 20);
        assert_eq!(positions.first(), Some(&0));
        assert_eq!(positions.last(), Some(&42));
    }

    #[test]
    fn median_handles_even_and_odd_counts() {
        assert!((median(vec![3.0, 1.0, 2.0]) - 2.0).abs() < 1e-9);
        assert!((median(vec![4.0, 1.0, 2.0, 3.0]) - 2.5).abs() < 1e-9);
        assert_eq!(median(vec![]), 0.0);
    }
}
