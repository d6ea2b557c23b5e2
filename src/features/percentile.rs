//! Deterministic percentile computation, ported from `_percentile()` in
//! `agent/pipeline/features.py`.

/// Compute the `p`-th percentile (0.0..=1.0) of `values` deterministically:
/// sort ascending, then index at `floor((n-1) * p)`. Returns `None` for an
/// empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = (((sorted.len() - 1) as f64) * p).floor() as usize;
    sorted.get(idx).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p95_of_single_value_is_itself() {
        assert_eq!(percentile(&[42.0], 0.95), Some(42.0));
    }

    #[test]
    fn picks_deterministic_index() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        // floor((5-1) * 0.95) = floor(3.8) = 3 -> values_sorted[3] = 4.0
        assert_eq!(percentile(&values, 0.95), Some(4.0));
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(percentile(&[], 0.5), None);
    }
}
