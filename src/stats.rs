//! Per-reference coverage statistics and the genome-wide quantile cutoff
//! (spec §4.4).
//!
//! Plain free functions over slices, in the same style as
//! `kun_peng::utils`'s helpers — no trait, no engine struct, just the
//! numbers the filter stage (§4.5) needs.

use crate::reference::Reference;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReferenceStats {
    pub coverage_depth: f64,
    pub coverage_breadth: f64,
    pub unique_coverage_depth: f64,
    pub unique_coverage_breadth: f64,
}

/// Coverage statistics for one reference, or `None` if it has no hits
/// (spec §4.4 computes these only `for each reference with hits > 0`).
pub fn reference_stats(reference: &Reference) -> Option<ReferenceStats> {
    if reference.hits == 0 {
        return None;
    }

    let length = reference.length.max(1) as f64;
    let bins = reference.cov.len().max(1) as f64;

    let cov_sum: u64 = reference.cov.iter().map(|&c| c as u64).sum();
    let uniq_sum: u64 = reference.uniq_cov.iter().map(|&c| c as u64).sum();
    let nonzero_cov = reference.cov.iter().filter(|&&c| c > 0).count();
    let nonzero_uniq = reference.uniq_cov.iter().filter(|&&c| c > 0).count();

    Some(ReferenceStats {
        coverage_depth: cov_sum as f64 / length,
        coverage_breadth: nonzero_cov as f64 / bins,
        unique_coverage_depth: uniq_sum as f64 / length,
        unique_coverage_breadth: nonzero_uniq as f64 / bins,
    })
}

/// Mean `coverage_depth` over the given stats. `0.0` for an empty slice.
pub fn expected_coverage(stats: &[ReferenceStats]) -> f64 {
    if stats.is_empty() {
        return 0.0;
    }
    stats.iter().map(|s| s.coverage_depth).sum::<f64>() / stats.len() as f64
}

/// Genome-wide quantile cutoff `C(v, q)` (spec §4.4).
///
/// Sorts `v` ascending, then walks from the top accumulating a running
/// sum until it reaches at least a `q` fraction of the total; the value at
/// the point the threshold is crossed is the cutoff — the smallest value
/// such that references above it carry at least a `q` share of the total
/// mass. `q = 0` degenerates to the maximum value (the threshold is
/// crossed on the first element); `q = 1` degenerates to the smallest
/// non-zero value, since trailing zero entries never move the running sum
/// across the threshold.
pub fn quantile_cutoff(v: &[f64], q: f64) -> f64 {
    if v.is_empty() {
        return 0.0;
    }

    let mut sorted: Vec<f64> = v.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let total: f64 = sorted.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let mut running = 0.0;
    let mut cutoff = *sorted.last().unwrap();
    for &value in sorted.iter().rev() {
        running += value;
        cutoff = value;
        if running / total >= q {
            break;
        }
    }
    cutoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;

    #[test]
    fn quantile_cutoff_empty_is_zero() {
        assert_eq!(quantile_cutoff(&[], 0.5), 0.0);
    }

    #[test]
    fn quantile_cutoff_all_zero_is_zero() {
        assert_eq!(quantile_cutoff(&[0.0, 0.0, 0.0], 0.5), 0.0);
    }

    #[test]
    fn quantile_cutoff_q_zero_is_max() {
        assert_eq!(quantile_cutoff(&[1.0, 5.0, 3.0], 0.0), 5.0);
    }

    #[test]
    fn quantile_cutoff_q_one_is_min_nonzero() {
        assert_eq!(quantile_cutoff(&[0.0, 0.0, 5.0, 10.0], 1.0), 5.0);
    }

    #[test]
    fn quantile_cutoff_mid_quantile() {
        // total = 30; q=0.5 -> need running >= 15, top-down: 10 (10/30),
        // then +10 (20/30 >= 0.5) -> cutoff = 10.
        let cutoff = quantile_cutoff(&[5.0, 10.0, 10.0, 5.0], 0.5);
        assert_eq!(cutoff, 10.0);
    }

    #[test]
    fn reference_stats_none_without_hits() {
        let r = Reference::new("r".to_string(), 1000, 1, 100);
        assert!(reference_stats(&r).is_none());
    }

    #[test]
    fn reference_stats_computes_depth_and_breadth() {
        let mut r = Reference::new("r".to_string(), 1000, 1, 100);
        r.hits = 1;
        r.add_cov(0, 100);
        r.add_uniq_cov(0, 100);
        let stats = reference_stats(&r).unwrap();
        assert_eq!(stats.coverage_depth, 1.0 / 1000.0);
        assert_eq!(stats.coverage_breadth, 1.0 / 10.0);
        assert_eq!(stats.unique_coverage_depth, 1.0 / 1000.0);
        assert_eq!(stats.unique_coverage_breadth, 1.0 / 10.0);
    }

    #[test]
    fn expected_coverage_is_mean() {
        let stats = vec![
            ReferenceStats { coverage_depth: 1.0, ..Default::default() },
            ReferenceStats { coverage_depth: 3.0, ..Default::default() },
        ];
        assert_eq!(expected_coverage(&stats), 2.0);
    }
}
