//! Bootstrap stabilisation of a percentile estimate on a small reference.
//!
//! Resample the reference with replacement, rank the observed value against
//! each resample, and report the mean rank with an equal-tailed interval.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::percentile::{percentile_of_score, PercentileBounds};
use crate::stats;

/// Smallest iteration count accepted by configuration.
pub const MIN_BOOTSTRAP_ITERATIONS: usize = 500;

/// Equal-tailed percentile interval at `level` (e.g. 0.90).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapEstimate {
    pub percentile: f64,
    pub interval: PercentileInterval,
    pub iterations: usize,
}

/// Bootstrap the clamped percentile of `value` against `reference`.
///
/// `reference` must already be finite. Returns `None` for an empty reference,
/// a non-finite value or zero iterations.
pub fn bootstrap_percentile<R: Rng + ?Sized>(
    reference: &[f64],
    value: f64,
    iterations: usize,
    ci_level: f64,
    bounds: &PercentileBounds,
    rng: &mut R,
) -> Option<BootstrapEstimate> {
    if reference.is_empty() || !value.is_finite() || iterations == 0 {
        return None;
    }
    let n = reference.len();
    let mut resample = vec![0.0; n];
    let mut ranks = Vec::with_capacity(iterations);

    for _ in 0..iterations {
        for slot in resample.iter_mut() {
            *slot = reference[rng.gen_range(0..n)];
        }
        if let Some(p) = percentile_of_score(&resample, value) {
            ranks.push(bounds.clamp(p));
        }
    }
    if ranks.is_empty() {
        return None;
    }

    let percentile = bounds.clamp(stats::mean(&ranks));
    let sorted = stats::sorted_finite(&ranks);
    let tail = (1.0 - ci_level.clamp(0.0, 1.0)) / 2.0;
    let interval = PercentileInterval {
        lower: stats::quantile_sorted(&sorted, tail),
        upper: stats::quantile_sorted(&sorted, 1.0 - tail),
        level: ci_level,
    };
    Some(BootstrapEstimate {
        percentile,
        interval,
        iterations: ranks.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn constant_reference_is_stable() {
        let mut rng = StdRng::seed_from_u64(7);
        let est = bootstrap_percentile(&[0.01; 4], 0.5, 500, 0.8, &PercentileBounds::default(), &mut rng)
            .unwrap();
        assert_eq!(est.percentile, 99.0);
        assert!((est.interval.lower - 99.0).abs() < 1e-9);
        assert!((est.interval.upper - 99.0).abs() < 1e-9);
        assert_eq!(est.iterations, 500);
    }

    #[test]
    fn same_seed_same_estimate() {
        let reference = [-0.02, 0.01, 0.03, -0.01, 0.02, 0.0, 0.015];
        let b = PercentileBounds::default();
        let a = bootstrap_percentile(&reference, 0.012, 1000, 0.9, &b, &mut StdRng::seed_from_u64(1));
        let c = bootstrap_percentile(&reference, 0.012, 1000, 0.9, &b, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, c);
    }

    #[test]
    fn interval_brackets_estimate() {
        let reference = [-0.02, 0.01, 0.03, -0.01, 0.02, 0.0, 0.015, 0.005];
        let est = bootstrap_percentile(
            &reference,
            0.012,
            1000,
            0.8,
            &PercentileBounds::default(),
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        assert!(est.interval.lower <= est.percentile);
        assert!(est.percentile <= est.interval.upper);
        assert!(est.interval.lower >= 1.0 && est.interval.upper <= 99.0);
    }

    #[test]
    fn unusable_input_yields_none() {
        let b = PercentileBounds::default();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(bootstrap_percentile(&[], 0.1, 500, 0.8, &b, &mut rng).is_none());
        assert!(bootstrap_percentile(&[0.1], f64::NAN, 500, 0.8, &b, &mut rng).is_none());
    }
}
