use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-epoch statistics reported to progress callbacks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    /// Valid programs in the batch
    pub n_programs: usize,
    /// Truncated sequences discarded by the sampler
    pub n_invalid: usize,
    pub n_dead_ends: usize,
    pub restarts: usize,
    pub mean_reward: f64,
    pub max_reward: f64,
    /// Lowest reward kept by the risk-seeking filter
    pub quantile_reward: f64,
    /// Best reward seen so far in the run
    pub best_reward: f64,
    pub mean_length: f64,
    pub mean_complexity: f64,
    /// Mean discounted entropy of the retained sequences, when trained
    pub entropy: Option<f64>,
    pub loss: Option<f64>,
    pub baseline: Option<f64>,
    pub failures: BTreeMap<FailureKind, usize>,
    pub cache_hits: usize,
    pub evaluated: usize,
    pub elapsed_ms: u64,
}

impl EpochStats {
    pub fn total_failures(&self) -> usize {
        self.failures.values().sum()
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linearly interpolated quantile, `q` in [0, 1].
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile() {
        let values = [3.0, 1.0, 2.0, 4.0, 5.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 5.0);
        assert_eq!(quantile(&values, 0.5), 3.0);
        assert!((quantile(&values, 0.9) - 4.6).abs() < 1e-12);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_failure_totals() {
        let mut stats = EpochStats::default();
        stats.failures.insert(FailureKind::Numeric, 3);
        stats.failures.insert(FailureKind::Timeout, 1);
        assert_eq!(stats.total_failures(), 4);
    }
}
