// src/engines/metrics/fit.rs
use std::collections::HashMap;

/// Goodness-of-fit measures between targets and predictions.
pub struct FitMetrics;

impl FitMetrics {
    pub fn calculate(y: &[f64], y_hat: &[f64]) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();
        if y.is_empty() || y.len() != y_hat.len() {
            return metrics;
        }

        let mse = Self::mse(y, y_hat);
        let var = Self::variance(y);
        metrics.insert("mse".to_string(), mse);
        if var > 0.0 {
            metrics.insert("nmse".to_string(), mse / var);
            metrics.insert("nrmse".to_string(), (mse / var).sqrt());
            metrics.insert("r2".to_string(), 1.0 - mse / var);
        }
        metrics
    }

    pub fn mse(y: &[f64], y_hat: &[f64]) -> f64 {
        y.iter()
            .zip(y_hat)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            / y.len().max(1) as f64
    }

    /// Population variance
    pub fn variance(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
    }

    /// NMSE, or `None` when the targets are constant.
    pub fn nmse(y: &[f64], y_hat: &[f64]) -> Option<f64> {
        let var = Self::variance(y);
        (var > 0.0).then(|| Self::mse(y, y_hat) / var)
    }
}
