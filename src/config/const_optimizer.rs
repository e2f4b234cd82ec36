use super::traits::{invalid, ConfigSection};
use crate::error::SearchError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstOptimizerConfig {
    pub method: ConstOptMethod,
    pub max_iterations: usize,
    /// Wall-clock cap for one program, in milliseconds
    pub time_limit_ms: u64,
    /// Starting value of every free constant
    pub initial_value: f64,
    /// Convergence tolerance on the objective
    pub tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstOptMethod {
    /// Levenberg-Marquardt when the task has residuals, Nelder-Mead otherwise
    Auto,
    LevenbergMarquardt,
    NelderMead,
}

impl Default for ConstOptimizerConfig {
    fn default() -> Self {
        Self {
            method: ConstOptMethod::Auto,
            max_iterations: 100,
            time_limit_ms: 2_000,
            initial_value: 1.0,
            tolerance: 1e-10,
        }
    }
}

impl ConfigSection for ConstOptimizerConfig {
    fn section_name() -> &'static str {
        "const_optimizer"
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.max_iterations == 0 {
            return Err(invalid::<Self>("max_iterations must be positive"));
        }
        if self.time_limit_ms == 0 {
            return Err(invalid::<Self>("time_limit_ms must be positive"));
        }
        if !self.initial_value.is_finite() {
            return Err(invalid::<Self>("initial_value must be finite"));
        }
        Ok(())
    }
}
