use super::traits::{invalid, ConfigSection};
use crate::engines::generation::action_spec::ActionSlot;
use crate::error::SearchError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub kind: TaskKind,
    pub regression: RegressionConfig,
    pub control: ControlConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Regression,
    Control,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionMetric {
    /// 1 / (1 + NRMSE)
    #[default]
    InvNrmse,
    NegNrmse,
    NegMse,
    R2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Numeric CSV file; takes precedence over `benchmark`
    pub dataset: Option<String>,
    /// Target column; the last column when unset
    pub target: Option<String>,
    /// Built-in benchmark expression name (e.g. `nguyen1`)
    pub benchmark: Option<String>,
    /// Rows generated for a benchmark
    pub benchmark_samples: usize,
    pub metric: RegressionMetric,
    /// Fraction of rows held out for the test split; 0 tests on the training rows
    pub test_fraction: f64,
    /// A program counts as a success when its test NMSE is below this
    pub success_threshold: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            target: None,
            benchmark: Some("nguyen1".to_string()),
            benchmark_samples: 20,
            metric: RegressionMetric::InvNrmse,
            test_fraction: 0.0,
            success_threshold: 1e-12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub n_episodes: usize,
    /// Episode `i` is seeded with `seed_base + i`
    pub seed_base: u64,
    pub max_steps: usize,
    pub success_score: Option<f64>,
    pub action_spec: Vec<ActionSlot>,
    pub clip_actions: bool,
    pub invalid_reward: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            n_episodes: 10,
            seed_base: 0,
            max_steps: 1000,
            success_score: None,
            action_spec: vec![ActionSlot::Learned],
            clip_actions: true,
            invalid_reward: -1000.0,
        }
    }
}

impl ConfigSection for TaskConfig {
    fn section_name() -> &'static str {
        "task"
    }

    fn validate(&self) -> Result<(), SearchError> {
        let regression = &self.regression;
        if !(0.0..1.0).contains(&regression.test_fraction) {
            return Err(invalid::<Self>("test_fraction must be in [0, 1)"));
        }
        if self.kind == TaskKind::Regression
            && regression.dataset.is_none()
            && regression.benchmark.is_none()
        {
            return Err(invalid::<Self>("regression needs a dataset or a benchmark"));
        }
        if self.control.n_episodes == 0 || self.control.max_steps == 0 {
            return Err(invalid::<Self>("n_episodes and max_steps must be positive"));
        }
        Ok(())
    }
}
