use super::traits::{invalid, ConfigSection};
use crate::error::SearchError;
use crate::types::ComplexityMeasure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Overrides `n_samples / batch_size` when set
    pub n_epochs: Option<usize>,
    pub n_samples: usize,
    pub batch_size: usize,
    /// Risk-seeking quantile; 1.0 trains on the whole batch
    pub epsilon: f64,
    pub baseline: Baseline,
    /// EWMA coefficient for the moving-average baselines
    pub alpha: f64,
    pub b_jumpstart: bool,
    pub learning_rate: f64,
    pub entropy_weight: f64,
    pub entropy_weight_final: Option<f64>,
    pub entropy_anneal_epochs: usize,
    pub entropy_gamma: f64,
    pub max_grad_norm: Option<f32>,
    pub complexity_weight: f64,
    pub complexity_measure: ComplexityMeasure,
    pub reward_threshold: Option<f64>,
    pub early_stopping: bool,
    pub hof_size: usize,
    /// Reward evaluation threads; 0 uses every CPU
    pub n_cores_batch: usize,
    pub use_cache: bool,
    /// Most evaluations the reward cache holds before it starts over; `None` is unbounded
    pub cache_capacity: Option<usize>,
    /// Most running-mean histories kept for stochastic tasks
    pub history_capacity: Option<usize>,
    /// Priority queue training: add a supervised term on the best programs seen so far
    pub pqt: bool,
    pub pqt_k: usize,
    pub pqt_batch_size: usize,
    pub pqt_weight: f64,
    /// Keep the policy-gradient term alongside the priority queue term
    pub pqt_use_pg: bool,
    /// Estimate the risk-seeking quantile over a memory of past samples plus the batch
    pub use_memory: bool,
    pub memory_capacity: usize,
    /// Samples drawn to fill the memory before training; defaults to `batch_size`
    pub warm_start: Option<usize>,
    /// Memory weight above which the quantile estimate is reported as memory-dominated
    pub memory_threshold: Option<f64>,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    /// The risk-seeking quantile R_ε itself
    #[serde(rename = "r_e")]
    RE,
    /// EWMA of the retained mean reward
    EwmaR,
    /// EWMA of R_ε
    #[serde(rename = "ewma_r_e")]
    EwmaRE,
    /// R_ε plus an EWMA of (retained mean - R_ε)
    Combined,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_epochs: None,
            n_samples: 200_000,
            batch_size: 500,
            epsilon: 0.05,
            baseline: Baseline::RE,
            alpha: 0.5,
            b_jumpstart: false,
            learning_rate: 0.0005,
            entropy_weight: 0.005,
            entropy_weight_final: None,
            entropy_anneal_epochs: 0,
            entropy_gamma: 0.7,
            max_grad_norm: None,
            complexity_weight: 0.0,
            complexity_measure: ComplexityMeasure::Token,
            reward_threshold: None,
            early_stopping: true,
            hof_size: 10,
            n_cores_batch: 1,
            use_cache: true,
            cache_capacity: Some(100_000),
            history_capacity: Some(10_000),
            pqt: false,
            pqt_k: 10,
            pqt_batch_size: 1,
            pqt_weight: 200.0,
            pqt_use_pg: false,
            use_memory: false,
            memory_capacity: 1_000,
            warm_start: None,
            memory_threshold: None,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    /// Number of epochs the search runs for.
    pub fn epochs(&self) -> usize {
        self.n_epochs
            .unwrap_or(self.n_samples / self.batch_size.max(1))
            .max(1)
    }

    /// Entropy weight at `epoch`, linearly annealed toward the final weight.
    pub fn entropy_weight_at(&self, epoch: usize) -> f64 {
        match self.entropy_weight_final {
            Some(end) if self.entropy_anneal_epochs > 0 => {
                let progress = (epoch as f64 / self.entropy_anneal_epochs as f64).min(1.0);
                self.entropy_weight + (end - self.entropy_weight) * progress
            }
            _ => self.entropy_weight,
        }
    }
}

impl ConfigSection for TrainingConfig {
    fn section_name() -> &'static str {
        "training"
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.batch_size == 0 {
            return Err(invalid::<Self>("batch_size must be positive"));
        }
        if self.n_epochs == Some(0) {
            return Err(invalid::<Self>("n_epochs must be positive when set"));
        }
        if self.n_epochs.is_none() && self.n_samples < self.batch_size {
            return Err(invalid::<Self>("n_samples must be at least batch_size"));
        }
        if !(self.epsilon > 0.0) {
            return Err(invalid::<Self>("epsilon must be positive"));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(invalid::<Self>("alpha must be between 0 and 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(invalid::<Self>("learning_rate must be positive"));
        }
        if self.entropy_weight < 0.0 || self.entropy_weight_final.is_some_and(|w| w < 0.0) {
            return Err(invalid::<Self>("entropy weights must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.entropy_gamma) {
            return Err(invalid::<Self>("entropy_gamma must be between 0 and 1"));
        }
        if self.complexity_weight < 0.0 {
            return Err(invalid::<Self>("complexity_weight must be non-negative"));
        }
        if self.hof_size == 0 {
            return Err(invalid::<Self>("hof_size must be positive"));
        }
        if self.cache_capacity == Some(0) || self.history_capacity == Some(0) {
            return Err(invalid::<Self>("cache and history capacities must be positive when set"));
        }
        if self.pqt && (self.pqt_k == 0 || self.pqt_batch_size == 0) {
            return Err(invalid::<Self>("pqt_k and pqt_batch_size must be positive"));
        }
        if !(self.pqt_weight >= 0.0) {
            return Err(invalid::<Self>("pqt_weight must be non-negative"));
        }
        if self.use_memory {
            if self.epsilon >= 1.0 {
                return Err(invalid::<Self>("use_memory requires epsilon below 1"));
            }
            if self.memory_capacity == 0 || self.warm_start == Some(0) {
                return Err(invalid::<Self>("memory_capacity and warm_start must be positive"));
            }
        }
        Ok(())
    }
}
