//! Symbolic policy discovery over a caller-supplied environment.
//!
//! Each action dimension is driven by one program segment: the learned traversal,
//! a fixed expression, or the anchor policy's output for that dimension.

use crate::config::{ControlConfig, LibraryConfig};
use crate::engines::evaluation::task::{Task, TaskError};
use crate::engines::generation::action_spec::{anchor_dims, ActionSlot, ActionSpec};
use crate::engines::generation::program::Program;
use crate::error::{Result, SearchError};
use crate::functions::{Library, LibrarySpec};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub done: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    /// The episode cannot continue; the program gets the invalid reward
    #[error("rollout rejected: {0}")]
    Rollout(String),

    /// The environment itself is broken; the search aborts
    #[error("environment crashed: {0}")]
    Crash(String),
}

impl From<EnvError> for TaskError {
    fn from(e: EnvError) -> Self {
        match e {
            EnvError::Rollout(msg) => TaskError::Rollout(msg),
            EnvError::Crash(msg) => TaskError::Fatal(msg),
        }
    }
}

pub trait Environment: Send {
    fn observation_dim(&self) -> usize;

    fn action_dim(&self) -> usize;

    /// Per-dimension (low, high) bounds, when the action space is bounded
    fn action_bounds(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        None
    }

    fn reset(&mut self, seed: u64) -> std::result::Result<Vec<f64>, EnvError>;

    fn step(&mut self, action: &[f64]) -> std::result::Result<StepOutcome, EnvError>;
}

/// Creates a fresh environment per rollout so rollouts can run on any thread.
pub trait EnvironmentFactory: Send + Sync {
    fn create(&self) -> Box<dyn Environment>;
}

impl<F> EnvironmentFactory for F
where
    F: Fn() -> Box<dyn Environment> + Send + Sync,
{
    fn create(&self) -> Box<dyn Environment> {
        self()
    }
}

/// Pre-trained policy supplying the anchored action dimensions.
pub trait AnchorPolicy: Send + Sync {
    /// Full action vector for an observation; only anchored dimensions are read.
    fn act(&self, observation: &[f64]) -> Vec<f64>;
}

pub struct ControlTask {
    name: String,
    factory: Arc<dyn EnvironmentFactory>,
    anchor: Option<Arc<dyn AnchorPolicy>>,
    config: ControlConfig,
    function_set: Vec<String>,
    protected: bool,
    observation_dim: usize,
    action_dim: usize,
    bounds: Option<(Vec<f64>, Vec<f64>)>,
}

impl ControlTask {
    pub fn new(
        name: impl Into<String>,
        factory: Arc<dyn EnvironmentFactory>,
        anchor: Option<Arc<dyn AnchorPolicy>>,
        library: &LibraryConfig,
        config: ControlConfig,
    ) -> Result<Self> {
        let probe = factory.create();
        let observation_dim = probe.observation_dim();
        let action_dim = probe.action_dim();
        let bounds = probe.action_bounds();

        if config.action_spec.len() != action_dim {
            return Err(SearchError::Configuration(format!(
                "action_spec has {} slots but the environment has {} action dimensions",
                config.action_spec.len(),
                action_dim
            )));
        }
        if anchor.is_none() && config.action_spec.contains(&ActionSlot::Anchor) {
            return Err(SearchError::Configuration(
                "action_spec has anchor slots but no anchor policy was supplied".to_string(),
            ));
        }
        if let Some((low, high)) = &bounds {
            if low.len() != action_dim || high.len() != action_dim {
                return Err(SearchError::Collaborator(
                    "action bounds do not match the action dimension".to_string(),
                ));
            }
        }

        Ok(Self {
            name: name.into(),
            factory,
            anchor,
            config,
            function_set: library.function_set.clone(),
            protected: library.protected,
            observation_dim,
            action_dim,
            bounds,
        })
    }

    pub fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Action vector for one observation.
    pub fn act(
        &self,
        program: &Program,
        constants: &[f64],
        observation: &[f64],
    ) -> std::result::Result<Vec<f64>, TaskError> {
        let inputs: Vec<&[f64]> = observation.iter().map(std::slice::from_ref).collect();
        let anchored = match &self.anchor {
            Some(anchor) if (0..self.action_dim).any(|d| program.is_anchor_segment(d)) => {
                Some(anchor.act(observation))
            }
            _ => None,
        };

        let mut action = Vec::with_capacity(self.action_dim);
        for dim in 0..self.action_dim {
            let value = if program.is_anchor_segment(dim) {
                anchored
                    .as_ref()
                    .and_then(|a| a.get(dim).copied())
                    .ok_or_else(|| {
                        TaskError::Fatal(format!("anchor policy has no output for dimension {}", dim))
                    })?
            } else {
                let output = program
                    .execute_segment(dim, &inputs, constants)
                    .map_err(|e| TaskError::Fatal(e.to_string()))?;
                output.first().copied().unwrap_or(f64::NAN)
            };
            if !value.is_finite() {
                return Err(TaskError::Numeric(format!(
                    "action dimension {} is {}",
                    dim, value
                )));
            }
            action.push(value);
        }

        if self.config.clip_actions {
            if let Some((low, high)) = &self.bounds {
                for ((a, lo), hi) in action.iter_mut().zip(low).zip(high) {
                    *a = a.clamp(*lo, *hi);
                }
            }
        }
        Ok(action)
    }

    /// Return of one episode.
    pub fn rollout(
        &self,
        program: &Program,
        constants: &[f64],
        seed: u64,
    ) -> std::result::Result<f64, TaskError> {
        let mut env = self.factory.create();
        let mut observation = env.reset(seed)?;
        let mut total = 0.0;
        for _ in 0..self.config.max_steps {
            let action = self.act(program, constants, &observation)?;
            let outcome = env.step(&action)?;
            total += outcome.reward;
            observation = outcome.observation;
            if outcome.done {
                break;
            }
        }
        Ok(total)
    }

    fn mean_return(&self, program: &Program, constants: &[f64]) -> std::result::Result<f64, TaskError> {
        let mut total = 0.0;
        for episode in 0..self.config.n_episodes {
            total += self.rollout(program, constants, self.config.seed_base + episode as u64)?;
        }
        Ok(total / self.config.n_episodes.max(1) as f64)
    }
}

impl Task for ControlTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn library_spec(&self) -> LibrarySpec {
        LibrarySpec {
            function_set: self.function_set.clone(),
            n_inputs: self.observation_dim,
            anchor_dims: anchor_dims(&self.config.action_spec),
            protected: self.protected,
        }
    }

    fn action_spec(&self, library: &Library) -> Result<ActionSpec> {
        ActionSpec::resolve(&self.config.action_spec, library, self.action_dim)
    }

    fn reward(&self, program: &Program, constants: &[f64]) -> std::result::Result<f64, TaskError> {
        self.mean_return(program, constants)
    }

    fn evaluate(&self, program: &Program) -> HashMap<String, f64> {
        let mut diagnostics = HashMap::new();
        match self.mean_return(program, program.constants()) {
            Ok(mean) => {
                diagnostics.insert("mean_return".to_string(), mean);
                let success = self.config.success_score.is_some_and(|score| mean >= score);
                diagnostics.insert("success".to_string(), if success { 1.0 } else { 0.0 });
            }
            Err(e) => {
                log::debug!("Diagnostic rollout of '{}' failed: {}", program.key(), e);
                diagnostics.insert("success".to_string(), 0.0);
            }
        }
        diagnostics
    }

    fn invalid_reward(&self) -> f64 {
        self.config.invalid_reward
    }
}
