use crate::config::AppConfig;
use crate::data::RewardCache;
use crate::engines::evaluation::{is_success, RewardEvaluator, Task};
use crate::engines::generation::{
    action_spec::ActionSpec,
    constraints::ConstraintEngine,
    controller::{Controller, Trajectory},
    hall_of_fame::{HallOfFame, HallOfFameEntry},
    pareto::ParetoFront,
    program::{Program, ProgramSummary},
    sampler::BatchSampler,
    trainer::{create_optimizer, select_top_quantile, Trainer},
};
use crate::engines::metrics::epoch::{mean, quantile};
use crate::engines::metrics::EpochStats;
use crate::error::{FailureKind, Result, SearchError};
use crate::functions::{FunctionRegistry, Library};
use burn::backend::{Autodiff, NdArray};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Backend the controller trains on.
pub type DefaultBackend = Autodiff<NdArray>;

pub trait ProgressCallback: Send {
    fn on_epoch_start(&mut self, epoch: usize, total_epochs: usize);
    fn on_epoch_complete(&mut self, stats: &EpochStats, best: Option<&HallOfFameEntry>);
    fn on_finish(&mut self, _result: &SearchResult) {}
}

impl<C: ProgressCallback + ?Sized> ProgressCallback for &mut C {
    fn on_epoch_start(&mut self, epoch: usize, total_epochs: usize) {
        (**self).on_epoch_start(epoch, total_epochs);
    }

    fn on_epoch_complete(&mut self, stats: &EpochStats, best: Option<&HallOfFameEntry>) {
        (**self).on_epoch_complete(stats, best);
    }

    fn on_finish(&mut self, result: &SearchResult) {
        (**self).on_finish(result);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SampleBudget,
    RewardThreshold,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestProgram {
    pub program: ProgramSummary,
    pub diagnostics: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub seed: u64,
    pub best: Option<BestProgram>,
    pub hall_of_fame: Vec<ProgramSummary>,
    pub pareto_front: Vec<ProgramSummary>,
    pub epochs: Vec<EpochStats>,
    /// Valid programs sampled over the run
    pub total_programs: usize,
    pub total_invalid: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, Default)]
struct RewardHistory {
    sum: f64,
    count: usize,
}

impl RewardHistory {
    fn push(&mut self, reward: f64) -> f64 {
        self.sum += reward;
        self.count += 1;
        self.sum / self.count as f64
    }
}

/// Sample, evaluate, train and track, one epoch at a time.
pub struct SearchEngine {
    config: AppConfig,
    seed: u64,
    task: Arc<dyn Task>,
    library: Arc<Library>,
    action_spec: ActionSpec,
    constraints: Arc<ConstraintEngine>,
    evaluator: RewardEvaluator,
    cache: RewardCache,
    hall_of_fame: HallOfFame,
    pareto_front: ParetoFront,
    history: HashMap<String, RewardHistory>,
}

impl SearchEngine {
    pub fn new(config: AppConfig, task: Arc<dyn Task>) -> Result<Self> {
        config.validate()?;
        let library = Arc::new(Library::build(&task.library_spec(), &FunctionRegistry::new())?);
        let action_spec = task.action_spec(&library)?;
        let constraints = Arc::new(ConstraintEngine::new(&config.constraints, library.clone())?);
        let evaluator = RewardEvaluator::new(
            task.clone(),
            config.const_optimizer.clone(),
            config.training.complexity_weight,
            config.training.n_cores_batch,
        )?;
        log::info!(
            "Search on task '{}': {} tokens, rules [{}]",
            task.name(),
            library.size(),
            constraints.rule_names().join(", ")
        );

        let (cache_capacity, history_capacity) =
            (config.training.cache_capacity, config.training.history_capacity);
        Ok(Self {
            seed: config.training.seed,
            hall_of_fame: HallOfFame::new(config.training.hof_size),
            config,
            task,
            library,
            action_spec,
            constraints,
            evaluator,
            cache: RewardCache::new(cache_capacity),
            pareto_front: ParetoFront::with_capacity(history_capacity),
            history: HashMap::new(),
        })
    }

    /// Override the configured seed (independent runs).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    pub fn pareto_front(&self) -> &ParetoFront {
        &self.pareto_front
    }

    pub fn run<C: ProgressCallback>(&mut self, mut callback: C) -> Result<SearchResult> {
        let training = self.config.training.clone();
        let epochs = training.epochs();
        let device = Default::default();
        <DefaultBackend as Backend>::seed(&device, self.seed);
        let mut controller = Controller::<DefaultBackend>::new(
            &self.config.controller,
            self.library.size(),
            self.constraints.max_length(),
            device,
        );
        let mut optimizer = create_optimizer::<DefaultBackend>(&training);
        let mut trainer = Trainer::new(training.clone()).with_seed(self.seed);
        let mut sampler = BatchSampler::new(self.constraints.clone(), self.seed);
        if trainer.uses_memory() {
            self.warm_start(&controller, &mut sampler, &mut trainer)?;
        }

        let mut all_stats = Vec::with_capacity(epochs);
        let mut failures: BTreeMap<FailureKind, usize> = BTreeMap::new();
        let mut total_programs = 0;
        let mut total_invalid = 0;
        let mut stop_reason = StopReason::SampleBudget;
        let mut best_diagnostics: Option<(String, HashMap<String, f64>)> = None;

        log::info!("Starting search: {} epochs of {} samples (seed {})", epochs, training.batch_size, self.seed);

        for epoch in 0..epochs {
            callback.on_epoch_start(epoch, epochs);
            let started = Instant::now();

            let batch = sampler.sample(&controller, training.batch_size)?;
            let mut programs = Vec::with_capacity(batch.sequences.len());
            let mut trajectories: Vec<&Trajectory> = Vec::with_capacity(batch.sequences.len());
            let mut n_invalid = batch.invalid;
            for sequence in &batch.sequences {
                match Program::new(
                    self.library.clone(),
                    sequence.tokens.clone(),
                    &self.action_spec,
                    training.complexity_measure,
                    self.config.const_optimizer.initial_value,
                ) {
                    Ok(program) => {
                        programs.push(program);
                        trajectories.push(&sequence.trajectory);
                    }
                    Err(SearchError::InvalidProgram(reason)) => {
                        log::debug!("Excluding sampled sequence: {}", reason);
                        n_invalid += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            let (cache_hits, evaluated) = self.evaluate(&mut programs)?;
            let invalid_reward = self.task.invalid_reward();
            let rewards: Vec<f64> = programs
                .iter()
                .map(|p| p.reward().unwrap_or(invalid_reward))
                .collect();

            let step = match trainer.step(&mut controller, &mut optimizer, &trajectories, &rewards, epoch) {
                Ok(step) => Some(step),
                Err(SearchError::NumericInstability(reason)) => {
                    log::warn!("Skipping update at epoch {}: {}", epoch, reason);
                    None
                }
                Err(e) => return Err(e),
            };

            self.update_trackers(&programs);

            let mut epoch_failures: BTreeMap<FailureKind, usize> = BTreeMap::new();
            for kind in programs.iter().filter_map(|p| p.failure()) {
                *epoch_failures.entry(kind).or_default() += 1;
                *failures.entry(kind).or_default() += 1;
            }
            total_programs += programs.len();
            total_invalid += n_invalid;

            let lengths: Vec<f64> = programs.iter().map(|p| p.len() as f64).collect();
            let complexities: Vec<f64> = programs.iter().map(|p| p.complexity() as f64).collect();
            let stats = EpochStats {
                epoch,
                n_programs: programs.len(),
                n_invalid,
                n_dead_ends: batch.dead_ends,
                restarts: batch.restarts,
                mean_reward: mean(&rewards),
                max_reward: rewards.iter().copied().fold(f64::NAN, f64::max),
                quantile_reward: step.as_ref().map_or_else(
                    || select_top_quantile(&rewards, training.epsilon).threshold,
                    |s| s.threshold,
                ),
                best_reward: self.hall_of_fame.best().map_or(f64::NAN, |e| e.reward),
                mean_length: mean(&lengths),
                mean_complexity: mean(&complexities),
                entropy: step.as_ref().map(|s| s.entropy),
                loss: step.as_ref().map(|s| s.loss),
                baseline: step.as_ref().map(|s| s.baseline),
                failures: epoch_failures,
                cache_hits,
                evaluated,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            log::debug!(
                "Epoch {}: median reward {:.4}",
                epoch,
                quantile(&rewards, 0.5)
            );
            callback.on_epoch_complete(&stats, self.hall_of_fame.best());
            all_stats.push(stats);

            if let Some(best) = self.hall_of_fame.best() {
                if training.reward_threshold.is_some_and(|t| best.reward >= t) {
                    log::info!("Reward threshold reached at epoch {}", epoch);
                    stop_reason = StopReason::RewardThreshold;
                    break;
                }
                if training.early_stopping {
                    let key = best.program.key();
                    if best_diagnostics.as_ref().map_or(true, |(k, _)| k != key) {
                        best_diagnostics = Some((key.to_string(), self.task.evaluate(&best.program)));
                    }
                    if best_diagnostics.as_ref().is_some_and(|(_, d)| is_success(d)) {
                        log::info!("Task success at epoch {}: {}", epoch, best.program.to_infix());
                        stop_reason = StopReason::Success;
                        break;
                    }
                }
            }
        }

        let best = self.hall_of_fame.best().map(|entry| {
            let diagnostics = match best_diagnostics {
                Some((key, diagnostics)) if key == entry.program.key() => diagnostics,
                _ => self.task.evaluate(&entry.program),
            };
            BestProgram {
                program: ranked_summary(&entry.program, entry.reward),
                diagnostics,
            }
        });
        let result = SearchResult {
            seed: self.seed,
            best,
            hall_of_fame: self
                .hall_of_fame
                .get_all()
                .iter()
                .map(|e| ranked_summary(&e.program, e.reward))
                .collect(),
            pareto_front: self
                .pareto_front
                .entries()
                .iter()
                .map(|e| ranked_summary(&e.program, e.reward))
                .collect(),
            epochs: all_stats,
            total_programs,
            total_invalid,
            failures,
            stop_reason,
        };
        if let Some(best) = &result.best {
            log::info!(
                "Best program: {} (reward {:.6})",
                best.program.expression,
                best.program.reward.unwrap_or(f64::NAN)
            );
        }
        callback.on_finish(&result);
        Ok(result)
    }

    /// Fill the trainer's memory with a first batch before any update.
    fn warm_start(
        &mut self,
        controller: &Controller<DefaultBackend>,
        sampler: &mut BatchSampler,
        trainer: &mut Trainer,
    ) -> Result<()> {
        let training = &self.config.training;
        let n = training.warm_start.unwrap_or(training.batch_size);
        let batch = sampler.sample(controller, n)?;
        let mut programs = Vec::with_capacity(batch.sequences.len());
        let mut trajectories = Vec::with_capacity(batch.sequences.len());
        for sequence in &batch.sequences {
            if let Ok(program) = Program::new(
                self.library.clone(),
                sequence.tokens.clone(),
                &self.action_spec,
                training.complexity_measure,
                self.config.const_optimizer.initial_value,
            ) {
                programs.push(program);
                trajectories.push(&sequence.trajectory);
            }
        }

        self.evaluate(&mut programs)?;
        let invalid_reward = self.task.invalid_reward();
        let rewards: Vec<f64> = programs
            .iter()
            .map(|p| p.reward().unwrap_or(invalid_reward))
            .collect();
        trainer.remember(&trajectories, &rewards);
        log::debug!(
            "Warm start: {} samples in memory",
            trainer.memory().map_or(0, |m| m.len())
        );
        Ok(())
    }

    /// Evaluate a batch, serving repeated keys from the cache; returns (cache hits, evaluated).
    fn evaluate(&mut self, programs: &mut [Program]) -> Result<(usize, usize)> {
        let use_cache = self.config.training.use_cache && !self.task.stochastic();
        let mut hits = 0;
        let mut pending: Vec<usize> = Vec::new();
        let mut unique: Vec<usize> = Vec::new();
        let mut owner: HashMap<String, usize> = HashMap::new();

        for (i, program) in programs.iter_mut().enumerate() {
            if use_cache {
                if let Some(evaluation) = self.cache.get(program.key()) {
                    program.apply_evaluation(&evaluation);
                    hits += 1;
                    continue;
                }
                if owner.contains_key(program.key()) {
                    pending.push(i);
                    hits += 1;
                    continue;
                }
                owner.insert(program.key().to_string(), i);
            }
            unique.push(i);
        }

        let refs: Vec<&Program> = unique.iter().map(|&i| &programs[i]).collect();
        let evaluations = self.evaluator.evaluate_batch(&refs)?;
        for (&i, evaluation) in unique.iter().zip(&evaluations) {
            programs[i].apply_evaluation(evaluation);
            if use_cache {
                self.cache.insert(programs[i].key().to_string(), evaluation.clone());
            }
        }
        let position: HashMap<usize, usize> =
            unique.iter().enumerate().map(|(k, &i)| (i, k)).collect();
        for i in pending {
            let evaluation = owner
                .get(programs[i].key())
                .and_then(|source| position.get(source))
                .map(|&k| &evaluations[k]);
            if let Some(evaluation) = evaluation {
                programs[i].apply_evaluation(evaluation);
            }
        }

        Ok((hits, unique.len()))
    }

    fn update_trackers(&mut self, programs: &[Program]) {
        let stochastic = self.task.stochastic();
        for program in programs {
            let Some(reward) = program.reward() else {
                continue;
            };
            if program.failure().is_some() {
                continue;
            }
            if stochastic {
                let running = self.history.entry(program.key().to_string()).or_default().push(reward);
                self.hall_of_fame.update(program, running);
                self.pareto_front.update(program, running);
            } else {
                self.hall_of_fame.try_add(program, reward);
                self.pareto_front.insert(program, reward);
            }
        }

        if stochastic {
            let (front, hof) = (&self.pareto_front, &self.hall_of_fame);
            self.history
                .retain(|key, _| front.is_recorded(key) || hof.contains(key));
        }
    }
}

fn ranked_summary(program: &Program, reward: f64) -> ProgramSummary {
    let mut summary = program.summary();
    summary.reward = Some(reward);
    summary
}
