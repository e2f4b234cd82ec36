use crate::config::ConstOptimizerConfig;
use crate::engines::evaluation::const_opt::ConstantOptimizer;
use crate::engines::evaluation::task::Task;
use crate::engines::generation::program::Program;
use crate::error::{FailureKind, Result, SearchError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Outcome of scoring one program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Task reward before the complexity penalty
    pub raw_reward: f64,
    pub reward: f64,
    /// Fitted constant values (the starting values when nothing was fitted)
    pub constants: Vec<f64>,
    pub failure: Option<FailureKind>,
}

/// Scores programs against a task, fitting constants first when a program has any.
pub struct RewardEvaluator {
    task: Arc<dyn Task>,
    optimizer: ConstantOptimizer,
    complexity_weight: f64,
    pool: rayon::ThreadPool,
}

impl RewardEvaluator {
    /// `n_cores` sizes the evaluation pool; `0` uses one thread per CPU.
    pub fn new(
        task: Arc<dyn Task>,
        const_optimizer: ConstOptimizerConfig,
        complexity_weight: f64,
        n_cores: usize,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_cores)
            .thread_name(|i| format!("reward-{}", i))
            .build()
            .map_err(|e| {
                SearchError::Configuration(format!("Failed to build evaluation pool: {}", e))
            })?;
        log::debug!(
            "Reward evaluation pool for task '{}' has {} threads",
            task.name(),
            pool.current_num_threads()
        );

        Ok(Self {
            task,
            optimizer: ConstantOptimizer::new(const_optimizer),
            complexity_weight,
            pool,
        })
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn penalize(&self, raw_reward: f64, complexity: usize) -> f64 {
        raw_reward - self.complexity_weight * complexity as f64
    }

    /// Score one program. Only fatal task errors are returned as `Err`; recoverable
    /// failures score the task's invalid reward, penalized like any other program.
    pub fn evaluate(&self, program: &Program) -> Result<Evaluation> {
        let mut constants = program.constants().to_vec();

        if !constants.is_empty() {
            match self.optimizer.optimize(self.task.as_ref(), program) {
                Ok(fit) => constants = fit.constants,
                Err(SearchError::RewardEvaluation { kind, message }) => {
                    return Ok(self.failed(program, kind, &message, constants));
                }
                Err(e) => return Err(e),
            }
        }

        match self.task.reward(program, &constants) {
            Ok(raw_reward) if raw_reward.is_finite() => Ok(Evaluation {
                raw_reward,
                reward: self.penalize(raw_reward, program.complexity()),
                constants,
                failure: None,
            }),
            Ok(raw_reward) => Ok(self.failed(
                program,
                FailureKind::NonFinite,
                &format!("reward is {}", raw_reward),
                constants,
            )),
            Err(e) => match e.failure_kind() {
                Some(kind) => Ok(self.failed(program, kind, &e.to_string(), constants)),
                None => Err(e.into()),
            },
        }
    }

    /// Score a batch on the evaluation pool, isolating panics per program.
    pub fn evaluate_batch(&self, programs: &[&Program]) -> Result<Vec<Evaluation>> {
        let results: Vec<Result<Evaluation>> = self.pool.install(|| {
            programs
                .par_iter()
                .map(|program| {
                    catch_unwind(AssertUnwindSafe(|| self.evaluate(program))).unwrap_or_else(
                        |payload| {
                            Err(SearchError::Collaborator(format!(
                                "task '{}' panicked on '{}': {}",
                                self.task.name(),
                                program.key(),
                                panic_message(payload.as_ref())
                            )))
                        },
                    )
                })
                .collect()
        });
        results.into_iter().collect()
    }

    fn failed(
        &self,
        program: &Program,
        kind: FailureKind,
        message: &str,
        constants: Vec<f64>,
    ) -> Evaluation {
        log::debug!("Evaluation of '{}' failed ({}): {}", program.key(), kind, message);
        let invalid = self.task.invalid_reward();
        Evaluation {
            raw_reward: invalid,
            reward: self.penalize(invalid, program.complexity()),
            constants,
            failure: Some(kind),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evaluation::task::TaskError;
    use crate::engines::generation::action_spec::ActionSpec;
    use crate::functions::{FunctionRegistry, Library, LibrarySpec};
    use crate::types::ComplexityMeasure;
    use std::collections::HashMap;

    /// Fits y = 3x; panics on `sin`, returns NaN on `cos`, fails numerically on `div`.
    struct LineTask {
        xs: Vec<f64>,
        ys: Vec<f64>,
    }

    impl LineTask {
        fn new() -> Self {
            let xs: Vec<f64> = (1..=10).map(|i| i as f64 / 2.0).collect();
            let ys = xs.iter().map(|x| 3.0 * x).collect();
            Self { xs, ys }
        }

        fn errors(&self, program: &Program, constants: &[f64]) -> Result<Vec<f64>, TaskError> {
            let key = program.key();
            if key.starts_with("sin") {
                panic!("broken collaborator");
            }
            if key.starts_with("div") {
                return Err(TaskError::Numeric("division".into()));
            }
            let y_hat = program
                .execute_segment(0, &[&self.xs], constants)
                .map_err(|e| TaskError::Fatal(e.to_string()))?;
            Ok(y_hat.iter().zip(&self.ys).map(|(a, b)| a - b).collect())
        }
    }

    impl Task for LineTask {
        fn name(&self) -> &str {
            "line"
        }

        fn library_spec(&self) -> LibrarySpec {
            LibrarySpec {
                function_set: vec!["mul".into(), "div".into(), "sin".into(), "cos".into(), "const".into()],
                n_inputs: 1,
                anchor_dims: vec![],
                protected: false,
            }
        }

        fn reward(&self, program: &Program, constants: &[f64]) -> Result<f64, TaskError> {
            if program.key().starts_with("cos") {
                return Ok(f64::NAN);
            }
            let errors = self.errors(program, constants)?;
            let mse = errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64;
            Ok(1.0 / (1.0 + mse.sqrt()))
        }

        fn has_residuals(&self) -> bool {
            true
        }

        fn residuals(
            &self,
            program: &Program,
            constants: &[f64],
        ) -> Option<Result<Vec<f64>, TaskError>> {
            Some(self.errors(program, constants))
        }

        fn evaluate(&self, _program: &Program) -> HashMap<String, f64> {
            HashMap::new()
        }

        fn invalid_reward(&self) -> f64 {
            0.0
        }
    }

    fn setup(complexity_weight: f64) -> (Arc<Library>, RewardEvaluator) {
        let task = Arc::new(LineTask::new());
        let library = Arc::new(Library::build(&task.library_spec(), &FunctionRegistry::new()).unwrap());
        let evaluator =
            RewardEvaluator::new(task, ConstOptimizerConfig::default(), complexity_weight, 2).unwrap();
        (library, evaluator)
    }

    fn program(library: &Arc<Library>, text: &str) -> Program {
        Program::new(
            library.clone(),
            library.actionize(text).unwrap(),
            &ActionSpec::single(),
            ComplexityMeasure::Length,
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_constants_are_fitted() {
        let (library, evaluator) = setup(0.0);
        let evaluation = evaluator.evaluate(&program(&library, "mul,const,x1")).unwrap();
        assert!(evaluation.failure.is_none());
        assert!((evaluation.constants[0] - 3.0).abs() < 1e-4);
        assert!(evaluation.reward > 0.999);
    }

    #[test]
    fn test_complexity_penalty() {
        let (library, evaluator) = setup(0.01);
        let evaluation = evaluator.evaluate(&program(&library, "mul,x1,x1")).unwrap();
        assert!((evaluation.raw_reward - evaluation.reward - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_recoverable_failures_get_invalid_reward() {
        let (library, evaluator) = setup(0.0);
        let evaluation = evaluator.evaluate(&program(&library, "div,x1,x1")).unwrap();
        assert_eq!(evaluation.failure, Some(FailureKind::Numeric));
        assert_eq!(evaluation.reward, 0.0);

        let evaluation = evaluator.evaluate(&program(&library, "cos,x1")).unwrap();
        assert_eq!(evaluation.failure, Some(FailureKind::NonFinite));
    }

    #[test]
    fn test_failures_carry_the_complexity_penalty() {
        let (library, evaluator) = setup(0.1);
        let valid = evaluator.evaluate(&program(&library, "mul,x1,x1")).unwrap();
        let failed = evaluator.evaluate(&program(&library, "div,x1,x1")).unwrap();

        assert!(valid.failure.is_none());
        assert_eq!(failed.failure, Some(FailureKind::Numeric));
        assert_eq!(failed.raw_reward, 0.0);
        assert!((failed.reward + 0.3).abs() < 1e-12);
        assert!(valid.reward < 0.0);
        assert!(valid.reward > failed.reward);
    }

    #[test]
    fn test_reevaluation_with_fitted_constants_is_deterministic() {
        let (library, evaluator) = setup(0.01);
        let line = program(&library, "mul,const,x1");
        let first = evaluator.evaluate(&line).unwrap();
        let second = evaluator.evaluate(&line).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_batch_preserves_order_and_isolates_panics() {
        let (library, evaluator) = setup(0.0);
        let good = program(&library, "mul,x1,x1");
        let line = program(&library, "mul,const,x1");
        let evaluations = evaluator.evaluate_batch(&[&good, &line]).unwrap();
        assert_eq!(evaluations.len(), 2);
        assert!(evaluations[1].reward > evaluations[0].reward);

        let broken = program(&library, "sin,x1");
        let err = evaluator.evaluate_batch(&[&good, &broken]).unwrap_err();
        assert!(matches!(err, SearchError::Collaborator(_)));
    }
}
