use crate::config::{LibraryConfig, RegressionConfig, RegressionMetric};
use crate::data::Dataset;
use crate::engines::evaluation::task::{Task, TaskError};
use crate::engines::generation::program::Program;
use crate::engines::metrics::FitMetrics;
use crate::error::Result;
use crate::functions::LibrarySpec;
use std::collections::HashMap;

/// Symbolic regression against a dataset.
pub struct RegressionTask {
    dataset: Dataset,
    function_set: Vec<String>,
    protected: bool,
    metric: RegressionMetric,
    success_threshold: f64,
    /// Population variance of the training targets (1 when the targets are constant)
    var_y: f64,
}

impl RegressionTask {
    pub fn new(dataset: Dataset, library: &LibraryConfig, config: &RegressionConfig) -> Self {
        let var_y = FitMetrics::variance(dataset.y_train());
        Self {
            dataset,
            function_set: library.function_set.clone(),
            protected: library.protected,
            metric: config.metric,
            success_threshold: config.success_threshold,
            var_y: if var_y > 0.0 { var_y } else { 1.0 },
        }
    }

    /// Load the configured CSV dataset, or generate the configured benchmark.
    pub fn from_config(library: &LibraryConfig, config: &RegressionConfig, seed: u64) -> Result<Self> {
        let dataset = match (&config.dataset, &config.benchmark) {
            (Some(path), _) => {
                Dataset::from_csv(path, config.target.as_deref(), config.test_fraction, seed)?
            }
            (None, Some(name)) => Dataset::benchmark(name, config.benchmark_samples, seed)?,
            (None, None) => {
                return Err(crate::error::SearchError::Configuration(
                    "regression needs a dataset or a benchmark".to_string(),
                ))
            }
        };
        log::info!(
            "Regression task on '{}': {} inputs, {} training rows, metric {:?}",
            dataset.name(),
            dataset.n_inputs(),
            dataset.n_train(),
            config.metric
        );
        Ok(Self::new(dataset, library, config))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn predict(
        &self,
        program: &Program,
        inputs: &[&[f64]],
        constants: &[f64],
    ) -> std::result::Result<Vec<f64>, TaskError> {
        let y_hat = program
            .execute_segment(0, inputs, constants)
            .map_err(|e| TaskError::Fatal(e.to_string()))?;
        if y_hat.iter().any(|v| !v.is_finite()) {
            return Err(TaskError::Numeric(format!(
                "'{}' produced non-finite predictions",
                program.key()
            )));
        }
        Ok(y_hat)
    }

    fn score(&self, mse: f64) -> f64 {
        let nmse = mse / self.var_y;
        match self.metric {
            RegressionMetric::InvNrmse => 1.0 / (1.0 + nmse.sqrt()),
            RegressionMetric::NegNrmse => -nmse.sqrt(),
            RegressionMetric::NegMse => -mse,
            RegressionMetric::R2 => 1.0 - nmse,
        }
    }
}

impl Task for RegressionTask {
    fn name(&self) -> &str {
        "regression"
    }

    fn library_spec(&self) -> LibrarySpec {
        LibrarySpec {
            function_set: self.function_set.clone(),
            n_inputs: self.dataset.n_inputs(),
            anchor_dims: Vec::new(),
            protected: self.protected,
        }
    }

    fn reward(&self, program: &Program, constants: &[f64]) -> std::result::Result<f64, TaskError> {
        let y_hat = self.predict(program, &self.dataset.train_inputs(), constants)?;
        Ok(self.score(FitMetrics::mse(self.dataset.y_train(), &y_hat)))
    }

    fn has_residuals(&self) -> bool {
        true
    }

    fn residuals(
        &self,
        program: &Program,
        constants: &[f64],
    ) -> Option<std::result::Result<Vec<f64>, TaskError>> {
        let residuals = self
            .predict(program, &self.dataset.train_inputs(), constants)
            .map(|y_hat| {
                y_hat
                    .iter()
                    .zip(self.dataset.y_train())
                    .map(|(a, b)| a - b)
                    .collect()
            });
        Some(residuals)
    }

    fn evaluate(&self, program: &Program) -> HashMap<String, f64> {
        let y_test = self.dataset.y_test();
        let mut diagnostics = HashMap::new();
        let Ok(y_hat) = self.predict(program, &self.dataset.test_inputs(), program.constants()) else {
            diagnostics.insert("success".to_string(), 0.0);
            return diagnostics;
        };

        let metrics = FitMetrics::calculate(y_test, &y_hat);
        let mse = metrics.get("mse").copied().unwrap_or(f64::INFINITY);
        let nmse = metrics.get("nmse").copied().unwrap_or(mse);
        diagnostics.insert("mse_test".to_string(), mse);
        diagnostics.insert("nmse_test".to_string(), nmse);
        if let Some(&r2) = metrics.get("r2") {
            diagnostics.insert("r2_test".to_string(), r2);
        }
        let success = nmse < self.success_threshold;
        diagnostics.insert("success".to_string(), if success { 1.0 } else { 0.0 });
        diagnostics
    }

    fn invalid_reward(&self) -> f64 {
        match self.metric {
            RegressionMetric::InvNrmse | RegressionMetric::R2 => 0.0,
            RegressionMetric::NegNrmse => -1.0,
            RegressionMetric::NegMse => -self.var_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evaluation::task::is_success;
    use crate::engines::generation::action_spec::ActionSpec;
    use crate::functions::{FunctionRegistry, Library};
    use crate::types::ComplexityMeasure;
    use std::sync::Arc;

    fn task(metric: RegressionMetric) -> RegressionTask {
        let library = LibraryConfig {
            function_set: vec!["add".into(), "mul".into(), "div".into(), "sin".into(), "const".into()],
            protected: false,
        };
        let config = RegressionConfig {
            benchmark: Some("nguyen1".into()),
            metric,
            ..Default::default()
        };
        RegressionTask::from_config(&library, &config, 11).unwrap()
    }

    fn program(task: &RegressionTask, text: &str) -> Program {
        let library = Arc::new(Library::build(&task.library_spec(), &FunctionRegistry::new()).unwrap());
        let traversal = library.actionize(text).unwrap();
        Program::new(library, traversal, &ActionSpec::single(), ComplexityMeasure::Token, 1.0).unwrap()
    }

    #[test]
    fn test_exact_expression_scores_perfectly() {
        let task = task(RegressionMetric::InvNrmse);
        let exact = program(&task, "add,x1,mul,x1,add,x1,mul,x1,x1");
        let reward = task.reward(&exact, &[]).unwrap();
        assert!((reward - 1.0).abs() < 1e-9);

        let diagnostics = task.evaluate(&exact);
        assert!(is_success(&diagnostics));
        assert!((diagnostics["r2_test"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_order_programs_consistently() {
        for metric in [
            RegressionMetric::InvNrmse,
            RegressionMetric::NegNrmse,
            RegressionMetric::NegMse,
            RegressionMetric::R2,
        ] {
            let task = task(metric);
            let close = task.reward(&program(&task, "add,x1,mul,x1,x1"), &[]).unwrap();
            let far = task.reward(&program(&task, "sin,x1"), &[]).unwrap();
            assert!(close > far, "{:?}", metric);
        }
    }

    #[test]
    fn test_reward_is_deterministic() {
        let task = task(RegressionMetric::InvNrmse);
        let p = program(&task, "mul,const,sin,x1");
        assert_eq!(task.reward(&p, &[2.0]).unwrap(), task.reward(&p, &[2.0]).unwrap());
        let residuals = task.residuals(&p, &[2.0]).unwrap().unwrap();
        assert_eq!(residuals.len(), task.dataset().n_train());
    }

    #[test]
    fn test_non_finite_predictions_are_numeric_failures() {
        let task = task(RegressionMetric::InvNrmse);
        let p = program(&task, "div,x1,mul,const,x1");
        assert!(matches!(task.reward(&p, &[0.0]), Err(TaskError::Numeric(_))));
        assert_eq!(task.invalid_reward(), 0.0);
    }
}
