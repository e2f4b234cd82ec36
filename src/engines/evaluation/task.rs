use crate::engines::generation::action_spec::ActionSpec;
use crate::engines::generation::program::Program;
use crate::error::{FailureKind, SearchError};
use crate::functions::{Library, LibrarySpec};
use std::collections::HashMap;
use thiserror::Error;

/// Failure raised by a task while scoring a program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Arithmetic failure; the program gets the invalid reward
    #[error("numeric failure: {0}")]
    Numeric(String),

    /// The environment rejected a rollout; the program gets the invalid reward
    #[error("rollout failure: {0}")]
    Rollout(String),

    /// Unrecoverable; aborts the search
    #[error("fatal task error: {0}")]
    Fatal(String),
}

impl TaskError {
    /// Failure category for recoverable errors, `None` for fatal ones.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            TaskError::Numeric(_) => Some(FailureKind::Numeric),
            TaskError::Rollout(_) => Some(FailureKind::Rollout),
            TaskError::Fatal(_) => None,
        }
    }
}

impl From<TaskError> for SearchError {
    fn from(e: TaskError) -> Self {
        match e.failure_kind() {
            Some(kind) => SearchError::RewardEvaluation {
                kind,
                message: e.to_string(),
            },
            None => SearchError::Collaborator(e.to_string()),
        }
    }
}

/// What the search optimizes. Implementations must be safe to call from several threads.
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Tokens the library must contain for this task
    fn library_spec(&self) -> LibrarySpec;

    /// How sampled traversals map onto the task's outputs
    fn action_spec(&self, _library: &Library) -> Result<ActionSpec, SearchError> {
        Ok(ActionSpec::single())
    }

    /// Raw reward of a program with the given constant values
    fn reward(&self, program: &Program, constants: &[f64]) -> Result<f64, TaskError>;

    /// Whether `residuals` returns a vector; selects least-squares constant fitting
    fn has_residuals(&self) -> bool {
        false
    }

    /// Residual vector for least-squares constant fitting, when the task has one
    fn residuals(
        &self,
        _program: &Program,
        _constants: &[f64],
    ) -> Option<Result<Vec<f64>, TaskError>> {
        None
    }

    /// Diagnostics of a finished program; `success` (0/1) drives early stopping
    fn evaluate(&self, program: &Program) -> HashMap<String, f64>;

    /// Reward assigned to programs whose evaluation failed
    fn invalid_reward(&self) -> f64;

    /// Whether repeated evaluations of one program can differ
    fn stochastic(&self) -> bool {
        false
    }
}

/// Reads the `success` diagnostic.
pub fn is_success(diagnostics: &HashMap<String, f64>) -> bool {
    diagnostics.get("success").is_some_and(|&v| v >= 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_mapping() {
        let err: SearchError = TaskError::Numeric("overflow".into()).into();
        assert!(matches!(
            err,
            SearchError::RewardEvaluation {
                kind: FailureKind::Numeric,
                ..
            }
        ));
        let err: SearchError = TaskError::Fatal("lost".into()).into();
        assert!(matches!(err, SearchError::Collaborator(_)));
    }

    #[test]
    fn test_is_success() {
        let mut diagnostics = HashMap::new();
        assert!(!is_success(&diagnostics));
        diagnostics.insert("success".to_string(), 1.0);
        assert!(is_success(&diagnostics));
    }
}
