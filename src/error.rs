use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Constraint exhaustion after {length} tokens: {reason}")]
    ConstraintExhaustion { length: usize, reason: String },

    #[error("Invalid program: {0}")]
    InvalidProgram(String),

    #[error("Reward evaluation failed ({kind}): {message}")]
    RewardEvaluation { kind: FailureKind, message: String },

    #[error("Numeric instability: {0}")]
    NumericInstability(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Data loading error: {0}")]
    DataLoading(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}

/// Category of a recovered reward evaluation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Division by zero, overflow or another arithmetic domain error.
    Numeric,
    /// The constant optimizer exceeded its wall-clock budget.
    Timeout,
    /// The environment rejected a rollout.
    Rollout,
    /// The reward itself came back as NaN or infinite.
    NonFinite,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Numeric => "numeric",
            FailureKind::Timeout => "timeout",
            FailureKind::Rollout => "rollout",
            FailureKind::NonFinite => "non_finite",
        };
        f.write_str(name)
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_count(text: &str) -> Result<usize, std::num::ParseIntError> {
        text.trim().parse()
    }

    fn checked_count(text: &str) -> Result<usize> {
        parse_count(text).map_err(|e| SearchError::Configuration(e.to_string()))
    }

    #[test]
    fn test_result_alias_accepts_other_errors() {
        assert_eq!(parse_count(" 12 "), Ok(12));
        assert!(parse_count("x").is_err());
        assert!(matches!(checked_count("x"), Err(SearchError::Configuration(_))));
        assert_eq!(FailureKind::NonFinite.to_string(), "non_finite");
    }
}
