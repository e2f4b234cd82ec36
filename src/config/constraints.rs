use super::traits::{invalid, ConfigSection};
use crate::error::SearchError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintsConfig {
    pub max_length: usize,
    pub min_length: usize,
    /// Reject tokens that could not be closed within `max_length`
    pub enforce_arity: bool,
    pub enforce_min_length: bool,
    /// Forbidden (parent, child) pairs
    pub relational: Vec<RelationalRule>,
    /// Forbid an operator directly wrapping its inverse
    pub inverse: bool,
    /// Operators that may not directly wrap themselves
    pub self_repeat: Vec<String>,
    pub enforce_domain: bool,
    pub domain: Vec<DomainRule>,
    /// Forbid subtrees made of free constants only
    pub constant_only: bool,
    pub no_nested_trig: bool,
    pub repeat: Vec<RepeatRule>,
    /// Extra batched sampling rounds for dead-end sequences
    pub max_restarts: usize,
    /// Complete truncated sequences with the first input instead of discarding them
    pub fill_on_truncation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationalRule {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    NonZero,
    Positive,
    NonNegative,
}

impl Domain {
    pub fn admits(self, value: f64) -> bool {
        match self {
            Domain::NonZero => value != 0.0,
            Domain::Positive => value > 0.0,
            Domain::NonNegative => value >= 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRule {
    pub operator: String,
    /// Zero-based argument index
    pub arg: usize,
    pub domain: Domain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatRule {
    pub token: String,
    pub max: usize,
}

impl DomainRule {
    fn new(operator: &str, arg: usize, domain: Domain) -> Self {
        Self {
            operator: operator.to_string(),
            arg,
            domain,
        }
    }
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        Self {
            max_length: 30,
            min_length: 4,
            enforce_arity: true,
            enforce_min_length: true,
            relational: Vec::new(),
            inverse: true,
            self_repeat: vec!["neg".to_string(), "abs".to_string()],
            enforce_domain: true,
            domain: vec![
                DomainRule::new("div", 1, Domain::NonZero),
                DomainRule::new("inv", 0, Domain::NonZero),
                DomainRule::new("log", 0, Domain::Positive),
                DomainRule::new("sqrt", 0, Domain::NonNegative),
            ],
            constant_only: true,
            no_nested_trig: true,
            repeat: Vec::new(),
            max_restarts: 10,
            fill_on_truncation: false,
        }
    }
}

impl ConfigSection for ConstraintsConfig {
    fn section_name() -> &'static str {
        "constraints"
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.max_length == 0 {
            return Err(invalid::<Self>("max_length must be positive"));
        }
        if self.enforce_min_length && self.min_length > self.max_length {
            return Err(invalid::<Self>("min_length cannot exceed max_length"));
        }
        if let Some(rule) = self.domain.iter().find(|r| r.arg > 1) {
            return Err(invalid::<Self>(format!(
                "domain rule for '{}' names argument {}, operators take at most two",
                rule.operator, rule.arg
            )));
        }
        if let Some(rule) = self.repeat.iter().find(|r| r.max == 0) {
            return Err(invalid::<Self>(format!(
                "repeat limit for '{}' must be positive; remove the token instead",
                rule.token
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_admits() {
        assert!(!Domain::NonZero.admits(0.0));
        assert!(Domain::NonZero.admits(-1.0));
        assert!(!Domain::Positive.admits(0.0));
        assert!(Domain::NonNegative.admits(0.0));
        assert!(!Domain::NonNegative.admits(-0.5));
    }

    #[test]
    fn test_validation() {
        assert!(ConstraintsConfig::default().validate().is_ok());
        let config = ConstraintsConfig {
            min_length: 40,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
