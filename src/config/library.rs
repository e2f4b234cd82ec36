use super::traits::{invalid, ConfigSection};
use crate::error::SearchError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Operator aliases, `const`, and float literals
    pub function_set: Vec<String>,
    /// Use the protected variants of div, inv, log, sqrt and exp
    pub protected: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            function_set: ["add", "sub", "mul", "div", "sin", "cos", "exp", "log"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            protected: false,
        }
    }
}

impl ConfigSection for LibraryConfig {
    fn section_name() -> &'static str {
        "library"
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.function_set.is_empty() {
            return Err(invalid::<Self>("function_set is empty"));
        }
        Ok(())
    }
}
