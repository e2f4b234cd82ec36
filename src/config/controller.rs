use super::traits::{invalid, ConfigSection};
use crate::error::SearchError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// LSTM hidden size
    pub num_units: usize,
    /// Size of the action, parent and sibling embeddings
    pub embedding_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            num_units: 32,
            embedding_size: 8,
        }
    }
}

impl ConfigSection for ControllerConfig {
    fn section_name() -> &'static str {
        "controller"
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.num_units == 0 || self.embedding_size == 0 {
            return Err(invalid::<Self>("num_units and embedding_size must be positive"));
        }
        Ok(())
    }
}
