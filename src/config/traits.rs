use crate::error::SearchError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), SearchError>;
}

/// Shorthand for a configuration error naming its section.
pub(crate) fn invalid<S: ConfigSection>(message: impl Into<String>) -> SearchError {
    SearchError::Configuration(format!("[{}] {}", S::section_name(), message.into()))
}
