mod csv;
mod validator;

pub use csv::{CsvConnector, MIN_ROWS};
pub use validator::DataValidator;
