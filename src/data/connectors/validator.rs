use crate::error::{Result, SearchError};
use polars::prelude::*;

pub struct DataValidator;

impl DataValidator {
    /// Validate that every column is numeric and null-free
    pub fn validate_numeric(df: &DataFrame) -> Result<()> {
        if df.width() < 2 {
            return Err(SearchError::DataLoading(format!(
                "Need at least one input and one target column, found {}",
                df.width()
            )));
        }

        for column in df.get_columns() {
            if !matches!(
                column.dtype(),
                DataType::Float64
                    | DataType::Float32
                    | DataType::Int64
                    | DataType::Int32
                    | DataType::UInt64
                    | DataType::UInt32
            ) {
                return Err(SearchError::DataLoading(format!(
                    "Column '{}' must be numeric, found {:?}",
                    column.name(),
                    column.dtype()
                )));
            }
        }

        let null_report = Self::check_nulls(df)?;
        if !null_report.is_empty() {
            return Err(SearchError::DataLoading(format!(
                "Null values detected: {:?}",
                null_report
            )));
        }

        Ok(())
    }

    /// Check for minimum required rows
    pub fn validate_minimum_rows(df: &DataFrame, min_rows: usize) -> Result<()> {
        if df.height() < min_rows {
            return Err(SearchError::DataLoading(format!(
                "Insufficient data: {} rows, minimum {} required",
                df.height(),
                min_rows
            )));
        }
        Ok(())
    }

    /// Null counts of the columns that have any
    pub fn check_nulls(df: &DataFrame) -> Result<Vec<(String, usize)>> {
        let mut null_report = Vec::new();

        for column in df.get_columns() {
            let null_count = column.null_count();
            if null_count > 0 {
                null_report.push((column.name().to_string(), null_count));
            }
        }

        Ok(null_report)
    }
}
