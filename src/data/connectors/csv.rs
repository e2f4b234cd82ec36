use super::validator::DataValidator;
use crate::error::{Result, SearchError};
use polars::prelude::*;
use std::path::Path;

/// Minimum rows for a dataset to be worth fitting
pub const MIN_ROWS: usize = 2;

pub struct CsvConnector;

impl CsvConnector {
    /// Load CSV file into DataFrame
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()
            .map_err(|e| SearchError::DataLoading(format!("Failed to read CSV: {}", e)))?;

        Ok(df)
    }

    /// Load and validate a plain numeric CSV file
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = Self::load(&path)?;
        DataValidator::validate_numeric(&df)?;
        DataValidator::validate_minimum_rows(&df, MIN_ROWS)?;
        log::info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.as_ref().display()
        );
        Ok(df)
    }

    /// Extract a column as `f64` values
    pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
        let column = df.column(name)?.cast(&DataType::Float64)?;
        let values = column.f64()?;
        values
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| {
                    SearchError::DataLoading(format!("Null value in '{}' at row {}", name, row))
                })
            })
            .collect()
    }

    /// Split a frame into input columns and a target column.
    ///
    /// The target defaults to the last column; every other column is an input.
    pub fn split_target(
        df: &DataFrame,
        target: Option<&str>,
    ) -> Result<(Vec<String>, Vec<Vec<f64>>, Vec<f64>)> {
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let target_name = match target {
            Some(name) => names
                .iter()
                .find(|col| col.as_str() == name)
                .cloned()
                .ok_or_else(|| {
                    SearchError::DataLoading(format!(
                        "Target column '{}' not found (columns: {:?})",
                        name, names
                    ))
                })?,
            None => names
                .last()
                .cloned()
                .ok_or_else(|| SearchError::DataLoading("Empty data frame".to_string()))?,
        };

        let input_names: Vec<String> = names.into_iter().filter(|n| *n != target_name).collect();
        let inputs = input_names
            .iter()
            .map(|name| Self::column_values(df, name))
            .collect::<Result<Vec<_>>>()?;
        let y = Self::column_values(df, &target_name)?;

        Ok((input_names, inputs, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use std::io::Write;

    #[test]
    fn test_split_default_target() {
        let df = df! {
            "a" => &[1.0, 2.0],
            "b" => &[3i64, 4],
            "y" => &[5.0, 6.0],
        }
        .unwrap();

        let (names, inputs, y) = CsvConnector::split_target(&df, None).unwrap();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(inputs[1], vec![3.0, 4.0]);
        assert_eq!(y, vec![5.0, 6.0]);
    }

    #[test]
    fn test_split_named_target() {
        let df = df! {
            "y" => &[5.0, 6.0],
            "a" => &[1.0, 2.0],
        }
        .unwrap();

        let (names, _, y) = CsvConnector::split_target(&df, Some("y")).unwrap();
        assert_eq!(names, vec!["a"]);
        assert_eq!(y, vec![5.0, 6.0]);
        assert!(CsvConnector::split_target(&df, Some("z")).is_err());
    }

    #[test]
    fn test_load_and_validate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x,y\n0.0,1.0\n1.0,2.0\n2.0,3.0").unwrap();

        let df = CsvConnector::load_and_validate(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(CsvConnector::column_values(&df, "y").unwrap(), vec![1.0, 2.0, 3.0]);
    }
}
