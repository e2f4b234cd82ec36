use crate::data::connectors::CsvConnector;
use crate::error::{Result, SearchError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Column-major regression data with an optional held-out split.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    input_names: Vec<String>,
    x_train: Vec<Vec<f64>>,
    y_train: Vec<f64>,
    x_test: Vec<Vec<f64>>,
    y_test: Vec<f64>,
}

struct Benchmark {
    name: &'static str,
    n_inputs: usize,
    range: (f64, f64),
    function: fn(&[f64]) -> f64,
}

const BENCHMARKS: &[Benchmark] = &[
    Benchmark {
        name: "nguyen1",
        n_inputs: 1,
        range: (-1.0, 1.0),
        function: |x| x[0].powi(3) + x[0].powi(2) + x[0],
    },
    Benchmark {
        name: "nguyen2",
        n_inputs: 1,
        range: (-1.0, 1.0),
        function: |x| x[0].powi(4) + x[0].powi(3) + x[0].powi(2) + x[0],
    },
    Benchmark {
        name: "nguyen3",
        n_inputs: 1,
        range: (-1.0, 1.0),
        function: |x| (1..=5).map(|p| x[0].powi(p)).sum(),
    },
    Benchmark {
        name: "nguyen4",
        n_inputs: 1,
        range: (-1.0, 1.0),
        function: |x| (1..=6).map(|p| x[0].powi(p)).sum(),
    },
    Benchmark {
        name: "nguyen5",
        n_inputs: 1,
        range: (-1.0, 1.0),
        function: |x| (x[0] * x[0]).sin() * x[0].cos() - 1.0,
    },
    Benchmark {
        name: "nguyen6",
        n_inputs: 1,
        range: (-1.0, 1.0),
        function: |x| x[0].sin() + (x[0] + x[0] * x[0]).sin(),
    },
    Benchmark {
        name: "nguyen7",
        n_inputs: 1,
        range: (0.0, 2.0),
        function: |x| (x[0] + 1.0).ln() + (x[0] * x[0] + 1.0).ln(),
    },
    Benchmark {
        name: "nguyen8",
        n_inputs: 1,
        range: (0.0, 4.0),
        function: |x| x[0].sqrt(),
    },
    Benchmark {
        name: "nguyen9",
        n_inputs: 2,
        range: (-1.0, 1.0),
        function: |x| x[0].sin() + (x[1] * x[1]).sin(),
    },
    Benchmark {
        name: "nguyen10",
        n_inputs: 2,
        range: (-1.0, 1.0),
        function: |x| 2.0 * x[0].sin() * x[1].cos(),
    },
    Benchmark {
        name: "nguyen12",
        n_inputs: 2,
        range: (-1.0, 1.0),
        function: |x| x[0].powi(4) - x[0].powi(3) + 0.5 * x[1] * x[1] - x[1],
    },
    Benchmark {
        name: "x_plus_sin",
        n_inputs: 1,
        range: (-3.0, 3.0),
        function: |x| x[0] + x[0].sin(),
    },
];

impl Dataset {
    /// Build from in-memory columns, holding out `test_fraction` of the rows.
    ///
    /// With no held-out rows the training data doubles as the test set.
    pub fn from_columns(
        name: impl Into<String>,
        input_names: Vec<String>,
        inputs: Vec<Vec<f64>>,
        y: Vec<f64>,
        test_fraction: f64,
        seed: u64,
    ) -> Result<Self> {
        let n_rows = y.len();
        if inputs.is_empty() {
            return Err(SearchError::DataLoading("Dataset has no input columns".to_string()));
        }
        if let Some(column) = inputs.iter().position(|col| col.len() != n_rows) {
            return Err(SearchError::DataLoading(format!(
                "Input column {} has {} rows, target has {}",
                column,
                inputs[column].len(),
                n_rows
            )));
        }
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(SearchError::DataLoading(format!(
                "test_fraction must be in [0, 1), got {}",
                test_fraction
            )));
        }
        if y.iter().chain(inputs.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(SearchError::DataLoading("Dataset contains non-finite values".to_string()));
        }

        let n_test = (test_fraction * n_rows as f64).round() as usize;
        if n_test == 0 {
            return Ok(Self {
                name: name.into(),
                input_names,
                x_test: inputs.clone(),
                y_test: y.clone(),
                x_train: inputs,
                y_train: y,
            });
        }
        if n_test >= n_rows {
            return Err(SearchError::DataLoading(format!(
                "Held-out split leaves no training rows ({} rows)",
                n_rows
            )));
        }

        let mut rows: Vec<usize> = (0..n_rows).collect();
        rows.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test_rows, train_rows) = rows.split_at(n_test);
        let pick = |column: &[f64], rows: &[usize]| rows.iter().map(|&r| column[r]).collect::<Vec<_>>();

        Ok(Self {
            name: name.into(),
            input_names,
            x_train: inputs.iter().map(|col| pick(col, train_rows)).collect(),
            y_train: pick(&y, train_rows),
            x_test: inputs.iter().map(|col| pick(col, test_rows)).collect(),
            y_test: pick(&y, test_rows),
        })
    }

    /// Load a numeric CSV; `target` defaults to the last column.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        target: Option<&str>,
        test_fraction: f64,
        seed: u64,
    ) -> Result<Self> {
        let df = CsvConnector::load_and_validate(&path)?;
        let (input_names, inputs, y) = CsvConnector::split_target(&df, target)?;
        let name = path
            .as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset".to_string());
        Self::from_columns(name, input_names, inputs, y, test_fraction, seed)
    }

    /// Generate a named benchmark with separately sampled train and test points.
    pub fn benchmark(name: &str, n_samples: usize, seed: u64) -> Result<Self> {
        let benchmark = BENCHMARKS.iter().find(|b| b.name == name).ok_or_else(|| {
            let known: Vec<&str> = BENCHMARKS.iter().map(|b| b.name).collect();
            SearchError::Configuration(format!(
                "Unknown benchmark '{}' (known: {})",
                name,
                known.join(", ")
            ))
        })?;
        if n_samples < 2 {
            return Err(SearchError::Configuration(
                "benchmark_samples must be at least 2".to_string(),
            ));
        }

        let sample = |rng: &mut StdRng| -> (Vec<Vec<f64>>, Vec<f64>) {
            let (lo, hi) = benchmark.range;
            let mut inputs = vec![Vec::with_capacity(n_samples); benchmark.n_inputs];
            let mut y = Vec::with_capacity(n_samples);
            let mut point = vec![0.0; benchmark.n_inputs];
            for _ in 0..n_samples {
                for (column, value) in inputs.iter_mut().zip(point.iter_mut()) {
                    *value = rng.gen_range(lo..hi);
                    column.push(*value);
                }
                y.push((benchmark.function)(&point));
            }
            (inputs, y)
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let (x_train, y_train) = sample(&mut rng);
        let (x_test, y_test) = sample(&mut rng);
        Ok(Self {
            name: benchmark.name.to_string(),
            input_names: (1..=benchmark.n_inputs).map(|i| format!("x{}", i)).collect(),
            x_train,
            y_train,
            x_test,
            y_test,
        })
    }

    pub fn benchmark_names() -> Vec<&'static str> {
        BENCHMARKS.iter().map(|b| b.name).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn n_inputs(&self) -> usize {
        self.x_train.len()
    }

    pub fn n_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn train_inputs(&self) -> Vec<&[f64]> {
        self.x_train.iter().map(|col| col.as_slice()).collect()
    }

    pub fn test_inputs(&self) -> Vec<&[f64]> {
        self.x_test.iter().map(|col| col.as_slice()).collect()
    }

    pub fn y_train(&self) -> &[f64] {
        &self.y_train
    }

    pub fn y_test(&self) -> &[f64] {
        &self.y_test
    }
}
