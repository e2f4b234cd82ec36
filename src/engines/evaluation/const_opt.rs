//! Inner optimization of free constants.
//!
//! Least-squares tasks are fitted with Levenberg-Marquardt on their residuals; other
//! tasks fall back to Nelder-Mead on the negated reward. Both stop at the iteration
//! cap (keeping the best point found) and fail on the wall-clock limit.

use crate::config::{ConstOptMethod, ConstOptimizerConfig};
use crate::engines::evaluation::task::Task;
use crate::engines::generation::program::Program;
use crate::error::{FailureKind, Result, SearchError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedConstants {
    pub constants: Vec<f64>,
    /// Objective at `constants`: sum of squared residuals, or the negated reward
    pub objective: f64,
    pub iterations: usize,
}

pub(crate) struct Budget {
    pub max_iterations: usize,
    pub deadline: Instant,
    pub tolerance: f64,
}

impl Budget {
    fn check(&self) -> Result<()> {
        if Instant::now() > self.deadline {
            return Err(SearchError::RewardEvaluation {
                kind: FailureKind::Timeout,
                message: "constant optimization exceeded its time limit".to_string(),
            });
        }
        Ok(())
    }
}

pub struct ConstantOptimizer {
    config: ConstOptimizerConfig,
}

impl ConstantOptimizer {
    pub fn new(config: ConstOptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConstOptimizerConfig {
        &self.config
    }

    /// Fit the program's constants for `task`, starting from its current values.
    pub fn optimize(&self, task: &dyn Task, program: &Program) -> Result<OptimizedConstants> {
        let start = program.constants().to_vec();
        let budget = Budget {
            max_iterations: self.config.max_iterations,
            deadline: Instant::now() + Duration::from_millis(self.config.time_limit_ms),
            tolerance: self.config.tolerance,
        };

        let has_residuals = task.has_residuals();
        let use_lm = match self.config.method {
            ConstOptMethod::Auto | ConstOptMethod::LevenbergMarquardt => has_residuals,
            ConstOptMethod::NelderMead => false,
        };
        if self.config.method == ConstOptMethod::LevenbergMarquardt && !has_residuals {
            log::debug!("Task '{}' has no residuals, using Nelder-Mead", task.name());
        }

        if use_lm {
            levenberg_marquardt(
                |c| match task.residuals(program, c) {
                    Some(result) => result.map_err(SearchError::from),
                    None => Err(SearchError::Collaborator(
                        "residuals disappeared during optimization".to_string(),
                    )),
                },
                start,
                &budget,
            )
        } else {
            nelder_mead(
                |c| task.reward(program, c).map(|r| -r).map_err(SearchError::from),
                start,
                &budget,
            )
        }
    }
}

/// Recoverable failures at trial points count as an infinitely bad objective.
fn soften(value: Result<f64>) -> Result<f64> {
    match value {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) | Err(SearchError::RewardEvaluation { .. }) => Ok(f64::INFINITY),
        Err(e) => Err(e),
    }
}

fn non_finite(what: &str) -> SearchError {
    SearchError::RewardEvaluation {
        kind: FailureKind::NonFinite,
        message: format!("{} is not finite", what),
    }
}

pub(crate) fn nelder_mead(
    objective: impl Fn(&[f64]) -> Result<f64>,
    start: Vec<f64>,
    budget: &Budget,
) -> Result<OptimizedConstants> {
    const REFLECT: f64 = 1.0;
    const EXPAND: f64 = 2.0;
    const CONTRACT: f64 = 0.5;
    const SHRINK: f64 = 0.5;

    let n = start.len();
    let f0 = objective(&start)?;
    if !f0.is_finite() {
        return Err(non_finite("objective at the starting point"));
    }
    if n == 0 {
        return Ok(OptimizedConstants {
            constants: start,
            objective: f0,
            iterations: 0,
        });
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = vec![(start.clone(), f0)];
    for i in 0..n {
        let mut vertex = start.clone();
        vertex[i] = if vertex[i] != 0.0 { vertex[i] * 1.05 } else { 0.00025 };
        let value = soften(objective(&vertex))?;
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    while iterations < budget.max_iterations {
        budget.check()?;
        iterations += 1;
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[n].1;
        if (worst - best).abs() <= budget.tolerance * (1.0 + best.abs()) {
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |scale: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n].0)
                .map(|(c, w)| c + scale * (c - w))
                .collect()
        };

        let reflected = towards(REFLECT);
        let f_reflected = soften(objective(&reflected))?;

        if f_reflected < best {
            let expanded = towards(EXPAND);
            let f_expanded = soften(objective(&expanded))?;
            simplex[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
        } else if f_reflected < simplex[n - 1].1 {
            simplex[n] = (reflected, f_reflected);
        } else {
            let contracted = towards(-CONTRACT);
            let f_contracted = soften(objective(&contracted))?;
            if f_contracted < worst {
                simplex[n] = (contracted, f_contracted);
            } else {
                let anchor = simplex[0].0.clone();
                for (vertex, value) in simplex.iter_mut().skip(1) {
                    for (x, a) in vertex.iter_mut().zip(&anchor) {
                        *x = a + SHRINK * (*x - a);
                    }
                    *value = soften(objective(vertex))?;
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (constants, objective) = simplex.swap_remove(0);
    if !objective.is_finite() {
        return Err(non_finite("optimized objective"));
    }
    Ok(OptimizedConstants {
        constants,
        objective,
        iterations,
    })
}

fn sum_squares(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

fn softened_cost(residuals: Result<Vec<f64>>) -> Result<(Vec<f64>, f64)> {
    match residuals {
        Ok(r) => {
            let cost = sum_squares(&r);
            Ok(if cost.is_finite() { (r, cost) } else { (r, f64::INFINITY) })
        }
        Err(SearchError::RewardEvaluation { .. }) => Ok((Vec::new(), f64::INFINITY)),
        Err(e) => Err(e),
    }
}

pub(crate) fn levenberg_marquardt(
    residuals: impl Fn(&[f64]) -> Result<Vec<f64>>,
    start: Vec<f64>,
    budget: &Budget,
) -> Result<OptimizedConstants> {
    const MAX_DAMPING_TRIES: usize = 10;

    let n = start.len();
    let mut x = start;
    let mut r = residuals(&x)?;
    let mut cost = sum_squares(&r);
    if !cost.is_finite() {
        return Err(non_finite("residuals at the starting point"));
    }
    if n == 0 {
        return Ok(OptimizedConstants {
            constants: x,
            objective: cost,
            iterations: 0,
        });
    }

    let mut lambda = 1e-3;
    let mut iterations = 0;
    while iterations < budget.max_iterations {
        budget.check()?;
        iterations += 1;

        // Forward-difference Jacobian, one column per constant
        let m = r.len();
        let mut jacobian = vec![vec![0.0; n]; m];
        for j in 0..n {
            let step = 1e-7 * x[j].abs().max(1.0);
            let mut shifted = x.clone();
            shifted[j] += step;
            let (r_shifted, c_shifted) = softened_cost(residuals(&shifted))?;
            if !c_shifted.is_finite() || r_shifted.len() != m {
                continue;
            }
            for i in 0..m {
                jacobian[i][j] = (r_shifted[i] - r[i]) / step;
            }
        }

        let mut jtj = vec![vec![0.0; n]; n];
        let mut jtr = vec![0.0; n];
        for (row, &ri) in jacobian.iter().zip(&r) {
            for a in 0..n {
                jtr[a] += row[a] * ri;
                for b in 0..n {
                    jtj[a][b] += row[a] * row[b];
                }
            }
        }

        let mut accepted = None;
        for _ in 0..MAX_DAMPING_TRIES {
            let mut damped = jtj.clone();
            for (k, row) in damped.iter_mut().enumerate() {
                row[k] += lambda * jtj[k][k].max(1e-12);
            }
            let rhs: Vec<f64> = jtr.iter().map(|g| -g).collect();
            let Some(delta) = solve_linear(damped, rhs) else {
                lambda *= 10.0;
                continue;
            };
            let candidate: Vec<f64> = x.iter().zip(&delta).map(|(a, d)| a + d).collect();
            let (r_candidate, c_candidate) = softened_cost(residuals(&candidate))?;
            if c_candidate < cost {
                accepted = Some((candidate, r_candidate, c_candidate));
                lambda = (lambda / 10.0).max(1e-12);
                break;
            }
            lambda *= 10.0;
        }

        let Some((candidate, r_candidate, c_candidate)) = accepted else {
            break;
        };
        let improvement = cost - c_candidate;
        x = candidate;
        r = r_candidate;
        cost = c_candidate;
        if improvement <= budget.tolerance * (1.0 + cost) {
            break;
        }
    }

    Ok(OptimizedConstants {
        constants: x,
        objective: cost,
        iterations,
    })
}

/// Gaussian elimination with partial pivoting; `None` for singular systems.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
