//! Numeric weight optimization
//!
//! The solver is an opaque seam: anything that can maximize a
//! differentiable function fits behind `Solver`. `GradientSolver` is the
//! built-in reference implementation (steepest ascent with backtracking
//! line search); `WeightOptimizer` couples a solver to a `Score` and
//! keeps the two synchronized with the structure learner.

use crate::error::{MlnError, Result};
use crate::fol::Formula;
use crate::score::Score;
use std::sync::Arc;

/// A differentiable objective to maximize.
pub trait Differentiable {
    fn value(&self, x: &[f64]) -> Result<f64>;
    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>>;
}

/// Adapter exposing a `Score` as a plain differentiable function.
pub struct ScoreObjective<'a>(pub &'a dyn Score);

impl<'a> Differentiable for ScoreObjective<'a> {
    fn value(&self, x: &[f64]) -> Result<f64> {
        self.0.value(x)
    }

    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.0.gradient(x)
    }
}

/// Result of a successful solve.
#[derive(Debug, Clone)]
pub struct Solution {
    pub weights: Vec<f64>,
    pub objective: f64,
}

/// An opaque solver maximizing a differentiable function.
pub trait Solver: Send + Sync {
    /// Maximize `objective` starting from `initial`. Fails with a
    /// convergence error when no progress is possible (non-finite
    /// values, failed line search); never retries internally.
    fn solve(&self, initial: &[f64], objective: &dyn Differentiable) -> Result<Solution>;
}

/// Configuration for the reference gradient solver.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub max_iterations: usize,
    /// Gradient norm below which the solve is considered converged.
    pub tolerance: f64,
    pub initial_step: f64,
    /// Line-search floor; stepping below it without improvement is a
    /// convergence failure.
    pub min_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_iterations: 200,
            tolerance: 1e-6,
            initial_step: 1.0,
            min_step: 1e-12,
        }
    }
}

/// Steepest ascent with backtracking (Armijo) line search.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientSolver {
    pub config: SolverConfig,
}

impl GradientSolver {
    pub fn new(config: SolverConfig) -> Self {
        GradientSolver { config }
    }
}

impl Solver for GradientSolver {
    fn solve(&self, initial: &[f64], objective: &dyn Differentiable) -> Result<Solution> {
        let cfg = &self.config;
        let mut x = initial.to_vec();
        let mut value = objective.value(&x)?;
        if !value.is_finite() {
            return Err(convergence("objective is non-finite at the start point"));
        }

        for _ in 0..cfg.max_iterations {
            let gradient = objective.gradient(&x)?;
            if gradient.iter().any(|g| !g.is_finite()) {
                return Err(convergence("non-finite gradient"));
            }
            let norm_sq: f64 = gradient.iter().map(|g| g * g).sum();
            if norm_sq.sqrt() < cfg.tolerance {
                return Ok(Solution {
                    weights: x,
                    objective: value,
                });
            }

            let mut step = cfg.initial_step;
            loop {
                let trial: Vec<f64> = x
                    .iter()
                    .zip(&gradient)
                    .map(|(xi, gi)| xi + step * gi)
                    .collect();
                let trial_value = objective.value(&trial)?;
                // Armijo sufficient-increase condition.
                if trial_value.is_finite() && trial_value >= value + 1e-4 * step * norm_sq {
                    x = trial;
                    value = trial_value;
                    break;
                }
                step *= 0.5;
                if step < cfg.min_step {
                    return Err(convergence("line search failed to make progress"));
                }
            }
        }

        // Iteration budget exhausted with steady progress: report the
        // best point reached.
        Ok(Solution {
            weights: x,
            objective: value,
        })
    }
}

fn convergence(reason: &str) -> MlnError {
    MlnError::Convergence {
        step: "solve".to_string(),
        reason: reason.to_string(),
    }
}

/// Couples a scoring function to a solver and tracks the last objective.
pub struct WeightOptimizer {
    score: Box<dyn Score>,
    solver: Arc<dyn Solver>,
    last_objective: Option<f64>,
}

impl WeightOptimizer {
    pub fn new(score: Box<dyn Score>, solver: Arc<dyn Solver>) -> Self {
        WeightOptimizer {
            score,
            solver,
            last_objective: None,
        }
    }

    /// Optimize the weights of the tracked formulas starting from
    /// `initial`. On failure the error is fatal to the caller's current
    /// branch; no retry happens here.
    pub fn learn(&mut self, initial: &[f64]) -> Result<Vec<f64>> {
        let solution = self
            .solver
            .solve(initial, &ScoreObjective(self.score.as_ref()))?;
        self.last_objective = Some(solution.objective);
        Ok(solution.weights)
    }

    /// The objective value from the most recent `learn`; stale until the
    /// next call, `None` before the first.
    pub fn score(&self) -> Option<f64> {
        self.last_objective
    }

    /// The scoring function being optimized.
    pub fn score_fn(&self) -> &dyn Score {
        self.score.as_ref()
    }

    // Formula passthroughs keep the tracked list synchronized with the
    // structure learner's network.

    pub fn add_formula(&mut self, formula: &Formula) -> bool {
        self.score.add_formula(formula)
    }

    pub fn add_formulas(&mut self, formulas: &[Formula]) -> bool {
        self.score.add_formulas(formulas)
    }

    pub fn remove_formula(&mut self, formula: &Formula) -> bool {
        self.score.remove_formula(formula)
    }

    pub fn tracked(&self) -> usize {
        self.score.len()
    }
}
