//! The Markov logic network under construction

use crate::error::{MlnError, Result};
use crate::fol::Formula;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A formula with its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedFormula {
    pub formula: Formula,
    pub weight: f64,
}

/// An ordered collection of weighted formulas: the mutable knowledge base
/// the structure learner builds up.
///
/// Formula order is insertion order and matches the weight-vector order
/// of the scoring function tracking the same formulas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkovLogicNetwork {
    formulas: Vec<WeightedFormula>,
}

impl MarkovLogicNetwork {
    pub fn new() -> Self {
        MarkovLogicNetwork::default()
    }

    /// Add a formula with a weight. Returns false (and changes nothing)
    /// when the formula is already present.
    pub fn add(&mut self, formula: Formula, weight: f64) -> bool {
        if self.contains(&formula) {
            return false;
        }
        self.formulas.push(WeightedFormula { formula, weight });
        true
    }

    /// Remove a formula. Returns false when it was not present.
    pub fn remove(&mut self, formula: &Formula) -> bool {
        match self.formulas.iter().position(|wf| &wf.formula == formula) {
            Some(idx) => {
                self.formulas.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.formulas.clear();
    }

    pub fn contains(&self, formula: &Formula) -> bool {
        self.formulas.iter().any(|wf| &wf.formula == formula)
    }

    pub fn weight_of(&self, formula: &Formula) -> Option<f64> {
        self.formulas
            .iter()
            .find(|wf| &wf.formula == formula)
            .map(|wf| wf.weight)
    }

    /// Overwrite all weights in formula order.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.formulas.len() {
            return Err(MlnError::DimensionMismatch {
                expected: self.formulas.len(),
                got: weights.len(),
            });
        }
        for (wf, &w) in self.formulas.iter_mut().zip(weights) {
            wf.weight = w;
        }
        Ok(())
    }

    pub fn weights(&self) -> Vec<f64> {
        self.formulas.iter().map(|wf| wf.weight).collect()
    }

    pub fn formulas(&self) -> &[WeightedFormula] {
        &self.formulas
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}

impl fmt::Display for MarkovLogicNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for wf in &self.formulas {
            writeln!(f, "{:+.4}  {}", wf.weight, wf.formula)?;
        }
        Ok(())
    }
}
