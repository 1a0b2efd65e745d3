//! Differentiable scoring over a tracked formula list
//!
//! `PseudoLogLikelihood` scores a weight vector against the data via the
//! per-ground-atom conditional likelihood. For each tracked formula the
//! expensive part (how flipping each ground atom changes the formula's
//! satisfied-grounding count) is computed once when the formula is added
//! and shared immutably between copies; a copy therefore isolates its
//! tracked list and nothing else, which is what makes speculative beam
//! evaluation safe without locking.

use crate::data::{drain_jobs, DataSource, Database};
use crate::error::{MlnError, Result};
use crate::fol::{Atom, Formula, GroundingIter};
use std::collections::HashMap;
use std::sync::Arc;

/// A differentiable objective over a mutable, ordered formula list.
///
/// `weights[i]` corresponds to the i-th tracked formula; any mutation of
/// the tracked list invalidates previously sized weight vectors, which
/// `value`/`gradient` reject with a dimension error. Higher values are
/// better.
pub trait Score: Send + Sync {
    fn value(&self, weights: &[f64]) -> Result<f64>;

    fn gradient(&self, weights: &[f64]) -> Result<Vec<f64>>;

    /// Track a formula. Returns false (and changes nothing) when it is
    /// already tracked.
    fn add_formula(&mut self, formula: &Formula) -> bool;

    /// Track several formulas at once. Returns true when the tracked
    /// set changed.
    fn add_formulas(&mut self, formulas: &[Formula]) -> bool;

    /// Stop tracking a formula. Returns false when it was not tracked.
    fn remove_formula(&mut self, formula: &Formula) -> bool;

    /// Number of tracked formulas.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Independent clone: shares immutable per-formula statistics,
    /// isolates the tracked list, so trial mutations on the clone never
    /// leak back.
    fn clone_box(&self) -> Box<dyn Score>;
}

/// Per-formula satisfaction statistics, immutable once computed.
///
/// `deltas[k] = (a, d)` says: over the formula's groundings containing
/// ground atom `a`, the satisfied count under the observed world exceeds
/// the count with `a` flipped by `d`.
#[derive(Debug)]
struct FormulaStats {
    deltas: Vec<(usize, f64)>,
}

#[derive(Clone)]
struct TrackedFormula {
    formula: Formula,
    stats: Arc<FormulaStats>,
}

/// Pseudo-log-likelihood of the observed world under the tracked
/// formulas, closed-world over boolean readings of the data.
#[derive(Clone)]
pub struct PseudoLogLikelihood {
    db: Arc<Database>,
    atoms: Arc<Vec<Atom>>,
    atom_index: Arc<HashMap<Atom, usize>>,
    formulas: Vec<TrackedFormula>,
    sample_budget: usize,
    workers: usize,
}

impl PseudoLogLikelihood {
    /// Create an empty score over the database's ground atoms.
    ///
    /// `sample_budget` bounds exact grounding enumeration per formula
    /// (0 means unbounded); `workers` sizes the counting pool used by
    /// `add_formulas`.
    pub fn new(db: Arc<Database>, sample_budget: usize, workers: usize) -> Result<Self> {
        let atoms = db.ground_atoms()?;
        let atom_index: HashMap<Atom, usize> = atoms
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), i))
            .collect();
        Ok(PseudoLogLikelihood {
            db,
            atoms: Arc::new(atoms),
            atom_index: Arc::new(atom_index),
            formulas: Vec::new(),
            sample_budget,
            workers,
        })
    }

    pub fn tracked_formulas(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.iter().map(|tf| &tf.formula)
    }

    fn contains(&self, formula: &Formula) -> bool {
        self.formulas.iter().any(|tf| &tf.formula == formula)
    }

    fn check_dimension(&self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.formulas.len() {
            return Err(MlnError::DimensionMismatch {
                expected: self.formulas.len(),
                got: weights.len(),
            });
        }
        Ok(())
    }

    /// Conditional log-odds of each ground atom's observed value.
    fn margins(&self, weights: &[f64]) -> Vec<f64> {
        let mut margins = vec![0.0; self.atoms.len()];
        for (tf, &w) in self.formulas.iter().zip(weights) {
            for &(atom, delta) in &tf.stats.deltas {
                margins[atom] += w * delta;
            }
        }
        margins
    }

    fn compute_stats(&self, formula: &Formula) -> Arc<FormulaStats> {
        let mut deltas: HashMap<usize, f64> = HashMap::new();
        for clause in formula.to_cnf() {
            let vars = clause.variables();
            // Domains were validated when the atoms were built, so the
            // enumerator cannot fail here; an empty enumeration is the
            // correct reading of a stale domain anyway.
            let Ok(mut iter) = GroundingIter::new(&vars, self.db.universe()) else {
                continue;
            };
            let total = iter.total();
            let exhaustive = self.sample_budget == 0 || total <= self.sample_budget;
            let (takes, scale) = if exhaustive {
                (total, 1.0)
            } else {
                (self.sample_budget, total as f64 / self.sample_budget as f64)
            };

            let mut rng = rand::thread_rng();
            for _ in 0..takes {
                let grounding = if exhaustive {
                    match iter.next() {
                        Some(g) => g,
                        None => break,
                    }
                } else {
                    iter.sample(&mut rng)
                };
                let ground = grounding.apply_clause(&clause);
                let observed = ground.is_satisfied(&|a| self.db.truth(a));

                let mut seen: Vec<&Atom> = Vec::with_capacity(ground.literals.len());
                for lit in &ground.literals {
                    if seen.contains(&&lit.atom) {
                        continue;
                    }
                    seen.push(&lit.atom);
                    let flipped = ground.is_satisfied(&|a| {
                        if a == &lit.atom {
                            !self.db.truth(a)
                        } else {
                            self.db.truth(a)
                        }
                    });
                    let delta = (observed as i8 - flipped as i8) as f64 * scale;
                    if delta != 0.0 {
                        if let Some(&idx) = self.atom_index.get(&lit.atom) {
                            *deltas.entry(idx).or_insert(0.0) += delta;
                        }
                    }
                }
            }
        }
        let mut deltas: Vec<(usize, f64)> = deltas.into_iter().collect();
        deltas.sort_unstable_by_key(|(idx, _)| *idx);
        Arc::new(FormulaStats { deltas })
    }
}

impl Score for PseudoLogLikelihood {
    fn value(&self, weights: &[f64]) -> Result<f64> {
        self.check_dimension(weights)?;
        let value = self
            .margins(weights)
            .iter()
            .map(|&m| -softplus(-m))
            .sum();
        Ok(value)
    }

    fn gradient(&self, weights: &[f64]) -> Result<Vec<f64>> {
        self.check_dimension(weights)?;
        let margins = self.margins(weights);
        let mut gradient = vec![0.0; weights.len()];
        for (i, tf) in self.formulas.iter().enumerate() {
            for &(atom, delta) in &tf.stats.deltas {
                gradient[i] += delta * sigmoid(-margins[atom]);
            }
        }
        Ok(gradient)
    }

    fn add_formula(&mut self, formula: &Formula) -> bool {
        if self.contains(formula) {
            return false;
        }
        let stats = self.compute_stats(formula);
        self.formulas.push(TrackedFormula {
            formula: formula.clone(),
            stats,
        });
        true
    }

    fn add_formulas(&mut self, formulas: &[Formula]) -> bool {
        let mut fresh: Vec<&Formula> = Vec::new();
        for formula in formulas {
            if !self.contains(formula) && !fresh.contains(&formula) {
                fresh.push(formula);
            }
        }
        if fresh.is_empty() {
            return false;
        }
        // Counting jobs are pure reads of the database; fan them out.
        let stats = drain_jobs(fresh.clone(), self.workers, |formula| {
            self.compute_stats(formula)
        });
        for (formula, stats) in fresh.into_iter().zip(stats) {
            self.formulas.push(TrackedFormula {
                formula: formula.clone(),
                stats,
            });
        }
        true
    }

    fn remove_formula(&mut self, formula: &Formula) -> bool {
        match self.formulas.iter().position(|tf| &tf.formula == formula) {
            Some(idx) => {
                self.formulas.remove(idx);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.formulas.len()
    }

    fn clone_box(&self) -> Box<dyn Score> {
        Box::new(self.clone())
    }
}

/// L1 regularization around another score: subtracts `c * Σ|w|` from the
/// value and uses 0 as the subgradient at w = 0. Every mutation is
/// delegated so the two stay dimensionally synchronized.
pub struct L1Regularized {
    inner: Box<dyn Score>,
    c: f64,
}

impl L1Regularized {
    pub fn new(inner: Box<dyn Score>, c: f64) -> Result<Self> {
        if !c.is_finite() || c < 0.0 {
            return Err(MlnError::MalformedInput(format!(
                "L1 constant must be finite and non-negative, got {}",
                c
            )));
        }
        Ok(L1Regularized { inner, c })
    }

    pub fn constant(&self) -> f64 {
        self.c
    }
}

impl Score for L1Regularized {
    fn value(&self, weights: &[f64]) -> Result<f64> {
        let penalty: f64 = weights.iter().map(|w| w.abs()).sum();
        Ok(self.inner.value(weights)? - self.c * penalty)
    }

    fn gradient(&self, weights: &[f64]) -> Result<Vec<f64>> {
        let mut gradient = self.inner.gradient(weights)?;
        for (g, &w) in gradient.iter_mut().zip(weights) {
            if w > 0.0 {
                *g -= self.c;
            } else if w < 0.0 {
                *g += self.c;
            }
            // Subgradient 0 at w == 0.
        }
        Ok(gradient)
    }

    fn add_formula(&mut self, formula: &Formula) -> bool {
        self.inner.add_formula(formula)
    }

    fn add_formulas(&mut self, formulas: &[Formula]) -> bool {
        self.inner.add_formulas(formulas)
    }

    fn remove_formula(&mut self, formula: &Formula) -> bool {
        self.inner.remove_formula(formula)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn clone_box(&self) -> Box<dyn Score> {
        Box::new(L1Regularized {
            inner: self.inner.clone_box(),
            c: self.c,
        })
    }
}

/// Numerically stable log(1 + e^x).
fn softplus(x: f64) -> f64 {
    if x > 30.0 {
        x
    } else {
        x.exp().ln_1p()
    }
}

/// Numerically stable logistic function.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{Domain, PredicateSymbol, Term, Universe, Variable};

    /// Four people, three of whom smoke.
    fn smokers_db() -> Arc<Database> {
        let mut universe = Universe::new();
        universe
            .add_domain(Domain::new("person", &["p0", "p1", "p2", "p3"]))
            .unwrap();
        let smokes = PredicateSymbol::new("Smokes", &["person"]);
        let mut db = Database::new(universe.clone());
        db.declare(smokes.clone());
        for (i, c) in universe.constants_of("person").unwrap().iter().enumerate() {
            let atom = Atom::new(smokes.clone(), vec![Term::Constant(c.clone())]).unwrap();
            db.set_bool(atom, i < 3).unwrap();
        }
        Arc::new(db)
    }

    fn smokes_unit() -> Formula {
        let smokes = PredicateSymbol::new("Smokes", &["person"]);
        Formula::Atom(
            Atom::new(
                smokes,
                vec![Term::Variable(Variable::new("X", "person"))],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_dimension_checks() {
        let mut score = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        assert!(score.value(&[]).is_ok());
        assert!(score.value(&[1.0]).is_err());
        score.add_formula(&smokes_unit());
        assert!(score.value(&[1.0]).is_ok());
        assert!(score.gradient(&[]).is_err());
    }

    #[test]
    fn test_duplicate_add_and_missing_remove() {
        let mut score = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        assert!(score.add_formula(&smokes_unit()));
        assert!(!score.add_formula(&smokes_unit()));
        assert_eq!(score.len(), 1);
        assert!(score.remove_formula(&smokes_unit()));
        assert!(!score.remove_formula(&smokes_unit()));
        assert_eq!(score.len(), 0);
    }

    #[test]
    fn test_weight_improves_fit_direction() {
        let mut score = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        score.add_formula(&smokes_unit());
        // Most people smoke, so a positive weight on Smokes(X) must
        // raise the pseudo-log-likelihood and the gradient at 0 must
        // point upward.
        let at_zero = score.value(&[0.0]).unwrap();
        let at_one = score.value(&[1.0]).unwrap();
        assert!(at_one > at_zero);
        assert!(score.gradient(&[0.0]).unwrap()[0] > 0.0);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut score = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        score.add_formula(&smokes_unit());
        let w = [0.7];
        let grad = score.gradient(&w).unwrap()[0];
        let eps = 1e-6;
        let up = score.value(&[w[0] + eps]).unwrap();
        let down = score.value(&[w[0] - eps]).unwrap();
        let numeric = (up - down) / (2.0 * eps);
        assert!((grad - numeric).abs() < 1e-6);
    }

    #[test]
    fn test_copy_isolation() {
        let mut score = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        score.add_formula(&smokes_unit());
        let mut copy = score.clone_box();
        let extra = Formula::not(smokes_unit());
        assert!(copy.add_formula(&extra));
        assert_eq!(copy.len(), 2);
        assert_eq!(score.len(), 1);
        assert!(score.value(&[0.3]).is_ok());
    }

    #[test]
    fn test_add_formulas_batch() {
        let mut score = PseudoLogLikelihood::new(smokers_db(), 0, 2).unwrap();
        let a = smokes_unit();
        let b = Formula::not(smokes_unit());
        assert!(score.add_formulas(&[a.clone(), b.clone(), a.clone()]));
        assert_eq!(score.len(), 2);
        assert!(!score.add_formulas(&[a, b]));
    }

    #[test]
    fn test_l1_zero_constant_is_identity() {
        let mut base = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        base.add_formula(&smokes_unit());
        let wrapped = L1Regularized::new(base.clone_box(), 0.0).unwrap();
        for w in [-2.0, -0.5, 0.0, 0.5, 2.0] {
            assert_eq!(
                wrapped.value(&[w]).unwrap(),
                base.value(&[w]).unwrap()
            );
        }
    }

    #[test]
    fn test_l1_penalizes_and_subgradient_at_zero() {
        let mut base = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        base.add_formula(&smokes_unit());
        let wrapped = L1Regularized::new(base.clone_box(), 0.5).unwrap();
        assert!(wrapped.value(&[1.0]).unwrap() < base.value(&[1.0]).unwrap());
        let g_base = base.gradient(&[0.0]).unwrap()[0];
        let g_wrapped = wrapped.gradient(&[0.0]).unwrap()[0];
        assert_eq!(g_base, g_wrapped);
    }

    #[test]
    fn test_l1_delegates_mutations() {
        let base = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        let mut wrapped = L1Regularized::new(Box::new(base), 0.1).unwrap();
        assert!(wrapped.add_formula(&smokes_unit()));
        assert_eq!(wrapped.len(), 1);
        let copy = wrapped.clone_box();
        assert_eq!(copy.len(), 1);
        assert!(wrapped.remove_formula(&smokes_unit()));
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn test_rejects_negative_constant() {
        let base = PseudoLogLikelihood::new(smokers_db(), 0, 1).unwrap();
        assert!(L1Regularized::new(Box::new(base), -1.0).is_err());
    }
}
