//! Joint structure-and-weight learning
//!
//! The outer loop: build a dependency graph over the predicate schema,
//! seed the network with unit clauses, then alternate beam refinement
//! and weight re-optimization until no candidate beats the current
//! objective. Every accepted clause is committed with its fitted weight
//! as the warm start for the next full re-optimization.

use crate::data::Database;
use crate::depgraph::{DependencyGraph, GraphBuilder, GraphConfig};
use crate::error::{MlnError, Result};
use crate::fol::{Atom, Clause, Formula, Literal, PredicateSymbol, Term, Variable};
use crate::independence::{IndependenceOracle, OracleConfig};
use crate::mln::MarkovLogicNetwork;
use crate::optimize::{GradientSolver, Solver, SolverConfig, WeightOptimizer};
use crate::score::{L1Regularized, PseudoLogLikelihood, Score};
use crate::search::beam::{BeamConfig, BeamRefiner};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Everything the learner needs, with workable defaults throughout.
#[derive(Debug, Clone, Copy)]
pub struct LearnConfig {
    pub oracle: OracleConfig,
    pub graph: GraphConfig,
    pub beam: BeamConfig,
    pub solver: SolverConfig,
    /// Grounding budget per formula for the scoring statistics
    /// (0 means exhaustive).
    pub sample_budget: usize,
    /// Worker threads for candidate evaluation and statistics counting.
    pub workers: usize,
    /// L1 penalty constant; 0 disables regularization.
    pub l1: f64,
    /// Hard cap on accepted non-unit clauses.
    pub max_clauses: usize,
}

impl Default for LearnConfig {
    fn default() -> Self {
        LearnConfig {
            oracle: OracleConfig::default(),
            graph: GraphConfig::default(),
            beam: BeamConfig::default(),
            solver: SolverConfig::default(),
            sample_budget: 100_000,
            workers: 4,
            l1: 0.0,
            max_clauses: 20,
        }
    }
}

/// Where the outer loop currently is; used for progress logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Searching,
    Converged,
}

/// Drives the whole pipeline from a closed-world database to a weighted
/// network.
pub struct StructureLearner {
    db: Arc<Database>,
    config: LearnConfig,
    solver: Arc<dyn Solver>,
}

impl StructureLearner {
    pub fn new(db: Arc<Database>, config: LearnConfig) -> Self {
        let solver = Arc::new(GradientSolver::new(config.solver));
        StructureLearner { db, config, solver }
    }

    /// Swap in a different weight solver behind the same outer loop.
    pub fn with_solver(db: Arc<Database>, config: LearnConfig, solver: Arc<dyn Solver>) -> Self {
        StructureLearner { db, config, solver }
    }

    /// Learn structure and weights jointly. Any convergence failure on a
    /// committed network aborts the run; no partial network is returned.
    pub fn learn(&self) -> Result<MarkovLogicNetwork> {
        let schema = self.schema_atoms()?;
        if schema.is_empty() {
            return Err(MlnError::MalformedInput(
                "database declares no predicates".to_string(),
            ));
        }
        log::info!("phase {:?}: {} schema atoms", Phase::Initializing, schema.len());

        let oracle =
            IndependenceOracle::new(self.db.as_ref(), self.db.universe(), self.config.oracle);
        let mut builder = GraphBuilder::new(oracle, self.config.graph);
        let graph = builder.run(schema.clone())?;
        log::info!(
            "dependency graph has {} edges after {} oracle calls",
            graph.edges().len(),
            builder.oracle_calls()
        );

        let base = PseudoLogLikelihood::new(
            self.db.clone(),
            self.config.sample_budget,
            self.config.workers,
        )?;
        let mut score: Box<dyn Score> = if self.config.l1 > 0.0 {
            Box::new(L1Regularized::new(Box::new(base), self.config.l1)?)
        } else {
            Box::new(base)
        };

        // Seed with one unit clause per predicate so every ground atom
        // has a learnable prior.
        let units: Vec<Formula> = schema.iter().cloned().map(Formula::Atom).collect();
        score.add_formulas(&units);
        let mut mln = MarkovLogicNetwork::new();
        for unit in &units {
            mln.add(unit.clone(), 0.0);
        }

        let mut optimizer = WeightOptimizer::new(score, self.solver.clone());
        let mut weights = optimizer
            .learn(&vec![0.0; units.len()])
            .map_err(|e| at_step(e, "initial weight optimization"))?;
        mln.set_weights(&weights)?;
        let mut baseline = optimizer.score().unwrap_or(f64::NEG_INFINITY);
        log::info!(
            "phase {:?}: baseline objective {:.6}",
            Phase::Searching,
            baseline
        );

        let pool = edge_pool(&graph);
        let refiner = BeamRefiner::new(
            &graph,
            self.config.beam,
            self.solver.clone(),
            self.config.workers,
        );

        let mut accepted = 0usize;
        while accepted < self.config.max_clauses {
            let found = refiner.refine(optimizer.score_fn(), &weights, baseline, pool.clone())?;
            let Some(best) = found else {
                break;
            };

            if !optimizer.add_formula(&best.formula) {
                // Pool exhausted against the tracked list.
                break;
            }
            let mut warm = weights.clone();
            warm.push(best.weight);
            weights = optimizer
                .learn(&warm)
                .map_err(|e| at_step(e, &format!("re-optimizing after committing {}", best.clause)))?;
            let objective = optimizer.score().unwrap_or(baseline);
            if objective < baseline {
                log::warn!(
                    "objective dropped from {:.6} to {:.6} after committing {}",
                    baseline,
                    objective,
                    best.clause
                );
            }
            mln.add(best.formula.clone(), 0.0);
            mln.set_weights(&weights)?;
            baseline = objective;
            accepted += 1;
            log::info!(
                "accepted {} with weight {:.4}, objective {:.6}",
                best.clause,
                weights.last().copied().unwrap_or(0.0),
                objective
            );
        }

        log::info!(
            "phase {:?}: {} clauses accepted, final objective {:.6}",
            Phase::Converged,
            accepted,
            baseline
        );
        Ok(mln)
    }

    /// One open atom per predicate, with variables shared by domain so
    /// atoms over common domains are eligible for independence testing.
    /// A repeated domain within one predicate gets numbered variables.
    fn schema_atoms(&self) -> Result<Vec<Atom>> {
        self.db
            .predicates()
            .iter()
            .map(|p| schema_atom(p))
            .collect()
    }
}

fn schema_atom(predicate: &PredicateSymbol) -> Result<Atom> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let args = predicate
        .domains
        .iter()
        .map(|d| {
            let occurrence = counts.entry(d.as_str()).or_insert(0);
            *occurrence += 1;
            let name = if *occurrence == 1 {
                capitalized(d)
            } else {
                format!("{}{}", capitalized(d), occurrence)
            };
            Term::Variable(Variable::new(&name, d))
        })
        .collect();
    Atom::new(predicate.clone(), args)
}

fn capitalized(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Initial candidates: every polarity combination of two-literal clauses
/// over dependency-graph edges.
fn edge_pool(graph: &DependencyGraph) -> Vec<Clause> {
    let mut seen = HashSet::new();
    let mut pool = Vec::new();
    for (i, j) in graph.edges() {
        let a = graph.vertex(i).clone();
        let b = graph.vertex(j).clone();
        for pa in [true, false] {
            for pb in [true, false] {
                let lit_a = if pa {
                    Literal::positive(a.clone())
                } else {
                    Literal::negative(a.clone())
                };
                let lit_b = if pb {
                    Literal::positive(b.clone())
                } else {
                    Literal::negative(b.clone())
                };
                let clause = Clause::new(vec![lit_a, lit_b]).canonical();
                if !clause.is_tautology() && seen.insert(clause.clone()) {
                    pool.push(clause);
                }
            }
        }
    }
    pool
}

fn at_step(err: MlnError, step: &str) -> MlnError {
    match err {
        MlnError::Convergence { reason, .. } => MlnError::Convergence {
            step: step.to_string(),
            reason,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_atom_shares_domain_variables() {
        let p = PredicateSymbol::new("Smokes", &["person"]);
        let q = PredicateSymbol::new("Cancer", &["person"]);
        let pa = schema_atom(&p).unwrap();
        let qa = schema_atom(&q).unwrap();
        assert!(pa.shares_variable(&qa));
        assert_eq!(pa.to_string(), "Smokes(Person)");
    }

    #[test]
    fn test_schema_atom_numbers_repeated_domains() {
        let knows = PredicateSymbol::new("Knows", &["person", "person"]);
        let atom = schema_atom(&knows).unwrap();
        assert_eq!(atom.to_string(), "Knows(Person,Person2)");
        assert_eq!(atom.variables().len(), 2);
    }

    #[test]
    fn test_edge_pool_polarity_combinations() {
        let p = schema_atom(&PredicateSymbol::new("P", &["d"])).unwrap();
        let q = schema_atom(&PredicateSymbol::new("Q", &["d"])).unwrap();
        let mut graph = DependencyGraph::new(vec![p, q]);
        graph.add_edge(0, 1);
        let pool = edge_pool(&graph);
        assert_eq!(pool.len(), 4);
        for clause in &pool {
            assert_eq!(clause.literals.len(), 2);
            assert!(!clause.is_tautology());
        }
    }
}
