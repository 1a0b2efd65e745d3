//! MlnLearn: joint structure and weight learning for Markov logic networks
//!
//! This library learns a weighted first-order clausal theory from a
//! closed-world relational database: statistical independence tests
//! constrain a dependency graph over the predicate schema, beam search
//! proposes clauses along its edges, and every candidate is scored by
//! re-optimizing all weights under a pseudo-log-likelihood objective.

pub mod data;
pub mod depgraph;
pub mod error;
pub mod fol;
pub mod independence;
pub mod mln;
pub mod optimize;
pub mod score;
pub mod search;

#[cfg(test)]
mod proptest_tests;

// Re-export commonly used types from fol
pub use fol::{
    Atom, Clause, Constant, Domain, Formula, Grounding, GroundingIter, Literal, PredicateSymbol,
    Term, Universe, Variable,
};

pub use data::{drain_jobs, Counts, DataSource, Database, Value};

pub use depgraph::{DependencyGraph, GraphBuilder, GraphConfig};

pub use error::{MlnError, Result};

pub use independence::{Independence, IndependenceOracle, OracleConfig};

pub use mln::{MarkovLogicNetwork, WeightedFormula};

pub use optimize::{
    Differentiable, GradientSolver, ScoreObjective, Solution, Solver, SolverConfig,
    WeightOptimizer,
};

pub use score::{L1Regularized, PseudoLogLikelihood, Score};

pub use search::{Beam, BeamConfig, BeamRefiner, LearnConfig, Phase, ScoredClause, StructureLearner};
