//! Beam search over candidate clauses
//!
//! Every candidate is evaluated by trial re-optimization on a copy of
//! the scoring function, so caller state is never touched: only the
//! clause finally returned is ever applied by the caller. Candidate
//! evaluations are independent full optimization passes and run on the
//! worker pool.

use crate::data::drain_jobs;
use crate::depgraph::DependencyGraph;
use crate::fol::{Clause, Formula, Literal};
use crate::optimize::{ScoreObjective, Solver};
use crate::score::Score;
use crate::error::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Search bounds for clause refinement.
#[derive(Debug, Clone, Copy)]
pub struct BeamConfig {
    /// Beam width K.
    pub width: usize,
    /// Candidates whose fitted |weight| falls below this carry no
    /// meaningful contribution and are discarded.
    pub min_weight: f64,
    /// Hard cap on refinement rounds.
    pub max_rounds: usize,
    /// Stop after this many consecutive non-improving rounds.
    pub patience: usize,
}

impl Default for BeamConfig {
    fn default() -> Self {
        BeamConfig {
            width: 5,
            min_weight: 0.1,
            max_rounds: 50,
            patience: 2,
        }
    }
}

/// A candidate clause with its trial objective and fitted weight.
/// Transient: lives only inside one refinement call.
#[derive(Debug, Clone)]
pub struct ScoredClause {
    pub clause: Clause,
    pub formula: Formula,
    pub score: f64,
    pub weight: f64,
}

/// Bounded collection of scored clauses, ordered best-first. Rebuilt
/// from scratch every round.
#[derive(Debug, Default)]
pub struct Beam {
    width: usize,
    entries: Vec<ScoredClause>,
}

impl Beam {
    pub fn new(width: usize) -> Self {
        Beam {
            width,
            entries: Vec::with_capacity(width + 1),
        }
    }

    /// Insert in score order, keeping at most `width` entries.
    /// Non-finite scores are rejected.
    pub fn push(&mut self, candidate: ScoredClause) {
        if !candidate.score.is_finite() {
            return;
        }
        let pos = self
            .entries
            .iter()
            .position(|e| candidate.score > e.score)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, candidate);
        self.entries.truncate(self.width);
    }

    pub fn best(&self) -> Option<&ScoredClause> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredClause> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluates candidate clause pools against a baseline score and returns
/// the best clause found, if any beat the baseline.
pub struct BeamRefiner<'a> {
    graph: &'a DependencyGraph,
    config: BeamConfig,
    solver: Arc<dyn Solver>,
    workers: usize,
}

impl<'a> BeamRefiner<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        config: BeamConfig,
        solver: Arc<dyn Solver>,
        workers: usize,
    ) -> Self {
        BeamRefiner {
            graph,
            config,
            solver,
            workers,
        }
    }

    /// Run refinement rounds over `pool`. `score` and `base_weights`
    /// describe the caller's current network; both are only ever read.
    /// Returns the best-ever clause when it beat `baseline`, else None.
    pub fn refine(
        &self,
        score: &dyn Score,
        base_weights: &[f64],
        baseline: f64,
        pool: Vec<Clause>,
    ) -> Result<Option<ScoredClause>> {
        let mut seen: HashSet<Clause> = pool.iter().cloned().collect();
        let mut pool = pool;
        let mut best: Option<ScoredClause> = None;
        let mut stale = 0usize;

        for round in 0..self.config.max_rounds {
            if pool.is_empty() {
                break;
            }
            let evaluations = drain_jobs(pool, self.workers, |clause| {
                self.evaluate(score, base_weights, clause)
            });

            let mut beam = Beam::new(self.config.width);
            for scored in evaluations.into_iter().flatten() {
                if scored.weight.abs() < self.config.min_weight {
                    continue;
                }
                beam.push(scored);
            }

            let improved = match (best.as_ref(), beam.best()) {
                (_, None) => false,
                (None, Some(top)) => {
                    best = Some(top.clone());
                    true
                }
                (Some(current), Some(top)) if top.score > current.score => {
                    best = Some(top.clone());
                    true
                }
                _ => false,
            };
            log::debug!(
                "beam round {}: {} kept, best {:?}",
                round,
                beam.len(),
                best.as_ref().map(|b| b.score)
            );

            stale = if improved { 0 } else { stale + 1 };
            if stale >= self.config.patience {
                break;
            }
            pool = self.successors(&beam, &mut seen);
        }

        Ok(best.filter(|b| b.score > baseline))
    }

    /// Trial evaluation of one candidate: add it to a copy of the score,
    /// re-optimize, read off objective and fitted weight. A solver
    /// failure is fatal to this candidate's branch only.
    fn evaluate(
        &self,
        score: &dyn Score,
        base_weights: &[f64],
        clause: Clause,
    ) -> Option<ScoredClause> {
        let formula = clause.to_formula()?;
        let mut trial = score.clone_box();
        if !trial.add_formula(&formula) {
            // Already part of the network.
            return None;
        }
        let mut initial = base_weights.to_vec();
        initial.push(0.0);
        match self.solver.solve(&initial, &ScoreObjective(trial.as_ref())) {
            Ok(solution) => {
                let weight = solution.weights.last().copied().unwrap_or(0.0);
                Some(ScoredClause {
                    clause,
                    formula,
                    score: solution.objective,
                    weight,
                })
            }
            Err(err) => {
                log::warn!("candidate {} abandoned: {}", clause, err);
                None
            }
        }
    }

    /// Extend each beam member by one literal over an atom adjacent (in
    /// the dependency graph) to an atom already in the clause.
    fn successors(&self, beam: &Beam, seen: &mut HashSet<Clause>) -> Vec<Clause> {
        let mut out = Vec::new();
        for member in beam.iter() {
            let vertices: Vec<usize> = member
                .clause
                .literals
                .iter()
                .filter_map(|lit| self.graph.index_of(&lit.atom))
                .collect();
            for &v in &vertices {
                for w in self.graph.neighbors(v) {
                    let atom = self.graph.vertex(w).clone();
                    if member
                        .clause
                        .literals
                        .iter()
                        .any(|lit| lit.atom == atom)
                    {
                        continue;
                    }
                    for polarity in [true, false] {
                        let mut literals = member.clause.literals.clone();
                        literals.push(Literal {
                            atom: atom.clone(),
                            polarity,
                        });
                        let clause = Clause::new(literals).canonical();
                        if clause.is_tautology() {
                            continue;
                        }
                        if seen.insert(clause.clone()) {
                            out.push(clause);
                        }
                    }
                }
            }
        }
        out
    }
}
