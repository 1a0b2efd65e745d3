//! Ground-atom observations and counting
//!
//! The `Database` holds the observed truth values (boolean or real) of
//! ground atoms over a fixed universe of constants. Counting satisfied
//! groundings of a clause is bounded by a sample budget, and batches of
//! counting jobs run on a small worker pool.

use crate::error::{MlnError, Result};
use crate::fol::{Atom, Clause, GroundingIter, PredicateSymbol, Universe};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{mpsc, Mutex};
use std::thread;

/// An observed value of a ground atom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Real(f64),
}

impl Value {
    /// Boolean reading of a value; reals are thresholded at zero.
    pub fn truth(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Real(r) => *r > 0.0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Real(r) => *r,
        }
    }
}

/// Satisfied-grounding counts for one clause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Counts {
    pub satisfied: f64,
    pub total: f64,
    /// True when the counts were estimated from a sample rather than a
    /// full enumeration.
    pub sampled: bool,
}

/// Read access to observed ground-atom values.
pub trait DataSource: Send + Sync {
    /// The observed value of a ground atom, or `None` when unobserved.
    fn value_of(&self, atom: &Atom) -> Option<Value>;

    /// Closed-world boolean reading: unobserved atoms are false.
    fn truth(&self, atom: &Atom) -> bool {
        self.value_of(atom).map(|v| v.truth()).unwrap_or(false)
    }
}

/// In-memory store of ground-atom observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    universe: Universe,
    predicates: Vec<PredicateSymbol>,
    values: IndexMap<Atom, Value>,
}

impl Database {
    pub fn new(universe: Universe) -> Self {
        Database {
            universe,
            predicates: Vec::new(),
            values: IndexMap::new(),
        }
    }

    /// Declare a predicate; duplicates are ignored.
    pub fn declare(&mut self, predicate: PredicateSymbol) {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
    }

    /// Record the value of a ground atom of a declared predicate.
    pub fn insert(&mut self, atom: Atom, value: Value) -> Result<()> {
        if !atom.is_ground() {
            return Err(MlnError::MalformedInput(format!(
                "cannot observe non-ground atom {}",
                atom
            )));
        }
        if !self.predicates.contains(&atom.predicate) {
            return Err(MlnError::MalformedInput(format!(
                "predicate '{}' not declared",
                atom.predicate.name
            )));
        }
        self.values.insert(atom, value);
        Ok(())
    }

    pub fn set_bool(&mut self, atom: Atom, value: bool) -> Result<()> {
        self.insert(atom, Value::Bool(value))
    }

    pub fn set_real(&mut self, atom: Atom, value: f64) -> Result<()> {
        self.insert(atom, Value::Real(value))
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn predicates(&self) -> &[PredicateSymbol] {
        &self.predicates
    }

    /// Every ground atom of every declared predicate, in declaration and
    /// domain order.
    pub fn ground_atoms(&self) -> Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        for predicate in &self.predicates {
            let open = predicate.open_atom();
            let vars = open.variables();
            for grounding in GroundingIter::new(&vars, &self.universe)? {
                atoms.push(grounding.apply_atom(&open));
            }
        }
        Ok(atoms)
    }

    /// Count satisfied groundings of a clause under the closed-world
    /// reading, enumerating exactly up to `budget` assignments and
    /// falling back to uniform sampling (scaled to the full space)
    /// beyond it.
    pub fn get_counts(&self, clause: &Clause, budget: usize) -> Result<Counts> {
        let vars = clause.variables();
        let mut iter = GroundingIter::new(&vars, &self.universe)?;
        let total = iter.total();
        let truth = |atom: &Atom| self.truth(atom);

        if budget == 0 || total <= budget {
            let satisfied = iter
                .by_ref()
                .filter(|g| g.apply_clause(clause).is_satisfied(&truth))
                .count();
            return Ok(Counts {
                satisfied: satisfied as f64,
                total: total as f64,
                sampled: false,
            });
        }

        let mut rng = rand::thread_rng();
        let mut hits = 0usize;
        for _ in 0..budget {
            let grounding = iter.sample(&mut rng);
            if grounding.apply_clause(clause).is_satisfied(&truth) {
                hits += 1;
            }
        }
        let scale = total as f64 / budget as f64;
        Ok(Counts {
            satisfied: hits as f64 * scale,
            total: total as f64,
            sampled: true,
        })
    }
}

impl DataSource for Database {
    fn value_of(&self, atom: &Atom) -> Option<Value> {
        self.values.get(atom).copied()
    }
}

/// Run independent jobs on a bounded worker pool.
///
/// Workers drain a shared queue; a sentinel entry per worker signals
/// drain completion, and all workers are joined before the results are
/// assembled back into job order.
pub fn drain_jobs<T, R, F>(jobs: Vec<T>, workers: usize, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let count = jobs.len();
    let workers = workers.max(1).min(count.max(1));

    let mut queue: VecDeque<Option<(usize, T)>> = jobs
        .into_iter()
        .enumerate()
        .map(|(i, job)| Some((i, job)))
        .collect();
    for _ in 0..workers {
        queue.push_back(None);
    }
    let queue = Mutex::new(queue);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let work = &work;
            scope.spawn(move || loop {
                let job = queue.lock().unwrap().pop_front();
                match job {
                    Some(Some((idx, input))) => {
                        let _ = tx.send((idx, work(input)));
                    }
                    // Sentinel: queue drained.
                    Some(None) | None => break,
                }
            });
        }
        drop(tx);
    });

    let mut results: Vec<(usize, R)> = rx.into_iter().collect();
    debug_assert_eq!(results.len(), count);
    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{Constant, Domain, Literal, Term, Variable};

    fn smokes_db() -> Database {
        let mut universe = Universe::new();
        universe
            .add_domain(Domain::new("person", &["alice", "bob", "carol"]))
            .unwrap();
        let mut db = Database::new(universe);
        let smokes = PredicateSymbol::new("Smokes", &["person"]);
        db.declare(smokes.clone());
        for (name, value) in [("alice", true), ("bob", false)] {
            let atom = Atom::new(
                smokes.clone(),
                vec![Term::Constant(Constant::new(name, "person"))],
            )
            .unwrap();
            db.set_bool(atom, value).unwrap();
        }
        db
    }

    #[test]
    fn test_closed_world_default() {
        let db = smokes_db();
        let smokes = db.predicates()[0].clone();
        let carol = Atom::new(
            smokes,
            vec![Term::Constant(Constant::new("carol", "person"))],
        )
        .unwrap();
        assert_eq!(db.value_of(&carol), None);
        assert!(!db.truth(&carol));
    }

    #[test]
    fn test_non_ground_observation_rejected() {
        let mut db = smokes_db();
        let smokes = db.predicates()[0].clone();
        let open = Atom::new(
            smokes,
            vec![Term::Variable(Variable::new("X", "person"))],
        )
        .unwrap();
        assert!(db.set_bool(open, true).is_err());
    }

    #[test]
    fn test_exact_counts() {
        let db = smokes_db();
        let smokes = db.predicates()[0].clone();
        let clause = Clause::new(vec![Literal::positive(
            Atom::new(
                smokes,
                vec![Term::Variable(Variable::new("X", "person"))],
            )
            .unwrap(),
        )]);
        let counts = db.get_counts(&clause, 1000).unwrap();
        assert!(!counts.sampled);
        assert_eq!(counts.total, 3.0);
        // Only alice smokes; bob observed false, carol closed-world false.
        assert_eq!(counts.satisfied, 1.0);
    }

    #[test]
    fn test_sampled_counts_cover_space() {
        let db = smokes_db();
        let smokes = db.predicates()[0].clone();
        let clause = Clause::new(vec![Literal::negative(
            Atom::new(
                smokes,
                vec![Term::Variable(Variable::new("X", "person"))],
            )
            .unwrap(),
        )]);
        let counts = db.get_counts(&clause, 2).unwrap();
        assert!(counts.sampled);
        assert_eq!(counts.total, 3.0);
        assert!(counts.satisfied >= 0.0 && counts.satisfied <= 3.0);
    }

    #[test]
    fn test_drain_jobs_preserves_order() {
        let jobs: Vec<usize> = (0..100).collect();
        let results = drain_jobs(jobs, 4, |n| n * 2);
        assert_eq!(results, (0..100).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_drain_jobs_empty() {
        let results: Vec<usize> = drain_jobs(Vec::<usize>::new(), 4, |n| n);
        assert!(results.is_empty());
    }
}
