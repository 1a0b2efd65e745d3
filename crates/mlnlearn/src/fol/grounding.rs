//! Variable-to-constant substitutions and lazy grounding enumeration

use super::atom::Atom;
use super::clause::{Clause, Literal};
use super::term::{Constant, Term, Universe, Variable};
use crate::error::Result;
use rand::Rng;
use std::collections::HashMap;

/// A substitution mapping variables to constants.
#[derive(Debug, Clone, Default)]
pub struct Grounding {
    map: HashMap<Variable, Constant>,
}

impl Grounding {
    pub fn new() -> Self {
        Grounding::default()
    }

    pub fn bind(&mut self, var: Variable, constant: Constant) {
        self.map.insert(var, constant);
    }

    pub fn get(&self, var: &Variable) -> Option<&Constant> {
        self.map.get(var)
    }

    pub fn apply_term(&self, term: &Term) -> Term {
        match term {
            Term::Variable(v) => match self.map.get(v) {
                Some(c) => Term::Constant(c.clone()),
                None => term.clone(),
            },
            Term::Constant(_) => term.clone(),
        }
    }

    pub fn apply_atom(&self, atom: &Atom) -> Atom {
        Atom {
            predicate: atom.predicate.clone(),
            args: atom.args.iter().map(|t| self.apply_term(t)).collect(),
        }
    }

    pub fn apply_clause(&self, clause: &Clause) -> Clause {
        Clause {
            literals: clause
                .literals
                .iter()
                .map(|lit| Literal {
                    atom: self.apply_atom(&lit.atom),
                    polarity: lit.polarity,
                })
                .collect(),
        }
    }
}

/// Lazy, restartable enumerator of all bindings of a variable list over
/// the constants of their domains.
///
/// Runs as an odometer over the variable positions; `next` materializes
/// one `Grounding` at a time, so the full assignment space is never held
/// in memory.
pub struct GroundingIter<'a> {
    vars: Vec<Variable>,
    pools: Vec<&'a [Constant]>,
    indices: Vec<usize>,
    done: bool,
}

impl<'a> GroundingIter<'a> {
    /// Create an enumerator for `vars` over `universe`. Fails when a
    /// variable names an unknown domain; an empty domain yields an empty
    /// enumeration.
    pub fn new(vars: &[Variable], universe: &'a Universe) -> Result<Self> {
        let mut pools = Vec::with_capacity(vars.len());
        for var in vars {
            pools.push(universe.constants_of(&var.domain)?);
        }
        let done = pools.iter().any(|p| p.is_empty());
        Ok(GroundingIter {
            vars: vars.to_vec(),
            indices: vec![0; pools.len()],
            pools,
            done,
        })
    }

    /// Total number of assignments this enumeration covers.
    pub fn total(&self) -> usize {
        self.pools
            .iter()
            .fold(1usize, |acc, p| acc.saturating_mul(p.len()))
    }

    /// Restart the enumeration from the first assignment.
    pub fn reset(&mut self) {
        for idx in &mut self.indices {
            *idx = 0;
        }
        self.done = self.pools.iter().any(|p| p.is_empty());
    }

    /// Draw one uniformly random assignment without advancing the
    /// enumeration. Used for sampled counting under a budget.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Grounding {
        let mut grounding = Grounding::new();
        for (var, pool) in self.vars.iter().zip(&self.pools) {
            let constant = pool[rng.gen_range(0..pool.len())].clone();
            grounding.bind(var.clone(), constant);
        }
        grounding
    }

    fn current(&self) -> Grounding {
        let mut grounding = Grounding::new();
        for ((var, pool), &idx) in self.vars.iter().zip(&self.pools).zip(&self.indices) {
            grounding.bind(var.clone(), pool[idx].clone());
        }
        grounding
    }

    fn advance(&mut self) {
        for pos in (0..self.indices.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.pools[pos].len() {
                return;
            }
            self.indices[pos] = 0;
        }
        self.done = true;
    }
}

impl<'a> Iterator for GroundingIter<'a> {
    type Item = Grounding;

    fn next(&mut self) -> Option<Grounding> {
        if self.done {
            return None;
        }
        let grounding = self.current();
        if self.indices.is_empty() {
            // No variables: a single empty grounding.
            self.done = true;
        } else {
            self.advance();
        }
        Some(grounding)
    }
}
