//! Literals and clauses
//!
//! A clause is a disjunction of literals; it is the canonical form used
//! for scoring and for candidate generation during structure search.

use super::atom::Atom;
use super::term::Variable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal: a positive or negated atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub atom: Atom,
    pub polarity: bool,
}

impl Literal {
    pub fn positive(atom: Atom) -> Self {
        Literal {
            atom,
            polarity: true,
        }
    }

    pub fn negative(atom: Atom) -> Self {
        Literal {
            atom,
            polarity: false,
        }
    }

    pub fn complement(&self) -> Literal {
        Literal {
            atom: self.atom.clone(),
            polarity: !self.polarity,
        }
    }
}

/// A clause (disjunction of literals).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clause {
    pub literals: Vec<Literal>,
}

impl Clause {
    pub fn new(literals: Vec<Literal>) -> Self {
        Clause { literals }
    }

    /// A single positive literal over `atom`.
    pub fn unit(atom: Atom) -> Self {
        Clause {
            literals: vec![Literal::positive(atom)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Sort literals and drop duplicates, so structurally equal clauses
    /// compare and hash equal regardless of construction order.
    pub fn canonical(mut self) -> Self {
        self.literals.sort();
        self.literals.dedup();
        self
    }

    /// A clause containing an atom with both polarities is always true.
    pub fn is_tautology(&self) -> bool {
        for i in 0..self.literals.len() {
            for j in (i + 1)..self.literals.len() {
                if self.literals[i].atom == self.literals[j].atom
                    && self.literals[i].polarity != self.literals[j].polarity
                {
                    return true;
                }
            }
        }
        false
    }

    /// Variables of this clause, without duplicates, in literal order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut vars = Vec::new();
        for lit in &self.literals {
            for v in lit.atom.variables() {
                if !vars.contains(&v) {
                    vars.push(v);
                }
            }
        }
        vars
    }

    pub fn is_ground(&self) -> bool {
        self.literals.iter().all(|lit| lit.atom.is_ground())
    }

    /// Evaluate this clause under a truth assignment for its atoms.
    pub fn is_satisfied<F>(&self, truth: &F) -> bool
    where
        F: Fn(&Atom) -> bool,
    {
        self.literals
            .iter()
            .any(|lit| truth(&lit.atom) == lit.polarity)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.polarity {
            write!(f, "~")?;
        }
        write!(f, "{}", self.atom)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "⊥");
        }
        for (i, lit) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, " ∨ ")?;
            }
            write!(f, "{}", lit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::term::Term;
    use crate::fol::PredicateSymbol;

    fn atom(name: &str) -> Atom {
        let p = PredicateSymbol::new(name, &["d"]);
        Atom::new(p, vec![Term::Variable(Variable::new("X", "d"))]).unwrap()
    }

    #[test]
    fn test_tautology() {
        let clause = Clause::new(vec![
            Literal::positive(atom("P")),
            Literal::negative(atom("P")),
        ]);
        assert!(clause.is_tautology());
    }

    #[test]
    fn test_canonical_order_independent() {
        let a = Clause::new(vec![Literal::positive(atom("P")), Literal::negative(atom("Q"))]);
        let b = Clause::new(vec![Literal::negative(atom("Q")), Literal::positive(atom("P"))]);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_satisfaction() {
        let clause = Clause::new(vec![
            Literal::positive(atom("P")),
            Literal::negative(atom("Q")),
        ]);
        // P false, Q true: both literals false
        assert!(!clause.is_satisfied(&|a| a.predicate.name == "Q"));
        // P true: satisfied
        assert!(clause.is_satisfied(&|a| a.predicate.name == "P"));
    }
}
