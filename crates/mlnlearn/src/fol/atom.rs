//! Predicates and atomic formulas

use super::term::{Term, Variable};
use crate::error::{MlnError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A predicate symbol with a typed signature: one domain per argument
/// position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredicateSymbol {
    pub name: String,
    pub domains: Vec<String>,
}

impl PredicateSymbol {
    pub fn new(name: &str, domains: &[&str]) -> Self {
        PredicateSymbol {
            name: name.to_string(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.domains.len()
    }

    /// The fully general atom for this predicate: a fresh variable per
    /// argument position. Used to enumerate every ground atom.
    pub fn open_atom(&self) -> Atom {
        let args = self
            .domains
            .iter()
            .enumerate()
            .map(|(i, d)| Term::Variable(Variable::new(&format!("V{}", i), d)))
            .collect();
        Atom {
            predicate: self.clone(),
            args,
        }
    }
}

/// An atomic formula: a predicate applied to a term tuple.
///
/// `Atom::new` checks the arity and per-position domain invariant; the
/// fields stay public in the style of the rest of the value layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Atom {
    pub predicate: PredicateSymbol,
    pub args: Vec<Term>,
}

impl Atom {
    /// Create an atom, validating arity and argument domains.
    pub fn new(predicate: PredicateSymbol, args: Vec<Term>) -> Result<Self> {
        if args.len() != predicate.arity() {
            return Err(MlnError::MalformedInput(format!(
                "predicate '{}' has arity {}, got {} arguments",
                predicate.name,
                predicate.arity(),
                args.len()
            )));
        }
        for (term, domain) in args.iter().zip(&predicate.domains) {
            if term.domain() != domain {
                return Err(MlnError::MalformedInput(format!(
                    "argument '{}' of '{}' has domain '{}', expected '{}'",
                    term,
                    predicate.name,
                    term.domain(),
                    domain
                )));
            }
        }
        Ok(Atom { predicate, args })
    }

    /// An atom is ground iff it contains no variables.
    pub fn is_ground(&self) -> bool {
        self.args.iter().all(Term::is_ground)
    }

    /// Variables of this atom, in argument order, without duplicates.
    pub fn variables(&self) -> Vec<Variable> {
        let mut vars = Vec::new();
        for term in &self.args {
            if let Some(v) = term.as_variable() {
                if !vars.contains(v) {
                    vars.push(v.clone());
                }
            }
        }
        vars
    }

    /// Whether two atoms share at least one logical variable.
    pub fn shares_variable(&self, other: &Atom) -> bool {
        let mine = self.variables();
        other.variables().iter().any(|v| mine.contains(v))
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}
