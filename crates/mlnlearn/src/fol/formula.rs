//! First-order formulas and CNF conversion
//!
//! Formulas are a closed variant type; grounding and CNF conversion walk
//! the structure by pattern matching. The fragment is quantifier-free, so
//! conversion is negation normal form followed by distribution.

use super::atom::Atom;
use super::clause::{Clause, Literal};
use super::term::Variable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A quantifier-free first-order formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Formula {
    Atom(Atom),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
}

impl Formula {
    pub fn not(f: Formula) -> Formula {
        Formula::Not(Box::new(f))
    }

    pub fn and(a: Formula, b: Formula) -> Formula {
        Formula::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Formula, b: Formula) -> Formula {
        Formula::Or(Box::new(a), Box::new(b))
    }

    pub fn iff(a: Formula, b: Formula) -> Formula {
        Formula::Iff(Box::new(a), Box::new(b))
    }

    /// Variables of this formula, without duplicates.
    pub fn variables(&self) -> Vec<Variable> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<Variable>) {
        match self {
            Formula::Atom(atom) => {
                for v in atom.variables() {
                    if !vars.contains(&v) {
                        vars.push(v);
                    }
                }
            }
            Formula::Not(f) => f.collect_variables(vars),
            Formula::And(a, b) | Formula::Or(a, b) | Formula::Iff(a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
        }
    }

    /// A formula is ground iff it contains no variables.
    pub fn is_ground(&self) -> bool {
        match self {
            Formula::Atom(atom) => atom.is_ground(),
            Formula::Not(f) => f.is_ground(),
            Formula::And(a, b) | Formula::Or(a, b) | Formula::Iff(a, b) => {
                a.is_ground() && b.is_ground()
            }
        }
    }

    /// Convert to CNF: a set of disjunction-of-literal clauses.
    ///
    /// Tautological clauses are dropped; a trivially true formula yields
    /// no clauses.
    pub fn to_cnf(&self) -> Vec<Clause> {
        let nnf = self.nnf(true);
        let mut clauses: Vec<Clause> = Vec::new();
        for clause in distribute(&nnf) {
            let clause = clause.canonical();
            if clause.is_tautology() || clauses.contains(&clause) {
                continue;
            }
            clauses.push(clause);
        }
        clauses
    }

    /// Negation normal form. `positive` tracks the polarity of the
    /// enclosing context; biconditionals expand into both implications.
    fn nnf(&self, positive: bool) -> Nnf {
        match self {
            Formula::Atom(atom) => Nnf::Lit(Literal {
                atom: atom.clone(),
                polarity: positive,
            }),
            Formula::Not(f) => f.nnf(!positive),
            Formula::And(a, b) => {
                let parts = vec![a.nnf(positive), b.nnf(positive)];
                if positive {
                    Nnf::And(parts)
                } else {
                    Nnf::Or(parts)
                }
            }
            Formula::Or(a, b) => {
                let parts = vec![a.nnf(positive), b.nnf(positive)];
                if positive {
                    Nnf::Or(parts)
                } else {
                    Nnf::And(parts)
                }
            }
            Formula::Iff(a, b) => {
                if positive {
                    // (¬a ∨ b) ∧ (¬b ∨ a)
                    Nnf::And(vec![
                        Nnf::Or(vec![a.nnf(false), b.nnf(true)]),
                        Nnf::Or(vec![b.nnf(false), a.nnf(true)]),
                    ])
                } else {
                    // (a ∨ b) ∧ (¬a ∨ ¬b)
                    Nnf::And(vec![
                        Nnf::Or(vec![a.nnf(true), b.nnf(true)]),
                        Nnf::Or(vec![a.nnf(false), b.nnf(false)]),
                    ])
                }
            }
        }
    }
}

impl Clause {
    /// The disjunction formula equivalent to this clause. `None` for the
    /// empty clause, which has no formula rendering here.
    pub fn to_formula(&self) -> Option<Formula> {
        let mut literals = self.literals.iter();
        let first = literals.next()?;
        let mut formula = literal_formula(first);
        for lit in literals {
            formula = Formula::or(formula, literal_formula(lit));
        }
        Some(formula)
    }
}

fn literal_formula(lit: &Literal) -> Formula {
    let atom = Formula::Atom(lit.atom.clone());
    if lit.polarity {
        atom
    } else {
        Formula::not(atom)
    }
}

/// Negation normal form tree used during CNF conversion.
enum Nnf {
    Lit(Literal),
    And(Vec<Nnf>),
    Or(Vec<Nnf>),
}

/// Distribute disjunction over conjunction.
fn distribute(nnf: &Nnf) -> Vec<Clause> {
    match nnf {
        Nnf::Lit(lit) => vec![Clause::new(vec![lit.clone()])],
        Nnf::And(parts) => parts.iter().flat_map(distribute).collect(),
        Nnf::Or(parts) => {
            let mut acc = vec![Clause::new(vec![])];
            for part in parts {
                let clauses = distribute(part);
                let mut next = Vec::with_capacity(acc.len() * clauses.len());
                for left in &acc {
                    for right in &clauses {
                        let mut literals = left.literals.clone();
                        literals.extend(right.literals.iter().cloned());
                        next.push(Clause::new(literals));
                    }
                }
                acc = next;
            }
            acc
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Atom(atom) => write!(f, "{}", atom),
            Formula::Not(inner) => write!(f, "¬{}", inner),
            Formula::And(a, b) => write!(f, "({} ∧ {})", a, b),
            Formula::Or(a, b) => write!(f, "({} ∨ {})", a, b),
            Formula::Iff(a, b) => write!(f, "({} ↔ {})", a, b),
        }
    }
}
