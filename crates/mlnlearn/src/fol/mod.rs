//! First-order logic value layer
//!
//! Terms, atoms, literals, clauses, formulas and groundings. All types
//! are immutable structural values; equality is by structure.

pub mod atom;
pub mod clause;
pub mod formula;
pub mod grounding;
pub mod term;

pub use atom::{Atom, PredicateSymbol};
pub use clause::{Clause, Literal};
pub use formula::Formula;
pub use grounding::{Grounding, GroundingIter};
pub use term::{Constant, Domain, Term, Universe, Variable};
