//! Terms, domains and the constant universe

use crate::error::{MlnError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed constant. Every constant belongs to exactly one domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub domain: String,
}

impl Constant {
    pub fn new(name: &str, domain: &str) -> Self {
        Constant {
            name: name.to_string(),
            domain: domain.to_string(),
        }
    }
}

/// A variable typed by the domain it ranges over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub domain: String,
}

impl Variable {
    pub fn new(name: &str, domain: &str) -> Self {
        Variable {
            name: name.to_string(),
            domain: domain.to_string(),
        }
    }
}

/// A named, finite set of constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub constants: Vec<Constant>,
}

impl Domain {
    /// Create a domain from member names; the constants are tagged with
    /// this domain.
    pub fn new(name: &str, members: &[&str]) -> Self {
        Domain {
            name: name.to_string(),
            constants: members.iter().map(|m| Constant::new(m, name)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

/// The set of all domains declared for a run. Immutable once data loading
/// is finished; iteration order is declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Universe {
    domains: IndexMap<String, Domain>,
}

impl Universe {
    pub fn new() -> Self {
        Universe::default()
    }

    /// Add a domain, rejecting duplicate names.
    pub fn add_domain(&mut self, domain: Domain) -> Result<()> {
        if self.domains.contains_key(&domain.name) {
            return Err(MlnError::MalformedInput(format!(
                "domain '{}' declared twice",
                domain.name
            )));
        }
        self.domains.insert(domain.name.clone(), domain);
        Ok(())
    }

    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    /// Constants of a domain, or an error when the domain is unknown.
    pub fn constants_of(&self, name: &str) -> Result<&[Constant]> {
        self.domains
            .get(name)
            .map(|d| d.constants.as_slice())
            .ok_or_else(|| MlnError::MalformedInput(format!("unknown domain '{}'", name)))
    }

    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.domains.values()
    }
}

/// A term: either a variable or a constant. Function symbols do not occur
/// in this fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Variable(Variable),
    Constant(Constant),
}

impl Term {
    /// The domain this term ranges over.
    pub fn domain(&self) -> &str {
        match self {
            Term::Variable(v) => &v.domain,
            Term::Constant(c) => &c.domain,
        }
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            Term::Constant(_) => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(v) => write!(f, "{}", v),
            Term::Constant(c) => write!(f, "{}", c),
        }
    }
}
