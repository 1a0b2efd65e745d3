//! Property-based tests using proptest.

use crate::data::Database;
use crate::fol::{
    Atom, Clause, Domain, GroundingIter, Literal, PredicateSymbol, Term, Universe, Variable,
};
use crate::independence::{IndependenceOracle, OracleConfig};
use proptest::prelude::*;

fn universe_of(size: usize) -> Universe {
    let names: Vec<String> = (0..size).map(|i| format!("c{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut universe = Universe::new();
    universe
        .add_domain(Domain::new("d", &refs))
        .expect("fresh universe accepts the domain");
    universe
}

/// A database over one domain with boolean unary predicates P and Q,
/// assigned from the given truth vectors.
fn boolean_db(p_truth: &[bool], q_truth: &[bool]) -> Database {
    let universe = universe_of(p_truth.len());
    let p = PredicateSymbol::new("P", &["d"]);
    let q = PredicateSymbol::new("Q", &["d"]);
    let mut db = Database::new(universe.clone());
    db.declare(p.clone());
    db.declare(q.clone());
    let constants = universe.constants_of("d").expect("domain was added");
    for (i, c) in constants.iter().enumerate() {
        let pa = Atom::new(p.clone(), vec![Term::Constant(c.clone())]).unwrap();
        let qa = Atom::new(q.clone(), vec![Term::Constant(c.clone())]).unwrap();
        db.set_bool(pa, p_truth[i]).unwrap();
        db.set_bool(qa, q_truth[i]).unwrap();
    }
    db
}

fn unary_atom(name: &str) -> Atom {
    let p = PredicateSymbol::new(name, &["d"]);
    Atom::new(p, vec![Term::Variable(Variable::new("X", "d"))]).unwrap()
}

proptest! {
    /// The verdict never depends on argument order.
    #[test]
    fn oracle_is_symmetric(
        p_truth in proptest::collection::vec(any::<bool>(), 6),
        q_truth in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let db = boolean_db(&p_truth, &q_truth);
        let oracle = IndependenceOracle::new(&db, db.universe(), OracleConfig::default());
        let x = unary_atom("P");
        let y = unary_atom("Q");
        let xy = oracle.test(&x, &y, &[], 0.05).unwrap();
        let yx = oracle.test(&y, &x, &[], 0.05).unwrap();
        prop_assert_eq!(xy, yx);
    }

    /// A predicate compared with an exact copy of itself under a second
    /// name is never ruled independent, unless it is constant.
    #[test]
    fn oracle_detects_self_dependence(
        truth in proptest::collection::vec(any::<bool>(), 8),
    ) {
        prop_assume!(truth.iter().any(|t| *t) && truth.iter().any(|t| !*t));
        let db = boolean_db(&truth, &truth);
        let oracle = IndependenceOracle::new(&db, db.universe(), OracleConfig::default());
        let verdict = oracle
            .test(&unary_atom("P"), &unary_atom("Q"), &[], 0.05)
            .unwrap();
        prop_assert_eq!(verdict, crate::independence::Independence::Dependent);
    }

    /// Canonicalization is insensitive to literal order.
    #[test]
    fn clause_canonical_order_independent(
        entries in proptest::collection::vec((0u8..4, any::<bool>()), 1..6),
    ) {
        let literals: Vec<Literal> = entries
            .iter()
            .map(|(i, polarity)| Literal {
                atom: unary_atom(&format!("P{}", i)),
                polarity: *polarity,
            })
            .collect();
        let mut reversed = literals.clone();
        reversed.reverse();
        prop_assert_eq!(
            Clause::new(literals).canonical(),
            Clause::new(reversed).canonical()
        );
    }

    /// The grounding iterator yields exactly `total()` assignments.
    #[test]
    fn grounding_iter_is_exhaustive(n1 in 1usize..5, n2 in 1usize..5) {
        let mut universe = Universe::new();
        let a_names: Vec<String> = (0..n1).map(|i| format!("a{}", i)).collect();
        let b_names: Vec<String> = (0..n2).map(|i| format!("b{}", i)).collect();
        let a_refs: Vec<&str> = a_names.iter().map(String::as_str).collect();
        let b_refs: Vec<&str> = b_names.iter().map(String::as_str).collect();
        universe.add_domain(Domain::new("da", &a_refs)).unwrap();
        universe.add_domain(Domain::new("db", &b_refs)).unwrap();
        let vars = [Variable::new("X", "da"), Variable::new("Y", "db")];
        let iter = GroundingIter::new(&vars, &universe).unwrap();
        prop_assert_eq!(iter.total(), n1 * n2);
        prop_assert_eq!(iter.count(), n1 * n2);
    }
}
