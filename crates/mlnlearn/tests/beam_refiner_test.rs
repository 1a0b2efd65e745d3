//! Refinement behavior against a hand-built dependency graph.

use mlnlearn::{
    Atom, BeamConfig, BeamRefiner, Clause, Database, DependencyGraph, Domain, Formula,
    GradientSolver, Literal, PredicateSymbol, PseudoLogLikelihood, Score, Solver, Term, Universe,
    Variable, WeightOptimizer,
};
use std::sync::Arc;

fn predicate(name: &str) -> PredicateSymbol {
    PredicateSymbol::new(name, &["item"])
}

fn open_atom(name: &str) -> Atom {
    Atom::new(
        predicate(name),
        vec![Term::Variable(Variable::new("X", "item"))],
    )
    .unwrap()
}

/// Q and R coincide on the first half of eight items.
fn db() -> Arc<Database> {
    let names: Vec<String> = (1..=8).map(|i| format!("a{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut universe = Universe::new();
    universe.add_domain(Domain::new("item", &refs)).unwrap();
    let mut db = Database::new(universe.clone());
    db.declare(predicate("Q"));
    db.declare(predicate("R"));
    for (i, c) in universe.constants_of("item").unwrap().iter().enumerate() {
        let term = Term::Constant(c.clone());
        for name in ["Q", "R"] {
            db.set_bool(
                Atom::new(predicate(name), vec![term.clone()]).unwrap(),
                i < 4,
            )
            .unwrap();
        }
    }
    Arc::new(db)
}

fn edge_clauses(q: &Atom, r: &Atom) -> Vec<Clause> {
    let mut pool = Vec::new();
    for pq in [true, false] {
        for pr in [true, false] {
            pool.push(
                Clause::new(vec![
                    Literal {
                        atom: q.clone(),
                        polarity: pq,
                    },
                    Literal {
                        atom: r.clone(),
                        polarity: pr,
                    },
                ])
                .canonical(),
            );
        }
    }
    pool
}

#[test]
fn test_refiner_finds_improving_clause_without_touching_caller() {
    let q = open_atom("Q");
    let r = open_atom("R");
    let mut score = PseudoLogLikelihood::new(db(), 0, 2).unwrap();
    let units = [Formula::Atom(q.clone()), Formula::Atom(r.clone())];
    assert!(score.add_formulas(&units));

    let solver: Arc<dyn Solver> = Arc::new(GradientSolver::default());
    let mut optimizer = WeightOptimizer::new(Box::new(score), solver.clone());
    let weights = optimizer.learn(&[0.0, 0.0]).unwrap();
    let baseline = optimizer.score().unwrap();

    let mut graph = DependencyGraph::new(vec![q.clone(), r.clone()]);
    graph.add_edge(0, 1);
    let refiner = BeamRefiner::new(&graph, BeamConfig::default(), solver, 2);

    let best = refiner
        .refine(optimizer.score_fn(), &weights, baseline, edge_clauses(&q, &r))
        .unwrap()
        .expect("correlated predicates yield an improving clause");

    assert!(best.score > baseline);
    assert!(best.weight.abs() >= BeamConfig::default().min_weight);
    assert_eq!(best.clause.literals.len(), 2);
    // Trial evaluations ran on copies; the caller still tracks only the
    // two unit clauses.
    assert_eq!(optimizer.tracked(), 2);
}

#[test]
fn test_committing_the_found_clause_raises_the_objective() {
    let q = open_atom("Q");
    let r = open_atom("R");
    let mut score = PseudoLogLikelihood::new(db(), 0, 2).unwrap();
    score.add_formulas(&[Formula::Atom(q.clone()), Formula::Atom(r.clone())]);

    let solver: Arc<dyn Solver> = Arc::new(GradientSolver::default());
    let mut optimizer = WeightOptimizer::new(Box::new(score), solver.clone());
    let mut weights = optimizer.learn(&[0.0, 0.0]).unwrap();
    let baseline = optimizer.score().unwrap();

    let mut graph = DependencyGraph::new(vec![q.clone(), r.clone()]);
    graph.add_edge(0, 1);
    let refiner = BeamRefiner::new(&graph, BeamConfig::default(), solver, 2);
    let best = refiner
        .refine(optimizer.score_fn(), &weights, baseline, edge_clauses(&q, &r))
        .unwrap()
        .expect("an improving clause exists");

    // The commit path: add, warm-start from the fitted weight, re-learn.
    assert!(optimizer.add_formula(&best.formula));
    weights.push(best.weight);
    optimizer.learn(&weights).unwrap();
    assert!(optimizer.score().unwrap() > baseline);
}

#[test]
fn test_refiner_returns_none_on_empty_pool() {
    let q = open_atom("Q");
    let r = open_atom("R");
    let mut score = PseudoLogLikelihood::new(db(), 0, 1).unwrap();
    score.add_formulas(&[Formula::Atom(q.clone()), Formula::Atom(r.clone())]);

    let solver: Arc<dyn Solver> = Arc::new(GradientSolver::default());
    let graph = DependencyGraph::new(vec![q, r]);
    let refiner = BeamRefiner::new(&graph, BeamConfig::default(), solver, 1);

    let result = refiner.refine(&score, &[0.0, 0.0], 0.0, Vec::new()).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_refiner_respects_unbeatable_baseline() {
    let q = open_atom("Q");
    let r = open_atom("R");
    let mut score = PseudoLogLikelihood::new(db(), 0, 2).unwrap();
    score.add_formulas(&[Formula::Atom(q.clone()), Formula::Atom(r.clone())]);

    let solver: Arc<dyn Solver> = Arc::new(GradientSolver::default());
    let mut graph = DependencyGraph::new(vec![q.clone(), r.clone()]);
    graph.add_edge(0, 1);
    let refiner = BeamRefiner::new(&graph, BeamConfig::default(), solver, 2);

    // The pseudo-log-likelihood is bounded above by zero.
    let result = refiner
        .refine(&score, &[0.0, 0.0], 1.0, edge_clauses(&q, &r))
        .unwrap();
    assert!(result.is_none());
}
