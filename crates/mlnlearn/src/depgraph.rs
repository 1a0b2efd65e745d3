//! Dependency graph construction over atoms
//!
//! Grow-shrink independence-network construction in the GSIMN style: an
//! undirected graph over atoms where an edge records an observed
//! statistical dependence. Every oracle verdict is cached by (unordered
//! pair, conditioning-set fingerprint), and before any fresh oracle call
//! the builder tries to settle the question from cached verdicts along
//! length-two paths of the current partial graph. Inferred verdicts are
//! invalidated whenever the graph mutates.
//!
//! Absence of an edge is a heuristic claim: the conditioning-set search
//! is bounded, and past the bound the builder keeps the edge (a false
//! positive is preferred over a missed real dependence).

use crate::error::Result;
use crate::fol::Atom;
use crate::independence::{Independence, IndependenceOracle};
use std::collections::{BTreeSet, HashMap};

/// Undirected graph over a fixed vertex list of atoms.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    vertices: Vec<Atom>,
    adjacency: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn new(vertices: Vec<Atom>) -> Self {
        let adjacency = vec![BTreeSet::new(); vertices.len()];
        DependencyGraph {
            vertices,
            adjacency,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[Atom] {
        &self.vertices
    }

    pub fn vertex(&self, idx: usize) -> &Atom {
        &self.vertices[idx]
    }

    pub fn index_of(&self, atom: &Atom) -> Option<usize> {
        self.vertices.iter().position(|v| v == atom)
    }

    pub fn has_edge(&self, i: usize, j: usize) -> bool {
        self.adjacency[i].contains(&j)
    }

    pub fn add_edge(&mut self, i: usize, j: usize) {
        if i != j {
            self.adjacency[i].insert(j);
            self.adjacency[j].insert(i);
        }
    }

    pub fn remove_edge(&mut self, i: usize, j: usize) {
        self.adjacency[i].remove(&j);
        self.adjacency[j].remove(&i);
    }

    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[i].iter().copied()
    }

    /// All edges as ordered (low, high) index pairs.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (i, neighbors) in self.adjacency.iter().enumerate() {
            for &j in neighbors {
                if i < j {
                    edges.push((i, j));
                }
            }
        }
        edges
    }
}

/// Bounds for the grow-shrink construction.
#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    /// Significance level handed to the oracle.
    pub alpha: f64,
    /// Largest conditioning set tried during shrink. Past this bound an
    /// edge is kept without further testing.
    pub max_conditioning: usize,
    /// Shrink pass budget; construction also stops on a changeless pass.
    pub max_passes: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            alpha: 0.05,
            max_conditioning: 3,
            max_passes: 10,
        }
    }
}

/// One cached test outcome. Inferred entries came from path shortcuts
/// rather than the oracle and are dropped when the graph changes.
#[derive(Debug, Clone, Copy)]
struct CachedVerdict {
    verdict: Independence,
    inferred: bool,
}

type TestKey = ((usize, usize), Vec<usize>);

/// Builds a dependency graph by driving the oracle with cached-result
/// and transitive-shortcut reuse.
pub struct GraphBuilder<'a> {
    oracle: IndependenceOracle<'a>,
    config: GraphConfig,
    cache: HashMap<TestKey, CachedVerdict>,
    /// Separating sets found for removed edges.
    separators: HashMap<(usize, usize), Vec<usize>>,
    oracle_calls: usize,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(oracle: IndependenceOracle<'a>, config: GraphConfig) -> Self {
        GraphBuilder {
            oracle,
            config,
            cache: HashMap::new(),
            separators: HashMap::new(),
            oracle_calls: 0,
        }
    }

    /// Number of actual oracle invocations issued so far.
    pub fn oracle_calls(&self) -> usize {
        self.oracle_calls
    }

    /// The separating set found for a vertex pair, if any.
    pub fn separator(&self, i: usize, j: usize) -> Option<&[usize]> {
        self.separators.get(&pair(i, j)).map(Vec::as_slice)
    }

    /// Build the graph over `vertices`. Deterministic for a fixed vertex
    /// list and data set.
    pub fn run(&mut self, vertices: Vec<Atom>) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new(vertices);
        self.grow(&mut graph)?;
        self.shrink(&mut graph)?;
        log::debug!(
            "dependency graph: {} vertices, {} edges, {} oracle calls",
            graph.vertex_count(),
            graph.edges().len(),
            self.oracle_calls
        );
        Ok(graph)
    }

    /// Grow phase: add an edge for every pair found dependent with an
    /// empty conditioning set.
    fn grow(&mut self, graph: &mut DependencyGraph) -> Result<()> {
        let n = graph.vertex_count();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.query(graph, i, j, &[])? == Independence::Dependent {
                    graph.add_edge(i, j);
                    self.invalidate_inferred();
                }
            }
        }
        Ok(())
    }

    /// Shrink phase: re-test existing edges with growing conditioning
    /// sets drawn from the endpoints' neighborhoods; remove an edge when
    /// a separating set is found. Terminates on a changeless full pass
    /// or after the pass budget.
    fn shrink(&mut self, graph: &mut DependencyGraph) -> Result<()> {
        for _pass in 0..self.config.max_passes {
            let mut changed = false;
            for (i, j) in graph.edges() {
                if let Some(sep) = self.find_separator(graph, i, j)? {
                    graph.remove_edge(i, j);
                    self.invalidate_inferred();
                    log::debug!(
                        "removed edge {} -- {} (separated by {:?})",
                        graph.vertex(i),
                        graph.vertex(j),
                        sep
                    );
                    self.separators.insert(pair(i, j), sep);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(())
    }

    fn find_separator(
        &mut self,
        graph: &DependencyGraph,
        i: usize,
        j: usize,
    ) -> Result<Option<Vec<usize>>> {
        let mut candidates: Vec<usize> = graph
            .neighbors(i)
            .chain(graph.neighbors(j))
            .filter(|&v| v != i && v != j)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        for size in 1..=self.config.max_conditioning.min(candidates.len()) {
            for cond in combinations(&candidates, size) {
                if self.query(graph, i, j, &cond)? == Independence::Independent {
                    return Ok(Some(cond));
                }
            }
        }
        Ok(None)
    }

    /// Answer an independence question, in order of preference: cached
    /// verdict, transitive shortcut over the partial graph, conditioning
    /// cap default, fresh oracle call.
    fn query(
        &mut self,
        graph: &DependencyGraph,
        i: usize,
        j: usize,
        cond: &[usize],
    ) -> Result<Independence> {
        let key = (pair(i, j), cond.to_vec());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.verdict);
        }

        if let Some(verdict) = self.shortcut(graph, i, j, cond) {
            self.cache.insert(
                key,
                CachedVerdict {
                    verdict,
                    inferred: true,
                },
            );
            return Ok(verdict);
        }

        // Conditioning sets past the policy bound are never tested; keep
        // the edge rather than risk dropping a real dependence.
        if cond.len() > self.config.max_conditioning {
            return Ok(Independence::Dependent);
        }

        let z: Vec<Atom> = cond.iter().map(|&v| graph.vertex(v).clone()).collect();
        let verdict = self.oracle.test(
            graph.vertex(i),
            graph.vertex(j),
            &z,
            self.config.alpha,
        )?;
        self.oracle_calls += 1;
        if verdict == Independence::Independent && !cond.is_empty() {
            self.separators.entry(pair(i, j)).or_insert_with(|| cond.to_vec());
        }
        self.cache.insert(
            key,
            CachedVerdict {
                verdict,
                inferred: false,
            },
        );
        Ok(verdict)
    }

    /// Settle (i, j | cond) from cached verdicts along length-two paths
    /// i -- w -- j of the current partial graph: dependence propagated
    /// through both legs implies dependence, and an independent leg next
    /// to a dependent leg screens the endpoints. Heuristic reuse, cached
    /// as inferred.
    fn shortcut(
        &self,
        graph: &DependencyGraph,
        i: usize,
        j: usize,
        cond: &[usize],
    ) -> Option<Independence> {
        for w in 0..graph.vertex_count() {
            if w == i || w == j || cond.contains(&w) {
                continue;
            }
            if !graph.has_edge(i, w) && !graph.has_edge(w, j) {
                continue;
            }
            let (Some(left), Some(right)) =
                (self.tested(i, w, cond), self.tested(w, j, cond))
            else {
                continue;
            };
            match (left, right) {
                (Independence::Dependent, Independence::Dependent) => {
                    return Some(Independence::Dependent)
                }
                (Independence::Independent, Independence::Dependent)
                | (Independence::Dependent, Independence::Independent) => {
                    return Some(Independence::Independent)
                }
                _ => {}
            }
        }
        None
    }

    /// A cached, oracle-issued (not inferred) verdict for a pair.
    fn tested(&self, i: usize, j: usize, cond: &[usize]) -> Option<Independence> {
        let key = (pair(i, j), cond.to_vec());
        self.cache
            .get(&key)
            .filter(|c| !c.inferred)
            .map(|c| c.verdict)
    }

    fn invalidate_inferred(&mut self) {
        self.cache.retain(|_, v| !v.inferred);
    }
}

fn pair(i: usize, j: usize) -> (usize, usize) {
    if i < j {
        (i, j)
    } else {
        (j, i)
    }
}

/// All size-`k` subsets of `items`, in lexicographic order.
fn combinations(items: &[usize], k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if items.len() < k {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (idx, &first) in items.iter().enumerate() {
        if items.len() - idx < k {
            break;
        }
        for mut rest in combinations(&items[idx + 1..], k - 1) {
            rest.insert(0, first);
            out.push(rest);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;
    use crate::fol::{Domain, PredicateSymbol, Term, Universe, Variable};
    use crate::independence::OracleConfig;

    #[test]
    fn test_combinations() {
        let items = vec![1, 2, 3, 4];
        assert_eq!(combinations(&items, 1).len(), 4);
        assert_eq!(combinations(&items, 2).len(), 6);
        assert_eq!(combinations(&items, 4), vec![vec![1, 2, 3, 4]]);
        assert!(combinations(&items, 5).is_empty());
    }

    /// Three single-argument predicates over one domain: P and Q move
    /// together, R is balanced against both.
    fn three_predicate_db() -> (Database, Vec<Atom>) {
        let names: Vec<String> = (0..8).map(|i| format!("c{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut universe = Universe::new();
        universe.add_domain(Domain::new("d", &refs)).unwrap();

        let preds: Vec<PredicateSymbol> = ["P", "Q", "R"]
            .iter()
            .map(|n| PredicateSymbol::new(n, &["d"]))
            .collect();
        let mut db = Database::new(universe.clone());
        for p in &preds {
            db.declare(p.clone());
        }
        for (i, c) in universe.constants_of("d").unwrap().iter().enumerate() {
            let term = Term::Constant(c.clone());
            let pv = i % 2 == 0;
            let qv = pv;
            let rv = (i / 2) % 2 == 0;
            db.set_bool(Atom::new(preds[0].clone(), vec![term.clone()]).unwrap(), pv)
                .unwrap();
            db.set_bool(Atom::new(preds[1].clone(), vec![term.clone()]).unwrap(), qv)
                .unwrap();
            db.set_bool(Atom::new(preds[2].clone(), vec![term]).unwrap(), rv)
                .unwrap();
        }
        let x = Term::Variable(Variable::new("X", "d"));
        let vertices = preds
            .iter()
            .map(|p| Atom::new(p.clone(), vec![x.clone()]).unwrap())
            .collect();
        (db, vertices)
    }

    #[test]
    fn test_grow_finds_dependent_pair_only() {
        let (db, vertices) = three_predicate_db();
        let oracle = IndependenceOracle::new(&db, db.universe(), OracleConfig::default());
        let mut builder = GraphBuilder::new(oracle, GraphConfig::default());
        let graph = builder.run(vertices).unwrap();
        assert_eq!(graph.edges(), vec![(0, 1)]);
    }

    #[test]
    fn test_determinism() {
        let (db, vertices) = three_predicate_db();
        let edges: Vec<_> = (0..3)
            .map(|_| {
                let oracle =
                    IndependenceOracle::new(&db, db.universe(), OracleConfig::default());
                let mut builder = GraphBuilder::new(oracle, GraphConfig::default());
                builder.run(vertices.clone()).unwrap().edges()
            })
            .collect();
        assert_eq!(edges[0], edges[1]);
        assert_eq!(edges[1], edges[2]);
    }

    #[test]
    fn test_cache_limits_oracle_calls() {
        let (db, vertices) = three_predicate_db();
        let oracle = IndependenceOracle::new(&db, db.universe(), OracleConfig::default());
        let mut builder = GraphBuilder::new(oracle, GraphConfig::default());
        builder.run(vertices).unwrap();
        // P-Q and P-R are tested; Q-R is settled by the shortcut over
        // the partial graph (dependent leg P-Q, independent leg P-R),
        // and the shrink pass on the surviving edge finds no candidates.
        assert_eq!(builder.oracle_calls(), 2);
    }
}
