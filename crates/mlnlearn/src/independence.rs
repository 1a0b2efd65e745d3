//! Conditional independence testing
//!
//! The oracle decides whether two atoms are statistically dependent given
//! a conditioning set, over the joint groundings of their shared
//! variables. Boolean data use a stratified chi-square statistic; real
//! data use a partial-correlation t statistic against a precomputed
//! critical-value table (normal beyond the table's degrees of freedom).
//!
//! Two policy defaults are deliberate modeling biases, not statistical
//! truths: atoms with no shared logical variable are independent without
//! a test, and the absence of joint observations counts as independence.
//! Both push toward sparser dependency graphs.

use crate::data::{DataSource, Value};
use crate::error::Result;
use crate::fol::{Atom, GroundingIter, Universe, Variable};
use once_cell::sync::Lazy;

/// Verdict of an independence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Independence {
    Independent,
    Dependent,
}

/// Configuration for the independence oracle.
#[derive(Debug, Clone, Copy)]
pub struct OracleConfig {
    /// Two-sided significance level; snapped to the nearest tabulated
    /// column (0.10, 0.05, 0.01).
    pub alpha: f64,
    /// Variance below this is treated as no variance at all.
    pub min_variance: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            alpha: 0.05,
            min_variance: 1e-9,
        }
    }
}

/// Tabulated two-sided alphas, and their upper-tail normal quantiles for
/// the large-df fallback.
const ALPHAS: [f64; 3] = [0.10, 0.05, 0.01];
const NORMAL_TWO_SIDED: [f64; 3] = [1.6449, 1.9600, 2.5758];
const NORMAL_UPPER: [f64; 3] = [1.2816, 1.6449, 2.3263];

/// Two-sided Student-t critical values for df 1..=30, one column per
/// alpha in `ALPHAS`. Computed once per process.
static CRITICAL_T: Lazy<Vec<[f64; 3]>> = Lazy::new(|| {
    vec![
        [6.314, 12.706, 63.657],
        [2.920, 4.303, 9.925],
        [2.353, 3.182, 5.841],
        [2.132, 2.776, 4.604],
        [2.015, 2.571, 4.032],
        [1.943, 2.447, 3.707],
        [1.895, 2.365, 3.499],
        [1.860, 2.306, 3.355],
        [1.833, 2.262, 3.250],
        [1.812, 2.228, 3.169],
        [1.796, 2.201, 3.106],
        [1.782, 2.179, 3.055],
        [1.771, 2.160, 3.012],
        [1.761, 2.145, 2.977],
        [1.753, 2.131, 2.947],
        [1.746, 2.120, 2.921],
        [1.740, 2.110, 2.898],
        [1.734, 2.101, 2.878],
        [1.729, 2.093, 2.861],
        [1.725, 2.086, 2.845],
        [1.721, 2.080, 2.831],
        [1.717, 2.074, 2.819],
        [1.714, 2.069, 2.807],
        [1.711, 2.064, 2.797],
        [1.708, 2.060, 2.787],
        [1.706, 2.056, 2.779],
        [1.703, 2.052, 2.771],
        [1.701, 2.048, 2.763],
        [1.699, 2.045, 2.756],
        [1.697, 2.042, 2.750],
    ]
});

fn alpha_column(alpha: f64) -> usize {
    let mut best = 0;
    for (i, a) in ALPHAS.iter().enumerate() {
        if (alpha - a).abs() < (alpha - ALPHAS[best]).abs() {
            best = i;
        }
    }
    best
}

/// Two-sided t critical value; normal quantile past the table.
fn t_critical(df: usize, alpha: f64) -> f64 {
    let col = alpha_column(alpha);
    if df == 0 {
        return f64::INFINITY;
    }
    if df <= CRITICAL_T.len() {
        CRITICAL_T[df - 1][col]
    } else {
        NORMAL_TWO_SIDED[col]
    }
}

/// Upper-tail chi-square critical value via the Wilson-Hilferty
/// approximation.
fn chi_square_critical(df: usize, alpha: f64) -> f64 {
    let z = NORMAL_UPPER[alpha_column(alpha)];
    let df = df as f64;
    let term = 1.0 - 2.0 / (9.0 * df) + z * (2.0 / (9.0 * df)).sqrt();
    df * term.powi(3)
}

/// One joint observation of (x, y, conditioning set).
struct Row {
    x: Value,
    y: Value,
    z: Vec<Value>,
}

/// Statistical test of conditional independence between two atoms.
pub struct IndependenceOracle<'a> {
    data: &'a dyn DataSource,
    universe: &'a Universe,
    config: OracleConfig,
}

impl<'a> IndependenceOracle<'a> {
    pub fn new(data: &'a dyn DataSource, universe: &'a Universe, config: OracleConfig) -> Self {
        IndependenceOracle {
            data,
            universe,
            config,
        }
    }

    /// Test whether `x` and `y` are independent given `z` at level
    /// `alpha`. Symmetric in `x` and `y`.
    pub fn test(&self, x: &Atom, y: &Atom, z: &[Atom], alpha: f64) -> Result<Independence> {
        // Atoms with no shared variable never constrain each other's
        // groundings: independent without consulting the data.
        if !x.shares_variable(y) {
            return Ok(Independence::Independent);
        }

        let rows = self.joint_rows(x, y, z)?;
        if rows.is_empty() {
            log::debug!("no joint observations for {} vs {}; defaulting independent", x, y);
            return Ok(Independence::Independent);
        }

        let all_bool = rows
            .iter()
            .all(|r| is_bool(&r.x) && is_bool(&r.y) && r.z.iter().all(is_bool));
        if all_bool {
            Ok(self.chi_square_test(&rows, alpha))
        } else {
            Ok(self.correlation_test(&rows, alpha))
        }
    }

    /// Joint observations over the groundings of the union of variables.
    fn joint_rows(&self, x: &Atom, y: &Atom, z: &[Atom]) -> Result<Vec<Row>> {
        let mut vars: Vec<Variable> = Vec::new();
        for atom in [x, y].into_iter().chain(z) {
            for v in atom.variables() {
                if !vars.contains(&v) {
                    vars.push(v);
                }
            }
        }
        let mut rows = Vec::new();
        for grounding in GroundingIter::new(&vars, self.universe)? {
            let vx = self.data.value_of(&grounding.apply_atom(x));
            let vy = self.data.value_of(&grounding.apply_atom(y));
            let vz: Option<Vec<Value>> = z
                .iter()
                .map(|a| self.data.value_of(&grounding.apply_atom(a)))
                .collect();
            if let (Some(x), Some(y), Some(z)) = (vx, vy, vz) {
                rows.push(Row { x, y, z });
            }
        }
        Ok(rows)
    }

    /// Stratified 2x2 chi-square over the conditioning assignments.
    /// Strata with a zero margin (no variance, or no data for a joint
    /// configuration) contribute nothing.
    fn chi_square_test(&self, rows: &[Row], alpha: f64) -> Independence {
        let mut strata: Vec<(Vec<bool>, [f64; 4])> = Vec::new();
        for row in rows {
            let key: Vec<bool> = row.z.iter().map(Value::truth).collect();
            let cell = match (row.x.truth(), row.y.truth()) {
                (true, true) => 0,
                (true, false) => 1,
                (false, true) => 2,
                (false, false) => 3,
            };
            match strata.iter_mut().find(|(k, _)| *k == key) {
                Some((_, counts)) => counts[cell] += 1.0,
                None => {
                    let mut counts = [0.0; 4];
                    counts[cell] += 1.0;
                    strata.push((key, counts));
                }
            }
        }

        let mut statistic = 0.0;
        let mut df = 0usize;
        for (_, c) in &strata {
            let n = c[0] + c[1] + c[2] + c[3];
            let x_true = c[0] + c[1];
            let x_false = c[2] + c[3];
            let y_true = c[0] + c[2];
            let y_false = c[1] + c[3];
            if x_true == 0.0 || x_false == 0.0 || y_true == 0.0 || y_false == 0.0 {
                continue;
            }
            let expected = [
                x_true * y_true / n,
                x_true * y_false / n,
                x_false * y_true / n,
                x_false * y_false / n,
            ];
            for (o, e) in c.iter().zip(expected) {
                statistic += (o - e) * (o - e) / e;
            }
            df += 1;
        }

        if df == 0 {
            return Independence::Independent;
        }
        if statistic > chi_square_critical(df, alpha) {
            Independence::Dependent
        } else {
            Independence::Independent
        }
    }

    /// Partial-correlation t test for real-valued data (booleans are
    /// read as 0/1 when mixed in).
    fn correlation_test(&self, rows: &[Row], alpha: f64) -> Independence {
        let n = rows.len();
        let k = rows.first().map(|r| r.z.len()).unwrap_or(0);
        if n < k + 3 {
            // Too few joint observations to resolve anything.
            return Independence::Independent;
        }

        // Columns: 0 = x, 1 = y, 2.. = conditioning variables.
        let mut cols: Vec<Vec<f64>> = vec![Vec::with_capacity(n); 2 + k];
        for row in rows {
            cols[0].push(row.x.as_f64());
            cols[1].push(row.y.as_f64());
            for (i, v) in row.z.iter().enumerate() {
                cols[2 + i].push(v.as_f64());
            }
        }

        let cond: Vec<usize> = (2..2 + k).collect();
        let r = self.partial_correlation(&cols, 0, 1, &cond);
        let df = n - 2 - k;
        let r = r.clamp(-0.999_999, 0.999_999);
        let t = r.abs() * (df as f64 / (1.0 - r * r)).sqrt();
        if t > t_critical(df, alpha) {
            Independence::Dependent
        } else {
            Independence::Independent
        }
    }

    /// Recursive partial correlation of columns `a` and `b` given `cond`.
    fn partial_correlation(&self, cols: &[Vec<f64>], a: usize, b: usize, cond: &[usize]) -> f64 {
        match cond.split_first() {
            None => self.pearson(&cols[a], &cols[b]),
            Some((&w, rest)) => {
                let r_ab = self.partial_correlation(cols, a, b, rest);
                let r_aw = self.partial_correlation(cols, a, w, rest);
                let r_bw = self.partial_correlation(cols, b, w, rest);
                let denom = ((1.0 - r_aw * r_aw) * (1.0 - r_bw * r_bw)).sqrt();
                if denom < self.config.min_variance.sqrt() {
                    0.0
                } else {
                    (r_ab - r_aw * r_bw) / denom
                }
            }
        }
    }

    /// Pearson correlation; zero when either column has (near-)zero
    /// variance, so degenerate data reads as independent instead of
    /// dividing by zero.
    fn pearson(&self, xs: &[f64], ys: &[f64]) -> f64 {
        let n = xs.len() as f64;
        let mx = xs.iter().sum::<f64>() / n;
        let my = ys.iter().sum::<f64>() / n;
        let mut sxx = 0.0;
        let mut syy = 0.0;
        let mut sxy = 0.0;
        for (x, y) in xs.iter().zip(ys) {
            sxx += (x - mx) * (x - mx);
            syy += (y - my) * (y - my);
            sxy += (x - mx) * (y - my);
        }
        if sxx < self.config.min_variance || syy < self.config.min_variance {
            return 0.0;
        }
        sxy / (sxx * syy).sqrt()
    }
}

fn is_bool(v: &Value) -> bool {
    matches!(v, Value::Bool(_))
}
