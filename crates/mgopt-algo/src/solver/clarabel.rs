//! Clarabel backend with branch-and-bound over the binaries.
//!
//! Clarabel solves continuous conic programs
//!
//! ```text
//! minimize    q'x
//! subject to  Ax + s = b,   s ∈ K
//! ```
//!
//! so binaries are relaxed to `[0, 1]` and fixed by a depth-first search.
//! The constraint rows are assembled once per [`Problem`]; each node only
//! appends its own variable bound rows.
//!
//! Row conventions (`s = b − Ax`):
//!
//! | Constraint | `A` row | `b` |
//! |------------|---------|-----|
//! | `a·x + c == 0` | `a` | `−c` |
//! | `a·x + c <= 0` | `a` | `−c` |
//! | `a·x + c >= 0` | `−a` | `c` |
//! | `Σ w² ≤ t` | `(t+1, 2w₁…2wₖ, t−1)` in a second-order cone | |

use ::clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, IPSolver, SupportedConeT},
};
use mgopt_core::SolverSettings;
use web_time::Instant;

use super::{SolveStatus, Solution, SolverBackend};
use crate::error::{DispatchError, DispatchResult};
use crate::model::{ConstraintBody, LinExpr, Problem, Sense, VarId};

/// Pure-Rust conic backend. Always available.
#[derive(Debug, Clone, Default)]
pub struct ClarabelBackend {
    settings: SolverSettings,
}

impl ClarabelBackend {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }
}

impl SolverBackend for ClarabelBackend {
    fn id(&self) -> &str {
        "clarabel"
    }

    fn solve(&self, problem: &Problem) -> DispatchResult<Solution> {
        let start = Instant::now();
        let program = ConicProgram::from_problem(problem);
        let solution = BranchAndBound::new(problem, &program, &self.settings).run()?;
        tracing::debug!(
            status = %solution.status,
            nodes = solution.nodes,
            iterations = solution.iterations,
            vars = problem.num_vars(),
            constraints = problem.constraints().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "clarabel solve finished"
        );
        Ok(solution)
    }
}

/// Constraint rows shared by every relaxation, stored column-wise.
struct ConicProgram {
    n_var: usize,
    columns: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
    q: Vec<f64>,
}

impl ConicProgram {
    fn from_problem(problem: &Problem) -> Self {
        let n_var = problem.num_vars();
        let mut program = Self {
            n_var,
            columns: vec![Vec::new(); n_var],
            rhs: Vec::new(),
            cones: Vec::new(),
            q: vec![0.0; n_var],
        };
        for (v, c) in &problem.objective().terms {
            program.q[v.index()] += c;
        }

        for constraint in problem.constraints() {
            match &constraint.body {
                ConstraintBody::Linear { expr, sense } => {
                    let expr = expr.compressed();
                    match sense {
                        Sense::Eq => program.push_zero(&expr.terms, -expr.constant),
                        Sense::Le => program.push_nonneg(&expr.terms, 1.0, -expr.constant),
                        Sense::Ge => program.push_nonneg(&expr.terms, -1.0, expr.constant),
                    }
                }
                ConstraintBody::Cone { squares, bound } => program.push_soc(squares, bound),
            }
        }
        program
    }

    fn push_row(&mut self, terms: &[(VarId, f64)], scale: f64, b: f64) {
        let row = self.rhs.len();
        for &(v, c) in terms {
            self.columns[v.index()].push((row, scale * c));
        }
        self.rhs.push(b);
    }

    fn push_zero(&mut self, terms: &[(VarId, f64)], b: f64) {
        self.push_row(terms, 1.0, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::ZeroConeT(1)),
        }
    }

    fn push_nonneg(&mut self, terms: &[(VarId, f64)], scale: f64, b: f64) {
        self.push_row(terms, scale, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
    }

    /// Each cone entry is an affine `α·x + β`, stored as `A = −α`, `b = β`.
    fn push_soc(&mut self, squares: &[LinExpr], bound: &LinExpr) {
        let t = bound.compressed();
        self.push_row(&t.terms, -1.0, t.constant + 1.0);
        for w in squares {
            let w = w.compressed();
            self.push_row(&w.terms, -2.0, 2.0 * w.constant);
        }
        self.push_row(&t.terms, -1.0, t.constant - 1.0);
        self.cones
            .push(SupportedConeT::SecondOrderConeT(squares.len() + 2));
    }

    /// Solves the continuous relaxation under the given variable bounds.
    fn relax(
        &self,
        lower: &[Option<f64>],
        upper: &[Option<f64>],
        settings: &SolverSettings,
    ) -> DispatchResult<Relaxation> {
        let mut columns = self.columns.clone();
        let mut rhs = self.rhs.clone();
        let mut cones = self.cones.clone();
        let first_bound_row = rhs.len();
        for j in 0..self.n_var {
            if let Some(l) = lower[j] {
                columns[j].push((rhs.len(), -1.0));
                rhs.push(-l);
            }
            if let Some(u) = upper[j] {
                columns[j].push((rhs.len(), 1.0));
                rhs.push(u);
            }
        }
        if rhs.len() > first_bound_row {
            cones.push(SupportedConeT::NonnegativeConeT(rhs.len() - first_bound_row));
        }

        let n_rows = rhs.len();
        let mut col_ptr = Vec::with_capacity(self.n_var + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        for column in &mut columns {
            col_ptr.push(row_idx.len());
            column.sort_by_key(|(r, _)| *r);
            for &(r, v) in column.iter() {
                row_idx.push(r);
                values.push(v);
            }
        }
        col_ptr.push(row_idx.len());

        let a_mat = CscMatrix::new(n_rows, self.n_var, col_ptr, row_idx, values);
        let p_mat = CscMatrix::new(
            self.n_var,
            self.n_var,
            vec![0; self.n_var + 1],
            Vec::new(),
            Vec::new(),
        );

        let clarabel_settings = DefaultSettingsBuilder::default()
            .verbose(settings.verbose)
            .build()
            .map_err(|e| DispatchError::Solver(format!("Clarabel settings error: {:?}", e)))?;
        let mut solver = ::clarabel::solver::DefaultSolver::new(
            &p_mat,
            &self.q,
            &a_mat,
            &rhs,
            &cones,
            clarabel_settings,
        )
        .map_err(|e| DispatchError::Solver(format!("Clarabel initialization failed: {:?}", e)))?;
        solver.solve();

        let sol = solver.solution;
        let status = match sol.status {
            ::clarabel::solver::SolverStatus::Solved
            | ::clarabel::solver::SolverStatus::AlmostSolved => SolveStatus::Optimal,
            ::clarabel::solver::SolverStatus::PrimalInfeasible
            | ::clarabel::solver::SolverStatus::AlmostPrimalInfeasible => SolveStatus::Infeasible,
            ::clarabel::solver::SolverStatus::DualInfeasible
            | ::clarabel::solver::SolverStatus::AlmostDualInfeasible => SolveStatus::Unbounded,
            other => {
                tracing::debug!(status = ?other, "relaxation stopped without a verdict");
                SolveStatus::Error
            }
        };
        Ok(Relaxation {
            status,
            x: sol.x,
            iterations: sol.iterations as usize,
        })
    }
}

struct Relaxation {
    status: SolveStatus,
    x: Vec<f64>,
    iterations: usize,
}

struct Node {
    lower: Vec<Option<f64>>,
    upper: Vec<Option<f64>>,
}

struct BranchAndBound<'a> {
    problem: &'a Problem,
    program: &'a ConicProgram,
    settings: &'a SolverSettings,
    binaries: Vec<usize>,
}

impl<'a> BranchAndBound<'a> {
    fn new(problem: &'a Problem, program: &'a ConicProgram, settings: &'a SolverSettings) -> Self {
        Self {
            problem,
            program,
            settings,
            binaries: problem.binaries().map(|v| v.index()).collect(),
        }
    }

    fn root(&self) -> Node {
        let vars = self.problem.vars();
        Node {
            lower: vars.iter().map(|v| v.lower).collect(),
            upper: vars.iter().map(|v| v.upper).collect(),
        }
    }

    /// Binary furthest from integrality, if any is outside tolerance.
    fn most_fractional(&self, x: &[f64]) -> Option<usize> {
        self.binaries
            .iter()
            .map(|&j| (j, (x[j] - x[j].round()).abs()))
            .filter(|(_, frac)| *frac > self.settings.integrality_tolerance)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(j, _)| j)
    }

    fn run(&self) -> DispatchResult<Solution> {
        let mut stack = vec![self.root()];
        let mut incumbent: Option<(f64, Vec<f64>)> = None;
        let mut nodes = 0usize;
        let mut iterations = 0usize;
        let mut capped = false;

        while let Some(node) = stack.pop() {
            if nodes >= self.settings.max_nodes {
                capped = true;
                break;
            }
            nodes += 1;
            let relaxed = self.program.relax(&node.lower, &node.upper, self.settings)?;
            iterations += relaxed.iterations;

            if relaxed.status != SolveStatus::Optimal {
                // Below the root a non-optimal relaxation just prunes the branch.
                if nodes == 1 {
                    let mut failed = Solution::failed(relaxed.status);
                    failed.iterations = iterations;
                    failed.nodes = nodes;
                    return Ok(failed);
                }
                continue;
            }

            let objective = self.problem.objective().eval(&relaxed.x);
            if let Some((best, _)) = &incumbent {
                let gap = self.settings.relative_gap * best.abs().max(1.0);
                if objective >= best - gap {
                    continue;
                }
            }

            match self.most_fractional(&relaxed.x) {
                None => {
                    let mut x = relaxed.x;
                    for &j in &self.binaries {
                        x[j] = x[j].round();
                    }
                    // Integral within tolerance only; price the rounded point.
                    let objective = self.problem.objective().eval(&x);
                    tracing::trace!(node = nodes, objective, "new incumbent");
                    incumbent = Some((objective, x));
                }
                Some(j) => {
                    let value = relaxed.x[j];
                    let mut down = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                    };
                    down.upper[j] = Some(0.0);
                    let mut up = node;
                    up.lower[j] = Some(1.0);
                    // Nearest side is explored first, so it is pushed last.
                    if value >= 0.5 {
                        stack.push(down);
                        stack.push(up);
                    } else {
                        stack.push(up);
                        stack.push(down);
                    }
                }
            }
        }

        if capped {
            tracing::warn!(
                max_nodes = self.settings.max_nodes,
                has_incumbent = incumbent.is_some(),
                "branch-and-bound node limit reached"
            );
        }

        let mut solution = match incumbent {
            Some((objective, x)) => Solution::optimal(objective, x),
            None if capped => Solution::failed(SolveStatus::Error),
            None => Solution::failed(SolveStatus::Infeasible),
        };
        solution.iterations = iterations;
        solution.nodes = nodes;
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundPolicy, VarInfo, VarKind, VariableCollection};

    fn var(p: &mut Problem, name: &str, lower: Option<f64>, upper: Option<f64>) -> VarId {
        p.add_var(VarInfo {
            name: name.into(),
            kind: VarKind::Continuous,
            lower,
            upper,
        })
    }

    #[test]
    fn solves_a_small_lp() {
        // min x + 2y  s.t.  x + y == 1, x <= 0.4
        let mut p = Problem::new();
        let x = var(&mut p, "x", Some(0.0), Some(0.4));
        let y = var(&mut p, "y", Some(0.0), None);
        p.add_eq("sum", LinExpr::from(x) + LinExpr::from(y), LinExpr::constant(1.0));
        p.set_objective(LinExpr::from(x) + LinExpr::term(y, 2.0));
        let s = ClarabelBackend::default().solve(&p).unwrap();
        assert_eq!(s.status, SolveStatus::Optimal);
        assert!((s.value(x) - 0.4).abs() < 1e-5, "x = {}", s.value(x));
        assert!((s.objective - 1.6).abs() < 1e-5);
    }

    #[test]
    fn cone_bounds_a_square() {
        // min t  s.t.  x² ≤ t, x >= 0.5
        let mut p = Problem::new();
        let x = var(&mut p, "x", Some(0.5), None);
        let t = var(&mut p, "t", None, None);
        p.add_cone("sq", vec![LinExpr::from(x)], LinExpr::from(t));
        p.set_objective(LinExpr::from(t));
        let s = ClarabelBackend::default().solve(&p).unwrap();
        assert_eq!(s.status, SolveStatus::Optimal);
        assert!((s.value(t) - 0.25).abs() < 1e-5, "t = {}", s.value(t));
    }

    #[test]
    fn branching_picks_the_cheap_binary() {
        // Two units cover 0.6 of demand; only one may be on.
        let mut p = Problem::new();
        let on =
            VariableCollection::create(&mut p, "on", [[0usize], [1]], BoundPolicy::Binary).unwrap();
        let out = VariableCollection::create(&mut p, "out", [[0usize], [1]], BoundPolicy::NonNegative)
            .unwrap();
        let (on0, on1) = (on.get(&[0]).unwrap(), on.get(&[1]).unwrap());
        let (x0, x1) = (out.get(&[0]).unwrap(), out.get(&[1]).unwrap());
        p.add_le("cap0", LinExpr::from(x0), LinExpr::from(on0));
        p.add_le("cap1", LinExpr::from(x1), LinExpr::from(on1));
        p.add_le("one", LinExpr::from(on0) + LinExpr::from(on1), LinExpr::constant(1.0));
        p.add_eq("demand", LinExpr::from(x0) + LinExpr::from(x1), LinExpr::constant(0.6));
        p.set_objective(
            LinExpr::term(x0, 3.0) + LinExpr::from(x1) + LinExpr::term(on0, 0.1) + LinExpr::term(on1, 0.5),
        );
        let s = ClarabelBackend::default().solve(&p).unwrap();
        assert_eq!(s.status, SolveStatus::Optimal);
        assert_eq!(s.value(on1), 1.0);
        assert_eq!(s.value(on0), 0.0);
        assert!((s.value(x1) - 0.6).abs() < 1e-5);
        assert!(s.nodes >= 1);
    }

    #[test]
    fn incumbent_objective_uses_rounded_binaries() {
        // min 10·b  s.t.  b >= 0.8; the loose tolerance accepts b = 0.8 as integral.
        let mut p = Problem::new();
        let on = VariableCollection::create(&mut p, "on", [[0usize]], BoundPolicy::Binary).unwrap();
        let b = on.get(&[0]).unwrap();
        p.add_ge("floor", LinExpr::from(b), LinExpr::constant(0.8));
        p.set_objective(LinExpr::term(b, 10.0));
        let backend = ClarabelBackend::new(SolverSettings {
            integrality_tolerance: 0.3,
            ..SolverSettings::default()
        });
        let s = backend.solve(&p).unwrap();
        assert_eq!(s.status, SolveStatus::Optimal);
        assert_eq!(s.value(b), 1.0);
        assert!((s.objective - 10.0).abs() < 1e-9, "objective {}", s.objective);
        assert!((s.objective - p.objective().eval(&s.values)).abs() < 1e-12);
    }

    #[test]
    fn infeasible_problem_is_a_status() {
        let mut p = Problem::new();
        let x = var(&mut p, "x", Some(0.0), Some(1.0));
        p.add_ge("impossible", LinExpr::from(x), LinExpr::constant(2.0));
        p.set_objective(LinExpr::from(x));
        let s = ClarabelBackend::default().solve(&p).unwrap();
        assert_eq!(s.status, SolveStatus::Infeasible);
        assert!(s.values.is_empty());
    }

    #[test]
    fn node_cap_without_incumbent_is_an_error() {
        let mut p = Problem::new();
        let on = VariableCollection::create(&mut p, "on", [[0usize]], BoundPolicy::Binary).unwrap();
        let b = on.get(&[0]).unwrap();
        p.add_eq("half", LinExpr::from(b), LinExpr::constant(0.5));
        p.set_objective(LinExpr::from(b));
        let settings = SolverSettings {
            max_nodes: 1,
            ..SolverSettings::default()
        };
        let s = ClarabelBackend::new(settings).solve(&p).unwrap();
        assert_eq!(s.status, SolveStatus::Error);
        assert_eq!(s.nodes, 1);
    }
}
