use crate::SolverError;
use crate::branch::{Relaxed, branch_and_bound};
use cca_core::{
    models::{Comparison, Program, Sense, Solution, SolveStatus},
    ports::MipSolver,
};
use clarabel::{algebra::*, solver::*};
use std::{collections::BTreeMap, time::Duration};
use tracing::{Level, event};

/// A MIP solving service backed by the Clarabel interior point solver.
///
/// Continuous programs are solved in a single call. Programs with integral
/// variables are solved by branch-and-bound, with Clarabel solving the
/// relaxation at every node.
#[derive(Clone)]
pub struct ClarabelSolver(DefaultSettings<f64>);

impl Default for ClarabelSolver {
    fn default() -> Self {
        let mut settings = DefaultSettings::default();
        settings.verbose = false;
        Self(settings)
    }
}

impl ClarabelSolver {
    /// Create a new instance with the provided settings
    pub fn new(settings: DefaultSettings<f64>) -> Self {
        Self(settings)
    }

    // Solve the continuous relaxation of `program`, with the variable bounds
    // replaced by `bounds`.
    fn relax(
        &self,
        program: &Program,
        bounds: &[(f64, f64)],
        time_limit: Option<Duration>,
    ) -> Result<Relaxed, SolverError> {
        let n = program.variables().len();

        // Branching can cross the bounds of a variable, leaving nothing to solve
        if bounds.iter().any(|(lower, upper)| lower > upper) {
            return Ok(Relaxed::Infeasible);
        }

        // Clarabel minimizes 1/2 x'Px + q'x, so a maximization flips the sign of
        // the whole objective.
        let sign = match program.sense() {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };

        let mut q = vec![0.0; n];
        for (var, coefficient) in program.linear_terms() {
            q[var.index()] += sign * coefficient;
        }

        // P is given by its upper triangle. A diagonal term c*x*x contributes 2c,
        // an off-diagonal term c*x*y contributes c to the (min, max) entry.
        let mut p_triplets = BTreeMap::new();
        for (a, b, coefficient) in program.quadratic_terms() {
            let (row, col) = if a.index() <= b.index() {
                (a.index(), b.index())
            } else {
                (b.index(), a.index())
            };
            let weight = if row == col { 2.0 } else { 1.0 };
            *p_triplets.entry((col, row)).or_insert(0.0) += sign * weight * coefficient;
        }

        // Rows are written as Ax + s = b with the slack s restricted to a cone.
        // The equality rows come first and use the zero cone; everything else is an
        // inequality and uses the nonnegative cone.
        let mut a_triplets = BTreeMap::new();
        let mut b = Vec::new();

        for constraint in program
            .constraints()
            .iter()
            .filter(|constraint| constraint.comparison() == Comparison::Eq)
        {
            let row = b.len();
            for (var, coefficient) in constraint.terms() {
                *a_triplets.entry((var.index(), row)).or_insert(0.0) += coefficient;
            }
            b.push(constraint.rhs());
        }
        let nzero = b.len();

        for constraint in program
            .constraints()
            .iter()
            .filter(|constraint| constraint.comparison() != Comparison::Eq)
        {
            // The signs on >= are wonky because we have to use s >= 0 as the cone
            let flip = match constraint.comparison() {
                Comparison::Geq => -1.0,
                _ => 1.0,
            };
            let row = b.len();
            for (var, coefficient) in constraint.terms() {
                *a_triplets.entry((var.index(), row)).or_insert(0.0) += flip * coefficient;
            }
            b.push(flip * constraint.rhs());
        }

        // Now we add the box constraints, skipping infinite bounds
        for (index, &(lower, upper)) in bounds.iter().enumerate() {
            if lower.is_finite() {
                a_triplets.insert((index, b.len()), -1.0);
                b.push(-lower);
            }
            if upper.is_finite() {
                a_triplets.insert((index, b.len()), 1.0);
                b.push(upper);
            }
        }

        // A program without any row (say, an unconstrained least squares fit) still
        // needs one cone, so we add the trivially satisfied 0 <= 1.
        if b.is_empty() {
            b.push(1.0);
        }

        let mut cones = Vec::new();
        if nzero > 0 {
            cones.push(ZeroConeT(nzero));
        }
        if b.len() > nzero {
            cones.push(NonnegativeConeT(b.len() - nzero));
        }

        let p_matrix = csc(n, n, p_triplets);
        let a_matrix = csc(b.len(), n, a_triplets);

        let mut settings = self.0.clone();
        if let Some(limit) = time_limit {
            settings.time_limit = limit.as_secs_f64();
        }

        let mut solver = DefaultSolver::new(&p_matrix, &q, &a_matrix, &b, &cones, settings)
            .map_err(|error| SolverError::Setup(error.to_string()))?;
        solver.solve();

        match solver.solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                let values = solver.solution.x.clone();
                Ok(Relaxed::Solved {
                    objective: program.evaluate(&values),
                    values,
                })
            }
            // The last iterate is the best the time allowed
            SolverStatus::MaxTime => {
                let values = solver.solution.x.clone();
                Ok(Relaxed::TimeLimited {
                    objective: program.evaluate(&values),
                    values,
                })
            }
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                Ok(Relaxed::Infeasible)
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                Err(SolverError::Unbounded)
            }
            status => Err(SolverError::Numerical(format!("{status:?}"))),
        }
    }
}

impl MipSolver for ClarabelSolver {
    type Error = SolverError;

    fn solve(
        &self,
        program: &Program,
        time_limit: Option<Duration>,
    ) -> Result<Solution, Self::Error> {
        let bounds = program
            .variables()
            .iter()
            .map(|variable| (variable.lower, variable.upper))
            .collect::<Vec<_>>();

        check_finite(program)?;

        if bounds.is_empty() {
            return Ok(Solution {
                values: Vec::new(),
                objective: 0.0,
                status: SolveStatus::Optimal,
            });
        }

        event!(
            Level::TRACE,
            variables = bounds.len(),
            constraints = program.constraints().len(),
            integral = program.is_integral(),
            "solving program"
        );

        if program.is_integral() {
            branch_and_bound(program, time_limit, |bounds, remaining| {
                self.relax(program, bounds, remaining)
            })
        } else {
            match self.relax(program, &bounds, time_limit)? {
                Relaxed::Solved { values, objective } => Ok(Solution {
                    values,
                    objective,
                    status: SolveStatus::Optimal,
                }),
                Relaxed::TimeLimited { values, objective } => Ok(Solution {
                    values,
                    objective,
                    status: SolveStatus::TimeLimited,
                }),
                Relaxed::Infeasible => Err(SolverError::Infeasible),
            }
        }
    }
}

// NaN or infinite data would only surface as an obscure numerical failure
fn check_finite(program: &Program) -> Result<(), SolverError> {
    let linear = program.linear_terms().iter().map(|(_, value)| *value);
    let quadratic = program.quadratic_terms().iter().map(|(_, _, value)| *value);
    let rows = program.constraints().iter().flat_map(|constraint| {
        let terms = constraint.terms().iter().map(|(_, value)| *value);
        terms.chain(std::iter::once(constraint.rhs()))
    });
    match linear.chain(quadratic).chain(rows).find(|value| !value.is_finite()) {
        Some(value) => Err(SolverError::Setup(format!(
            "the program contains the coefficient {value}"
        ))),
        None => Ok(()),
    }
}

// Clarabel's matrix input is in the form of CSC. The triplets are keyed by
// (column, row), so iterating the BTreeMap visits them in CSC order.
fn csc(m: usize, n: usize, triplets: BTreeMap<(usize, usize), f64>) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(n + 1);
    let mut rowval = Vec::with_capacity(triplets.len());
    let mut nzval = Vec::with_capacity(triplets.len());

    let mut entries = triplets.into_iter().peekable();
    for col in 0..n {
        colptr.push(nzval.len());
        while let Some(((_, row), value)) = entries.next_if(|((c, _), _)| *c == col) {
            rowval.push(row);
            nzval.push(value);
        }
    }
    colptr.push(nzval.len());

    CscMatrix {
        m,
        n,
        colptr,
        rowval,
        nzval,
    }
}
