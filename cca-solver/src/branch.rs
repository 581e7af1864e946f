use crate::SolverError;
use cca_core::models::{Program, Sense, Solution, SolveStatus};
use std::time::{Duration, Instant};
use tracing::{Level, event};

// A value this close to an integer counts as integral
const INTEGRALITY_TOLERANCE: f64 = 1e-6;

// Nodes whose bound cannot beat the incumbent by this relative margin are pruned
const RELATIVE_GAP: f64 = 1e-7;

// Feasibility tolerance of the all-zero starting incumbent
const FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// The outcome of solving the continuous relaxation of a node
pub(crate) enum Relaxed {
    Solved { values: Vec<f64>, objective: f64 },
    /// The time limit stopped the solver at a possibly suboptimal iterate
    TimeLimited { values: Vec<f64>, objective: f64 },
    Infeasible,
}

/// Depth-first branch-and-bound over continuous relaxations.
///
/// `relax` solves the program with every variable restricted to the given
/// bounds, ignoring integrality, within the remaining time budget. Integral
/// variables are branched on by splitting their domain at the most fractional
/// value. When the all-zero point is feasible it is the first incumbent, so a
/// search stopped by the time limit still has a solution to report.
pub(crate) fn branch_and_bound<F>(
    program: &Program,
    time_limit: Option<Duration>,
    mut relax: F,
) -> Result<Solution, SolverError>
where
    F: FnMut(&[(f64, f64)], Option<Duration>) -> Result<Relaxed, SolverError>,
{
    let deadline = time_limit.map(|limit| Instant::now() + limit);

    // We branch in "minimization" terms, so flip the objective of maximization problems
    let key = |objective: f64| match program.sense() {
        Sense::Minimize => objective,
        Sense::Maximize => -objective,
    };

    // Integral variables start with their bounds rounded inwards
    let root = program
        .variables()
        .iter()
        .map(|variable| {
            if variable.is_integral() {
                (variable.lower.ceil(), variable.upper.floor())
            } else {
                (variable.lower, variable.upper)
            }
        })
        .collect::<Vec<_>>();

    let zero = vec![0.0; root.len()];
    let mut incumbent = program
        .is_feasible(&zero, FEASIBILITY_TOLERANCE)
        .then(|| {
            let objective = key(program.evaluate(&zero));
            (zero, objective)
        });
    let mut stack = vec![root];
    let mut timed_out = false;
    let mut nodes = 0usize;

    while let Some(bounds) = stack.pop() {
        let remaining = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
        if remaining == Some(Duration::ZERO) {
            timed_out = true;
            break;
        }

        nodes += 1;
        let (values, objective) = match relax(&bounds, remaining)? {
            Relaxed::Solved { values, objective } => (values, objective),
            // An unfinished relaxation bounds nothing
            Relaxed::TimeLimited { .. } => {
                timed_out = true;
                break;
            }
            Relaxed::Infeasible => continue,
        };

        let bound = key(objective);
        if let Some((_, best)) = &incumbent {
            if bound >= best - RELATIVE_GAP * best.abs().max(1.0) {
                continue;
            }
        }

        match most_fractional(program, &values) {
            None => {
                let values = round_integral(program, values);
                let candidate = key(program.evaluate(&values));
                if incumbent
                    .as_ref()
                    .is_none_or(|(_, best)| candidate < *best)
                {
                    event!(Level::TRACE, nodes, objective = candidate, "new incumbent");
                    incumbent = Some((values, candidate));
                }
            }
            Some((index, x)) => {
                let mut down = bounds.clone();
                down[index].1 = x.floor();
                let mut up = bounds;
                up[index].0 = x.ceil();

                // Explore the side the relaxation leans towards first
                if x - x.floor() >= 0.5 {
                    stack.push(down);
                    stack.push(up);
                } else {
                    stack.push(up);
                    stack.push(down);
                }
            }
        }
    }

    event!(Level::DEBUG, nodes, timed_out, "branch-and-bound finished");

    match incumbent {
        Some((values, _)) => Ok(Solution {
            objective: program.evaluate(&values),
            values,
            status: if timed_out {
                SolveStatus::TimeLimited
            } else {
                SolveStatus::Optimal
            },
        }),
        None if timed_out => Err(SolverError::TimeLimit),
        None => Err(SolverError::Infeasible),
    }
}

// The integral variable furthest away from an integer, if any
fn most_fractional(program: &Program, values: &[f64]) -> Option<(usize, f64)> {
    program
        .variables()
        .iter()
        .zip(values)
        .enumerate()
        .filter(|(_, (variable, _))| variable.is_integral())
        .map(|(index, (_, &x))| (index, x, (x - x.round()).abs()))
        .filter(|(_, _, distance)| *distance > INTEGRALITY_TOLERANCE)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(index, x, _)| (index, x))
}

fn round_integral(program: &Program, mut values: Vec<f64>) -> Vec<f64> {
    for (variable, x) in program.variables().iter().zip(values.iter_mut()) {
        if variable.is_integral() {
            *x = x.round();
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use cca_core::models::{Comparison, Constraint, Variable};

    // A hand-rolled relaxation for `max x + y s.t. x + y <= 1.5` over binaries,
    // whose continuous optimum always splits the budget evenly.
    fn relax(bounds: &[(f64, f64)], _: Option<Duration>) -> Result<Relaxed, SolverError> {
        let (x_lo, x_hi) = bounds[0];
        let (y_lo, y_hi) = bounds[1];
        if x_lo + y_lo > 1.5 {
            return Ok(Relaxed::Infeasible);
        }
        let budget = 1.5 - x_lo - y_lo;
        let x = (x_lo + budget / 2.0).min(x_hi);
        let y = (y_lo + (budget - (x - x_lo))).min(y_hi);
        let x = (x + budget - (x - x_lo) - (y - y_lo)).min(x_hi);
        Ok(Relaxed::Solved {
            values: vec![x, y],
            objective: x + y,
        })
    }

    #[test]
    fn branches_to_an_integral_optimum() {
        let mut program = Program::new(Sense::Maximize);
        let x = program.add_variable(Variable::binary("x"));
        let y = program.add_variable(Variable::binary("y"));
        program.add_objective_term(1.0, x);
        program.add_objective_term(1.0, y);
        program.add_constraint(
            Constraint::new(Comparison::Leq, 1.5)
                .with_term(1.0, x)
                .with_term(1.0, y),
        );

        let solution = branch_and_bound(&program, None, relax).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.objective, 1.0);
        assert_eq!(solution.values.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn reports_infeasibility() {
        let mut program = Program::new(Sense::Maximize);
        program.add_variable(Variable::binary("x"));
        let result = branch_and_bound(&program, None, |_, _| Ok(Relaxed::Infeasible));
        assert!(matches!(result, Err(SolverError::Infeasible)));
    }

    #[test]
    fn time_limit_falls_back_to_zero() {
        let mut program = Program::new(Sense::Maximize);
        let x = program.add_variable(Variable::binary("x"));
        program.add_variable(Variable::binary("y"));
        program.add_objective_term(1.0, x);

        let solution = branch_and_bound(&program, Some(Duration::ZERO), relax).unwrap();
        assert_eq!(solution.status, SolveStatus::TimeLimited);
        assert_eq!(solution.values, vec![0.0, 0.0]);
        assert_eq!(solution.objective, 0.0);
    }

    #[test]
    fn unfinished_relaxations_stop_the_search() {
        let mut program = Program::new(Sense::Maximize);
        let x = program.add_variable(Variable::binary("x"));
        program.add_objective_term(1.0, x);

        let solution = branch_and_bound(&program, None, |_, _| {
            Ok(Relaxed::TimeLimited {
                values: vec![0.5],
                objective: 0.5,
            })
        })
        .unwrap();
        assert_eq!(solution.status, SolveStatus::TimeLimited);
        assert_eq!(solution.values, vec![0.0]);
    }

    #[test]
    fn time_limit_without_incumbent_is_an_error() {
        let mut program = Program::new(Sense::Maximize);
        let x = program.add_variable(Variable::binary("x"));
        program.add_constraint(Constraint::new(Comparison::Geq, 1.0).with_term(1.0, x));

        let result = branch_and_bound(&program, Some(Duration::ZERO), relax);
        assert!(matches!(result, Err(SolverError::TimeLimit)));
    }
}
