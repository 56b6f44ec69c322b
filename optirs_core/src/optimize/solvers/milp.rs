//! Solver interface for the microlp simplex / branch-and-bound engine
//!
//! Handles linear problems with any mix of continuous, integer, and binary
//! variables. Never reports dual values: for mixed integer problems the
//! underlying duality does not hold, and microlp does not expose duals for
//! pure LPs either (pure LPs are normally routed to the conic backend, which
//! does).
use std::time::Instant;

use indexmap::IndexMap;
use log::{debug, warn};
use microlp::{ComparisonOp, OptimizationDirection};

use crate::optimize::constraint::{Constraint, ConstraintTerm};
use crate::optimize::objective::{ObjectiveSense, ObjectiveTerm};
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::variable::VariableType;
use crate::optimize::{OptimizationStatus, ProblemSolution, SolverOptions};

#[derive(Clone, Debug, Default)]
pub struct MilpSolver;

impl MilpSolver {
    pub fn new() -> Self {
        Self
    }

    /// Sum the linear objective coefficient for every variable, in variable
    /// order. microlp takes objective coefficients at variable creation time.
    fn objective_coefficients(problem: &Problem) -> IndexMap<&str, f64> {
        let mut coefficients: IndexMap<&str, f64> = problem
            .variables
            .keys()
            .map(|id| (id.as_str(), 0.0))
            .collect();
        for term in &problem.objective.terms {
            if let ObjectiveTerm::Linear { var, coef } = term {
                if let Some(entry) = coefficients.get_mut(var.as_str()) {
                    *entry += coef;
                }
            }
        }
        coefficients
    }

    /// Aggregate constraint terms per variable; microlp rejects rows that
    /// mention the same variable twice.
    fn aggregate_terms(terms: &[ConstraintTerm]) -> IndexMap<&str, f64> {
        let mut aggregated: IndexMap<&str, f64> = IndexMap::new();
        for term in terms {
            *aggregated.entry(term.variable.as_str()).or_insert(0.0) += term.coefficient;
        }
        aggregated
    }
}

impl Solver for MilpSolver {
    fn id(&self) -> &'static str {
        "milp"
    }

    fn solve(
        &self,
        problem: &Problem,
        options: &SolverOptions,
    ) -> Result<ProblemSolution, SolverError> {
        if problem.has_quadratic_objective() || problem.has_quadratic_constraints() {
            return Err(SolverError::Unsupported {
                solver: self.id(),
                problem_type: problem.problem_type().to_string(),
            });
        }
        if let Some(limit) = options.time_limit {
            // microlp has no interruption hook; make the unenforced limit
            // visible instead of silently dropping it.
            warn!(
                "time limit of {limit}s requested but the milp backend cannot enforce one; \
                 solving to completion"
            );
        }

        let direction = match problem.objective.sense {
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
        };
        let mut lp = microlp::Problem::new(direction);

        let coefficients = Self::objective_coefficients(problem);
        let mut handles: IndexMap<&str, microlp::Variable> = IndexMap::new();
        for (id, variable) in &problem.variables {
            let coef = coefficients.get(id.as_str()).copied().unwrap_or(0.0);
            let handle = match variable.variable_type {
                VariableType::Continuous => {
                    lp.add_var(coef, (variable.lower_bound, variable.upper_bound))
                }
                VariableType::Binary => lp.add_binary_var(coef),
                VariableType::Integer => {
                    let lower = clamp_to_i32(variable.lower_bound.ceil());
                    let upper = clamp_to_i32(variable.upper_bound.floor());
                    lp.add_integer_var(coef, (lower, upper))
                }
            };
            handles.insert(id.as_str(), handle);
        }

        for (id, constraint) in &problem.constraints {
            match constraint {
                Constraint::Equality { terms, equals } => {
                    let row = Self::aggregate_terms(terms);
                    let lhs: Vec<(microlp::Variable, f64)> = row
                        .iter()
                        .map(|(var, coef)| (handles[*var], *coef))
                        .collect();
                    lp.add_constraint(&lhs[..], ComparisonOp::Eq, *equals);
                }
                Constraint::Inequality {
                    terms,
                    lower_bound,
                    upper_bound,
                } => {
                    let row = Self::aggregate_terms(terms);
                    let lhs: Vec<(microlp::Variable, f64)> = row
                        .iter()
                        .map(|(var, coef)| (handles[*var], *coef))
                        .collect();
                    if upper_bound.is_finite() {
                        lp.add_constraint(&lhs[..], ComparisonOp::Le, *upper_bound);
                    }
                    if lower_bound.is_finite() {
                        lp.add_constraint(&lhs[..], ComparisonOp::Ge, *lower_bound);
                    }
                }
                Constraint::QuadraticCap { .. } => {
                    return Err(SolverError::Unsupported {
                        solver: self.id(),
                        problem_type: format!("quadratic cap constraint '{id}'"),
                    });
                }
            }
        }

        debug!(
            "milp solve: {} variables, {} constraints",
            problem.num_variables(),
            problem.num_constraints()
        );
        let start = Instant::now();
        let outcome = lp.solve();
        let solve_time = start.elapsed().as_secs_f64();

        match outcome {
            Ok(solution) => {
                let variable_values: IndexMap<String, f64> = handles
                    .iter()
                    .map(|(id, handle)| (id.to_string(), solution[*handle]))
                    .collect();
                Ok(ProblemSolution {
                    status: OptimizationStatus::Optimal,
                    objective_value: Some(solution.objective()),
                    variable_values: Some(variable_values),
                    dual_values: None,
                    solve_time,
                })
            }
            Err(microlp::Error::Infeasible) => Ok(ProblemSolution {
                status: OptimizationStatus::Infeasible,
                objective_value: None,
                variable_values: None,
                dual_values: None,
                solve_time,
            }),
            Err(microlp::Error::Unbounded) => Ok(ProblemSolution {
                status: OptimizationStatus::Unbounded,
                objective_value: None,
                variable_values: None,
                dual_values: None,
                solve_time,
            }),
            Err(microlp::Error::InternalError(detail)) => Err(SolverError::Backend {
                solver: self.id(),
                detail,
            }),
        }
    }
}

fn clamp_to_i32(value: f64) -> i32 {
    if value <= i32::MIN as f64 {
        i32::MIN
    } else if value >= i32::MAX as f64 {
        i32::MAX
    } else {
        value as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::problem::Problem;

    #[test]
    fn solves_a_small_lp() {
        // Maximize x + 2y subject to x + y <= 4, 2x + y >= 2
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., f64::INFINITY)
            .unwrap();
        problem
            .add_new_variable("y", VariableType::Continuous, 0., 3.)
            .unwrap();
        problem.add_linear_objective_term("x", 1.0).unwrap();
        problem.add_linear_objective_term("y", 2.0).unwrap();
        problem
            .add_new_less_equal_constraint("cap", &["x", "y"], &[1., 1.], 4.)
            .unwrap();
        problem
            .add_new_greater_equal_constraint("floor", &["x", "y"], &[2., 1.], 2.)
            .unwrap();

        let solution = MilpSolver::new()
            .solve(&problem, &SolverOptions::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 7.0).abs() < 1e-6);
        assert!((solution.value_of("x") - 1.0).abs() < 1e-6);
        assert!((solution.value_of("y") - 3.0).abs() < 1e-6);
        assert!(solution.dual_values.is_none());
    }

    #[test]
    fn solves_a_binary_knapsack() {
        // Two of the three items fit in the budget
        let mut problem = Problem::new_maximization();
        for (id, value) in [("a", 10.0), ("b", 6.0), ("c", 4.0)] {
            problem.add_new_binary_variable(id).unwrap();
            problem.add_linear_objective_term(id, value).unwrap();
        }
        problem
            .add_new_less_equal_constraint("budget", &["a", "b", "c"], &[5., 4., 3.], 9.)
            .unwrap();

        let solution = MilpSolver::new()
            .solve(&problem, &SolverOptions::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 16.0).abs() < 1e-6);
        assert!(solution.value_of("a") > 0.5);
        assert!(solution.value_of("b") > 0.5);
        assert!(solution.value_of("c") < 0.5);
    }

    #[test]
    fn reports_infeasible_as_a_status() {
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        problem.add_linear_objective_term("x", 1.0).unwrap();
        problem
            .add_new_greater_equal_constraint("impossible", &["x"], &[1.], 5.)
            .unwrap();

        let solution = MilpSolver::new()
            .solve(&problem, &SolverOptions::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
        assert!(solution.objective_value.is_none());
    }

    #[test]
    fn reports_unbounded_as_a_status() {
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., f64::INFINITY)
            .unwrap();
        problem.add_linear_objective_term("x", 1.0).unwrap();
        problem
            .add_new_greater_equal_constraint("floor", &["x"], &[1.], 1.)
            .unwrap();

        let solution = MilpSolver::new()
            .solve(&problem, &SolverOptions::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::Unbounded);
    }

    #[test]
    fn rejects_quadratic_objectives() {
        let mut problem = Problem::new_minimization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        problem.add_quadratic_objective_term("x", "x", 1.0).unwrap();

        let result = MilpSolver::new().solve(&problem, &SolverOptions::default());
        assert!(matches!(result, Err(SolverError::Unsupported { .. })));
    }

    #[test]
    fn duplicate_variables_in_a_row_are_aggregated() {
        // x appears twice in the constraint; the row must become 2x <= 4
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., f64::INFINITY)
            .unwrap();
        problem.add_linear_objective_term("x", 1.0).unwrap();
        problem
            .add_new_less_equal_constraint("double", &["x", "x"], &[1., 1.], 4.)
            .unwrap();

        let solution = MilpSolver::new()
            .solve(&problem, &SolverOptions::default())
            .unwrap();
        assert!((solution.value_of("x") - 2.0).abs() < 1e-6);
    }
}
