//! Local search backend for smooth non-convex continuous problems
//!
//! Used when the conic backend's convexity classification rejects a problem
//! (in this crate, a non-convex quadratic objective). Runs a deterministic
//! multi-start compass search over the variable box, with linear rows and
//! quadratic caps handled through an exact penalty. Solutions are only ever
//! local optima and are flagged as such; there is no optimality certificate.
use std::time::Instant;

use indexmap::IndexMap;
use log::debug;

use crate::configuration::CONFIGURATION;
use crate::optimize::constraint::Constraint;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution, SolverOptions};
use crate::utils::num;

/// Penalty weight applied to constraint violations
const PENALTY: f64 = 1e7;

#[derive(Clone, Debug, Default)]
pub struct DescentSolver;

impl DescentSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for DescentSolver {
    fn id(&self) -> &'static str {
        "descent"
    }

    fn solve(
        &self,
        problem: &Problem,
        options: &SolverOptions,
    ) -> Result<ProblemSolution, SolverError> {
        if problem.has_integer_variables() {
            return Err(SolverError::Unsupported {
                solver: self.id(),
                problem_type: problem.problem_type().to_string(),
            });
        }

        let start = Instant::now();
        let (default_lower, default_upper, max_iterations) = {
            let config = CONFIGURATION.read().unwrap();
            (
                config.lower_bound,
                config.upper_bound,
                config.descent_max_iterations,
            )
        };

        // Clamp infinite bounds to the configured search box
        let bounds: Vec<(f64, f64)> = problem
            .variables
            .values()
            .map(|v| {
                let lower = if v.lower_bound.is_finite() {
                    v.lower_bound
                } else {
                    default_lower
                };
                let upper = if v.upper_bound.is_finite() {
                    v.upper_bound
                } else {
                    default_upper
                };
                (lower, upper)
            })
            .collect();
        let n = bounds.len();
        let index_of: IndexMap<&str, usize> = problem
            .variables
            .keys()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        // Minimize: objective flipped for maximization, plus penalties
        let sign = match problem.objective.sense {
            ObjectiveSense::Minimize => 1.0,
            ObjectiveSense::Maximize => -1.0,
        };
        let violation = |x: &[f64]| -> f64 {
            let value_of = |id: &str| x[index_of[id]];
            let mut total = 0.0;
            for constraint in problem.constraints.values() {
                match constraint {
                    Constraint::Equality { terms, equals } => {
                        let lhs: f64 = terms
                            .iter()
                            .map(|t| t.coefficient * value_of(&t.variable))
                            .sum();
                        total += (lhs - equals).abs();
                    }
                    Constraint::Inequality {
                        terms,
                        lower_bound,
                        upper_bound,
                    } => {
                        let lhs: f64 = terms
                            .iter()
                            .map(|t| t.coefficient * value_of(&t.variable))
                            .sum();
                        if upper_bound.is_finite() {
                            total += (lhs - upper_bound).max(0.0);
                        }
                        if lower_bound.is_finite() {
                            total += (lower_bound - lhs).max(0.0);
                        }
                    }
                    Constraint::QuadraticCap { terms, upper_bound } => {
                        let form: f64 = terms
                            .iter()
                            .map(|t| {
                                t.coefficient * value_of(&t.variable1) * value_of(&t.variable2)
                            })
                            .sum();
                        total += (form - upper_bound).max(0.0);
                    }
                }
            }
            total
        };
        let merit = |x: &[f64]| -> f64 {
            let value_of = |id: &str| x[index_of[id]];
            sign * problem.objective.evaluate(value_of) + PENALTY * violation(x)
        };

        // Deterministic multi-start: box midpoint and both box corners
        let starts: Vec<Vec<f64>> = vec![
            bounds.iter().map(|(l, u)| (l + u) / 2.0).collect(),
            bounds.iter().map(|(l, _)| *l).collect(),
            bounds.iter().map(|(_, u)| *u).collect(),
        ];

        let tolerance = num::tolerance();
        let mut best: Option<(Vec<f64>, f64)> = None;
        for (restart, start_point) in starts.into_iter().enumerate() {
            let mut x = start_point;
            let mut step: Vec<f64> = bounds
                .iter()
                .map(|(l, u)| ((u - l) / 4.0).max(tolerance))
                .collect();
            let mut current = merit(&x);
            let mut iterations = 0u32;
            loop {
                let mut improved = false;
                for i in 0..n {
                    for direction in [1.0, -1.0] {
                        let candidate_value =
                            (x[i] + direction * step[i]).clamp(bounds[i].0, bounds[i].1);
                        if num::approx_eq(candidate_value, x[i], 0.0) {
                            continue;
                        }
                        let previous = x[i];
                        x[i] = candidate_value;
                        let candidate = merit(&x);
                        if candidate < current - 1e-12 {
                            current = candidate;
                            improved = true;
                        } else {
                            x[i] = previous;
                        }
                    }
                }
                iterations += 1;
                if !improved {
                    let widest = step.iter().cloned().fold(0.0f64, f64::max);
                    if widest <= tolerance {
                        break;
                    }
                    for s in step.iter_mut() {
                        *s /= 2.0;
                    }
                }
                if iterations >= max_iterations {
                    break;
                }
            }
            debug!("descent restart {restart}: merit {current:.6} after {iterations} sweeps");
            if best.as_ref().map(|(_, m)| current < *m).unwrap_or(true) {
                best = Some((x, current));
            }
        }

        let (point, _) = best.expect("at least one restart ran");
        let solve_time = start.elapsed().as_secs_f64();
        if violation(&point) > tolerance.max(1e-6) {
            return Ok(ProblemSolution {
                status: OptimizationStatus::Infeasible,
                objective_value: None,
                variable_values: None,
                dual_values: None,
                solve_time,
            });
        }

        let value_of = |id: &str| point[index_of[id]];
        let objective_value = problem.objective.evaluate(value_of);
        let variable_values: IndexMap<String, f64> = problem
            .variables
            .keys()
            .enumerate()
            .map(|(i, id)| (id.clone(), point[i]))
            .collect();
        Ok(ProblemSolution {
            status: OptimizationStatus::LocalOptimal,
            objective_value: Some(objective_value),
            variable_values: Some(variable_values),
            dual_values: None,
            solve_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::variable::VariableType;

    #[test]
    fn finds_a_boundary_optimum_of_a_nonconvex_problem() {
        // Maximize x^2 over [0, 1]: the maximum sits at the x = 1 corner
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        problem.add_quadratic_objective_term("x", "x", 1.0).unwrap();

        let solution = DescentSolver::new()
            .solve(&problem, &SolverOptions::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::LocalOptimal);
        assert!(!solution.is_optimal());
        assert!((solution.value_of("x") - 1.0).abs() < 1e-3);
        assert!((solution.objective_value.unwrap() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn respects_linear_rows_through_the_penalty() {
        // Maximize x^2 + y^2 over the box [0,1]^2 with x + y <= 1. The
        // compass search may stop anywhere on the constraint face; every
        // stationary point there has objective in [0.5, 1.0].
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        problem
            .add_new_variable("y", VariableType::Continuous, 0., 1.)
            .unwrap();
        problem.add_quadratic_objective_term("x", "x", 1.0).unwrap();
        problem.add_quadratic_objective_term("y", "y", 1.0).unwrap();
        problem
            .add_new_less_equal_constraint("simplex", &["x", "y"], &[1., 1.], 1.)
            .unwrap();

        let solution = DescentSolver::new()
            .solve(&problem, &SolverOptions::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::LocalOptimal);
        let x = solution.value_of("x");
        let y = solution.value_of("y");
        assert!(x + y <= 1.0 + 1e-6);
        let objective = solution.objective_value.unwrap();
        assert!(objective >= 0.5 - 1e-6 && objective <= 1.0 + 1e-6);
    }

    #[test]
    fn reports_infeasible_when_no_penalty_free_point_is_found() {
        let mut problem = Problem::new_minimization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        problem.add_quadratic_objective_term("x", "x", -1.0).unwrap();
        problem
            .add_new_greater_equal_constraint("unreachable", &["x"], &[1.], 5.)
            .unwrap();

        let solution = DescentSolver::new()
            .solve(&problem, &SolverOptions::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
    }

    #[test]
    fn rejects_integer_variables() {
        let mut problem = Problem::new_maximization();
        problem.add_new_binary_variable("b").unwrap();
        let result = DescentSolver::new().solve(&problem, &SolverOptions::default());
        assert!(matches!(result, Err(SolverError::Unsupported { .. })));
    }
}
