//! Solver interface for the HiGHS engine, available behind the `highs`
//! feature as an alternative MILP backend
use std::time::Instant;

use highs::{HighsModelStatus, RowProblem, Sense};
use indexmap::IndexMap;
use log::debug;

use crate::optimize::constraint::Constraint;
use crate::optimize::objective::{ObjectiveSense, ObjectiveTerm};
use crate::optimize::problem::Problem;
use crate::optimize::solvers::milp::MilpSolver;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::variable::VariableType;
use crate::optimize::{OptimizationStatus, ProblemSolution, SolverOptions};

#[derive(Clone, Debug, Default)]
pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for HighsSolver {
    fn id(&self) -> &'static str {
        "highs"
    }

    fn solve(
        &self,
        problem: &Problem,
        _options: &SolverOptions,
    ) -> Result<ProblemSolution, SolverError> {
        if problem.has_quadratic_objective() || problem.has_quadratic_constraints() {
            return Err(SolverError::Unsupported {
                solver: self.id(),
                problem_type: problem.problem_type().to_string(),
            });
        }

        let mut model = RowProblem::default();
        let mut columns = Vec::with_capacity(problem.num_variables());
        let mut column_of: IndexMap<&str, usize> = IndexMap::new();

        let coefficients = {
            let mut by_variable: IndexMap<&str, f64> = problem
                .variables
                .keys()
                .map(|id| (id.as_str(), 0.0))
                .collect();
            for term in &problem.objective.terms {
                if let ObjectiveTerm::Linear { var, coef } = term {
                    if let Some(entry) = by_variable.get_mut(var.as_str()) {
                        *entry += coef;
                    }
                }
            }
            by_variable
        };

        for (id, variable) in &problem.variables {
            let objective = coefficients.get(id.as_str()).copied().unwrap_or(0.0);
            let column = match variable.variable_type {
                VariableType::Integer | VariableType::Binary => model
                    .add_integer_column(objective, variable.lower_bound..variable.upper_bound),
                VariableType::Continuous => {
                    model.add_column(objective, variable.lower_bound..variable.upper_bound)
                }
            };
            column_of.insert(id.as_str(), columns.len());
            columns.push(column);
        }

        for (id, constraint) in &problem.constraints {
            match constraint {
                Constraint::Equality { terms, equals } => {
                    let row: Vec<_> = terms
                        .iter()
                        .map(|t| (columns[column_of[t.variable.as_str()]], t.coefficient))
                        .collect();
                    model.add_row(*equals..=*equals, &row);
                }
                Constraint::Inequality {
                    terms,
                    lower_bound,
                    upper_bound,
                } => {
                    let row: Vec<_> = terms
                        .iter()
                        .map(|t| (columns[column_of[t.variable.as_str()]], t.coefficient))
                        .collect();
                    match (lower_bound.is_finite(), upper_bound.is_finite()) {
                        (true, true) => {
                            model.add_row(*lower_bound..=*upper_bound, &row);
                        }
                        (false, true) => {
                            model.add_row(..=*upper_bound, &row);
                        }
                        (true, false) => {
                            model.add_row(*lower_bound.., &row);
                        }
                        (false, false) => {}
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

        let sense = match problem.objective.sense {
            ObjectiveSense::Maximize => Sense::Maximise,
            ObjectiveSense::Minimize => Sense::Minimise,
        };
        debug!(
            "highs solve: {} variables, {} constraints",
            problem.num_variables(),
            problem.num_constraints()
        );
        let start = Instant::now();
        let solved = model.optimise(sense).solve();
        let solve_time = start.elapsed().as_secs_f64();

        match solved.status() {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                let variable_values: IndexMap<String, f64> = problem
                    .variables
                    .keys()
                    .zip(values.iter())
                    .map(|(id, value)| (id.clone(), *value))
                    .collect();
                let objective_value = problem
                    .objective
                    .evaluate(|id| variable_values.get(id).copied().unwrap_or(0.0));
                Ok(ProblemSolution {
                    status: OptimizationStatus::Optimal,
                    objective_value: Some(objective_value),
                    variable_values: Some(variable_values),
                    dual_values: None,
                    solve_time,
                })
            }
            HighsModelStatus::Infeasible => Ok(ProblemSolution {
                status: OptimizationStatus::Infeasible,
                objective_value: None,
                variable_values: None,
                dual_values: None,
                solve_time,
            }),
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                Ok(ProblemSolution {
                    status: OptimizationStatus::Unbounded,
                    objective_value: None,
                    variable_values: None,
                    dual_values: None,
                    solve_time,
                })
            }
            status => Err(SolverError::Backend {
                solver: self.id(),
                detail: format!("unexpected status {status:?}"),
            }),
        }
    }
}
