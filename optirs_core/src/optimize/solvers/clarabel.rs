//! Solver interface for the Clarabel interior point conic solver
//!
//! Clarabel handles the continuous problems of the crate: pure LPs (where it
//! is the one backend that produces dual values), convex quadratic
//! objectives, and quadratic cap constraints encoded as second order cones.
//! Convexity is classified with an eigenvalue check *before* any solve is
//! attempted; non-convex input is rejected with a classification error and
//! never handed to the engine.
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use indexmap::IndexMap;
use log::debug;
use nalgebra::DMatrix;

use crate::optimize::constraint::Constraint;
use crate::optimize::objective::{ObjectiveSense, ObjectiveTerm};
use crate::optimize::problem::{Problem, ProblemType};
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution, SolverOptions};

#[derive(Clone, Debug, Default)]
pub struct ClarabelSolver;

impl ClarabelSolver {
    pub fn new() -> Self {
        Self
    }
}

/// Which side of a two sided row a nonnegative-cone slack belongs to, kept
/// for mapping duals back to constraint ids
enum RowSide {
    LessEqual,
    GreaterEqual,
}

impl Solver for ClarabelSolver {
    fn id(&self) -> &'static str {
        "clarabel"
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

        let n = problem.num_variables();
        let variable_ids: Vec<&str> = problem.variables.keys().map(|id| id.as_str()).collect();
        let index_of: IndexMap<&str, usize> = variable_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        // Clarabel minimizes 0.5 x'Px + q'x; maximization flips the sign of
        // every objective coefficient.
        let sign = match problem.objective.sense {
            ObjectiveSense::Minimize => 1.0,
            ObjectiveSense::Maximize => -1.0,
        };
        let mut p_dense = vec![vec![0.0; n]; n];
        let mut q = vec![0.0; n];
        for term in &problem.objective.terms {
            match term {
                ObjectiveTerm::Linear { var, coef } => {
                    q[index_of[var.as_str()]] += sign * coef;
                }
                ObjectiveTerm::Quadratic { var1, var2, coef } => {
                    let i = index_of[var1.as_str()];
                    let j = index_of[var2.as_str()];
                    if i == j {
                        p_dense[i][i] += 2.0 * sign * coef;
                    } else {
                        p_dense[i][j] += sign * coef;
                        p_dense[j][i] += sign * coef;
                    }
                }
            }
        }
        if problem.has_quadratic_objective() {
            verify_convex(&p_dense, "objective")?;
        }

        // Rows are assembled as A x + s = b with s in the cone stack:
        // equalities (zero cone), inequalities and finite variable bounds
        // (nonnegative cone), then one second order cone per quadratic cap.
        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut b: Vec<f64> = Vec::new();
        let mut row = 0usize;
        let mut equality_rows: Vec<(String, usize)> = Vec::new();
        let mut inequality_rows: Vec<(String, usize, RowSide)> = Vec::new();
        let mut caps: Vec<(&String, &Constraint)> = Vec::new();

        for (cid, constraint) in &problem.constraints {
            match constraint {
                Constraint::Equality { terms, equals } => {
                    for term in terms {
                        triplets.push((row, index_of[term.variable.as_str()], term.coefficient));
                    }
                    b.push(*equals);
                    equality_rows.push((cid.clone(), row));
                    row += 1;
                }
                Constraint::Inequality { .. } | Constraint::QuadraticCap { .. } => {}
            }
        }
        let num_equalities = row;

        for (cid, constraint) in &problem.constraints {
            match constraint {
                Constraint::Inequality {
                    terms,
                    lower_bound,
                    upper_bound,
                } => {
                    if upper_bound.is_finite() {
                        for term in terms {
                            triplets.push((
                                row,
                                index_of[term.variable.as_str()],
                                term.coefficient,
                            ));
                        }
                        b.push(*upper_bound);
                        inequality_rows.push((cid.clone(), row, RowSide::LessEqual));
                        row += 1;
                    }
                    if lower_bound.is_finite() {
                        for term in terms {
                            triplets.push((
                                row,
                                index_of[term.variable.as_str()],
                                -term.coefficient,
                            ));
                        }
                        b.push(-lower_bound);
                        inequality_rows.push((cid.clone(), row, RowSide::GreaterEqual));
                        row += 1;
                    }
                }
                Constraint::QuadraticCap { .. } => caps.push((cid, constraint)),
                Constraint::Equality { .. } => {}
            }
        }
        for (i, variable) in problem.variables.values().enumerate() {
            if variable.upper_bound.is_finite() {
                triplets.push((row, i, 1.0));
                b.push(variable.upper_bound);
                row += 1;
            }
            if variable.lower_bound.is_finite() {
                triplets.push((row, i, -1.0));
                b.push(-variable.lower_bound);
                row += 1;
            }
        }
        let num_inequalities = row - num_equalities;

        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
        if num_equalities > 0 {
            cones.push(SupportedConeT::ZeroConeT(num_equalities));
        }
        if num_inequalities > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(num_inequalities));
        }

        for (cid, cap) in &caps {
            if let Constraint::QuadraticCap { terms, upper_bound } = cap {
                if *upper_bound < 0.0 {
                    return Err(SolverError::NonConvex {
                        detail: format!("quadratic cap '{cid}' has a negative bound"),
                    });
                }
                let mut m_dense = vec![vec![0.0; n]; n];
                for term in terms {
                    let i = index_of[term.variable1.as_str()];
                    let j = index_of[term.variable2.as_str()];
                    if i == j {
                        m_dense[i][i] += term.coefficient;
                    } else {
                        m_dense[i][j] += term.coefficient / 2.0;
                        m_dense[j][i] += term.coefficient / 2.0;
                    }
                }
                let factor = cholesky_factor(&m_dense).ok_or_else(|| SolverError::NonConvex {
                    detail: format!("quadratic cap '{cid}' is not positive semidefinite"),
                })?;
                // [sqrt(bound); Lᵀx] must lie in the second order cone, which
                // is exactly xᵀMx <= bound for M = L·Lᵀ.
                b.push(upper_bound.sqrt());
                row += 1;
                for k in 0..n {
                    for i in 0..n {
                        let coef = factor[(i, k)];
                        if coef != 0.0 {
                            triplets.push((row, i, -coef));
                        }
                    }
                    b.push(0.0);
                    row += 1;
                }
                cones.push(SupportedConeT::SecondOrderConeT(n + 1));
            }
        }

        let a = csc_from_triplets(row, n, &triplets);
        let p = csc_upper_triangular(&p_dense);

        let mut settings = DefaultSettings::default();
        settings.verbose = options.verbose;
        if let Some(limit) = options.time_limit {
            settings.time_limit = limit;
        }

        debug!(
            "clarabel solve: {} variables, {} rows, {} cones",
            n,
            row,
            cones.len()
        );
        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings);
        solver.solve();

        let solution = &solver.solution;
        let solve_time = solution.solve_time;
        let status = match solution.status {
            SolverStatus::Solved => OptimizationStatus::Optimal,
            SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                OptimizationStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                OptimizationStatus::Unbounded
            }
            SolverStatus::MaxIterations | SolverStatus::MaxTime => OptimizationStatus::Feasible,
            SolverStatus::NumericalError | SolverStatus::InsufficientProgress => {
                return Err(SolverError::Numerical {
                    solver: self.id(),
                    detail: format!("{:?}", solution.status),
                });
            }
            other => {
                return Err(SolverError::Backend {
                    solver: self.id(),
                    detail: format!("unexpected status {other:?}"),
                });
            }
        };

        if !matches!(
            status,
            OptimizationStatus::Optimal
                | OptimizationStatus::AlmostOptimal
                | OptimizationStatus::Feasible
        ) {
            return Ok(ProblemSolution {
                status,
                objective_value: None,
                variable_values: None,
                dual_values: None,
                solve_time,
            });
        }

        let variable_values: IndexMap<String, f64> = variable_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), solution.x[i]))
            .collect();
        let objective_value = match problem.objective.sense {
            ObjectiveSense::Minimize => solution.obj_val,
            ObjectiveSense::Maximize => -solution.obj_val,
        };

        // Duals are only meaningful (and only reported) for pure LPs.
        let dual_values = if problem.problem_type() == ProblemType::LinearContinuous {
            let dual_sign = match problem.objective.sense {
                ObjectiveSense::Maximize => 1.0,
                ObjectiveSense::Minimize => -1.0,
            };
            let mut duals: IndexMap<String, f64> = IndexMap::new();
            for (cid, row_index) in &equality_rows {
                *duals.entry(cid.clone()).or_insert(0.0) += dual_sign * solution.z[*row_index];
            }
            for (cid, row_index, side) in &inequality_rows {
                let contribution = match side {
                    RowSide::LessEqual => solution.z[*row_index],
                    RowSide::GreaterEqual => -solution.z[*row_index],
                };
                *duals.entry(cid.clone()).or_insert(0.0) += dual_sign * contribution;
            }
            Some(duals)
        } else {
            None
        };

        Ok(ProblemSolution {
            status,
            objective_value: Some(objective_value),
            variable_values: Some(variable_values),
            dual_values,
            solve_time,
        })
    }
}

/// Reject objective matrices with meaningfully negative eigenvalues
fn verify_convex(p_dense: &[Vec<f64>], what: &str) -> Result<(), SolverError> {
    let n = p_dense.len();
    let matrix = DMatrix::from_fn(n, n, |i, j| p_dense[i][j]);
    let eigenvalues = matrix.symmetric_eigenvalues();
    let scale = eigenvalues
        .iter()
        .fold(1.0f64, |acc, v| acc.max(v.abs()));
    let min_eigenvalue = eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
    if min_eigenvalue < -1e-8 * scale {
        return Err(SolverError::NonConvex {
            detail: format!(
                "{what} has a negative curvature direction (min eigenvalue {min_eigenvalue:.3e})"
            ),
        });
    }
    Ok(())
}

/// Cholesky factor of a PSD matrix, with one small-ridge retry to absorb
/// semidefinite rank deficiency
fn cholesky_factor(m_dense: &[Vec<f64>]) -> Option<DMatrix<f64>> {
    let n = m_dense.len();
    let matrix = DMatrix::from_fn(n, n, |i, j| m_dense[i][j]);
    if let Some(chol) = matrix.clone().cholesky() {
        return Some(chol.l());
    }
    let trace: f64 = (0..n).map(|i| m_dense[i][i].abs()).sum();
    let ridge = 1e-10 * trace.max(1.0);
    let ridged = &matrix + DMatrix::identity(n, n) * ridge;
    ridged.cholesky().map(|chol| chol.l())
}

/// Assemble a CSC matrix from (row, col, value) triplets
fn csc_from_triplets(m: usize, n: usize, triplets: &[(usize, usize, f64)]) -> CscMatrix {
    let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for &(r, c, v) in triplets {
        if v != 0.0 {
            columns[c].push((r, v));
        }
    }
    let mut colptr = Vec::with_capacity(n + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for column in &mut columns {
        column.sort_by_key(|&(r, _)| r);
        let mut last_row = usize::MAX;
        for &(r, v) in column.iter() {
            if r == last_row {
                let value: &mut f64 = nzval.last_mut().unwrap();
                *value += v;
            } else {
                rowval.push(r);
                nzval.push(v);
                last_row = r;
            }
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(m, n, colptr, rowval, nzval)
}

/// Assemble the upper triangle of a dense symmetric matrix as CSC, the form
/// Clarabel expects for P
fn csc_upper_triangular(p_dense: &[Vec<f64>]) -> CscMatrix {
    let n = p_dense.len();
    let mut triplets = Vec::new();
    for (i, row) in p_dense.iter().enumerate() {
        for (j, &value) in row.iter().enumerate().skip(i) {
            if value != 0.0 {
                triplets.push((i, j, value));
            }
        }
    }
    csc_from_triplets(n, n, &triplets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::variable::VariableType;

    fn quiet() -> SolverOptions {
        SolverOptions::default()
    }

    #[test]
    fn lp_duals_match_hand_computed_shadow_prices() {
        // Maximize 3x + 2y subject to x + y <= 4, x <= 3, x, y >= 0.
        // Optimum (3, 1), objective 11; relaxing the budget by one unit is
        // worth 2, relaxing the x cap is worth 1.
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., f64::INFINITY)
            .unwrap();
        problem
            .add_new_variable("y", VariableType::Continuous, 0., f64::INFINITY)
            .unwrap();
        problem.add_linear_objective_term("x", 3.0).unwrap();
        problem.add_linear_objective_term("y", 2.0).unwrap();
        problem
            .add_new_less_equal_constraint("budget", &["x", "y"], &[1., 1.], 4.)
            .unwrap();
        problem
            .add_new_less_equal_constraint("x_cap", &["x"], &[1.], 3.)
            .unwrap();

        let solution = ClarabelSolver::new().solve(&problem, &quiet()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 11.0).abs() < 1e-4);
        assert!((solution.value_of("x") - 3.0).abs() < 1e-4);
        assert!((solution.value_of("y") - 1.0).abs() < 1e-4);

        let duals = solution.dual_values.as_ref().unwrap();
        assert!((duals["budget"] - 2.0).abs() < 1e-4);
        assert!((duals["x_cap"] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn minimization_duals_have_the_cost_sign() {
        // Minimize 2x subject to x >= 1: meeting one more unit of demand
        // costs 2.
        let mut problem = Problem::new_minimization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., f64::INFINITY)
            .unwrap();
        problem.add_linear_objective_term("x", 2.0).unwrap();
        problem
            .add_new_greater_equal_constraint("demand", &["x"], &[1.], 1.)
            .unwrap();

        let solution = ClarabelSolver::new().solve(&problem, &quiet()).unwrap();
        assert!((solution.objective_value.unwrap() - 2.0).abs() < 1e-4);
        let duals = solution.dual_values.as_ref().unwrap();
        assert!((duals["demand"] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn solves_a_convex_qp() {
        // Minimize x^2 - 2x over [-10, 10]: optimum at x = 1, objective -1
        let mut problem = Problem::new_minimization();
        problem
            .add_new_variable("x", VariableType::Continuous, -10., 10.)
            .unwrap();
        problem.add_linear_objective_term("x", -2.0).unwrap();
        problem.add_quadratic_objective_term("x", "x", 1.0).unwrap();

        let solution = ClarabelSolver::new().solve(&problem, &quiet()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.value_of("x") - 1.0).abs() < 1e-4);
        assert!((solution.objective_value.unwrap() + 1.0).abs() < 1e-4);
        // Quadratic problems carry no duals
        assert!(solution.dual_values.is_none());
    }

    #[test]
    fn quadratic_caps_become_second_order_cones() {
        // Maximize x subject to x^2 <= 4: optimum x = 2
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, -10., 10.)
            .unwrap();
        problem.add_linear_objective_term("x", 1.0).unwrap();
        problem
            .add_constraint(
                "risk",
                Constraint::new_quadratic_cap(
                    vec![crate::optimize::constraint::QuadraticTerm {
                        variable1: "x".into(),
                        variable2: "x".into(),
                        coefficient: 1.0,
                    }],
                    4.0,
                ),
            )
            .unwrap();

        let solution = ClarabelSolver::new().solve(&problem, &quiet()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.value_of("x") - 2.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_nonconvex_objectives_before_solving() {
        // Maximizing x^2 is a non-convex problem
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        problem.add_quadratic_objective_term("x", "x", 1.0).unwrap();

        let result = ClarabelSolver::new().solve(&problem, &quiet());
        assert!(matches!(result, Err(SolverError::NonConvex { .. })));
    }

    #[test]
    fn rejects_integer_variables() {
        let mut problem = Problem::new_maximization();
        problem.add_new_binary_variable("b").unwrap();
        let result = ClarabelSolver::new().solve(&problem, &quiet());
        assert!(matches!(result, Err(SolverError::Unsupported { .. })));
    }

    #[test]
    fn reports_infeasible_rows() {
        let mut problem = Problem::new_minimization();
        problem
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        problem.add_linear_objective_term("x", 1.0).unwrap();
        problem
            .add_new_greater_equal_constraint("too_high", &["x"], &[1.], 10.)
            .unwrap();

        let solution = ClarabelSolver::new().solve(&problem, &quiet()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
    }
}
