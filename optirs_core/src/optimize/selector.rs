//! Automatic solver selection
//!
//! Maps a normalized problem signature (variable types, objective curvature,
//! pure network structure) to the cheapest adequate backend. Detection is a
//! pure function so it can be tested in isolation; an explicit override in
//! [`SolverOptions`](crate::optimize::SolverOptions) bypasses it entirely.
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::optimize::objective::{ObjectiveSense, ObjectiveTerm};
use crate::optimize::problem::Problem;
use crate::optimize::solvers::clarabel::ClarabelSolver;
use crate::optimize::solvers::descent::DescentSolver;
use crate::optimize::solvers::milp::MilpSolver;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{ProblemSolution, SolverOptions};

/// The solver backend families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Specialized network flow algorithms (pure flow structure only)
    Network,
    /// Mixed integer linear programming (microlp)
    Milp,
    /// Interior point conic solver (Clarabel): pure LP with duals, convex QP,
    /// second order cones
    Conic,
    /// Local search for non-convex continuous problems; results are local
    Descent,
    /// HiGHS mixed integer backend
    #[cfg(feature = "highs")]
    Highs,
}

/// Curvature of the objective, always classified on the minimization form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curvature {
    Linear,
    ConvexQuadratic,
    NonconvexQuadratic,
}

/// The signature automatic selection operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemSignature {
    /// Whether any integer or binary variables are present
    pub has_integer: bool,
    /// Objective curvature, see [`Curvature`]
    pub curvature: Curvature,
    /// Whether the problem is a pure network flow structure
    pub pure_network: bool,
}

/// Pick a backend for a signature
///
/// Priority: pure network structure, then MILP for integer problems with a
/// linear objective, then the conic solver for everything continuous that is
/// linear or convex (pure LPs go there because it is the backend that
/// produces dual values), then local search. Integer variables combined with
/// a quadratic objective are not supported by any configured backend.
pub fn select_backend(signature: &ProblemSignature) -> Result<Backend, SolverError> {
    if signature.pure_network {
        return Ok(Backend::Network);
    }
    match (signature.has_integer, signature.curvature) {
        (true, Curvature::Linear) => Ok(Backend::Milp),
        (false, Curvature::Linear) | (false, Curvature::ConvexQuadratic) => Ok(Backend::Conic),
        (false, Curvature::NonconvexQuadratic) => Ok(Backend::Descent),
        (true, _) => Err(SolverError::Unsupported {
            solver: "selector",
            problem_type: "quadratic mixed integer".to_string(),
        }),
    }
}

/// Extract the signature of a built problem
pub fn signature_of(problem: &Problem) -> ProblemSignature {
    ProblemSignature {
        has_integer: problem.has_integer_variables(),
        curvature: objective_curvature(problem),
        pure_network: false,
    }
}

/// Classify the curvature of a problem's objective
///
/// Quadratic cap constraints count as (assumed convex) quadratic content;
/// their positive semidefiniteness is verified by the conic backend before it
/// solves.
fn objective_curvature(problem: &Problem) -> Curvature {
    if !problem.has_quadratic_objective() {
        if problem.has_quadratic_constraints() {
            return Curvature::ConvexQuadratic;
        }
        return Curvature::Linear;
    }
    let n = problem.num_variables();
    let index_of: indexmap::IndexMap<&str, usize> = problem
        .variables
        .keys()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let sign = match problem.objective.sense {
        ObjectiveSense::Minimize => 1.0,
        ObjectiveSense::Maximize => -1.0,
    };
    let mut quadratic = DMatrix::<f64>::zeros(n, n);
    for term in &problem.objective.terms {
        if let ObjectiveTerm::Quadratic { var1, var2, coef } = term {
            let i = index_of[var1.as_str()];
            let j = index_of[var2.as_str()];
            if i == j {
                quadratic[(i, i)] += sign * coef;
            } else {
                quadratic[(i, j)] += sign * coef / 2.0;
                quadratic[(j, i)] += sign * coef / 2.0;
            }
        }
    }
    let eigenvalues = quadratic.symmetric_eigenvalues();
    let scale = eigenvalues.iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
    let min_eigenvalue = eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
    if min_eigenvalue < -1e-8 * scale {
        Curvature::NonconvexQuadratic
    } else {
        Curvature::ConvexQuadratic
    }
}

/// Instantiate the solver for a backend choice
pub fn solver_for(backend: Backend) -> Result<Box<dyn Solver>, SolverError> {
    match backend {
        Backend::Milp => Ok(Box::new(MilpSolver::new())),
        Backend::Conic => Ok(Box::new(ClarabelSolver::new())),
        Backend::Descent => Ok(Box::new(DescentSolver::new())),
        Backend::Network => Err(SolverError::Unsupported {
            solver: "selector",
            problem_type: "the network backend requires a flow structured problem".to_string(),
        }),
        #[cfg(feature = "highs")]
        Backend::Highs => Ok(Box::new(
            crate::optimize::solvers::highs::HighsSolver::new(),
        )),
    }
}

/// Select (or honor an override), instantiate, and run a backend
pub fn dispatch(
    problem: &Problem,
    options: &SolverOptions,
) -> Result<ProblemSolution, SolverError> {
    let backend = match options.backend {
        Some(backend) => backend,
        None => select_backend(&signature_of(problem))?,
    };
    debug!(
        "dispatching {} problem to {:?}",
        problem.problem_type(),
        backend
    );
    solver_for(backend)?.solve(problem, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::variable::VariableType;

    fn signature(has_integer: bool, curvature: Curvature, pure_network: bool) -> ProblemSignature {
        ProblemSignature {
            has_integer,
            curvature,
            pure_network,
        }
    }

    #[test]
    fn selection_follows_the_priority_order() {
        assert_eq!(
            select_backend(&signature(false, Curvature::Linear, true)).unwrap(),
            Backend::Network
        );
        assert_eq!(
            select_backend(&signature(true, Curvature::Linear, false)).unwrap(),
            Backend::Milp
        );
        assert_eq!(
            select_backend(&signature(false, Curvature::Linear, false)).unwrap(),
            Backend::Conic
        );
        assert_eq!(
            select_backend(&signature(false, Curvature::ConvexQuadratic, false)).unwrap(),
            Backend::Conic
        );
        assert_eq!(
            select_backend(&signature(false, Curvature::NonconvexQuadratic, false)).unwrap(),
            Backend::Descent
        );
        assert!(select_backend(&signature(true, Curvature::ConvexQuadratic, false)).is_err());
    }

    #[test]
    fn signatures_classify_curvature_with_the_objective_sense() {
        // Minimizing x^2 is convex
        let mut convex = Problem::new_minimization();
        convex
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        convex.add_quadratic_objective_term("x", "x", 1.0).unwrap();
        assert_eq!(
            signature_of(&convex).curvature,
            Curvature::ConvexQuadratic
        );

        // Maximizing x^2 is not
        let mut nonconvex = Problem::new_maximization();
        nonconvex
            .add_new_variable("x", VariableType::Continuous, 0., 1.)
            .unwrap();
        nonconvex
            .add_quadratic_objective_term("x", "x", 1.0)
            .unwrap();
        assert_eq!(
            signature_of(&nonconvex).curvature,
            Curvature::NonconvexQuadratic
        );
    }

    #[test]
    fn integer_linear_problems_route_to_milp() {
        let mut problem = Problem::new_maximization();
        problem.add_new_binary_variable("b").unwrap();
        problem.add_linear_objective_term("b", 1.0).unwrap();
        let signature = signature_of(&problem);
        assert!(signature.has_integer);
        assert_eq!(select_backend(&signature).unwrap(), Backend::Milp);
    }

    #[test]
    fn backend_parses_from_lowercase_strings() {
        let backend: Backend = serde_json::from_str("\"conic\"").unwrap();
        assert_eq!(backend, Backend::Conic);
    }
}
