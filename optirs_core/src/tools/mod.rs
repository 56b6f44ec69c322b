//! Tool orchestrators
//!
//! Each tool is a state free transformation from a validated request to an
//! [`OptimizationResult`](result::OptimizationResult): build variables, build
//! the objective, reformulate constraints, hand the model to a solver
//! backend, and normalize the outcome. Tools hold no state between calls;
//! independent invocations may run concurrently.
pub mod allocation;
pub mod column_gen;
pub mod execute;
pub mod network_flow;
pub mod pareto;
pub mod portfolio;
pub mod result;
pub mod robust;
pub mod schedule;
pub mod stochastic;

use thiserror::Error;

use crate::io::request::SolverOptionsSpec;
use crate::io::validate::ValidationError;
use crate::optimize::problem::ProblemError;
use crate::optimize::solvers::SolverError;
use crate::optimize::SolverOptions;

/// Resolve the per call solver options of a request
pub(crate) fn request_options(spec: &Option<SolverOptionsSpec>) -> SolverOptions {
    spec.as_ref()
        .map(|spec| spec.to_options())
        .unwrap_or_default()
}

/// Failure of a tool invocation
///
/// Infeasible and unbounded outcomes are *not* errors; they are ordinary
/// results with the matching status. This type covers malformed input,
/// backend failures, and post solve consistency violations. Use
/// [`result::OptimizationResult::from_error`] to render one as a structured
/// error result at the host boundary.
#[derive(Error, Debug)]
pub enum OptimizeError {
    /// Malformed or inconsistent input, caught before any solve
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Internal model construction failure
    #[error("model construction failed: {0}")]
    Problem(#[from] ProblemError),
    /// The solver backend failed
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// A post solve sanity check failed, indicating a modeling bug; never
    /// suppressed
    #[error("consistency violation: {detail}")]
    Consistency { detail: String },
}

#[cfg(test)]
mod tests {
    use super::result::OptimizationResult;
    use super::*;

    #[test]
    fn errors_render_as_structured_results() {
        let error = OptimizeError::Validation(ValidationError::EmptyCollection {
            context: "tasks",
        });
        let result = OptimizationResult::from_error(&error);
        assert_eq!(result.status, super::result::ResultStatus::Error);
        assert!(result.message.unwrap().contains("tasks"));
    }
}
