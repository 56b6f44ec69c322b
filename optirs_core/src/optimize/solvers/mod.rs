//! Solver backends wrapping the external optimization engines
//!
//! Every backend exposes the same contract: it consumes an immutable
//! [`Problem`](crate::optimize::problem::Problem) together with per call
//! [`SolverOptions`](crate::optimize::SolverOptions) and produces a
//! [`ProblemSolution`](crate::optimize::ProblemSolution). Infeasible and
//! unbounded outcomes are ordinary solutions with the matching status; a
//! [`SolverError`] is reserved for genuine failures (unsupported input,
//! non-convexity, numerical breakdown).

pub mod clarabel;
pub mod descent;
#[cfg(feature = "highs")]
pub mod highs;
pub mod milp;
pub mod network;

use thiserror::Error;

use crate::optimize::problem::Problem;
use crate::optimize::{ProblemSolution, SolverOptions};

/// Common interface implemented by every solver backend
pub trait Solver {
    /// Short identifier of the backend, reported in results
    fn id(&self) -> &'static str;

    /// Solve the given problem
    ///
    /// Deterministic for a deterministic input: solving the same problem
    /// twice returns the same result, up to backend internal tie breaking.
    fn solve(
        &self,
        problem: &Problem,
        options: &SolverOptions,
    ) -> Result<ProblemSolution, SolverError>;
}

/// Errors raised by the solver backends
#[derive(Error, Debug, Clone)]
pub enum SolverError {
    /// The backend cannot handle this class of problem
    #[error("solver '{solver}' does not support {problem_type} problems")]
    Unsupported {
        /// Id of the backend that rejected the problem
        solver: &'static str,
        /// Human readable description of the offending problem class
        problem_type: String,
    },
    /// A convex-only backend was handed non-convex input; detected before any
    /// solve is attempted
    #[error("problem is not convex: {detail}")]
    NonConvex {
        /// What failed the convexity classification
        detail: String,
    },
    /// The backend itself failed
    #[error("solver '{solver}' failed: {detail}")]
    Backend {
        /// Id of the failing backend
        solver: &'static str,
        /// Backend specific failure detail
        detail: String,
    },
    /// A numerical failure occurred while solving
    #[error("numerical failure in solver '{solver}': {detail}")]
    Numerical {
        /// Id of the failing backend
        solver: &'static str,
        /// Description of the numerical problem
        detail: String,
    },
}
