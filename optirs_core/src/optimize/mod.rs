//! Module for constructing, dispatching, and solving optimization problems

pub mod constraint;
pub mod objective;
pub mod problem;
pub mod reformulate;
pub mod selector;
pub mod solvers;
pub mod variable;

use derive_builder::Builder;
use indexmap::IndexMap;

use crate::optimize::selector::Backend;

/// Struct representing the solution to an optimization problem
#[derive(Debug, Clone)]
pub struct ProblemSolution {
    /// The status the solver finished with, see [`OptimizationStatus`]
    pub status: OptimizationStatus,
    /// Optimized value of the objective
    ///
    /// Some(f64) if a solution was found, None otherwise
    pub objective_value: Option<f64>,
    /// Values of the variables at the optimum, keyed by variable id
    ///
    /// Some(IndexMap) if a solution was found, None otherwise
    pub variable_values: Option<IndexMap<String, f64>>,
    /// Values of the dual variables at the optimum, keyed by constraint id
    ///
    /// Some(IndexMap) only for problems without integer or binary variables,
    /// solved by a backend that produces duals. For mixed integer problems
    /// this is always None: the underlying duality does not hold there.
    pub dual_values: Option<IndexMap<String, f64>>,
    /// Wall clock time spent inside the backend, in seconds
    pub solve_time: f64,
}

impl ProblemSolution {
    /// A solution carrying only a status, used for infeasible and failed runs
    pub fn empty(status: OptimizationStatus) -> Self {
        ProblemSolution {
            status,
            objective_value: None,
            variable_values: None,
            dual_values: None,
            solve_time: 0.0,
        }
    }

    /// Whether the solution is proven optimal
    pub fn is_optimal(&self) -> bool {
        matches!(
            self.status,
            OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal
        )
    }

    /// Whether a usable (feasible) assignment is available
    pub fn is_feasible(&self) -> bool {
        matches!(
            self.status,
            OptimizationStatus::Optimal
                | OptimizationStatus::AlmostOptimal
                | OptimizationStatus::LocalOptimal
                | OptimizationStatus::Feasible
        )
    }

    /// Value of a variable at the optimum, 0.0 when absent
    pub fn value_of(&self, variable_id: &str) -> f64 {
        self.variable_values
            .as_ref()
            .and_then(|values| values.get(variable_id).copied())
            .unwrap_or(0.0)
    }
}

/// Status of an optimization problem
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Problem has not yet been optimized
    Unoptimized,
    /// Problem has been solved to proven optimality
    Optimal,
    /// An approximately optimal solution has been found
    AlmostOptimal,
    /// A locally optimal solution has been found, with no global certificate
    LocalOptimal,
    /// A feasible incumbent is available but optimality was not proven
    /// (typically the best solution found when a time limit was hit)
    Feasible,
    /// Problem can't be optimized because the objective value is unbounded
    Unbounded,
    /// Problem can't be solved because it is infeasible
    Infeasible,
    /// A numerical error occurred during solving
    NumericalError,
    /// The solver halted without a usable solution (insufficient progress,
    /// iteration limit without an incumbent)
    SolverHalted,
}

/// Per call options forwarded to the solver backends
#[derive(Debug, Clone, Default, Builder)]
#[builder(default)]
pub struct SolverOptions {
    /// Wall clock limit for the solve, in seconds
    ///
    /// Honored natively by backends that support early termination; backends
    /// without an interruption hook log the request instead of enforcing it.
    pub time_limit: Option<f64>,
    /// Forward backend progress output where supported
    pub verbose: bool,
    /// Explicit backend override, bypassing automatic selection
    pub backend: Option<Backend>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feasibility_covers_local_and_halted_incumbents() {
        assert!(ProblemSolution::empty(OptimizationStatus::Optimal).is_feasible());
        assert!(ProblemSolution::empty(OptimizationStatus::LocalOptimal).is_feasible());
        assert!(ProblemSolution::empty(OptimizationStatus::Feasible).is_feasible());
        assert!(!ProblemSolution::empty(OptimizationStatus::Infeasible).is_feasible());
        assert!(!ProblemSolution::empty(OptimizationStatus::SolverHalted).is_feasible());
    }

    #[test]
    fn local_optimum_is_not_proven_optimal() {
        assert!(!ProblemSolution::empty(OptimizationStatus::LocalOptimal).is_optimal());
        assert!(ProblemSolution::empty(OptimizationStatus::AlmostOptimal).is_optimal());
    }

    #[test]
    fn options_builder_defaults_to_auto_selection() {
        let options = SolverOptionsBuilder::default().build().unwrap();
        assert!(options.time_limit.is_none());
        assert!(!options.verbose);
        assert!(options.backend.is_none());
    }
}
