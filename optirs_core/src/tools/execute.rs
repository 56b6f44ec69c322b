//! Custom problem execution tool
//!
//! The escape hatch for fully explicit problem definitions: variables with
//! bounds, a linear (optionally quadratic) objective, and linear constraint
//! rows. Backend selection is fully automatic through the solver selector,
//! with an explicit override for callers who know better.
use indexmap::IndexMap;

use crate::io::monte_carlo;
use crate::io::request::{CmpOp, ExecuteRequest};
use crate::io::validate;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::selector::{self, Backend};
use crate::optimize::variable::VariableType;
use crate::optimize::OptimizationStatus;
use crate::tools::result::{
    normal_assumption, shadow_prices_from, MonteCarloCompatible, OptimizationResult, ProblemInfo,
    SuccessCriteria, ToolAnalytics,
};
use crate::tools::{request_options, OptimizeError};

/// Execute a custom optimization problem with automatic solver selection
pub fn optimize_execute(request: &ExecuteRequest) -> Result<OptimizationResult, OptimizeError> {
    validate::validate_problem_definition(&request.problem_definition)?;
    if let Some(integration) = &request.monte_carlo_integration {
        validate::validate_mc_integration(integration)?;
    }

    let definition = &request.problem_definition;
    let mut coefficients = definition.objective.coefficients.clone();
    if let Some(integration) = &request.monte_carlo_integration {
        monte_carlo::apply_overrides(&mut coefficients, integration)?;
    }

    let mut problem = Problem::new(definition.objective.sense);
    for variable in &definition.variables {
        let (lower, upper) = match (variable.bounds, variable.variable_type) {
            (_, VariableType::Binary) => (0.0, 1.0),
            (Some((lower, upper)), _) => (
                lower.unwrap_or(f64::NEG_INFINITY),
                upper.unwrap_or(f64::INFINITY),
            ),
            (None, _) => (f64::NEG_INFINITY, f64::INFINITY),
        };
        problem.add_new_variable(&variable.name, variable.variable_type, lower, upper)?;
    }
    for (name, coefficient) in &coefficients {
        if *coefficient != 0.0 {
            problem.add_linear_objective_term(name, *coefficient)?;
        }
    }
    for term in &definition.objective.quadratic {
        problem.add_quadratic_objective_term(&term.var1, &term.var2, term.coef)?;
    }
    for (index, constraint) in definition.constraints.iter().enumerate() {
        let refs: Vec<&str> = constraint.coefficients.keys().map(String::as_str).collect();
        let row: Vec<f64> = constraint.coefficients.values().copied().collect();
        let id = constraint
            .name
            .clone()
            .unwrap_or_else(|| format!("constraint_{index}"));
        match constraint.op {
            CmpOp::LessEqual => {
                problem.add_new_less_equal_constraint(&id, &refs, &row, constraint.rhs)?
            }
            CmpOp::GreaterEqual => {
                problem.add_new_greater_equal_constraint(&id, &refs, &row, constraint.rhs)?
            }
            CmpOp::Equal => {
                problem.add_new_equality_constraint(&id, &refs, &row, constraint.rhs)?
            }
        }
    }

    let mut options = request_options(&request.solver_options);
    let backend = match request.solver_preference.or(options.backend) {
        Some(backend) => backend,
        None if request.auto_detect => {
            selector::select_backend(&selector::signature_of(&problem))?
        }
        // Without auto detection the MILP engine is the historical default
        None => Backend::Milp,
    };
    options.backend = Some(backend);
    let solver = selector::solver_for(backend)?;
    let solution = solver.solve(&problem, &options)?;

    let mut result = OptimizationResult::from_solution(solver.id(), &solution);
    result.shadow_prices = shadow_prices_from(&solution, "");
    let variable_types: IndexMap<String, usize> =
        definition
            .variables
            .iter()
            .fold(IndexMap::new(), |mut counts, variable| {
                *counts
                    .entry(variable.variable_type.to_string())
                    .or_insert(0) += 1;
                counts
            });
    result.analytics = ToolAnalytics::Execute {
        solver_used: solver.id().to_string(),
        local_optimum: solution.status == OptimizationStatus::LocalOptimal,
        problem_info: ProblemInfo {
            num_variables: problem.num_variables(),
            num_constraints: problem.num_constraints(),
            variable_types,
            sense: definition.objective.sense.to_string(),
        },
    };

    if solution.is_feasible() {
        let objective_value = result.objective_value.unwrap_or(0.0);
        let assumptions = result
            .solution
            .iter()
            .map(|(name, value)| normal_assumption(format!("{name}_coefficient"), *value, 0.10))
            .collect();
        let comparison = match definition.objective.sense {
            ObjectiveSense::Maximize => ">=",
            ObjectiveSense::Minimize => "<=",
        };
        result.monte_carlo_compatible = Some(
            MonteCarloCompatible::new(
                result.solution.clone(),
                Vec::new(),
                assumptions,
                format!(
                    "Custom optimization with {} variables",
                    problem.num_variables()
                ),
                "Custom optimization problem".to_string(),
                Some(SuccessCriteria {
                    threshold: objective_value * 0.9,
                    comparison: comparison.to_string(),
                }),
            )
            .with_expected_value(objective_value),
        );
    }
    Ok(result)
}
