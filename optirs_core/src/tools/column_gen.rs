//! Column generation tool
//!
//! Alternates a continuous restricted master problem (solved on the conic
//! backend, which supplies the dual values) with an integer knapsack pricing
//! subproblem. New columns are added while one with negative reduced cost
//! exists; the loop stops at proven convergence or the iteration cap.
use indexmap::IndexMap;
use log::{debug, warn};

use crate::io::request::{
    CmpOp, ColumnGenRequest, ColumnSpec, MasterProblemSpec, PricingItemSpec, PricingProblemSpec,
};
use crate::io::validate;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::variable::VariableType;
use crate::optimize::{selector, ProblemSolution, SolverOptions};
use crate::tools::result::{
    IterationRecord, MonteCarloCompatible, OptimizationResult, ResultStatus, SelectedColumn,
    ToolAnalytics,
};
use crate::tools::{request_options, OptimizeError};

/// Solve a structured problem by column generation
pub fn optimize_column_gen(
    request: &ColumnGenRequest,
) -> Result<OptimizationResult, OptimizeError> {
    validate::validate_column_gen(
        &request.master_problem,
        &request.pricing_problem,
        &request.initial_columns,
    )?;

    let mut columns = if request.initial_columns.is_empty() {
        trivial_initial_columns(&request.master_problem)
    } else {
        request.initial_columns.clone()
    };
    let num_initial = columns.len();
    let options = request_options(&request.solver_options);

    let mut history: Vec<IterationRecord> = Vec::new();
    let mut converged = false;
    let mut last_rmp: Option<ProblemSolution> = None;
    let mut iterations = 0;

    for iteration in 0..request.max_iterations.max(1) {
        iterations = iteration + 1;
        let rmp = solve_rmp(&request.master_problem, &columns, &options)?;
        if !rmp.is_feasible() {
            let mut result = OptimizationResult::from_solution("column_generation", &rmp);
            result.message = Some(format!(
                "Restricted master problem is infeasible at iteration {iteration}; the \
                 column set cannot cover the constraints"
            ));
            return Ok(result);
        }
        history.push(IterationRecord {
            iteration,
            objective_value: rmp.objective_value.unwrap_or(0.0),
            num_columns: columns.len(),
        });
        let duals = rmp.dual_values.clone().unwrap_or_default();
        last_rmp = Some(rmp);

        let new_column = price_column(request, &duals, columns.len(), &options)?;
        match new_column {
            Some(column) => {
                debug!(
                    "column generation iteration {iteration}: adding column '{}'",
                    column.id
                );
                columns.push(column);
            }
            None => {
                converged = true;
                break;
            }
        }
    }

    let rmp = last_rmp.expect("at least one RMP solve ran");
    let selected: Vec<SelectedColumn> = columns
        .iter()
        .enumerate()
        .filter_map(|(index, column)| {
            let weight = rmp.value_of(&lambda_name(index));
            (weight > 1e-6).then(|| SelectedColumn {
                column_id: column.id.clone(),
                weight,
                cost: column.cost,
                coefficients: column.coefficients.clone(),
            })
        })
        .collect();

    let mut result = OptimizationResult::from_solution("column_generation", &rmp);
    result.solution = selected
        .iter()
        .map(|column| (column.column_id.clone(), column.weight))
        .collect();
    result.shadow_prices = None;
    if !converged {
        result.message = Some(format!(
            "Iteration cap ({}) reached before pricing converged; the objective is a bound \
             on the restricted column set only",
            request.max_iterations
        ));
    }
    let objective_value = result.objective_value.unwrap_or(0.0);
    result.monte_carlo_compatible = Some(MonteCarloCompatible::new(
        result.solution.clone(),
        Vec::new(),
        Vec::new(),
        format!(
            "Column generation: {} columns selected, cost={objective_value:.2}",
            selected.len()
        ),
        "Column generation over a restricted master problem".to_string(),
        None,
    ));
    result.analytics = ToolAnalytics::ColumnGen {
        optimal_solution: selected,
        column_count: columns.len(),
        iterations,
        converged,
        convergence_history: history,
        num_initial_columns: num_initial,
        num_generated_columns: columns.len() - num_initial,
    };
    Ok(result)
}

fn lambda_name(index: usize) -> String {
    format!("lambda_{index}")
}

/// One throwaway column per constraint, expensive enough that pricing will
/// replace them
fn trivial_initial_columns(master: &MasterProblemSpec) -> Vec<ColumnSpec> {
    master
        .constraints
        .iter()
        .map(|constraint| ColumnSpec {
            id: format!("initial_{}", constraint.name),
            cost: 1000.0,
            coefficients: IndexMap::from([(constraint.name.clone(), constraint.rhs.max(1.0))]),
        })
        .collect()
}

/// Solve the restricted master problem over the current column set
fn solve_rmp(
    master: &MasterProblemSpec,
    columns: &[ColumnSpec],
    options: &SolverOptions,
) -> Result<ProblemSolution, OptimizeError> {
    let mut problem = Problem::new(master.objective);
    let names: Vec<String> = (0..columns.len()).map(lambda_name).collect();
    for (name, column) in names.iter().zip(columns) {
        problem.add_new_variable(name, VariableType::Continuous, 0.0, f64::INFINITY)?;
        if column.cost != 0.0 {
            problem.add_linear_objective_term(name, column.cost)?;
        }
    }
    for constraint in &master.constraints {
        let mut refs: Vec<&str> = Vec::new();
        let mut coefficients: Vec<f64> = Vec::new();
        for (name, column) in names.iter().zip(columns) {
            let coefficient = column
                .coefficients
                .get(&constraint.name)
                .copied()
                .unwrap_or(0.0);
            if coefficient != 0.0 {
                refs.push(name);
                coefficients.push(coefficient);
            }
        }
        match constraint.op {
            CmpOp::LessEqual => problem.add_new_less_equal_constraint(
                &constraint.name,
                &refs,
                &coefficients,
                constraint.rhs,
            )?,
            CmpOp::GreaterEqual => problem.add_new_greater_equal_constraint(
                &constraint.name,
                &refs,
                &coefficients,
                constraint.rhs,
            )?,
            CmpOp::Equal => problem.add_new_equality_constraint(
                &constraint.name,
                &refs,
                &coefficients,
                constraint.rhs,
            )?,
        }
    }
    Ok(selector::dispatch(&problem, options)?)
}

/// Solve the pricing subproblem; Some(column) only when its reduced cost
/// beats the optimality gap
fn price_column(
    request: &ColumnGenRequest,
    duals: &IndexMap<String, f64>,
    column_index: usize,
    options: &SolverOptions,
) -> Result<Option<ColumnSpec>, OptimizeError> {
    let PricingProblemSpec::Knapsack {
        capacity,
        items,
        column_cost,
    } = &request.pricing_problem
    else {
        // Fixed column set: nothing to price
        return Ok(None);
    };
    if request.master_problem.objective == ObjectiveSense::Maximize {
        warn!("knapsack pricing supports minimization masters only; treating the column set as final");
        return Ok(None);
    }

    // Maximize the dual weighted coverage of one new column
    let mut problem = Problem::new_maximization();
    for item in items {
        let per_column = (capacity / item.size).floor();
        let bound = item
            .max_per_column
            .map(|cap| (cap as f64).min(per_column))
            .unwrap_or(per_column);
        problem.add_new_variable(&count_name(item), VariableType::Integer, 0.0, bound)?;
        let dual = duals.get(&item.name).copied().unwrap_or(0.0);
        if dual != 0.0 {
            problem.add_linear_objective_term(&count_name(item), dual)?;
        }
    }
    let names: Vec<String> = items.iter().map(count_name).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let sizes: Vec<f64> = items.iter().map(|item| item.size).collect();
    problem.add_new_less_equal_constraint("capacity", &refs, &sizes, *capacity)?;

    let solution = selector::dispatch(&problem, options)?;
    if !solution.is_feasible() {
        return Ok(None);
    }
    let coverage = solution.objective_value.unwrap_or(0.0);
    let reduced_cost = column_cost - coverage;
    debug!("pricing: coverage {coverage:.6}, reduced cost {reduced_cost:.6}");
    if reduced_cost >= -request.optimality_gap {
        return Ok(None);
    }

    let coefficients: IndexMap<String, f64> = items
        .iter()
        .filter_map(|item| {
            let count = solution.value_of(&count_name(item)).round();
            (count > 0.5).then(|| (item.name.clone(), count))
        })
        .collect();
    Ok(Some(ColumnSpec {
        id: format!("col_{column_index}"),
        cost: *column_cost,
        coefficients,
    }))
}

fn count_name(item: &PricingItemSpec) -> String {
    format!("count_{}", item.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_request;
    use crate::io::validate::ValidationError;

    /// Cutting stock: rolls of length 7, demand for 4 pieces of length 3 and
    /// 5 pieces of length 2
    fn cutting_stock() -> ColumnGenRequest {
        parse_request(
            r#"{
                "master_problem": {
                    "constraints": [
                        {"name": "piece_a", "type": ">=", "rhs": 4},
                        {"name": "piece_b", "type": ">=", "rhs": 5}
                    ],
                    "objective": "minimize"
                },
                "pricing_problem": {
                    "type": "knapsack",
                    "capacity": 7,
                    "items": [
                        {"name": "piece_a", "size": 3},
                        {"name": "piece_b", "size": 2}
                    ],
                    "column_cost": 1.0
                },
                "initial_columns": [
                    {"id": "only_a", "cost": 1.0, "coefficients": {"piece_a": 2}},
                    {"id": "only_b", "cost": 1.0, "coefficients": {"piece_b": 3}}
                ],
                "max_iterations": 20
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn pricing_discovers_the_mixed_pattern() {
        let result = optimize_column_gen(&cutting_stock()).unwrap();
        assert_eq!(result.status, ResultStatus::Optimal);
        match &result.analytics {
            ToolAnalytics::ColumnGen {
                converged,
                column_count,
                convergence_history,
                num_generated_columns,
                optimal_solution,
                ..
            } => {
                assert!(*converged);
                // one improving column (1x piece_a + 2x piece_b) is found
                assert_eq!(*column_count, 3);
                assert_eq!(*num_generated_columns, 1);
                assert_eq!(convergence_history.len(), 2);
                // LP bound improves from 11/3 to 13/4
                assert!(
                    convergence_history[1].objective_value
                        < convergence_history[0].objective_value - 1e-6
                );
                assert!(!optimal_solution.is_empty());
            }
            other => panic!("expected column generation analytics, got {other:?}"),
        }
        assert!((result.objective_value.unwrap() - 3.25).abs() < 1e-4);
    }

    #[test]
    fn trivial_columns_bootstrap_an_empty_start() {
        let mut request = cutting_stock();
        request.initial_columns.clear();
        let result = optimize_column_gen(&request).unwrap();
        assert_eq!(result.status, ResultStatus::Optimal);
        match &result.analytics {
            ToolAnalytics::ColumnGen {
                converged,
                num_initial_columns,
                ..
            } => {
                assert!(*converged);
                assert_eq!(*num_initial_columns, 2);
            }
            other => panic!("expected column generation analytics, got {other:?}"),
        }
    }

    #[test]
    fn a_fixed_column_set_converges_immediately() {
        let mut request = cutting_stock();
        request.pricing_problem = PricingProblemSpec::Custom {};
        let result = optimize_column_gen(&request).unwrap();
        match &result.analytics {
            ToolAnalytics::ColumnGen {
                converged,
                iterations,
                num_generated_columns,
                ..
            } => {
                assert!(*converged);
                assert_eq!(*iterations, 1);
                assert_eq!(*num_generated_columns, 0);
            }
            other => panic!("expected column generation analytics, got {other:?}"),
        }
    }

    #[test]
    fn pricing_items_must_name_master_constraints() {
        let mut request = cutting_stock();
        if let PricingProblemSpec::Knapsack { items, .. } = &mut request.pricing_problem {
            items[0].name = "ghost".to_string();
        }
        let error = optimize_column_gen(&request).unwrap_err();
        assert!(matches!(
            error,
            OptimizeError::Validation(ValidationError::UnknownReference { .. })
        ));
    }

    #[test]
    fn iteration_caps_are_reported() {
        let mut request = cutting_stock();
        request.max_iterations = 1;
        let result = optimize_column_gen(&request).unwrap();
        match &result.analytics {
            ToolAnalytics::ColumnGen { converged, .. } => assert!(!*converged),
            other => panic!("expected column generation analytics, got {other:?}"),
        }
        assert!(result.message.unwrap().contains("cap"));
    }
}
