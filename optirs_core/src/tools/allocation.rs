//! Resource allocation tool
//!
//! Selects items under shared resource budgets to maximize (or minimize) a
//! single or weighted multi objective. Items whose requirements cannot fit
//! are simply never selected; when nothing fits at all the result is still
//! `optimal` with objective zero and an explanatory message, not an error.
use indexmap::IndexMap;

use crate::io::monte_carlo;
use crate::io::request::{AllocationRequest, ObjectiveSpec};
use crate::io::validate;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::reformulate;
use crate::optimize::{selector, ProblemSolution, SolverOptions};
use crate::tools::result::{
    compute_resource_usage, normal_assumption, ItemOutcome, MonteCarloCompatible,
    ObjectiveContribution, OptimizationResult, ResultStatus, SuccessCriteria, ToolAnalytics,
};
use crate::tools::OptimizeError;
use crate::utils::num;

/// Per function value maps of a multi objective, kept for the breakdown
struct MultiObjectiveValues {
    functions: IndexMap<String, (f64, IndexMap<String, f64>)>,
}

/// Optimize allocation of limited resources across competing items
pub fn optimize_allocation(
    request: &AllocationRequest,
) -> Result<OptimizationResult, OptimizeError> {
    validate::validate_objective(&request.objective, true)?;
    validate::validate_resources(&request.resources)?;
    validate::validate_item_requirements(&request.item_requirements, &request.resources)?;

    let item_names: Vec<String> = request
        .item_requirements
        .iter()
        .map(|item| item.name.clone())
        .collect();
    validate::validate_objective_references(&request.objective, &item_names)?;
    validate::validate_rules(&request.constraints, &item_names)?;
    if let Some(integration) = &request.monte_carlo_integration {
        validate::validate_mc_integration(integration)?;
    }

    let sense = request.objective.sense();
    let (item_values, multi) = objective_values(request, &item_names)?;

    // Build the model: one binary selection variable per item
    let mut problem = Problem::new(sense);
    for name in &item_names {
        problem.add_new_binary_variable(name)?;
    }
    for (name, value) in &item_values {
        problem.add_linear_objective_term(name, *value)?;
    }
    for (resource_name, resource) in &request.resources {
        let mut refs: Vec<&str> = Vec::new();
        let mut coefficients: Vec<f64> = Vec::new();
        for item in &request.item_requirements {
            let amount = item.requirements.get(resource_name).copied().unwrap_or(0.0);
            if amount != 0.0 {
                refs.push(item.name.as_str());
                coefficients.push(amount);
            }
        }
        if !refs.is_empty() {
            problem.add_new_less_equal_constraint(
                &format!("resource_{resource_name}"),
                &refs,
                &coefficients,
                resource.total,
            )?;
        }
    }
    reformulate::apply_selection_rules(&mut problem, &request.constraints)?;

    let options = request
        .solver_options
        .as_ref()
        .map(|spec| spec.to_options())
        .unwrap_or_default();
    let solution = selector::dispatch(&problem, &options)?;

    Ok(build_result(
        request,
        &item_names,
        &item_values,
        multi.as_ref(),
        sense,
        &solution,
    ))
}

/// Resolve the per item objective coefficients, applying Monte Carlo
/// overrides; for the multi form this is the weighted sum over functions
fn objective_values(
    request: &AllocationRequest,
    item_names: &[String],
) -> Result<(IndexMap<String, f64>, Option<MultiObjectiveValues>), OptimizeError> {
    match &request.objective {
        ObjectiveSpec::Single { items, .. } => {
            let mut values: IndexMap<String, f64> = items
                .iter()
                .map(|item| (item.name.clone(), item.value.unwrap_or(0.0)))
                .collect();
            if let Some(integration) = &request.monte_carlo_integration {
                monte_carlo::apply_overrides(&mut values, integration)?;
            }
            Ok((values, None))
        }
        ObjectiveSpec::Multi { functions, .. } => {
            let mut combined: IndexMap<String, f64> =
                item_names.iter().map(|name| (name.clone(), 0.0)).collect();
            let mut breakdown = IndexMap::new();
            for function in functions {
                let mut values: IndexMap<String, f64> = function
                    .items
                    .iter()
                    .map(|item| (item.name.clone(), item.value.unwrap_or(0.0)))
                    .collect();
                if let Some(integration) = &request.monte_carlo_integration {
                    monte_carlo::apply_overrides(&mut values, integration)?;
                }
                for (name, value) in &values {
                    *combined.get_mut(name).expect("references validated") +=
                        function.weight * value;
                }
                breakdown.insert(function.name.clone(), (function.weight, values));
            }
            Ok((
                combined,
                Some(MultiObjectiveValues {
                    functions: breakdown,
                }),
            ))
        }
    }
}

fn build_result(
    request: &AllocationRequest,
    item_names: &[String],
    item_values: &IndexMap<String, f64>,
    multi: Option<&MultiObjectiveValues>,
    sense: ObjectiveSense,
    solution: &ProblemSolution,
) -> OptimizationResult {
    let mut result = OptimizationResult::from_solution("milp", solution);
    if !solution.is_feasible() {
        result.message = Some(infeasibility_message(request, result.status));
        return result;
    }

    // Round the binary indicators into a clean selection map
    let allocation: IndexMap<String, f64> = item_names
        .iter()
        .map(|name| {
            let selected = solution.value_of(name) > 0.5;
            (name.clone(), if selected { 1.0 } else { 0.0 })
        })
        .collect();
    result.solution = allocation.clone();
    result.resource_usage =
        compute_resource_usage(&allocation, &request.item_requirements, &request.resources);
    // Binary model: duals do not exist, so shadow prices stay absent
    result.shadow_prices = crate::tools::result::shadow_prices_from(solution, "resource_");

    let selected: Vec<String> = allocation
        .iter()
        .filter(|(_, v)| **v > 0.5)
        .map(|(name, _)| name.clone())
        .collect();
    if selected.is_empty() {
        if let Some(explanation) = oversized_item_message(request) {
            result.message = Some(explanation);
        }
    }

    let items: Vec<ItemOutcome> = if multi.is_none() {
        item_names
            .iter()
            .map(|name| ItemOutcome {
                name: name.clone(),
                value: item_values.get(name).copied().unwrap_or(0.0),
                selected: allocation[name] > 0.5,
            })
            .collect()
    } else {
        Vec::new()
    };
    let objective_breakdown = multi.map(|multi| {
        multi
            .functions
            .iter()
            .map(|(function_name, (weight, values))| {
                let value: f64 = item_names
                    .iter()
                    .map(|name| values.get(name).copied().unwrap_or(0.0) * allocation[name])
                    .sum();
                (
                    function_name.clone(),
                    ObjectiveContribution {
                        value,
                        weight: *weight,
                        weighted_value: value * weight,
                    },
                )
            })
            .collect()
    });
    result.analytics = ToolAnalytics::Allocation {
        items,
        objective_breakdown,
    };

    result.monte_carlo_compatible = Some(monte_carlo_block(
        &allocation,
        item_values,
        result.objective_value.unwrap_or(0.0),
        sense,
        &selected,
    ));
    result
}

/// Explain infeasible and unbounded outcomes in terms of the input
fn infeasibility_message(request: &AllocationRequest, status: ResultStatus) -> String {
    match status {
        ResultStatus::Infeasible => match oversized_item_message(request) {
            Some(message) => message,
            None => {
                "Problem is infeasible. No feasible selection exists given the constraints."
                    .to_string()
            }
        },
        ResultStatus::Unbounded => "Problem is unbounded. The objective can be improved \
                                    infinitely; check that all variables have bounds."
            .to_string(),
        other => format!("Optimization failed with status: {other}"),
    }
}

/// Name items whose single resource requirement exceeds the total capacity
fn oversized_item_message(request: &AllocationRequest) -> Option<String> {
    let mut oversized = Vec::new();
    for item in &request.item_requirements {
        for (resource_name, amount) in &item.requirements {
            if let Some(resource) = request.resources.get(resource_name) {
                if *amount > resource.total {
                    oversized.push(format!(
                        "item '{}' requires {} {} but only {} is available",
                        item.name, amount, resource_name, resource.total
                    ));
                }
            }
        }
    }
    if oversized.is_empty() {
        None
    } else {
        Some(format!(
            "Some items require more resources than available: {}",
            oversized.join("; ")
        ))
    }
}

fn monte_carlo_block(
    allocation: &IndexMap<String, f64>,
    item_values: &IndexMap<String, f64>,
    objective_value: f64,
    sense: ObjectiveSense,
    selected: &[String],
) -> MonteCarloCompatible {
    let assumptions = item_values
        .iter()
        .map(|(name, value)| normal_assumption(format!("{name}_value"), *value, 0.15))
        .collect();
    let outcome_function = format!(
        "sum([{}]) for selected items: [{}]",
        selected
            .iter()
            .map(|name| format!("{name}_value"))
            .collect::<Vec<_>>()
            .join(", "),
        selected.join(", ")
    );
    let comparison = match sense {
        ObjectiveSense::Maximize => ">=",
        ObjectiveSense::Minimize => "<=",
    };
    MonteCarloCompatible::new(
        allocation.clone(),
        selected.to_vec(),
        assumptions,
        outcome_function,
        format!(
            "Resource allocation optimizing {sense} with {} items selected",
            selected.len()
        ),
        Some(SuccessCriteria {
            threshold: objective_value * 0.9,
            comparison: comparison.to_string(),
        }),
    )
}
