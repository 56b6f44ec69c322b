//! Robust allocation tool
//!
//! Instead of optimizing one expected value, evaluates candidate allocations
//! across a full scenario set and keeps the one that scores best under the
//! chosen robustness criterion (expected value, worst case, or a percentile
//! of the outcome distribution). Candidate generation is deterministic:
//! equal values, expected scenario values, worst case scenario values, and
//! resource weighted values.
use indexmap::IndexMap;
use log::debug;

use crate::io::request::{RobustRequest, RobustnessCriterion};
use crate::io::validate::{self, ValidationError};
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::reformulate;
use crate::optimize::{selector, SolverOptions};
use crate::tools::result::{
    compute_resource_usage, percentile_summary, MonteCarloCompatible, OptimizationResult,
    ResultStatus, RobustnessMetrics, ToolAnalytics,
};
use crate::tools::{request_options, OptimizeError};
use crate::utils::num;

/// Find an allocation that performs well across scenarios
pub fn optimize_robust(request: &RobustRequest) -> Result<OptimizationResult, OptimizeError> {
    // Values come from the scenarios, so the objective may omit them
    validate::validate_objective(&request.objective, false)?;
    validate::validate_resources(&request.resources)?;
    validate::validate_item_requirements(&request.item_requirements, &request.resources)?;
    let item_names: Vec<String> = request
        .item_requirements
        .iter()
        .map(|item| item.name.clone())
        .collect();
    validate::validate_objective_references(&request.objective, &item_names)?;
    validate::validate_rules(&request.constraints, &item_names)?;
    if request.monte_carlo_scenarios.scenarios.is_empty() {
        return Err(ValidationError::EmptyCollection { context: "scenarios" }.into());
    }
    if !(0.0..=1.0).contains(&request.risk_tolerance) {
        return Err(ValidationError::OutOfRange {
            field: "risk_tolerance".to_string(),
            requirement: "between 0 and 1",
            value: request.risk_tolerance,
        }
        .into());
    }

    let sense = request.objective.sense();
    let scenarios: Vec<&IndexMap<String, f64>> = request
        .monte_carlo_scenarios
        .scenarios
        .iter()
        .map(|scenario| scenario.values())
        .collect();
    let options = request_options(&request.solver_options);

    let candidates = generate_candidates(request, &item_names, &scenarios, sense, &options)?;
    if candidates.is_empty() {
        let mut result = OptimizationResult::new("milp", ResultStatus::Infeasible);
        result.message = Some(
            "No feasible candidate allocation exists under the resource limits and \
             constraints."
                .to_string(),
        );
        return Ok(result);
    }
    debug!(
        "robust allocation: evaluating {} candidates across {} scenarios",
        candidates.len(),
        scenarios.len()
    );

    let mut best: Option<(IndexMap<String, f64>, Vec<f64>, f64)> = None;
    for allocation in candidates {
        let outcomes = evaluate_across_scenarios(&allocation, &item_names, &scenarios);
        let score = robustness_score(
            &outcomes,
            request.robustness_criterion,
            request.risk_tolerance,
            sense,
        );
        let better = match (&best, sense) {
            (None, _) => true,
            (Some((_, _, incumbent)), ObjectiveSense::Maximize) => score > *incumbent,
            (Some((_, _, incumbent)), ObjectiveSense::Minimize) => score < *incumbent,
        };
        if better {
            best = Some((allocation, outcomes, score));
        }
    }
    let (allocation, outcomes, _) = best.expect("candidates were non-empty");

    let expected = num::mean(&outcomes);
    let (worst, best_case) = match sense {
        ObjectiveSense::Maximize => (
            outcomes.iter().cloned().fold(f64::INFINITY, f64::min),
            outcomes.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ),
        ObjectiveSense::Minimize => (
            outcomes.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            outcomes.iter().cloned().fold(f64::INFINITY, f64::min),
        ),
    };
    let threshold = expected * 0.9;
    let meeting = outcomes
        .iter()
        .filter(|outcome| match sense {
            ObjectiveSense::Maximize => **outcome >= threshold,
            ObjectiveSense::Minimize => **outcome <= threshold,
        })
        .count() as f64
        / outcomes.len() as f64;

    let selected: Vec<String> = allocation
        .iter()
        .filter(|(_, value)| **value > 0.5)
        .map(|(name, _)| name.clone())
        .collect();
    let mut result = OptimizationResult::new("milp", ResultStatus::Optimal);
    result.objective_value = Some(expected);
    result.solution = allocation.clone();
    result.resource_usage =
        compute_resource_usage(&allocation, &request.item_requirements, &request.resources);
    result.monte_carlo_compatible = Some(
        MonteCarloCompatible::new(
            allocation.clone(),
            selected.clone(),
            Vec::new(),
            format!(
                "Robust allocation outcome across {} scenarios",
                outcomes.len()
            ),
            format!(
                "Robust allocation under the {} criterion",
                criterion_label(request.robustness_criterion)
            ),
            None,
        )
        .with_expected_value(expected),
    );
    result.analytics = ToolAnalytics::Robust {
        selected_items: selected,
        robustness_metrics: RobustnessMetrics {
            criterion_used: criterion_label(request.robustness_criterion).to_string(),
            risk_tolerance: request.risk_tolerance,
            expected_outcome: expected,
            worst_case_outcome: worst,
            best_case_outcome: best_case,
            scenarios_meeting_threshold: meeting,
            outcome_std_dev: num::std_dev(&outcomes),
            outcome_percentiles: percentile_summary(&outcomes),
        },
        num_scenarios_evaluated: outcomes.len(),
        outcome_distribution: outcomes,
    };
    Ok(result)
}

fn criterion_label(criterion: RobustnessCriterion) -> &'static str {
    match criterion {
        RobustnessCriterion::BestAverage => "best_average",
        RobustnessCriterion::WorstCase => "worst_case",
        RobustnessCriterion::Percentile => "percentile",
    }
}

/// Deterministic candidate allocations obtained by optimizing a few distinct
/// value profiles
fn generate_candidates(
    request: &RobustRequest,
    item_names: &[String],
    scenarios: &[&IndexMap<String, f64>],
    sense: ObjectiveSense,
    options: &SolverOptions,
) -> Result<Vec<IndexMap<String, f64>>, OptimizeError> {
    let equal: IndexMap<String, f64> =
        item_names.iter().map(|name| (name.clone(), 1.0)).collect();
    let resource_weighted: IndexMap<String, f64> = request
        .item_requirements
        .iter()
        .map(|item| (item.name.clone(), item.requirements.values().sum()))
        .collect();
    let expected: IndexMap<String, f64> = item_names
        .iter()
        .map(|name| {
            let values: Vec<f64> = scenarios
                .iter()
                .map(|scenario| scenario.get(name).copied().unwrap_or(0.0))
                .collect();
            (name.clone(), num::mean(&values))
        })
        .collect();
    let pessimistic: IndexMap<String, f64> = item_names
        .iter()
        .map(|name| {
            let fold = match sense {
                ObjectiveSense::Maximize => f64::min,
                ObjectiveSense::Minimize => f64::max,
            };
            let start = match sense {
                ObjectiveSense::Maximize => f64::INFINITY,
                ObjectiveSense::Minimize => f64::NEG_INFINITY,
            };
            let value = scenarios
                .iter()
                .map(|scenario| scenario.get(name).copied().unwrap_or(0.0))
                .fold(start, fold);
            (name.clone(), value)
        })
        .collect();

    let mut candidates: Vec<IndexMap<String, f64>> = Vec::new();
    for values in [equal, expected, pessimistic, resource_weighted] {
        if let Some(allocation) = solve_candidate(request, item_names, &values, options)? {
            if !candidates.contains(&allocation) {
                candidates.push(allocation);
            }
        }
    }
    Ok(candidates)
}

/// Solve one candidate selection problem for a given value profile
fn solve_candidate(
    request: &RobustRequest,
    item_names: &[String],
    values: &IndexMap<String, f64>,
    options: &SolverOptions,
) -> Result<Option<IndexMap<String, f64>>, OptimizeError> {
    let mut problem = Problem::new(request.objective.sense());
    for name in item_names {
        problem.add_new_binary_variable(name)?;
    }
    for (name, value) in values {
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

    let solution = selector::dispatch(&problem, options)?;
    if !solution.is_feasible() {
        return Ok(None);
    }
    Ok(Some(
        item_names
            .iter()
            .map(|name| {
                let selected = solution.value_of(name) > 0.5;
                (name.clone(), if selected { 1.0 } else { 0.0 })
            })
            .collect(),
    ))
}

/// Outcome of an allocation in each scenario
fn evaluate_across_scenarios(
    allocation: &IndexMap<String, f64>,
    item_names: &[String],
    scenarios: &[&IndexMap<String, f64>],
) -> Vec<f64> {
    scenarios
        .iter()
        .map(|scenario| {
            item_names
                .iter()
                .map(|name| {
                    allocation.get(name).copied().unwrap_or(0.0)
                        * scenario.get(name).copied().unwrap_or(0.0)
                })
                .sum()
        })
        .collect()
}

/// Score an outcome distribution under the chosen criterion
fn robustness_score(
    outcomes: &[f64],
    criterion: RobustnessCriterion,
    risk_tolerance: f64,
    sense: ObjectiveSense,
) -> f64 {
    match criterion {
        RobustnessCriterion::BestAverage => num::mean(outcomes),
        RobustnessCriterion::WorstCase => match sense {
            ObjectiveSense::Maximize => outcomes.iter().cloned().fold(f64::INFINITY, f64::min),
            ObjectiveSense::Minimize => {
                outcomes.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            }
        },
        RobustnessCriterion::Percentile => {
            let pct = match sense {
                ObjectiveSense::Maximize => (1.0 - risk_tolerance) * 100.0,
                ObjectiveSense::Minimize => risk_tolerance * 100.0,
            };
            num::percentile(outcomes, pct)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_request;

    fn request_with(budget: f64, criterion: &str) -> RobustRequest {
        parse_request(&format!(
            r#"{{
                "objective": {{
                    "items": [{{"name": "a"}}, {{"name": "b"}}],
                    "sense": "maximize"
                }},
                "resources": {{"budget": {{"total": {budget}}}}},
                "item_requirements": [
                    {{"name": "a", "budget": 5}},
                    {{"name": "b", "budget": 5}}
                ],
                "monte_carlo_scenarios": {{
                    "scenarios": [
                        {{"a": 100.0, "b": 50.0}},
                        {{"a": 0.0, "b": 45.0}}
                    ]
                }},
                "robustness_criterion": "{criterion}"
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn a_generous_budget_selects_everything() {
        let result = optimize_robust(&request_with(10.0, "best_average")).unwrap();
        assert_eq!(result.status, ResultStatus::Optimal);
        assert!((result.solution["a"] - 1.0).abs() < 1e-9);
        assert!((result.solution["b"] - 1.0).abs() < 1e-9);
        match &result.analytics {
            ToolAnalytics::Robust {
                robustness_metrics,
                outcome_distribution,
                num_scenarios_evaluated,
                ..
            } => {
                assert_eq!(*num_scenarios_evaluated, 2);
                assert_eq!(outcome_distribution.len(), 2);
                assert!((robustness_metrics.expected_outcome - 97.5).abs() < 1e-9);
                assert!((robustness_metrics.worst_case_outcome - 45.0).abs() < 1e-9);
                assert!((robustness_metrics.best_case_outcome - 150.0).abs() < 1e-9);
            }
            other => panic!("expected robust analytics, got {other:?}"),
        }
    }

    #[test]
    fn the_worst_case_criterion_prefers_the_stable_item() {
        // Only one item fits. Item a averages higher but collapses to 0 in
        // the second scenario; b never drops below 45.
        let result = optimize_robust(&request_with(5.0, "worst_case")).unwrap();
        assert!((result.solution["b"] - 1.0).abs() < 1e-9);
        assert!((result.solution["a"]).abs() < 1e-9);
        match &result.analytics {
            ToolAnalytics::Robust {
                robustness_metrics, ..
            } => {
                assert!((robustness_metrics.worst_case_outcome - 45.0).abs() < 1e-9);
            }
            other => panic!("expected robust analytics, got {other:?}"),
        }
    }

    #[test]
    fn the_average_criterion_prefers_the_high_mean_item() {
        let result = optimize_robust(&request_with(5.0, "best_average")).unwrap();
        // a averages 50, b averages 47.5
        assert!((result.solution["a"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_scoring_reports_the_distribution() {
        let result = optimize_robust(&request_with(10.0, "percentile")).unwrap();
        assert_eq!(result.status, ResultStatus::Optimal);
        match &result.analytics {
            ToolAnalytics::Robust {
                robustness_metrics, ..
            } => {
                assert_eq!(robustness_metrics.criterion_used, "percentile");
                assert!(robustness_metrics.outcome_percentiles.contains_key("p50"));
            }
            other => panic!("expected robust analytics, got {other:?}"),
        }
    }

    #[test]
    fn empty_scenarios_fail_validation() {
        let mut request = request_with(10.0, "best_average");
        request.monte_carlo_scenarios.scenarios.clear();
        let error = optimize_robust(&request).unwrap_err();
        assert!(matches!(
            error,
            OptimizeError::Validation(ValidationError::EmptyCollection { .. })
        ));
    }
}
