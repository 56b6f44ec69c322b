//! Pareto frontier tool
//!
//! Sweeps a deterministic grid of scalarization weights over two or more
//! objectives (linear interpolation for two, a simplex lattice for more),
//! solves the weighted selection problem at each point, filters dominated
//! solutions with per objective senses, and recommends the knee point of the
//! surviving frontier.
use indexmap::IndexMap;
use log::debug;

use crate::io::monte_carlo;
use crate::io::request::{NamedObjectiveSpec, ParetoRequest};
use crate::io::validate;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::reformulate;
use crate::optimize::selector;
use crate::tools::result::{
    normal_assumption, FrontierPoint, MonteCarloCompatible, ObjectiveRange, OptimizationResult,
    RecommendedPoint, ResultStatus, SuccessCriteria, ToolAnalytics, TradeoffAnalysis,
    TradeoffRate,
};
use crate::tools::{request_options, OptimizeError};
use crate::utils::num;

/// Generate the Pareto frontier for competing objectives
pub fn optimize_pareto(request: &ParetoRequest) -> Result<OptimizationResult, OptimizeError> {
    validate::validate_pareto_objectives(&request.objectives)?;
    validate::validate_resources(&request.resources)?;
    validate::validate_item_requirements(&request.item_requirements, &request.resources)?;
    let item_names: Vec<String> = request
        .item_requirements
        .iter()
        .map(|item| item.name.clone())
        .collect();
    for objective in &request.objectives {
        for item in &objective.items {
            if !item_names.contains(&item.name) {
                return Err(validate::ValidationError::UnknownReference {
                    kind: "item",
                    name: item.name.clone(),
                    referenced_from: format!("objective '{}'", objective.name),
                }
                .into());
            }
        }
    }
    validate::validate_rules(&request.constraints, &item_names)?;
    if let Some(integration) = &request.monte_carlo_integration {
        validate::validate_mc_integration(integration)?;
    }

    // Per objective item values, with Monte Carlo overrides applied
    let mut objective_values: IndexMap<String, IndexMap<String, f64>> = IndexMap::new();
    for objective in &request.objectives {
        let mut values: IndexMap<String, f64> = objective
            .items
            .iter()
            .map(|item| (item.name.clone(), item.value.unwrap_or(0.0)))
            .collect();
        if let Some(integration) = &request.monte_carlo_integration {
            monte_carlo::apply_overrides(&mut values, integration)?;
        }
        objective_values.insert(objective.name.clone(), values);
    }

    let weight_sets = if request.objectives.len() == 2 {
        two_objective_weights(request.num_points)
    } else {
        simplex_lattice_weights(request.objectives.len(), request.num_points)
    };
    debug!(
        "pareto sweep: {} weight vectors over {} objectives",
        weight_sets.len(),
        request.objectives.len()
    );

    let mut points = Vec::new();
    for weights in &weight_sets {
        if let Some(point) =
            solve_scalarization(request, &item_names, &objective_values, weights)?
        {
            points.push(point);
        }
    }
    let frontier = filter_dominated(points, &request.objectives);

    if frontier.is_empty() {
        let mut result = OptimizationResult::new("milp", ResultStatus::Infeasible);
        result.message =
            Some("No feasible Pareto frontier found. Check constraints.".to_string());
        result.analytics = ToolAnalytics::Pareto {
            pareto_frontier: Vec::new(),
            num_frontier_points: 0,
            tradeoff_analysis: None,
            recommended_point: None,
        };
        return Ok(result);
    }

    let tradeoffs = analyze_tradeoffs(&frontier, &request.objectives);
    let knee_index = find_knee_point(&frontier, &request.objectives);
    let knee = &frontier[knee_index];
    let recommended = RecommendedPoint {
        index: knee_index,
        allocation: knee.allocation.clone(),
        objective_values: knee.objective_values.clone(),
        weights: knee.weights.clone(),
    };

    let mut result = OptimizationResult::new("milp", ResultStatus::Optimal);
    result.solution = knee.allocation.clone();
    result.resource_usage = crate::tools::result::compute_resource_usage(
        &knee.allocation,
        &request.item_requirements,
        &request.resources,
    );
    result.monte_carlo_compatible = Some(monte_carlo_block(
        &recommended,
        &request.objectives,
        &objective_values,
    ));
    result.analytics = ToolAnalytics::Pareto {
        num_frontier_points: frontier.len(),
        pareto_frontier: frontier,
        tradeoff_analysis: Some(tradeoffs),
        recommended_point: Some(recommended),
    };
    Ok(result)
}

/// Linear interpolation from (1, 0) to (0, 1)
fn two_objective_weights(num_points: usize) -> Vec<Vec<f64>> {
    let count = num_points.max(2);
    (0..count)
        .map(|i| {
            let second = i as f64 / (count - 1) as f64;
            vec![1.0 - second, second]
        })
        .collect()
}

/// Deterministic simplex lattice design for three or more objectives
///
/// Uses resolution `h ~ target^(1/n)` and, when the lattice overshoots the
/// requested count by more than half, subsamples at evenly spaced indices.
/// No random fill: sweeps must be reproducible.
fn simplex_lattice_weights(num_objectives: usize, target_points: usize) -> Vec<Vec<f64>> {
    let target_points = target_points.max(2);
    let h = ((target_points as f64).powf(1.0 / num_objectives as f64) as usize).max(2);
    let mut compositions = Vec::new();
    lattice_compositions(num_objectives, h, &mut Vec::new(), &mut compositions);
    let mut weights: Vec<Vec<f64>> = compositions
        .into_iter()
        .map(|point| point.into_iter().map(|v| v as f64 / h as f64).collect())
        .collect();
    if weights.len() > target_points + target_points / 2 {
        let last = weights.len() - 1;
        let picked: Vec<Vec<f64>> = (0..target_points)
            .map(|i| weights[i * last / (target_points - 1)].clone())
            .collect();
        weights = picked;
    }
    weights
}

fn lattice_compositions(
    dims: usize,
    remaining: usize,
    current: &mut Vec<usize>,
    results: &mut Vec<Vec<usize>>,
) {
    if current.len() == dims - 1 {
        let mut point = current.clone();
        point.push(remaining);
        results.push(point);
        return;
    }
    for value in 0..=remaining {
        current.push(value);
        lattice_compositions(dims, remaining - value, current, results);
        current.pop();
    }
}

/// Solve one weighted scalarization; None when that weight vector is
/// infeasible
fn solve_scalarization(
    request: &ParetoRequest,
    item_names: &[String],
    objective_values: &IndexMap<String, IndexMap<String, f64>>,
    weights: &[f64],
) -> Result<Option<FrontierPoint>, OptimizeError> {
    // All objectives are normalized to maximization: minimize objectives
    // contribute with negated values
    let mut combined: IndexMap<&str, f64> =
        item_names.iter().map(|name| (name.as_str(), 0.0)).collect();
    for (objective, weight) in request.objectives.iter().zip(weights) {
        let direction = match objective.sense {
            ObjectiveSense::Maximize => 1.0,
            ObjectiveSense::Minimize => -1.0,
        };
        for (name, value) in &objective_values[&objective.name] {
            *combined.get_mut(name.as_str()).expect("validated reference") +=
                weight * direction * value;
        }
    }

    let mut problem = Problem::new_maximization();
    for name in item_names {
        problem.add_new_binary_variable(name)?;
    }
    for (name, value) in &combined {
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

    let options = request_options(&request.solver_options);
    let solution = selector::dispatch(&problem, &options)?;
    if !solution.is_feasible() {
        return Ok(None);
    }

    let allocation: IndexMap<String, f64> = item_names
        .iter()
        .map(|name| {
            let selected = solution.value_of(name) > 0.5;
            (name.clone(), if selected { 1.0 } else { 0.0 })
        })
        .collect();
    let point_values: IndexMap<String, f64> = request
        .objectives
        .iter()
        .map(|objective| {
            let value: f64 = objective_values[&objective.name]
                .iter()
                .map(|(name, value)| value * allocation[name])
                .sum();
            (objective.name.clone(), value)
        })
        .collect();
    let point_weights: IndexMap<String, f64> = request
        .objectives
        .iter()
        .zip(weights)
        .map(|(objective, weight)| (objective.name.clone(), *weight))
        .collect();
    Ok(Some(FrontierPoint {
        weights: point_weights,
        allocation,
        objective_values: point_values,
        weighted_objective: solution.objective_value.unwrap_or(0.0),
    }))
}

/// Keep only non-dominated points, honoring each objective's own sense
fn filter_dominated(
    points: Vec<FrontierPoint>,
    objectives: &[NamedObjectiveSpec],
) -> Vec<FrontierPoint> {
    let dominates = |a: &FrontierPoint, b: &FrontierPoint| -> bool {
        let mut strictly_better = false;
        for objective in objectives {
            let (value_a, value_b) = (
                a.objective_values[&objective.name],
                b.objective_values[&objective.name],
            );
            let (better, worse) = match objective.sense {
                ObjectiveSense::Maximize => (value_a > value_b + 1e-9, value_a < value_b - 1e-9),
                ObjectiveSense::Minimize => (value_a < value_b - 1e-9, value_a > value_b + 1e-9),
            };
            if worse {
                return false;
            }
            if better {
                strictly_better = true;
            }
        }
        strictly_better
    };
    points
        .iter()
        .enumerate()
        .filter(|(i, point)| {
            !points
                .iter()
                .enumerate()
                .any(|(j, other)| *i != j && dominates(other, point))
        })
        .map(|(_, point)| point.clone())
        .collect()
}

/// Ranges per objective, pairwise substitution rates for two objectives, and
/// the count of distinct allocations
fn analyze_tradeoffs(
    frontier: &[FrontierPoint],
    objectives: &[NamedObjectiveSpec],
) -> TradeoffAnalysis {
    let mut ranges = IndexMap::new();
    for objective in objectives {
        let values: Vec<f64> = frontier
            .iter()
            .map(|p| p.objective_values[&objective.name])
            .collect();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        ranges.insert(
            objective.name.clone(),
            ObjectiveRange {
                min,
                max,
                range: max - min,
            },
        );
    }

    let mut rates = IndexMap::new();
    if objectives.len() == 2 {
        let first = &objectives[0].name;
        let second = &objectives[1].name;
        let mut sorted: Vec<&FrontierPoint> = frontier.iter().collect();
        sorted.sort_by(|a, b| {
            a.objective_values[first]
                .partial_cmp(&b.objective_values[first])
                .unwrap()
        });
        let slopes: Vec<f64> = sorted
            .windows(2)
            .filter_map(|pair| {
                let delta_first =
                    pair[1].objective_values[first] - pair[0].objective_values[first];
                let delta_second =
                    pair[1].objective_values[second] - pair[0].objective_values[second];
                (delta_first.abs() > 1e-6).then(|| delta_second / delta_first)
            })
            .collect();
        if !slopes.is_empty() {
            let mean = num::mean(&slopes);
            rates.insert(
                format!("{second}_per_{first}"),
                TradeoffRate {
                    mean,
                    min: slopes.iter().cloned().fold(f64::INFINITY, f64::min),
                    max: slopes.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    interpretation: format!(
                        "On average, gaining 1 unit of {first} costs {:.2} units of {second}",
                        mean.abs()
                    ),
                },
            );
        }
    }

    let mut distinct: Vec<&IndexMap<String, f64>> = Vec::new();
    for point in frontier {
        if !distinct.iter().any(|seen| **seen == point.allocation) {
            distinct.push(&point.allocation);
        }
    }
    TradeoffAnalysis {
        objective_ranges: ranges,
        tradeoff_rates: rates,
        num_unique_solutions: distinct.len(),
    }
}

/// The frontier point closest to the normalized ideal: every objective
/// rescaled so 1.0 is its best frontier value under its own sense
fn find_knee_point(frontier: &[FrontierPoint], objectives: &[NamedObjectiveSpec]) -> usize {
    let mut best_index = 0;
    let mut best_distance = f64::INFINITY;
    for (index, point) in frontier.iter().enumerate() {
        let mut distance = 0.0;
        for objective in objectives {
            let values: Vec<f64> = frontier
                .iter()
                .map(|p| p.objective_values[&objective.name])
                .collect();
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            let normalized = if range > 1e-6 {
                let raw = (point.objective_values[&objective.name] - min) / range;
                match objective.sense {
                    ObjectiveSense::Maximize => raw,
                    ObjectiveSense::Minimize => 1.0 - raw,
                }
            } else {
                0.5
            };
            distance += (normalized - 1.0) * (normalized - 1.0);
        }
        let distance = distance.sqrt();
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        }
    }
    best_index
}

fn monte_carlo_block(
    recommended: &RecommendedPoint,
    objectives: &[NamedObjectiveSpec],
    objective_values: &IndexMap<String, IndexMap<String, f64>>,
) -> MonteCarloCompatible {
    let selected: Vec<String> = recommended
        .allocation
        .iter()
        .filter(|(_, value)| **value > 0.5)
        .map(|(name, _)| name.clone())
        .collect();
    let mut assumptions = Vec::new();
    for objective in objectives {
        for name in &selected {
            if let Some(value) = objective_values[&objective.name].get(name) {
                assumptions.push(normal_assumption(
                    format!("{name}_{}", objective.name),
                    *value,
                    0.15,
                ));
            }
        }
    }
    let summary = objectives
        .iter()
        .map(|objective| {
            format!(
                "{}={:.1}",
                objective.name, recommended.objective_values[&objective.name]
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    let total: f64 = recommended.objective_values.values().sum();
    MonteCarloCompatible::new(
        recommended.allocation.clone(),
        selected.clone(),
        assumptions,
        format!(
            "Multi-objective optimization: {summary} for selected items: [{}]",
            selected.join(", ")
        ),
        "Pareto multi-objective optimization (balanced solution)".to_string(),
        Some(SuccessCriteria {
            threshold: total * 0.9,
            comparison: ">=".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_request;

    fn two_project_request() -> ParetoRequest {
        parse_request(
            r#"{
                "objectives": [
                    {
                        "name": "profit",
                        "sense": "maximize",
                        "items": [
                            {"name": "project_a", "value": 125000},
                            {"name": "project_b", "value": 87000}
                        ]
                    },
                    {
                        "name": "sustainability",
                        "sense": "maximize",
                        "items": [
                            {"name": "project_a", "value": 75},
                            {"name": "project_b", "value": 92}
                        ]
                    }
                ],
                "resources": {"budget": {"total": 100000}},
                "item_requirements": [
                    {"name": "project_a", "budget": 60000},
                    {"name": "project_b", "budget": 45000}
                ],
                "num_points": 11
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn frontier_points_are_mutually_non_dominated() {
        let result = optimize_pareto(&two_project_request()).unwrap();
        assert_eq!(result.status, ResultStatus::Optimal);
        match &result.analytics {
            ToolAnalytics::Pareto {
                pareto_frontier,
                tradeoff_analysis,
                recommended_point,
                ..
            } => {
                assert!(!pareto_frontier.is_empty());
                // the budget admits only one project at a time, so exactly
                // two distinct selections survive
                assert_eq!(
                    tradeoff_analysis.as_ref().unwrap().num_unique_solutions,
                    2
                );
                for a in pareto_frontier {
                    for b in pareto_frontier {
                        let a_beats_b = a.objective_values["profit"]
                            > b.objective_values["profit"] + 1e-9
                            && a.objective_values["sustainability"]
                                > b.objective_values["sustainability"] + 1e-9;
                        assert!(!a_beats_b, "frontier contains a dominated point");
                    }
                }
                let recommended = recommended_point.as_ref().unwrap();
                let weight_total: f64 = recommended.weights.values().sum();
                assert!((weight_total - 1.0).abs() < 1e-9);
            }
            other => panic!("expected pareto analytics, got {other:?}"),
        }
    }

    #[test]
    fn mixed_senses_keep_both_extremes() {
        let request: ParetoRequest = parse_request(
            r#"{
                "objectives": [
                    {
                        "name": "profit",
                        "sense": "maximize",
                        "items": [{"name": "a", "value": 100}, {"name": "b", "value": 90}]
                    },
                    {
                        "name": "cost",
                        "sense": "minimize",
                        "items": [{"name": "a", "value": 50}, {"name": "b", "value": 10}]
                    }
                ],
                "resources": {"slots": {"total": 1}},
                "item_requirements": [
                    {"name": "a", "slots": 1},
                    {"name": "b", "slots": 1}
                ],
                "num_points": 5
            }"#,
        )
        .unwrap();
        let result = optimize_pareto(&request).unwrap();
        match &result.analytics {
            ToolAnalytics::Pareto {
                tradeoff_analysis, ..
            } => {
                // a is better on profit, b on cost: both selections survive
                assert_eq!(
                    tradeoff_analysis.as_ref().unwrap().num_unique_solutions,
                    2
                );
            }
            other => panic!("expected pareto analytics, got {other:?}"),
        }
    }

    #[test]
    fn lattice_weights_sum_to_one() {
        let weights = simplex_lattice_weights(3, 20);
        assert!(!weights.is_empty());
        for vector in &weights {
            assert_eq!(vector.len(), 3);
            let total: f64 = vector.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!(vector.iter().all(|w| *w >= 0.0));
        }
    }

    #[test]
    fn interpolated_weights_cover_both_endpoints() {
        let weights = two_objective_weights(5);
        assert_eq!(weights.len(), 5);
        assert!((weights[0][0] - 1.0).abs() < 1e-12);
        assert!((weights[4][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn infeasible_sweeps_produce_an_infeasible_result() {
        let request: ParetoRequest = parse_request(
            r#"{
                "objectives": [
                    {"name": "x", "sense": "maximize", "items": [{"name": "a", "value": 1}]},
                    {"name": "y", "sense": "maximize", "items": [{"name": "a", "value": 2}]}
                ],
                "resources": {"budget": {"total": 1}},
                "item_requirements": [{"name": "a", "budget": 5}],
                "constraints": [{"type": "min", "items": ["a"], "limit": 1}],
                "num_points": 3
            }"#,
        )
        .unwrap();
        let result = optimize_pareto(&request).unwrap();
        assert_eq!(result.status, ResultStatus::Infeasible);
    }
}
