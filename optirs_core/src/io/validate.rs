//! Input validation for every tool
//!
//! All structural checks run here, before any model is built or any solver is
//! invoked: required fields, name uniqueness, cross reference resolution,
//! numeric domains, and weight/probability sums. Each failure names the
//! offending field. Validation is pure, so validating the same input twice
//! yields the same decision and the same error.
use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::io::request::{
    AssetSpec, ColumnSpec, FirstStageSpec, ItemRequirementSpec, MasterProblemSpec,
    McIntegrationSpec, McMode, NamedObjectiveSpec, NetworkSpec, ObjectiveItemSpec, ObjectiveSpec,
    PricingProblemSpec, ProblemDefinitionSpec, ResourceSpec, RuleSpec, ScenarioSpec,
    ScheduleRuleSpec, SecondStageSpec, TaskSpec, WeightedObjectiveSpec,
};
use crate::utils::num;

/// Tolerance on multi-objective weight sums and scenario probability sums
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// A structural problem in the input, reported before any solve is attempted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field is absent for the requested mode of operation
    #[error("missing required field '{field}' in {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },
    /// Two entities of the same kind share a name
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    /// A name points at an entity that is not part of the declared universe
    #[error("unknown {kind} '{name}' referenced from {referenced_from}")]
    UnknownReference {
        kind: &'static str,
        name: String,
        referenced_from: String,
    },
    /// A collection that must carry entries is empty
    #[error("{context} must not be empty")]
    EmptyCollection { context: &'static str },
    /// Too few entries for the requested mode of operation
    #[error("{context} requires at least {minimum} entries, got {actual}")]
    TooFew {
        context: &'static str,
        minimum: usize,
        actual: usize,
    },
    /// A numeric field is NaN or infinite
    #[error("field '{field}' must be a finite number, got {value}")]
    NonFinite { field: String, value: f64 },
    /// A numeric field is outside its documented domain
    #[error("field '{field}' must be {requirement}, got {value}")]
    OutOfRange {
        field: String,
        requirement: &'static str,
        value: f64,
    },
    /// Multi-objective weights do not sum to 1
    #[error("multi-objective weights must sum to 1.0 within {WEIGHT_SUM_TOLERANCE}, got {sum:.4}")]
    WeightSum { sum: f64 },
    /// Scenario probabilities do not sum to 1
    #[error(
        "scenario probabilities must sum to 1.0 within {WEIGHT_SUM_TOLERANCE}, got {sum:.4}"
    )]
    ProbabilitySum { sum: f64 },
    /// Covariance matrix dimensions do not match the asset count
    #[error(
        "covariance matrix must be {expected}x{expected} to match the asset count, \
         got {rows}x{cols}"
    )]
    CovarianceShape {
        rows: usize,
        cols: usize,
        expected: usize,
    },
    /// Task dependencies form a cycle
    #[error("task dependencies contain a cycle through '{task}'")]
    CyclicDependency { task: String },
    /// An unknown percentile label
    #[error("invalid percentile '{value}'; must be one of p10, p25, p50, p75, p90")]
    InvalidPercentile { value: String },
}

fn ensure_finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            field: field.to_string(),
            value,
        })
    }
}

fn ensure_non_negative(field: &str, value: f64) -> Result<(), ValidationError> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            requirement: "non-negative",
            value,
        });
    }
    Ok(())
}

fn ensure_unique<'a, I>(kind: &'static str, names: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashMap<&str, ()> = HashMap::new();
    for name in names {
        if seen.insert(name, ()).is_some() {
            return Err(ValidationError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

// region Objectives

/// Validate a single or multi objective specification
///
/// `require_values` is false for tools that take item values from elsewhere
/// (robust optimization reads them from scenarios).
pub fn validate_objective(
    objective: &ObjectiveSpec,
    require_values: bool,
) -> Result<(), ValidationError> {
    match objective {
        ObjectiveSpec::Single { items, .. } => {
            validate_objective_items("objective items", items, require_values)
        }
        ObjectiveSpec::Multi { functions, .. } => validate_weighted_functions(functions),
    }
}

fn validate_objective_items(
    context: &'static str,
    items: &[ObjectiveItemSpec],
    require_values: bool,
) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyCollection { context });
    }
    ensure_unique("objective item", items.iter().map(|i| i.name.as_str()))?;
    for item in items {
        match item.value {
            Some(value) => ensure_finite(&format!("value of item '{}'", item.name), value)?,
            None if require_values => {
                return Err(ValidationError::MissingField {
                    field: "value",
                    context: "objective item",
                });
            }
            None => {}
        }
    }
    Ok(())
}

fn validate_weighted_functions(
    functions: &[WeightedObjectiveSpec],
) -> Result<(), ValidationError> {
    if functions.len() < 2 {
        return Err(ValidationError::TooFew {
            context: "multi-objective functions",
            minimum: 2,
            actual: functions.len(),
        });
    }
    ensure_unique(
        "objective function",
        functions.iter().map(|f| f.name.as_str()),
    )?;
    let mut sum = 0.0;
    for function in functions {
        let field = format!("weight of function '{}'", function.name);
        ensure_finite(&field, function.weight)?;
        if !(0.0..=1.0).contains(&function.weight) {
            return Err(ValidationError::OutOfRange {
                field,
                requirement: "between 0 and 1",
                value: function.weight,
            });
        }
        sum += function.weight;
        validate_objective_items("objective function items", &function.items, true)?;
    }
    if !num::approx_eq(sum, 1.0, WEIGHT_SUM_TOLERANCE) {
        return Err(ValidationError::WeightSum { sum });
    }
    Ok(())
}

/// Validate the objective list of a Pareto request
pub fn validate_pareto_objectives(
    objectives: &[NamedObjectiveSpec],
) -> Result<(), ValidationError> {
    if objectives.len() < 2 {
        return Err(ValidationError::TooFew {
            context: "pareto objectives",
            minimum: 2,
            actual: objectives.len(),
        });
    }
    ensure_unique("objective", objectives.iter().map(|o| o.name.as_str()))?;
    for objective in objectives {
        validate_objective_items("pareto objective items", &objective.items, true)?;
    }
    Ok(())
}

// endregion Objectives

// region Resources and items

/// Validate resource capacities
pub fn validate_resources(
    resources: &IndexMap<String, ResourceSpec>,
) -> Result<(), ValidationError> {
    for (name, resource) in resources {
        ensure_non_negative(&format!("total of resource '{name}'"), resource.total)?;
    }
    Ok(())
}

/// Validate item requirements against the declared resources
pub fn validate_item_requirements(
    items: &[ItemRequirementSpec],
    resources: &IndexMap<String, ResourceSpec>,
) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyCollection {
            context: "item requirements",
        });
    }
    ensure_unique("item", items.iter().map(|i| i.name.as_str()))?;
    for item in items {
        for (resource_name, amount) in &item.requirements {
            if !resources.contains_key(resource_name) {
                return Err(ValidationError::UnknownReference {
                    kind: "resource",
                    name: resource_name.clone(),
                    referenced_from: format!("item '{}'", item.name),
                });
            }
            ensure_non_negative(
                &format!("requirement of item '{}' for '{resource_name}'", item.name),
                *amount,
            )?;
        }
    }
    Ok(())
}

/// Check that every item named by an objective exists in the item universe
pub fn validate_objective_references(
    objective: &ObjectiveSpec,
    universe: &[String],
) -> Result<(), ValidationError> {
    let items: Vec<&ObjectiveItemSpec> = match objective {
        ObjectiveSpec::Single { items, .. } => items.iter().collect(),
        ObjectiveSpec::Multi { functions, .. } => {
            functions.iter().flat_map(|f| f.items.iter()).collect()
        }
    };
    for item in items {
        if !universe.iter().any(|name| name == &item.name) {
            return Err(ValidationError::UnknownReference {
                kind: "item",
                name: item.name.clone(),
                referenced_from: "objective".to_string(),
            });
        }
    }
    Ok(())
}

// endregion Resources and items

// region Business rules

/// Validate business rules against the item universe
///
/// Unknown item references are hard errors here, never silently skipped;
/// silently dropping unresolved names was a recurring source of wrong
/// answers in dict based ancestors of this interface.
pub fn validate_rules(rules: &[RuleSpec], universe: &[String]) -> Result<(), ValidationError> {
    let known = |name: &String| universe.contains(name);
    for (index, rule) in rules.iter().enumerate() {
        let referenced_from = format!("constraint {index}");
        match rule {
            RuleSpec::Min { items, limit, .. } | RuleSpec::Max { items, limit, .. } => {
                if items.is_empty() {
                    return Err(ValidationError::EmptyCollection {
                        context: "constraint items",
                    });
                }
                ensure_finite(&format!("limit of constraint {index}"), *limit)?;
                for item in items {
                    if !known(item) {
                        return Err(ValidationError::UnknownReference {
                            kind: "item",
                            name: item.clone(),
                            referenced_from: referenced_from.clone(),
                        });
                    }
                }
            }
            RuleSpec::Conditional {
                condition_item,
                then_item,
                ..
            } => {
                for item in [condition_item, then_item] {
                    if !known(item) {
                        return Err(ValidationError::UnknownReference {
                            kind: "item",
                            name: item.clone(),
                            referenced_from: referenced_from.clone(),
                        });
                    }
                }
            }
            RuleSpec::Disjunctive { items, .. } | RuleSpec::Mutex { items, .. } => {
                if items.is_empty() {
                    return Err(ValidationError::EmptyCollection {
                        context: "constraint items",
                    });
                }
                for item in items {
                    if !known(item) {
                        return Err(ValidationError::UnknownReference {
                            kind: "item",
                            name: item.clone(),
                            referenced_from: referenced_from.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

// endregion Business rules

// region Scheduling

/// Validate tasks: uniqueness, durations, dependency resolution and
/// acyclicity, resource references
pub fn validate_tasks(
    tasks: &[TaskSpec],
    time_horizon: u32,
    resources: &IndexMap<String, ResourceSpec>,
) -> Result<(), ValidationError> {
    if tasks.is_empty() {
        return Err(ValidationError::EmptyCollection { context: "tasks" });
    }
    if time_horizon == 0 {
        return Err(ValidationError::OutOfRange {
            field: "time_horizon".to_string(),
            requirement: "positive",
            value: 0.0,
        });
    }
    ensure_unique("task", tasks.iter().map(|t| t.name.as_str()))?;

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut node_of: IndexMap<&str, NodeIndex> = IndexMap::new();
    for task in tasks {
        let node = graph.add_node(task.name.as_str());
        node_of.insert(task.name.as_str(), node);
    }
    for task in tasks {
        if task.duration == 0 {
            return Err(ValidationError::OutOfRange {
                field: format!("duration of task '{}'", task.name),
                requirement: "positive",
                value: 0.0,
            });
        }
        if task.duration > time_horizon {
            return Err(ValidationError::OutOfRange {
                field: format!("duration of task '{}'", task.name),
                requirement: "within the time horizon",
                value: task.duration as f64,
            });
        }
        ensure_finite(&format!("value of task '{}'", task.name), task.value)?;
        for dependency in &task.dependencies {
            let Some(&dep_node) = node_of.get(dependency.as_str()) else {
                return Err(ValidationError::UnknownReference {
                    kind: "task",
                    name: dependency.clone(),
                    referenced_from: format!("dependencies of task '{}'", task.name),
                });
            };
            graph.add_edge(dep_node, node_of[task.name.as_str()], ());
        }
        for (resource_name, amount) in &task.resources {
            if !resources.contains_key(resource_name) {
                return Err(ValidationError::UnknownReference {
                    kind: "resource",
                    name: resource_name.clone(),
                    referenced_from: format!("task '{}'", task.name),
                });
            }
            ensure_non_negative(
                &format!("requirement of task '{}' for '{resource_name}'", task.name),
                *amount,
            )?;
        }
    }
    if let Err(cycle) = toposort(&graph, None) {
        return Err(ValidationError::CyclicDependency {
            task: graph[cycle.node_id()].to_string(),
        });
    }
    Ok(())
}

/// Validate temporal schedule rules against the task set
pub fn validate_schedule_rules(
    rules: &[ScheduleRuleSpec],
    tasks: &[TaskSpec],
) -> Result<(), ValidationError> {
    for (index, rule) in rules.iter().enumerate() {
        match rule {
            ScheduleRuleSpec::Deadline { task, .. } | ScheduleRuleSpec::Release { task, .. } => {
                if !tasks.iter().any(|t| &t.name == task) {
                    return Err(ValidationError::UnknownReference {
                        kind: "task",
                        name: task.clone(),
                        referenced_from: format!("constraint {index}"),
                    });
                }
            }
            ScheduleRuleSpec::ParallelLimit { limit } => {
                if *limit == 0 {
                    return Err(ValidationError::OutOfRange {
                        field: format!("limit of constraint {index}"),
                        requirement: "positive",
                        value: 0.0,
                    });
                }
            }
        }
    }
    Ok(())
}

// endregion Scheduling

// region Portfolio

/// Validate assets and the covariance matrix shape
pub fn validate_assets(
    assets: &[AssetSpec],
    covariance: &[Vec<f64>],
) -> Result<(), ValidationError> {
    if assets.len() < 2 {
        return Err(ValidationError::TooFew {
            context: "assets",
            minimum: 2,
            actual: assets.len(),
        });
    }
    ensure_unique("asset", assets.iter().map(|a| a.name.as_str()))?;
    for asset in assets {
        ensure_finite(
            &format!("expected_return of asset '{}'", asset.name),
            asset.expected_return,
        )?;
    }
    let n = assets.len();
    if covariance.len() != n || covariance.iter().any(|row| row.len() != n) {
        let cols = covariance.first().map(|row| row.len()).unwrap_or(0);
        return Err(ValidationError::CovarianceShape {
            rows: covariance.len(),
            cols,
            expected: n,
        });
    }
    for (i, row) in covariance.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            ensure_finite(&format!("covariance_matrix[{i}][{j}]"), *value)?;
        }
    }
    Ok(())
}

// endregion Portfolio

// region Network

/// Validate network structure: node uniqueness, edge endpoint resolution,
/// numeric domains
///
/// Supply/demand balance is deliberately *not* checked here: an imbalanced
/// min-cost problem is a legitimate input whose answer is an infeasible
/// result naming the totals, not a validation failure.
pub fn validate_network(network: &NetworkSpec) -> Result<(), ValidationError> {
    if network.nodes.is_empty() {
        return Err(ValidationError::EmptyCollection {
            context: "network nodes",
        });
    }
    if network.edges.is_empty() {
        return Err(ValidationError::EmptyCollection {
            context: "network edges",
        });
    }
    ensure_unique("node", network.nodes.iter().map(|n| n.id.as_str()))?;
    for node in &network.nodes {
        ensure_non_negative(&format!("supply of node '{}'", node.id), node.supply)?;
        ensure_non_negative(&format!("demand of node '{}'", node.id), node.demand)?;
    }
    let known = |id: &String| network.nodes.iter().any(|n| &n.id == id);
    for (index, edge) in network.edges.iter().enumerate() {
        for endpoint in [&edge.from, &edge.to] {
            if !known(endpoint) {
                return Err(ValidationError::UnknownReference {
                    kind: "node",
                    name: endpoint.clone(),
                    referenced_from: format!("edge {index}"),
                });
            }
        }
        if let Some(capacity) = edge.capacity {
            ensure_non_negative(&format!("capacity of edge {index}"), capacity)?;
        }
        ensure_finite(&format!("cost of edge {index}"), edge.cost)?;
    }
    ensure_unique(
        "edge",
        network
            .edges
            .iter()
            .map(|e| e.name.as_deref().unwrap_or(""))
            .filter(|name| !name.is_empty()),
    )?;
    Ok(())
}

// endregion Network

// region Stochastic

/// Validate the two stage structure and scenario probabilities
pub fn validate_stochastic(
    first_stage: &FirstStageSpec,
    second_stage: &SecondStageSpec,
    scenarios: &[ScenarioSpec],
    risk_parameter: f64,
) -> Result<(), ValidationError> {
    if first_stage.decisions.is_empty() {
        return Err(ValidationError::EmptyCollection {
            context: "first stage decisions",
        });
    }
    if second_stage.decisions.is_empty() {
        return Err(ValidationError::EmptyCollection {
            context: "second stage decisions",
        });
    }
    ensure_unique(
        "decision",
        first_stage
            .decisions
            .iter()
            .chain(&second_stage.decisions)
            .map(|d| d.name.as_str()),
    )?;
    for decision in first_stage.decisions.iter().chain(&second_stage.decisions) {
        ensure_finite(&format!("cost of decision '{}'", decision.name), decision.cost)?;
    }
    validate_scenarios(scenarios)?;
    if !(0.0 < risk_parameter && risk_parameter < 1.0) {
        return Err(ValidationError::OutOfRange {
            field: "risk_parameter".to_string(),
            requirement: "strictly between 0 and 1",
            value: risk_parameter,
        });
    }
    Ok(())
}

/// Validate scenario names, parameters, and probability mass
pub fn validate_scenarios(scenarios: &[ScenarioSpec]) -> Result<(), ValidationError> {
    if scenarios.is_empty() {
        return Err(ValidationError::EmptyCollection { context: "scenarios" });
    }
    ensure_unique("scenario", scenarios.iter().map(|s| s.name.as_str()))?;
    let uniform = 1.0 / scenarios.len() as f64;
    let mut sum = 0.0;
    for scenario in scenarios {
        let probability = scenario.probability.unwrap_or(uniform);
        let field = format!("probability of scenario '{}'", scenario.name);
        ensure_finite(&field, probability)?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(ValidationError::OutOfRange {
                field,
                requirement: "between 0 and 1",
                value: probability,
            });
        }
        sum += probability;
        for (name, value) in &scenario.parameters {
            ensure_finite(
                &format!("parameter '{name}' of scenario '{}'", scenario.name),
                *value,
            )?;
        }
    }
    if !num::approx_eq(sum, 1.0, WEIGHT_SUM_TOLERANCE) {
        return Err(ValidationError::ProbabilitySum { sum });
    }
    Ok(())
}

// endregion Stochastic

// region Column generation

/// Validate the master problem, pricing problem, and explicit columns
pub fn validate_column_gen(
    master: &MasterProblemSpec,
    pricing: &PricingProblemSpec,
    columns: &[ColumnSpec],
) -> Result<(), ValidationError> {
    if master.constraints.is_empty() {
        return Err(ValidationError::EmptyCollection {
            context: "master problem constraints",
        });
    }
    ensure_unique(
        "master constraint",
        master.constraints.iter().map(|c| c.name.as_str()),
    )?;
    for constraint in &master.constraints {
        ensure_finite(&format!("rhs of constraint '{}'", constraint.name), constraint.rhs)?;
    }
    let known = |name: &String| master.constraints.iter().any(|c| &c.name == name);
    if let PricingProblemSpec::Knapsack {
        capacity, items, ..
    } = pricing
    {
        ensure_non_negative("pricing capacity", *capacity)?;
        if items.is_empty() {
            return Err(ValidationError::EmptyCollection {
                context: "pricing items",
            });
        }
        for item in items {
            if item.size <= 0.0 || !item.size.is_finite() {
                return Err(ValidationError::OutOfRange {
                    field: format!("size of pricing item '{}'", item.name),
                    requirement: "positive",
                    value: item.size,
                });
            }
            if !known(&item.name) {
                return Err(ValidationError::UnknownReference {
                    kind: "master constraint",
                    name: item.name.clone(),
                    referenced_from: "pricing items".to_string(),
                });
            }
        }
    }
    ensure_unique("column", columns.iter().map(|c| c.id.as_str()))?;
    for column in columns {
        ensure_finite(&format!("cost of column '{}'", column.id), column.cost)?;
        for name in column.coefficients.keys() {
            if !known(name) {
                return Err(ValidationError::UnknownReference {
                    kind: "master constraint",
                    name: name.clone(),
                    referenced_from: format!("column '{}'", column.id),
                });
            }
        }
    }
    Ok(())
}

// endregion Column generation

// region Execute

/// Validate a custom problem definition
pub fn validate_problem_definition(
    definition: &ProblemDefinitionSpec,
) -> Result<(), ValidationError> {
    if definition.variables.is_empty() {
        return Err(ValidationError::EmptyCollection { context: "variables" });
    }
    ensure_unique(
        "variable",
        definition.variables.iter().map(|v| v.name.as_str()),
    )?;
    for variable in &definition.variables {
        if let Some((lower, upper)) = &variable.bounds {
            if let Some(lower) = lower {
                ensure_finite(&format!("lower bound of '{}'", variable.name), *lower)?;
            }
            if let Some(upper) = upper {
                ensure_finite(&format!("upper bound of '{}'", variable.name), *upper)?;
            }
            if let (Some(lower), Some(upper)) = (lower, upper) {
                if lower > upper {
                    return Err(ValidationError::OutOfRange {
                        field: format!("bounds of '{}'", variable.name),
                        requirement: "lower <= upper",
                        value: *lower,
                    });
                }
            }
        }
    }
    let known = |name: &String| definition.variables.iter().any(|v| &v.name == name);
    for (name, value) in &definition.objective.coefficients {
        if !known(name) {
            return Err(ValidationError::UnknownReference {
                kind: "variable",
                name: name.clone(),
                referenced_from: "objective coefficients".to_string(),
            });
        }
        ensure_finite(&format!("objective coefficient of '{name}'"), *value)?;
    }
    for term in &definition.objective.quadratic {
        for name in [&term.var1, &term.var2] {
            if !known(name) {
                return Err(ValidationError::UnknownReference {
                    kind: "variable",
                    name: name.clone(),
                    referenced_from: "quadratic objective terms".to_string(),
                });
            }
        }
        ensure_finite("quadratic coefficient", term.coef)?;
    }
    for (index, constraint) in definition.constraints.iter().enumerate() {
        ensure_finite(&format!("rhs of constraint {index}"), constraint.rhs)?;
        for name in constraint.coefficients.keys() {
            if !known(name) {
                return Err(ValidationError::UnknownReference {
                    kind: "variable",
                    name: name.clone(),
                    referenced_from: format!("constraint {index}"),
                });
            }
        }
    }
    Ok(())
}

// endregion Execute

// region Monte Carlo

const VALID_PERCENTILES: [&str; 5] = ["p10", "p25", "p50", "p75", "p90"];

/// Validate a Monte Carlo integration block
pub fn validate_mc_integration(spec: &McIntegrationSpec) -> Result<(), ValidationError> {
    match spec.mode {
        McMode::Percentile => {
            if let Some(percentile) = &spec.percentile {
                let normalized = percentile.to_lowercase();
                if !VALID_PERCENTILES.contains(&normalized.as_str()) {
                    return Err(ValidationError::InvalidPercentile {
                        value: percentile.clone(),
                    });
                }
            }
            if spec.mc_output.percentiles.is_none() {
                return Err(ValidationError::MissingField {
                    field: "percentiles",
                    context: "monte carlo output",
                });
            }
        }
        McMode::Expected | McMode::Scenarios => {
            if spec.mc_output.expected_outcome.is_none()
                && spec.mc_output.percentiles.is_none()
                && spec.mc_output.scenarios.is_none()
            {
                return Err(ValidationError::MissingField {
                    field: "expected_outcome",
                    context: "monte carlo output",
                });
            }
        }
    }
    Ok(())
}

// endregion Monte Carlo

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::request::{EdgeSpec, NodeSpec};

    fn resources_with_budget() -> IndexMap<String, ResourceSpec> {
        let mut resources = IndexMap::new();
        resources.insert("budget".to_string(), ResourceSpec { total: 100.0 });
        resources
    }

    fn multi_objective(weights: &[f64]) -> ObjectiveSpec {
        ObjectiveSpec::Multi {
            sense: crate::optimize::objective::ObjectiveSense::Maximize,
            functions: weights
                .iter()
                .enumerate()
                .map(|(i, w)| WeightedObjectiveSpec {
                    name: format!("f{i}"),
                    weight: *w,
                    items: vec![ObjectiveItemSpec {
                        name: "a".to_string(),
                        value: Some(1.0),
                    }],
                })
                .collect(),
        }
    }

    #[test]
    fn weight_sum_is_enforced_within_tolerance() {
        // 0.505 + 0.504 = 1.009 is inside the 0.01 band
        assert!(validate_objective(&multi_objective(&[0.505, 0.504]), true).is_ok());
        // 0.52 + 0.50 = 1.02 is outside
        let result = validate_objective(&multi_objective(&[0.52, 0.50]), true);
        assert!(matches!(result, Err(ValidationError::WeightSum { .. })));
        // A single function is rejected regardless of weights
        let result = validate_objective(&multi_objective(&[1.0]), true);
        assert!(matches!(result, Err(ValidationError::TooFew { .. })));
    }

    #[test]
    fn validation_is_idempotent() {
        let objective = multi_objective(&[0.7, 0.4]);
        let first = validate_objective(&objective, true);
        let second = validate_objective(&objective, true);
        assert_eq!(first, second);
    }

    #[test]
    fn item_requirements_must_reference_known_resources() {
        let items = vec![ItemRequirementSpec {
            name: "a".to_string(),
            requirements: IndexMap::from([("compute".to_string(), 5.0)]),
        }];
        let result = validate_item_requirements(&items, &resources_with_budget());
        match result {
            Err(ValidationError::UnknownReference { kind, name, .. }) => {
                assert_eq!(kind, "resource");
                assert_eq!(name, "compute");
            }
            other => panic!("expected unknown reference, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_item_names_are_rejected() {
        let items = vec![
            ItemRequirementSpec {
                name: "a".to_string(),
                requirements: IndexMap::new(),
            },
            ItemRequirementSpec {
                name: "a".to_string(),
                requirements: IndexMap::new(),
            },
        ];
        let result = validate_item_requirements(&items, &resources_with_budget());
        assert!(matches!(result, Err(ValidationError::DuplicateName { .. })));
    }

    #[test]
    fn rules_must_reference_known_items() {
        let universe = vec!["a".to_string(), "b".to_string()];
        let rule = RuleSpec::Conditional {
            condition_item: "a".to_string(),
            then_item: "ghost".to_string(),
            description: None,
        };
        let result = validate_rules(&[rule], &universe);
        assert!(matches!(
            result,
            Err(ValidationError::UnknownReference { .. })
        ));
    }

    #[test]
    fn cyclic_task_dependencies_are_rejected() {
        let tasks = vec![
            TaskSpec {
                name: "a".to_string(),
                duration: 1,
                value: 0.0,
                dependencies: vec!["b".to_string()],
                resources: IndexMap::new(),
            },
            TaskSpec {
                name: "b".to_string(),
                duration: 1,
                value: 0.0,
                dependencies: vec!["a".to_string()],
                resources: IndexMap::new(),
            },
        ];
        let result = validate_tasks(&tasks, 10, &IndexMap::new());
        assert!(matches!(
            result,
            Err(ValidationError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn task_durations_must_fit_the_horizon() {
        let tasks = vec![TaskSpec {
            name: "long".to_string(),
            duration: 20,
            value: 0.0,
            dependencies: vec![],
            resources: IndexMap::new(),
        }];
        let result = validate_tasks(&tasks, 10, &IndexMap::new());
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn covariance_shape_must_match_asset_count() {
        let assets = vec![
            AssetSpec {
                name: "a".to_string(),
                expected_return: 0.1,
            },
            AssetSpec {
                name: "b".to_string(),
                expected_return: 0.05,
            },
            AssetSpec {
                name: "c".to_string(),
                expected_return: 0.02,
            },
        ];
        let covariance = vec![vec![0.04, 0.01], vec![0.01, 0.02]];
        let result = validate_assets(&assets, &covariance);
        match result {
            Err(ValidationError::CovarianceShape { rows, expected, .. }) => {
                assert_eq!(rows, 2);
                assert_eq!(expected, 3);
            }
            other => panic!("expected covariance shape error, got {other:?}"),
        }
    }

    #[test]
    fn network_edges_must_resolve_and_balance_is_not_required() {
        let network = NetworkSpec {
            nodes: vec![
                NodeSpec {
                    id: "a".to_string(),
                    supply: 10.0,
                    demand: 0.0,
                },
                NodeSpec {
                    id: "b".to_string(),
                    supply: 0.0,
                    demand: 4.0,
                },
            ],
            edges: vec![EdgeSpec {
                from: "a".to_string(),
                to: "b".to_string(),
                capacity: Some(5.0),
                cost: 1.0,
                name: None,
            }],
        };
        // Total supply 10 != total demand 4, but validation accepts it;
        // imbalance is an infeasible *result*, not a validation error.
        assert!(validate_network(&network).is_ok());

        let mut dangling = network.clone();
        dangling.edges[0].to = "ghost".to_string();
        assert!(matches!(
            validate_network(&dangling),
            Err(ValidationError::UnknownReference { .. })
        ));
    }

    #[test]
    fn scenario_probabilities_must_sum_to_one() {
        let scenarios = vec![
            ScenarioSpec {
                name: "low".to_string(),
                probability: Some(0.5),
                parameters: IndexMap::new(),
            },
            ScenarioSpec {
                name: "high".to_string(),
                probability: Some(0.3),
                parameters: IndexMap::new(),
            },
        ];
        assert!(matches!(
            validate_scenarios(&scenarios),
            Err(ValidationError::ProbabilitySum { .. })
        ));
    }

    #[test]
    fn implicit_probabilities_are_uniform() {
        let scenarios = vec![
            ScenarioSpec {
                name: "a".to_string(),
                probability: None,
                parameters: IndexMap::new(),
            },
            ScenarioSpec {
                name: "b".to_string(),
                probability: None,
                parameters: IndexMap::new(),
            },
        ];
        assert!(validate_scenarios(&scenarios).is_ok());
    }

    #[test]
    fn invalid_percentiles_are_rejected() {
        let spec = McIntegrationSpec {
            mode: McMode::Percentile,
            percentile: Some("p33".to_string()),
            mc_output: crate::io::request::McOutputSpec {
                percentiles: Some(IndexMap::new()),
                expected_outcome: None,
                scenarios: None,
            },
        };
        assert!(matches!(
            validate_mc_integration(&spec),
            Err(ValidationError::InvalidPercentile { .. })
        ));
    }
}
