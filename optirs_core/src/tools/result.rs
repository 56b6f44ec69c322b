//! The normalized result contract shared by every tool
//!
//! All orchestrators produce one [`OptimizationResult`]: a boundary status,
//! the primary solution mapping, resource utilization, optional shadow
//! prices, a per tool analytics payload, and the Monte Carlo compatible
//! summary consumed by downstream validation tooling. Validation and solver
//! failures are rendered into the same shape by [`OptimizationResult::from_error`],
//! so nothing unstructured ever crosses the tool boundary.
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::Serialize;

use crate::io::request::{ItemRequirementSpec, ResourceSpec};
use crate::optimize::{OptimizationStatus, ProblemSolution};
use crate::tools::OptimizeError;
use crate::utils::num;

/// Recommended downstream tool named in Monte Carlo compatible output
pub const RECOMMENDED_NEXT_TOOL: &str = "validate_reasoning_confidence";
/// Simulation count recommended to downstream validation
pub const RECOMMENDED_SIMULATIONS: u32 = 10_000;

/// Boundary status of a finished tool invocation
#[derive(Serialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Proven optimal
    Optimal,
    /// A usable solution without an optimality proof (local optimum, or the
    /// incumbent when a time limit fired)
    Feasible,
    /// No feasible assignment exists; a legitimate answer, not an error
    Infeasible,
    /// The objective can be improved without limit
    Unbounded,
    /// Validation or solver failure
    Error,
}

impl Display for ResultStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Optimal => write!(f, "optimal"),
            ResultStatus::Feasible => write!(f, "feasible"),
            ResultStatus::Infeasible => write!(f, "infeasible"),
            ResultStatus::Unbounded => write!(f, "unbounded"),
            ResultStatus::Error => write!(f, "error"),
        }
    }
}

impl From<OptimizationStatus> for ResultStatus {
    fn from(status: OptimizationStatus) -> Self {
        match status {
            OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal => {
                ResultStatus::Optimal
            }
            OptimizationStatus::LocalOptimal | OptimizationStatus::Feasible => {
                ResultStatus::Feasible
            }
            OptimizationStatus::Infeasible => ResultStatus::Infeasible,
            OptimizationStatus::Unbounded => ResultStatus::Unbounded,
            OptimizationStatus::Unoptimized
            | OptimizationStatus::NumericalError
            | OptimizationStatus::SolverHalted => ResultStatus::Error,
        }
    }
}

/// Utilization of one resource at the optimum
#[derive(Serialize, Clone, Debug)]
pub struct ResourceUsage {
    pub used: f64,
    pub available: f64,
    pub remaining: f64,
    pub utilization_pct: f64,
}

/// The single normalized output type of every tool
#[derive(Serialize, Clone, Debug)]
pub struct OptimizationResult {
    /// Id of the backend (or composite procedure) that produced the answer
    pub solver: String,
    pub status: ResultStatus,
    pub is_optimal: bool,
    pub is_feasible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective_value: Option<f64>,
    /// Primary decision mapping: selections, weights, start times, or flows
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub solution: IndexMap<String, f64>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub resource_usage: IndexMap<String, ResourceUsage>,
    /// Marginal value per resource constraint; absent whenever the model
    /// contains integer variables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_prices: Option<IndexMap<String, f64>>,
    pub solve_time_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub analytics: ToolAnalytics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monte_carlo_compatible: Option<MonteCarloCompatible>,
}

impl OptimizationResult {
    /// A blank result with only a solver id and status
    pub fn new(solver: &str, status: ResultStatus) -> Self {
        OptimizationResult {
            solver: solver.to_string(),
            status,
            is_optimal: status == ResultStatus::Optimal,
            is_feasible: matches!(status, ResultStatus::Optimal | ResultStatus::Feasible),
            objective_value: None,
            solution: IndexMap::new(),
            resource_usage: IndexMap::new(),
            shadow_prices: None,
            solve_time_seconds: 0.0,
            message: None,
            analytics: ToolAnalytics::None {},
            monte_carlo_compatible: None,
        }
    }

    /// Start from a backend solution: status, objective, primary values,
    /// and timing carry over
    pub fn from_solution(solver: &str, solution: &ProblemSolution) -> Self {
        let mut result = OptimizationResult::new(solver, solution.status.into());
        result.objective_value = solution.objective_value;
        if let Some(values) = &solution.variable_values {
            result.solution = values.clone();
        }
        result.solve_time_seconds = solution.solve_time;
        result
    }

    /// Render a validation or solver failure as a structured error result
    pub fn from_error(error: &OptimizeError) -> Self {
        let mut result = OptimizationResult::new("none", ResultStatus::Error);
        result.message = Some(error.to_string());
        result
    }

    pub fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}

/// Per tool analytics payload, flattened into the serialized result
#[derive(Serialize, Clone, Debug)]
#[serde(untagged)]
pub enum ToolAnalytics {
    None {},
    Allocation {
        #[serde(skip_serializing_if = "Vec::is_empty")]
        items: Vec<ItemOutcome>,
        #[serde(skip_serializing_if = "Option::is_none")]
        objective_breakdown: Option<IndexMap<String, ObjectiveContribution>>,
    },
    Robust {
        selected_items: Vec<String>,
        robustness_metrics: RobustnessMetrics,
        outcome_distribution: Vec<f64>,
        num_scenarios_evaluated: usize,
    },
    Portfolio {
        optimization_objective: String,
        expected_return: f64,
        portfolio_variance: f64,
        portfolio_std: f64,
        sharpe_ratio: f64,
        assets: Vec<AssetOutcome>,
    },
    Schedule {
        optimization_objective: String,
        makespan: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_value: Option<f64>,
        critical_path: Vec<String>,
        tasks: Vec<TaskOutcome>,
        resource_timeline: IndexMap<String, Vec<PeriodUsage>>,
    },
    Network {
        flow_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_cost: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_flow: Option<f64>,
        bottlenecks: Vec<Bottleneck>,
        node_balance: IndexMap<String, NodeBalance>,
        #[serde(skip_serializing_if = "Option::is_none")]
        assignments: Option<IndexMap<String, String>>,
    },
    Pareto {
        pareto_frontier: Vec<FrontierPoint>,
        num_frontier_points: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        tradeoff_analysis: Option<TradeoffAnalysis>,
        #[serde(skip_serializing_if = "Option::is_none")]
        recommended_point: Option<RecommendedPoint>,
    },
    Stochastic {
        first_stage_decision: IndexMap<String, f64>,
        scenario_decisions: IndexMap<String, IndexMap<String, f64>>,
        risk_measure: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        vss: Option<ValueOfInformation>,
        #[serde(skip_serializing_if = "Option::is_none")]
        evpi: Option<ValueOfInformation>,
    },
    ColumnGen {
        optimal_solution: Vec<SelectedColumn>,
        column_count: usize,
        iterations: usize,
        converged: bool,
        convergence_history: Vec<IterationRecord>,
        num_initial_columns: usize,
        num_generated_columns: usize,
    },
    Execute {
        solver_used: String,
        local_optimum: bool,
        problem_info: ProblemInfo,
    },
}

/// One item's outcome in an allocation
#[derive(Serialize, Clone, Debug)]
pub struct ItemOutcome {
    pub name: String,
    pub value: f64,
    pub selected: bool,
}

/// Per function contribution of a multi-objective solution
#[derive(Serialize, Clone, Debug)]
pub struct ObjectiveContribution {
    pub value: f64,
    pub weight: f64,
    pub weighted_value: f64,
}

/// Aggregate performance of a robust allocation across scenarios
#[derive(Serialize, Clone, Debug)]
pub struct RobustnessMetrics {
    pub criterion_used: String,
    pub risk_tolerance: f64,
    pub expected_outcome: f64,
    pub worst_case_outcome: f64,
    pub best_case_outcome: f64,
    /// Fraction of scenarios reaching 90% of the expected outcome
    pub scenarios_meeting_threshold: f64,
    pub outcome_std_dev: f64,
    pub outcome_percentiles: IndexMap<String, f64>,
}

/// One asset's share of a portfolio
#[derive(Serialize, Clone, Debug)]
pub struct AssetOutcome {
    pub name: String,
    pub weight: f64,
    pub expected_return: f64,
    pub contribution_to_return: f64,
    /// Covariance weighted share of total variance; negative for hedges
    pub risk_contribution: f64,
    pub risk_contribution_pct: f64,
}

/// One task's placement in a schedule
#[derive(Serialize, Clone, Debug)]
pub struct TaskOutcome {
    pub name: String,
    pub start_time: u32,
    pub end_time: u32,
    pub duration: u32,
    pub value: f64,
    pub dependencies: Vec<String>,
    pub on_critical_path: bool,
}

/// Resource usage in one time period
#[derive(Serialize, Clone, Debug)]
pub struct PeriodUsage {
    pub time: u32,
    pub used: f64,
    pub available: f64,
    pub utilization_pct: f64,
}

/// An edge whose flow sits at its capacity
#[derive(Serialize, Clone, Debug)]
pub struct Bottleneck {
    pub edge: String,
    pub from: String,
    pub to: String,
    pub capacity: f64,
    pub flow: f64,
    pub utilization: f64,
}

/// Flow balance at one node
#[derive(Serialize, Clone, Debug)]
pub struct NodeBalance {
    pub inflow: f64,
    pub outflow: f64,
    pub net: f64,
}

/// One non-dominated point of a Pareto frontier
#[derive(Serialize, Clone, Debug)]
pub struct FrontierPoint {
    pub weights: IndexMap<String, f64>,
    pub allocation: IndexMap<String, f64>,
    pub objective_values: IndexMap<String, f64>,
    pub weighted_objective: f64,
}

/// Trade-off metrics over a frontier
#[derive(Serialize, Clone, Debug)]
pub struct TradeoffAnalysis {
    pub objective_ranges: IndexMap<String, ObjectiveRange>,
    pub tradeoff_rates: IndexMap<String, TradeoffRate>,
    pub num_unique_solutions: usize,
}

#[derive(Serialize, Clone, Debug)]
pub struct ObjectiveRange {
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

#[derive(Serialize, Clone, Debug)]
pub struct TradeoffRate {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub interpretation: String,
}

/// The knee point recommendation of a Pareto sweep
#[derive(Serialize, Clone, Debug)]
pub struct RecommendedPoint {
    pub index: usize,
    pub allocation: IndexMap<String, f64>,
    pub objective_values: IndexMap<String, f64>,
    pub weights: IndexMap<String, f64>,
}

/// VSS / EVPI style information metrics
#[derive(Serialize, Clone, Debug)]
pub struct ValueOfInformation {
    pub value: f64,
    pub interpretation: String,
}

/// A column selected by the restricted master problem
#[derive(Serialize, Clone, Debug)]
pub struct SelectedColumn {
    pub column_id: String,
    pub weight: f64,
    pub cost: f64,
    pub coefficients: IndexMap<String, f64>,
}

/// One iteration of a column generation run
#[derive(Serialize, Clone, Debug)]
pub struct IterationRecord {
    pub iteration: usize,
    pub objective_value: f64,
    pub num_columns: usize,
}

/// Structural statistics of an executed problem
#[derive(Serialize, Clone, Debug)]
pub struct ProblemInfo {
    pub num_variables: usize,
    pub num_constraints: usize,
    pub variable_types: IndexMap<String, usize>,
    pub sense: String,
}

// region Monte Carlo compatible output

/// Summary block recommending downstream Monte Carlo validation parameters
#[derive(Serialize, Clone, Debug)]
pub struct MonteCarloCompatible {
    pub decision_variables: IndexMap<String, f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selected_items: Vec<String>,
    pub assumptions: Vec<Assumption>,
    pub outcome_function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    pub recommended_next_tool: String,
    pub recommended_params: RecommendedParams,
}

#[derive(Serialize, Clone, Debug)]
pub struct Assumption {
    pub name: String,
    pub value: f64,
    pub distribution: Distribution,
}

#[derive(Serialize, Clone, Debug)]
pub struct Distribution {
    #[serde(rename = "type")]
    pub kind: String,
    pub params: DistributionParams,
}

#[derive(Serialize, Clone, Debug)]
pub struct DistributionParams {
    pub mean: f64,
    pub std: f64,
}

#[derive(Serialize, Clone, Debug)]
pub struct RecommendedParams {
    pub decision_context: String,
    pub assumptions: IndexMap<String, AssumptionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<SuccessCriteria>,
    pub num_simulations: u32,
}

#[derive(Serialize, Clone, Debug)]
pub struct AssumptionSummary {
    pub distribution: String,
    pub params: DistributionParams,
}

#[derive(Serialize, Clone, Debug)]
pub struct SuccessCriteria {
    pub threshold: f64,
    pub comparison: String,
}

/// A normal assumption centered on `value` with a proportional spread
pub fn normal_assumption(name: String, value: f64, std_fraction: f64) -> Assumption {
    Assumption {
        name,
        value,
        distribution: Distribution {
            kind: "normal".to_string(),
            params: DistributionParams {
                mean: value,
                std: value.abs() * std_fraction,
            },
        },
    }
}

impl MonteCarloCompatible {
    /// Assemble the block, deriving the recommended parameter section from
    /// the assumption list
    pub fn new(
        decision_variables: IndexMap<String, f64>,
        selected_items: Vec<String>,
        assumptions: Vec<Assumption>,
        outcome_function: String,
        decision_context: String,
        success_criteria: Option<SuccessCriteria>,
    ) -> Self {
        let summaries: IndexMap<String, AssumptionSummary> = assumptions
            .iter()
            .map(|a| {
                (
                    a.name.clone(),
                    AssumptionSummary {
                        distribution: a.distribution.kind.clone(),
                        params: a.distribution.params.clone(),
                    },
                )
            })
            .collect();
        MonteCarloCompatible {
            decision_variables,
            selected_items,
            assumptions,
            outcome_function,
            expected_value: None,
            recommended_next_tool: RECOMMENDED_NEXT_TOOL.to_string(),
            recommended_params: RecommendedParams {
                decision_context,
                assumptions: summaries,
                success_criteria,
                num_simulations: RECOMMENDED_SIMULATIONS,
            },
        }
    }

    pub fn with_expected_value(mut self, value: f64) -> Self {
        self.expected_value = Some(value);
        self
    }
}

// endregion Monte Carlo compatible output

// region Shared analytics helpers

/// Compute per resource utilization for a selection style solution
pub fn compute_resource_usage(
    selection: &IndexMap<String, f64>,
    requirements: &[ItemRequirementSpec],
    resources: &IndexMap<String, ResourceSpec>,
) -> IndexMap<String, ResourceUsage> {
    let mut usage = IndexMap::new();
    for (resource_name, resource) in resources {
        let used: f64 = requirements
            .iter()
            .map(|item| {
                let amount = item.requirements.get(resource_name).copied().unwrap_or(0.0);
                amount * selection.get(&item.name).copied().unwrap_or(0.0)
            })
            .sum();
        let utilization_pct = if resource.total > 0.0 {
            used / resource.total * 100.0
        } else {
            0.0
        };
        usage.insert(
            resource_name.clone(),
            ResourceUsage {
                used,
                available: resource.total,
                remaining: resource.total - used,
                utilization_pct,
            },
        );
    }
    usage
}

/// Extract resource shadow prices from a backend solution
///
/// Constraint ids carrying the given prefix are reported with the prefix
/// stripped. Returns None whenever the backend produced no duals (mixed
/// integer models).
pub fn shadow_prices_from(
    solution: &ProblemSolution,
    prefix: &str,
) -> Option<IndexMap<String, f64>> {
    solution.dual_values.as_ref().map(|duals| {
        duals
            .iter()
            .filter_map(|(id, value)| {
                id.strip_prefix(prefix)
                    .map(|name| (name.to_string(), *value))
            })
            .collect()
    })
}

/// Standard percentile summary of an outcome distribution
pub fn percentile_summary(outcomes: &[f64]) -> IndexMap<String, f64> {
    let mut summary = IndexMap::new();
    for (label, pct) in [
        ("p10", 10.0),
        ("p25", 25.0),
        ("p50", 50.0),
        ("p75", 75.0),
        ("p90", 90.0),
    ] {
        summary.insert(label.to_string(), num::percentile(outcomes, pct));
    }
    summary
}

// endregion Shared analytics helpers

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_keeps_infeasible_out_of_errors() {
        assert_eq!(
            ResultStatus::from(OptimizationStatus::Infeasible),
            ResultStatus::Infeasible
        );
        assert_eq!(
            ResultStatus::from(OptimizationStatus::LocalOptimal),
            ResultStatus::Feasible
        );
        assert_eq!(
            ResultStatus::from(OptimizationStatus::NumericalError),
            ResultStatus::Error
        );
    }

    #[test]
    fn result_serializes_with_flattened_analytics() {
        let mut result = OptimizationResult::new("milp", ResultStatus::Optimal);
        result.analytics = ToolAnalytics::Allocation {
            items: vec![ItemOutcome {
                name: "a".to_string(),
                value: 10.0,
                selected: true,
            }],
            objective_breakdown: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "optimal");
        assert_eq!(json["items"][0]["name"], "a");
        // empty collections and absent options stay off the wire
        assert!(json.get("solution").is_none());
        assert!(json.get("shadow_prices").is_none());
    }

    #[test]
    fn resource_usage_accumulates_selected_items() {
        let mut selection = IndexMap::new();
        selection.insert("a".to_string(), 1.0);
        selection.insert("b".to_string(), 0.0);
        let requirements = vec![
            ItemRequirementSpec {
                name: "a".to_string(),
                requirements: IndexMap::from([("budget".to_string(), 30.0)]),
            },
            ItemRequirementSpec {
                name: "b".to_string(),
                requirements: IndexMap::from([("budget".to_string(), 50.0)]),
            },
        ];
        let mut resources = IndexMap::new();
        resources.insert("budget".to_string(), ResourceSpec { total: 100.0 });

        let usage = compute_resource_usage(&selection, &requirements, &resources);
        let budget = &usage["budget"];
        assert!((budget.used - 30.0).abs() < 1e-9);
        assert!((budget.remaining - 70.0).abs() < 1e-9);
        assert!((budget.utilization_pct - 30.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_summary_is_ordered() {
        let outcomes: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let summary = percentile_summary(&outcomes);
        assert!(summary["p10"] < summary["p50"]);
        assert!(summary["p50"] < summary["p90"]);
    }

    #[test]
    fn assumptions_build_their_summaries() {
        let mc = MonteCarloCompatible::new(
            IndexMap::from([("a".to_string(), 1.0)]),
            vec!["a".to_string()],
            vec![normal_assumption("a_value".to_string(), 100.0, 0.15)],
            "sum of selected".to_string(),
            "allocation".to_string(),
            Some(SuccessCriteria {
                threshold: 90.0,
                comparison: ">=".to_string(),
            }),
        );
        assert_eq!(mc.recommended_next_tool, RECOMMENDED_NEXT_TOOL);
        let summary = &mc.recommended_params.assumptions["a_value"];
        assert_eq!(summary.distribution, "normal");
        assert!((summary.params.std - 15.0).abs() < 1e-9);
    }
}
