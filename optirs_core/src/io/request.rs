//! Typed request structures for every tool
//!
//! This module is the single boundary where loosely typed external input
//! becomes tagged internal types: business rules, objectives, and pricing
//! problems all arrive as serde tagged unions, never as free form maps.
use indexmap::IndexMap;
use serde::Deserialize;

use crate::optimize::objective::ObjectiveSense;
use crate::optimize::selector::Backend;
use crate::optimize::variable::VariableType;
use crate::optimize::{SolverOptions, SolverOptionsBuilder};

fn default_one() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_max_weight() -> f64 {
    1.0
}

fn default_risk_free_rate() -> f64 {
    0.02
}

fn default_num_points() -> usize {
    20
}

fn default_risk_tolerance() -> f64 {
    0.85
}

fn default_risk_parameter() -> f64 {
    0.95
}

fn default_max_iterations() -> usize {
    100
}

fn default_optimality_gap() -> f64 {
    1e-6
}

fn default_column_cost() -> f64 {
    1.0
}

fn default_minimize() -> ObjectiveSense {
    ObjectiveSense::Minimize
}

// region Objectives

/// Objective of a selection problem: a plain weighted sum over items, or the
/// weighted multi-objective form
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ObjectiveSpec {
    /// Weighted multi-objective: at least two named functions whose weights
    /// sum to 1.0 within tolerance
    Multi {
        sense: ObjectiveSense,
        functions: Vec<WeightedObjectiveSpec>,
    },
    /// Single objective over named items
    Single {
        sense: ObjectiveSense,
        items: Vec<ObjectiveItemSpec>,
    },
}

impl ObjectiveSpec {
    /// The optimization sense shared by all forms
    pub fn sense(&self) -> ObjectiveSense {
        match self {
            ObjectiveSpec::Multi { sense, .. } | ObjectiveSpec::Single { sense, .. } => *sense,
        }
    }
}

/// A named item and its objective coefficient
///
/// The value is optional because some tools (robust optimization) take item
/// values from scenarios rather than the objective itself.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveItemSpec {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// One function of a multi-objective, with its scalarization weight
#[derive(Debug, Clone, Deserialize)]
pub struct WeightedObjectiveSpec {
    pub name: String,
    pub weight: f64,
    pub items: Vec<ObjectiveItemSpec>,
}

/// A named objective for Pareto frontier generation; each objective carries
/// its own sense
#[derive(Debug, Clone, Deserialize)]
pub struct NamedObjectiveSpec {
    pub name: String,
    pub sense: ObjectiveSense,
    pub items: Vec<ObjectiveItemSpec>,
}

// endregion Objectives

// region Resources and items

/// Capacity of a single resource
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSpec {
    pub total: f64,
}

/// Per item resource requirements, in the flattened wire form
/// `{"name": "project_a", "budget": 25000, "time": 120}`
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRequirementSpec {
    pub name: String,
    #[serde(flatten)]
    pub requirements: IndexMap<String, f64>,
}

// endregion Resources and items

// region Business rules

/// High level business rules over selection variables, reformulated into
/// primitive rows by [`crate::optimize::reformulate`]
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleSpec {
    /// At least `limit` of the listed items must be selected
    Min {
        items: Vec<String>,
        limit: f64,
        #[serde(default)]
        description: Option<String>,
    },
    /// At most `limit` of the listed items may be selected
    Max {
        items: Vec<String>,
        limit: f64,
        #[serde(default)]
        description: Option<String>,
    },
    /// If `condition_item` is selected then `then_item` must be selected
    Conditional {
        condition_item: String,
        then_item: String,
        #[serde(default)]
        description: Option<String>,
    },
    /// At least `min_selected` of the listed items must be selected
    Disjunctive {
        items: Vec<String>,
        #[serde(default = "default_one")]
        min_selected: u32,
        #[serde(default)]
        description: Option<String>,
    },
    /// Exactly `exactly` of the listed items must be selected
    Mutex {
        items: Vec<String>,
        #[serde(default = "default_one")]
        exactly: u32,
        #[serde(default)]
        description: Option<String>,
    },
}

// endregion Business rules

// region Scheduling

/// A task to schedule on the integer time axis
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    /// Duration in whole time units; must be positive
    pub duration: u32,
    /// Value of completing the task, used by the maximize_value objective
    #[serde(default)]
    pub value: f64,
    /// Names of tasks that must finish before this one starts
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Per time unit resource requirements while the task runs
    #[serde(default)]
    pub resources: IndexMap<String, f64>,
}

/// Temporal side rules for scheduling
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleRuleSpec {
    /// The task must finish by `time`
    Deadline { task: String, time: u32 },
    /// The task may not start before `time`
    Release { task: String, time: u32 },
    /// At most `limit` tasks may run in any time period
    ParallelLimit { limit: u32 },
}

/// Scheduling objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleObjective {
    MinimizeMakespan,
    MaximizeValue,
}

impl Default for ScheduleObjective {
    fn default() -> Self {
        ScheduleObjective::MinimizeMakespan
    }
}

// endregion Scheduling

// region Portfolio

/// An asset with its expected return
#[derive(Debug, Clone, Deserialize)]
pub struct AssetSpec {
    pub name: String,
    pub expected_return: f64,
}

/// Portfolio weight constraints
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioBoundsSpec {
    /// Maximum weight per asset
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
    /// Minimum weight per asset
    #[serde(default)]
    pub min_weight: f64,
    /// Forbid short positions
    #[serde(default = "default_true")]
    pub long_only: bool,
    /// Required expected return for the min_variance objective
    #[serde(default)]
    pub target_return: Option<f64>,
    /// Variance ceiling for the max_return objective
    #[serde(default)]
    pub target_risk: Option<f64>,
}

impl Default for PortfolioBoundsSpec {
    fn default() -> Self {
        PortfolioBoundsSpec {
            max_weight: 1.0,
            min_weight: 0.0,
            long_only: true,
            target_return: None,
            target_risk: None,
        }
    }
}

/// Portfolio optimization goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioObjective {
    /// Maximize risk adjusted excess return
    Sharpe,
    /// Minimize variance subject to a target return
    MinVariance,
    /// Maximize return subject to a variance ceiling
    MaxReturn,
}

impl Default for PortfolioObjective {
    fn default() -> Self {
        PortfolioObjective::Sharpe
    }
}

// endregion Portfolio

// region Network flow

/// A network node with optional supply or demand
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub supply: f64,
    #[serde(default)]
    pub demand: f64,
}

/// A directed network edge
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    /// Capacity; uncapacitated when absent
    #[serde(default)]
    pub capacity: Option<f64>,
    /// Cost per unit of flow
    #[serde(default)]
    pub cost: f64,
    /// Flow variable name; defaults to `flow_{from}_{to}`
    #[serde(default)]
    pub name: Option<String>,
}

impl EdgeSpec {
    /// The name under which this edge's flow is reported
    pub fn flow_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("flow_{}_{}", self.from, self.to),
        }
    }
}

/// A network: nodes with supplies/demands plus directed edges
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSpec {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

/// Kind of network flow problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    MinCost,
    MaxFlow,
    Assignment,
}

impl Default for FlowType {
    fn default() -> Self {
        FlowType::MinCost
    }
}

/// An extra linear constraint over edge flows; its presence forces the LP
/// fallback instead of the specialized network algorithms
#[derive(Debug, Clone, Deserialize)]
pub struct SideConstraintSpec {
    /// Coefficients keyed by edge flow name
    pub coefficients: IndexMap<String, f64>,
    #[serde(rename = "type")]
    pub op: CmpOp,
    pub rhs: f64,
    #[serde(default)]
    pub name: Option<String>,
}

// endregion Network flow

/// Comparison operator used by explicit constraint rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CmpOp {
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "==")]
    Equal,
}

impl Default for CmpOp {
    fn default() -> Self {
        CmpOp::LessEqual
    }
}

// region Stochastic

/// A first or second stage decision variable
#[derive(Debug, Clone, Deserialize)]
pub struct StageDecisionSpec {
    pub name: String,
    #[serde(default, rename = "type")]
    pub variable_type: Option<VariableType>,
    /// Deterministic unit cost (first stage, or second stage fallback)
    #[serde(default)]
    pub cost: f64,
    /// Scenario parameter carrying this decision's unit cost
    #[serde(default)]
    pub cost_key: Option<String>,
    /// `(lower, upper)` bounds; defaults to `(0, unbounded)`
    #[serde(default)]
    pub bounds: Option<(Option<f64>, Option<f64>)>,
}

/// A linear constraint over stage decisions and scenario parameters
#[derive(Debug, Clone, Deserialize)]
pub struct StageConstraintSpec {
    /// Coefficients keyed by decision name or scenario parameter name
    /// (parameters fold into the right hand side)
    pub coefficients: IndexMap<String, f64>,
    #[serde(default, rename = "type")]
    pub op: CmpOp,
    #[serde(default)]
    pub rhs: f64,
}

/// First stage of a two stage stochastic program
#[derive(Debug, Clone, Deserialize)]
pub struct FirstStageSpec {
    pub decisions: Vec<StageDecisionSpec>,
    #[serde(default)]
    pub constraints: Vec<StageConstraintSpec>,
}

/// Second stage (recourse) template, instantiated once per scenario
#[derive(Debug, Clone, Deserialize)]
pub struct SecondStageSpec {
    pub decisions: Vec<StageDecisionSpec>,
    #[serde(default)]
    pub constraints: Vec<StageConstraintSpec>,
}

/// A named scenario: a complete assignment of the uncertain parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    /// Probability; scenarios without one share the remaining mass uniformly
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub parameters: IndexMap<String, f64>,
}

/// How scenario outcomes are aggregated into one objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMeasure {
    /// Probability weighted expectation (risk neutral)
    Expected,
    /// Optimize the worst scenario
    WorstCase,
    /// Conditional value at risk at the configured confidence level
    Cvar,
}

impl Default for RiskMeasure {
    fn default() -> Self {
        RiskMeasure::Expected
    }
}

// endregion Stochastic

// region Column generation

/// A covering constraint of the restricted master problem
#[derive(Debug, Clone, Deserialize)]
pub struct MasterConstraintSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub op: CmpOp,
    pub rhs: f64,
}

/// The restricted master problem
#[derive(Debug, Clone, Deserialize)]
pub struct MasterProblemSpec {
    pub constraints: Vec<MasterConstraintSpec>,
    #[serde(default = "default_minimize")]
    pub objective: ObjectiveSense,
}

/// An item available to the knapsack pricing subproblem; `name` refers to the
/// master constraint the item covers
#[derive(Debug, Clone, Deserialize)]
pub struct PricingItemSpec {
    pub name: String,
    pub size: f64,
    /// Cap on how many times the item may appear in one column
    #[serde(default)]
    pub max_per_column: Option<u32>,
}

/// The pricing subproblem generating new columns
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PricingProblemSpec {
    /// Integer knapsack: maximize dual weighted coverage under a capacity
    Knapsack {
        capacity: f64,
        items: Vec<PricingItemSpec>,
        #[serde(default = "default_column_cost")]
        column_cost: f64,
    },
    /// No pricing; the column set is fixed
    Custom {},
}

/// An explicit column of the master problem
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub id: String,
    pub cost: f64,
    /// Contribution of the column to each master constraint
    pub coefficients: IndexMap<String, f64>,
}

// endregion Column generation

// region Execute

/// An explicit decision variable of a custom problem
#[derive(Debug, Clone, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    /// `(lower, upper)` bounds; missing sides default to `0` / unbounded
    #[serde(default)]
    pub bounds: Option<(Option<f64>, Option<f64>)>,
}

/// A quadratic objective term of a custom problem
#[derive(Debug, Clone, Deserialize)]
pub struct QuadraticTermSpec {
    pub var1: String,
    pub var2: String,
    pub coef: f64,
}

/// Objective of a custom problem
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteObjectiveSpec {
    /// Linear coefficients keyed by variable name
    #[serde(default)]
    pub coefficients: IndexMap<String, f64>,
    /// Optional quadratic terms
    #[serde(default)]
    pub quadratic: Vec<QuadraticTermSpec>,
    pub sense: ObjectiveSense,
}

/// A linear constraint of a custom problem
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteConstraintSpec {
    pub coefficients: IndexMap<String, f64>,
    #[serde(rename = "type")]
    pub op: CmpOp,
    pub rhs: f64,
    #[serde(default)]
    pub name: Option<String>,
}

/// A fully explicit problem definition for the execute tool
#[derive(Debug, Clone, Deserialize)]
pub struct ProblemDefinitionSpec {
    pub variables: Vec<VariableSpec>,
    pub objective: ExecuteObjectiveSpec,
    #[serde(default)]
    pub constraints: Vec<ExecuteConstraintSpec>,
}

// endregion Execute

// region Options and Monte Carlo

/// Per call solver options in wire form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SolverOptionsSpec {
    #[serde(default)]
    pub time_limit: Option<f64>,
    #[serde(default)]
    pub verbose: bool,
    /// Explicit backend override
    #[serde(default)]
    pub solver: Option<Backend>,
}

impl SolverOptionsSpec {
    /// Convert to the internal options type
    pub fn to_options(&self) -> SolverOptions {
        SolverOptionsBuilder::default()
            .time_limit(self.time_limit)
            .verbose(self.verbose)
            .backend(self.solver)
            .build()
            .unwrap()
    }
}

/// How Monte Carlo output feeds into an optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McMode {
    /// Use a single percentile of the simulated values
    Percentile,
    /// Use the expected values
    Expected,
    /// Scenario based; tools without scenario support use expected values
    Scenarios,
}

impl Default for McMode {
    fn default() -> Self {
        McMode::Percentile
    }
}

/// Monte Carlo integration block accepted by every tool
#[derive(Debug, Clone, Deserialize)]
pub struct McIntegrationSpec {
    #[serde(default)]
    pub mode: McMode,
    /// Which percentile to read in percentile mode (p10/p25/p50/p75/p90)
    #[serde(default)]
    pub percentile: Option<String>,
    pub mc_output: McOutputSpec,
}

/// The slice of a Monte Carlo simulation output this crate consumes
#[derive(Debug, Clone, Deserialize)]
pub struct McOutputSpec {
    #[serde(default)]
    pub percentiles: Option<IndexMap<String, IndexMap<String, f64>>>,
    #[serde(default)]
    pub expected_outcome: Option<IndexMap<String, f64>>,
    #[serde(default)]
    pub scenarios: Option<Vec<IndexMap<String, f64>>>,
}

/// One robust optimization scenario: either a flat value map or the wrapped
/// `{"values": {...}}` form
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScenarioValuesSpec {
    Wrapped { values: IndexMap<String, f64> },
    Flat(IndexMap<String, f64>),
}

impl ScenarioValuesSpec {
    /// The item value map of the scenario
    pub fn values(&self) -> &IndexMap<String, f64> {
        match self {
            ScenarioValuesSpec::Wrapped { values } => values,
            ScenarioValuesSpec::Flat(values) => values,
        }
    }
}

/// Scenario collection for robust optimization
#[derive(Debug, Clone, Deserialize)]
pub struct McScenariosSpec {
    pub scenarios: Vec<ScenarioValuesSpec>,
}

/// How robust optimization scores an allocation across scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobustnessCriterion {
    /// Maximize the expected outcome
    BestAverage,
    /// Optimize the worst scenario outcome
    WorstCase,
    /// Optimize a percentile of the outcome distribution
    Percentile,
}

impl Default for RobustnessCriterion {
    fn default() -> Self {
        RobustnessCriterion::BestAverage
    }
}

// endregion Options and Monte Carlo

// region Tool requests

/// Request for resource allocation
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationRequest {
    pub objective: ObjectiveSpec,
    pub resources: IndexMap<String, ResourceSpec>,
    pub item_requirements: Vec<ItemRequirementSpec>,
    #[serde(default)]
    pub constraints: Vec<RuleSpec>,
    #[serde(default)]
    pub monte_carlo_integration: Option<McIntegrationSpec>,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

/// Request for scenario robust allocation
#[derive(Debug, Clone, Deserialize)]
pub struct RobustRequest {
    pub objective: ObjectiveSpec,
    pub resources: IndexMap<String, ResourceSpec>,
    pub item_requirements: Vec<ItemRequirementSpec>,
    pub monte_carlo_scenarios: McScenariosSpec,
    #[serde(default)]
    pub robustness_criterion: RobustnessCriterion,
    #[serde(default = "default_risk_tolerance")]
    pub risk_tolerance: f64,
    #[serde(default)]
    pub constraints: Vec<RuleSpec>,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

/// Request for portfolio optimization
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioRequest {
    pub assets: Vec<AssetSpec>,
    pub covariance_matrix: Vec<Vec<f64>>,
    #[serde(default)]
    pub constraints: PortfolioBoundsSpec,
    #[serde(default)]
    pub optimization_objective: PortfolioObjective,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub monte_carlo_integration: Option<McIntegrationSpec>,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

/// Request for task scheduling
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub resources: IndexMap<String, ResourceSpec>,
    pub time_horizon: u32,
    #[serde(default)]
    pub constraints: Vec<ScheduleRuleSpec>,
    #[serde(default)]
    pub optimization_objective: ScheduleObjective,
    #[serde(default)]
    pub monte_carlo_integration: Option<McIntegrationSpec>,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

/// Request for network flow optimization
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkFlowRequest {
    pub network: NetworkSpec,
    #[serde(default)]
    pub flow_type: FlowType,
    #[serde(default)]
    pub constraints: Vec<SideConstraintSpec>,
    #[serde(default)]
    pub monte_carlo_integration: Option<McIntegrationSpec>,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

/// Request for Pareto frontier generation
#[derive(Debug, Clone, Deserialize)]
pub struct ParetoRequest {
    pub objectives: Vec<NamedObjectiveSpec>,
    pub resources: IndexMap<String, ResourceSpec>,
    pub item_requirements: Vec<ItemRequirementSpec>,
    #[serde(default)]
    pub constraints: Vec<RuleSpec>,
    #[serde(default = "default_num_points")]
    pub num_points: usize,
    #[serde(default)]
    pub monte_carlo_integration: Option<McIntegrationSpec>,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

/// Request for two stage stochastic optimization
#[derive(Debug, Clone, Deserialize)]
pub struct StochasticRequest {
    pub first_stage: FirstStageSpec,
    pub second_stage: SecondStageSpec,
    pub scenarios: Vec<ScenarioSpec>,
    #[serde(default)]
    pub risk_measure: RiskMeasure,
    /// Confidence level for CVaR
    #[serde(default = "default_risk_parameter")]
    pub risk_parameter: f64,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

/// Request for column generation
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnGenRequest {
    pub master_problem: MasterProblemSpec,
    pub pricing_problem: PricingProblemSpec,
    #[serde(default)]
    pub initial_columns: Vec<ColumnSpec>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_optimality_gap")]
    pub optimality_gap: f64,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

/// Request for custom problem execution
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub problem_definition: ProblemDefinitionSpec,
    #[serde(default = "default_true")]
    pub auto_detect: bool,
    /// Overrides auto detection when set
    #[serde(default)]
    pub solver_preference: Option<Backend>,
    #[serde(default)]
    pub monte_carlo_integration: Option<McIntegrationSpec>,
    #[serde(default)]
    pub solver_options: Option<SolverOptionsSpec>,
}

// endregion Tool requests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_and_multi_objectives_deserialize() {
        let single: ObjectiveSpec = serde_json::from_str(
            r#"{"items": [{"name": "a", "value": 10.0}], "sense": "maximize"}"#,
        )
        .unwrap();
        assert!(matches!(single, ObjectiveSpec::Single { .. }));

        let multi: ObjectiveSpec = serde_json::from_str(
            r#"{
                "sense": "maximize",
                "functions": [
                    {"name": "profit", "weight": 0.7, "items": [{"name": "a", "value": 1.0}]},
                    {"name": "reach", "weight": 0.3, "items": [{"name": "a", "value": 2.0}]}
                ]
            }"#,
        )
        .unwrap();
        assert!(matches!(multi, ObjectiveSpec::Multi { .. }));
    }

    #[test]
    fn item_requirements_flatten_resource_amounts() {
        let item: ItemRequirementSpec =
            serde_json::from_str(r#"{"name": "a", "budget": 25000.0, "time": 120.0}"#).unwrap();
        assert_eq!(item.name, "a");
        assert!((item.requirements["budget"] - 25000.0).abs() < 1e-9);
        assert!((item.requirements["time"] - 120.0).abs() < 1e-9);
    }

    #[test]
    fn rules_are_tagged_by_type() {
        let rule: RuleSpec = serde_json::from_str(
            r#"{"type": "conditional", "condition_item": "a", "then_item": "b"}"#,
        )
        .unwrap();
        assert!(matches!(rule, RuleSpec::Conditional { .. }));

        let mutex: RuleSpec =
            serde_json::from_str(r#"{"type": "mutex", "items": ["a", "b"]}"#).unwrap();
        match mutex {
            RuleSpec::Mutex { exactly, .. } => assert_eq!(exactly, 1),
            _ => panic!("expected mutex"),
        }
    }

    #[test]
    fn comparison_ops_use_symbolic_names() {
        let op: CmpOp = serde_json::from_str("\">=\"").unwrap();
        assert_eq!(op, CmpOp::GreaterEqual);
    }

    #[test]
    fn scenario_values_accept_both_wire_forms() {
        let flat: ScenarioValuesSpec = serde_json::from_str(r#"{"a": 1.0}"#).unwrap();
        assert!((flat.values()["a"] - 1.0).abs() < 1e-9);
        let wrapped: ScenarioValuesSpec =
            serde_json::from_str(r#"{"values": {"a": 2.0}}"#).unwrap();
        assert!((wrapped.values()["a"] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn execute_bounds_allow_open_sides() {
        let variable: VariableSpec =
            serde_json::from_str(r#"{"name": "x", "type": "continuous", "bounds": [0, null]}"#)
                .unwrap();
        assert_eq!(variable.bounds, Some((Some(0.0), None)));
    }

    #[test]
    fn allocation_request_round_trip() {
        let request: AllocationRequest = serde_json::from_str(
            r#"{
                "objective": {"items": [{"name": "ads", "value": 125000}], "sense": "maximize"},
                "resources": {"budget": {"total": 100000}},
                "item_requirements": [{"name": "ads", "budget": 25000}]
            }"#,
        )
        .unwrap();
        assert_eq!(request.item_requirements.len(), 1);
        assert!(request.constraints.is_empty());
        assert!(request.solver_options.is_none());
    }
}
