//! Two stage stochastic programming tool
//!
//! Builds the extensive form: first stage decisions shared across scenarios,
//! one set of recourse decisions per scenario, and a cost objective that is
//! the probability weighted expectation, the worst scenario, or CVaR at a
//! configured confidence level. Also reports the value of the stochastic
//! solution (VSS, via a mean scenario re-solve with the first stage fixed)
//! and the expected value of perfect information (EVPI, via per scenario
//! wait and see solves).
use indexmap::IndexMap;
use log::debug;

use crate::io::request::{
    CmpOp, RiskMeasure, ScenarioSpec, StageConstraintSpec, StageDecisionSpec, StochasticRequest,
};
use crate::io::validate::{self, ValidationError};
use crate::optimize::problem::Problem;
use crate::optimize::variable::VariableType;
use crate::optimize::{selector, ProblemSolution, SolverOptions};
use crate::tools::result::{
    normal_assumption, MonteCarloCompatible, OptimizationResult, ResultStatus, SuccessCriteria,
    ToolAnalytics, ValueOfInformation,
};
use crate::tools::{request_options, OptimizeError};

/// A scenario with its resolved probability
struct ResolvedScenario {
    name: String,
    probability: f64,
    parameters: IndexMap<String, f64>,
}

/// Optimize a two stage problem under uncertainty
pub fn optimize_stochastic(
    request: &StochasticRequest,
) -> Result<OptimizationResult, OptimizeError> {
    validate::validate_stochastic(
        &request.first_stage,
        &request.second_stage,
        &request.scenarios,
        request.risk_parameter,
    )?;
    validate_stage_references(request)?;

    let scenarios = resolve_scenarios(&request.scenarios);
    let options = request_options(&request.solver_options);

    let problem = build_extensive_form(
        request,
        &scenarios,
        request.risk_measure,
        request.risk_parameter,
        None,
    )?;
    let solution = selector::dispatch(&problem, &options)?;
    if !solution.is_feasible() {
        let mut result = OptimizationResult::from_solution("extensive_form", &solution);
        result.message = Some(match result.status {
            ResultStatus::Infeasible => {
                "Stochastic problem is infeasible: no first stage decision admits feasible \
                 recourse in every scenario."
                    .to_string()
            }
            other => format!("Stochastic optimization failed with status: {other}"),
        });
        return Ok(result);
    }

    let first_stage_decision: IndexMap<String, f64> = request
        .first_stage
        .decisions
        .iter()
        .map(|decision| (decision.name.clone(), solution.value_of(&decision.name)))
        .collect();
    let scenario_decisions: IndexMap<String, IndexMap<String, f64>> = scenarios
        .iter()
        .enumerate()
        .map(|(index, scenario)| {
            let decisions = request
                .second_stage
                .decisions
                .iter()
                .map(|decision| {
                    (
                        decision.name.clone(),
                        solution.value_of(&scenario_variable(&decision.name, index)),
                    )
                })
                .collect();
            (scenario.name.clone(), decisions)
        })
        .collect();
    let expected_cost = solution.objective_value.unwrap_or(0.0);

    // VSS and EVPI are defined against the expectation; skip them for the
    // risk averse measures
    let (vss, evpi) = if request.risk_measure == RiskMeasure::Expected {
        (
            compute_vss(request, &scenarios, expected_cost, &options)?,
            compute_evpi(request, &scenarios, expected_cost, &options)?,
        )
    } else {
        (None, None)
    };

    let mut result = OptimizationResult::from_solution("extensive_form", &solution);
    result.solution = first_stage_decision.clone();
    result.objective_value = Some(expected_cost);
    result.analytics = ToolAnalytics::Stochastic {
        first_stage_decision: first_stage_decision.clone(),
        scenario_decisions,
        risk_measure: risk_measure_label(request.risk_measure).to_string(),
        vss,
        evpi,
    };
    result.monte_carlo_compatible = Some(monte_carlo_block(
        &first_stage_decision,
        &scenarios,
        expected_cost,
    ));
    Ok(result)
}

fn risk_measure_label(measure: RiskMeasure) -> &'static str {
    match measure {
        RiskMeasure::Expected => "expected",
        RiskMeasure::WorstCase => "worst_case",
        RiskMeasure::Cvar => "cvar",
    }
}

fn scenario_variable(decision: &str, scenario_index: usize) -> String {
    format!("{decision}_s{scenario_index}")
}

fn resolve_scenarios(scenarios: &[ScenarioSpec]) -> Vec<ResolvedScenario> {
    let uniform = 1.0 / scenarios.len() as f64;
    scenarios
        .iter()
        .map(|scenario| ResolvedScenario {
            name: scenario.name.clone(),
            probability: scenario.probability.unwrap_or(uniform),
            parameters: scenario.parameters.clone(),
        })
        .collect()
}

/// Second stage unit cost of a decision under one scenario
fn recourse_cost(decision: &StageDecisionSpec, scenario: &ResolvedScenario) -> f64 {
    let cost_key = decision.cost_key.as_deref().unwrap_or("cost");
    scenario
        .parameters
        .get(cost_key)
        .copied()
        .unwrap_or(decision.cost)
}

/// Check that stage constraints only reference known decisions or scenario
/// parameters
fn validate_stage_references(request: &StochasticRequest) -> Result<(), OptimizeError> {
    let first: Vec<&str> = request
        .first_stage
        .decisions
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    let second: Vec<&str> = request
        .second_stage
        .decisions
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    for (index, constraint) in request.first_stage.constraints.iter().enumerate() {
        for name in constraint.coefficients.keys() {
            if !first.contains(&name.as_str()) {
                return Err(ValidationError::UnknownReference {
                    kind: "decision",
                    name: name.clone(),
                    referenced_from: format!("first stage constraint {index}"),
                }
                .into());
            }
        }
    }
    for (index, constraint) in request.second_stage.constraints.iter().enumerate() {
        for name in constraint.coefficients.keys() {
            let known = first.contains(&name.as_str())
                || second.contains(&name.as_str())
                || request
                    .scenarios
                    .iter()
                    .any(|s| s.parameters.contains_key(name));
            if !known {
                return Err(ValidationError::UnknownReference {
                    kind: "decision or scenario parameter",
                    name: name.clone(),
                    referenced_from: format!("second stage constraint {index}"),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn decision_bounds(decision: &StageDecisionSpec) -> (f64, f64) {
    match decision.bounds {
        Some((lower, upper)) => (
            lower.unwrap_or(0.0),
            upper.unwrap_or(f64::INFINITY),
        ),
        None => (0.0, f64::INFINITY),
    }
}

fn decision_type(decision: &StageDecisionSpec) -> VariableType {
    decision.variable_type.unwrap_or(VariableType::Continuous)
}

/// Build the extensive form as one minimization problem; `fixed_first` pins
/// the first stage decisions (used for the EEV re-solve)
fn build_extensive_form(
    request: &StochasticRequest,
    scenarios: &[ResolvedScenario],
    risk_measure: RiskMeasure,
    risk_parameter: f64,
    fixed_first: Option<&IndexMap<String, f64>>,
) -> Result<Problem, OptimizeError> {
    let mut problem = Problem::new_minimization();

    for decision in &request.first_stage.decisions {
        let (lower, upper) = decision_bounds(decision);
        problem.add_new_variable(&decision.name, decision_type(decision), lower, upper)?;
    }
    for (index, _) in scenarios.iter().enumerate() {
        for decision in &request.second_stage.decisions {
            let (lower, upper) = decision_bounds(decision);
            problem.add_new_variable(
                &scenario_variable(&decision.name, index),
                decision_type(decision),
                lower,
                upper,
            )?;
        }
    }

    match risk_measure {
        RiskMeasure::Expected => {
            for decision in &request.first_stage.decisions {
                if decision.cost != 0.0 {
                    problem.add_linear_objective_term(&decision.name, decision.cost)?;
                }
            }
            for (index, scenario) in scenarios.iter().enumerate() {
                for decision in &request.second_stage.decisions {
                    let cost = recourse_cost(decision, scenario);
                    if cost != 0.0 {
                        problem.add_linear_objective_term(
                            &scenario_variable(&decision.name, index),
                            scenario.probability * cost,
                        )?;
                    }
                }
            }
        }
        RiskMeasure::WorstCase => {
            problem.add_new_variable(
                "worst_case_cost",
                VariableType::Continuous,
                f64::NEG_INFINITY,
                f64::INFINITY,
            )?;
            problem.add_linear_objective_term("worst_case_cost", 1.0)?;
            // worst_case_cost >= total cost of every scenario
            for (index, scenario) in scenarios.iter().enumerate() {
                let mut refs: Vec<String> = vec!["worst_case_cost".to_string()];
                let mut coefficients: Vec<f64> = vec![1.0];
                for decision in &request.first_stage.decisions {
                    refs.push(decision.name.clone());
                    coefficients.push(-decision.cost);
                }
                for decision in &request.second_stage.decisions {
                    refs.push(scenario_variable(&decision.name, index));
                    coefficients.push(-recourse_cost(decision, scenario));
                }
                let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
                problem.add_new_greater_equal_constraint(
                    &format!("worst_case_s{index}"),
                    &refs,
                    &coefficients,
                    0.0,
                )?;
            }
        }
        RiskMeasure::Cvar => {
            // Linearized CVaR: eta + (1 / (1 - alpha)) * E[(cost_s - eta)+]
            problem.add_new_variable(
                "cvar_eta",
                VariableType::Continuous,
                f64::NEG_INFINITY,
                f64::INFINITY,
            )?;
            problem.add_linear_objective_term("cvar_eta", 1.0)?;
            for decision in &request.first_stage.decisions {
                if decision.cost != 0.0 {
                    problem.add_linear_objective_term(&decision.name, decision.cost)?;
                }
            }
            let scale = 1.0 / (1.0 - risk_parameter);
            for (index, scenario) in scenarios.iter().enumerate() {
                let excess = format!("cvar_excess_s{index}");
                problem.add_new_variable(&excess, VariableType::Continuous, 0.0, f64::INFINITY)?;
                problem.add_linear_objective_term(&excess, scale * scenario.probability)?;
                // excess_s >= second stage cost of the scenario - eta
                let mut refs: Vec<String> = vec![excess.clone(), "cvar_eta".to_string()];
                let mut coefficients: Vec<f64> = vec![1.0, 1.0];
                for decision in &request.second_stage.decisions {
                    refs.push(scenario_variable(&decision.name, index));
                    coefficients.push(-recourse_cost(decision, scenario));
                }
                let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
                problem.add_new_greater_equal_constraint(
                    &format!("cvar_s{index}"),
                    &refs,
                    &coefficients,
                    0.0,
                )?;
            }
        }
    }

    for (index, constraint) in request.first_stage.constraints.iter().enumerate() {
        add_stage_row(
            &mut problem,
            constraint,
            &format!("first_{index}"),
            None,
            None,
        )?;
    }
    for (scenario_index, scenario) in scenarios.iter().enumerate() {
        for (index, constraint) in request.second_stage.constraints.iter().enumerate() {
            add_stage_row(
                &mut problem,
                constraint,
                &format!("second_{index}_s{scenario_index}"),
                Some(scenario_index),
                Some(scenario),
            )?;
        }
    }

    if let Some(fixed) = fixed_first {
        for (name, value) in fixed {
            problem.add_new_equality_constraint(
                &format!("fix_{name}"),
                &[name.as_str()],
                &[1.0],
                *value,
            )?;
        }
    }
    Ok(problem)
}

/// Add one stage constraint row; scenario parameters referenced by the
/// coefficients fold into the right hand side
fn add_stage_row(
    problem: &mut Problem,
    constraint: &StageConstraintSpec,
    id: &str,
    scenario_index: Option<usize>,
    scenario: Option<&ResolvedScenario>,
) -> Result<(), OptimizeError> {
    let mut refs: Vec<String> = Vec::new();
    let mut coefficients: Vec<f64> = Vec::new();
    let mut rhs = constraint.rhs;
    for (name, coefficient) in &constraint.coefficients {
        if problem.variables.contains_key(name) {
            refs.push(name.clone());
            coefficients.push(*coefficient);
            continue;
        }
        if let Some(index) = scenario_index {
            let scoped = scenario_variable(name, index);
            if problem.variables.contains_key(&scoped) {
                refs.push(scoped);
                coefficients.push(*coefficient);
                continue;
            }
        }
        if let Some(scenario) = scenario {
            if let Some(value) = scenario.parameters.get(name) {
                rhs -= coefficient * value;
                continue;
            }
        }
        // References were validated up front; a miss here means a first
        // stage row named a second stage decision
        return Err(ValidationError::UnknownReference {
            kind: "decision",
            name: name.clone(),
            referenced_from: format!("constraint '{id}'"),
        }
        .into());
    }
    let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
    match constraint.op {
        CmpOp::LessEqual => {
            problem.add_new_less_equal_constraint(id, &refs, &coefficients, rhs)?
        }
        CmpOp::GreaterEqual => {
            problem.add_new_greater_equal_constraint(id, &refs, &coefficients, rhs)?
        }
        CmpOp::Equal => problem.add_new_equality_constraint(id, &refs, &coefficients, rhs)?,
    }
    Ok(())
}

/// VSS = EEV - stochastic cost: solve the mean scenario deterministically,
/// fix its first stage decision, and re-price it against the true scenarios
fn compute_vss(
    request: &StochasticRequest,
    scenarios: &[ResolvedScenario],
    stochastic_cost: f64,
    options: &SolverOptions,
) -> Result<Option<ValueOfInformation>, OptimizeError> {
    let mut mean_parameters: IndexMap<String, f64> = IndexMap::new();
    for scenario in scenarios {
        for (name, value) in &scenario.parameters {
            *mean_parameters.entry(name.clone()).or_insert(0.0) += scenario.probability * value;
        }
    }
    let mean_scenario = vec![ResolvedScenario {
        name: "mean".to_string(),
        probability: 1.0,
        parameters: mean_parameters,
    }];

    let deterministic = build_extensive_form(
        request,
        &mean_scenario,
        RiskMeasure::Expected,
        request.risk_parameter,
        None,
    )?;
    let deterministic_solution = selector::dispatch(&deterministic, options)?;
    if !deterministic_solution.is_feasible() {
        return Ok(None);
    }
    let fixed: IndexMap<String, f64> = request
        .first_stage
        .decisions
        .iter()
        .map(|decision| {
            (
                decision.name.clone(),
                deterministic_solution.value_of(&decision.name),
            )
        })
        .collect();

    let pinned = build_extensive_form(
        request,
        scenarios,
        RiskMeasure::Expected,
        request.risk_parameter,
        Some(&fixed),
    )?;
    let pinned_solution = selector::dispatch(&pinned, options)?;
    if !pinned_solution.is_feasible() {
        // The mean scenario decision is not even feasible across the true
        // scenarios; the gap is unbounded and no finite VSS is reported
        return Ok(None);
    }
    let eev = pinned_solution.objective_value.unwrap_or(stochastic_cost);
    debug!("vss: eev {eev}, stochastic {stochastic_cost}");
    Ok(Some(ValueOfInformation {
        value: (eev - stochastic_cost).max(0.0),
        interpretation: "expected cost saved by solving the stochastic model instead of \
                         planning for the mean scenario"
            .to_string(),
    }))
}

/// EVPI = stochastic cost - expected wait and see cost
fn compute_evpi(
    request: &StochasticRequest,
    scenarios: &[ResolvedScenario],
    stochastic_cost: f64,
    options: &SolverOptions,
) -> Result<Option<ValueOfInformation>, OptimizeError> {
    let mut wait_and_see = 0.0;
    for scenario in scenarios {
        let single = vec![ResolvedScenario {
            name: scenario.name.clone(),
            probability: 1.0,
            parameters: scenario.parameters.clone(),
        }];
        let problem = build_extensive_form(
            request,
            &single,
            RiskMeasure::Expected,
            request.risk_parameter,
            None,
        )?;
        let solution = selector::dispatch(&problem, options)?;
        if !solution.is_feasible() {
            return Ok(None);
        }
        wait_and_see += scenario.probability * solution.objective_value.unwrap_or(0.0);
    }
    debug!("evpi: wait-and-see {wait_and_see}, stochastic {stochastic_cost}");
    Ok(Some(ValueOfInformation {
        value: (stochastic_cost - wait_and_see).max(0.0),
        interpretation: "maximum expected value of a perfect forecast of the scenario"
            .to_string(),
    }))
}

fn monte_carlo_block(
    first_stage: &IndexMap<String, f64>,
    scenarios: &[ResolvedScenario],
    expected_cost: f64,
) -> MonteCarloCompatible {
    let mut assumptions = Vec::new();
    'outer: for scenario in scenarios {
        for (name, value) in &scenario.parameters {
            if assumptions.len() >= 10 {
                break 'outer;
            }
            assumptions.push(normal_assumption(
                format!("scenario_{}_{name}", scenario.name),
                *value,
                0.10,
            ));
        }
    }
    MonteCarloCompatible::new(
        first_stage.clone(),
        Vec::new(),
        assumptions,
        format!(
            "Two-stage stochastic optimization: expected cost = {expected_cost:.2} across {} \
             scenarios",
            scenarios.len()
        ),
        "Two-stage stochastic optimization with recourse".to_string(),
        Some(SuccessCriteria {
            threshold: expected_cost * 1.1,
            comparison: "<=".to_string(),
        }),
    )
}
