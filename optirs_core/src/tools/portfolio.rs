//! Portfolio optimization tool
//!
//! Markowitz style allocation over asset weights with three objective modes:
//! risk adjusted excess return ("sharpe"), minimum variance subject to a
//! target return, and maximum return subject to a variance ceiling. The
//! quadratic risk form passes through to the conic backend unreformulated.
use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};

use crate::io::monte_carlo;
use crate::io::request::{PortfolioObjective, PortfolioRequest};
use crate::io::validate::{self, ValidationError};
use crate::optimize::constraint::Constraint;
use crate::optimize::problem::Problem;
use crate::optimize::reformulate::quadratic_form_terms;
use crate::optimize::variable::VariableType;
use crate::optimize::{selector, ProblemSolution, SolverOptions};
use crate::tools::result::{
    normal_assumption, AssetOutcome, MonteCarloCompatible, OptimizationResult, ResultStatus,
    SuccessCriteria, ToolAnalytics,
};
use crate::tools::OptimizeError;

/// Risk aversion used by the sharpe surrogate objective
const RISK_AVERSION: f64 = 0.5;

/// Optimize portfolio weights with risk/return tradeoffs
pub fn optimize_portfolio(
    request: &PortfolioRequest,
) -> Result<OptimizationResult, OptimizeError> {
    validate::validate_assets(&request.assets, &request.covariance_matrix)?;
    if let Some(integration) = &request.monte_carlo_integration {
        validate::validate_mc_integration(integration)?;
    }
    match request.optimization_objective {
        PortfolioObjective::MinVariance if request.constraints.target_return.is_none() => {
            return Err(ValidationError::MissingField {
                field: "target_return",
                context: "portfolio constraints",
            }
            .into());
        }
        PortfolioObjective::MaxReturn if request.constraints.target_risk.is_none() => {
            return Err(ValidationError::MissingField {
                field: "target_risk",
                context: "portfolio constraints",
            }
            .into());
        }
        _ => {}
    }

    let asset_names: Vec<String> = request.assets.iter().map(|a| a.name.clone()).collect();
    let mut returns: IndexMap<String, f64> = request
        .assets
        .iter()
        .map(|a| (a.name.clone(), a.expected_return))
        .collect();
    if let Some(integration) = &request.monte_carlo_integration {
        monte_carlo::apply_overrides(&mut returns, integration)?;
    }

    // Symmetrize the covariance before building any quadratic form
    let n = asset_names.len();
    let covariance: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| (request.covariance_matrix[i][j] + request.covariance_matrix[j][i]) / 2.0)
                .collect()
        })
        .collect();

    let bounds = &request.constraints;
    let lower = if bounds.long_only {
        bounds.min_weight
    } else {
        -bounds.max_weight
    };
    let mut problem = match request.optimization_objective {
        PortfolioObjective::MinVariance => Problem::new_minimization(),
        _ => Problem::new_maximization(),
    };
    for name in &asset_names {
        problem.add_new_variable(name, VariableType::Continuous, lower, bounds.max_weight)?;
    }
    let refs: Vec<&str> = asset_names.iter().map(String::as_str).collect();
    problem.add_new_equality_constraint("weight_sum", &refs, &vec![1.0; n], 1.0)?;

    match request.optimization_objective {
        PortfolioObjective::Sharpe => {
            // Maximize excess return minus a risk penalty; the risk free rate
            // shifts the objective by a constant and is left out of the model
            for name in &asset_names {
                problem.add_linear_objective_term(name, returns[name])?;
            }
            for term in quadratic_form_terms(&covariance, &refs) {
                problem.add_quadratic_objective_term(
                    &term.variable1,
                    &term.variable2,
                    -RISK_AVERSION * term.coefficient,
                )?;
            }
        }
        PortfolioObjective::MinVariance => {
            for term in quadratic_form_terms(&covariance, &refs) {
                problem.add_quadratic_objective_term(
                    &term.variable1,
                    &term.variable2,
                    term.coefficient,
                )?;
            }
            let coefficients: Vec<f64> = asset_names.iter().map(|name| returns[name]).collect();
            problem.add_new_greater_equal_constraint(
                "target_return",
                &refs,
                &coefficients,
                bounds.target_return.unwrap_or(0.0),
            )?;
        }
        PortfolioObjective::MaxReturn => {
            for name in &asset_names {
                problem.add_linear_objective_term(name, returns[name])?;
            }
            problem.add_constraint(
                "risk_cap",
                Constraint::new_quadratic_cap(
                    quadratic_form_terms(&covariance, &refs),
                    bounds.target_risk.unwrap_or(0.0),
                ),
            )?;
        }
    }

    let options = request
        .solver_options
        .as_ref()
        .map(|spec| spec.to_options())
        .unwrap_or_default();
    let solution = selector::dispatch(&problem, &options)?;

    Ok(build_result(
        request,
        &asset_names,
        &returns,
        &covariance,
        &solution,
    ))
}

fn build_result(
    request: &PortfolioRequest,
    asset_names: &[String],
    returns: &IndexMap<String, f64>,
    covariance: &[Vec<f64>],
    solution: &ProblemSolution,
) -> OptimizationResult {
    let objective_name = match request.optimization_objective {
        PortfolioObjective::Sharpe => "sharpe",
        PortfolioObjective::MinVariance => "min_variance",
        PortfolioObjective::MaxReturn => "max_return",
    };
    let mut result = OptimizationResult::from_solution("clarabel", solution);
    if !solution.is_feasible() {
        result.message = Some(infeasibility_message(result.status, objective_name));
        return result;
    }

    let n = asset_names.len();
    let weights: IndexMap<String, f64> = asset_names
        .iter()
        .map(|name| (name.clone(), solution.value_of(name)))
        .collect();
    result.solution = weights.clone();

    let weight_vector = DVector::from_iterator(n, weights.values().copied());
    let return_vector =
        DVector::from_iterator(n, asset_names.iter().map(|name| returns[name]));
    let covariance_matrix = DMatrix::from_fn(n, n, |i, j| covariance[i][j]);

    let expected_return = return_vector.dot(&weight_vector);
    let portfolio_variance = (&covariance_matrix * &weight_vector).dot(&weight_vector);
    let portfolio_std = portfolio_variance.max(0.0).sqrt();
    let sharpe_ratio = if portfolio_std > 0.0 {
        (expected_return - request.risk_free_rate) / portfolio_std
    } else {
        0.0
    };

    // Each asset's covariance weighted share of the total variance; the
    // shares sum to the portfolio variance and can go negative for hedges
    let marginal = &covariance_matrix * &weight_vector;
    let assets: Vec<AssetOutcome> = asset_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let weight = weight_vector[i];
            let risk_contribution = weight * marginal[i];
            AssetOutcome {
                name: name.clone(),
                weight,
                expected_return: returns[name],
                contribution_to_return: weight * returns[name],
                risk_contribution,
                risk_contribution_pct: if portfolio_variance > 0.0 {
                    risk_contribution / portfolio_variance * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    result.analytics = ToolAnalytics::Portfolio {
        optimization_objective: objective_name.to_string(),
        expected_return,
        portfolio_variance,
        portfolio_std,
        sharpe_ratio,
        assets,
    };

    let assumptions = returns
        .iter()
        .map(|(name, value)| normal_assumption(format!("{name}_return"), *value, 0.20))
        .collect();
    let significant: Vec<String> = weights
        .iter()
        .filter(|(_, w)| w.abs() > 0.001)
        .map(|(name, w)| format!("{w:.3}*{name}_return"))
        .collect();
    result.monte_carlo_compatible = Some(
        MonteCarloCompatible::new(
            weights,
            Vec::new(),
            assumptions,
            format!("Portfolio return = {}", significant.join(" + ")),
            format!("Portfolio allocation with {n} assets"),
            Some(SuccessCriteria {
                threshold: expected_return * 0.9,
                comparison: ">=".to_string(),
            }),
        )
        .with_expected_value(expected_return),
    );
    result
}

fn infeasibility_message(status: ResultStatus, objective: &str) -> String {
    match status {
        ResultStatus::Infeasible => match objective {
            "min_variance" => "Portfolio is infeasible. The target return may be too high \
                               given the asset returns and weight constraints; try reducing \
                               target_return."
                .to_string(),
            "max_return" => "Portfolio is infeasible. The target risk may be too low given \
                             the asset volatilities and weight constraints; try increasing \
                             target_risk."
                .to_string(),
            _ => "Portfolio is infeasible. Check that min_weight and max_weight settings are \
                  not contradictory."
                .to_string(),
        },
        ResultStatus::Unbounded => "Portfolio is unbounded. Ensure weights sum to 1 and have \
                                    reasonable bounds."
            .to_string(),
        other => format!("Portfolio optimization failed with status: {other}"),
    }
}
