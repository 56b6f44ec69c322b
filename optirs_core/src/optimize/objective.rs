//! Provides structs for representing an optimization problem's objective
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Represents the objective of an optimization problem
#[derive(Debug, Clone)]
pub struct Objective {
    /// Terms included in the objective, see [`ObjectiveTerm`]
    pub terms: Vec<ObjectiveTerm>,
    /// Sense of the objective, see [`ObjectiveSense`]
    pub sense: ObjectiveSense,
}

impl Objective {
    /// Create a new empty objective with a given sense
    pub fn new(sense: ObjectiveSense) -> Self {
        Self {
            terms: Vec::new(),
            sense,
        }
    }

    /// Create a new empty maximization objective
    pub fn new_maximize() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Create a new empty minimization objective
    pub fn new_minimize() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }

    /// Change the sense of the objective
    pub fn set_sense(&mut self, sense: ObjectiveSense) {
        self.sense = sense;
    }

    /// Add a new term to the objective
    pub fn add_term(&mut self, term: ObjectiveTerm) {
        self.terms.push(term);
    }

    /// Add a new linear term to the objective
    pub fn add_linear_term(&mut self, variable: &str, coefficient: f64) {
        self.terms.push(ObjectiveTerm::new_linear(variable, coefficient));
    }

    /// Add a new quadratic term to the objective
    pub fn add_quadratic_term(&mut self, variable1: &str, variable2: &str, coefficient: f64) {
        self.terms
            .push(ObjectiveTerm::new_quadratic(variable1, variable2, coefficient));
    }

    /// Whether any quadratic term is present
    pub fn contains_quadratic(&self) -> bool {
        self.terms
            .iter()
            .any(|t| matches!(t, ObjectiveTerm::Quadratic { .. }))
    }

    /// Evaluate the objective at a point given as a lookup function from
    /// variable id to value
    pub fn evaluate<F: Fn(&str) -> f64>(&self, value_of: F) -> f64 {
        self.terms
            .iter()
            .map(|term| match term {
                ObjectiveTerm::Linear { var, coef } => coef * value_of(var),
                ObjectiveTerm::Quadratic { var1, var2, coef } => {
                    coef * value_of(var1) * value_of(var2)
                }
            })
            .sum()
    }
}

/// Represents the sense of the objective, whether it should be maximized or
/// minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveSense {
    /// The objective should be minimized
    Minimize,
    /// The objective should be maximized
    Maximize,
}

impl Display for ObjectiveSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveSense::Minimize => write!(f, "minimize"),
            ObjectiveSense::Maximize => write!(f, "maximize"),
        }
    }
}

// region Objective Terms
/// A term in the objective
#[derive(Debug, Clone)]
pub enum ObjectiveTerm {
    /// A quadratic term in the objective
    Quadratic {
        /// Id of the first variable in the term
        var1: String,
        /// Id of the second variable in the term
        var2: String,
        /// Coefficient for the quadratic term
        coef: f64,
    },
    /// A linear term in the objective
    Linear {
        /// Id of the variable in the term
        var: String,
        /// Coefficient for the linear term
        coef: f64,
    },
}

impl ObjectiveTerm {
    /// Create a new quadratic objective term
    pub fn new_quadratic(var1: &str, var2: &str, coef: f64) -> Self {
        ObjectiveTerm::Quadratic {
            var1: var1.to_string(),
            var2: var2.to_string(),
            coef,
        }
    }

    /// Create a new linear objective term
    pub fn new_linear(var: &str, coef: f64) -> Self {
        ObjectiveTerm::Linear {
            var: var.to_string(),
            coef,
        }
    }
}
// endregion Objective Terms

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sense_round_trips_through_serde() {
        let sense: ObjectiveSense = serde_json::from_str("\"maximize\"").unwrap();
        assert_eq!(sense, ObjectiveSense::Maximize);
        assert_eq!(serde_json::to_string(&sense).unwrap(), "\"maximize\"");
    }

    #[test]
    fn contains_quadratic_detects_terms() {
        let mut objective = Objective::new_minimize();
        objective.add_linear_term("x", 1.0);
        assert!(!objective.contains_quadratic());
        objective.add_quadratic_term("x", "x", 2.0);
        assert!(objective.contains_quadratic());
    }

    #[test]
    fn evaluate_combines_linear_and_quadratic_terms() {
        let mut objective = Objective::new_maximize();
        objective.add_linear_term("x", 3.0);
        objective.add_quadratic_term("x", "y", 2.0);
        let value = objective.evaluate(|id| match id {
            "x" => 2.0,
            "y" => 4.0,
            _ => 0.0,
        });
        assert!((value - (3.0 * 2.0 + 2.0 * 2.0 * 4.0)).abs() < 1e-12);
    }
}
