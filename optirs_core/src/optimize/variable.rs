//! Module providing representation of optimization problem variables
use std::fmt::{Display, Formatter};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::configuration::CONFIGURATION;

/// A decision variable in an optimization problem
#[derive(Debug, Clone, Builder)]
pub struct Variable {
    /// Identifier of the variable, unique within a problem
    #[builder(setter(into))]
    pub id: String,
    /// Optional human readable name
    #[builder(default, setter(strip_option, into))]
    pub name: Option<String>,
    /// Type of the variable, see [`VariableType`]
    #[builder(default = "VariableType::Continuous")]
    pub variable_type: VariableType,
    /// Smallest value the variable may take
    #[builder(default = "CONFIGURATION.read().unwrap().lower_bound")]
    pub lower_bound: f64,
    /// Largest value the variable may take
    #[builder(default = "CONFIGURATION.read().unwrap().upper_bound")]
    pub upper_bound: f64,
    /// Position of the variable within its problem, assigned when it is added
    #[builder(default, setter(skip))]
    pub index: usize,
}

impl Variable {
    /// Create a new continuous variable with explicit bounds
    pub fn continuous(id: &str, lower_bound: f64, upper_bound: f64) -> Variable {
        Variable {
            id: id.to_string(),
            name: None,
            variable_type: VariableType::Continuous,
            lower_bound,
            upper_bound,
            index: 0,
        }
    }

    /// Create a new integer variable with explicit bounds
    pub fn integer(id: &str, lower_bound: f64, upper_bound: f64) -> Variable {
        Variable {
            variable_type: VariableType::Integer,
            ..Variable::continuous(id, lower_bound, upper_bound)
        }
    }

    /// Create a new binary (0/1) variable
    pub fn binary(id: &str) -> Variable {
        Variable {
            variable_type: VariableType::Binary,
            ..Variable::continuous(id, 0.0, 1.0)
        }
    }

    /// Whether the variable is restricted to integer values
    pub fn is_integral(&self) -> bool {
        matches!(
            self.variable_type,
            VariableType::Integer | VariableType::Binary
        )
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{}", name, self.variable_type),
            None => write!(f, "{}:{}", self.id, self.variable_type),
        }
    }
}

/// Represents the type of variable in an optimization problem
///
/// # Notes:
/// Not all variable types are supported by all solver backends; the MILP
/// backend accepts all three, while the conic and descent backends only
/// accept continuous variables.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Continuous variable
    Continuous,
    /// Integer variable
    Integer,
    /// Binary variable
    Binary,
}

impl Display for VariableType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Continuous => write!(f, "continuous"),
            VariableType::Integer => write!(f, "integer"),
            VariableType::Binary => write!(f, "binary"),
        }
    }
}
