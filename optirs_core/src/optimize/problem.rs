//! Provides a struct representing an optimization problem
use indexmap::IndexMap;
use thiserror::Error;

use crate::optimize::constraint::{Constraint, ConstraintTerm, QuadraticTerm};
use crate::optimize::objective::{Objective, ObjectiveSense, ObjectiveTerm};
use crate::optimize::variable::{Variable, VariableType};

/// An optimization problem
///
/// Problems are built once, handed to a solver backend, and dropped; they are
/// never shared or mutated across calls.
#[derive(Debug, Clone)]
pub struct Problem {
    /// Objective to optimize
    pub objective: Objective,
    /// Variables of the optimization problem, keyed by id
    pub variables: IndexMap<String, Variable>,
    /// Constraints of the optimization problem, keyed by id
    pub constraints: IndexMap<String, Constraint>,
    /// Type of problem, updated as variables and terms are added
    problem_type: ProblemType,
}

impl Problem {
    // region Creation Functions
    /// Create a new optimization problem
    pub fn new(objective_sense: ObjectiveSense) -> Self {
        Self {
            objective: Objective::new(objective_sense),
            variables: IndexMap::new(),
            constraints: IndexMap::new(),
            problem_type: ProblemType::LinearContinuous,
        }
    }

    /// Create a new maximization problem
    pub fn new_maximization() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Create a new minimization problem
    pub fn new_minimization() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }
    // endregion Creation Functions

    // region Adding Variables
    /// Add a variable to the optimization problem
    pub fn add_variable(&mut self, mut variable: Variable) -> Result<(), ProblemError> {
        self.validate_variable(&variable)?;
        variable.index = self.variables.len();
        // Update the type of the model if needed
        if variable.is_integral() {
            self.problem_type = match self.problem_type {
                ProblemType::LinearContinuous | ProblemType::LinearMixedInteger => {
                    ProblemType::LinearMixedInteger
                }
                ProblemType::QuadraticContinuous | ProblemType::QuadraticMixedInteger => {
                    ProblemType::QuadraticMixedInteger
                }
            };
        }
        self.variables.insert(variable.id.clone(), variable);
        Ok(())
    }

    /// Create a new variable and add it to the optimization problem
    pub fn add_new_variable(
        &mut self,
        id: &str,
        variable_type: VariableType,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        let variable = Variable {
            id: id.to_string(),
            name: None,
            variable_type,
            lower_bound,
            upper_bound,
            index: 0,
        };
        self.add_variable(variable)
    }

    /// Create a new binary variable and add it to the optimization problem
    pub fn add_new_binary_variable(&mut self, id: &str) -> Result<(), ProblemError> {
        self.add_variable(Variable::binary(id))
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Add a constraint to the problem under the given id
    pub fn add_constraint(&mut self, id: &str, constraint: Constraint) -> Result<(), ProblemError> {
        self.validate_constraint(id, &constraint)?;
        if matches!(constraint, Constraint::QuadraticCap { .. }) {
            self.upgrade_to_quadratic();
        }
        self.constraints.insert(id.to_string(), constraint);
        Ok(())
    }

    /// Create a new equality constraint and add it to the problem
    pub fn add_new_equality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(id, Constraint::new_equality(variables, coefficients, equals))
    }

    /// Create a new `sum <= bound` constraint and add it to the problem
    pub fn add_new_less_equal_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(
            id,
            Constraint::new_less_equal(variables, coefficients, upper_bound),
        )
    }

    /// Create a new `sum >= bound` constraint and add it to the problem
    pub fn add_new_greater_equal_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(
            id,
            Constraint::new_greater_equal(variables, coefficients, lower_bound),
        )
    }
    // endregion Adding Constraints

    // region Adding Objective Terms
    /// Add a new linear term to the objective
    pub fn add_linear_objective_term(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        if !self.variables.contains_key(variable_id) {
            return Err(ProblemError::NonExistentVariablesInObjective);
        }
        self.objective.add_linear_term(variable_id, coefficient);
        Ok(())
    }

    /// Add a new quadratic term to the objective
    pub fn add_quadratic_objective_term(
        &mut self,
        variable1: &str,
        variable2: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        if !self.variables.contains_key(variable1) || !self.variables.contains_key(variable2) {
            return Err(ProblemError::NonExistentVariablesInObjective);
        }
        self.objective
            .add_quadratic_term(variable1, variable2, coefficient);
        self.upgrade_to_quadratic();
        Ok(())
    }
    // endregion Adding Objective Terms

    // region Updating Variables
    /// Update the bounds of an existing variable
    pub fn update_variable_bounds(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        if lower_bound > upper_bound {
            return Err(ProblemError::InvalidVariableBounds);
        }
        match self.variables.get_mut(id) {
            Some(variable) => {
                variable.lower_bound = lower_bound;
                variable.upper_bound = upper_bound;
                Ok(())
            }
            None => Err(ProblemError::NonExistentVariable),
        }
    }
    // endregion Updating Variables

    // region Check Problem
    /// Whether any integer or binary variables are present
    pub fn has_integer_variables(&self) -> bool {
        self.variables.values().any(|v| v.is_integral())
    }

    /// Whether the objective contains quadratic terms
    pub fn has_quadratic_objective(&self) -> bool {
        self.objective.contains_quadratic()
    }

    /// Whether any quadratic cap constraints are present
    pub fn has_quadratic_constraints(&self) -> bool {
        self.constraints
            .values()
            .any(|c| matches!(c, Constraint::QuadraticCap { .. }))
    }

    /// Current type of the problem
    pub fn problem_type(&self) -> ProblemType {
        self.problem_type.clone()
    }

    /// Current number of variables in the problem
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Current number of constraints in the problem
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
    // endregion Check Problem

    // region Validation Functions
    /// Check that a variable is valid to add to this problem
    fn validate_variable(&self, variable: &Variable) -> Result<(), ProblemError> {
        if self.variables.contains_key(&variable.id) {
            return Err(ProblemError::VariableIdAlreadyExists);
        }
        if variable.lower_bound > variable.upper_bound {
            return Err(ProblemError::InvalidVariableBounds);
        }
        Ok(())
    }

    /// Check that a constraint is valid to add to this problem
    fn validate_constraint(&self, id: &str, constraint: &Constraint) -> Result<(), ProblemError> {
        if self.constraints.contains_key(id) {
            return Err(ProblemError::ConstraintAlreadyExists);
        }
        if let Constraint::Inequality {
            lower_bound,
            upper_bound,
            ..
        } = constraint
        {
            if lower_bound > upper_bound {
                return Err(ProblemError::InvalidConstraintBounds);
            }
        }
        for variable_id in constraint.variable_ids() {
            if !self.variables.contains_key(variable_id) {
                return Err(ProblemError::NonExistentVariablesInConstraint);
            }
        }
        Ok(())
    }
    // endregion Validation Functions

    fn upgrade_to_quadratic(&mut self) {
        self.problem_type = match self.problem_type {
            ProblemType::LinearContinuous | ProblemType::QuadraticContinuous => {
                ProblemType::QuadraticContinuous
            }
            ProblemType::LinearMixedInteger | ProblemType::QuadraticMixedInteger => {
                ProblemType::QuadraticMixedInteger
            }
        };
    }
}

/// Types of optimization problems
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProblemType {
    /// Linear objective and constraints, continuous variables
    LinearContinuous,
    /// Quadratic objective or quadratic cap constraints, continuous variables
    QuadraticContinuous,
    /// Linear objective and constraints, some integer or binary variables
    LinearMixedInteger,
    /// Quadratic objective with integer variables
    ///
    /// # Note:
    /// This problem type is not supported by any of the configured backends
    QuadraticMixedInteger,
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemType::LinearContinuous => write!(f, "linear continuous"),
            ProblemType::QuadraticContinuous => write!(f, "quadratic continuous"),
            ProblemType::LinearMixedInteger => write!(f, "linear mixed integer"),
            ProblemType::QuadraticMixedInteger => write!(f, "quadratic mixed integer"),
        }
    }
}

/// Errors associated with building a Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when trying to add a variable with the same id as an existing variable
    #[error("tried to add a variable with the same id as an existing variable")]
    VariableIdAlreadyExists,
    /// Error when trying to add a variable with invalid bounds
    #[error("tried to add a variable with lower_bound > upper_bound")]
    InvalidVariableBounds,
    /// Error when trying to add a constraint with the same id as an existing constraint
    #[error("tried to add a constraint with the same id as an existing constraint")]
    ConstraintAlreadyExists,
    /// Error when trying to add a constraint with invalid bounds
    #[error("tried to add an inequality constraint with lower_bound > upper_bound")]
    InvalidConstraintBounds,
    /// Error when trying to add a constraint that contains variables not in the model
    #[error("tried to add a constraint with variables not in the model")]
    NonExistentVariablesInConstraint,
    /// Error when trying to add an objective term which includes variables not in the model
    #[error("tried adding an objective term with variables not in the model")]
    NonExistentVariablesInObjective,
    /// Error when trying to update a variable that doesn't exist
    #[error("tried to access a variable that doesn't exist")]
    NonExistentVariable,
}
