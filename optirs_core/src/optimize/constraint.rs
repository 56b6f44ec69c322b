//! Provides structs for representing constraints in an optimization problem
use std::fmt::{Display, Formatter};

/// Represents a constraint in an optimization problem
///
/// Linear rows are expressed either as an equality or as a two sided
/// inequality (one sided rows use `f64::INFINITY` / `f64::NEG_INFINITY` for
/// the unused bound). The quadratic variant carries a `xᵀQx <= bound` cap
/// through to the conic backend without any reformulation.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// An equality constraint, where the sum of `terms` = `equals`
    Equality {
        /// Linear terms which are added together, see [`ConstraintTerm`]
        terms: Vec<ConstraintTerm>,
        /// The right hand side of the equality constraint
        equals: f64,
    },
    /// An inequality constraint
    Inequality {
        /// Linear terms which are added together, see [`ConstraintTerm`]
        terms: Vec<ConstraintTerm>,
        /// The lowest value the sum of the terms can take
        lower_bound: f64,
        /// The highest value the sum of the terms can take
        upper_bound: f64,
    },
    /// A convex quadratic cap, where the quadratic form of `terms` must stay
    /// below `upper_bound`
    QuadraticCap {
        /// Quadratic terms which are added together, see [`QuadraticTerm`]
        terms: Vec<QuadraticTerm>,
        /// The highest value the quadratic form can take
        upper_bound: f64,
    },
}

impl Constraint {
    /// Create a new equality constraint from parallel slices of variable ids
    /// and coefficients
    pub fn new_equality(variables: &[&str], coefficients: &[f64], equals: f64) -> Self {
        Constraint::Equality {
            terms: Constraint::zip_into_terms(variables, coefficients),
            equals,
        }
    }

    /// Create a new two sided inequality constraint
    pub fn new_inequality(
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Self {
        Constraint::Inequality {
            terms: Constraint::zip_into_terms(variables, coefficients),
            lower_bound,
            upper_bound,
        }
    }

    /// Create a new `sum <= upper_bound` constraint
    pub fn new_less_equal(variables: &[&str], coefficients: &[f64], upper_bound: f64) -> Self {
        Constraint::new_inequality(variables, coefficients, f64::NEG_INFINITY, upper_bound)
    }

    /// Create a new `sum >= lower_bound` constraint
    pub fn new_greater_equal(variables: &[&str], coefficients: &[f64], lower_bound: f64) -> Self {
        Constraint::new_inequality(variables, coefficients, lower_bound, f64::INFINITY)
    }

    /// Create a new quadratic cap constraint from (variable, variable,
    /// coefficient) triples
    pub fn new_quadratic_cap(terms: Vec<QuadraticTerm>, upper_bound: f64) -> Self {
        Constraint::QuadraticCap { terms, upper_bound }
    }

    /// Ids of every variable referenced by this constraint
    pub fn variable_ids(&self) -> Vec<&str> {
        match self {
            Constraint::Equality { terms, .. } | Constraint::Inequality { terms, .. } => {
                terms.iter().map(|t| t.variable.as_str()).collect()
            }
            Constraint::QuadraticCap { terms, .. } => terms
                .iter()
                .flat_map(|t| [t.variable1.as_str(), t.variable2.as_str()])
                .collect(),
        }
    }

    /// Take a slice of variable ids and a slice of coefficients and zip them
    /// together into a vec of ConstraintTerms
    fn zip_into_terms(variables: &[&str], coefficients: &[f64]) -> Vec<ConstraintTerm> {
        variables
            .iter()
            .zip(coefficients)
            .map(|(var, coef)| ConstraintTerm {
                variable: var.to_string(),
                coefficient: *coef,
            })
            .collect()
    }

    fn terms_to_string(terms: &[ConstraintTerm]) -> String {
        terms
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Equality { terms, equals } => {
                write!(f, "{} = {}", Self::terms_to_string(terms), equals)
            }
            Constraint::Inequality {
                terms,
                lower_bound,
                upper_bound,
            } => write!(
                f,
                "{} <= {} <= {}",
                lower_bound,
                Self::terms_to_string(terms),
                upper_bound
            ),
            Constraint::QuadraticCap { terms, upper_bound } => {
                let quadratic = terms
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" + ");
                write!(f, "{} <= {}", quadratic, upper_bound)
            }
        }
    }
}

/// Represents a single linear term in a constraint, specifically the
/// multiplication of the `variable` by the `coefficient`
#[derive(Debug, Clone)]
pub struct ConstraintTerm {
    /// Id of the variable
    pub variable: String,
    /// The coefficient for the variable
    pub coefficient: f64,
}

impl Display for ConstraintTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{}", self.coefficient, self.variable)
    }
}

/// A single quadratic term, `coefficient * variable1 * variable2`
#[derive(Debug, Clone)]
pub struct QuadraticTerm {
    /// Id of the first variable
    pub variable1: String,
    /// Id of the second variable
    pub variable2: String,
    /// The coefficient for the product
    pub coefficient: f64,
}

impl Display for QuadraticTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{}*{}", self.coefficient, self.variable1, self.variable2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_sided_rows_use_infinite_bounds() {
        let le = Constraint::new_less_equal(&["x", "y"], &[3.0, 2.0], 6.0);
        match le {
            Constraint::Inequality {
                lower_bound,
                upper_bound,
                ref terms,
            } => {
                assert!(lower_bound.is_infinite() && lower_bound < 0.0);
                assert!((upper_bound - 6.0).abs() < 1e-12);
                assert_eq!(terms.len(), 2);
            }
            _ => panic!("expected inequality"),
        }
        let ge = Constraint::new_greater_equal(&["x"], &[1.0], 2.0);
        match ge {
            Constraint::Inequality {
                lower_bound,
                upper_bound,
                ..
            } => {
                assert!((lower_bound - 2.0).abs() < 1e-12);
                assert!(upper_bound.is_infinite() && upper_bound > 0.0);
            }
            _ => panic!("expected inequality"),
        }
    }

    #[test]
    fn variable_ids_cover_quadratic_terms() {
        let cap = Constraint::new_quadratic_cap(
            vec![QuadraticTerm {
                variable1: "w1".into(),
                variable2: "w2".into(),
                coefficient: 0.5,
            }],
            0.1,
        );
        assert_eq!(cap.variable_ids(), vec!["w1", "w2"]);
    }

    #[test]
    fn display_renders_rows() {
        let eq = Constraint::new_equality(&["x", "y"], &[2.0, 3.0], 200.0);
        assert_eq!(format!("{}", eq), "2*x + 3*y = 200");
    }
}
