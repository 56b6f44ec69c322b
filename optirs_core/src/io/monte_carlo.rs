//! Consumption of Monte Carlo simulation output
//!
//! Tools accept an optional `monte_carlo_integration` block that replaces
//! nominal input values with numbers extracted from a simulation: a single
//! percentile, the expected values, or (for tools that understand them) the
//! raw scenarios. Only *consumption* lives here; generating scenarios is the
//! business of the upstream simulation tooling.
use indexmap::IndexMap;

use crate::io::request::{McIntegrationSpec, McMode, McOutputSpec};
use crate::io::validate::ValidationError;

/// Extract the value map for one percentile from a simulation output
///
/// The percentile label is matched case insensitively.
pub fn percentile_values<'a>(
    output: &'a McOutputSpec,
    percentile: &str,
) -> Result<&'a IndexMap<String, f64>, ValidationError> {
    let Some(percentiles) = &output.percentiles else {
        return Err(ValidationError::MissingField {
            field: "percentiles",
            context: "monte carlo output",
        });
    };
    let wanted = percentile.to_lowercase();
    percentiles
        .iter()
        .find(|(label, _)| label.to_lowercase() == wanted)
        .map(|(_, values)| values)
        .ok_or_else(|| ValidationError::InvalidPercentile {
            value: percentile.to_string(),
        })
}

/// Extract expected values, falling back to the p50 percentile when the
/// simulation output carries no explicit expectation
pub fn expected_values(output: &McOutputSpec) -> Result<IndexMap<String, f64>, ValidationError> {
    if let Some(expected) = &output.expected_outcome {
        return Ok(expected.clone());
    }
    percentile_values(output, "p50").map(|values| values.clone())
}

/// Extract the full scenario list for robust evaluation
pub fn scenario_values(
    output: &McOutputSpec,
) -> Result<&Vec<IndexMap<String, f64>>, ValidationError> {
    output
        .scenarios
        .as_ref()
        .ok_or(ValidationError::MissingField {
            field: "scenarios",
            context: "monte carlo output",
        })
}

/// Resolve the value map an integration block asks for
///
/// Scenario mode resolves to expected values here; tools with real scenario
/// support read [`scenario_values`] themselves.
pub fn resolve_values(
    integration: &McIntegrationSpec,
) -> Result<IndexMap<String, f64>, ValidationError> {
    match integration.mode {
        McMode::Percentile => {
            let percentile = integration.percentile.as_deref().unwrap_or("p50");
            percentile_values(&integration.mc_output, percentile).map(|values| values.clone())
        }
        McMode::Expected | McMode::Scenarios => expected_values(&integration.mc_output),
    }
}

/// Overwrite entries of `values` with simulation derived numbers
///
/// Only keys already present are overridden; simulation outputs routinely
/// carry values for quantities the current problem does not use.
pub fn apply_overrides(
    values: &mut IndexMap<String, f64>,
    integration: &McIntegrationSpec,
) -> Result<(), ValidationError> {
    let resolved = resolve_values(integration)?;
    for (name, value) in values.iter_mut() {
        if let Some(replacement) = resolved.get(name) {
            *value = *replacement;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with_percentiles() -> McOutputSpec {
        let mut p50 = IndexMap::new();
        p50.insert("a".to_string(), 10.0);
        p50.insert("b".to_string(), 20.0);
        let mut p90 = IndexMap::new();
        p90.insert("a".to_string(), 15.0);
        let mut percentiles = IndexMap::new();
        percentiles.insert("P50".to_string(), p50);
        percentiles.insert("p90".to_string(), p90);
        McOutputSpec {
            percentiles: Some(percentiles),
            expected_outcome: None,
            scenarios: None,
        }
    }

    #[test]
    fn percentile_lookup_is_case_insensitive() {
        let output = output_with_percentiles();
        let values = percentile_values(&output, "p50").unwrap();
        assert!((values["a"] - 10.0).abs() < 1e-12);
        let values = percentile_values(&output, "P90").unwrap();
        assert!((values["a"] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn expected_values_fall_back_to_p50() {
        let output = output_with_percentiles();
        let values = expected_values(&output).unwrap();
        assert!((values["b"] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn overrides_touch_only_known_keys() {
        let output = output_with_percentiles();
        let integration = McIntegrationSpec {
            mode: McMode::Percentile,
            percentile: Some("p90".to_string()),
            mc_output: output,
        };
        let mut values = IndexMap::new();
        values.insert("a".to_string(), 1.0);
        values.insert("untouched".to_string(), 2.0);
        apply_overrides(&mut values, &integration).unwrap();
        assert!((values["a"] - 15.0).abs() < 1e-12);
        assert!((values["untouched"] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn missing_scenarios_are_reported() {
        let output = output_with_percentiles();
        assert!(matches!(
            scenario_values(&output),
            Err(ValidationError::MissingField { .. })
        ));
    }
}
