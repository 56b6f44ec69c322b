use std::sync::{LazyLock, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

/// Crate wide numeric defaults.
///
/// Solver selection is deliberately *not* part of the configuration: which
/// backend handles a problem is decided per call (see
/// [`crate::optimize::selector`]), so no process wide solver state exists.
pub struct Configuration {
    /// Default lower bound used for variables created without one
    pub lower_bound: f64,
    /// Default upper bound used for variables created without one
    pub upper_bound: f64,
    /// Tolerance used for all floating point comparisons in the crate
    pub tolerance: f64,
    /// Iteration cap for the local search (descent) backend
    pub descent_max_iterations: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: -1000.,
            upper_bound: 1000.,
            tolerance: 1e-6,
            descent_max_iterations: 10_000,
        }
    }
}
