use thiserror::Error;

/// Errors raised by the simulation core.
///
/// Every error is raised where it is detected and propagated unchanged; the core
/// never retries because a run is a pure function of its configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(
        "withdrawal solver did not converge after {iterations} iterations \
         (target net {target_net:.2}, last gross {last_gross:.2})"
    )]
    Convergence {
        target_net: f64,
        iterations: u32,
        last_gross: f64,
    },
}

impl SimulationError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
