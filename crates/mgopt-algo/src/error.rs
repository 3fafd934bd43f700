//! Error type for model building, solving and the horizon driver.

use mgopt_core::MgError;
use thiserror::Error;

/// Errors raised while preparing, building or solving a dispatch problem.
///
/// Solver non-optimal statuses are not errors: they come back as a
/// [`crate::solver::SolveStatus`] and the driver records a failed horizon.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Unrecoverable build-time configuration problem
    #[error("configuration error: {0}")]
    Config(String),

    /// A directed line has no partner pointing back
    #[error("{network} line {from} -> {to} has no reverse line {to} -> {from}")]
    MissingReverseLine {
        network: String,
        from: String,
        to: String,
    },

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// Missing timestamp or series in the forecast source
    #[error("forecast lookup failed: {0}")]
    Forecast(String),

    /// The backend could not be set up or crashed
    #[error("solver failure: {0}")]
    Solver(String),

    #[error("numerical issue: {0}")]
    NumericalIssue(String),

    #[error(transparent)]
    Plant(#[from] MgError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reverse_line_names_both_ends() {
        let err = DispatchError::MissingReverseLine {
            network: "heat".into(),
            from: "A".into(),
            to: "B".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("A -> B"));
        assert!(msg.contains("B -> A"));
    }

    #[test]
    fn plant_errors_convert() {
        let err: DispatchError = MgError::Validation("bad".into()).into();
        assert!(matches!(err, DispatchError::Plant(_)));
    }
}
