//! Unified error type for the plant data model.
//!
//! [`MgError`] is what the core crate returns from validation and lookup.
//! Downstream crates wrap it (the algorithm crate converts it with `#[from]`)
//! so that errors raised while reading a plant keep their category.

use thiserror::Error;

/// Error raised by plant description, configuration and lookups.
#[derive(Error, Debug)]
pub enum MgError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Plant data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network structure errors (connections, lines)
    #[error("Network error: {0}")]
    Network(String),
}

/// Convenience type alias for Results using MgError.
pub type MgResult<T> = Result<T, MgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MgError::Network("node A lists B but B does not list A".into());
        assert!(err.to_string().contains("Network error"));
        assert!(err.to_string().contains("does not list A"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "plant.json");
        let err: MgError = io_err.into();
        assert!(matches!(err, MgError::Io(_)));
    }

    #[test]
    fn test_display_prefix_per_variant() {
        let errors = [
            MgError::Io(std::io::Error::other("disk")),
            MgError::Validation("v".into()),
            MgError::Config("c".into()),
            MgError::Network("n".into()),
        ];
        for err in &errors {
            let prefix = match err {
                MgError::Io(_) => "I/O error",
                MgError::Validation(_) => "Validation error",
                MgError::Config(_) => "Configuration error",
                MgError::Network(_) => "Network error",
            };
            assert!(err.to_string().starts_with(prefix), "{err}");
        }
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> MgResult<()> {
            Err(MgError::Validation("negative size".into()))
        }

        fn outer() -> MgResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
