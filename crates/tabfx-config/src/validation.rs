//! Validation errors for configuration values.

use thiserror::Error;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Value outside its allowed range.
    #[error("'{field}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the field.
        field: String,
        /// The value that was out of range.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Two fields that are fine alone but not together.
    #[error("inconsistent settings: {0}")]
    Inconsistent(String),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Collects errors across several checks.
#[derive(Debug, Default)]
pub(crate) struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn range(&mut self, field: &str, value: f64, min: f64, max: f64) -> &mut Self {
        if !(value.is_finite() && value >= min && value <= max) {
            self.errors.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min,
                max,
            });
        }
        self
    }

    pub fn require(&mut self, ok: bool, reason: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(ValidationError::Inconsistent(reason.into()));
        }
        self
    }

    pub fn finish(&mut self) -> ValidationResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ValidationError::Multiple(std::mem::take(&mut self.errors))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_error_is_not_wrapped() {
        let err = Validator::default()
            .range("gain", 5.0, 0.0, 1.0)
            .finish()
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn errors_accumulate() {
        let err = Validator::default()
            .range("a", f64::NAN, 0.0, 1.0)
            .range("b", 0.5, 0.0, 1.0)
            .require(false, "a must exceed b")
            .finish()
            .unwrap_err();
        match err {
            ValidationError::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[test]
    fn clean_input_passes() {
        assert!(Validator::default().range("x", 1.0, 1.0, 1.0).finish().is_ok());
    }
}
