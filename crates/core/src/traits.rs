//! Core traits for metaquery

use crate::error::EngineResult;

// ============================================================================
// Validatable Trait
// ============================================================================

/// Trait for types that can be validated
///
/// Types implementing this trait can check their internal consistency
/// and return validation errors if the state is invalid.
///
/// # Example
///
/// ```rust,ignore
/// use metaquery_core::{Validatable, EngineResult, EngineError};
///
/// struct Tag {
///     code: String,
/// }
///
/// impl Validatable for Tag {
///     fn validate(&self) -> EngineResult<()> {
///         if self.code.is_empty() {
///             return Err(EngineError::entity_validation("tag", "Code cannot be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validate the current state of the object
    ///
    /// Returns `Ok(())` if valid, or an `EngineError` describing the problem.
    fn validate(&self) -> EngineResult<()>;

    /// Check if the object is valid without returning error details
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get all validation errors (for types that can have multiple errors)
    fn validation_errors(&self) -> Vec<String> {
        match self.validate() {
            Ok(()) => vec![],
            Err(e) => vec![e.to_string()],
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Gate {
        open: bool,
    }

    impl Validatable for Gate {
        fn validate(&self) -> EngineResult<()> {
            if self.open {
                Ok(())
            } else {
                Err(crate::error::EngineError::entity_validation(
                    "gate",
                    "Gate is closed",
                ))
            }
        }
    }

    #[test]
    fn test_validatable_trait() {
        let valid = Gate { open: true };
        assert!(valid.is_valid());
        assert!(valid.validation_errors().is_empty());

        let invalid = Gate { open: false };
        assert!(!invalid.is_valid());
        assert_eq!(
            invalid.validation_errors(),
            vec!["Entity validation failed for 'gate': Gate is closed".to_string()]
        );
    }
}
