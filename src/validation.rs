//! Data-quality validation for import runs.
//!
//! Validation is distinct from transformation failures: a failed transform
//! means a structural assumption was violated and always aborts the run, while
//! a validation failure is a data-quality verdict that the processor weighs
//! against the `skip-invalid-records` flag.
//!
//! Two seams are provided:
//! - [`Validate`] — type-level rules implemented on the record itself;
//! - [`RecordValidator`] — a per-run validator object, so one import can
//!   tighten or replace the type-level rules without touching the record type.
//!
//! # Example
//!
//! ```
//! use oncoload::validation::{Validate, ValidationError, ValidationResult, validators};
//!
//! #[derive(Clone, Debug)]
//! struct CopyNumber {
//!     gene_symbol: String,
//!     segment_mean: f64,
//! }
//!
//! impl Validate for CopyNumber {
//!     fn validate(&self) -> ValidationResult {
//!         let mut errors = Vec::new();
//!         if let Err(mut e) = validators::gene_symbol("gene_symbol", &self.gene_symbol) {
//!             errors.append(&mut e);
//!         }
//!         if !self.segment_mean.is_finite() {
//!             errors.push(ValidationError::field("segment_mean", "must be finite"));
//!         }
//!         if errors.is_empty() { Ok(()) } else { Err(errors) }
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for validation operations. A non-empty error list means the
/// record is invalid.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Type-level validation rules for a record type.
pub trait Validate {
    /// Validate this instance and return the field errors if invalid.
    fn validate(&self) -> ValidationResult;
}

/// A single field-level validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// The field that failed validation (optional).
    pub field: Option<String>,
    /// Human-readable error message.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error with just a message.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    /// Create a validation error for a specific field.
    pub fn field<S: Into<String>, M: Into<String>>(field: S, message: M) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref field) = self.field {
            write!(f, "[{}] {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Join a list of field errors into one log-friendly line.
pub fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-run validator applied by the processor to every record that survives
/// transformation and filtering.
pub trait RecordValidator<T> {
    fn validate(&self, record: &T) -> ValidationResult;
}

/// Delegates to the record type's own [`Validate`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelValidator;

impl<T: Validate> RecordValidator<T> for ModelValidator {
    fn validate(&self, record: &T) -> ValidationResult {
        record.validate()
    }
}

/// Adapts a closure into a [`RecordValidator`].
pub struct FnValidator<F>(F);

impl<F> FnValidator<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<T, F> RecordValidator<T> for FnValidator<F>
where
    F: Fn(&T) -> ValidationResult,
{
    fn validate(&self, record: &T) -> ValidationResult {
        (self.0)(record)
    }
}

/// Reusable field validators for common patterns in this domain.
pub mod validators {
    use super::{ValidationError, ValidationResult};
    use regex::Regex;
    use std::fmt;
    use std::sync::OnceLock;

    static GENE_SYMBOL: OnceLock<Regex> = OnceLock::new();
    static ALLELE: OnceLock<Regex> = OnceLock::new();

    /// Validate that a string is not empty.
    pub fn not_empty(field: &str, value: &str) -> ValidationResult {
        if value.is_empty() {
            Err(vec![ValidationError::field(field, "must not be empty")])
        } else {
            Ok(())
        }
    }

    /// Validate that a numeric value is within an inclusive range.
    pub fn in_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: T,
        max: T,
    ) -> ValidationResult {
        if value >= min && value <= max {
            Ok(())
        } else {
            Err(vec![ValidationError::field(
                field,
                format!("must be between {min} and {max}"),
            )])
        }
    }

    /// Validate an HGNC-style gene symbol: leading alphanumeric, then
    /// alphanumerics and `@ . _ -`, no whitespace.
    pub fn gene_symbol(field: &str, value: &str) -> ValidationResult {
        let re = GENE_SYMBOL
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9@._-]*$").expect("static pattern"));
        if re.is_match(value) {
            Ok(())
        } else {
            Err(vec![ValidationError::field(
                field,
                format!("not a recognizable gene symbol: {value}"),
            )])
        }
    }

    /// Validate an allele string: one or more of `ACGT` (case-insensitive),
    /// or `-` for a deletion.
    pub fn allele(field: &str, value: &str) -> ValidationResult {
        let re = ALLELE.get_or_init(|| Regex::new(r"^(?:[ACGTacgt]+|-)$").expect("static pattern"));
        if re.is_match(value) {
            Ok(())
        } else {
            Err(vec![ValidationError::field(
                field,
                format!("not a valid allele: {value}"),
            )])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_error_display() {
        let error = ValidationError::field("primary_symbol", "must not be empty");
        assert_eq!(error.to_string(), "[primary_symbol] must not be empty");
        let error = ValidationError::new("unusable row");
        assert_eq!(error.to_string(), "unusable row");
    }

    #[test]
    fn format_errors_joins() {
        let errors = vec![
            ValidationError::field("a", "bad"),
            ValidationError::field("b", "worse"),
        ];
        assert_eq!(format_errors(&errors), "[a] bad, [b] worse");
    }

    #[test]
    fn gene_symbol_patterns() {
        assert!(validators::gene_symbol("s", "TP53").is_ok());
        assert!(validators::gene_symbol("s", "C1orf132").is_ok());
        assert!(validators::gene_symbol("s", "HOXA@").is_ok());
        assert!(validators::gene_symbol("s", "tp53 oops").is_err());
        assert!(validators::gene_symbol("s", "").is_err());
    }

    #[test]
    fn allele_patterns() {
        assert!(validators::allele("ref", "ACGT").is_ok());
        assert!(validators::allele("ref", "-").is_ok());
        assert!(validators::allele("ref", "N").is_err());
        assert!(validators::allele("ref", "").is_err());
    }

    #[test]
    fn in_range_bounds() {
        assert!(validators::in_range("pos", 5u64, 1, 10).is_ok());
        assert!(validators::in_range("pos", 11u64, 1, 10).is_err());
    }

    #[test]
    fn fn_validator_delegates() {
        let validator = FnValidator::new(|value: &u32| {
            if *value % 2 == 0 {
                Ok(())
            } else {
                Err(vec![ValidationError::new("odd")])
            }
        });
        assert!(validator.validate(&4).is_ok());
        assert!(validator.validate(&5).is_err());
    }
}
