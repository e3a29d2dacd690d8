//! Validation traits and common validators
//!
//! Configuration structs implement [`Validatable`] and compose the
//! field-level [`Validator`]s below.

use std::fmt::Debug;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Validation error with context
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Value out of range for {field}: expected {expected}, got {actual}")]
    OutOfRange {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Path {path} for {field} is not usable: {message}")]
    Path {
        field: String,
        path: PathBuf,
        message: String,
    },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Name of the offending field, if the error is about a single field
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::Required { field }
            | Self::Path { field, .. } => Some(field),
            Self::Multiple(_) => None,
        }
    }
}

/// Trait for types that can be validated
pub trait Validatable {
    /// Validate the instance, returning Ok(()) if valid or a ValidationError if invalid
    fn validate(&self) -> Result<(), ValidationError>;

    /// Check if the instance is valid without returning the error details
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Trait for validators that can check values
pub trait Validator<T: ?Sized> {
    /// Validate a value
    fn validate(&self, value: &T) -> Result<(), ValidationError>;
}

/// Collect every failing check instead of stopping at the first one
pub fn collect_errors(results: impl IntoIterator<Item = Result<(), ValidationError>>) -> Result<(), ValidationError> {
    let mut errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

/// Requires a path that resolves to an existing, readable directory
pub struct DirectoryValidator {
    field_name: String,
}

impl DirectoryValidator {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
        }
    }

    fn error(&self, path: &Path, message: impl Into<String>) -> ValidationError {
        ValidationError::Path {
            field: self.field_name.clone(),
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl Validator<Path> for DirectoryValidator {
    fn validate(&self, value: &Path) -> Result<(), ValidationError> {
        if value.as_os_str().is_empty() {
            return Err(ValidationError::Required {
                field: self.field_name.clone(),
            });
        }
        if !value.is_absolute() {
            return Err(self.error(value, "path must be absolute"));
        }
        let metadata = std::fs::metadata(value).map_err(|e| self.error(value, e.to_string()))?;
        if !metadata.is_dir() {
            return Err(self.error(value, "not a directory"));
        }
        if metadata.permissions().readonly() {
            return Err(self.error(value, "directory is read-only"));
        }
        std::fs::read_dir(value).map_err(|e| self.error(value, e.to_string()))?;
        Ok(())
    }
}

/// Inclusive range validator
pub struct RangeValidator<T> {
    field_name: String,
    range: RangeInclusive<T>,
}

impl<T> RangeValidator<T> {
    pub fn new(field_name: impl Into<String>, min: T, max: T) -> Self {
        Self {
            field_name: field_name.into(),
            range: min..=max,
        }
    }
}

impl<T: PartialOrd + Debug + ToString> Validator<T> for RangeValidator<T> {
    fn validate(&self, value: &T) -> Result<(), ValidationError> {
        if !self.range.contains(value) {
            return Err(ValidationError::OutOfRange {
                field: self.field_name.clone(),
                expected: format!("{:?}", self.range),
                actual: value.to_string(),
            });
        }
        Ok(())
    }
}

/// Non-empty string validator
pub struct NonEmptyStringValidator {
    field_name: String,
}

impl NonEmptyStringValidator {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
        }
    }
}

impl Validator<str> for NonEmptyStringValidator {
    fn validate(&self, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: self.field_name.clone(),
            });
        }
        Ok(())
    }
}
