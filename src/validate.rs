use thiserror::Error;

use crate::AppError;

/// Draft shape violations, rejected before a mutation ever reaches the
/// controller or the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name must be at least {min} characters long")]
    NameTooShort { min: usize },
    #[error("Amount must be a finite number")]
    AmountNotFinite,
    #[error("Budget start must be before its end")]
    WindowInverted,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::NameTooShort { .. } => "VALIDATION/NAME",
            ValidationError::AmountNotFinite => "VALIDATION/AMOUNT",
            ValidationError::WindowInverted => "VALIDATION/WINDOW",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::new(err.code(), err.to_string())
    }
}

/// Names are trimmed before length-checking; the stored value keeps the
/// caller's original spelling minus surrounding whitespace.
pub(crate) fn name(value: &str, min: usize) -> Result<(), ValidationError> {
    if value.trim().chars().count() < min {
        return Err(ValidationError::NameTooShort { min });
    }
    Ok(())
}

pub(crate) fn amount(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::AmountNotFinite);
    }
    Ok(())
}
