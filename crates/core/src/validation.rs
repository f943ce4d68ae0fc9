//! Input validation shared by the admin and storefront write paths.
//!
//! Each check names the offending field so the HTTP layer can return a
//! precise 422 response.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Maximum length of a display name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum quantity of a single product in one cart.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// A rejected input field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("{field} must have at most 2 decimal places")]
    TooPrecise { field: &'static str },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
    },

    #[error("{min_field} must be less than {max_field}")]
    InvertedRange {
        min_field: &'static str,
        max_field: &'static str,
    },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Invalid`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Trim a required name and check its length.
///
/// # Errors
///
/// Returns an error if the trimmed name is empty or too long.
pub fn name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required { field });
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(trimmed.to_owned())
}

/// Normalize optional free text: trims, and blank becomes `None`.
#[must_use]
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Check a monetary amount.
///
/// # Errors
///
/// Returns an error if the amount is negative or has sub-cent precision.
pub fn money(field: &'static str, value: Decimal) -> Result<Decimal, ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::Negative { field });
    }
    if value.normalize().scale() > 2 {
        return Err(ValidationError::TooPrecise { field });
    }
    Ok(value)
}

/// Check a discount percentage: `0 < p <= 100`.
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] otherwise.
pub fn percentage(field: &'static str, value: Decimal) -> Result<Decimal, ValidationError> {
    if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field,
            min: "0 (exclusive)".to_owned(),
            max: "100".to_owned(),
        });
    }
    Ok(value)
}

/// Check that an optional window end falls after its start.
///
/// # Errors
///
/// Returns [`ValidationError::InvertedRange`] if `ends_at <= starts_at`.
pub fn time_window(
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match ends_at {
        Some(end) if end <= starts_at => Err(ValidationError::InvertedRange {
            min_field: "starts_at",
            max_field: "ends_at",
        }),
        _ => Ok(()),
    }
}

/// Check that an optional `[min, max)` band is ordered when both ends are set.
///
/// # Errors
///
/// Returns [`ValidationError::InvertedRange`] if `min >= max`.
pub fn ordered_range<T: PartialOrd>(
    min_field: &'static str,
    min: Option<T>,
    max_field: &'static str,
    max: Option<T>,
) -> Result<(), ValidationError> {
    match (min, max) {
        (Some(lo), Some(hi)) if lo >= hi => Err(ValidationError::InvertedRange {
            min_field,
            max_field,
        }),
        _ => Ok(()),
    }
}

/// Check a requested cart line quantity (`1..=99`).
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] otherwise.
pub fn line_quantity(value: i32) -> Result<i32, ValidationError> {
    if (1..=MAX_LINE_QUANTITY).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field: "quantity",
            min: "1".to_owned(),
            max: MAX_LINE_QUANTITY.to_string(),
        })
    }
}

/// Check an optional non-negative integer such as a weight or stock level.
///
/// # Errors
///
/// Returns [`ValidationError::Negative`] for values below zero.
pub fn non_negative(field: &'static str, value: Option<i32>) -> Result<Option<i32>, ValidationError> {
    match value {
        Some(v) if v < 0 => Err(ValidationError::Negative { field }),
        other => Ok(other),
    }
}

/// Check an absolute `http`/`https` URL (product images).
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] for anything else.
pub fn image_url(value: &str) -> Result<String, ValidationError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|e| ValidationError::invalid("url", e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.into()),
        other => Err(ValidationError::invalid(
            "url",
            format!("unsupported scheme {other:?}"),
        )),
    }
}

/// Check the rough shape of a contact e-mail (`local@domain`).
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] when the shape is wrong.
pub fn email(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            if trimmed.len() > 254 {
                return Err(ValidationError::TooLong {
                    field: "contact_email",
                    max: 254,
                });
            }
            Ok(trimmed.to_owned())
        }
        _ => Err(ValidationError::invalid(
            "contact_email",
            "expected local@domain",
        )),
    }
}
