//! Shipping destination types.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CountryCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CountryCodeError {
    /// Not exactly two ASCII letters.
    #[error("country code must be two ASCII letters (got {0:?})")]
    Malformed(String),
}

/// An ISO 3166-1 alpha-2 country code, stored upper-case.
///
/// ```
/// use tillbox_core::CountryCode;
///
/// assert_eq!(CountryCode::parse("us").unwrap().as_str(), "US");
/// assert!(CountryCode::parse("USA").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Parse and normalize a country code.
    ///
    /// # Errors
    ///
    /// Returns [`CountryCodeError::Malformed`] unless the input is two ASCII letters.
    pub fn parse(s: &str) -> Result<Self, CountryCodeError> {
        let trimmed = s.trim();
        if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(CountryCodeError::Malformed(s.to_owned()))
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

/// The part of a postal address that shipping decisions depend on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingAddress {
    /// Destination country.
    pub country_code: CountryCode,
    /// State/province code (e.g., "CA"), upper-cased.
    pub province_code: Option<String>,
    /// Postal/ZIP code.
    pub postal_code: Option<String>,
}

impl ShippingAddress {
    /// Create an address with only a country.
    #[must_use]
    pub const fn country(country_code: CountryCode) -> Self {
        Self {
            country_code,
            province_code: None,
            postal_code: None,
        }
    }

    /// Set the province, normalized to upper-case. Blank input clears it.
    #[must_use]
    pub fn with_province(mut self, province_code: Option<&str>) -> Self {
        self.province_code = province_code
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_ascii_uppercase);
        self
    }

    /// Set the postal code. Blank input clears it.
    #[must_use]
    pub fn with_postal_code(mut self, postal_code: Option<&str>) -> Self {
        self.postal_code = postal_code
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned);
        self
    }
}
