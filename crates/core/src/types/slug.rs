//! URL slug type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9-]`.
    #[error("slug may only contain lowercase letters, digits and hyphens (found {0:?})")]
    InvalidCharacter(char),
    /// Leading, trailing or doubled hyphen.
    #[error("slug cannot start or end with a hyphen or contain consecutive hyphens")]
    MisplacedHyphen,
}

/// A URL-safe identifier for stores, products, categories and collections.
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - Only lowercase ASCII letters, digits and hyphens
/// - No leading, trailing or consecutive hyphens
///
/// ## Examples
///
/// ```
/// use tillbox_core::Slug;
///
/// assert!(Slug::parse("summer-sale-2026").is_ok());
/// assert!(Slug::parse("Summer").is_err());
/// assert!(Slug::parse("-leading").is_err());
///
/// assert_eq!(Slug::from_name("Linen Shirt (Blue)").as_str(), "linen-shirt-blue");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `Slug` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input violates any of the constraints above.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(SlugError::InvalidCharacter(c));
        }

        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::MisplacedHyphen);
        }

        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name.
    ///
    /// Runs of non-alphanumeric characters collapse into one hyphen. Names with
    /// no usable characters produce `"item"`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
            if out.len() >= Self::MAX_LENGTH {
                break;
            }
        }

        out.truncate(Self::MAX_LENGTH);
        while out.ends_with('-') {
            out.pop();
        }

        if out.is_empty() {
            return Self("item".to_owned());
        }
        Self(out)
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Slug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Slug::parse("a").is_ok());
        assert!(Slug::parse("shirts-2026").is_ok());
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert_eq!(Slug::parse("Shirts"), Err(SlugError::InvalidCharacter('S')));
        assert_eq!(Slug::parse("a_b"), Err(SlugError::InvalidCharacter('_')));
        assert_eq!(Slug::parse("a--b"), Err(SlugError::MisplacedHyphen));
        assert_eq!(Slug::parse("a-"), Err(SlugError::MisplacedHyphen));
        assert!(matches!(
            Slug::parse(&"a".repeat(65)),
            Err(SlugError::TooLong { max: 64 })
        ));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Slug::from_name("  Hello,  World!  ").as_str(), "hello-world");
        assert_eq!(Slug::from_name("Café Crème").as_str(), "caf-cr-me");
        assert_eq!(Slug::from_name("!!!").as_str(), "item");
    }

    #[test]
    fn test_from_name_is_always_parseable() {
        for name in ["A very long product name ".repeat(8), "x-y".into(), "--".into()] {
            let slug = Slug::from_name(&name);
            assert!(Slug::parse(slug.as_str()).is_ok(), "{slug}");
        }
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Slug>("\"ok-slug\"").is_ok());
        assert!(serde_json::from_str::<Slug>("\"Not Ok\"").is_err());
    }
}
