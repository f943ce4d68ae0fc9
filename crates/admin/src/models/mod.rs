//! Request payloads for the management API.
//!
//! Each resource has a `Create*Input` that validates into `*Fields`, and an
//! `Update*Input` (PATCH) whose absent fields keep their stored value. For
//! nullable columns an explicit `null` clears the value.

pub mod category;
pub mod collection;
pub mod discount;
pub mod product;
pub mod shipping;
pub mod store;

use serde::{Deserialize, Deserializer};

use tillbox_core::validation::ValidationError;
use tillbox_core::{Slug, validation};

/// Deserialize a PATCH field that distinguishes "absent" from `null`.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Resolve a patched nullable field against its current value.
pub(crate) fn patch<T>(update: Option<Option<T>>, current: Option<T>) -> Option<T> {
    update.unwrap_or(current)
}

/// Parse an explicit slug, or derive one from the name.
pub(crate) fn slug_or_derived(slug: Option<&str>, name: &str) -> Result<Slug, ValidationError> {
    match validation::optional_text(slug) {
        Some(s) => Slug::parse(&s).map_err(|e| ValidationError::invalid("slug", e.to_string())),
        None => Ok(Slug::from_name(name)),
    }
}

/// Parse a replacement slug.
pub(crate) fn parse_slug(slug: &str) -> Result<Slug, ValidationError> {
    Slug::parse(slug.trim()).map_err(|e| ValidationError::invalid("slug", e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_absent_and_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"description":"New"}"#).unwrap();

        assert_eq!(absent.description, None);
        assert_eq!(cleared.description, Some(None));
        assert_eq!(set.description, Some(Some("New".to_owned())));

        assert_eq!(patch(absent.description, Some("Old".to_owned())).as_deref(), Some("Old"));
        assert_eq!(patch(cleared.description, Some("Old".to_owned())), None);
    }

    #[test]
    fn test_slug_or_derived() {
        assert_eq!(slug_or_derived(None, "Summer Sale!").unwrap().as_str(), "summer-sale");
        assert_eq!(slug_or_derived(Some("  "), "Hats").unwrap().as_str(), "hats");
        assert_eq!(slug_or_derived(Some("caps"), "Hats").unwrap().as_str(), "caps");
        assert!(slug_or_derived(Some("Bad Slug"), "Hats").is_err());
    }
}
