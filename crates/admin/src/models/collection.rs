//! Collection payloads.

use serde::Deserialize;

use tillbox_core::catalog::Collection;
use tillbox_core::validation::{self, ValidationError};
use tillbox_core::Slug;

use super::{nullable, parse_slug, patch, slug_or_derived};

/// `POST /api/stores/{store_id}/collections`
#[derive(Debug, Deserialize)]
pub struct CreateCollectionInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// `PATCH /api/stores/{store_id}/collections/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCollectionInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub is_published: Option<bool>,
}

/// Validated collection columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFields {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub is_published: bool,
}

impl CreateCollectionInput {
    /// Validate into storable fields.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(self) -> Result<CollectionFields, ValidationError> {
        let name = validation::name("name", &self.name)?;
        Ok(CollectionFields {
            slug: slug_or_derived(self.slug.as_deref(), &name)?,
            name,
            description: validation::optional_text(self.description.as_deref()),
            is_published: self.is_published,
        })
    }
}

impl UpdateCollectionInput {
    /// Merge onto the stored row and validate.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn apply(self, current: &Collection) -> Result<CollectionFields, ValidationError> {
        let name = match self.name {
            Some(n) => validation::name("name", &n)?,
            None => current.name.clone(),
        };
        let slug = match self.slug {
            Some(s) => parse_slug(&s)?,
            None => current.slug.clone(),
        };
        let description = patch(self.description, current.description.clone());

        Ok(CollectionFields {
            name,
            slug,
            description: validation::optional_text(description.as_deref()),
            is_published: self.is_published.unwrap_or(current.is_published),
        })
    }
}
