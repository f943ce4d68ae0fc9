//! Category payloads.

use serde::Deserialize;

use tillbox_core::catalog::Category;
use tillbox_core::validation::{self, ValidationError};
use tillbox_core::{CategoryId, Slug};

use super::{nullable, parse_slug, patch, slug_or_derived};

/// `POST /api/stores/{store_id}/categories`
#[derive(Debug, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
}

/// `PATCH /api/stores/{store_id}/categories/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<CategoryId>>,
}

/// Validated category columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFields {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
}

impl CreateCategoryInput {
    /// Validate into storable fields.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(self) -> Result<CategoryFields, ValidationError> {
        let name = validation::name("name", &self.name)?;
        Ok(CategoryFields {
            slug: slug_or_derived(self.slug.as_deref(), &name)?,
            name,
            description: validation::optional_text(self.description.as_deref()),
            parent_id: self.parent_id,
        })
    }
}

impl UpdateCategoryInput {
    /// Merge onto the stored row and validate.
    ///
    /// Cycle checks need the whole tree and happen in the repository.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn apply(self, current: &Category) -> Result<CategoryFields, ValidationError> {
        let name = match self.name {
            Some(n) => validation::name("name", &n)?,
            None => current.name.clone(),
        };
        let slug = match self.slug {
            Some(s) => parse_slug(&s)?,
            None => current.slug.clone(),
        };
        let description = patch(self.description, current.description.clone());

        Ok(CategoryFields {
            name,
            slug,
            description: validation::optional_text(description.as_deref()),
            parent_id: patch(self.parent_id, current.parent_id),
        })
    }
}
