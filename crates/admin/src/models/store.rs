//! Store payloads.

use serde::Deserialize;

use tillbox_core::validation::{self, ValidationError};
use tillbox_core::{CurrencyCode, Slug, catalog::Store};

use super::{nullable, parse_slug, patch, slug_or_derived};

/// `POST /api/stores`
#[derive(Debug, Deserialize)]
pub struct CreateStoreInput {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub currency: CurrencyCode,
    pub contact_email: Option<String>,
}

/// `PATCH /api/stores/{store_id}`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateStoreInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub currency: Option<CurrencyCode>,
    #[serde(default, deserialize_with = "nullable")]
    pub contact_email: Option<Option<String>>,
}

/// Validated store columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFields {
    pub name: String,
    pub slug: Slug,
    pub currency: CurrencyCode,
    pub contact_email: Option<String>,
}

fn contact_email(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    validation::optional_text(value)
        .map(|e| validation::email(&e))
        .transpose()
}

impl CreateStoreInput {
    /// Validate into storable fields.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(self) -> Result<StoreFields, ValidationError> {
        let name = validation::name("name", &self.name)?;
        Ok(StoreFields {
            slug: slug_or_derived(self.slug.as_deref(), &name)?,
            name,
            currency: self.currency,
            contact_email: contact_email(self.contact_email.as_deref())?,
        })
    }
}

impl UpdateStoreInput {
    /// Merge onto the stored row and validate.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn apply(self, current: &Store) -> Result<StoreFields, ValidationError> {
        let name = match self.name {
            Some(n) => validation::name("name", &n)?,
            None => current.name.clone(),
        };
        let slug = match self.slug {
            Some(s) => parse_slug(&s)?,
            None => current.slug.clone(),
        };
        let email = patch(self.contact_email, current.contact_email.clone());

        Ok(StoreFields {
            name,
            slug,
            currency: self.currency.unwrap_or(current.currency),
            contact_email: contact_email(email.as_deref())?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tillbox_core::StoreId;

    #[test]
    fn test_create_derives_slug_and_checks_email() {
        let input: CreateStoreInput =
            serde_json::from_str(r#"{"name":" Acme Goods ","contact_email":"ops@acme.test"}"#)
                .unwrap();
        let fields = input.validate().unwrap();
        assert_eq!(fields.name, "Acme Goods");
        assert_eq!(fields.slug.as_str(), "acme-goods");
        assert_eq!(fields.currency, CurrencyCode::USD);

        let bad: CreateStoreInput =
            serde_json::from_str(r#"{"name":"Acme","contact_email":"nope"}"#).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let current = Store {
            id: StoreId::new(1),
            name: "Acme".to_owned(),
            slug: Slug::parse("acme").unwrap(),
            currency: CurrencyCode::EUR,
            contact_email: Some("ops@acme.test".to_owned()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let input: UpdateStoreInput =
            serde_json::from_str(r#"{"name":"Acme Co","contact_email":null}"#).unwrap();
        let fields = input.apply(&current).unwrap();
        assert_eq!(fields.name, "Acme Co");
        assert_eq!(fields.slug.as_str(), "acme");
        assert_eq!(fields.currency, CurrencyCode::EUR);
        assert_eq!(fields.contact_email, None);
    }
}
