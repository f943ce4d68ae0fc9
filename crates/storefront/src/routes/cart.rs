//! Shopper cart route handlers.
//!
//! A session owns one cart per store. Reads never create anything; the first
//! write mints a cart token in the session and a `commerce.cart` row.
//!
//! Every read re-validates the cart: lines whose product was archived or
//! deleted are dropped, and a selected shipping rate that the current quote
//! no longer offers is cleared.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use tillbox_core::cart::{self, CartError, CartLine, CartTotals, QuantityChange};
use tillbox_core::catalog::{Product, Store};
use tillbox_core::pricing::{PricedProduct, apply_discounts_to_products};
use tillbox_core::shipping::{self, QuotedRate, ShippingError, ShippingQuote};
use tillbox_core::validation::ValidationError;
use tillbox_core::{CountryCode, CurrencyCode, ProductId, ShippingAddress, ShippingRateId};

use crate::db::{CartRecord, CartRepository, CatalogRepository, load_shipping_config};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{cart_token, ensure_cart_token};
use crate::state::AppState;

// =============================================================================
// Views and payloads
// =============================================================================

/// A priced cart.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub currency: CurrencyCode,
    #[serde(flatten)]
    pub totals: CartTotals,
    pub shipping_address: Option<ShippingAddress>,
    pub shipping_rate: Option<QuotedRate>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemInput {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct AddressInput {
    pub country_code: String,
    pub province_code: Option<String>,
    pub postal_code: Option<String>,
}

impl AddressInput {
    /// Normalize into a shipping address.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a malformed country code.
    pub fn validate(&self) -> std::result::Result<ShippingAddress, ValidationError> {
        let country = CountryCode::parse(&self.country_code)
            .map_err(|e| ValidationError::invalid("country_code", e.to_string()))?;
        Ok(ShippingAddress::country(country)
            .with_province(self.province_code.as_deref())
            .with_postal_code(self.postal_code.as_deref()))
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectShippingInput {
    pub rate_id: ShippingRateId,
}

// =============================================================================
// Loading
// =============================================================================

/// A cart with its lines priced and, when it has an address, quoted.
struct LoadedCart {
    record: Option<CartRecord>,
    totals: CartTotals,
    quote: Option<ShippingQuote>,
    selected: Option<QuotedRate>,
}

impl LoadedCart {
    fn empty() -> Self {
        Self {
            record: None,
            totals: cart::summarize(&[], &[], None),
            quote: None,
            selected: None,
        }
    }

    fn into_view(self, store: &Store) -> CartView {
        CartView {
            currency: store.currency,
            totals: self.totals,
            shipping_address: self.record.and_then(|r| r.address),
            shipping_rate: self.selected,
        }
    }
}

/// Load and re-validate the session's cart for `store`.
async fn load_cart(state: &AppState, store: &Store, session: &Session) -> Result<LoadedCart> {
    let Some(token) = cart_token(session).await? else {
        return Ok(LoadedCart::empty());
    };
    let carts = CartRepository::new(state.pool());
    let Some(mut record) = carts.find(store.id, &token.to_string()).await? else {
        return Ok(LoadedCart::empty());
    };

    let stored = carts.lines(record.id).await?;
    let ids: Vec<ProductId> = stored.iter().map(|(id, _)| *id).collect();
    let mut products: HashMap<ProductId, Product> = CatalogRepository::new(state.pool())
        .products_by_ids(store.id, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut lines = Vec::with_capacity(stored.len());
    let mut unavailable = Vec::new();
    for (product_id, quantity) in stored {
        match products.remove(&product_id) {
            Some(product) if product.is_purchasable() => lines.push(CartLine { product, quantity }),
            _ => unavailable.push(product_id),
        }
    }
    if !unavailable.is_empty() {
        let removed = carts.remove_products(record.id, &unavailable).await?;
        tracing::info!(cart_id = %record.id, removed, "Dropped unavailable products from cart");
    }

    let discounts = state.cache().discounts(state.pool(), store.id).await?;
    let priced: Vec<PricedProduct> = lines.iter().map(|l| PricedProduct::from(&l.product)).collect();
    let prices = apply_discounts_to_products(&priced, &discounts, Utc::now());
    let totals = cart::summarize(&lines, &prices, None);

    let quote = match &record.address {
        Some(address) => {
            let config = load_shipping_config(state.pool(), store.id).await?;
            Some(shipping::quote(
                &config.zones,
                &config.rates,
                &config.methods,
                address,
                &totals.rate_context(),
            ))
        }
        None => None,
    };

    let mut selected = None;
    if let Some(rate_id) = record.shipping_rate_id {
        let still_offered = quote
            .as_ref()
            .filter(|_| !totals.is_empty())
            .and_then(|q| q.select(rate_id).ok());
        match still_offered {
            Some(rate) => selected = Some(rate.clone()),
            None => {
                carts.set_shipping_rate(record.id, None).await?;
                record.shipping_rate_id = None;
                tracing::info!(cart_id = %record.id, %rate_id, "Cleared shipping rate no longer offered");
            }
        }
    }

    let totals = totals.with_shipping(selected.as_ref().map(|r| r.price));
    Ok(LoadedCart {
        record: Some(record),
        totals,
        quote,
        selected,
    })
}

/// The session's cart row for `store`, created on first write.
async fn writable_cart(state: &AppState, store: &Store, session: &Session) -> Result<CartRecord> {
    let token = ensure_cart_token(session).await?;
    Ok(CartRepository::new(state.pool())
        .find_or_create(store.id, &token.to_string())
        .await?)
}

/// The session's existing cart row for `store`.
async fn existing_cart(state: &AppState, store: &Store, session: &Session) -> Result<CartRecord> {
    let not_found = || AppError::NotFound("cart".to_string());
    let token = cart_token(session).await?.ok_or_else(not_found)?;
    CartRepository::new(state.pool())
        .find(store.id, &token.to_string())
        .await?
        .ok_or_else(not_found)
}

/// A product that may go into a cart.
async fn purchasable_product(
    state: &AppState,
    store: &Store,
    product_id: ProductId,
) -> Result<Product> {
    CatalogRepository::new(state.pool())
        .products_by_ids(store.id, &[product_id])
        .await?
        .pop()
        .filter(Product::is_purchasable)
        .ok_or(AppError::Cart(CartError::ProductUnavailable(product_id)))
}

// =============================================================================
// Handlers
// =============================================================================

#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
) -> Result<Json<CartView>> {
    let store = state.store(&slug).await?;
    let loaded = load_cart(&state, &store, &session).await?;
    Ok(Json(loaded.into_view(&store)))
}

/// Add units of a product, merging with an existing line.
#[instrument(skip(state, session, input))]
pub async fn add_item(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
    Json(input): Json<AddItemInput>,
) -> Result<Json<CartView>> {
    let store = state.store(&slug).await?;
    let product = purchasable_product(&state, &store, input.product_id).await?;
    let record = writable_cart(&state, &store, &session).await?;

    CartRepository::new(state.pool())
        .update_line(record.id, product.id, |current| {
            cart::apply_quantity_change(
                current,
                QuantityChange::Add(input.quantity),
                product.inventory_quantity,
            )
            .map_err(AppError::from)
        })
        .await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        &[
            ("product_id", product.id.to_string()),
            ("quantity", input.quantity.to_string()),
        ],
    );
    tracing::info!(cart_id = %record.id, product_id = %product.id, "Cart item added");

    let loaded = load_cart(&state, &store, &session).await?;
    Ok(Json(loaded.into_view(&store)))
}

/// Replace a line's quantity; zero removes the line.
#[instrument(skip(state, session, input))]
pub async fn update_item(
    State(state): State<AppState>,
    Path((slug, product_id)): Path<(String, ProductId)>,
    session: Session,
    Json(input): Json<UpdateItemInput>,
) -> Result<Json<CartView>> {
    let store = state.store(&slug).await?;
    let record = existing_cart(&state, &store, &session).await?;
    let inventory = if input.quantity == 0 {
        None
    } else {
        purchasable_product(&state, &store, product_id)
            .await?
            .inventory_quantity
    };

    CartRepository::new(state.pool())
        .update_line(record.id, product_id, |current| {
            let current =
                current.ok_or_else(|| AppError::NotFound(format!("cart item {product_id}")))?;
            cart::apply_quantity_change(
                Some(current),
                QuantityChange::Set(input.quantity),
                inventory,
            )
            .map_err(AppError::from)
        })
        .await?;

    add_breadcrumb(
        "cart",
        "Updated cart quantity",
        &[
            ("product_id", product_id.to_string()),
            ("quantity", input.quantity.to_string()),
        ],
    );

    let loaded = load_cart(&state, &store, &session).await?;
    Ok(Json(loaded.into_view(&store)))
}

/// Remove a line. Removing a product that is not in the cart is a no-op.
#[instrument(skip(state, session))]
pub async fn remove_item(
    State(state): State<AppState>,
    Path((slug, product_id)): Path<(String, ProductId)>,
    session: Session,
) -> Result<StatusCode> {
    let store = state.store(&slug).await?;
    if let Some(token) = cart_token(&session).await? {
        let carts = CartRepository::new(state.pool());
        if let Some(record) = carts.find(store.id, &token.to_string()).await? {
            carts.remove_products(record.id, &[product_id]).await?;
            add_breadcrumb(
                "cart",
                "Removed from cart",
                &[("product_id", product_id.to_string())],
            );
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Empty the cart and drop the shipping selection. The address is kept.
#[instrument(skip(state, session))]
pub async fn clear(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
) -> Result<StatusCode> {
    let store = state.store(&slug).await?;
    if let Some(token) = cart_token(&session).await? {
        let carts = CartRepository::new(state.pool());
        if let Some(record) = carts.find(store.id, &token.to_string()).await? {
            carts.clear(record.id).await?;
            tracing::info!(cart_id = %record.id, "Cart cleared");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Set the shipping destination.
#[instrument(skip(state, session, input))]
pub async fn set_address(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
    Json(input): Json<AddressInput>,
) -> Result<Json<CartView>> {
    let address = input.validate()?;
    let store = state.store(&slug).await?;
    let record = writable_cart(&state, &store, &session).await?;

    CartRepository::new(state.pool())
        .set_address(record.id, &address)
        .await?;
    add_breadcrumb(
        "cart",
        "Set shipping address",
        &[("country_code", address.country_code.to_string())],
    );

    let loaded = load_cart(&state, &store, &session).await?;
    Ok(Json(loaded.into_view(&store)))
}

/// Rates on offer for the cart as it stands, cheapest first.
#[instrument(skip(state, session))]
pub async fn shipping_rates(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
) -> Result<Json<ShippingQuote>> {
    let store = state.store(&slug).await?;
    let loaded = load_cart(&state, &store, &session).await?;
    let quote = loaded.quote.ok_or(CartError::MissingAddress)?;
    Ok(Json(quote))
}

/// Choose one of the offered rates.
#[instrument(skip(state, session, input))]
pub async fn select_shipping(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
    Json(input): Json<SelectShippingInput>,
) -> Result<Json<CartView>> {
    let store = state.store(&slug).await?;
    let loaded = load_cart(&state, &store, &session).await?;

    let record = match &loaded.record {
        Some(record) if !loaded.totals.is_empty() => record,
        _ => return Err(CartError::Empty.into()),
    };
    let address = record.address.as_ref().ok_or(CartError::MissingAddress)?;
    let quote = loaded.quote.as_ref().ok_or(CartError::MissingAddress)?;
    if quote.zone_id.is_none() {
        return Err(ShippingError::NoZone(address.country_code.to_string()).into());
    }
    let rate = quote.select(input.rate_id)?.clone();

    CartRepository::new(state.pool())
        .set_shipping_rate(record.id, Some(rate.rate_id))
        .await?;
    add_breadcrumb(
        "cart",
        "Selected shipping rate",
        &[("rate_id", rate.rate_id.to_string())],
    );

    let totals = loaded.totals.clone().with_shipping(Some(rate.price));
    Ok(Json(CartView {
        currency: store.currency,
        totals,
        shipping_address: Some(address.clone()),
        shipping_rate: Some(rate),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_input_normalizes() {
        let input: AddressInput = serde_json::from_str(
            r#"{"country_code":"ca","province_code":" on ","postal_code":"  "}"#,
        )
        .unwrap();
        let address = input.validate().unwrap();
        assert_eq!(address.country_code.as_str(), "CA");
        assert_eq!(address.province_code.as_deref(), Some("ON"));
        assert_eq!(address.postal_code, None);
    }

    #[test]
    fn test_address_input_rejects_bad_country() {
        let input = AddressInput {
            country_code: "Canada".to_owned(),
            province_code: None,
            postal_code: None,
        };
        assert!(matches!(
            input.validate(),
            Err(ValidationError::Invalid {
                field: "country_code",
                ..
            })
        ));
    }

    #[test]
    fn test_add_item_quantity_defaults_to_one() {
        let input: AddItemInput = serde_json::from_str(r#"{"product_id":12}"#).unwrap();
        assert_eq!(input.product_id, ProductId::new(12));
        assert_eq!(input.quantity, 1);
    }

    #[test]
    fn test_empty_cart_view() {
        let view = LoadedCart::empty().into_view(&Store {
            id: tillbox_core::StoreId::new(1),
            name: "Harbor Goods".to_owned(),
            slug: tillbox_core::Slug::from_name("Harbor Goods"),
            currency: CurrencyCode::EUR,
            contact_email: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["currency"], "EUR");
        assert_eq!(json["item_count"], 0);
        assert!(json["lines"].as_array().unwrap().is_empty());
        assert!(json["shipping_rate"].is_null());
    }
}
