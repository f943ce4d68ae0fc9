//! Cart line arithmetic and totals.
//!
//! The storefront loads a cart's lines with their products, prices them
//! through [`crate::pricing`], and summarizes here. Nothing in this module
//! touches storage.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Product;
use crate::pricing::{AppliedDiscount, DiscountedPrice, PricedProduct};
use crate::shipping::RateContext;
use crate::types::{ProductId, Slug, round_money};
use crate::validation::{self, MAX_LINE_QUANTITY, ValidationError};

/// Errors from cart mutations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("only {available} of this product left in stock")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("cart is empty")]
    Empty,

    #[error("a shipping address is required")]
    MissingAddress,
}

/// One product in a cart.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product: Product,
    pub quantity: i32,
}

/// How a line's quantity should change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Add units to whatever is already in the cart.
    Add(i32),
    /// Replace the quantity; zero removes the line.
    Set(i32),
}

/// Resolve a quantity change against the current line and stock.
///
/// Returns `None` when the line should be removed.
///
/// # Errors
///
/// Returns [`CartError::Validation`] when the resulting quantity leaves
/// `1..=99`, or [`CartError::InsufficientStock`] when a tracked inventory
/// cannot cover it.
pub fn apply_quantity_change(
    current: Option<i32>,
    change: QuantityChange,
    inventory: Option<i32>,
) -> Result<Option<i32>, CartError> {
    let requested = match change {
        QuantityChange::Set(0) => return Ok(None),
        QuantityChange::Set(quantity) => quantity,
        QuantityChange::Add(quantity) => {
            validation::line_quantity(quantity)?;
            current.unwrap_or(0).saturating_add(quantity)
        }
    };

    let quantity = validation::line_quantity(requested)?;

    if let Some(available) = inventory
        && quantity > available
    {
        return Err(CartError::InsufficientStock {
            available: available.max(0),
            requested: quantity,
        });
    }

    Ok(Some(quantity))
}

/// Priced view of one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub product_id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub quantity: i32,
    /// Catalog unit price.
    pub unit_price: Decimal,
    /// Unit price after discounts.
    pub sale_price: Decimal,
    /// `unit_price * quantity`.
    pub line_subtotal: Decimal,
    /// `sale_price * quantity`.
    pub line_total: Decimal,
    pub line_discount: Decimal,
    pub weight_grams: i64,
    pub applied_discounts: Vec<AppliedDiscount>,
}

/// Cart totals. `shipping` is `None` until a rate is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub lines: Vec<LineTotals>,
    pub item_count: i64,
    pub total_weight_grams: i64,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    /// `subtotal - discount_total`; what price-based shipping sees.
    pub merchandise_total: Decimal,
    pub shipping: Option<Decimal>,
    pub grand_total: Decimal,
}

impl CartTotals {
    /// Context for quoting shipping against this cart.
    #[must_use]
    pub const fn rate_context(&self) -> RateContext {
        RateContext {
            subtotal: self.merchandise_total,
            total_weight_grams: self.total_weight_grams,
        }
    }

    /// Whether the cart holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Recompute the grand total with a (new) shipping price.
    #[must_use]
    pub fn with_shipping(mut self, shipping: Option<Decimal>) -> Self {
        self.shipping = shipping;
        self.grand_total = self.merchandise_total + shipping.unwrap_or(Decimal::ZERO);
        self
    }
}

/// Price lines and total the cart.
///
/// `prices` comes from [`crate::pricing::apply_discounts_to_products`]; a
/// line without an entry is charged its catalog price.
#[must_use]
pub fn summarize(
    lines: &[CartLine],
    prices: &[DiscountedPrice],
    shipping: Option<Decimal>,
) -> CartTotals {
    let by_product: HashMap<ProductId, &DiscountedPrice> =
        prices.iter().map(|p| (p.product_id, p)).collect();

    let line_totals: Vec<LineTotals> = lines
        .iter()
        .map(|line| {
            let price = by_product.get(&line.product.id).map_or_else(
                || DiscountedPrice::full_price(&PricedProduct::from(&line.product)),
                |p| (*p).clone(),
            );
            let quantity = Decimal::from(line.quantity);
            let line_subtotal = round_money(price.original_price * quantity);
            let line_total = round_money(price.final_price * quantity);

            LineTotals {
                product_id: line.product.id,
                name: line.product.name.clone(),
                slug: line.product.slug.clone(),
                sku: line.product.sku.clone(),
                image_url: line.product.images.first().map(|i| i.url.clone()),
                quantity: line.quantity,
                unit_price: price.original_price,
                sale_price: price.final_price,
                line_subtotal,
                line_total,
                line_discount: line_subtotal - line_total,
                weight_grams: line.product.shipping_weight_grams() * i64::from(line.quantity),
                applied_discounts: price.applied,
            }
        })
        .collect();

    let subtotal: Decimal = line_totals.iter().map(|l| l.line_subtotal).sum();
    let discount_total: Decimal = line_totals.iter().map(|l| l.line_discount).sum();

    CartTotals {
        item_count: line_totals.iter().map(|l| i64::from(l.quantity)).sum(),
        total_weight_grams: line_totals.iter().map(|l| l.weight_grams).sum(),
        subtotal,
        discount_total,
        merchandise_total: subtotal - discount_total,
        shipping: None,
        grand_total: Decimal::ZERO,
        lines: line_totals,
    }
    .with_shipping(shipping)
}

/// Largest quantity a shopper may hold of one product, given stock.
#[must_use]
pub fn max_orderable(inventory: Option<i32>) -> i32 {
    inventory.map_or(MAX_LINE_QUANTITY, |available| {
        available.clamp(0, MAX_LINE_QUANTITY)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::types::{DiscountId, ProductStatus, StoreId};
    use chrono::Utc;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn product(id: i32, price: &str, weight: Option<i32>) -> Product {
        Product {
            id: ProductId::new(id),
            store_id: StoreId::new(1),
            category_id: None,
            name: format!("Product {id}"),
            slug: Slug::from_name(&format!("product {id}")),
            description: None,
            sku: None,
            price: dec(price),
            compare_at_price: None,
            weight_grams: weight,
            inventory_quantity: None,
            status: ProductStatus::Active,
            collection_ids: Vec::new(),
            images: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_increments_existing_line() {
        assert_eq!(apply_quantity_change(None, QuantityChange::Add(2), None), Ok(Some(2)));
        assert_eq!(apply_quantity_change(Some(3), QuantityChange::Add(2), None), Ok(Some(5)));
    }

    #[test]
    fn test_quantity_limits() {
        assert!(matches!(
            apply_quantity_change(Some(98), QuantityChange::Add(2), None),
            Err(CartError::Validation(_))
        ));
        assert!(apply_quantity_change(None, QuantityChange::Add(0), None).is_err());
        assert!(apply_quantity_change(Some(1), QuantityChange::Set(-1), None).is_err());
        assert_eq!(apply_quantity_change(Some(4), QuantityChange::Set(0), None), Ok(None));
    }

    #[test]
    fn test_tracked_inventory() {
        assert_eq!(
            apply_quantity_change(Some(2), QuantityChange::Add(2), Some(3)),
            Err(CartError::InsufficientStock {
                available: 3,
                requested: 4
            })
        );
        assert_eq!(apply_quantity_change(None, QuantityChange::Set(3), Some(3)), Ok(Some(3)));
        assert_eq!(max_orderable(Some(500)), MAX_LINE_QUANTITY);
        assert_eq!(max_orderable(Some(-2)), 0);
        assert_eq!(max_orderable(None), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_summarize_applies_discounted_prices() {
        let lines = vec![
            CartLine {
                product: product(1, "20.00", Some(400)),
                quantity: 3,
            },
            CartLine {
                product: product(2, "5.00", None),
                quantity: 2,
            },
        ];
        let prices = vec![DiscountedPrice {
            product_id: ProductId::new(1),
            original_price: dec("20.00"),
            final_price: dec("15.00"),
            applied: vec![AppliedDiscount {
                discount_id: DiscountId::new(1),
                name: "Spring".to_owned(),
                percentage: dec("25"),
            }],
        }];

        let totals = summarize(&lines, &prices, None);

        assert_eq!(totals.item_count, 5);
        assert_eq!(totals.total_weight_grams, 1200);
        assert_eq!(totals.subtotal, dec("70.00"));
        assert_eq!(totals.discount_total, dec("15.00"));
        assert_eq!(totals.merchandise_total, dec("55.00"));
        assert_eq!(totals.grand_total, dec("55.00"));
        assert_eq!(totals.lines[0].line_total, dec("45.00"));
        assert_eq!(totals.lines[1].sale_price, dec("5.00"));
        assert!(totals.lines[1].applied_discounts.is_empty());

        let ctx = totals.rate_context();
        assert_eq!(ctx.subtotal, dec("55.00"));
        assert_eq!(ctx.total_weight_grams, 1200);
    }

    #[test]
    fn test_shipping_added_to_grand_total() {
        let lines = vec![CartLine {
            product: product(1, "10.00", None),
            quantity: 1,
        }];
        let totals = summarize(&lines, &[], Some(dec("4.99")));
        assert_eq!(totals.grand_total, dec("14.99"));
        assert_eq!(totals.with_shipping(None).grand_total, dec("10.00"));
    }

    #[test]
    fn test_empty_cart() {
        let totals = summarize(&[], &[], None);
        assert!(totals.is_empty());
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.item_count, 0);
    }
}
