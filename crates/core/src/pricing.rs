//! Discount stacking.
//!
//! Store owners create percentage discounts that target products directly or
//! through collections, each live within a time window. Discounts marked
//! stackable compound with one another; an exclusive discount stands alone.
//! Every product gets whichever outcome is cheaper for the shopper.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::types::{CollectionId, DiscountId, DiscountState, ProductId, StoreId, round_money};

/// A percentage markdown rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    pub store_id: StoreId,
    pub name: String,
    /// Markdown in percent, `0 < p <= 100`.
    pub percentage: Decimal,
    pub starts_at: DateTime<Utc>,
    /// Exclusive end of the window; `None` never expires.
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Whether the discount compounds with other stackable discounts.
    pub is_stackable: bool,
    pub product_ids: Vec<ProductId>,
    pub collection_ids: Vec<CollectionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// Where this discount sits relative to `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> DiscountState {
        if !self.is_active {
            DiscountState::Disabled
        } else if now < self.starts_at {
            DiscountState::Scheduled
        } else if self.ends_at.is_some_and(|end| now >= end) {
            DiscountState::Expired
        } else {
            DiscountState::Active
        }
    }

    /// Whether the discount applies at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == DiscountState::Active
    }

    /// Whether the discount reaches `product` directly or via a collection.
    #[must_use]
    pub fn targets(&self, product: &PricedProduct) -> bool {
        self.product_ids.contains(&product.id)
            || product
                .collection_ids
                .iter()
                .any(|c| self.collection_ids.contains(c))
    }

    /// Multiplier this discount leaves on the price, `1 - p/100`.
    fn factor(&self) -> Decimal {
        (Decimal::ONE - self.percentage / Decimal::ONE_HUNDRED).max(Decimal::ZERO)
    }
}

/// The slice of a product that pricing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedProduct {
    pub id: ProductId,
    pub price: Decimal,
    pub collection_ids: Vec<CollectionId>,
}

impl From<&Product> for PricedProduct {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            price: product.price,
            collection_ids: product.collection_ids.clone(),
        }
    }
}

/// A discount that contributed to a final price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub discount_id: DiscountId,
    pub name: String,
    pub percentage: Decimal,
}

impl AppliedDiscount {
    fn from_discount(discount: &Discount) -> Self {
        Self {
            discount_id: discount.id,
            name: discount.name.clone(),
            percentage: discount.percentage,
        }
    }
}

/// Pricing outcome for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountedPrice {
    pub product_id: ProductId,
    pub original_price: Decimal,
    /// Unit price after discounts, rounded to cents.
    pub final_price: Decimal,
    /// Discounts behind `final_price`, in the order they were applied.
    pub applied: Vec<AppliedDiscount>,
}

impl DiscountedPrice {
    /// Undiscounted price.
    #[must_use]
    pub fn full_price(product: &PricedProduct) -> Self {
        Self {
            product_id: product.id,
            original_price: product.price,
            final_price: round_money(product.price),
            applied: Vec::new(),
        }
    }

    /// Per-unit saving.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        (self.original_price - self.final_price).max(Decimal::ZERO)
    }

    /// Whether any discount applied.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Price every product against the store's discounts at `now`.
///
/// Output order matches `products`.
#[must_use]
pub fn apply_discounts_to_products(
    products: &[PricedProduct],
    discounts: &[Discount],
    now: DateTime<Utc>,
) -> Vec<DiscountedPrice> {
    let live: Vec<&Discount> = discounts.iter().filter(|d| d.is_live(now)).collect();

    products
        .iter()
        .map(|product| price_product(product, &live))
        .collect()
}

/// Price one product against already-filtered live discounts.
fn price_product(product: &PricedProduct, live: &[&Discount]) -> DiscountedPrice {
    let mut seen = HashSet::new();
    let candidates: Vec<&Discount> = live
        .iter()
        .copied()
        .filter(|d| d.targets(product) && seen.insert(d.id))
        .collect();

    if candidates.is_empty() {
        return DiscountedPrice::full_price(product);
    }

    let mut stackable: Vec<&Discount> = candidates
        .iter()
        .copied()
        .filter(|d| d.is_stackable)
        .collect();
    stackable.sort_by(|a, b| b.percentage.cmp(&a.percentage).then(a.id.cmp(&b.id)));

    let stacked = (!stackable.is_empty()).then(|| {
        let factor = stackable
            .iter()
            .fold(Decimal::ONE, |acc, d| acc * d.factor());
        (finalize(product.price * factor), stackable.clone())
    });

    let exclusive = candidates
        .iter()
        .copied()
        .filter(|d| !d.is_stackable)
        .map(|d| (finalize(product.price * d.factor()), d))
        .min_by(|(price_a, a), (price_b, b)| {
            price_a
                .cmp(price_b)
                .then(b.percentage.cmp(&a.percentage))
                .then(a.id.cmp(&b.id))
        })
        .map(|(price, d)| (price, vec![d]));

    let (final_price, applied) = match (stacked, exclusive) {
        (Some(s), Some(e)) => {
            if e.0 < s.0 {
                e
            } else {
                s
            }
        }
        (Some(s), None) => s,
        (None, Some(e)) => e,
        (None, None) => return DiscountedPrice::full_price(product),
    };

    DiscountedPrice {
        product_id: product.id,
        original_price: product.price,
        final_price,
        applied: applied
            .into_iter()
            .map(AppliedDiscount::from_discount)
            .collect(),
    }
}

fn finalize(price: Decimal) -> Decimal {
    round_money(price).max(Decimal::ZERO)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn discount(id: i32, percentage: Decimal, stackable: bool) -> Discount {
        Discount {
            id: DiscountId::new(id),
            store_id: StoreId::new(1),
            name: format!("d{id}"),
            percentage,
            starts_at: now() - Duration::days(1),
            ends_at: Some(now() + Duration::days(1)),
            is_active: true,
            is_stackable: stackable,
            product_ids: vec![ProductId::new(10)],
            collection_ids: Vec::new(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn product(price: Decimal) -> PricedProduct {
        PricedProduct {
            id: ProductId::new(10),
            price,
            collection_ids: vec![CollectionId::new(7)],
        }
    }

    fn price_one(price: Decimal, discounts: &[Discount]) -> DiscountedPrice {
        apply_discounts_to_products(&[product(price)], discounts, now()).remove(0)
    }

    #[test]
    fn test_no_discounts_keeps_price() {
        let result = price_one(dec("19.99"), &[]);
        assert_eq!(result.final_price, dec("19.99"));
        assert!(!result.is_discounted());
        assert_eq!(result.savings(), Decimal::ZERO);
    }

    #[test]
    fn test_single_discount() {
        let result = price_one(dec("80.00"), &[discount(1, dec("25"), true)]);
        assert_eq!(result.final_price, dec("60.00"));
        assert_eq!(result.savings(), dec("20.00"));
        assert_eq!(result.applied.len(), 1);
    }

    #[test]
    fn test_stackable_discounts_compound() {
        // 100 * 0.9 * 0.8 = 72, not 70
        let result = price_one(
            dec("100"),
            &[discount(1, dec("10"), true), discount(2, dec("20"), true)],
        );
        assert_eq!(result.final_price, dec("72.00"));
        // largest first
        assert_eq!(result.applied[0].discount_id, DiscountId::new(2));
        assert_eq!(result.applied[1].discount_id, DiscountId::new(1));
    }

    #[test]
    fn test_exclusive_beats_weaker_stack() {
        // stack: 100 * 0.9 * 0.9 = 81; exclusive 25% = 75
        let result = price_one(
            dec("100"),
            &[
                discount(1, dec("10"), true),
                discount(2, dec("10"), true),
                discount(3, dec("25"), false),
            ],
        );
        assert_eq!(result.final_price, dec("75.00"));
        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.applied[0].discount_id, DiscountId::new(3));
    }

    #[test]
    fn test_stack_beats_weaker_exclusive_and_wins_ties() {
        // stack: 100 * 0.8 * 0.75 = 60; exclusive 40% = 60 -> tie goes to stack
        let result = price_one(
            dec("100"),
            &[
                discount(1, dec("20"), true),
                discount(2, dec("25"), true),
                discount(3, dec("40"), false),
            ],
        );
        assert_eq!(result.final_price, dec("60.00"));
        assert_eq!(result.applied.len(), 2);
    }

    #[test]
    fn test_exclusive_discounts_never_combine() {
        let result = price_one(
            dec("50"),
            &[discount(1, dec("10"), false), discount(2, dec("30"), false)],
        );
        assert_eq!(result.final_price, dec("35.00"));
        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.applied[0].discount_id, DiscountId::new(2));
    }

    #[test]
    fn test_collection_target_and_dedup() {
        let mut d = discount(1, dec("50"), true);
        d.collection_ids = vec![CollectionId::new(7)];
        // targets both directly and via collection; must apply once
        let result = price_one(dec("10"), &[d]);
        assert_eq!(result.final_price, dec("5.00"));
        assert_eq!(result.applied.len(), 1);
    }

    #[test]
    fn test_untargeted_product_is_untouched() {
        let mut d = discount(1, dec("50"), true);
        d.product_ids = vec![ProductId::new(99)];
        d.collection_ids = vec![CollectionId::new(8)];
        let result = price_one(dec("10"), &[d]);
        assert_eq!(result.final_price, dec("10"));
    }

    #[test]
    fn test_window_boundaries() {
        let mut scheduled = discount(1, dec("50"), true);
        scheduled.starts_at = now() + Duration::seconds(1);
        let mut expired = discount(2, dec("50"), true);
        expired.ends_at = Some(now());
        let mut disabled = discount(3, dec("50"), true);
        disabled.is_active = false;
        let mut starts_now = discount(4, dec("10"), true);
        starts_now.starts_at = now();
        starts_now.ends_at = None;

        assert_eq!(scheduled.state_at(now()), DiscountState::Scheduled);
        assert_eq!(expired.state_at(now()), DiscountState::Expired);
        assert_eq!(disabled.state_at(now()), DiscountState::Disabled);
        assert_eq!(starts_now.state_at(now()), DiscountState::Active);

        let result = price_one(dec("100"), &[scheduled, expired, disabled, starts_now]);
        assert_eq!(result.final_price, dec("90.00"));
    }

    #[test]
    fn test_rounding_once_at_the_end() {
        // 9.99 * 0.85 * 0.85 = 7.217775 -> 7.22
        let result = price_one(
            dec("9.99"),
            &[discount(1, dec("15"), true), discount(2, dec("15"), true)],
        );
        assert_eq!(result.final_price, dec("7.22"));
    }

    #[test]
    fn test_full_markdown_floors_at_zero() {
        let result = price_one(dec("12.50"), &[discount(1, dec("100"), false)]);
        assert_eq!(result.final_price, Decimal::ZERO);
        assert_eq!(result.savings(), dec("12.50"));
    }

    #[test]
    fn test_output_preserves_input_order() {
        let products = vec![
            PricedProduct {
                id: ProductId::new(3),
                price: dec("1"),
                collection_ids: vec![],
            },
            product(dec("2")),
            PricedProduct {
                id: ProductId::new(1),
                price: dec("3"),
                collection_ids: vec![],
            },
        ];
        let ids: Vec<i32> = apply_discounts_to_products(&products, &[], now())
            .iter()
            .map(|p| p.product_id.as_i32())
            .collect();
        assert_eq!(ids, vec![3, 10, 1]);
    }
}
