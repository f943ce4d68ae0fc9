//! Seed a demo store.
//!
//! ```bash
//! tillbox seed demo --slug demo
//! ```
//!
//! Creates one store with categories, collections, products with images,
//! two discounts and a three-zone shipping setup, all through the admin
//! repositories so every write passes the same validation as the API.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use tillbox_admin::db::{
    CategoryRepository, CollectionRepository, DiscountRepository, ProductRepository,
    ShippingRepository, StoreRepository,
};
use tillbox_admin::models::category::CreateCategoryInput;
use tillbox_admin::models::collection::CreateCollectionInput;
use tillbox_admin::models::discount::CreateDiscountInput;
use tillbox_admin::models::product::{AddImageInput, CreateProductInput};
use tillbox_admin::models::shipping::{CreateMethodInput, CreateRateInput, CreateZoneInput};
use tillbox_admin::models::store::CreateStoreInput;
use tillbox_core::catalog::Store;
use tillbox_core::shipping::ZoneRegion;
use tillbox_core::{
    CategoryId, CollectionId, CurrencyCode, ProductId, ProductStatus, ShippingMethodId,
    ShippingRateType, ShippingZoneId,
};

use super::{CommandError, connect};

const IMAGE_BASE: &str = "https://images.tillbox.dev/demo";

fn money(amount: i64, cents: u32) -> Decimal {
    Decimal::new(amount * 100 + i64::from(cents), 2)
}

fn store_input(slug: &str) -> CreateStoreInput {
    CreateStoreInput {
        name: "Tillbox Demo".to_owned(),
        slug: Some(slug.to_owned()),
        currency: CurrencyCode::USD,
        contact_email: Some("hello@tillbox.dev".to_owned()),
    }
}

fn category_input(name: &str) -> CreateCategoryInput {
    CreateCategoryInput {
        name: name.to_owned(),
        slug: None,
        description: None,
        parent_id: None,
    }
}

fn collection_input(name: &str, is_published: bool) -> CreateCollectionInput {
    CreateCollectionInput {
        name: name.to_owned(),
        slug: None,
        description: Some(format!("{name}, hand-picked.")),
        is_published,
    }
}

/// One demo product and where it belongs.
struct DemoProduct {
    name: &'static str,
    sku: &'static str,
    price: Decimal,
    weight_grams: i32,
    inventory: Option<i32>,
    status: ProductStatus,
    apparel: bool,
    in_summer: bool,
}

fn demo_products() -> Vec<DemoProduct> {
    vec![
        DemoProduct {
            name: "Linen Shirt",
            sku: "APP-LIN-01",
            price: money(48, 0),
            weight_grams: 300,
            inventory: Some(25),
            status: ProductStatus::Active,
            apparel: true,
            in_summer: true,
        },
        DemoProduct {
            name: "Canvas Tote",
            sku: "HOM-TOT-01",
            price: money(22, 0),
            weight_grams: 450,
            inventory: None,
            status: ProductStatus::Active,
            apparel: false,
            in_summer: true,
        },
        DemoProduct {
            name: "Ceramic Mug",
            sku: "HOM-MUG-01",
            price: money(16, 0),
            weight_grams: 520,
            inventory: Some(40),
            status: ProductStatus::Active,
            apparel: false,
            in_summer: false,
        },
        DemoProduct {
            name: "Wool Scarf",
            sku: "APP-SCF-01",
            price: money(35, 0),
            weight_grams: 200,
            inventory: Some(12),
            status: ProductStatus::Draft,
            apparel: true,
            in_summer: false,
        },
    ]
}

impl DemoProduct {
    fn input(&self, category_id: CategoryId, summer: CollectionId) -> CreateProductInput {
        CreateProductInput {
            name: self.name.to_owned(),
            slug: None,
            description: Some(format!("The {} from the Tillbox demo catalog.", self.name)),
            sku: Some(self.sku.to_owned()),
            price: self.price,
            compare_at_price: None,
            weight_grams: Some(self.weight_grams),
            inventory_quantity: self.inventory,
            status: self.status,
            category_id: Some(category_id),
            collection_ids: if self.in_summer { vec![summer] } else { Vec::new() },
        }
    }

    fn image(&self) -> AddImageInput {
        AddImageInput {
            url: format!("{IMAGE_BASE}/{}.jpg", self.sku.to_ascii_lowercase()),
            alt_text: Some(self.name.to_owned()),
            position: None,
        }
    }
}

fn discount_inputs(summer: CollectionId, mug: ProductId) -> Vec<CreateDiscountInput> {
    let now = Utc::now();
    vec![
        CreateDiscountInput {
            name: "Summer 10%".to_owned(),
            percentage: Decimal::from(10),
            starts_at: Some(now),
            ends_at: Some(now + Duration::days(90)),
            is_active: true,
            is_stackable: true,
            product_ids: Vec::new(),
            collection_ids: vec![summer],
        },
        CreateDiscountInput {
            name: "Mug Week".to_owned(),
            percentage: Decimal::from(25),
            starts_at: Some(now),
            ends_at: Some(now + Duration::days(7)),
            is_active: true,
            is_stackable: false,
            product_ids: vec![mug],
            collection_ids: Vec::new(),
        },
    ]
}

fn method_input(name: &str, carrier: &str, min_days: i32, max_days: i32) -> CreateMethodInput {
    CreateMethodInput {
        name: name.to_owned(),
        carrier: Some(carrier.to_owned()),
        min_delivery_days: Some(min_days),
        max_delivery_days: Some(max_days),
    }
}

fn zone_input(name: &str, countries: &[&str]) -> CreateZoneInput {
    CreateZoneInput {
        name: name.to_owned(),
        regions: countries
            .iter()
            .map(|c| ZoneRegion {
                country_code: (*c).to_owned(),
                province_code: None,
            })
            .collect(),
    }
}

fn rate_input(name: &str, rate_type: ShippingRateType, amount: Decimal) -> CreateRateInput {
    CreateRateInput {
        method_id: None,
        name: name.to_owned(),
        rate_type,
        amount,
        per_kg_amount: None,
        min_weight_grams: None,
        max_weight_grams: None,
        min_subtotal: None,
        max_subtotal: None,
        is_active: true,
    }
}

/// Rates per zone: domestic, Canada, rest of world.
fn rate_inputs(
    standard: ShippingMethodId,
    express: ShippingMethodId,
) -> [Vec<CreateRateInput>; 3] {
    let domestic = vec![
        CreateRateInput {
            method_id: Some(standard),
            ..rate_input("Standard", ShippingRateType::Flat, money(5, 99))
        },
        CreateRateInput {
            method_id: Some(express),
            per_kg_amount: Some(money(2, 50)),
            min_weight_grams: Some(0),
            ..rate_input("Express", ShippingRateType::WeightBased, money(12, 0))
        },
        CreateRateInput {
            method_id: Some(standard),
            min_subtotal: Some(money(75, 0)),
            ..rate_input("Free shipping", ShippingRateType::Free, Decimal::ZERO)
        },
    ];
    let canada = vec![CreateRateInput {
        method_id: Some(standard),
        ..rate_input("Canada Post", ShippingRateType::Flat, money(14, 0))
    }];
    let world = vec![
        CreateRateInput {
            max_subtotal: Some(money(100, 0)),
            ..rate_input("International", ShippingRateType::PriceBased, money(25, 0))
        },
        CreateRateInput {
            min_subtotal: Some(money(100, 0)),
            ..rate_input("International", ShippingRateType::PriceBased, money(15, 0))
        },
    ];
    [domestic, canada, world]
}

/// Create the demo store.
///
/// # Errors
///
/// Returns `CommandError` if the slug is taken or any write fails.
pub async fn demo(slug: &str) -> Result<Store, CommandError> {
    let store_fields = store_input(slug).validate()?;
    let pool = connect().await?;

    let store = StoreRepository::new(&pool).create(&store_fields).await?;
    tracing::info!(store_id = %store.id, slug = %store.slug, "Created demo store");

    let categories = CategoryRepository::new(&pool);
    let apparel = categories
        .create(store.id, &category_input("Apparel").validate()?)
        .await?;
    let home = categories
        .create(store.id, &category_input("Home").validate()?)
        .await?;

    let collections = CollectionRepository::new(&pool);
    let summer = collections
        .create(store.id, &collection_input("Summer Essentials", true).validate()?)
        .await?;
    collections
        .create(store.id, &collection_input("Archive", false).validate()?)
        .await?;

    let products = ProductRepository::new(&pool);
    let mut mug = None;
    for demo in demo_products() {
        let category = if demo.apparel { apparel.id } else { home.id };
        let product = products
            .create(store.id, &demo.input(category, summer.id).validate()?)
            .await?;
        products
            .add_image(store.id, product.id, &demo.image().validate()?)
            .await?;
        if demo.sku == "HOM-MUG-01" {
            mug = Some(product.id);
        }
        tracing::info!(product_id = %product.id, name = %product.name, "Created product");
    }

    if let Some(mug) = mug {
        let discounts = DiscountRepository::new(&pool);
        for input in discount_inputs(summer.id, mug) {
            let discount = discounts.create(store.id, &input.validate(Utc::now())?).await?;
            tracing::info!(discount_id = %discount.id, name = %discount.name, "Created discount");
        }
    }

    let shipping = ShippingRepository::new(&pool);
    let standard = shipping
        .create_method(store.id, &method_input("Standard", "USPS", 3, 5).validate()?)
        .await?;
    let express = shipping
        .create_method(store.id, &method_input("Express", "UPS", 1, 2).validate()?)
        .await?;

    let zones = [
        zone_input("Domestic", &["US"]),
        zone_input("Canada", &["CA"]),
        zone_input("Rest of world", &["*"]),
    ];
    let mut zone_ids: Vec<ShippingZoneId> = Vec::with_capacity(zones.len());
    for zone in zones {
        let zone = shipping.create_zone(store.id, &zone.validate()?).await?;
        zone_ids.push(zone.id);
    }

    for (zone_id, rates) in zone_ids.into_iter().zip(rate_inputs(standard.id, express.id)) {
        for rate in rates {
            shipping.create_rate(store.id, &rate.validate(zone_id)?).await?;
        }
    }

    tracing::info!("Demo store seeded!");
    tracing::info!("  Browse: /api/stores/{}/products", store.slug);
    tracing::info!("  Quote:  tillbox quote --store-slug {} --country US --subtotal 40 --weight-grams 800", store.slug);
    Ok(store)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_payloads_validate() {
        assert!(store_input("demo").validate().is_ok());
        assert!(category_input("Apparel").validate().is_ok());
        assert!(collection_input("Summer Essentials", true).validate().is_ok());

        for demo in demo_products() {
            let fields = demo
                .input(CategoryId::new(1), CollectionId::new(1))
                .validate()
                .unwrap();
            assert_eq!(fields.price, demo.price);
            assert!(demo.image().validate().is_ok());
        }

        for discount in discount_inputs(CollectionId::new(1), ProductId::new(3)) {
            assert!(discount.validate(Utc::now()).is_ok());
        }

        for zone in [zone_input("Domestic", &["US"]), zone_input("Rest of world", &["*"])] {
            assert!(zone.validate().is_ok());
        }

        let [domestic, canada, world] =
            rate_inputs(ShippingMethodId::new(1), ShippingMethodId::new(2));
        assert_eq!(domestic.len() + canada.len() + world.len(), 6);
        for rate in domestic.into_iter().chain(canada).chain(world) {
            assert!(rate.validate(ShippingZoneId::new(1)).is_ok());
        }
    }

    #[test]
    fn test_money() {
        assert_eq!(money(5, 99).to_string(), "5.99");
        assert_eq!(money(48, 0).to_string(), "48.00");
    }
}
