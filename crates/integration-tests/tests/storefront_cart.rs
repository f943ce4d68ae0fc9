//! End-to-end shopper flow: catalog, cart, discounts and shipping.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`tillbox migrate`)
//! - Both servers running (`tillbox-admin` and `tillbox-storefront`)
//! - `ADMIN_API_TOKEN` matching the admin server's token

#![allow(clippy::indexing_slicing)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use tillbox_integration_tests::{
    AdminClient, decimal, expect_json, id_of, money, shopper_client, storefront_base_url,
};

/// A store with one discounted product and one flat domestic rate.
struct Fixture {
    base: String,
    slug: String,
    zone_id: i64,
    product_id: i64,
    draft_id: i64,
}

async fn fixture(admin: &AdminClient) -> Fixture {
    let (store_id, slug) = admin.create_store("Cart Shop").await;
    let base = format!("/api/stores/{store_id}");

    let product = admin
        .create(
            &format!("{base}/products"),
            &json!({
                "name": "Linen Shirt",
                "price": "40.00",
                "weight_grams": 300,
                "inventory_quantity": 3,
                "status": "active",
            }),
        )
        .await;
    let product_id = id_of(&product);

    let draft = admin
        .create(
            &format!("{base}/products"),
            &json!({ "name": "Secret", "price": "10.00" }),
        )
        .await;

    admin
        .create(
            &format!("{base}/discounts"),
            &json!({
                "name": "Quarter off",
                "percentage": "25",
                "product_ids": [product_id],
            }),
        )
        .await;

    let zone = admin
        .create(
            &format!("{base}/shipping/zones"),
            &json!({ "name": "Domestic", "regions": [{ "country_code": "US" }] }),
        )
        .await;
    let zone_id = id_of(&zone);
    admin
        .create(
            &format!("{base}/shipping/zones/{zone_id}/rates"),
            &json!({ "name": "Standard", "rate_type": "flat", "amount": "5.00" }),
        )
        .await;

    Fixture {
        base,
        slug,
        zone_id,
        product_id,
        draft_id: id_of(&draft),
    }
}

fn url(slug: &str, path: &str) -> String {
    format!("{}/api/stores/{slug}{path}", storefront_base_url())
}

async fn send_json(client: &Client, method: reqwest::Method, url: String, body: &Value) -> reqwest::Response {
    client
        .request(method, url)
        .json(body)
        .send()
        .await
        .expect("request failed")
}

async fn get_cart(client: &Client, slug: &str) -> Value {
    expect_json(
        client.get(url(slug, "/cart")).send().await.expect("request failed"),
        StatusCode::OK,
    )
    .await
}

async fn add(client: &Client, slug: &str, product_id: i64, quantity: i64) -> reqwest::Response {
    send_json(
        client,
        reqwest::Method::POST,
        url(slug, "/cart/items"),
        &json!({ "product_id": product_id, "quantity": quantity }),
    )
    .await
}

async fn set_country(client: &Client, slug: &str, country: &str) -> Value {
    expect_json(
        send_json(
            client,
            reqwest::Method::PUT,
            url(slug, "/cart/address"),
            &json!({ "country_code": country }),
        )
        .await,
        StatusCode::OK,
    )
    .await
}

/// Select the cheapest offered rate and return its id.
async fn select_cheapest(client: &Client, slug: &str) -> i64 {
    let quote: Value = expect_json(
        client
            .get(url(slug, "/cart/shipping-rates"))
            .send()
            .await
            .expect("request failed"),
        StatusCode::OK,
    )
    .await;
    let rate_id = quote["rates"][0]["rate_id"].as_i64().expect("rate id");
    let selected: Value = expect_json(
        send_json(
            client,
            reqwest::Method::PUT,
            url(slug, "/cart/shipping"),
            &json!({ "rate_id": rate_id }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(selected["shipping_rate"]["rate_id"], rate_id);
    rate_id
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_catalog_shows_active_products_with_sale_price() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    let shopper = shopper_client();

    let products: Vec<Value> = expect_json(
        shopper.get(url(&fx.slug, "/products")).send().await.expect("request failed"),
        StatusCode::OK,
    )
    .await;
    assert_eq!(products.len(), 1);
    assert_eq!(decimal(&products[0]["sale_price"]), money("30.00"));
    assert_eq!(products[0]["max_orderable"], 3);

    let draft = shopper
        .get(url(&fx.slug, "/products/secret"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(draft.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_checkout_flow() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    let shopper = shopper_client();

    // An untouched session has an empty cart.
    let empty: Value = expect_json(
        shopper.get(url(&fx.slug, "/cart")).send().await.expect("request failed"),
        StatusCode::OK,
    )
    .await;
    assert_eq!(empty["item_count"], 0);

    let cart: Value = expect_json(
        send_json(
            &shopper,
            reqwest::Method::POST,
            url(&fx.slug, "/cart/items"),
            &json!({ "product_id": fx.product_id, "quantity": 2 }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(cart["item_count"], 2);
    assert_eq!(decimal(&cart["subtotal"]), money("80.00"));
    assert_eq!(decimal(&cart["discount_total"]), money("20.00"));
    assert_eq!(decimal(&cart["grand_total"]), money("60.00"));

    let too_many = send_json(
        &shopper,
        reqwest::Method::POST,
        url(&fx.slug, "/cart/items"),
        &json!({ "product_id": fx.product_id, "quantity": 2 }),
    )
    .await;
    assert_eq!(too_many.status(), StatusCode::CONFLICT);

    let no_address = shopper
        .get(url(&fx.slug, "/cart/shipping-rates"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(no_address.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let with_address = send_json(
        &shopper,
        reqwest::Method::PUT,
        url(&fx.slug, "/cart/address"),
        &json!({ "country_code": "us", "postal_code": " 97201 " }),
    )
    .await;
    assert_eq!(with_address.status(), StatusCode::OK);

    let quote: Value = expect_json(
        shopper
            .get(url(&fx.slug, "/cart/shipping-rates"))
            .send()
            .await
            .expect("request failed"),
        StatusCode::OK,
    )
    .await;
    let rate_id = quote["rates"][0]["rate_id"].as_i64().expect("rate id");

    let selected: Value = expect_json(
        send_json(
            &shopper,
            reqwest::Method::PUT,
            url(&fx.slug, "/cart/shipping"),
            &json!({ "rate_id": rate_id }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(decimal(&selected["shipping"]), money("5.00"));
    assert_eq!(decimal(&selected["grand_total"]), money("65.00"));
    assert_eq!(selected["shipping_address"]["country_code"], "US");

    let cleared = shopper
        .delete(url(&fx.slug, "/cart"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(cleared.status(), StatusCode::NO_CONTENT);

    let after: Value = expect_json(
        shopper.get(url(&fx.slug, "/cart")).send().await.expect("request failed"),
        StatusCode::OK,
    )
    .await;
    assert_eq!(after["item_count"], 0);
    assert!(after["shipping"].is_null());
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_carts_are_per_session() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    let alice = shopper_client();
    let bob = shopper_client();

    let resp = send_json(
        &alice,
        reqwest::Method::POST,
        url(&fx.slug, "/cart/items"),
        &json!({ "product_id": fx.product_id }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let other: Value = expect_json(
        bob.get(url(&fx.slug, "/cart")).send().await.expect("request failed"),
        StatusCode::OK,
    )
    .await;
    assert_eq!(other["item_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_draft_products_cannot_be_added() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    let shopper = shopper_client();

    let resp = send_json(
        &shopper,
        reqwest::Method::POST,
        url(&fx.slug, "/cart/items"),
        &json!({ "product_id": fx.draft_id }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_archived_product_is_dropped_from_cart() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    let shopper = shopper_client();

    assert_eq!(add(&shopper, &fx.slug, fx.product_id, 1).await.status(), StatusCode::OK);

    let resp = admin
        .patch(
            &format!("{}/products/{}", fx.base, fx.product_id),
            &json!({ "status": "archived" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cart = get_cart(&shopper, &fx.slug).await;
    assert_eq!(cart["item_count"], 0);
    assert!(cart["lines"].as_array().expect("lines").is_empty());
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_free_rate_cleared_below_threshold() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    admin
        .create(
            &format!("{}/shipping/zones/{}/rates", fx.base, fx.zone_id),
            &json!({ "name": "Free over 50", "rate_type": "free", "min_subtotal": "50.00" }),
        )
        .await;
    let shopper = shopper_client();

    // Two shirts at 30.00 after discount clear the threshold
    assert_eq!(add(&shopper, &fx.slug, fx.product_id, 2).await.status(), StatusCode::OK);
    set_country(&shopper, &fx.slug, "US").await;
    select_cheapest(&shopper, &fx.slug).await;

    let cart: Value = expect_json(
        send_json(
            &shopper,
            reqwest::Method::PATCH,
            url(&fx.slug, &format!("/cart/items/{}", fx.product_id)),
            &json!({ "quantity": 1 }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert!(cart["shipping_rate"].is_null());
    assert!(cart["shipping"].is_null());
    assert_eq!(decimal(&cart["grand_total"]), money("30.00"));

    let cart = get_cart(&shopper, &fx.slug).await;
    assert!(cart["shipping_rate"].is_null());
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_rate_cleared_when_address_leaves_zone() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    let shopper = shopper_client();

    assert_eq!(add(&shopper, &fx.slug, fx.product_id, 1).await.status(), StatusCode::OK);
    set_country(&shopper, &fx.slug, "US").await;
    select_cheapest(&shopper, &fx.slug).await;

    let cart = set_country(&shopper, &fx.slug, "CA").await;
    assert!(cart["shipping_rate"].is_null());
    assert_eq!(cart["shipping_address"]["country_code"], "CA");
    assert_eq!(decimal(&cart["grand_total"]), money("30.00"));
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_patch_to_zero_empties_cart_and_drops_selection() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    let shopper = shopper_client();

    assert_eq!(add(&shopper, &fx.slug, fx.product_id, 1).await.status(), StatusCode::OK);
    set_country(&shopper, &fx.slug, "US").await;
    select_cheapest(&shopper, &fx.slug).await;

    let item_url = url(&fx.slug, &format!("/cart/items/{}", fx.product_id));
    let cart: Value = expect_json(
        send_json(&shopper, reqwest::Method::PATCH, item_url.clone(), &json!({ "quantity": 0 })).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(cart["item_count"], 0);
    assert!(cart["lines"].as_array().expect("lines").is_empty());
    assert!(cart["shipping_rate"].is_null());

    // The line is gone, so patching it again is a 404
    let again = send_json(&shopper, reqwest::Method::PATCH, item_url, &json!({ "quantity": 1 })).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers"]
async fn test_concurrent_adds_all_count() {
    let admin = AdminClient::from_env();
    let fx = fixture(&admin).await;
    let untracked = admin
        .create(
            &format!("{}/products", fx.base),
            &json!({ "name": "Enamel Pin", "price": "4.00", "status": "active" }),
        )
        .await;
    let product_id = id_of(&untracked);
    let shopper = shopper_client();

    // The first write creates the cart and its session cookie
    assert_eq!(add(&shopper, &fx.slug, product_id, 1).await.status(), StatusCode::OK);

    let mut writers = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let client = shopper.clone();
        let slug = fx.slug.clone();
        writers.spawn(async move { add(&client, &slug, product_id, 1).await.status() });
    }
    while let Some(status) = writers.join_next().await {
        assert_eq!(status.expect("writer panicked"), StatusCode::OK);
    }

    let cart = get_cart(&shopper, &fx.slug).await;
    assert_eq!(cart["item_count"], 9);
    assert_eq!(cart["lines"][0]["quantity"], 9);
}
