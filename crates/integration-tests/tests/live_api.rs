//! End-to-end tests against a running server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`ws-cli migrate`)
//! - The storefront running (`cargo run -p wellspring-storefront`)
//! - For order lifecycle tests, an admin account named by
//!   `STOREFRONT_TEST_ADMIN_EMAIL` and `STOREFRONT_TEST_ADMIN_PASSWORD`
//!
//! Run with: `cargo test -p wellspring-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use wellspring_integration_tests::{live_admin_credentials, live_base_url};

/// A cookie-keeping client with its own forwarded IP, so each test gets a
/// fresh rate-limit bucket.
fn client() -> Client {
    let octet = Uuid::new_v4().as_bytes()[0];
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&format!("198.51.100.{octet}")).unwrap(),
    );

    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// Register a fresh customer; the client keeps the session cookie.
async fn register(client: &Client) -> Value {
    let email = format!("it-{}@wellspring.test", Uuid::new_v4().simple());
    let resp = client
        .post(format!("{}/api/auth/register", live_base_url()))
        .json(&json!({
            "email": email,
            "password": "correct horse battery",
            "name": "Integration Tester",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn create_address(client: &Client, label: &str, is_default: bool) -> Value {
    let resp = client
        .post(format!("{}/api/addresses", live_base_url()))
        .json(&json!({
            "label": label,
            "recipient_name": "Integration Tester",
            "phone": "+1 555 0100",
            "line1": "1 Spring Street",
            "city": "Austin",
            "is_default": is_default,
        }))
        .send()
        .await
        .expect("Failed to create address");

    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn list_addresses(client: &Client) -> Vec<Value> {
    client
        .get(format!("{}/api/addresses", live_base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_register_me_logout() {
    let client = client();
    let user = register(&client).await;
    assert_eq!(user["role"], "customer");
    assert!(user.get("password_hash").is_none());

    let me: Value = client
        .get(format!("{}/api/auth/me", live_base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["id"], user["id"]);

    let resp = client
        .post(format!("{}/api/auth/logout", live_base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .get(format!("{}/api/auth/me", live_base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_customer_cannot_reach_admin_or_vendor_routes() {
    let client = client();
    register(&client).await;

    for path in ["/api/admin/users", "/api/vendor/balance"] {
        let resp = client
            .get(format!("{}{path}", live_base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
    }
}

// ============================================================================
// Addresses
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_new_default_address_unsets_previous_default() {
    let client = client();
    register(&client).await;

    let home = create_address(&client, "Home", false).await;
    assert_eq!(home["is_default"], true, "first address becomes the default");

    let office = create_address(&client, "Office", true).await;
    assert_eq!(office["is_default"], true);

    let addresses = list_addresses(&client).await;
    let defaults: Vec<&Value> = addresses.iter().filter(|a| a["is_default"] == true).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], office["id"]);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_deleting_default_promotes_remaining_address() {
    let client = client();
    register(&client).await;

    let home = create_address(&client, "Home", true).await;
    let office = create_address(&client, "Office", false).await;

    let resp = client
        .delete(format!("{}/api/addresses/{}", live_base_url(), home["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let addresses = list_addresses(&client).await;
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0]["id"], office["id"]);
    assert_eq!(addresses[0]["is_default"], true);
}

// ============================================================================
// Catalog and orders
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_product_listing_is_paginated() {
    let resp = client()
        .get(format!(
            "{}/api/products?sort=price_asc&page=1&per_page=5",
            live_base_url()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().len() <= 5);
    assert_eq!(body["page"], 1);
    assert!(body["total"].is_number());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_other_users_orders_are_not_found() {
    let client = client();
    register(&client).await;

    let resp = client
        .get(format!(
            "{}/api/orders/{}",
            live_base_url(),
            i32::MAX
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_tracker_log_and_summary() {
    let client = client();
    register(&client).await;
    let base = live_base_url();

    let resp = client
        .post(format!("{base}/api/tracker/logs"))
        .json(&json!({ "amount_ml": 750 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let summary: Value = client
        .get(format!("{base}/api/tracker/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["total_ml"], 750);
    assert_eq!(summary["logs"].as_array().unwrap().len(), 1);

    let resp = client
        .post(format!("{base}/api/tracker/logs"))
        .json(&json!({ "amount_ml": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Order lifecycle
// ============================================================================

fn decimal(value: &Value) -> f64 {
    value
        .as_str()
        .map(str::parse::<f64>)
        .unwrap_or_else(|| Ok(value.as_f64().unwrap()))
        .unwrap()
}

fn suffix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_uppercase()
}

async fn admin_client() -> Client {
    let client = client();
    let (email, password) = live_admin_credentials();
    let resp = client
        .post(format!("{}/api/auth/login", live_base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in as admin");
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

/// An approved vendor with one product; returns the vendor client and the
/// product.
async fn vendor_with_product(admin: &Client, stock: i32) -> (Client, Value) {
    let base = live_base_url();
    let vendor = client();
    register(&vendor).await;

    let resp = vendor
        .post(format!("{base}/api/vendor/register"))
        .json(&json!({ "business_name": format!("Spring Co {}", suffix()) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let profile: Value = resp.json().await.unwrap();

    let resp = admin
        .patch(format!("{base}/api/admin/vendors/{}", profile["id"]))
        .json(&json!({ "is_approved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let brand: Value = vendor
        .post(format!("{base}/api/vendor/brands"))
        .json(&json!({ "name": format!("Clearwater {}", suffix()) }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = vendor
        .post(format!("{base}/api/vendor/products"))
        .json(&json!({
            "brand_id": brand["id"],
            "name": format!("Still Water 1.5L {}", suffix()),
            "category": "still",
            "volume_ml": 1500,
            "price": "10.00",
            "stock": stock,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product = resp.json().await.unwrap();

    (vendor, product)
}

async fn product_stock(vendor: &Client, product_id: &Value) -> i64 {
    let page: Value = vendor
        .get(format!("{}/api/vendor/products?per_page=100", live_base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| &p["id"] == product_id)
        .expect("product listed for its vendor")["stock"]
        .as_i64()
        .unwrap()
}

async fn promo_used_count(admin: &Client, promo_id: &Value) -> i64 {
    let promos: Vec<Value> = admin
        .get(format!("{}/api/admin/promo-codes", live_base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    promos
        .iter()
        .find(|p| &p["id"] == promo_id)
        .expect("promo code listed")["used_count"]
        .as_i64()
        .unwrap()
}

/// Register a customer with an address and place a cash-on-delivery order.
async fn cod_order(product: &Value, quantity: u32, promo_code: Option<&str>) -> (Client, Value) {
    let customer = client();
    register(&customer).await;
    let address = create_address(&customer, "Home", true).await;

    let resp = customer
        .post(format!("{}/api/orders", live_base_url()))
        .json(&json!({
            "items": [{ "product_id": product["id"], "quantity": quantity }],
            "address_id": address["id"],
            "payment_method": "cod",
            "promo_code": promo_code,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    (customer, resp.json().await.unwrap())
}

#[tokio::test]
#[ignore = "Requires running storefront server, database and admin account"]
async fn test_cancelling_order_restores_stock_and_promo_use() {
    let base = live_base_url();
    let admin = admin_client().await;
    let (vendor, product) = vendor_with_product(&admin, 20).await;

    let code = format!("IT-{}", suffix());
    let resp = admin
        .post(format!("{base}/api/admin/promo-codes"))
        .json(&json!({
            "code": code,
            "discount_type": "fixed",
            "discount_value": "5.00",
            "usage_limit": 10,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let promo: Value = resp.json().await.unwrap();

    let (customer, order) = cod_order(&product, 3, Some(&code)).await;
    assert_eq!(order["status"], "pending");
    assert!((decimal(&order["discount_total"]) - 5.0).abs() < f64::EPSILON);
    assert_eq!(product_stock(&vendor, &product["id"]).await, 17);
    assert_eq!(promo_used_count(&admin, &promo["id"]).await, 1);

    let resp = customer
        .post(format!("{base}/api/orders/{}/cancel", order["id"]))
        .json(&json!({ "reason": "Ordered by mistake" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cancelled: Value = resp.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert!(
        cancelled["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|item| item["status"] == "cancelled")
    );

    assert_eq!(product_stock(&vendor, &product["id"]).await, 20);
    assert_eq!(promo_used_count(&admin, &promo["id"]).await, 0);

    // A second cancel is refused and restocks nothing.
    let resp = customer
        .post(format!("{base}/api/orders/{}/cancel", order["id"]))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
    assert_eq!(product_stock(&vendor, &product["id"]).await, 20);
}

#[tokio::test]
#[ignore = "Requires running storefront server, database and admin account"]
async fn test_delivery_settles_commission_and_marks_cod_paid() {
    let base = live_base_url();
    let admin = admin_client().await;
    let (vendor, product) = vendor_with_product(&admin, 10).await;

    let (_customer, order) = cod_order(&product, 2, None).await;
    assert_eq!(order["payment_status"], "pending");
    assert!(order["items"][0]["commission_amount"].is_null());

    let resp = admin
        .patch(format!("{base}/api/admin/orders/{}/status", order["id"]))
        .json(&json!({ "status": "delivered" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let delivered: Value = resp.json().await.unwrap();

    assert_eq!(delivered["status"], "delivered");
    assert_eq!(delivered["payment_status"], "paid");
    assert!(delivered["delivered_at"].is_string());

    let item = &delivered["items"][0];
    assert_eq!(item["status"], "delivered");
    let commission = decimal(&item["commission_amount"]);
    let earning = decimal(&item["vendor_earning"]);
    assert!(commission >= 0.0);
    assert!((commission + earning - 20.0).abs() < 0.005, "goods total is split");

    let balance: Value = vendor
        .get(format!("{base}/api/vendor/balance"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!((decimal(&balance["total_earnings"]) - earning).abs() < 0.005);
    assert!((decimal(&balance["available"]) - earning).abs() < 0.005);

    // Stock stays sold after delivery.
    assert_eq!(product_stock(&vendor, &product["id"]).await, 8);
}

