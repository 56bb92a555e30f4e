//! Vendor dashboard handlers.
//!
//! Everything except `register` requires an approved vendor. Brand and
//! product IDs belonging to another vendor answer 404.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use wellspring_core::payout::{VendorBalance, validate_request};
use wellspring_core::text::{sanitize_optional, sanitize_text};
use wellspring_core::{BrandId, OrderItemId, OrderStatus, PageParams, Paginated, ProductId};

use crate::db::catalog::{Brand, NewBrand, NewProduct, Product, ProductUpdate};
use crate::db::orders::{OrderDetail, VendorOrderItem};
use crate::db::payouts::Payout;
use crate::db::vendors::Vendor;
use crate::db::{
    CatalogRepository, OrderRepository, PayoutRepository, RepositoryError, VendorRepository,
};
use crate::error::{AppError, FieldError, Result};
use crate::middleware::{RequireAuth, RequireVendor};
use crate::services::orders::OrderService;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Vendor application.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterVendorRequest {
    #[validate(length(min = 2, max = 120, message = "must be 2-120 characters"))]
    pub business_name: String,
}

/// New brand.
#[derive(Debug, Deserialize, Validate)]
pub struct BrandRequest {
    #[validate(length(min = 2, max = 120, message = "must be 2-120 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(url(message = "must be a URL"))]
    pub logo_url: Option<String>,
}

/// New product.
#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    pub brand_id: BrandId,
    #[validate(length(min = 2, max = 200, message = "must be 2-200 characters"))]
    pub name: String,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 60, message = "must be 1-60 characters"))]
    pub category: String,
    #[validate(range(min = 1, message = "must be positive"))]
    pub volume_ml: Option<i32>,
    pub price: Decimal,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub is_jar: bool,
    #[serde(default)]
    pub jar_deposit: Decimal,
    #[validate(url(message = "must be a URL"))]
    pub image_url: Option<String>,
}

/// Partial product update.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 2, max = 200, message = "must be 2-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 60, message = "must be 1-60 characters"))]
    pub category: Option<String>,
    #[validate(range(min = 1, message = "must be positive"))]
    pub volume_ml: Option<i32>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub stock: Option<i32>,
    pub is_jar: Option<bool>,
    pub jar_deposit: Option<Decimal>,
    #[validate(url(message = "must be a URL"))]
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// `?low_stock=true` on the product list.
#[derive(Debug, Default, Deserialize)]
pub struct VendorProductQuery {
    #[serde(default)]
    pub low_stock: bool,
}

/// `?status=` on the vendor order list.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<OrderStatus>,
}

/// Item status change.
#[derive(Debug, Deserialize)]
pub struct ItemStatusRequest {
    pub status: OrderStatus,
}

/// Payout request.
#[derive(Debug, Deserialize, Validate)]
pub struct PayoutRequest {
    pub amount: Decimal,
    #[validate(length(min = 2, max = 60, message = "must be 2-60 characters"))]
    pub method: String,
    #[validate(length(min = 4, max = 500, message = "must be 4-500 characters"))]
    pub account_details: String,
}

/// Balance with the amount still requestable.
#[derive(Debug, Serialize)]
pub struct BalanceView {
    #[serde(flatten)]
    pub balance: VendorBalance,
    pub available: Decimal,
    pub min_payout_amount: Decimal,
}

fn check_money(field: &str, value: Decimal, allow_zero: bool) -> Result<()> {
    let invalid = if allow_zero {
        value < Decimal::ZERO
    } else {
        value <= Decimal::ZERO
    };
    if invalid || value.scale() > 2 {
        return Err(AppError::Validation(vec![FieldError::new(
            field,
            "must be a positive amount with at most 2 decimal places",
        )]));
    }
    Ok(())
}

// =============================================================================
// Vendor Profile
// =============================================================================

/// `POST /api/vendor/register`: apply to sell. The profile starts unapproved.
///
/// # Errors
///
/// Returns 409 if the user already has a vendor profile.
pub async fn register(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<RegisterVendorRequest>,
) -> Result<(StatusCode, Json<Vendor>)> {
    body.validate()?;
    let business_name = sanitize_text(&body.business_name);

    let vendor = VendorRepository::new(state.pool())
        .create(user.id, &business_name)
        .await?;
    tracing::info!(vendor_id = %vendor.id, user_id = %user.id, "Vendor application received");

    Ok((StatusCode::CREATED, Json(vendor)))
}

// =============================================================================
// Brands
// =============================================================================

/// `GET /api/vendor/brands`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_brands(
    State(state): State<AppState>,
    vendor: RequireVendor,
) -> Result<Json<Vec<Brand>>> {
    Ok(Json(
        CatalogRepository::new(state.pool())
            .list_vendor_brands(vendor.vendor_id)
            .await?,
    ))
}

/// `POST /api/vendor/brands`
///
/// # Errors
///
/// Returns 400 for invalid input.
pub async fn create_brand(
    State(state): State<AppState>,
    vendor: RequireVendor,
    Json(body): Json<BrandRequest>,
) -> Result<(StatusCode, Json<Brand>)> {
    body.validate()?;

    let brand = CatalogRepository::new(state.pool())
        .create_brand(
            vendor.vendor_id,
            NewBrand {
                name: sanitize_text(&body.name),
                description: sanitize_optional(body.description.as_deref()),
                logo_url: body.logo_url,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(brand)))
}

// =============================================================================
// Products
// =============================================================================

/// `GET /api/vendor/products`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_products(
    State(state): State<AppState>,
    vendor: RequireVendor,
    Query(query): Query<VendorProductQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<Product>>> {
    let low_stock = if query.low_stock {
        let settings = state.settings().get(state.pool()).await?;
        Some(settings.low_stock_threshold)
    } else {
        None
    };

    let (products, total) = CatalogRepository::new(state.pool())
        .list_vendor_products(vendor.vendor_id, low_stock, page)
        .await?;
    Ok(Json(Paginated::new(products, page, total)))
}

/// `POST /api/vendor/products`
///
/// # Errors
///
/// Returns 400 for invalid input and 404 if the brand is not the vendor's.
pub async fn create_product(
    State(state): State<AppState>,
    vendor: RequireVendor,
    Json(body): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    body.validate()?;
    check_money("price", body.price, false)?;
    check_money("jar_deposit", body.jar_deposit, true)?;

    let product = CatalogRepository::new(state.pool())
        .create_product(
            vendor.vendor_id,
            NewProduct {
                brand_id: body.brand_id,
                name: sanitize_text(&body.name),
                description: sanitize_optional(body.description.as_deref()),
                category: sanitize_text(&body.category).to_lowercase(),
                volume_ml: body.volume_ml,
                price: body.price,
                stock: body.stock,
                is_jar: body.is_jar,
                jar_deposit: if body.is_jar { body.jar_deposit } else { Decimal::ZERO },
                image_url: body.image_url,
            },
        )
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("brand".to_string()),
            other => other.into(),
        })?;

    tracing::info!(product_id = %product.id, vendor_id = %vendor.vendor_id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PATCH /api/vendor/products/{id}`
///
/// # Errors
///
/// Returns 400 for invalid input and 404 if the product is not the vendor's.
pub async fn update_product(
    State(state): State<AppState>,
    vendor: RequireVendor,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductPatch>,
) -> Result<Json<Product>> {
    body.validate()?;
    if let Some(price) = body.price {
        check_money("price", price, false)?;
    }
    if let Some(deposit) = body.jar_deposit {
        check_money("jar_deposit", deposit, true)?;
    }

    let changes = ProductUpdate {
        name: body.name.as_deref().map(sanitize_text),
        description: sanitize_optional(body.description.as_deref()),
        category: body.category.as_deref().map(|c| sanitize_text(c).to_lowercase()),
        volume_ml: body.volume_ml,
        price: body.price,
        stock: body.stock,
        is_jar: body.is_jar,
        // Turning the jar flag off clears the deposit
        jar_deposit: if body.is_jar == Some(false) {
            Some(Decimal::ZERO)
        } else {
            body.jar_deposit
        },
        image_url: body.image_url,
        is_active: body.is_active,
    };

    let product = CatalogRepository::new(state.pool())
        .update_product(vendor.vendor_id, id, changes)
        .await?;
    Ok(Json(product))
}

/// `DELETE /api/vendor/products/{id}`: deactivate, keeping order history intact.
///
/// # Errors
///
/// Returns 404 if the product is not the vendor's.
pub async fn delete_product(
    State(state): State<AppState>,
    vendor: RequireVendor,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    CatalogRepository::new(state.pool())
        .deactivate_product(vendor.vendor_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

/// `GET /api/vendor/orders`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_orders(
    State(state): State<AppState>,
    vendor: RequireVendor,
    Query(query): Query<StatusQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<VendorOrderItem>>> {
    let (items, total) = OrderRepository::new(state.pool())
        .list_vendor_items(vendor.vendor_id, query.status, page)
        .await?;
    Ok(Json(Paginated::new(items, page, total)))
}

/// `PATCH /api/vendor/order-items/{id}/status`
///
/// # Errors
///
/// Returns 404 if the item is not the vendor's and 409 for a disallowed transition.
pub async fn update_item_status(
    State(state): State<AppState>,
    vendor: RequireVendor,
    Path(id): Path<OrderItemId>,
    Json(body): Json<ItemStatusRequest>,
) -> Result<Json<OrderDetail>> {
    let order = OrderService::new(&state)
        .change_item_status(vendor.vendor_id, id, body.status)
        .await?;
    Ok(Json(order))
}

// =============================================================================
// Balance and Payouts
// =============================================================================

/// `GET /api/vendor/balance`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn balance(
    State(state): State<AppState>,
    vendor: RequireVendor,
) -> Result<Json<BalanceView>> {
    let settings = state.settings().get(state.pool()).await?;
    let balance = PayoutRepository::new(state.pool())
        .balance(vendor.vendor_id)
        .await?;

    Ok(Json(BalanceView {
        available: balance.available(),
        balance,
        min_payout_amount: settings.min_payout_amount,
    }))
}

/// `GET /api/vendor/payouts`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_payouts(
    State(state): State<AppState>,
    vendor: RequireVendor,
) -> Result<Json<Vec<Payout>>> {
    Ok(Json(
        PayoutRepository::new(state.pool())
            .list_for_vendor(vendor.vendor_id)
            .await?,
    ))
}

/// `POST /api/vendor/payouts`
///
/// # Errors
///
/// Returns 400 if the amount is out of range and 409 if a request is open.
pub async fn request_payout(
    State(state): State<AppState>,
    vendor: RequireVendor,
    Json(body): Json<PayoutRequest>,
) -> Result<(StatusCode, Json<Payout>)> {
    body.validate()?;
    let settings = state.settings().get(state.pool()).await?;
    let payouts = PayoutRepository::new(state.pool());

    let balance = payouts.balance(vendor.vendor_id).await?;
    let has_open = payouts.has_open(vendor.vendor_id).await?;
    let amount = validate_request(body.amount, &balance, settings.min_payout_amount, has_open)?;

    let payout = payouts
        .create(
            vendor.vendor_id,
            amount,
            &sanitize_text(&body.method),
            &sanitize_text(&body.account_details),
        )
        .await?;

    tracing::info!(payout_id = %payout.id, vendor_id = %vendor.vendor_id, %amount, "Payout requested");
    Ok((StatusCode::CREATED, Json(payout)))
}
