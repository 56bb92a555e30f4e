//! Public catalog handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;

use wellspring_core::review::RatingSummary;
use wellspring_core::{PageParams, Paginated};

use crate::db::catalog::{Brand, Product, ProductFilter};
use crate::db::{CatalogRepository, OrderRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// A product page: the product plus its approved-review summary.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub rating: RatingSummary,
    /// Whether the visitor received this product; absent when logged out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_review: Option<bool>,
}

/// A brand page: the brand plus the first page of its products.
#[derive(Debug, Serialize)]
pub struct BrandView {
    #[serde(flatten)]
    pub brand: Brand,
    pub products: Paginated<Product>,
}

/// `GET /api/products`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<Product>>> {
    let (products, total) = CatalogRepository::new(state.pool())
        .list_products(&filter, page)
        .await?;
    Ok(Json(Paginated::new(products, page, total)))
}

/// `GET /api/products/{slug}`
///
/// # Errors
///
/// Returns 404 for unknown or inactive products.
pub async fn show_product(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
) -> Result<Json<ProductView>> {
    let product = CatalogRepository::new(state.pool())
        .get_product_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("product".to_string()))?;

    let ratings = ReviewRepository::new(state.pool())
        .approved_ratings(product.id)
        .await?;

    let can_review = match user {
        Some(user) => Some(
            OrderRepository::new(state.pool())
                .has_delivered_item(user.id, product.id)
                .await?,
        ),
        None => None,
    };

    Ok(Json(ProductView {
        product,
        rating: RatingSummary::from_ratings(&ratings),
        can_review,
    }))
}

/// `GET /api/brands`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_brands(State(state): State<AppState>) -> Result<Json<Vec<Brand>>> {
    Ok(Json(CatalogRepository::new(state.pool()).list_brands().await?))
}

/// `GET /api/brands/{slug}`
///
/// # Errors
///
/// Returns 404 for unknown or inactive brands.
pub async fn show_brand(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(page): Query<PageParams>,
) -> Result<Json<BrandView>> {
    let catalog = CatalogRepository::new(state.pool());
    let brand = catalog
        .get_brand_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("brand".to_string()))?;

    let filter = ProductFilter {
        brand: Some(brand.slug.clone()),
        ..ProductFilter::default()
    };
    let (products, total) = catalog.list_products(&filter, page).await?;

    Ok(Json(BrandView {
        brand,
        products: Paginated::new(products, page, total),
    }))
}
