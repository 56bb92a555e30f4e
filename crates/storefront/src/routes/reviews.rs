//! Product reviews and their moderation.
//!
//! Reviews start pending and only approved ones are public. A customer may
//! review a product once, after at least one unit of it was delivered to them.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use wellspring_core::review::{ReviewError, moderate, validate};
use wellspring_core::text::sanitize_optional;
use wellspring_core::{PageParams, Paginated, ReviewId, ReviewStatus};

use crate::db::reviews::Review;
use crate::db::{CatalogRepository, OrderRepository, RepositoryError, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::state::AppState;

/// New review.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub title: Option<String>,
    pub comment: Option<String>,
}

/// `?status=` on the moderation queue.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewStatusQuery {
    pub status: Option<ReviewStatus>,
}

/// Moderation decision.
#[derive(Debug, Deserialize)]
pub struct ModerationRequest {
    pub status: ReviewStatus,
}

/// `GET /api/products/{slug}/reviews`
///
/// # Errors
///
/// Returns 404 for unknown products.
pub async fn list_for_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<Review>>> {
    let product = CatalogRepository::new(state.pool())
        .get_product_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("product".to_string()))?;

    let (reviews, total) = ReviewRepository::new(state.pool())
        .list_approved(product.id, page)
        .await?;
    Ok(Json(Paginated::new(reviews, page, total)))
}

/// `POST /api/products/{slug}/reviews`
///
/// # Errors
///
/// Returns 403 if the product was never delivered to the user and 409 if
/// they already reviewed it.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let title = sanitize_optional(body.title.as_deref());
    let comment = sanitize_optional(body.comment.as_deref());
    validate(body.rating, title.as_deref(), comment.as_deref())?;

    let product = CatalogRepository::new(state.pool())
        .get_product_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("product".to_string()))?;

    let delivered = OrderRepository::new(state.pool())
        .has_delivered_item(user.id, product.id)
        .await?;
    if !delivered {
        return Err(ReviewError::NotPurchased.into());
    }

    let review = ReviewRepository::new(state.pool())
        .create(product.id, user.id, body.rating, title.as_deref(), comment.as_deref())
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => ReviewError::AlreadyReviewed.into(),
            other => AppError::from(other),
        })?;

    tracing::info!(review_id = %review.id, product_id = %product.id, "Review submitted");
    Ok((StatusCode::CREATED, Json(review)))
}

/// `DELETE /api/reviews/{id}`: remove one's own review.
///
/// # Errors
///
/// Returns 404 if the review is missing or someone else's.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode> {
    ReviewRepository::new(state.pool())
        .delete_own(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/admin/reviews`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn admin_list(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<ReviewStatusQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<Review>>> {
    let (reviews, total) = ReviewRepository::new(state.pool())
        .list_by_status(query.status, page)
        .await?;
    Ok(Json(Paginated::new(reviews, page, total)))
}

/// `PATCH /api/admin/reviews/{id}`: approve or reject.
///
/// # Errors
///
/// Returns 404 for unknown reviews and 409 for a disallowed transition.
pub async fn moderate_review(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ReviewId>,
    Json(body): Json<ModerationRequest>,
) -> Result<Json<Review>> {
    let reviews = ReviewRepository::new(state.pool());
    let current = reviews.get(id).await?;
    let next = moderate(current.status, body.status)?;

    let review = reviews.set_status(id, next).await?;
    tracing::info!(review_id = %id, status = %next, admin_id = %admin.id, "Review moderated");
    Ok(Json(review))
}
