//! Product reviews.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use wellspring_core::{PageParams, ProductId, ReviewId, ReviewStatus, UserId};

use super::RepositoryError;

/// A review with the reviewer's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub reviewer_name: String,
    pub rating: i16,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.product_id, r.user_id, u.name AS reviewer_name, r.rating, r.title,
           r.comment, r.status, r.created_at, r.updated_at
    FROM market.reviews r
    JOIN market.users u ON u.id = r.user_id
";

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Approved reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_approved(
        &self,
        product_id: ProductId,
        page: PageParams,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            r"
            {REVIEW_SELECT}
            WHERE r.product_id = $1 AND r.status = 'approved'
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(product_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM market.reviews WHERE product_id = $1 AND status = 'approved'",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok((reviews, total))
    }

    /// Ratings of approved reviews, for the rating summary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn approved_ratings(&self, product_id: ProductId) -> Result<Vec<i16>, RepositoryError> {
        let ratings = sqlx::query_scalar::<_, i16>(
            "SELECT rating FROM market.reviews WHERE product_id = $1 AND status = 'approved'",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(ratings)
    }

    /// Create a pending review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: i16,
        title: Option<&str>,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let id = sqlx::query_scalar::<_, ReviewId>(
            r"
            INSERT INTO market.reviews (product_id, user_id, rating, title, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(title)
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::unique("review already exists"))?;

        self.get(id).await
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn get(&self, id: ReviewId) -> Result<Review, RepositoryError> {
        sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a review written by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing or written by someone else.
    pub async fn delete_own(&self, user_id: UserId, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.reviews WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Reviews for moderation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_status(
        &self,
        status: Option<ReviewStatus>,
        page: PageParams,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            r"
            {REVIEW_SELECT}
            WHERE ($1::review_status IS NULL OR r.status = $1)
            ORDER BY r.created_at
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM market.reviews WHERE ($1::review_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((reviews, total))
    }

    /// Store a moderation decision.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn set_status(&self, id: ReviewId, status: ReviewStatus) -> Result<Review, RepositoryError> {
        let result = sqlx::query(
            "UPDATE market.reviews SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await
    }
}
