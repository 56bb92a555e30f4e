//! Vendor repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use wellspring_core::{Email, PageParams, UserId, VendorId};

use super::RepositoryError;

const VENDOR_COLUMNS: &str = "id, user_id, business_name, commission_rate, is_approved, created_at, updated_at";

/// A seller profile attached to a user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vendor {
    pub id: VendorId,
    pub user_id: UserId,
    pub business_name: String,
    /// Per-vendor commission override; `None` uses the store default.
    pub commission_rate: Option<Decimal>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Vendor row with the owning user's contact details.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VendorWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub vendor: Vendor,
    pub email: Email,
    pub owner_name: String,
}

/// Admin changes to a vendor.
#[derive(Debug, Default, Clone, Copy)]
pub struct VendorUpdate {
    pub is_approved: Option<bool>,
    pub commission_rate: Option<Decimal>,
}

/// Repository for vendor database operations.
pub struct VendorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VendorRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the vendor profile owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Vendor>, RepositoryError> {
        let vendor = sqlx::query_as::<_, Vendor>(&format!(
            "SELECT {VENDOR_COLUMNS} FROM market.vendors WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(vendor)
    }

    /// Get a vendor with its owner's email, e.g. for notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vendor does not exist.
    pub async fn get_with_owner(&self, id: VendorId) -> Result<VendorWithOwner, RepositoryError> {
        sqlx::query_as::<_, VendorWithOwner>(
            r"
            SELECT v.id, v.user_id, v.business_name, v.commission_rate, v.is_approved,
                   v.created_at, v.updated_at, u.email, u.name AS owner_name
            FROM market.vendors v
            JOIN market.users u ON u.id = v.user_id
            WHERE v.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Register a new, unapproved vendor profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has one.
    pub async fn create(
        &self,
        user_id: UserId,
        business_name: &str,
    ) -> Result<Vendor, RepositoryError> {
        sqlx::query_as::<_, Vendor>(&format!(
            r"
            INSERT INTO market.vendors (user_id, business_name)
            VALUES ($1, $2)
            RETURNING {VENDOR_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(business_name)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::unique("vendor profile already exists"))
    }

    /// List vendors, pending approval first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        approved: Option<bool>,
        page: PageParams,
    ) -> Result<(Vec<VendorWithOwner>, i64), RepositoryError> {
        let vendors = sqlx::query_as::<_, VendorWithOwner>(
            r"
            SELECT v.id, v.user_id, v.business_name, v.commission_rate, v.is_approved,
                   v.created_at, v.updated_at, u.email, u.name AS owner_name
            FROM market.vendors v
            JOIN market.users u ON u.id = v.user_id
            WHERE ($1::boolean IS NULL OR v.is_approved = $1)
            ORDER BY v.is_approved, v.created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(approved)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM market.vendors WHERE ($1::boolean IS NULL OR is_approved = $1)",
        )
        .bind(approved)
        .fetch_one(self.pool)
        .await?;

        Ok((vendors, total))
    }

    /// Apply admin changes. Approving a vendor also gives its user the vendor role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vendor does not exist.
    pub async fn update(&self, id: VendorId, changes: VendorUpdate) -> Result<Vendor, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let vendor = sqlx::query_as::<_, Vendor>(&format!(
            r"
            UPDATE market.vendors
            SET is_approved = COALESCE($2, is_approved),
                commission_rate = COALESCE($3, commission_rate),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VENDOR_COLUMNS}
            "
        ))
        .bind(id)
        .bind(changes.is_approved)
        .bind(changes.commission_rate)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if changes.is_approved == Some(true) {
            // Admins keep their role
            sqlx::query(
                r"
                UPDATE market.users SET role = 'vendor', updated_at = NOW()
                WHERE id = $1 AND role = 'customer'
                ",
            )
            .bind(vendor.user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(vendor)
    }
}
