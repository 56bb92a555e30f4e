//! Vendor payouts and balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use wellspring_core::payout::VendorBalance;
use wellspring_core::{PageParams, PayoutId, PayoutStatus, VendorId};

use super::RepositoryError;

const PAYOUT_SELECT: &str = r"
    SELECT p.id, p.vendor_id, v.business_name, p.amount, p.status, p.method,
           p.account_details, p.note, p.requested_at, p.processed_at
    FROM market.payouts p
    JOIN market.vendors v ON v.id = p.vendor_id
";

/// A payout request.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payout {
    pub id: PayoutId,
    pub vendor_id: VendorId,
    pub business_name: String,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub method: String,
    pub account_details: String,
    pub note: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct BalanceRow {
    total_earnings: Decimal,
    total_paid: Decimal,
    pending: Decimal,
}

/// Repository for payout database operations.
pub struct PayoutRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PayoutRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Settled earnings against paid and open payouts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn balance(&self, vendor_id: VendorId) -> Result<VendorBalance, RepositoryError> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r"
            SELECT
                COALESCE((SELECT SUM(vendor_earning) FROM market.order_items
                          WHERE vendor_id = $1 AND status = 'delivered'), 0) AS total_earnings,
                COALESCE((SELECT SUM(amount) FROM market.payouts
                          WHERE vendor_id = $1 AND status = 'paid'), 0) AS total_paid,
                COALESCE((SELECT SUM(amount) FROM market.payouts
                          WHERE vendor_id = $1 AND status IN ('pending', 'approved')), 0) AS pending
            ",
        )
        .bind(vendor_id)
        .fetch_one(self.pool)
        .await?;

        Ok(VendorBalance {
            total_earnings: row.total_earnings,
            total_paid: row.total_paid,
            pending: row.pending,
        })
    }

    /// Whether the vendor has a pending or approved request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_open(&self, vendor_id: VendorId) -> Result<bool, RepositoryError> {
        let open = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (SELECT 1 FROM market.payouts
                           WHERE vendor_id = $1 AND status IN ('pending', 'approved'))
            ",
        )
        .bind(vendor_id)
        .fetch_one(self.pool)
        .await?;

        Ok(open)
    }

    /// Create a pending request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another request is already open.
    pub async fn create(
        &self,
        vendor_id: VendorId,
        amount: Decimal,
        method: &str,
        account_details: &str,
    ) -> Result<Payout, RepositoryError> {
        let id = sqlx::query_scalar::<_, PayoutId>(
            r"
            INSERT INTO market.payouts (vendor_id, amount, method, account_details)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(vendor_id)
        .bind(amount)
        .bind(method)
        .bind(account_details)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::unique("a payout request is already open"))?;

        self.get(id).await
    }

    /// Get a payout by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn get(&self, id: PayoutId) -> Result<Payout, RepositoryError> {
        sqlx::query_as::<_, Payout>(&format!("{PAYOUT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// A vendor's payouts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<Payout>, RepositoryError> {
        let payouts = sqlx::query_as::<_, Payout>(&format!(
            "{PAYOUT_SELECT} WHERE p.vendor_id = $1 ORDER BY p.requested_at DESC"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(payouts)
    }

    /// All payouts, oldest first, for the admin queue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<PayoutStatus>,
        page: PageParams,
    ) -> Result<(Vec<Payout>, i64), RepositoryError> {
        let payouts = sqlx::query_as::<_, Payout>(&format!(
            r"
            {PAYOUT_SELECT}
            WHERE ($1::payout_status IS NULL OR p.status = $1)
            ORDER BY p.requested_at
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM market.payouts WHERE ($1::payout_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((payouts, total))
    }

    /// Move a payout from `from` to `to`. Fails if someone else moved it first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the payout is no longer in `from`.
    pub async fn transition(
        &self,
        id: PayoutId,
        from: PayoutStatus,
        to: PayoutStatus,
        note: Option<&str>,
    ) -> Result<Payout, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE market.payouts
            SET status = $3,
                note = COALESCE($4, note),
                processed_at = CASE WHEN $3 IN ('paid'::payout_status, 'rejected'::payout_status)
                                    THEN NOW() ELSE processed_at END
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(note)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict("payout status changed concurrently".to_owned()));
        }
        self.get(id).await
    }
}
