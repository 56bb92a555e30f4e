//! Promo codes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use wellspring_core::promo::PromoRules;
use wellspring_core::{DiscountType, PromoCodeId};

use super::RepositoryError;

const PROMO_COLUMNS: &str = r"
    id, code, discount_type, discount_value, max_discount, min_order_amount, usage_limit,
    used_count, starts_at, expires_at, is_active, created_at, updated_at
";

/// A stored promo code.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromoCode {
    /// The fields the core promo rules evaluate.
    #[must_use]
    pub const fn rules(&self) -> PromoRules {
        PromoRules {
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            max_discount: self.max_discount,
            min_order_amount: self.min_order_amount,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
        }
    }
}

/// Repository for promo code database operations.
pub struct PromoCodeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PromoCodeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a normalised code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<PromoCode>, RepositoryError> {
        let promo = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {PROMO_COLUMNS} FROM market.promo_codes WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(promo)
    }

    /// List every code, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<PromoCode>, RepositoryError> {
        let promos = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {PROMO_COLUMNS} FROM market.promo_codes ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(promos)
    }

    /// Get a code by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn get(&self, id: PromoCodeId) -> Result<PromoCode, RepositoryError> {
        sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {PROMO_COLUMNS} FROM market.promo_codes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create a code. `used_count` of `rules` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, code: &str, rules: &PromoRules) -> Result<PromoCode, RepositoryError> {
        sqlx::query_as::<_, PromoCode>(&format!(
            r"
            INSERT INTO market.promo_codes
                (code, discount_type, discount_value, max_discount, min_order_amount,
                 usage_limit, starts_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PROMO_COLUMNS}
            "
        ))
        .bind(code)
        .bind(rules.discount_type)
        .bind(rules.discount_value)
        .bind(rules.max_discount)
        .bind(rules.min_order_amount)
        .bind(rules.usage_limit)
        .bind(rules.starts_at)
        .bind(rules.expires_at)
        .bind(rules.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::unique("promo code already exists"))
    }

    /// Replace a code's rules, keeping its usage count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn update(&self, id: PromoCodeId, rules: &PromoRules) -> Result<PromoCode, RepositoryError> {
        sqlx::query_as::<_, PromoCode>(&format!(
            r"
            UPDATE market.promo_codes
            SET discount_type = $2, discount_value = $3, max_discount = $4,
                min_order_amount = $5, usage_limit = $6, starts_at = $7,
                expires_at = $8, is_active = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROMO_COLUMNS}
            "
        ))
        .bind(id)
        .bind(rules.discount_type)
        .bind(rules.discount_value)
        .bind(rules.max_discount)
        .bind(rules.min_order_amount)
        .bind(rules.usage_limit)
        .bind(rules.starts_at)
        .bind(rules.expires_at)
        .bind(rules.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a code. Orders keep their discount and lose the reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn delete(&self, id: PromoCodeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.promo_codes WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Deactivate every code whose end date has passed. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE market.promo_codes SET is_active = FALSE, updated_at = NOW()
            WHERE is_active AND expires_at IS NOT NULL AND expires_at <= $1
            ",
        )
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Lock a code for checkout.
pub(crate) async fn lock_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<PromoCode>, RepositoryError> {
    let promo = sqlx::query_as::<_, PromoCode>(&format!(
        "SELECT {PROMO_COLUMNS} FROM market.promo_codes WHERE code = $1 FOR UPDATE"
    ))
    .bind(code)
    .fetch_optional(conn)
    .await?;

    Ok(promo)
}

/// Count one use of a code.
pub(crate) async fn record_use(conn: &mut PgConnection, id: PromoCodeId) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE market.promo_codes SET used_count = used_count + 1, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Give back one use of a code when its order is cancelled.
pub(crate) async fn release_use(conn: &mut PgConnection, id: PromoCodeId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE market.promo_codes SET used_count = GREATEST(used_count - 1, 0), updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}
