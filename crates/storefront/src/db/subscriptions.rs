//! Recurring delivery subscriptions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use wellspring_core::{
    AddressId, ProductId, SubscriptionFrequency, SubscriptionId, SubscriptionStatus, UserId,
};

use super::RepositoryError;

const SUBSCRIPTION_SELECT: &str = r"
    SELECT s.id, s.user_id, s.product_id, p.name AS product_name, s.address_id, s.quantity,
           s.frequency, s.status, s.next_delivery_date, s.delivery_day, s.created_at,
           s.updated_at
    FROM market.subscriptions s
    JOIN market.products p ON p.id = s.product_id
";

/// A subscription with its product name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    pub address_id: AddressId,
    pub quantity: i32,
    pub frequency: SubscriptionFrequency,
    pub status: SubscriptionStatus,
    pub next_delivery_date: NaiveDate,
    /// Day of month monthly deliveries land on.
    pub delivery_day: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// `delivery_day` as the scheduling rules take it.
    #[must_use]
    pub fn anchor_day(&self) -> u32 {
        u32::try_from(self.delivery_day).unwrap_or(1)
    }
}

/// Fields for a new subscription.
pub struct NewSubscription {
    pub product_id: ProductId,
    pub address_id: AddressId,
    pub quantity: i32,
    pub frequency: SubscriptionFrequency,
    pub next_delivery_date: NaiveDate,
}

/// Repository for subscription database operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's subscriptions, active first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Subscription>, RepositoryError> {
        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            r"
            {SUBSCRIPTION_SELECT}
            WHERE s.user_id = $1
            ORDER BY s.status, s.next_delivery_date
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(subscriptions)
    }

    /// Get one of the user's subscriptions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing or owned by someone else.
    pub async fn get(&self, user_id: UserId, id: SubscriptionId) -> Result<Subscription, RepositoryError> {
        sqlx::query_as::<_, Subscription>(&format!(
            "{SUBSCRIPTION_SELECT} WHERE s.id = $1 AND s.user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create an active subscription.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        new: NewSubscription,
    ) -> Result<Subscription, RepositoryError> {
        let id = sqlx::query_scalar::<_, SubscriptionId>(
            r"
            INSERT INTO market.subscriptions
                (user_id, product_id, address_id, quantity, frequency, next_delivery_date,
                 delivery_day)
            VALUES ($1, $2, $3, $4, $5, $6, EXTRACT(DAY FROM $6::date)::smallint)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(new.product_id)
        .bind(new.address_id)
        .bind(new.quantity)
        .bind(new.frequency)
        .bind(new.next_delivery_date)
        .fetch_one(self.pool)
        .await?;

        self.get(user_id, id).await
    }

    /// Store status, schedule, quantity and frequency after a change.
    ///
    /// `delivery_day` moves to the day of `next_delivery_date` when the
    /// frequency changes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing or owned by someone else.
    pub async fn update(
        &self,
        user_id: UserId,
        id: SubscriptionId,
        status: SubscriptionStatus,
        next_delivery_date: NaiveDate,
        quantity: i32,
        frequency: SubscriptionFrequency,
    ) -> Result<Subscription, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE market.subscriptions
            SET status = $3, next_delivery_date = $4, quantity = $5, frequency = $6,
                delivery_day = CASE WHEN frequency = $6 THEN delivery_day
                                    ELSE EXTRACT(DAY FROM $4::date)::smallint END,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(status)
        .bind(next_delivery_date)
        .bind(quantity)
        .bind(frequency)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(user_id, id).await
    }

    /// IDs of active subscriptions due on or before `today`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due(&self, today: NaiveDate) -> Result<Vec<SubscriptionId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, SubscriptionId>(
            r"
            SELECT id FROM market.subscriptions
            WHERE status = 'active' AND next_delivery_date <= $1
            ORDER BY next_delivery_date, id
            ",
        )
        .bind(today)
        .fetch_all(self.pool)
        .await?;

        Ok(ids)
    }
}

/// Lock a due subscription, skipping it if another worker holds it or it is
/// no longer due.
pub(crate) async fn lock_due(
    conn: &mut PgConnection,
    id: SubscriptionId,
    today: NaiveDate,
) -> Result<Option<Subscription>, RepositoryError> {
    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        r"
        {SUBSCRIPTION_SELECT}
        WHERE s.id = $1 AND s.status = 'active' AND s.next_delivery_date <= $2
        FOR UPDATE OF s SKIP LOCKED
        "
    ))
    .bind(id)
    .bind(today)
    .fetch_optional(conn)
    .await?;

    Ok(subscription)
}

/// Move a subscription to its next delivery date.
pub(crate) async fn set_next_delivery(
    conn: &mut PgConnection,
    id: SubscriptionId,
    next_delivery_date: NaiveDate,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE market.subscriptions SET next_delivery_date = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(next_delivery_date)
    .execute(conn)
    .await?;
    Ok(())
}
