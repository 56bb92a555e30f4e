//! Delivery addresses.
//!
//! Each user has at most one default address, enforced by a partial unique
//! index. Every write that touches `is_default` clears the old default in
//! the same transaction before setting the new one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use wellspring_core::{AddressId, UserId};

use super::RepositoryError;

const ADDRESS_COLUMNS: &str = "id, user_id, label, recipient_name, phone, line1, line2, city, region, postal_code, is_default, created_at, updated_at";

/// A saved delivery address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: Option<String>,
    pub recipient_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address fields as entered by the user (already sanitised).
#[derive(Debug, Clone, Default)]
pub struct AddressFields {
    pub label: Option<String>,
    pub recipient_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AddressUpdate {
    pub label: Option<String>,
    pub recipient_name: Option<String>,
    pub phone: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub is_default: Option<bool>,
}

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM market.addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(addresses)
    }

    /// Get one of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is missing or belongs to someone else.
    pub async fn get(&self, user_id: UserId, id: AddressId) -> Result<Address, RepositoryError> {
        fetch_owned(&mut *self.pool.acquire().await?, user_id, id).await
    }

    /// Create an address. The user's first address, or one created with
    /// `make_default`, becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        fields: AddressFields,
        make_default: bool,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serialise concurrent writes for the same user
        sqlx::query("SELECT id FROM market.users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let has_any = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM market.addresses WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let is_default = make_default || !has_any;
        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            INSERT INTO market.addresses
                (user_id, label, recipient_name, phone, line1, line2, city, region, postal_code, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(fields.label)
        .bind(fields.recipient_name)
        .bind(fields.phone)
        .bind(fields.line1)
        .bind(fields.line2)
        .bind(fields.city)
        .bind(fields.region)
        .bind(fields.postal_code)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Update an address. Setting `is_default` to true clears the old default;
    /// unsetting it on the current default is ignored so a default always exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is missing or belongs to someone else.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        changes: AddressUpdate,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = fetch_owned(&mut tx, user_id, id).await?;
        let make_default = changes.is_default == Some(true) && !current.is_default;
        if make_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE market.addresses
            SET label = COALESCE($3, label),
                recipient_name = COALESCE($4, recipient_name),
                phone = COALESCE($5, phone),
                line1 = COALESCE($6, line1),
                line2 = COALESCE($7, line2),
                city = COALESCE($8, city),
                region = COALESCE($9, region),
                postal_code = COALESCE($10, postal_code),
                is_default = is_default OR $11,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(changes.label)
        .bind(changes.recipient_name)
        .bind(changes.phone)
        .bind(changes.line1)
        .bind(changes.line2)
        .bind(changes.city)
        .bind(changes.region)
        .bind(changes.postal_code)
        .bind(make_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Make an address the user's default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is missing or belongs to someone else.
    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<Address, RepositoryError> {
        self.update(
            user_id,
            id,
            AddressUpdate {
                is_default: Some(true),
                ..AddressUpdate::default()
            },
        )
        .await
    }

    /// Delete an address. If it was the default, the most recently created
    /// remaining address is promoted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is missing or belongs to someone else,
    /// and `RepositoryError::Conflict` while a subscription still delivers to it.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default = sqlx::query_scalar::<_, bool>(
            "DELETE FROM market.addresses WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::referenced("address is used by a subscription"))?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE market.addresses SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM market.addresses
                    WHERE user_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Load an address owned by `user_id` on an existing connection.
pub(crate) async fn fetch_owned(
    conn: &mut PgConnection,
    user_id: UserId,
    id: AddressId,
) -> Result<Address, RepositoryError> {
    sqlx::query_as::<_, Address>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM market.addresses WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

async fn clear_default(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE market.addresses SET is_default = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND is_default
        ",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}
