//! Key/value settings storage.
//!
//! Values are JSON documents; [`StoreSettings`] lives under
//! [`STORE_SETTINGS_KEY`].

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use wellspring_core::StoreSettings;
use wellspring_core::settings::STORE_SETTINGS_KEY;

use super::RepositoryError;

/// Repository for settings database operations.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a raw setting value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
        let value = sqlx::query_scalar::<_, JsonValue>("SELECT value FROM market.settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool)
            .await?;

        Ok(value)
    }

    /// Set a raw setting value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set(&self, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO market.settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Load store settings, falling back to defaults when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored document has the wrong shape.
    pub async fn store_settings(&self) -> Result<StoreSettings, RepositoryError> {
        match self.get(STORE_SETTINGS_KEY).await? {
            Some(value) => StoreSettings::from_json(value)
                .map_err(|e| RepositoryError::DataCorruption(format!("invalid store settings: {e}"))),
            None => Ok(StoreSettings::default()),
        }
    }

    /// Save store settings. Callers validate first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_store_settings(&self, settings: &StoreSettings) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(settings)
            .map_err(|e| RepositoryError::DataCorruption(format!("unserializable settings: {e}")))?;
        self.set(STORE_SETTINGS_KEY, &value).await
    }
}
