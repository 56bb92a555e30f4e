//! Cached store settings.
//!
//! Settings are read on nearly every checkout, so the stored document is kept
//! in a `moka` cache for a minute and dropped whenever an admin saves it.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use wellspring_core::StoreSettings;

use crate::db::{RepositoryError, SettingsRepository};

const CACHE_KEY: &str = "store";

/// Read-through cache over [`SettingsRepository::store_settings`].
#[derive(Clone)]
pub struct SettingsCache {
    cache: Cache<&'static str, Arc<StoreSettings>>,
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl SettingsCache {
    /// Create a cache whose entry expires after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { cache }
    }

    /// Current settings, loading them on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading fails.
    pub async fn get(&self, pool: &PgPool) -> Result<Arc<StoreSettings>, RepositoryError> {
        if let Some(settings) = self.cache.get(CACHE_KEY).await {
            return Ok(settings);
        }

        debug!("Cache miss for store settings");
        let settings = Arc::new(SettingsRepository::new(pool).store_settings().await?);
        self.cache.insert(CACHE_KEY, Arc::clone(&settings)).await;
        Ok(settings)
    }

    /// Persist new settings and replace the cached copy. Callers validate first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if saving fails.
    pub async fn set(&self, pool: &PgPool, settings: StoreSettings) -> Result<Arc<StoreSettings>, RepositoryError> {
        SettingsRepository::new(pool).save_store_settings(&settings).await?;
        let settings = Arc::new(settings);
        self.cache.insert(CACHE_KEY, Arc::clone(&settings)).await;
        Ok(settings)
    }

    /// Drop the cached copy.
    pub async fn invalidate(&self) {
        self.cache.invalidate(CACHE_KEY).await;
    }

    /// Seed the cache without touching the database.
    pub async fn prime(&self, settings: StoreSettings) {
        self.cache.insert(CACHE_KEY, Arc::new(settings)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_primed_settings_served_without_database() {
        let cache = SettingsCache::default();
        let settings = StoreSettings {
            maintenance_mode: true,
            ..StoreSettings::default()
        };
        cache.prime(settings).await;

        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let loaded = cache.get(&pool).await.unwrap();
        assert!(loaded.maintenance_mode);
    }

    #[tokio::test]
    async fn test_invalidate_drops_entry() {
        let cache = SettingsCache::default();
        cache.prime(StoreSettings::default()).await;
        cache.invalidate().await;
        assert!(cache.cache.get(CACHE_KEY).await.is_none());
    }
}
