//! Store settings commands.
//!
//! # Usage
//!
//! ```bash
//! ws-cli settings show
//! ws-cli settings reset
//! ```
//!
//! A running server caches settings briefly, so a reset shows up there
//! once its cache entry expires.

use wellspring_core::StoreSettings;
use wellspring_storefront::db::SettingsRepository;

use super::{CommandError, connect};

/// Print the stored settings, with defaults filled in, as JSON.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the stored document
/// is malformed.
pub async fn show() -> Result<(), CommandError> {
    let pool = connect().await?;
    let settings = SettingsRepository::new(&pool).store_settings().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    }
    Ok(())
}

/// Replace the stored settings with the defaults.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn reset() -> Result<(), CommandError> {
    let pool = connect().await?;
    SettingsRepository::new(&pool)
        .save_store_settings(&StoreSettings::default())
        .await?;

    tracing::info!("Store settings reset to defaults");
    Ok(())
}
