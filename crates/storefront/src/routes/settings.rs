//! Store settings.

use std::sync::Arc;

use axum::{Json, extract::State};

use wellspring_core::StoreSettings;
use wellspring_core::settings::PublicSettings;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// `GET /api/settings`: what anonymous visitors may see.
///
/// # Errors
///
/// Returns 500 if the settings cannot be loaded.
pub async fn public(State(state): State<AppState>) -> Result<Json<PublicSettings>> {
    let settings = state.settings().get(state.pool()).await?;
    Ok(Json(PublicSettings::from(settings.as_ref())))
}

/// `GET /api/admin/settings`
///
/// # Errors
///
/// Returns 500 if the settings cannot be loaded.
pub async fn show(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Arc<StoreSettings>>> {
    Ok(Json(state.settings().get(state.pool()).await?))
}

/// `PUT /api/admin/settings`
///
/// Fields left out of the body take their defaults.
///
/// # Errors
///
/// Returns 400 naming the first out-of-range field.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(settings): Json<StoreSettings>,
) -> Result<Json<Arc<StoreSettings>>> {
    settings.validate()?;
    let saved = state.settings().set(state.pool(), settings).await?;
    tracing::info!(
        admin_id = %admin.id,
        maintenance_mode = saved.maintenance_mode,
        "Store settings updated"
    );
    Ok(Json(saved))
}
