//! Promo code checks for shoppers, and code management for admins.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wellspring_core::promo::{PromoError, PromoRules, normalize_code};
use wellspring_core::{DiscountType, PromoCodeId};

use crate::db::PromoCodeRepository;
use crate::db::promo_codes::PromoCode;
use crate::error::{AppError, FieldError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// `POST /api/promo-codes/validate`
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub subtotal: Decimal,
}

/// Discount a code would give right now.
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub code: String,
    pub discount: Decimal,
}

/// A new promo code.
#[derive(Debug, Deserialize)]
pub struct CreatePromoRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Changes to a promo code. Absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePromoRequest {
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl UpdatePromoRequest {
    fn apply(self, mut rules: PromoRules) -> PromoRules {
        if let Some(v) = self.discount_type {
            rules.discount_type = v;
        }
        if let Some(v) = self.discount_value {
            rules.discount_value = v;
        }
        if self.max_discount.is_some() {
            rules.max_discount = self.max_discount;
        }
        if self.min_order_amount.is_some() {
            rules.min_order_amount = self.min_order_amount;
        }
        if self.usage_limit.is_some() {
            rules.usage_limit = self.usage_limit;
        }
        if self.starts_at.is_some() {
            rules.starts_at = self.starts_at;
        }
        if self.expires_at.is_some() {
            rules.expires_at = self.expires_at;
        }
        if let Some(v) = self.is_active {
            rules.is_active = v;
        }
        rules
    }
}

/// Checks beyond the discount definition itself.
fn check_rules(rules: &PromoRules) -> Result<()> {
    rules.validate_definition()?;
    if let (Some(start), Some(end)) = (rules.starts_at, rules.expires_at)
        && end <= start
    {
        return Err(AppError::Validation(vec![FieldError::new(
            "expires_at",
            "must be after starts_at",
        )]));
    }
    if rules.usage_limit.is_some_and(|limit| limit < 1) {
        return Err(AppError::Validation(vec![FieldError::new(
            "usage_limit",
            "must be at least 1",
        )]));
    }
    if rules.min_order_amount.is_some_and(|min| min < Decimal::ZERO) {
        return Err(AppError::Validation(vec![FieldError::new(
            "min_order_amount",
            "cannot be negative",
        )]));
    }
    Ok(())
}

/// Check a code against a subtotal without using it.
///
/// # Errors
///
/// Returns 400 naming the rule the code breaks.
pub async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>> {
    let code = normalize_code(&body.code)?;
    let promo = PromoCodeRepository::new(state.pool())
        .get_by_code(&code)
        .await?
        .ok_or(PromoError::InvalidCode)?;

    let discount = promo.rules().evaluate(body.subtotal, Utc::now())?;
    Ok(Json(ValidateResponse { code, discount }))
}

/// `GET /api/admin/promo-codes`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<PromoCode>>> {
    Ok(Json(PromoCodeRepository::new(state.pool()).list().await?))
}

/// `POST /api/admin/promo-codes`
///
/// # Errors
///
/// Returns 400 for an invalid definition and 409 if the code exists.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<CreatePromoRequest>,
) -> Result<(StatusCode, Json<PromoCode>)> {
    let code = normalize_code(&body.code)?;
    let rules = PromoRules {
        discount_type: body.discount_type,
        discount_value: body.discount_value,
        max_discount: body.max_discount,
        min_order_amount: body.min_order_amount,
        usage_limit: body.usage_limit,
        used_count: 0,
        starts_at: body.starts_at,
        expires_at: body.expires_at,
        is_active: body.is_active,
    };
    check_rules(&rules)?;

    let promo = PromoCodeRepository::new(state.pool())
        .create(&code, &rules)
        .await?;
    tracing::info!(promo_code_id = %promo.id, code = %promo.code, admin_id = %admin.id, "Promo code created");
    Ok((StatusCode::CREATED, Json(promo)))
}

/// `PATCH /api/admin/promo-codes/{id}`
///
/// # Errors
///
/// Returns 404 for unknown codes and 400 for an invalid definition.
pub async fn update(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<PromoCodeId>,
    Json(body): Json<UpdatePromoRequest>,
) -> Result<Json<PromoCode>> {
    let repo = PromoCodeRepository::new(state.pool());
    let current = repo.get(id).await?;
    let rules = body.apply(current.rules());
    check_rules(&rules)?;

    Ok(Json(repo.update(id, &rules).await?))
}

/// `DELETE /api/admin/promo-codes/{id}`
///
/// # Errors
///
/// Returns 404 for unknown codes.
pub async fn delete(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<PromoCodeId>,
) -> Result<StatusCode> {
    PromoCodeRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rules() -> PromoRules {
        PromoRules {
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::TEN,
            max_discount: None,
            min_order_amount: None,
            usage_limit: None,
            used_count: 3,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let patch = UpdatePromoRequest {
            discount_value: Some(Decimal::from(15)),
            is_active: Some(false),
            ..UpdatePromoRequest::default()
        };
        let updated = patch.apply(rules());
        assert_eq!(updated.discount_value, Decimal::from(15));
        assert!(!updated.is_active);
        assert_eq!(updated.discount_type, DiscountType::Percentage);
        assert_eq!(updated.used_count, 3);
    }

    #[test]
    fn test_check_rules_rejects_inverted_window() {
        let now = Utc::now();
        let mut r = rules();
        r.starts_at = Some(now);
        r.expires_at = Some(now - chrono::Duration::days(1));
        assert!(matches!(check_rules(&r), Err(AppError::Validation(_))));

        let mut r = rules();
        r.usage_limit = Some(0);
        assert!(check_rules(&r).is_err());

        assert!(check_rules(&rules()).is_ok());
    }
}
