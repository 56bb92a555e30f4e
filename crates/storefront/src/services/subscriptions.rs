//! Recurring delivery subscriptions.

use chrono::{NaiveDate, Utc};
use sqlx::Connection;
use tracing::{info, instrument, warn};

use wellspring_core::subscription::{
    SubscriptionAction, apply_action, first_delivery, roll_forward, validate_quantity,
};
use wellspring_core::{
    AddressId, OrderId, PaymentMethod, ProductId, SubscriptionFrequency, SubscriptionId,
    SubscriptionStatus, UserId,
};

use crate::db::subscriptions::{self, NewSubscription, Subscription};
use crate::db::{AddressRepository, CatalogRepository, RepositoryError, SubscriptionRepository, addresses};
use crate::error::{AppError, Result};
use crate::services::orders::{CartItem, PlaceOrder, place_order};
use crate::state::AppState;

/// A new subscription request.
#[derive(Debug, Clone)]
pub struct SubscriptionInput {
    pub product_id: ProductId,
    pub address_id: AddressId,
    pub quantity: u32,
    pub frequency: SubscriptionFrequency,
    pub start_date: Option<NaiveDate>,
}

/// Changes to an existing subscription.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionChange {
    pub action: Option<SubscriptionAction>,
    pub quantity: Option<u32>,
    pub frequency: Option<SubscriptionFrequency>,
}

/// What happened to one due subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueOutcome {
    /// An order was placed.
    Ordered(OrderId),
    /// The delivery could not be placed and was skipped.
    Skipped,
    /// Another worker took it, or it is no longer due.
    NotDue,
}

/// Subscription service.
pub struct SubscriptionService<'a> {
    state: &'a AppState,
}

impl<'a> SubscriptionService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Start a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown product or address, a bad quantity, or
    /// a start date that is not in the future.
    pub async fn create(&self, user_id: UserId, input: SubscriptionInput) -> Result<Subscription> {
        let pool = self.state.pool();
        let settings = self.state.settings().get(pool).await?;

        let quantity = validate_quantity(input.quantity, settings.max_quantity_per_item)?;
        let next_delivery_date = first_delivery(input.start_date, Utc::now().date_naive())?;

        let product = CatalogRepository::new(pool)
            .get_products(&[input.product_id.as_i32()])
            .await?
            .into_iter()
            .find(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("product".to_owned()))?;

        AddressRepository::new(pool)
            .get(user_id, input.address_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AppError::NotFound("address".to_owned()),
                other => other.into(),
            })?;

        let subscription = SubscriptionRepository::new(pool)
            .create(
                user_id,
                NewSubscription {
                    product_id: product.id,
                    address_id: input.address_id,
                    quantity: i32::try_from(quantity).unwrap_or(i32::MAX),
                    frequency: input.frequency,
                    next_delivery_date,
                },
            )
            .await?;

        info!(subscription_id = %subscription.id, "Subscription created");
        Ok(subscription)
    }

    /// Pause, resume or cancel a subscription, and change its quantity or frequency.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing changes, the subscription is cancelled, or
    /// the action is not allowed from its status.
    pub async fn update(
        &self,
        user_id: UserId,
        id: SubscriptionId,
        change: SubscriptionChange,
    ) -> Result<Subscription> {
        if change.action.is_none() && change.quantity.is_none() && change.frequency.is_none() {
            return Err(AppError::BadRequest("nothing to change".to_owned()));
        }

        let pool = self.state.pool();
        let repo = SubscriptionRepository::new(pool);
        let current = repo.get(user_id, id).await.map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("subscription".to_owned()),
            other => other.into(),
        })?;

        if current.status == SubscriptionStatus::Cancelled && change.action.is_none() {
            return Err(AppError::Conflict("subscription is cancelled".to_owned()));
        }

        let frequency = change.frequency.unwrap_or(current.frequency);
        let quantity = match change.quantity {
            Some(quantity) => {
                let settings = self.state.settings().get(pool).await?;
                let quantity = validate_quantity(quantity, settings.max_quantity_per_item)?;
                i32::try_from(quantity).unwrap_or(i32::MAX)
            }
            None => current.quantity,
        };

        let (status, next_delivery_date) = match change.action {
            Some(action) => {
                let transition = apply_action(
                    current.status,
                    action,
                    frequency,
                    current.anchor_day(),
                    current.next_delivery_date,
                    Utc::now().date_naive(),
                )?;
                (transition.status, transition.next_delivery_date)
            }
            None => (current.status, current.next_delivery_date),
        };

        Ok(repo
            .update(user_id, id, status, next_delivery_date, quantity, frequency)
            .await?)
    }

    /// Turn one due subscription into a cash-on-delivery order and move it
    /// to its next date. A delivery that cannot be placed is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database fails.
    #[instrument(skip(self), fields(subscription_id = %id))]
    pub async fn process_due(&self, id: SubscriptionId, today: NaiveDate) -> Result<DueOutcome> {
        let pool = self.state.pool();
        let settings = self.state.settings().get(pool).await?;

        let mut tx = pool.begin().await?;
        let Some(subscription) = subscriptions::lock_due(&mut tx, id, today).await? else {
            return Ok(DueOutcome::NotDue);
        };
        let next = roll_forward(
            subscription.next_delivery_date,
            subscription.frequency,
            subscription.anchor_day(),
            today,
        )?;

        let mut savepoint = (*tx).begin().await?;
        let placed = match addresses::fetch_owned(&mut savepoint, subscription.user_id, subscription.address_id).await {
            Ok(address) => {
                let items = [CartItem {
                    product_id: subscription.product_id,
                    quantity: u32::try_from(subscription.quantity).unwrap_or(0),
                }];
                place_order(
                    &mut savepoint,
                    &settings,
                    PlaceOrder {
                        user_id: subscription.user_id,
                        address: &address,
                        items: &items,
                        payment_method: PaymentMethod::CashOnDelivery,
                        promo_code: None,
                        returned_jars: 0,
                        notes: Some(format!("Subscription #{}", subscription.id)),
                    },
                )
                .await
            }
            Err(e) => Err(e.into()),
        };

        let outcome = match placed {
            Ok((order, _)) => {
                savepoint.commit().await?;
                info!(order_id = %order.id, "Subscription order placed");
                DueOutcome::Ordered(order.id)
            }
            Err(AppError::Database(RepositoryError::Database(e))) => return Err(e.into()),
            Err(e) => {
                savepoint.rollback().await?;
                warn!(error = %e, "Skipping subscription delivery");
                DueOutcome::Skipped
            }
        };

        subscriptions::set_next_delivery(&mut tx, subscription.id, next).await?;
        tx.commit().await?;
        Ok(outcome)
    }
}
