//! Checkout and the order lifecycle.
//!
//! Every write runs in one transaction that locks the rows it depends on:
//! product rows at checkout, the order header for status changes. Gateway
//! calls and emails happen only after commit.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::{info, instrument, warn};

use wellspring_core::commission::{effective_rate, settle};
use wellspring_core::order::{ItemState, aggregate_status, apply_item_transition, ensure_cancellable_by_customer};
use wellspring_core::pricing::{self, PricedLine, PricingError, Quote};
use wellspring_core::promo::{PromoError, normalize_code};
use wellspring_core::text::sanitize_optional;
use wellspring_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    PromoCodeId, StoreSettings, UserId, VendorId,
};

use crate::db::addresses::{self, Address};
use crate::db::orders::{self, LockedProduct, NewOrder, NewOrderItem, Order, OrderDetail, OrderItem};
use crate::db::{OrderRepository, PromoCodeRepository, RepositoryError, promo_codes};
use crate::error::{AppError, FieldError, Result};
use crate::models::CurrentUser;
use crate::services::email::{EmailJob, EmailLine};
use crate::services::payments::{WebhookEvent, WebhookEventKind};
use crate::state::AppState;

/// One requested cart line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Everything needed to place an order.
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub items: Vec<CartItem>,
    pub address_id: AddressId,
    pub payment_method: PaymentMethod,
    pub promo_code: Option<String>,
    pub returned_jars: u32,
    pub notes: Option<String>,
}

/// A placed order, plus the hosted checkout URL for card payments.
#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    #[serde(flatten)]
    pub order: OrderDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// Which items a status change applies to, and on whose behalf.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// One vendor item.
    Item(OrderItemId),
    /// Every movable item, by an admin.
    Order,
    /// Every movable item, by the customer who placed it.
    Customer(UserId),
    /// Every movable item of a card order whose payment never arrived.
    Unpaid,
}

/// Result of the transactional part of a status change.
struct StatusChange {
    previous: OrderStatus,
    current: OrderStatus,
    refund: Option<(String, Decimal)>,
}

/// Order service.
pub struct OrderService<'a> {
    state: &'a AppState,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Price a cart without reserving anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a product is unknown or unavailable, a quantity is
    /// out of range, or the promo code does not apply.
    pub async fn quote(
        &self,
        items: &[CartItem],
        returned_jars: u32,
        promo_code: Option<&str>,
    ) -> Result<Quote> {
        let pool = self.state.pool();
        let settings = self.state.settings().get(pool).await?;

        let products = orders::load_products(&mut *pool.acquire().await?, &product_ids(items)).await?;
        let lines = priced_lines(items, &products)?;
        let base = pricing::quote(lines.clone(), returned_jars, Decimal::ZERO, &settings)?;

        let discount = match non_empty(promo_code) {
            Some(raw) => {
                let code = normalize_code(raw)?;
                let promo = PromoCodeRepository::new(pool)
                    .get_by_code(&code)
                    .await?
                    .ok_or(PromoError::InvalidCode)?;
                promo.rules().evaluate(base.subtotal, Utc::now())?
            }
            None => return Ok(base),
        };

        Ok(pricing::quote(lines, returned_jars, discount, &settings)?)
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed, the cart cannot be priced,
    /// stock runs out, or the payment gateway rejects the checkout.
    #[instrument(skip(self, user, input), fields(user_id = %user.id))]
    pub async fn checkout(&self, user: &CurrentUser, input: CheckoutInput) -> Result<CheckoutOutcome> {
        let pool = self.state.pool();
        let settings = self.state.settings().get(pool).await?;
        if settings.maintenance_mode {
            return Err(AppError::Maintenance);
        }
        if input.payment_method == PaymentMethod::Card && self.state.payments().is_none() {
            return Err(AppError::Validation(vec![FieldError::new(
                "payment_method",
                "card payments are not available",
            )]));
        }
        let promo_code = non_empty(input.promo_code.as_deref())
            .map(normalize_code)
            .transpose()?;

        let mut tx = pool.begin().await?;

        let address = addresses::fetch_owned(&mut tx, user.id, input.address_id)
            .await
            .map_err(not_found("address"))?;

        let (order, items) = place_order(
            &mut tx,
            &settings,
            PlaceOrder {
                user_id: user.id,
                address: &address,
                items: &input.items,
                payment_method: input.payment_method,
                promo_code: promo_code.as_deref(),
                returned_jars: input.returned_jars,
                notes: sanitize_optional(input.notes.as_deref()),
            },
        )
        .await?;

        tx.commit().await?;
        info!(order_id = %order.id, total = %order.total, "Order placed");

        let checkout_url = if order.payment_method == PaymentMethod::Card {
            Some(self.open_checkout(&order, user).await?)
        } else {
            None
        };

        self.notify_confirmation(&order, &items, &settings).await;

        let order = OrderRepository::new(pool).get_detail(order.id, None).await?;
        Ok(CheckoutOutcome { order, checkout_url })
    }

    /// Open a gateway checkout for a freshly placed card order.
    async fn open_checkout(&self, order: &Order, user: &CurrentUser) -> Result<String> {
        let pool = self.state.pool();
        let payments = self
            .state
            .payments()
            .ok_or_else(|| AppError::Internal("payment client missing".to_owned()))?;

        let reference = order
            .order_number
            .clone()
            .unwrap_or_else(|| format!("WS-{}", order.id));
        let callback_url = format!(
            "{}/orders/{}",
            self.state.config().base_url.trim_end_matches('/'),
            order.id
        );

        match payments
            .create_checkout(&reference, order.total, user.email.as_str(), &callback_url)
            .await
        {
            Ok(session) => {
                OrderRepository::new(pool)
                    .set_payment_reference(order.id, &session.reference)
                    .await?;
                Ok(session.checkout_url)
            }
            Err(e) => {
                // The order stays pending and is cancelled by cleanup once it expires.
                orders::set_payment_status(&mut *pool.acquire().await?, order.id, PaymentStatus::Failed)
                    .await?;
                Err(e.into())
            }
        }
    }

    /// Move one of a vendor's items to `next`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the item is not the vendor's, or a conflict if
    /// the transition is not allowed.
    pub async fn change_item_status(
        &self,
        vendor_id: VendorId,
        item_id: OrderItemId,
        next: OrderStatus,
    ) -> Result<OrderDetail> {
        let order_id = OrderRepository::new(self.state.pool())
            .vendor_item_order(vendor_id, item_id)
            .await
            .map_err(not_found("order item"))?;
        self.change_status(order_id, Target::Item(item_id), next, None).await
    }

    /// Move every item of an order that can still move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown order, or a conflict if no item can move.
    pub async fn change_order_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
        reason: Option<&str>,
    ) -> Result<OrderDetail> {
        self.change_status(order_id, Target::Order, next, reason).await
    }

    /// Cancel an order on behalf of the customer who placed it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if it is not theirs, or a conflict once processing started.
    pub async fn cancel_by_customer(
        &self,
        user_id: UserId,
        order_id: OrderId,
        reason: Option<&str>,
    ) -> Result<OrderDetail> {
        self.change_status(order_id, Target::Customer(user_id), OrderStatus::Cancelled, reason)
            .await
    }

    /// Cancel a card order whose payment never completed.
    ///
    /// # Errors
    ///
    /// Returns a conflict if it was paid or moved on in the meantime.
    pub async fn cancel_unpaid(&self, order_id: OrderId) -> Result<OrderDetail> {
        self.change_status(
            order_id,
            Target::Unpaid,
            OrderStatus::Cancelled,
            Some("payment not completed"),
        )
        .await
    }

    #[instrument(skip_all, fields(order_id = %order_id, next = %next))]
    async fn change_status(
        &self,
        order_id: OrderId,
        target: Target,
        next: OrderStatus,
        reason: Option<&str>,
    ) -> Result<OrderDetail> {
        let pool = self.state.pool();
        let reason = if next == OrderStatus::Cancelled {
            sanitize_optional(reason)
        } else {
            None
        };

        let mut tx = pool.begin().await?;
        let change = apply_status_change(&mut tx, order_id, target, next, reason.as_deref()).await?;
        tx.commit().await?;

        if let Some((reference, amount)) = &change.refund {
            self.refund(order_id, reference, *amount).await;
        }

        if change.current != change.previous {
            info!(from = %change.previous, to = %change.current, "Order status changed");
            self.notify_status(order_id, change.current, reason).await;
        }

        Ok(OrderRepository::new(pool).get_detail(order_id, None).await?)
    }

    /// Refund through the gateway and record it. Failures are logged for follow-up.
    async fn refund(&self, order_id: OrderId, reference: &str, amount: Decimal) {
        let Some(payments) = self.state.payments() else {
            warn!(order_id = %order_id, "Refund needed but payments are not configured");
            return;
        };

        match payments.refund(reference, amount).await {
            Ok(()) => {
                let recorded = match self.state.pool().acquire().await {
                    Ok(mut conn) => {
                        orders::set_payment_status(&mut conn, order_id, PaymentStatus::Refunded).await
                    }
                    Err(e) => Err(e.into()),
                };
                match recorded {
                    Ok(()) => info!(order_id = %order_id, amount = %amount, "Order refunded"),
                    Err(e) => tracing::error!(order_id = %order_id, error = %e, "Refund sent but not recorded"),
                }
            }
            Err(e) => {
                let event_id = sentry::capture_error(&e);
                tracing::error!(
                    order_id = %order_id,
                    error = %e,
                    sentry_event_id = %event_id,
                    "Refund failed"
                );
            }
        }
    }

    /// Apply a verified gateway webhook. Repeated events are no-ops, and a
    /// success whose amount differs from the order total changes nothing.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    #[instrument(skip(self, event), fields(reference = %event.data.reference))]
    pub async fn apply_payment_event(&self, event: &WebhookEvent) -> Result<bool> {
        let pool = self.state.pool();

        let Some(order_id) = OrderRepository::new(pool)
            .find_by_payment_reference(&event.data.reference)
            .await?
        else {
            warn!("Webhook for unknown payment reference");
            return Ok(false);
        };

        let mut tx = pool.begin().await?;
        let order = orders::lock_order(&mut tx, order_id).await?;

        let (changed, late_refund) = match event.event {
            WebhookEventKind::Succeeded => {
                if matches!(order.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded) {
                    (false, false)
                } else if !event.amount_matches(order.total) {
                    let event_id = sentry::capture_message(
                        "Payment amount does not match order total",
                        sentry::Level::Warning,
                    );
                    warn!(
                        order_id = %order.id,
                        expected = %order.total,
                        reported = ?event.data.amount,
                        sentry_event_id = %event_id,
                        "Payment amount does not match order total; order left unpaid"
                    );
                    (false, false)
                } else if order.status == OrderStatus::Cancelled {
                    // Paid after cleanup cancelled it; give the money back.
                    orders::set_payment_status(&mut tx, order.id, PaymentStatus::Paid).await?;
                    (true, true)
                } else {
                    let status = if order.status == OrderStatus::Pending {
                        for item in orders::fetch_items(&mut tx, order.id).await? {
                            if item.status == OrderStatus::Pending {
                                orders::update_item_status(&mut tx, item.id, OrderStatus::Confirmed, None)
                                    .await?;
                            }
                        }
                        OrderStatus::Confirmed
                    } else {
                        order.status
                    };
                    orders::update_order_state(&mut tx, order.id, status, PaymentStatus::Paid, None)
                        .await?;
                    (true, false)
                }
            }
            WebhookEventKind::Failed => {
                if order.payment_status == PaymentStatus::Pending {
                    orders::set_payment_status(&mut tx, order.id, PaymentStatus::Failed).await?;
                    (true, false)
                } else {
                    (false, false)
                }
            }
            WebhookEventKind::Other => (false, false),
        };

        tx.commit().await?;

        if late_refund && let Some(reference) = &order.payment_reference {
            self.refund(order.id, reference, order.total).await;
        }
        if changed && event.event == WebhookEventKind::Succeeded && order.status == OrderStatus::Pending {
            self.notify_status(order.id, OrderStatus::Confirmed, None).await;
        }

        info!(changed, event = ?event.event, "Payment webhook applied");
        Ok(changed)
    }

    async fn notify_confirmation(&self, order: &Order, items: &[OrderItem], settings: &StoreSettings) {
        let contact = match OrderRepository::new(self.state.pool()).contact(order.id).await {
            Ok(contact) => contact,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Could not load order contact");
                return;
            }
        };

        let currency = self
            .state
            .config()
            .payment
            .as_ref()
            .map_or("USD", |p| p.currency.code());

        self.state.send_email(
            EmailJob::OrderConfirmation {
                to: contact.email.into_inner(),
                name: contact.name,
                order_number: order.order_number.clone().unwrap_or_default(),
                lines: items
                    .iter()
                    .map(|item| EmailLine {
                        name: item.product_name.clone(),
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                    })
                    .collect(),
                total: order.total,
                currency: currency.to_owned(),
                payment_method: order.payment_method.to_string(),
            },
            &settings.store_name,
        );
    }

    async fn notify_status(&self, order_id: OrderId, status: OrderStatus, reason: Option<String>) {
        let pool = self.state.pool();
        let repo = OrderRepository::new(pool);
        let (contact, detail, settings) = match (
            repo.contact(order_id).await,
            repo.get_detail(order_id, None).await,
            self.state.settings().get(pool).await,
        ) {
            (Ok(contact), Ok(detail), Ok(settings)) => (contact, detail, settings),
            _ => {
                warn!(order_id = %order_id, "Could not load order for status email");
                return;
            }
        };

        self.state.send_email(
            EmailJob::OrderStatus {
                to: contact.email.into_inner(),
                name: contact.name,
                order_number: detail.order.order_number.unwrap_or_default(),
                status: status.to_string(),
                reason,
            },
            &settings.store_name,
        );
    }
}

// =============================================================================
// Transactional steps
// =============================================================================

/// Inputs for [`place_order`].
pub(crate) struct PlaceOrder<'a> {
    pub user_id: UserId,
    pub address: &'a Address,
    pub items: &'a [CartItem],
    pub payment_method: PaymentMethod,
    pub promo_code: Option<&'a str>,
    pub returned_jars: u32,
    pub notes: Option<String>,
}

/// Price, reserve stock and write an order inside the caller's transaction.
pub(crate) async fn place_order(
    conn: &mut PgConnection,
    settings: &StoreSettings,
    input: PlaceOrder<'_>,
) -> Result<(Order, Vec<OrderItem>)> {
    let products = orders::lock_products(conn, &product_ids(input.items)).await?;
    let lines = priced_lines(input.items, &products)?;
    let base = pricing::quote(lines.clone(), input.returned_jars, Decimal::ZERO, settings)?;

    let promo: Option<(PromoCodeId, Decimal)> = match input.promo_code {
        Some(code) => {
            let promo = promo_codes::lock_by_code(conn, code)
                .await?
                .ok_or(PromoError::InvalidCode)?;
            let discount = promo.rules().evaluate(base.subtotal, Utc::now())?;
            Some((promo.id, discount))
        }
        None => None,
    };
    let quote = match promo {
        Some((_, discount)) => pricing::quote(lines, input.returned_jars, discount, settings)?,
        None => base,
    };

    for line in &quote.lines {
        if !orders::take_stock(conn, line.product_id, quantity_i32(line.quantity)?).await? {
            return Err(PricingError::InsufficientStock {
                product: line.name.clone(),
                available: line.stock.max(0),
            }
            .into());
        }
    }
    if let Some((promo_id, _)) = promo {
        promo_codes::record_use(conn, promo_id).await?;
    }

    let order = orders::insert_order(
        conn,
        NewOrder {
            user_id: input.user_id,
            address_id: input.address.id,
            shipping_address: address_snapshot(input.address),
            payment_method: input.payment_method,
            subtotal: quote.subtotal,
            jar_deposit_total: quote.jar_deposit_total,
            discount_total: quote.discount_total,
            delivery_fee: quote.delivery_fee,
            total: quote.total,
            promo_code_id: promo.map(|(id, _)| id),
            returned_jars: quantity_i32(quote.returned_jars_applied)?,
            notes: input.notes,
        },
    )
    .await?;

    let overrides: HashMap<ProductId, Option<Decimal>> = products
        .iter()
        .map(|p| (p.id, p.vendor_commission_rate))
        .collect();

    let mut items = Vec::with_capacity(quote.lines.len());
    for line in quote.lines {
        let rate = effective_rate(
            overrides.get(&line.product_id).copied().flatten(),
            settings.default_commission_rate,
        );
        let item = orders::insert_item(
            conn,
            order.id,
            NewOrderItem {
                product_id: line.product_id,
                vendor_id: line.vendor_id,
                product_name: line.name,
                unit_price: line.unit_price,
                quantity: quantity_i32(line.quantity)?,
                jar_deposit: line.jar_deposit,
                commission_rate: rate,
            },
        )
        .await?;
        items.push(item);
    }

    Ok((order, items))
}

/// Validate and apply a status change to the selected items, then
/// recompute the order.
async fn apply_status_change(
    conn: &mut PgConnection,
    order_id: OrderId,
    target: Target,
    next: OrderStatus,
    reason: Option<&str>,
) -> Result<StatusChange> {
    let order = orders::lock_order(conn, order_id).await.map_err(not_found("order"))?;

    match target {
        Target::Customer(user_id) => {
            if order.user_id != user_id {
                return Err(AppError::NotFound("order".to_owned()));
            }
            ensure_cancellable_by_customer(order.status)?;
        }
        Target::Unpaid => {
            if order.payment_status == PaymentStatus::Paid || order.status != OrderStatus::Pending {
                return Err(AppError::Conflict("order is no longer awaiting payment".to_owned()));
            }
        }
        Target::Item(_) | Target::Order => {}
    }

    let items = orders::fetch_items(conn, order_id).await?;
    let selected: Vec<&OrderItem> = match target {
        Target::Item(item_id) => {
            let item = items
                .iter()
                .find(|item| item.id == item_id)
                .ok_or_else(|| AppError::NotFound("order item".to_owned()))?;
            vec![item]
        }
        Target::Order | Target::Customer(_) | Target::Unpaid => items
            .iter()
            .filter(|item| item.status.can_transition_to(next))
            .collect(),
    };
    if selected.is_empty() {
        return Err(wellspring_core::order::OrderError::InvalidTransition {
            from: order.status,
            to: next,
        }
        .into());
    }

    let mut statuses: HashMap<OrderItemId, OrderStatus> =
        items.iter().map(|item| (item.id, item.status)).collect();

    for item in selected {
        let effect = apply_item_transition(
            ItemState {
                status: item.status,
                quantity: item.units(),
            },
            next,
        )?;

        if effect.restock.is_some() {
            orders::restock(conn, item.product_id, item.quantity).await?;
        }
        let settlement = effect
            .settle
            .then(|| settle(item.unit_price, item.units(), item.commission_rate));

        orders::update_item_status(conn, item.id, next, settlement).await?;
        statuses.insert(item.id, next);
    }

    let current = aggregate_status(&statuses.into_values().collect::<Vec<_>>())?;

    let mut payment_status = order.payment_status;
    let mut refund = None;
    if current == OrderStatus::Delivered && order.payment_method == PaymentMethod::CashOnDelivery {
        payment_status = PaymentStatus::Paid;
    }
    if current == OrderStatus::Cancelled && order.status != OrderStatus::Cancelled {
        if let Some(promo_id) = order.promo_code_id {
            promo_codes::release_use(conn, promo_id).await?;
        }
        if order.payment_method == PaymentMethod::Card && order.payment_status == PaymentStatus::Paid {
            refund = order.payment_reference.clone().map(|reference| (reference, order.total));
        }
    }

    let cancel_reason = if current == OrderStatus::Cancelled { reason } else { None };
    orders::update_order_state(conn, order_id, current, payment_status, cancel_reason).await?;

    Ok(StatusChange {
        previous: order.status,
        current,
        refund,
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn product_ids(items: &[CartItem]) -> Vec<i32> {
    items
        .iter()
        .map(|item| item.product_id.as_i32())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Pair cart lines with loaded products. Unknown products are unavailable.
fn priced_lines(items: &[CartItem], products: &[LockedProduct]) -> Result<Vec<PricedLine>> {
    let by_id: HashMap<ProductId, &LockedProduct> = products.iter().map(|p| (p.id, p)).collect();

    items
        .iter()
        .map(|item| {
            let product = by_id
                .get(&item.product_id)
                .ok_or_else(|| PricingError::Unavailable(format!("product {}", item.product_id)))?;
            Ok(PricedLine {
                product_id: product.id,
                vendor_id: product.vendor_id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity: item.quantity,
                is_jar: product.is_jar,
                jar_deposit: product.jar_deposit,
                stock: product.stock,
                is_active: product.is_active,
            })
        })
        .collect()
}

/// The address as it should appear on the order forever.
fn address_snapshot(address: &Address) -> serde_json::Value {
    serde_json::json!({
        "label": address.label,
        "recipient_name": address.recipient_name,
        "phone": address.phone,
        "line1": address.line1,
        "line2": address.line2,
        "city": address.city,
        "region": address.region,
        "postal_code": address.postal_code,
    })
}

fn quantity_i32(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| AppError::BadRequest("quantity is too large".to_owned()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Turn a repository `NotFound` into a named one.
fn not_found(what: &'static str) -> impl FnOnce(RepositoryError) -> AppError {
    move |e| match e {
        RepositoryError::NotFound => AppError::NotFound(what.to_owned()),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64, stock: i32) -> LockedProduct {
        LockedProduct {
            id: ProductId::new(id),
            vendor_id: VendorId::new(7),
            name: format!("Product {id}"),
            price: Decimal::new(price, 2),
            stock,
            is_jar: false,
            jar_deposit: Decimal::ZERO,
            is_active: true,
            vendor_commission_rate: None,
        }
    }

    fn item(id: i32, quantity: u32) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_product_ids_are_sorted_and_unique() {
        let ids = product_ids(&[item(5, 1), item(2, 1), item(5, 3)]);
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn test_priced_lines_copy_product_data() {
        let products = vec![product(1, 250, 10), product(2, 1000, 3)];
        let lines = priced_lines(&[item(2, 2), item(1, 4)], &products).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id, ProductId::new(2));
        assert_eq!(lines[0].unit_price, Decimal::new(1000, 2));
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].vendor_id, VendorId::new(7));
        assert_eq!(lines[1].stock, 10);
    }

    #[test]
    fn test_priced_lines_unknown_product_is_unavailable() {
        let err = priced_lines(&[item(9, 1)], &[product(1, 100, 1)]).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("product 9")));
    }

    #[test]
    fn test_address_snapshot_omits_ownership_fields() {
        let address = Address {
            id: AddressId::new(3),
            user_id: UserId::new(1),
            label: Some("Home".to_owned()),
            recipient_name: "Ada".to_owned(),
            phone: "+15550100".to_owned(),
            line1: "1 Spring Rd".to_owned(),
            line2: None,
            city: "Springfield".to_owned(),
            region: None,
            postal_code: Some("12345".to_owned()),
            is_default: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let snapshot = address_snapshot(&address);
        assert_eq!(snapshot["city"], "Springfield");
        assert_eq!(snapshot["label"], "Home");
        assert!(snapshot.get("user_id").is_none());
        assert!(snapshot.get("is_default").is_none());
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty(Some("  SAVE10 ")), Some("SAVE10"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_not_found_names_the_resource() {
        let err = not_found("address")(RepositoryError::NotFound);
        assert_eq!(err.to_string(), "address not found");

        let err = not_found("address")(RepositoryError::Conflict("x".to_owned()));
        assert!(matches!(err, AppError::Database(RepositoryError::Conflict(_))));
    }
}
