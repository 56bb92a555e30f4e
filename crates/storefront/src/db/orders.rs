//! Orders and order items.
//!
//! Read queries go through [`OrderRepository`]. The write path (checkout and
//! item status changes) is a sequence of row-locked steps that must share
//! one transaction, so those are free functions over a `PgConnection`
//! driven by [`crate::services::orders`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use wellspring_core::commission::Settlement;
use wellspring_core::order::order_number;
use wellspring_core::{
    AddressId, Email, OrderId, OrderItemId, OrderStatus, PageParams, PaymentMethod, PaymentStatus,
    ProductId, PromoCodeId, UserId, VendorId,
};

use super::RepositoryError;

const ORDER_COLUMNS: &str = r"
    o.id, o.order_number, o.user_id, o.address_id, o.shipping_address, o.status,
    o.payment_status, o.payment_method, o.payment_reference, o.subtotal,
    o.jar_deposit_total, o.discount_total, o.delivery_fee, o.total, o.promo_code_id,
    o.returned_jars, o.notes, o.cancel_reason, o.delivered_at, o.created_at, o.updated_at
";

const ITEM_COLUMNS: &str = r"
    i.id, i.order_id, i.product_id, i.vendor_id, i.product_name, i.unit_price, i.quantity,
    i.jar_deposit, i.status, i.commission_rate, i.commission_amount, i.vendor_earning,
    i.created_at, i.updated_at
";

/// An order header.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: Option<String>,
    pub user_id: UserId,
    pub address_id: Option<AddressId>,
    /// Address as it was at checkout.
    pub shipping_address: serde_json::Value,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing)]
    pub payment_reference: Option<String>,
    pub subtotal: Decimal,
    pub jar_deposit_total: Decimal,
    pub discount_total: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub promo_code_id: Option<PromoCodeId>,
    pub returned_jars: i32,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One vendor's line on an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub jar_deposit: Decimal,
    pub status: OrderStatus,
    /// Rate snapshotted at checkout.
    pub commission_rate: Decimal,
    /// Set once the item is delivered.
    pub commission_amount: Option<Decimal>,
    pub vendor_earning: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// Quantity as the unsigned count the core rules work with.
    #[must_use]
    pub fn units(&self) -> u32 {
        u32::try_from(self.quantity).unwrap_or(0)
    }
}

/// An order with its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// An item as a vendor sees it, with enough order context to fulfil it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VendorOrderItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: OrderItem,
    pub order_number: Option<String>,
    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub shipping_address: serde_json::Value,
    pub customer_name: String,
    pub ordered_at: DateTime<Utc>,
}

/// Who to notify about an order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderContact {
    pub email: Email,
    pub name: String,
}

/// Admin order-list filters.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AdminOrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Matches order number or customer email.
    pub q: Option<String>,
}

/// A product row as priced at checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: ProductId,
    pub vendor_id: VendorId,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub is_jar: bool,
    pub jar_deposit: Decimal,
    pub is_active: bool,
    pub vendor_commission_rate: Option<Decimal>,
}

/// Order header values computed at checkout.
pub struct NewOrder {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub shipping_address: serde_json::Value,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub jar_deposit_total: Decimal,
    pub discount_total: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub promo_code_id: Option<PromoCodeId>,
    pub returned_jars: i32,
    pub notes: Option<String>,
}

/// One item line computed at checkout.
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub jar_deposit: Decimal,
    pub commission_rate: Decimal,
}

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        page: PageParams,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM market.orders o
            WHERE o.user_id = $1 AND ($2::order_status IS NULL OR o.status = $2)
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(user_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM market.orders
            WHERE user_id = $1 AND ($2::order_status IS NULL OR status = $2)
            ",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((orders, total))
    }

    /// Get an order with items, optionally requiring it to belong to `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing or owned by someone else.
    pub async fn get_detail(
        &self,
        id: OrderId,
        owner: Option<UserId>,
    ) -> Result<OrderDetail, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM market.orders o
            WHERE o.id = $1 AND ($2::integer IS NULL OR o.user_id = $2)
            "
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let items = fetch_items(&mut *self.pool.acquire().await?, id).await?;
        Ok(OrderDetail { order, items })
    }

    /// List every order for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_admin(
        &self,
        filter: &AdminOrderFilter,
        page: PageParams,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        const WHERE: &str = r"
            WHERE ($1::order_status IS NULL OR o.status = $1)
              AND ($2::payment_status IS NULL OR o.payment_status = $2)
              AND ($3::text IS NULL OR o.order_number ILIKE '%' || $3 || '%' OR u.email ILIKE '%' || $3 || '%')
        ";
        let q = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM market.orders o
            JOIN market.users u ON u.id = o.user_id
            {WHERE}
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(q)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            r"
            SELECT COUNT(*) FROM market.orders o
            JOIN market.users u ON u.id = o.user_id
            {WHERE}
            "
        ))
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(q)
        .fetch_one(self.pool)
        .await?;

        Ok((orders, total))
    }

    /// List a vendor's order items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_vendor_items(
        &self,
        vendor_id: VendorId,
        status: Option<OrderStatus>,
        page: PageParams,
    ) -> Result<(Vec<VendorOrderItem>, i64), RepositoryError> {
        let items = sqlx::query_as::<_, VendorOrderItem>(&format!(
            r"
            SELECT {ITEM_COLUMNS},
                   o.order_number, o.status AS order_status, o.payment_method, o.payment_status,
                   o.shipping_address, u.name AS customer_name, o.created_at AS ordered_at
            FROM market.order_items i
            JOIN market.orders o ON o.id = i.order_id
            JOIN market.users u ON u.id = o.user_id
            WHERE i.vendor_id = $1 AND ($2::order_status IS NULL OR i.status = $2)
            ORDER BY o.created_at DESC, i.id
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(vendor_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM market.order_items
            WHERE vendor_id = $1 AND ($2::order_status IS NULL OR status = $2)
            ",
        )
        .bind(vendor_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((items, total))
    }

    /// Find the order an item belongs to, checking the vendor owns the item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing or another vendor's.
    pub async fn vendor_item_order(
        &self,
        vendor_id: VendorId,
        item_id: OrderItemId,
    ) -> Result<OrderId, RepositoryError> {
        sqlx::query_scalar::<_, OrderId>(
            "SELECT order_id FROM market.order_items WHERE id = $1 AND vendor_id = $2",
        )
        .bind(item_id)
        .bind(vendor_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Find an order by its gateway reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, OrderId>(
            "SELECT id FROM market.orders WHERE payment_reference = $1",
        )
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Card orders still unpaid and pending since before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stale_card_orders(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<OrderId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, OrderId>(
            r"
            SELECT id FROM market.orders
            WHERE payment_method = 'card'
              AND payment_status IN ('pending', 'failed')
              AND status = 'pending'
              AND created_at < $1
            ORDER BY id
            ",
        )
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        Ok(ids)
    }

    /// The customer's email and name for notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn contact(&self, id: OrderId) -> Result<OrderContact, RepositoryError> {
        sqlx::query_as::<_, OrderContact>(
            r"
            SELECT u.email, u.name FROM market.orders o
            JOIN market.users u ON u.id = o.user_id
            WHERE o.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Store the gateway reference returned when a checkout session is opened.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the reference is already in use.
    pub async fn set_payment_reference(
        &self,
        id: OrderId,
        reference: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE market.orders SET payment_reference = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(reference)
        .execute(self.pool)
        .await
        .map_err(RepositoryError::unique("payment reference already in use"))?;
        Ok(())
    }

    /// Whether `user_id` has a delivered item for `product_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_delivered_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let delivered = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM market.order_items i
                JOIN market.orders o ON o.id = i.order_id
                WHERE o.user_id = $1 AND i.product_id = $2 AND i.status = 'delivered'
            )
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(delivered)
    }
}

// =============================================================================
// Transactional steps
// =============================================================================

const PRICING_SELECT: &str = r"
    SELECT p.id, b.vendor_id, p.name, p.price, p.stock, p.is_jar, p.jar_deposit,
           (p.is_active AND b.is_active AND v.is_approved) AS is_active,
           v.commission_rate AS vendor_commission_rate
    FROM market.products p
    JOIN market.brands b ON b.id = p.brand_id
    JOIN market.vendors v ON v.id = b.vendor_id
    WHERE p.id = ANY($1)
    ORDER BY p.id
";

/// Load products for pricing without locking them.
pub(crate) async fn load_products(
    conn: &mut PgConnection,
    ids: &[i32],
) -> Result<Vec<LockedProduct>, RepositoryError> {
    let products = sqlx::query_as::<_, LockedProduct>(PRICING_SELECT)
        .bind(ids)
        .fetch_all(conn)
        .await?;

    Ok(products)
}

/// Lock product rows for checkout, in ID order to avoid deadlocks.
pub(crate) async fn lock_products(
    conn: &mut PgConnection,
    ids: &[i32],
) -> Result<Vec<LockedProduct>, RepositoryError> {
    let products = sqlx::query_as::<_, LockedProduct>(&format!("{PRICING_SELECT} FOR UPDATE OF p"))
        .bind(ids)
        .fetch_all(conn)
        .await?;

    Ok(products)
}

/// Take stock, refusing to go below zero. Returns whether it succeeded.
pub(crate) async fn take_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE market.products SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        ",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Put stock back after a cancellation.
pub(crate) async fn restock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE market.products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(())
}

/// Insert an order header and assign its order number.
pub(crate) async fn insert_order(
    conn: &mut PgConnection,
    new: NewOrder,
) -> Result<Order, RepositoryError> {
    let (id, created_at) = sqlx::query_as::<_, (OrderId, DateTime<Utc>)>(
        r"
        INSERT INTO market.orders
            (user_id, address_id, shipping_address, payment_method, subtotal, jar_deposit_total,
             discount_total, delivery_fee, total, promo_code_id, returned_jars, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id, created_at
        ",
    )
    .bind(new.user_id)
    .bind(new.address_id)
    .bind(new.shipping_address)
    .bind(new.payment_method)
    .bind(new.subtotal)
    .bind(new.jar_deposit_total)
    .bind(new.discount_total)
    .bind(new.delivery_fee)
    .bind(new.total)
    .bind(new.promo_code_id)
    .bind(new.returned_jars)
    .bind(new.notes)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query_as::<_, Order>(&format!(
        r"
        UPDATE market.orders o SET order_number = $2
        WHERE o.id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(order_number(id, created_at))
    .fetch_one(conn)
    .await
    .map_err(RepositoryError::from)
}

/// Insert an order item.
pub(crate) async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: NewOrderItem,
) -> Result<OrderItem, RepositoryError> {
    let item = sqlx::query_as::<_, OrderItem>(&format!(
        r"
        INSERT INTO market.order_items AS i
            (order_id, product_id, vendor_id, product_name, unit_price, quantity, jar_deposit, commission_rate)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ITEM_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.vendor_id)
    .bind(item.product_name)
    .bind(item.unit_price)
    .bind(item.quantity)
    .bind(item.jar_deposit)
    .bind(item.commission_rate)
    .fetch_one(conn)
    .await?;

    Ok(item)
}

/// Lock an order header.
pub(crate) async fn lock_order(conn: &mut PgConnection, id: OrderId) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM market.orders o WHERE o.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Items of an order, in ID order.
pub(crate) async fn fetch_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM market.order_items i WHERE i.order_id = $1 ORDER BY i.id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

/// Record an item's new status and, on delivery, its settlement.
pub(crate) async fn update_item_status(
    conn: &mut PgConnection,
    item_id: OrderItemId,
    status: OrderStatus,
    settlement: Option<Settlement>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE market.order_items
        SET status = $2,
            commission_amount = COALESCE($3, commission_amount),
            vendor_earning = COALESCE($4, vendor_earning),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(item_id)
    .bind(status)
    .bind(settlement.map(|s| s.commission_amount))
    .bind(settlement.map(|s| s.vendor_earning))
    .execute(conn)
    .await?;
    Ok(())
}

/// Write the recomputed order status and payment state.
pub(crate) async fn update_order_state(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    cancel_reason: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE market.orders
        SET status = $2,
            payment_status = $3,
            cancel_reason = COALESCE($4, cancel_reason),
            delivered_at = CASE WHEN $2 = 'delivered'::order_status
                                THEN COALESCE(delivered_at, NOW()) ELSE delivered_at END,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(status)
    .bind(payment_status)
    .bind(cancel_reason)
    .execute(conn)
    .await?;
    Ok(())
}

/// Set only the payment status of an order.
pub(crate) async fn set_payment_status(
    conn: &mut PgConnection,
    id: OrderId,
    payment_status: PaymentStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE market.orders SET payment_status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(payment_status)
        .execute(conn)
        .await?;
    Ok(())
}
