//! Order storage and the order status lifecycle

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

/// Order lifecycle status
///
/// Transitions form a fixed state machine:
/// pending → processing → completed, and pending/processing → cancelled.
/// Completed and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether a transition to `next` is legal
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
        }
    }
}

/// Order row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub total: Decimal,
    pub payment_method: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub payment_intent_id: String,
    pub status: String,
    pub payment_status: String,
    pub created_at: i64,
}

/// Line item row; `unit_price` is the price snapshot taken at order time
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub order_id: String,
    pub product_id: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

pub async fn insert(conn: &mut PgConnection, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders
             (id, user_id, total, payment_method,
              shipping_address, shipping_city, shipping_postal_code, shipping_country,
              payment_intent_id, status, payment_status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(order.total)
    .bind(&order.payment_method)
    .bind(&order.shipping_address)
    .bind(&order.shipping_city)
    .bind(&order.shipping_postal_code)
    .bind(&order.shipping_country)
    .bind(&order.payment_intent_id)
    .bind(&order.status)
    .bind(&order.payment_status)
    .bind(order.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_items(
    conn: &mut PgConnection,
    items: &[OrderItem],
) -> Result<(), sqlx::Error> {
    for item in items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, name, quantity, unit_price)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_payment_intent(
    pool: &PgPool,
    payment_intent_id: &str,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE payment_intent_id = $1")
        .bind(payment_intent_id)
        .fetch_optional(pool)
        .await
}

pub async fn items_for(pool: &PgPool, order_id: &str) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1")
        .bind(order_id)
        .fetch_all(pool)
        .await
}

pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

/// Admin listing: optional status filter, offset pagination, total count
pub async fn list_all(
    pool: &PgPool,
    status: Option<&str>,
    page: i64,
    limit: i64,
) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let offset = (page - 1).max(0) * limit;

    let (orders, total) = match status {
        Some(status) => {
            let orders: Vec<Order> = sqlx::query_as(
                "SELECT * FROM orders WHERE status = $1
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
                .bind(status)
                .fetch_one(pool)
                .await?;
            (orders, total)
        }
        None => {
            let orders: Vec<Order> = sqlx::query_as(
                "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
                .fetch_one(pool)
                .await?;
            (orders, total)
        }
    };

    Ok((orders, total))
}

pub async fn update_status(
    pool: &PgPool,
    id: &str,
    status: OrderStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Conditionally mark an order paid. The `payment_status = 'pending'` guard
/// makes repeated confirmation calls transition exactly once, and the status
/// guard keeps a cancelled order cancelled even if its payment succeeds.
pub async fn mark_paid(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET
             payment_status = 'completed',
             status = CASE WHEN status = 'pending' THEN 'processing' ELSE status END
         WHERE id = $1 AND payment_status = 'pending' AND status <> 'cancelled'",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        use OrderStatus::*;
        let all = [Pending, Processing, Completed, Cancelled];

        // Terminal states allow nothing
        for next in all {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
        // No going backwards, no self-loops, no skipping
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        for s in all {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn test_status_db_roundtrip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::from_db(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::from_db("shipped"), None);
    }
}
