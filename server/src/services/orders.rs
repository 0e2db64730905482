//! Order service
//!
//! Order placement, payment confirmation and the status lifecycle.
//!
//! Placement is all-or-nothing: every line item is validated against current
//! stock before anything is mutated, and the decrements themselves run as
//! conditional updates (`stock >= quantity`) inside a single transaction.
//! Two concurrent orders for the last unit cannot both succeed — the second
//! conditional update affects zero rows and the whole transaction rolls back.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::db::orders::{Order, OrderItem, OrderStatus, PaymentStatus};
use crate::db::products::Product;
use crate::db::{self, new_id, now_millis};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::stripe;

/// Stripe amounts are in minor units of this currency
const CURRENCY: &str = "usd";

/// One requested line item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i32,
}

/// Shipping address payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Order placement request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
}

/// An order with its line items, as returned by the API
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A validated line with its price snapshot
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Validate every requested item against the loaded products and compute the
/// total from database prices. No mutation happens here; any failure leaves
/// stock untouched.
pub fn build_lines(
    products: &[Product],
    items: &[OrderItemRequest],
) -> AppResult<(Vec<OrderLine>, Decimal)> {
    if items.is_empty() {
        return Err(AppError::validation("Order must contain at least one item"));
    }

    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();

    // Merge repeated product ids first, so stock is checked against the
    // combined quantity and each product yields exactly one line item.
    let mut merged: Vec<(String, i32)> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::validation("Item quantity must be positive"));
        }
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| AppError::validation("Item quantity out of range"))?;
            }
            None => merged.push((item.product_id.clone(), item.quantity)),
        }
    }

    let mut lines = Vec::with_capacity(merged.len());
    let mut total = Decimal::ZERO;

    for (product_id, quantity) in merged {
        let product = by_id
            .get(product_id.as_str())
            .ok_or_else(|| AppError::not_found(format!("Product {product_id} not found")))?;

        if quantity > product.stock {
            return Err(AppError::validation(format!(
                "Insufficient stock for {}. Available: {}",
                product.name, product.stock
            )));
        }

        total += product.price * Decimal::from(quantity);
        lines.push(OrderLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity,
            unit_price: product.price,
        });
    }

    Ok((lines, total))
}

/// Convert a decimal amount to minor units (cents) for Stripe
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| AppError::internal(format!("Order total out of range: {amount}")))
}

/// Place an order: validate stock, compute the total from current prices,
/// create the payment intent, then persist order + decrements atomically.
pub async fn place_order(
    state: &AppState,
    user_id: &str,
    req: PlaceOrderRequest,
) -> AppResult<(OrderDetail, String)> {
    let product_ids: Vec<String> = req.items.iter().map(|i| i.product_id.clone()).collect();
    let products = db::products::find_by_ids(&state.pool, &product_ids).await?;

    let (lines, total) = build_lines(&products, &req.items)?;
    let amount_minor = to_minor_units(total)?;

    let intent = stripe::create_payment_intent(
        &state.config.stripe_secret_key,
        amount_minor,
        CURRENCY,
        user_id,
    )
    .await
    .map_err(|e| AppError::internal(format!("Stripe payment intent failed: {e}")))?;

    let order = Order {
        id: new_id(),
        user_id: user_id.to_string(),
        total,
        payment_method: req.payment_method,
        shipping_address: req.shipping_address.address,
        shipping_city: req.shipping_address.city,
        shipping_postal_code: req.shipping_address.postal_code,
        shipping_country: req.shipping_address.country,
        payment_intent_id: intent.id.clone(),
        status: OrderStatus::Pending.as_str().to_string(),
        payment_status: PaymentStatus::Pending.as_str().to_string(),
        created_at: now_millis(),
    };

    let items: Vec<OrderItem> = lines
        .iter()
        .map(|line| OrderItem {
            order_id: order.id.clone(),
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        })
        .collect();

    match persist_order(state, &order, &items, &lines).await {
        Ok(()) => {}
        Err(e) => {
            // The intent exists but the order does not; cancel it so the
            // client cannot complete a payment for nothing.
            if let Err(cancel_err) =
                stripe::cancel_payment_intent(&state.config.stripe_secret_key, &intent.id).await
            {
                tracing::warn!(
                    payment_intent_id = %intent.id,
                    error = %cancel_err,
                    "Failed to cancel orphaned payment intent"
                );
            }
            return Err(e);
        }
    }

    state.metrics.record_order_placed();
    tracing::info!(
        order_id = %order.id,
        user_id = %user_id,
        total = %total,
        items = items.len(),
        "Order placed"
    );

    Ok((OrderDetail { order, items }, intent.client_secret))
}

/// Apply all stock decrements and insert the order in one transaction
async fn persist_order(
    state: &AppState,
    order: &Order,
    items: &[OrderItem],
    lines: &[OrderLine],
) -> AppResult<()> {
    let mut tx = state.pool.begin().await?;
    let now = now_millis();

    for line in lines {
        let decremented =
            db::products::decrement_stock(&mut *tx, &line.product_id, line.quantity, now).await?;
        if !decremented {
            // A concurrent order took the stock between validation and here.
            // Rolling back undoes every decrement already applied.
            tx.rollback().await?;
            let available = db::products::find_by_id(&state.pool, &line.product_id)
                .await?
                .map(|p| p.stock)
                .unwrap_or(0);
            return Err(AppError::validation(format!(
                "Insufficient stock for {}. Available: {}",
                line.name, available
            )));
        }
    }

    db::orders::insert(&mut *tx, order).await?;
    db::orders::insert_items(&mut *tx, items).await?;

    tx.commit().await?;
    Ok(())
}

/// Whether an order may still be paid. `Ok(true)` means the payment is
/// already completed and confirmation is an idempotent no-op; cancelled
/// orders can never be paid.
fn payment_precheck(order: &Order) -> AppResult<bool> {
    if order.payment_status == PaymentStatus::Completed.as_str() {
        return Ok(true);
    }
    if order.status == OrderStatus::Cancelled.as_str() {
        return Err(AppError::BusinessRule(
            "Cannot confirm payment for a cancelled order".to_string(),
        ));
    }
    Ok(false)
}

/// Confirm a payment by intent id. Idempotent: an already-completed order is
/// returned unchanged.
pub async fn confirm_payment(state: &AppState, payment_intent_id: &str) -> AppResult<Order> {
    let order = db::orders::find_by_payment_intent(&state.pool, payment_intent_id)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("Order not found for payment intent {payment_intent_id}"))
        })?;

    if payment_precheck(&order)? {
        return Ok(order);
    }

    let status =
        stripe::retrieve_payment_intent_status(&state.config.stripe_secret_key, payment_intent_id)
            .await
            .map_err(|e| AppError::internal(format!("Stripe status query failed: {e}")))?;

    if status != "succeeded" {
        return Err(AppError::PaymentIncomplete(format!(
            "Payment not completed. Status: {status}"
        )));
    }

    let transitioned = db::orders::mark_paid(&state.pool, &order.id).await?;
    if transitioned {
        state.metrics.record_payment_confirmed();
        tracing::info!(order_id = %order.id, "Payment confirmed");
    }

    let order = db::orders::find_by_id(&state.pool, &order.id)
        .await?
        .ok_or_else(|| AppError::internal("Order vanished during payment confirmation"))?;

    // The conditional update refuses cancelled orders; re-check so a
    // cancellation racing this call is reported, not silently swallowed.
    if !transitioned {
        payment_precheck(&order)?;
    }

    Ok(order)
}

/// Admin status update, constrained by the order state machine
pub async fn update_status(
    state: &AppState,
    order_id: &str,
    next: OrderStatus,
) -> AppResult<Order> {
    let order = db::orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

    let current = OrderStatus::from_db(&order.status)
        .ok_or_else(|| AppError::internal(format!("Unknown order status: {}", order.status)))?;

    if !current.can_transition_to(next) {
        return Err(AppError::BusinessRule(format!(
            "Cannot transition order from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    db::orders::update_status(&state.pool, order_id, next).await?;
    tracing::info!(order_id = %order_id, from = current.as_str(), to = next.as_str(), "Order status updated");

    // A cancelled order must not remain payable through the client secret
    // issued at placement time.
    if next == OrderStatus::Cancelled && order.payment_status == PaymentStatus::Pending.as_str() {
        if let Err(e) = stripe::cancel_payment_intent(
            &state.config.stripe_secret_key,
            &order.payment_intent_id,
        )
        .await
        {
            tracing::warn!(
                order_id = %order_id,
                payment_intent_id = %order.payment_intent_id,
                error = %e,
                "Failed to cancel payment intent for cancelled order"
            );
        }
    }

    db::orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::internal("Order vanished during status update"))
}

/// Load an order with its items, enforcing ownership: non-admins may only
/// read their own orders.
pub async fn get_order(
    state: &AppState,
    order_id: &str,
    requester_id: &str,
    requester_is_admin: bool,
) -> AppResult<OrderDetail> {
    let order = db::orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

    if order.user_id != requester_id && !requester_is_admin {
        return Err(AppError::forbidden("You do not own this order"));
    }

    let items = db::orders::items_for(&state.pool, order_id).await?;
    Ok(OrderDetail { order, items })
}

/// Page count for offset pagination
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, name: &str, price: &str, stock: i32) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            category: "laptops".to_string(),
            price: price.parse().expect("price"),
            stock,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn item(product_id: &str, quantity: i32) -> OrderItemRequest {
        OrderItemRequest {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_total_uses_database_prices() {
        // Product A: price 100, stock 5, qty 2 -> total 200
        let products = vec![product("a", "Product A", "100", 5)];
        let (lines, total) = build_lines(&products, &[item("a", 2)]).expect("valid order");

        assert_eq!(total, Decimal::from(200));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].unit_price, Decimal::from(100));
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn test_total_sums_multiple_lines() {
        let products = vec![
            product("a", "Keyboard", "49.99", 10),
            product("b", "Mouse", "19.99", 10),
        ];
        let (_, total) =
            build_lines(&products, &[item("a", 2), item("b", 3)]).expect("valid order");

        assert_eq!(total, "159.95".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_insufficient_stock_message() {
        // Product B: stock 1, qty 2 -> exact error message, nothing mutated
        let products = vec![product("b", "B", "10", 1)];
        let err = build_lines(&products, &[item("b", 2)]).unwrap_err();

        match err {
            AppError::Validation(msg) => {
                assert_eq!(msg, "Insufficient stock for B. Available: 1");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let products = vec![product("a", "A", "10", 5)];
        let err = build_lines(&products, &[item("missing", 1)]).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_empty_order_rejected() {
        let err = build_lines(&[], &[]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let products = vec![product("a", "A", "10", 5)];
        assert!(build_lines(&products, &[item("a", 0)]).is_err());
        assert!(build_lines(&products, &[item("a", -3)]).is_err());
    }

    #[test]
    fn test_duplicate_lines_checked_against_combined_quantity() {
        // Two lines of qty 3 for a stock-5 product must not pass just
        // because each line fits on its own
        let products = vec![product("a", "Headset", "10", 5)];
        let err = build_lines(&products, &[item("a", 3), item("a", 3)]).unwrap_err();

        match err {
            AppError::Validation(msg) => {
                assert_eq!(msg, "Insufficient stock for Headset. Available: 5");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_lines_merge_into_one() {
        // Within stock, repeated product ids collapse to a single line so
        // the order has one row per product
        let products = vec![product("a", "Headset", "10", 10)];
        let (lines, total) =
            build_lines(&products, &[item("a", 2), item("a", 3)]).expect("valid order");

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
        assert_eq!(total, Decimal::from(50));
    }

    #[test]
    fn test_later_failure_produces_no_lines() {
        // First item is fine, second exceeds stock; the whole request fails
        let products = vec![product("a", "A", "10", 5), product("b", "B", "10", 1)];
        let err = build_lines(&products, &[item("a", 2), item("b", 2)]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_minor_units_conversion() {
        assert_eq!(to_minor_units(Decimal::from(200)).unwrap(), 20000);
        assert_eq!(
            to_minor_units("159.95".parse::<Decimal>().unwrap()).unwrap(),
            15995
        );
        assert_eq!(
            to_minor_units("0.01".parse::<Decimal>().unwrap()).unwrap(),
            1
        );
    }

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        Order {
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            total: Decimal::from(100),
            payment_method: "stripe".to_string(),
            shipping_address: "1 Main St".to_string(),
            shipping_city: "Springfield".to_string(),
            shipping_postal_code: "12345".to_string(),
            shipping_country: "US".to_string(),
            payment_intent_id: "pi_1".to_string(),
            status: status.as_str().to_string(),
            payment_status: payment_status.as_str().to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn test_cancelled_order_cannot_be_paid() {
        // A cancelled order stays cancelled even if its intent succeeds
        let err =
            payment_precheck(&order(OrderStatus::Cancelled, PaymentStatus::Pending)).unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[test]
    fn test_completed_payment_short_circuits() {
        let done = payment_precheck(&order(OrderStatus::Processing, PaymentStatus::Completed))
            .expect("idempotent");
        assert!(done);
    }

    #[test]
    fn test_pending_order_is_payable() {
        let done = payment_precheck(&order(OrderStatus::Pending, PaymentStatus::Pending))
            .expect("payable");
        assert!(!done);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(95, 10), 10);
        assert_eq!(total_pages(5, 0), 0);
    }
}
