//! Order API
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /api/orders | POST | user |
//! | /api/orders/my-orders | GET | user |
//! | /api/orders/confirm-payment | POST | user |
//! | /api/orders/{id} | GET | owner or admin |
//! | /api/orders | GET | admin |
//! | /api/orders/{id}/status | PUT | admin |

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use crate::auth::{CurrentUser, require_admin};
use crate::db::orders::{self, Order, OrderStatus};
use crate::error::{AppError, AppResult};
use crate::services::orders::{
    OrderDetail, PlaceOrderRequest, confirm_payment, get_order, place_order, total_pages,
    update_status,
};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<AppState> {
    let user = Router::new()
        .route("/", post(create))
        .route("/my-orders", get(my_orders))
        .route("/confirm-payment", post(confirm))
        .route("/{id}", get(get_by_id));

    let admin = Router::new()
        .route("/", get(list_all))
        .route("/{id}/status", put(put_status))
        .route_layer(middleware::from_fn(require_admin));

    user.merge(admin)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order: OrderDetail,
    pub client_secret: String,
}

/// POST /api/orders — place an order against current stock and prices
async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PlaceOrderRequest>,
) -> AppResult<Json<PlaceOrderResponse>> {
    let (order, client_secret) = place_order(&state, &user.id, req).await?;
    Ok(Json(PlaceOrderResponse {
        order,
        client_secret,
    }))
}

/// GET /api/orders/my-orders
async fn my_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = orders::list_for_user(&state.pool, &user.id).await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id} — owner or admin only
async fn get_by_id(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<OrderDetail>> {
    let detail = get_order(&state, &id, &user.id, user.is_admin()).await?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub message: String,
    pub order: Order,
}

/// POST /api/orders/confirm-payment — idempotent
async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<ConfirmPaymentResponse>> {
    let order = confirm_payment(&state, &req.payment_intent_id).await?;
    Ok(Json(ConfirmPaymentResponse {
        message: "Payment confirmed".to_string(),
        order,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

/// GET /api/orders — admin listing with status filter and pagination
async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<OrderListResponse>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            OrderStatus::from_db(s)
                .ok_or_else(|| AppError::validation(format!("Unknown order status: {s}")))?,
        ),
        None => None,
    };

    let page = query.page.max(1);
    let limit = query.limit.clamp(1, MAX_LIMIT);

    let (orders, total) =
        orders::list_all(&state.pool, status.map(OrderStatus::as_str), page, limit).await?;

    Ok(Json(OrderListResponse {
        orders,
        pagination: Pagination {
            current_page: page,
            total_pages: total_pages(total, limit),
            total,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}

/// PUT /api/orders/{id}/status — admin, constrained by the lifecycle FSM
async fn put_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> AppResult<Json<Order>> {
    let order = update_status(&state, &id, req.status).await?;
    Ok(Json(order))
}
