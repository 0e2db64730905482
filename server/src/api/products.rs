//! Product catalog API
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /api/products | GET | public |
//! | /api/products/{id} | GET | public |
//! | /api/products | POST | admin |
//! | /api/products/{id} | PUT | admin |
//! | /api/products/{id} | DELETE | admin |

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::{get, post, put},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::require_admin;
use crate::db::products::{self, CATEGORIES, CatalogQuery, Product, parse_sort};
use crate::db::{new_id, now_millis};
use crate::error::{AppError, AppResult};
use crate::services::orders::total_pages;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 12;
const MAX_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/products", routes())
}

fn routes() -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list))
        .route("/{id}", get(get_by_id));

    let admin = Router::new()
        .route("/", post(create))
        .route("/{id}", put(update).delete(delete_product))
        .route_layer(middleware::from_fn(require_admin));

    public.merge(admin)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    /// `field:asc|desc` over name, price, stock, createdAt
    pub sort: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
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
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

fn validate_category(category: &str) -> AppResult<()> {
    if CATEGORIES.contains(&category) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Unknown category: {category}. Allowed: {}",
            CATEGORIES.join(", ")
        )))
    }
}

/// GET /api/products — filter/sort/paginate the catalog
async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ProductListResponse>> {
    if let Some(ref category) = query.category {
        validate_category(category)?;
    }

    let sort = match query.sort.as_deref() {
        Some(s) => Some(
            parse_sort(s).ok_or_else(|| AppError::validation(format!("Invalid sort: {s}")))?,
        ),
        None => None,
    };

    let page = query.page.max(1);
    let limit = query.limit.clamp(1, MAX_LIMIT);

    let catalog_query = CatalogQuery {
        category: query.category,
        search: query.search.filter(|s| !s.trim().is_empty()),
        min_price: query.min_price,
        max_price: query.max_price,
        sort,
        page,
        limit,
    };

    let (products, total) = products::list(&state.pool, &catalog_query).await?;

    Ok(Json(ProductListResponse {
        products,
        pagination: Pagination {
            current_page: page,
            total_pages: total_pages(total, limit),
            total,
        },
    }))
}

/// GET /api/products/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let product = products::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {id} not found")))?;
    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub stock: i32,
}

/// POST /api/products (admin)
async fn create(
    State(state): State<AppState>,
    Json(payload): Json<ProductCreate>,
) -> AppResult<Json<Product>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Product name is required"));
    }
    validate_category(&payload.category)?;
    if payload.price < Decimal::ZERO {
        return Err(AppError::validation("Price must not be negative"));
    }
    if payload.stock < 0 {
        return Err(AppError::validation("Stock must not be negative"));
    }

    let product = products::create(
        &state.pool,
        &new_id(),
        payload.name.trim(),
        &payload.description,
        &payload.category,
        payload.price,
        payload.stock,
        now_millis(),
    )
    .await?;

    tracing::info!(product_id = %product.id, name = %product.name, "Product created");

    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
}

/// PUT /api/products/{id} (admin)
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    if let Some(ref category) = payload.category {
        validate_category(category)?;
    }
    if matches!(payload.price, Some(p) if p < Decimal::ZERO) {
        return Err(AppError::validation("Price must not be negative"));
    }
    if matches!(payload.stock, Some(s) if s < 0) {
        return Err(AppError::validation("Stock must not be negative"));
    }

    let product = products::update(
        &state.pool,
        &id,
        payload.name.as_deref(),
        payload.description.as_deref(),
        payload.category.as_deref(),
        payload.price,
        payload.stock,
        now_millis(),
    )
    .await?
    .ok_or_else(|| AppError::not_found(format!("Product {id} not found")))?;

    Ok(Json(product))
}

/// DELETE /api/products/{id} (admin)
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = products::delete(&state.pool, &id).await?;
    if !deleted {
        return Err(AppError::not_found(format!("Product {id} not found")));
    }

    tracing::info!(product_id = %id, "Product deleted");

    Ok(Json(serde_json::json!({ "message": "Product deleted" })))
}
