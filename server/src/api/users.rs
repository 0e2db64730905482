//! User profile and wishlist API
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /api/users/profile | GET | user |
//! | /api/users/profile | PUT | user |
//! | /api/users/wishlist | GET | user |
//! | /api/users/wishlist/{product_id} | POST | user |
//! | /api/users/wishlist/{product_id} | DELETE | user |

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::db::products::Product;
use crate::db::users::{self, User};
use crate::db::{products, wishlist};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/users", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/wishlist", get(list_wishlist))
        .route(
            "/wishlist/{product_id}",
            post(add_to_wishlist).delete(remove_from_wishlist),
        )
}

/// GET /api/users/profile
async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<User>> {
    let user = users::find_by_id(&state.pool, &user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// PUT /api/users/profile — partial update of name/email/password
async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ProfileUpdate>,
) -> AppResult<Json<User>> {
    if let Some(ref name) = payload.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Name must not be empty"));
        }
        users::update_name(&state.pool, &user.id, name).await?;
    }

    if let Some(ref email) = payload.email {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation("Invalid email"));
        }
        if let Some(existing) = users::find_by_email(&state.pool, &email).await? {
            if existing.id != user.id {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }
        users::update_email(&state.pool, &user.id, &email).await?;
    }

    if let Some(ref password) = payload.password {
        if password.len() < 8 {
            return Err(AppError::validation(
                "Password must be at least 8 characters",
            ));
        }
        let hashed = users::hash_password(password)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;
        users::update_password(&state.pool, &user.id, &hashed).await?;
    }

    let updated = users::find_by_id(&state.pool, &user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    tracing::info!(user_id = %updated.id, "Profile updated");

    Ok(Json(updated))
}

/// GET /api/users/wishlist — full product objects
async fn list_wishlist(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<Product>>> {
    let products = wishlist::list(&state.pool, &user.id).await?;
    Ok(Json(products))
}

/// POST /api/users/wishlist/{product_id} — duplicate adds are a no-op
async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<String>,
) -> AppResult<Json<Vec<Product>>> {
    // Weak reference, but the product must exist at add time
    if products::find_by_id(&state.pool, &product_id).await?.is_none() {
        return Err(AppError::not_found(format!("Product {product_id} not found")));
    }

    wishlist::add(&state.pool, &user.id, &product_id).await?;

    let products = wishlist::list(&state.pool, &user.id).await?;
    Ok(Json(products))
}

/// DELETE /api/users/wishlist/{product_id}
async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<String>,
) -> AppResult<Json<Vec<Product>>> {
    wishlist::remove(&state.pool, &user.id, &product_id).await?;

    let products = wishlist::list(&state.pool, &user.id).await?;
    Ok(Json(products))
}
