//! Authentication API
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /api/auth/register | POST | public |
//! | /api/auth/login | POST | public |

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::db::users::{self, User};
use crate::db::{new_id, now_millis};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_string();

    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("Invalid email"));
    }
    if req.password.len() < 8 {
        return Err(AppError::validation(
            "Password must be at least 8 characters",
        ));
    }

    if users::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let hashed = users::hash_password(&req.password)
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;

    let user = users::create(
        &state.pool,
        &new_id(),
        &name,
        &email,
        &hashed,
        "user",
        now_millis(),
    )
    .await?;

    let token = state
        .jwt
        .generate_token(&user.id, &user.email, &user.role)
        .map_err(|e| AppError::internal(format!("Failed to generate token: {e}")))?;

    tracing::info!(user_id = %user.id, email = %user.email, "User registered");

    Ok(Json(AuthResponse { token, user }))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();

    // Uniform failure path to avoid leaking which emails exist
    let user = users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(AppError::invalid_credentials)?;

    if !user.verify_password(&req.password) {
        tracing::warn!(target: "security", email = %email, "Login failed - invalid credentials");
        return Err(AppError::invalid_credentials());
    }

    let token = state
        .jwt
        .generate_token(&user.id, &user.email, &user.role)
        .map_err(|e| AppError::internal(format!("Failed to generate token: {e}")))?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse { token, user }))
}
