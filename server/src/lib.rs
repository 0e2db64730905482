//! TechShop Pro backend
//!
//! REST API for an electronics storefront: product catalog, user accounts,
//! wishlists, order placement with atomic stock reservation, and Stripe
//! payment confirmation.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod services;
pub mod state;
pub mod stripe;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
