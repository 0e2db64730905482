//! Wishlist storage — a set of weak product references per user

use sqlx::PgPool;

use super::products::Product;

/// Add a product to a user's wishlist. Duplicate adds are a no-op.
pub async fn add(pool: &PgPool, user_id: &str, product_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove(pool: &PgPool, user_id: &str, product_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// List the full product objects on a user's wishlist
pub async fn list(pool: &PgPool, user_id: &str) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as(
        "SELECT p.* FROM products p
         JOIN wishlist_items w ON w.product_id = p.id
         WHERE w.user_id = $1
         ORDER BY p.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
