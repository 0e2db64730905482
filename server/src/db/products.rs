//! Product catalog storage
//!
//! Filter/sort/paginate queries plus the conditional stock decrement used by
//! order placement.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

/// Allowed product categories
pub const CATEGORIES: &[&str] = &[
    "laptops",
    "smartphones",
    "tablets",
    "audio",
    "accessories",
    "gaming",
];

/// Product row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub stock: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Parse a `field:asc|desc` sort expression into a whitelisted column.
///
/// Unknown fields and malformed expressions are rejected, never interpolated
/// into SQL.
pub fn parse_sort(sort: &str) -> Option<(&'static str, SortDirection)> {
    let (field, dir) = match sort.split_once(':') {
        Some((f, d)) => (f, d),
        None => (sort, "asc"),
    };
    let column = match field {
        "name" => "name",
        "price" => "price",
        "stock" => "stock",
        "createdAt" => "created_at",
        _ => return None,
    };
    let direction = match dir {
        "asc" => SortDirection::Asc,
        "desc" => SortDirection::Desc,
        _ => return None,
    };
    Some((column, direction))
}

/// Catalog query parameters (already validated/normalized by the API layer)
#[derive(Debug, Default)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: Option<(&'static str, SortDirection)>,
    pub page: i64,
    pub limit: i64,
}

/// Escape LIKE wildcards (and the escape character itself) so user input
/// matches literally inside the pattern
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a CatalogQuery) {
    builder.push(" WHERE TRUE");
    if let Some(ref category) = query.category {
        builder.push(" AND category = ").push_bind(category);
    }
    if let Some(ref search) = query.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min) = query.min_price {
        builder.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        builder.push(" AND price <= ").push_bind(max);
    }
}

/// List products matching the query, returning the page plus the total match count
pub async fn list(
    pool: &PgPool,
    query: &CatalogQuery,
) -> Result<(Vec<Product>, i64), sqlx::Error> {
    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM products");
    push_filters(&mut count_builder, query);
    let total: i64 = count_builder.build_query_scalar().fetch_one(pool).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM products");
    push_filters(&mut builder, query);

    let (column, direction) = query
        .sort
        .unwrap_or(("created_at", SortDirection::Desc));
    builder.push(format!(" ORDER BY {} {}", column, direction.as_sql()));

    let offset = (query.page - 1).max(0) * query.limit;
    builder.push(" LIMIT ").push_bind(query.limit);
    builder.push(" OFFSET ").push_bind(offset);

    let products = builder.build_query_as().fetch_all(pool).await?;
    Ok((products, total))
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Fetch all products referenced by an order request
pub async fn find_by_ids(pool: &PgPool, ids: &[String]) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    id: &str,
    name: &str,
    description: &str,
    category: &str,
    price: Decimal,
    stock: i32,
    now: i64,
) -> Result<Product, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO products (id, name, description, category, price, stock, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
         RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(category)
    .bind(price)
    .bind(stock)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Partial update; only provided fields are written
#[allow(clippy::too_many_arguments)]
pub async fn update(
    pool: &PgPool,
    id: &str,
    name: Option<&str>,
    description: Option<&str>,
    category: Option<&str>,
    price: Option<Decimal>,
    stock: Option<i32>,
    now: i64,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE products SET
             name        = COALESCE($2, name),
             description = COALESCE($3, description),
             category    = COALESCE($4, category),
             price       = COALESCE($5, price),
             stock       = COALESCE($6, stock),
             updated_at  = $7
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(category)
    .bind(price)
    .bind(stock)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Atomic decrement-if-sufficient. Returns false when stock would go
/// negative, so the caller can roll back the whole transaction.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    id: &str,
    quantity: i32,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = $3
         WHERE id = $1 AND stock >= $2",
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort_whitelist() {
        assert_eq!(
            parse_sort("price:desc"),
            Some(("price", SortDirection::Desc))
        );
        assert_eq!(parse_sort("name:asc"), Some(("name", SortDirection::Asc)));
        assert_eq!(
            parse_sort("createdAt:desc"),
            Some(("created_at", SortDirection::Desc))
        );
        // Bare field defaults to ascending
        assert_eq!(parse_sort("price"), Some(("price", SortDirection::Asc)));
    }

    #[test]
    fn test_parse_sort_rejects_unknown() {
        // Never interpolate arbitrary input into ORDER BY
        assert_eq!(parse_sort("hashed_password:asc"), None);
        assert_eq!(parse_sort("price;DROP TABLE products"), None);
        assert_eq!(parse_sort("price:sideways"), None);
        assert_eq!(parse_sort(""), None);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50% off"), "%50\\% off%");
        assert_eq!(like_pattern("snake_case"), "%snake\\_case%");
        // Backslash is escaped first so it cannot un-escape a wildcard
        assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
        assert_eq!(like_pattern("\\%"), "%\\\\\\%%");
    }

    #[test]
    fn test_categories_are_lowercase() {
        for c in CATEGORIES {
            assert_eq!(*c, c.to_lowercase());
        }
    }
}
