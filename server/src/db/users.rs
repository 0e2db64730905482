//! User storage and password hashing

use serde::Serialize;
use sqlx::PgPool;

/// User row. The password hash is never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: String,
    pub created_at: i64,
}

impl User {
    /// Verify a password against the stored argon2 hash
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.hashed_password)
    }
}

/// Hash a password using argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against an argon2 hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub async fn create(
    pool: &PgPool,
    id: &str,
    name: &str,
    email: &str,
    hashed_password: &str,
    role: &str,
    now: i64,
) -> Result<User, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO users (id, name, email, hashed_password, role, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(hashed_password)
    .bind(role)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_name(pool: &PgPool, id: &str, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET name = $1 WHERE id = $2")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_email(pool: &PgPool, id: &str, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET email = $1 WHERE id = $2")
        .bind(email)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_password(
    pool: &PgPool,
    id: &str,
    hashed_password: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET hashed_password = $1 WHERE id = $2")
        .bind(hashed_password)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter2-but-longer").expect("hash");
        assert!(verify_password("hunter2-but-longer", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_garbage_hash_rejected() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: "u1".to_string(),
            name: "John".to_string(),
            email: "john@example.com".to_string(),
            hashed_password: "$argon2id$secret".to_string(),
            role: "user".to_string(),
            created_at: 0,
        };
        let json = serde_json::to_string(&user).expect("serialize");
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("hashedPassword"));
    }
}
