//! User lookup collaborator used by the login, register and reset flows.

use log::info;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::models::{NewUser, UserRecord};

#[derive(Debug)]
pub enum StoreError {
    /// Username already taken.
    Duplicate,
    NotFound,
    Database(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Duplicate => write!(f, "User already exists"),
            StoreError::NotFound => write!(f, "User not found"),
            StoreError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                StoreError::Duplicate
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

#[axum::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError>;
}

// ── Postgres ───────────────────────────────────────────────────────────

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `users` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(50) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                email VARCHAR(254) NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )",
        )
        .execute(&self.pool)
        .await?;
        info!("store: users table ready");
        Ok(())
    }
}

#[axum::async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, password_hash, email, is_active FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (username, password_hash, email, is_active)
             VALUES ($1, $2, $3, TRUE)
             RETURNING id, username, password_hash, email, is_active",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ── In-memory ──────────────────────────────────────────────────────────

/// Process-local store for development and tests. Ids start at 1.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, e.g. an inactive account in tests.
    pub fn insert(&self, record: UserRecord) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.username.clone(), record);
    }
}

#[axum::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&user.username) {
            return Err(StoreError::Duplicate);
        }
        let id = users.values().map(|u| u.id).max().unwrap_or(0) + 1;
        let record = UserRecord {
            id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            is_active: true,
        };
        users.insert(record.username.clone(), record.clone());
        Ok(record)
    }

    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let user = users
            .values_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}
