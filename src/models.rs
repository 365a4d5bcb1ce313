use serde::{Deserialize, Serialize};

// ── JWT Claims ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub token_type: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// ── Users ──────────────────────────────────────────────────────────────

/// A stored account as the auth flows see it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
}

// ── Envelope ───────────────────────────────────────────────────────────

/// Success envelope shared by the auth endpoints.
#[derive(Debug, Serialize)]
pub struct BaseResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> BaseResponse<T> {
    pub fn ok(message: &str, result: T) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            result: Some(result),
        }
    }
}

// ── Auth ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct RegisterResult {
    pub user_id: i64,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct IdentityResult {
    pub user_id: i64,
    pub username: String,
}

#[derive(Serialize)]
pub struct PasswordResetResult {
    pub password: String,
}

// ── Health ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub build_date: &'static str,
    pub rustc_version: &'static str,
}
