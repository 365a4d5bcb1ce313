use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use log::{debug, error, info, warn};
use password_auth::{generate_hash, verify_password};
use std::sync::{Arc, OnceLock};

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::{
    BaseResponse, IdentityResult, LoginRequest, NewUser, PasswordResetResult, RefreshTokenRequest,
    RegisterRequest, RegisterResult, TokenPair,
};
use crate::secrets::SecretGenerator;
use crate::store::{StoreError, UserStore};
use crate::token::{TokenError, TokenService};
use crate::validate::{validate_email, validate_username};

/// Hash compared against when the username does not exist, so a miss costs
/// the same as a wrong password.
fn dummy_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| generate_hash("dummy-password-for-timing"))
}

fn store_error(context: &str, e: StoreError) -> AppError {
    error!("{}: store error: {}", context, e);
    AppError::InternalError("Database error".to_string())
}

fn signing_error(context: &str, e: TokenError) -> AppError {
    error!("{}: failed to issue tokens: {}", context, e);
    AppError::InternalError("Failed to generate token".to_string())
}

/// Register a new user (`POST /v1/auth/register`).
pub async fn register(
    Extension(users): Extension<Arc<dyn UserStore>>,
    Extension(secrets): Extension<Arc<SecretGenerator>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<BaseResponse<RegisterResult>>), AppError> {
    info!("POST /v1/auth/register: username={}", payload.username);

    validate_username(&payload.username)?;
    validate_email(&payload.email)?;
    secrets.validate_password(&payload.password).map_err(|e| {
        warn!(
            "register: password rejected by policy for username={}: {}",
            payload.username, e
        );
        AppError::Validation(e.to_string())
    })?;

    let new_user = NewUser {
        username: payload.username.clone(),
        password_hash: generate_hash(&payload.password),
        email: payload.email,
    };

    let user = users.create_user(new_user).await.map_err(|e| match e {
        StoreError::Duplicate => {
            warn!("register: username={} already exists", payload.username);
            AppError::Conflict("User already exists".to_string())
        }
        other => store_error("register", other),
    })?;

    info!("register: created user_id={} username={}", user.id, user.username);
    Ok((
        StatusCode::CREATED,
        Json(BaseResponse::ok(
            "User registered successfully",
            RegisterResult { user_id: user.id },
        )),
    ))
}

/// Exchange credentials for an access/refresh pair (`POST /v1/auth/login`).
///
/// Unknown user, wrong password and inactive account all return the same 401.
pub async fn login(
    Extension(users): Extension<Arc<dyn UserStore>>,
    Extension(tokens): Extension<Arc<TokenService>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<BaseResponse<TokenPair>>, AppError> {
    info!("POST /v1/auth/login: username={}", payload.username);

    let user = users
        .find_by_username(&payload.username)
        .await
        .map_err(|e| store_error("login", e))?;

    let user = match user {
        Some(user) => user,
        None => {
            let _ = verify_password(&payload.password, dummy_hash());
            debug!(
                "login: no user for username={} (generic error returned)",
                payload.username
            );
            return Err(AppError::Unauthorized);
        }
    };

    if verify_password(&payload.password, &user.password_hash).is_err() {
        warn!("login: invalid password for username={}", payload.username);
        return Err(AppError::Unauthorized);
    }

    if !user.is_active {
        warn!("login: inactive account username={}", payload.username);
        return Err(AppError::Unauthorized);
    }

    let pair = tokens
        .issue_pair(user.id, &user.username)
        .map_err(|e| signing_error("login", e))?;

    info!("login: tokens issued for user_id={}", user.id);
    Ok(Json(BaseResponse::ok("Login successful", pair)))
}

/// Mint a fresh pair from a refresh token (`POST /v1/auth/refresh`).
pub async fn refresh(
    Extension(tokens): Extension<Arc<TokenService>>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<BaseResponse<TokenPair>>, AppError> {
    debug!("POST /v1/auth/refresh: request received");

    let claims = tokens
        .validate_refresh_token(&payload.refresh_token)
        .map_err(|e| {
            warn!("refresh: refresh token rejected: {}", e);
            AppError::Unauthorized
        })?;

    let pair = tokens
        .issue_pair(claims.user_id, &claims.username)
        .map_err(|e| signing_error("refresh", e))?;

    info!("refresh: tokens refreshed for user_id={}", claims.user_id);
    Ok(Json(BaseResponse::ok("Token refreshed successfully", pair)))
}

/// Return the caller's identity (`GET /v1/auth/me`).
pub async fn me(user: AuthenticatedUser) -> Json<BaseResponse<IdentityResult>> {
    debug!("GET /v1/auth/me: user_id={}", user.user_id);
    Json(BaseResponse::ok(
        "Authenticated",
        IdentityResult {
            user_id: user.user_id,
            username: user.username,
        },
    ))
}

/// Replace the caller's password with a generated one (`POST /v1/auth/password/reset`).
///
/// The new password is returned once and only its hash is stored.
pub async fn reset_password(
    user: AuthenticatedUser,
    Extension(users): Extension<Arc<dyn UserStore>>,
    Extension(secrets): Extension<Arc<SecretGenerator>>,
) -> Result<Json<BaseResponse<PasswordResetResult>>, AppError> {
    info!("POST /v1/auth/password/reset: user_id={}", user.user_id);

    let password = secrets.generate_password();
    let password_hash = generate_hash(&password);

    users
        .update_password_hash(user.user_id, &password_hash)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => {
                warn!("reset_password: user_id={} no longer exists", user.user_id);
                AppError::NotFound("User not found".to_string())
            }
            other => store_error("reset_password", other),
        })?;

    info!("reset_password: password replaced for user_id={}", user.user_id);
    Ok(Json(BaseResponse::ok(
        "Password reset successfully",
        PasswordResetResult { password },
    )))
}
