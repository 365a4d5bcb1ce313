use axum::extract::{Extension, FromRequest, RequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use log::{debug, error};
use std::sync::Arc;

use crate::error::AppError;
use crate::token::TokenService;

/// Identity of the caller, taken from a valid access token.
///
/// Adding this as a handler argument is what makes a route protected.
/// Extraction also stores a copy in the request extensions so later
/// extractors and layers can see who is calling.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
}

#[axum::async_trait]
impl<B> FromRequest<B> for AuthenticatedUser
where
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(tokens) = Extension::<Arc<TokenService>>::from_request(req)
            .await
            .map_err(|_| {
                error!("auth: token service not configured");
                AppError::InternalError("Authentication not configured".to_string())
            })?;

        let headers = req.headers().ok_or(AppError::Unauthorized)?;
        let user = authenticate(headers, &tokens)?;

        if let Some(extensions) = req.extensions_mut() {
            extensions.insert(user.clone());
        }

        Ok(user)
    }
}

/// Resolve the caller from the `Authorization` header.
///
/// Missing header, wrong shape, and every token failure all map to the same
/// `AppError::Unauthorized`.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<AuthenticatedUser, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            debug!("auth: missing Authorization header");
            AppError::Unauthorized
        })?;

    let token = bearer_token(auth_header).ok_or_else(|| {
        debug!("auth: Authorization header is not a bearer token");
        AppError::Unauthorized
    })?;

    let claims = tokens.validate_access_token(token).map_err(|e| {
        debug!("auth: token rejected: {}", e);
        AppError::Unauthorized
    })?;

    Ok(AuthenticatedUser {
        user_id: claims.user_id,
        username: claims.username,
    })
}

/// Split `"Bearer <token>"`. Exactly two space-separated parts; the scheme is
/// matched case-insensitively.
pub fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || token.is_empty() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};

    const TEST_SECRET: &str = "test-secret-key-for-unit-tests";

    fn token_service() -> Arc<TokenService> {
        Arc::new(
            TokenService::new(&JwtConfig {
                secret: TEST_SECRET.to_string(),
                access_expire_minutes: 60,
                refresh_expire_minutes: 10080,
            })
            .unwrap(),
        )
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    // ── bearer_token ───────────────────────────────────────────────────

    #[test]
    fn test_bearer_token_valid() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_scheme_case_insensitive() {
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER abc"), Some("abc"));
    }

    #[test]
    fn test_bearer_wrong_scheme() {
        assert_eq!(bearer_token("Token xyz"), None);
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
    }

    #[test]
    fn test_bearer_wrong_shape() {
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer a b"), None);
        assert_eq!(bearer_token("Bearer  abc"), None);
        assert_eq!(bearer_token(""), None);
    }

    // ── authenticate ───────────────────────────────────────────────────

    #[test]
    fn test_authenticate_missing_header() {
        let tokens = token_service();
        let result = authenticate(&HeaderMap::new(), &tokens);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_authenticate_valid_access_token() {
        let tokens = token_service();
        let token = tokens.issue_access_token(42, "carol").unwrap();

        let user = authenticate(&headers_with(&format!("Bearer {}", token)), &tokens).unwrap();
        assert_eq!(
            user,
            AuthenticatedUser {
                user_id: 42,
                username: "carol".to_string()
            }
        );
    }

    #[test]
    fn test_authenticate_rejects_refresh_token() {
        let tokens = token_service();
        let token = tokens.issue_refresh_token(42, "carol").unwrap();

        let result = authenticate(&headers_with(&format!("Bearer {}", token)), &tokens);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_authenticate_rejects_foreign_signature() {
        let tokens = token_service();
        let other = TokenService::new(&JwtConfig {
            secret: "someone-else".to_string(),
            access_expire_minutes: 60,
            refresh_expire_minutes: 10080,
        })
        .unwrap();
        let token = other.issue_access_token(1, "mallory").unwrap();

        let result = authenticate(&headers_with(&format!("Bearer {}", token)), &tokens);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    // ── extractor ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_extractor_attaches_identity() {
        let tokens = token_service();
        let token = tokens.issue_access_token(9, "dave").unwrap();
        let request = Request::builder()
            .uri("/v1/auth/me")
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .extension(Arc::clone(&tokens))
            .body(Body::empty())
            .unwrap();
        let mut parts = RequestParts::new(request);

        let user = AuthenticatedUser::from_request(&mut parts).await.unwrap();
        assert_eq!(user.user_id, 9);

        let stored = parts
            .extensions()
            .and_then(|ext| ext.get::<AuthenticatedUser>())
            .cloned();
        assert_eq!(stored, Some(user));
    }

    #[tokio::test]
    async fn test_extractor_rejects_without_header() {
        let request = Request::builder()
            .uri("/v1/auth/me")
            .extension(token_service())
            .body(Body::empty())
            .unwrap();
        let mut parts = RequestParts::new(request);

        let result = AuthenticatedUser::from_request(&mut parts).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }
}
