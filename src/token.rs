//! Access/refresh token issuance and validation.
//!
//! Tokens are HS256 JWTs signed with one shared secret. Access and refresh
//! tokens carry the same identity claims and differ only in `token_type` and
//! lifetime. Expiry is the only invalidation mechanism.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;

use crate::config::{ConfigError, JwtConfig};
use crate::constants::{TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};
use crate::models::{Claims, TokenPair};

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Why a token was refused or could not be minted.
///
/// Callers outside this module collapse every validation variant into the
/// same unauthorized response.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenError {
    /// Not a parseable JWT, or claims missing/garbled.
    Malformed,
    /// Signature mismatch or a signing algorithm other than HS256.
    Signature,
    /// `exp` has passed.
    Expired,
    /// Valid token of the wrong kind (refresh where access is required, etc).
    UnexpectedType,
    /// Minting failed; only happens with a corrupt configuration.
    Signing(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::Signature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::UnexpectedType => write!(f, "Unexpected token type"),
            TokenError::Signing(msg) => write!(f, "Token signing failed: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

/// Mints and verifies bearer tokens. Read-only after construction.
pub struct TokenService {
    secret: Vec<u8>,
    access_expire_minutes: i64,
    refresh_expire_minutes: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Result<Self, ConfigError> {
        if config.secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        // Every issued token must expire strictly after it was issued.
        if config.access_expire_minutes <= 0 || config.refresh_expire_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "token lifetimes must be positive".to_string(),
            ));
        }
        Ok(Self {
            secret: config.secret.as_bytes().to_vec(),
            access_expire_minutes: config.access_expire_minutes,
            refresh_expire_minutes: config.refresh_expire_minutes,
        })
    }

    pub fn issue_access_token(&self, user_id: i64, username: &str) -> Result<String, TokenError> {
        self.sign(
            user_id,
            username,
            TOKEN_TYPE_ACCESS,
            now_timestamp(),
            self.access_expire_minutes,
        )
    }

    pub fn issue_refresh_token(&self, user_id: i64, username: &str) -> Result<String, TokenError> {
        self.sign(
            user_id,
            username,
            TOKEN_TYPE_REFRESH,
            now_timestamp(),
            self.refresh_expire_minutes,
        )
    }

    /// Mint an access token and a refresh token for the same identity.
    pub fn issue_pair(&self, user_id: i64, username: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id, username)?,
            refresh_token: self.issue_refresh_token(user_id, username)?,
        })
    }

    /// Verify signature, algorithm and expiry. Accepts either token type.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, now_timestamp())
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        expect_type(self.validate_token(token)?, TOKEN_TYPE_ACCESS)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        expect_type(self.validate_token(token)?, TOKEN_TYPE_REFRESH)
    }

    fn sign(
        &self,
        user_id: i64,
        username: &str,
        token_type: &str,
        issued_at: i64,
        lifetime_minutes: i64,
    ) -> Result<String, TokenError> {
        let expires_at = lifetime_minutes
            .checked_mul(60)
            .and_then(|secs| issued_at.checked_add(secs))
            .ok_or_else(|| TokenError::Signing("token lifetime overflow".to_string()))?;

        let claims = Claims {
            user_id,
            username: username.to_string(),
            token_type: token_type.to_string(),
            iat: to_claim_time(issued_at)?,
            exp: to_claim_time(expires_at)?,
        };

        encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn validate_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map_err(|e| {
                let err = match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        TokenError::Signature
                    }
                    _ => TokenError::Malformed,
                };
                debug!("validate_token: rejected ({})", err);
                err
            })?;

        // The library tolerates exp == now; a token is only valid strictly before exp.
        if token_data.claims.exp as i64 <= now {
            debug!("validate_token: rejected ({})", TokenError::Expired);
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims)
    }
}

fn expect_type(claims: Claims, token_type: &str) -> Result<Claims, TokenError> {
    if claims.token_type != token_type {
        debug!(
            "validate_token: expected {} token, got {}",
            token_type, claims.token_type
        );
        return Err(TokenError::UnexpectedType);
    }
    Ok(claims)
}

fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

fn to_claim_time(timestamp: i64) -> Result<usize, TokenError> {
    usize::try_from(timestamp)
        .map_err(|_| TokenError::Signing("timestamp out of range".to_string()))
}
