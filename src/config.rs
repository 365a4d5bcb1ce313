use log::warn;
use std::env;
use std::fs;

use crate::constants::{
    DEFAULT_ACCESS_EXPIRE_MINUTES, DEFAULT_DB_MAX_CONNECTIONS, DEFAULT_OTP_DIGITS,
    DEFAULT_PASSWORD_MIN_LENGTH, DEFAULT_REFRESH_EXPIRE_MINUTES, DEFAULT_REQUESTS_PER_MINUTE,
    DEFAULT_SERVICE_ADDRESS, MAX_OTP_DIGITS, MAX_PASSWORD_MIN_LENGTH,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub service_address: String,
    pub debug_mode: bool,
    pub cors_allowed_origins: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub rate_limiter: RateLimiterConfig,
    pub password: PasswordPolicy,
    pub otp: OtpPolicy,
}

/// Signing secret and the two independent token lifetimes.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_expire_minutes: i64,
    pub refresh_expire_minutes: i64,
}

// Hand-written so the secret never reaches a log line.
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_expire_minutes", &self.access_expire_minutes)
            .field("refresh_expire_minutes", &self.refresh_expire_minutes)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
}

/// Composition rules shared by password validation and generation.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub include_chars: bool,
    pub include_digits: bool,
    pub include_uppercase: bool,
    pub include_lowercase: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_PASSWORD_MIN_LENGTH,
            include_chars: true,
            include_digits: true,
            include_uppercase: true,
            include_lowercase: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub digits: u32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            digits: DEFAULT_OTP_DIGITS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingSecret,
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingSecret => write!(f, "JWT_SECRET must be set and non-empty"),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a JSON config file (if present) and environment variables.
/// Environment variables take precedence over config file values.
///
/// Config file path is read from `CONFIG_FILE` env var (default: `config.json`).
pub fn load_config() -> Result<Config, ConfigError> {
    let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string());
    let file_values: serde_json::Value = fs::read_to_string(&config_path)
        .ok()
        .and_then(|contents| serde_json::from_str(&contents).ok())
        .unwrap_or(serde_json::Value::Null);

    build_config(|key| env::var(key).ok(), &file_values)
}

/// Resolve every setting from `lookup_env` first, then `file_values`, then the default.
pub fn build_config<F>(lookup_env: F, file_values: &serde_json::Value) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let from_file = |key: &str| -> Option<String> {
        file_values.get(key).and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(_) | serde_json::Value::Bool(_) => Some(v.to_string()),
            _ => None,
        })
    };
    let setting = |env_key: &str, file_key: &str| lookup_env(env_key).or_else(|| from_file(file_key));

    let flag = |env_key: &str, file_key: &str, default: bool| -> bool {
        setting(env_key, file_key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(default)
    };

    let service_address = setting("SERVICE_ADDRESS", "service_address")
        .unwrap_or_else(|| DEFAULT_SERVICE_ADDRESS.to_string());

    let debug_mode = flag("DEBUG_MODE", "debug_mode", false);

    let cors_allowed_origins = setting("CORS_ALLOWED_ORIGINS", "cors_allowed_origins")
        .unwrap_or_else(|| "*".to_string());

    let database_url = setting("DATABASE_URL", "database_url").filter(|v| !v.is_empty());

    let db_max_connections = setting("DB_MAX_CONNECTIONS", "db_max_connections")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    let secret = setting("JWT_SECRET", "jwt_secret")
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingSecret)?;

    let access_expire_minutes = parse_setting(
        setting("JWT_ACCESS_EXPIRE_MINUTES", "jwt_access_expire_minutes"),
        "jwt_access_expire_minutes",
        DEFAULT_ACCESS_EXPIRE_MINUTES,
    )?;

    let refresh_expire_minutes = parse_setting(
        setting("JWT_REFRESH_EXPIRE_MINUTES", "jwt_refresh_expire_minutes"),
        "jwt_refresh_expire_minutes",
        DEFAULT_REFRESH_EXPIRE_MINUTES,
    )?;

    let rate_limiter = RateLimiterConfig {
        enabled: flag("RATE_LIMITER_ENABLED", "rate_limiter_enabled", true),
        requests_per_minute: parse_setting(
            setting("RATE_LIMITER_REQUESTS_PER_MIN", "rate_limiter_requests_per_min"),
            "rate_limiter_requests_per_min",
            DEFAULT_REQUESTS_PER_MINUTE,
        )?,
    };

    let password = PasswordPolicy {
        min_length: parse_setting(
            setting("PASSWORD_MIN_LENGTH", "password_min_length"),
            "password_min_length",
            DEFAULT_PASSWORD_MIN_LENGTH,
        )?,
        include_chars: flag("PASSWORD_INCLUDE_CHARS", "password_include_chars", true),
        include_digits: flag("PASSWORD_INCLUDE_DIGITS", "password_include_digits", true),
        include_uppercase: flag("PASSWORD_INCLUDE_UPPERCASE", "password_include_uppercase", true),
        include_lowercase: flag("PASSWORD_INCLUDE_LOWERCASE", "password_include_lowercase", true),
    };

    let otp = OtpPolicy {
        digits: parse_setting(
            setting("OTP_DIGITS", "otp_digits"),
            "otp_digits",
            DEFAULT_OTP_DIGITS,
        )?,
    };

    let config = Config {
        service_address,
        debug_mode,
        cors_allowed_origins,
        database_url,
        db_max_connections,
        jwt: JwtConfig {
            secret,
            access_expire_minutes,
            refresh_expire_minutes,
        },
        rate_limiter,
        password,
        otp,
    };

    config.validate()?;
    Ok(config)
}

fn parse_setting<T: std::str::FromStr>(
    raw: Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} is not a valid number", key))),
        None => Ok(default),
    }
}

impl Config {
    /// Reject settings the core cannot run with. Startup treats any error as fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.jwt.access_expire_minutes <= 0 || self.jwt.refresh_expire_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.jwt.refresh_expire_minutes <= self.jwt.access_expire_minutes {
            // Operator responsibility; the token service does not enforce it.
            warn!(
                "config: refresh token lifetime ({} min) is not longer than access token lifetime ({} min)",
                self.jwt.refresh_expire_minutes, self.jwt.access_expire_minutes
            );
        }
        if self.rate_limiter.enabled && self.rate_limiter.requests_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "rate_limiter_requests_per_min must be at least 1 when enabled".to_string(),
            ));
        }
        if self.password.min_length > MAX_PASSWORD_MIN_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "password_min_length must be at most {}",
                MAX_PASSWORD_MIN_LENGTH
            )));
        }
        if self.otp.digits == 0 || self.otp.digits > MAX_OTP_DIGITS {
            return Err(ConfigError::Invalid(format!(
                "otp_digits must be between 1 and {}",
                MAX_OTP_DIGITS
            )));
        }
        Ok(())
    }
}
