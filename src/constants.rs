/// Default listen address.
pub const DEFAULT_SERVICE_ADDRESS: &str = "0.0.0.0:8080";

/// Default database connection pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Access token lifetime default: 15 minutes.
pub const DEFAULT_ACCESS_EXPIRE_MINUTES: i64 = 15;

/// Refresh token lifetime default: 7 days in minutes.
pub const DEFAULT_REFRESH_EXPIRE_MINUTES: i64 = 7 * 24 * 60;

/// Rate limit: default ceiling per client per minute.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Rate limit: idle buckets are dropped after this many seconds.
pub const RATE_LIMIT_BUCKET_TTL_SECS: u64 = 60;

/// Rate limit: fixed message returned with every 429.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Minimum password length default.
pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

/// Default OTP length.
pub const DEFAULT_OTP_DIGITS: u32 = 6;

/// Largest OTP length whose upper bound still fits a u64.
pub const MAX_OTP_DIGITS: u32 = 18;

/// Username length bounds for registration.
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum email address length per RFC 5321.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Token type string for access tokens.
pub const TOKEN_TYPE_ACCESS: &str = "access";

/// Token type string for refresh tokens.
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

// Character classes used by the password generator.
pub const LOWERCASE_CHARSET: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGIT_CHARSET: &str = "0123456789";
pub const SPECIAL_CHARSET: &str = "!@#$%&*";

/// Largest accepted password policy minimum length.
pub const MAX_PASSWORD_MIN_LENGTH: usize = 128;

/// Generated passwords are this much longer than the policy minimum.
pub const PASSWORD_EXTRA_LENGTH: usize = 2;

/// Per-class minimum counts for generated passwords.
pub const MIN_SPECIAL_CHARS: usize = 2;
pub const MIN_DIGIT_CHARS: usize = 3;
pub const MIN_UPPERCASE_CHARS: usize = 3;
pub const MIN_LOWERCASE_CHARS: usize = 3;
