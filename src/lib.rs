//! Authentication service: signed session tokens, a bearer-token gate,
//! per-client rate limiting and secret generation behind a small HTTP API.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod secrets;
pub mod store;
pub mod token;
pub mod validate;
