//! KRA PIN Checker Relay Library
//!
//! Authenticates against the KRA API with OAuth2 client credentials, forwards
//! taxpayer PIN lookups and normalizes the checker's inconsistent responses
//! into a stable contract for the front-end.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and routes.
//! - `models`: Request, token and outcome types.
//! - `reduction`: Field-fallback reduction of checker responses.
//! - `relay`: Lookup relay (token, bounded call, reduction).
//! - `token_provider`: Client-credentials token exchange.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod reduction;
pub mod relay;
pub mod token_provider;
