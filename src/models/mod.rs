//! Request-scoped models: authentication claims and server configuration.
pub mod auth;
pub mod config;
