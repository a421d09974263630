//! Request forms parsed from multipart bodies and query strings.
pub mod main;
