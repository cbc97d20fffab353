//! # TeamDesk Shared Library
//!
//! Domain types, persistence and business logic used by the TeamDesk API
//! server.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, session tokens and session resolution
//! - `db`: connection pool and migrations
//! - `repository`: generic CRUD repository over entity tables
//! - `models`: entities and their domain operations
//! - `calendar`: monthly calendar aggregation

pub mod auth;
pub mod calendar;
pub mod db;
pub mod models;
pub mod repository;

/// Current version of the TeamDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
