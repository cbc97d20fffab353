/// Database layer
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations
///
/// Entities and their queries live in [`crate::models`] on top of the generic
/// [`crate::repository::Repository`].

pub mod migrations;
pub mod pool;
