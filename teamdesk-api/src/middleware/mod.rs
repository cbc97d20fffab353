/// Middleware and request extractors for the API server
///
/// - `security`: security response headers
/// - `session`: cookie session extractors and cookie helpers

pub mod security;
pub mod session;
