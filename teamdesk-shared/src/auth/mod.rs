/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: signed, time-limited session tokens
/// - [`session`]: cookie session resolution and per-route policies
///
/// # Example
///
/// ```no_run
/// use teamdesk_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash));
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod password;
pub mod session;
