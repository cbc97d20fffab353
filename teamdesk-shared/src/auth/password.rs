/// Argon2id password digests
///
/// Digests are PHC strings carrying their own salt and cost parameters
/// (64 MiB, 3 passes, 4 lanes).
///
/// # Example
///
/// ```
/// use teamdesk_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("super_secret_password_123")?;
///
/// assert!(verify_password("super_secret_password_123", &hash));
/// assert!(!verify_password("wrong_password", &hash));
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::debug;

const MEMORY_KIB: u32 = 64 * 1024;
const PASSES: u32 = 3;
const LANES: u32 = 4;
const OUTPUT_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    Params(argon2::Error),

    #[error("Failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_KIB, PASSES, LANES, Some(OUTPUT_LEN))
        .map_err(PasswordError::Params)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` with a fresh salt into a PHC string such as
/// `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>`
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordError::Hash)?;

    Ok(digest.to_string())
}

/// Checks `password` against a stored PHC digest in constant time
///
/// A digest that cannot be parsed never matches.
///
/// ```
/// use teamdesk_shared::auth::password::verify_password;
///
/// assert!(!verify_password("password", "not-a-phc-string"));
/// ```
pub fn verify_password(password: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        debug!("Stored password digest is not a PHC string");
        return false;
    };

    // Cost parameters come from the digest itself.
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Compares two secrets without short-circuiting on the first differing byte
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_format() {
        let digest = hash_password("hunter2-but-longer").unwrap();

        assert!(digest.starts_with("$argon2id$v=19$m=65536,t=3,p=4$"));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(
            hash_password("same_password").unwrap(),
            hash_password("same_password").unwrap()
        );
    }

    #[test]
    fn test_verify_round_trip() {
        let digest = hash_password("correct_password").unwrap();

        assert!(verify_password("correct_password", &digest));
        assert!(!verify_password("wrong_password", &digest));
        assert!(!verify_password("", &digest));
    }

    #[test]
    fn test_verify_password_malformed_digest_is_mismatch() {
        assert!(!verify_password("password", "invalid_hash"));
        assert!(!verify_password("password", "$argon2id$invalid"));
        assert!(!verify_password("password", ""));
    }

    #[test]
    fn test_unicode_password() {
        let password = "unicode-密码-パスワード";
        let digest = hash_password(password).unwrap();
        assert!(verify_password(password, &digest));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("root-password", "root-password"));
        assert!(!constant_time_eq("root-password", "root-passwore"));
        assert!(!constant_time_eq("root", "root-password"));
        assert!(!constant_time_eq("", "a"));
        assert!(constant_time_eq("", ""));
    }
}
