/// Session resolution from the `access_token` cookie
///
/// A session is a cookie holding `Bearer <jwt>`. Resolving it verifies the
/// token, loads the user named by its subject and applies a
/// [`SessionPolicy`]. Any defect along the way (missing cookie, bad token,
/// unknown user) is treated the same as "no session".
///
/// # Example
///
/// ```no_run
/// use teamdesk_shared::auth::jwt::TokenIssuer;
/// use teamdesk_shared::auth::session::SessionPolicy;
/// use teamdesk_shared::models::user::User;
/// use teamdesk_shared::repository::Repository;
///
/// # async fn example(issuer: TokenIssuer, users: Repository<User>, cookie: Option<String>)
/// # -> Result<(), Box<dyn std::error::Error>> {
/// let user = SessionPolicy::AUTHENTICATED
///     .resolve(cookie.as_deref(), &issuer, &users)
///     .await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use tracing::debug;

use super::jwt::TokenIssuer;
use crate::models::user::User;
use crate::repository::{Repository, RepositoryError};

/// Prefix carried by the session cookie value
pub const BEARER_PREFIX: &str = "Bearer ";

/// Errors from session resolution
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Authentication is required and no valid session was found
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated, but the route requires the admin role
    #[error("Admin role required")]
    Forbidden,

    #[error("Failed to load session user: {0}")]
    Store(#[from] sqlx::Error),
}

/// Looks users up by id for session resolution
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<User>, sqlx::Error>;
}

#[async_trait]
impl CredentialStore for Repository<User> {
    async fn find_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        match self.get(id).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::Database(e)) => Err(e),
            Err(other) => Err(sqlx::Error::Protocol(other.to_string())),
        }
    }
}

/// Per-route session requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub require_auth: bool,
    pub require_admin: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::AUTHENTICATED
    }
}

impl SessionPolicy {
    /// Session is loaded when present, never required
    pub const OPTIONAL: Self = Self {
        require_auth: false,
        require_admin: false,
    };

    pub const AUTHENTICATED: Self = Self {
        require_auth: true,
        require_admin: false,
    };

    pub const ADMIN: Self = Self {
        require_auth: true,
        require_admin: true,
    };

    /// Resolves the session user from a raw cookie value
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` when `require_auth` is set and no user resolves
    /// - `Forbidden` when `require_admin` is set and the user is not an admin
    /// - `Store` when the user lookup itself fails
    pub async fn resolve<S>(
        &self,
        cookie: Option<&str>,
        tokens: &TokenIssuer,
        store: &S,
    ) -> Result<Option<User>, SessionError>
    where
        S: CredentialStore + ?Sized,
    {
        let user = match subject_id(cookie, tokens) {
            Some(id) => store.find_user(id).await?,
            None => None,
        };

        let Some(user) = user else {
            return if self.require_auth {
                Err(SessionError::Unauthenticated)
            } else {
                Ok(None)
            };
        };

        if self.require_admin && !user.is_admin() {
            debug!(user_id = user.id, "Admin route refused");
            return Err(SessionError::Forbidden);
        }

        Ok(Some(user))
    }
}

/// Extracts the bearer token from a cookie value
pub fn bearer_token(cookie: &str) -> Option<&str> {
    cookie
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verified subject of the cookie, when it is a numeric user id
fn subject_id(cookie: Option<&str>, tokens: &TokenIssuer) -> Option<i64> {
    let token = bearer_token(cookie?)?;
    let subject = match tokens.verify(token) {
        Ok(subject) => subject,
        Err(e) => {
            debug!(error = %e, "Session token rejected");
            return None;
        }
    };
    subject.parse().ok()
}
