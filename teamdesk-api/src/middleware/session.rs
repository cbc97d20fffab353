/// Session extractors
///
/// Handlers declare what session they need by taking one of these extractors:
///
/// - [`MaybeUser`]: session loaded when present, never required
/// - [`CurrentUser`]: any signed-in user, otherwise `303 /auth/login`
/// - [`AdminUser`]: a signed-in admin, otherwise 303 or `403`
/// - [`AdminSession`]: an admin user or the configured superadmin
///
/// All of them read the `access_token` cookie through `tower_cookies`, so the
/// router must carry a `CookieManagerLayer`.
///
/// # Example
///
/// ```no_run
/// use teamdesk_api::middleware::session::CurrentUser;
///
/// async fn profile(CurrentUser(user): CurrentUser) -> String {
///     user.full_name()
/// }
/// ```

use axum::{extract::FromRequestParts, http::request::Parts};
use teamdesk_shared::{
    auth::session::{bearer_token, SessionPolicy, BEARER_PREFIX},
    models::user::User,
};
use time::Duration;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use tracing::debug;

use crate::{app::AppState, error::ApiError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "access_token";

/// Token subject used for the configured superadmin
pub const SUPERADMIN_SUBJECT: &str = "superadmin";

/// Signed-in user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Signed-in user, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Signed-in user with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// Session accepted by the admin panel
#[derive(Debug, Clone)]
pub enum AdminSession {
    Superadmin,
    User(User),
}

impl AdminSession {
    /// Display name for the panel header
    pub fn display_name(&self) -> String {
        match self {
            AdminSession::Superadmin => SUPERADMIN_SUBJECT.to_string(),
            AdminSession::User(user) => user.full_name(),
        }
    }
}

/// Builds the session cookie for a freshly issued token
pub fn session_cookie(token: &str, ttl_minutes: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, format!("{}{}", BEARER_PREFIX, token)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::minutes(ttl_minutes))
        .build()
}

/// Cookie matching the session cookie's path, for removal
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

async fn cookie_value(parts: &mut Parts, state: &AppState) -> Result<Option<String>, ApiError> {
    let cookies = Cookies::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| ApiError::InternalError(msg.to_string()))?;

    Ok(cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string()))
}

async fn resolve(
    parts: &mut Parts,
    state: &AppState,
    policy: SessionPolicy,
) -> Result<Option<User>, ApiError> {
    let cookie = cookie_value(parts, state).await?;
    let user = policy
        .resolve(cookie.as_deref(), &state.tokens, &state.users())
        .await?;
    Ok(user)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state, SessionPolicy::OPTIONAL)
            .await
            .map(MaybeUser)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state, SessionPolicy::AUTHENTICATED)
            .await?
            .map(CurrentUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state, SessionPolicy::ADMIN)
            .await?
            .map(AdminUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // The superadmin has no user row; its subject is checked before the
        // numeric lookup.
        if state.config.superadmin.is_some() {
            let cookie = cookie_value(parts, state).await?;
            let subject = cookie
                .as_deref()
                .and_then(bearer_token)
                .and_then(|token| state.tokens.verify(token).ok());

            if subject.as_deref() == Some(SUPERADMIN_SUBJECT) {
                debug!("Superadmin session accepted");
                return Ok(AdminSession::Superadmin);
            }
        }

        let AdminUser(user) = AdminUser::from_request_parts(parts, state).await?;
        Ok(AdminSession::User(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc.def.ghi", 30, false);

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "Bearer abc.def.ghi");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(30)));
        assert_ne!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_secure_flag_in_production() {
        let cookie = session_cookie("abc", 5, true);
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_removal_cookie_matches_path() {
        let cookie = removal_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn test_admin_session_display_name() {
        assert_eq!(AdminSession::Superadmin.display_name(), "superadmin");
    }
}
