/// Authentication endpoints
///
/// This module provides cookie-session authentication:
/// - Registration
/// - Login (sets the `access_token` cookie)
/// - Logout (clears it)
///
/// # Endpoints
///
/// - `GET  /auth/login` - Login page model
/// - `GET  /auth/register` - Registration page model
/// - `POST /auth/register` - Register new user
/// - `POST /auth/login` - Verify credentials and start a session
/// - `GET  /auth/logout` - End the session

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, LOGIN_PATH},
    middleware::session::{removal_cookie, session_cookie, MaybeUser},
    routes::forms::{blank_as_none, trimmed, ValidForm},
};
use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use teamdesk_shared::models::user::{NewUser, User, UserRole};
use tower_cookies::Cookies;
use tracing::{info, warn};
use validator::Validate;

/// Where a successful login lands
pub const PROFILE_PATH: &str = "/users/profile";

/// Query accepted by the form pages
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub error: Option<String>,
}

/// Model for the login and registration pages
#[derive(Debug, Serialize)]
pub struct FormPage {
    pub page: &'static str,
    pub error: Option<String>,

    /// Already signed-in user, if any
    pub user: Option<User>,
}

/// Register form
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 20, message = "Name must be 1-20 characters"))]
    pub name: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 30, message = "Last name must be 1-30 characters"))]
    pub lastname: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(
        email(message = "Invalid email format"),
        length(max = 100, message = "Email must be at most 100 characters")
    )]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password1: String,

    pub password2: String,

    /// One of `user`, `admin`, `manager`; defaults to `user`
    #[serde(default, deserialize_with = "blank_as_none")]
    pub role: Option<String>,
}

/// Login form
///
/// `username` carries the email, matching the OAuth2 password-form field
/// names browsers and clients already send.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// `GET /auth/login`
pub async fn login_page(MaybeUser(user): MaybeUser, Query(query): Query<PageQuery>) -> Json<FormPage> {
    Json(FormPage {
        page: "login",
        error: query.error,
        user,
    })
}

/// `GET /auth/register`
pub async fn register_page(
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Json<FormPage> {
    Json(FormPage {
        page: "register",
        error: query.error,
        user,
    })
}

/// Register endpoint
///
/// Creates a user with the requested role.
///
/// # Errors
///
/// - 400 when the passwords differ, the role is unknown, a field fails
///   validation or the email is already registered
///
/// # Example
///
/// ```text
/// POST /auth/register
/// Content-Type: application/x-www-form-urlencoded
///
/// name=Ann&lastname=Lee&email=ann%40example.com&password1=secret123&password2=secret123
/// ```
///
/// Response: `303 See Other`, `Location: /auth/login`
pub async fn register(
    State(state): State<AppState>,
    ValidForm(form): ValidForm<RegisterForm>,
) -> ApiResult<Redirect> {
    if form.password1 != form.password2 {
        return Err(ApiError::BadRequest("Passwords do not match".to_string()));
    }

    let role = match form.role.as_deref() {
        Some(role) => role
            .parse::<UserRole>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => UserRole::default(),
    };

    let user = state
        .users()
        .create_user(NewUser {
            name: form.name,
            lastname: form.lastname,
            email: form.email,
            password: form.password1,
            role,
        })
        .await?;

    info!(user_id = user.id, "Registration completed");
    Ok(Redirect::to(LOGIN_PATH))
}

/// Login endpoint
///
/// On success issues a token whose subject is the user id and stores it in
/// the HTTP-only `access_token` cookie.
///
/// # Errors
///
/// - 401 for an unknown email or a wrong password; no cookie is set
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidForm(form): ValidForm<LoginForm>,
) -> ApiResult<Redirect> {
    let user = state
        .users()
        .find_by_credentials(form.username.trim(), &form.password)
        .await?
        .ok_or_else(|| {
            warn!("Login rejected");
            ApiError::Unauthorized("Incorrect username or password".to_string())
        })?;

    let token = state.tokens.issue(&user.id.to_string())?;
    cookies.add(session_cookie(
        &token,
        state.config.jwt.ttl_minutes,
        state.config.is_production(),
    ));

    info!(user_id = user.id, "User logged in");
    Ok(Redirect::to(PROFILE_PATH))
}

/// `GET /auth/logout`
pub async fn logout(cookies: Cookies) -> Redirect {
    cookies.remove(removal_cookie());
    Redirect::to(LOGIN_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_form(password2: &str, email: &str) -> RegisterForm {
        RegisterForm {
            name: "Ann".to_string(),
            lastname: "Lee".to_string(),
            email: email.to_string(),
            password1: "secret123".to_string(),
            password2: password2.to_string(),
            role: None,
        }
    }

    #[test]
    fn test_register_form_validation() {
        assert!(register_form("secret123", "ann@example.com").validate().is_ok());
        assert!(register_form("secret123", "not-an-email").validate().is_err());

        let mut form = register_form("secret123", "ann@example.com");
        form.name = "a".repeat(21);
        assert!(form.validate().is_err());

        let mut form = register_form("short", "ann@example.com");
        form.password1 = "short".to_string();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_login_form_requires_fields() {
        let form = LoginForm {
            username: String::new(),
            password: "x".to_string(),
        };
        assert!(form.validate().is_err());
    }
}
