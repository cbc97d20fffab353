/// Profile endpoints for the signed-in user
///
/// - `GET  /users/profile` - Profile with the user's team
/// - `POST /users/edit` - Update name, email or password
/// - `POST /users/delete` - Delete the account after password confirmation

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, LOGIN_PATH},
    middleware::session::{removal_cookie, CurrentUser},
    routes::{
        auth::PROFILE_PATH,
        forms::{blank_as_none, trimmed, ValidForm},
    },
};
use axum::{extract::State, response::Redirect, Json};
use serde::{Deserialize, Serialize};
use teamdesk_shared::{
    auth::password::verify_password,
    models::{
        team::Team,
        user::{UpdateUser, User},
    },
};
use tower_cookies::Cookies;
use tracing::info;
use validator::Validate;

/// Profile page model
#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub user: User,
    pub team: Option<Team>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditProfileForm {
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

    /// Left blank to keep the current password
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteAccountForm {
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// `GET /users/profile`
pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<ProfilePage>> {
    let team = state.teams().team_for_user(user.id).await?;
    Ok(Json(ProfilePage { user, team }))
}

/// `POST /users/edit`
///
/// # Errors
///
/// - 400 when the new email belongs to another account or a field is invalid
pub async fn edit_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidForm(form): ValidForm<EditProfileForm>,
) -> ApiResult<Redirect> {
    let changed_password = form.new_password.is_some();

    state
        .users()
        .update_profile(
            user.id,
            UpdateUser {
                name: Some(form.name),
                lastname: Some(form.lastname),
                email: Some(form.email),
                password: form.new_password,
                role: None,
            },
        )
        .await?;

    info!(user_id = user.id, changed_password, "Profile updated");
    Ok(Redirect::to(PROFILE_PATH))
}

/// `POST /users/delete`
///
/// Deletes the account; tasks, chat messages and memberships go with it and
/// meetings it created lose their creator.
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    cookies: Cookies,
    ValidForm(form): ValidForm<DeleteAccountForm>,
) -> ApiResult<Redirect> {
    if !verify_password(&form.password, &user.password_hash) {
        return Err(ApiError::BadRequest("Incorrect password".to_string()));
    }

    state.users().delete(user.id).await?;
    cookies.remove(removal_cookie());

    info!(user_id = user.id, "Account deleted");
    Ok(Redirect::to(LOGIN_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_password_is_optional() {
        let form = EditProfileForm {
            name: "Ann".to_string(),
            lastname: "Lee".to_string(),
            email: "ann@example.com".to_string(),
            new_password: None,
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_short_new_password_rejected() {
        let form = EditProfileForm {
            name: "Ann".to_string(),
            lastname: "Lee".to_string(),
            email: "ann@example.com".to_string(),
            new_password: Some("short".to_string()),
        };
        assert!(form.validate().is_err());
    }
}
