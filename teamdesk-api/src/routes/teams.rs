/// Team endpoints
///
/// Team management is admin-only; any signed-in user may view a team page and
/// their own team.
///
/// # Endpoints
///
/// - `GET  /teams` - All teams (admin)
/// - `GET|POST /teams/create` - Create a team with initial members (admin)
/// - `GET  /teams/my_team` - The signed-in user's team
/// - `GET  /teams/:id` - Team with members and users available to add
/// - `POST /teams/:id/add_team_member` - Add or re-role a member (admin)
/// - `POST /teams/:id/delete_team_member` - Remove a member (admin)
/// - `POST /teams/:id/delete` - Delete the team (admin)
/// - `POST /teams/:id/rename` - Rename the team (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::{AdminUser, CurrentUser},
    routes::forms::{parse_id, FormFields, ValidForm},
};
use axum::{
    extract::{Path, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use teamdesk_shared::models::{
    team::{Team, TeamMember, TeamRole},
    user::User,
};
use tracing::info;
use validator::Validate;

/// Longest accepted team name
pub const TEAM_NAME_MAX: usize = 100;

#[derive(Debug, Serialize)]
pub struct TeamList {
    pub teams: Vec<Team>,
}

#[derive(Debug, Serialize)]
pub struct CreateTeamPage {
    pub users: Vec<User>,
}

/// Team page model
#[derive(Debug, Serialize)]
pub struct TeamPage {
    pub team: Team,
    pub members: Vec<TeamMember>,

    /// Users not yet in the team
    pub available_users: Vec<User>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MemberForm {
    pub user_id: i64,

    /// `staff` or `manager`; defaults to `staff`
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameForm {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

fn team_path(id: i64) -> String {
    format!("/teams/{}", id)
}

fn validate_team_name(name: &str) -> ApiResult<&str> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > TEAM_NAME_MAX {
        return Err(ApiError::BadRequest(format!(
            "Team name must be 1-{} characters",
            TEAM_NAME_MAX
        )));
    }
    Ok(name)
}

async fn team_page(state: &AppState, team: Team) -> ApiResult<TeamPage> {
    let members = state.teams().members(team.id).await?;
    let member_ids: HashSet<i64> = members.iter().map(|m| m.user_id).collect();

    let available_users = state
        .users()
        .list_all()
        .await?
        .into_iter()
        .filter(|user| !member_ids.contains(&user.id))
        .collect();

    Ok(TeamPage {
        team,
        members,
        available_users,
    })
}

async fn existing_team(state: &AppState, id: i64) -> ApiResult<Team> {
    state
        .teams()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Team {} not found", id)))
}

/// `GET /teams`
pub async fn list_teams(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Json<TeamList>> {
    Ok(Json(TeamList {
        teams: state.teams().list_all().await?,
    }))
}

/// `GET /teams/create`
pub async fn create_team_page(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Json<CreateTeamPage>> {
    Ok(Json(CreateTeamPage {
        users: state.users().list_all().await?,
    }))
}

/// `POST /teams/create`
///
/// Form: `name`, repeated `members` user ids. Members join as staff.
pub async fn create_team(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    form: FormFields,
) -> ApiResult<Redirect> {
    let name = validate_team_name(form.require("name")?)?;
    let members = form.ids("members")?;

    let team = state.teams().create_team(name, &members).await?;

    info!(team_id = team.id, admin_id = admin.id, "Team created via form");
    Ok(Redirect::to(&team_path(team.id)))
}

/// `GET /teams/my_team`
///
/// # Errors
///
/// - 404 when the user belongs to no team
pub async fn my_team(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<TeamPage>> {
    let team = state
        .teams()
        .team_for_user(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("You are not a member of any team".to_string()))?;

    Ok(Json(team_page(&state, team).await?))
}

/// `GET /teams/:id`
pub async fn team_detail(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<TeamPage>> {
    let team = existing_team(&state, id).await?;
    Ok(Json(team_page(&state, team).await?))
}

/// `POST /teams/:id/add_team_member`
pub async fn add_member(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
    ValidForm(form): ValidForm<MemberForm>,
) -> ApiResult<Redirect> {
    let role = match form.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(role) => role
            .parse::<TeamRole>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => TeamRole::default(),
    };

    state.teams().add_member(id, form.user_id, role).await?;
    Ok(Redirect::to(&team_path(id)))
}

/// `POST /teams/:id/delete_team_member`
pub async fn remove_member(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
    form: FormFields,
) -> ApiResult<Redirect> {
    let user_id = parse_id("user_id", form.require("user_id")?)?;

    if !state.teams().remove_member(id, user_id).await? {
        return Err(ApiError::NotFound(format!(
            "User {} is not a member of team {}",
            user_id, id
        )));
    }

    info!(team_id = id, user_id, "Team member removed");
    Ok(Redirect::to(&team_path(id)))
}

/// `POST /teams/:id/delete`
pub async fn delete_team(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Redirect> {
    if !state.teams().delete_team(id).await? {
        return Err(ApiError::NotFound(format!("Team {} not found", id)));
    }

    info!(team_id = id, admin_id = admin.id, "Team deleted via form");
    Ok(Redirect::to("/teams"))
}

/// `POST /teams/:id/rename`
pub async fn rename_team(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
    ValidForm(form): ValidForm<RenameForm>,
) -> ApiResult<Redirect> {
    let name = validate_team_name(&form.name)?;
    state.teams().rename(id, name).await?;

    Ok(Redirect::to(&team_path(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_team_name() {
        assert_eq!(validate_team_name("  Core  ").unwrap(), "Core");
        assert!(validate_team_name("   ").is_err());
        assert!(validate_team_name(&"x".repeat(101)).is_err());
        assert!(validate_team_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_rename_form_limits() {
        assert!(RenameForm { name: "x".repeat(100) }.validate().is_ok());
        assert!(RenameForm { name: "x".repeat(101) }.validate().is_err());
    }
}
