/// Admin panel endpoints
///
/// JSON record management over the four entity tables. Access requires
/// either the configured superadmin credentials or a user with the admin
/// role.
///
/// # Endpoints
///
/// - `POST /admin/login` - Start an admin session
/// - `GET  /admin/logout` - End it
/// - `GET  /admin` - Record counts
/// - `GET  /admin/:entity` - All records of `users`, `tasks`, `teams` or `meetings`
/// - `GET  /admin/:entity/:id` - One record
/// - `POST /admin/:entity/:id/delete` - Delete a record
/// - `POST /admin/users/:id/role` - Change a user's role

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, LOGIN_PATH},
    middleware::session::{removal_cookie, session_cookie, AdminSession, SUPERADMIN_SUBJECT},
    routes::forms::ValidForm,
};
use axum::{
    extract::{Path, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use teamdesk_shared::models::user::UserRole;
use tower_cookies::Cookies;
use tracing::{info, warn};
use validator::Validate;

/// Where a successful admin login lands
pub const ADMIN_PATH: &str = "/admin";

/// Tables managed by the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminEntity {
    Users,
    Tasks,
    Teams,
    Meetings,
}

impl AdminEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminEntity::Users => "users",
            AdminEntity::Tasks => "tasks",
            AdminEntity::Teams => "teams",
            AdminEntity::Meetings => "meetings",
        }
    }
}

impl fmt::Display for AdminEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminEntity {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(AdminEntity::Users),
            "tasks" => Ok(AdminEntity::Tasks),
            "teams" => Ok(AdminEntity::Teams),
            "meetings" => Ok(AdminEntity::Meetings),
            other => Err(ApiError::NotFound(format!("Unknown admin section: {}", other))),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminLoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleForm {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    /// Who is signed in to the panel
    pub admin: String,
    pub users: i64,
    pub tasks: i64,
    pub teams: i64,
    pub meetings: i64,
}

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub entity: &'static str,
    pub records: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct RecordPage {
    pub entity: &'static str,
    pub record: Value,
}

fn to_json<T: Serialize>(records: Vec<T>) -> ApiResult<Vec<Value>> {
    records
        .into_iter()
        .map(|record| {
            serde_json::to_value(record)
                .map_err(|e| ApiError::InternalError(format!("Failed to serialize record: {}", e)))
        })
        .collect()
}

fn to_record<T: Serialize>(record: Option<T>) -> ApiResult<Option<Value>> {
    Ok(to_json(record.into_iter().collect())?.pop())
}

fn missing(entity: AdminEntity, id: i64) -> ApiError {
    ApiError::NotFound(format!("No record {} in {}", id, entity))
}

/// `POST /admin/login`
///
/// The superadmin credentials from the environment are tried first, then an
/// admin user's email and password.
///
/// # Errors
///
/// - 401 for anything else; no cookie is set
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidForm(form): ValidForm<AdminLoginForm>,
) -> ApiResult<Redirect> {
    let is_superadmin = state
        .config
        .superadmin
        .as_ref()
        .map_or(false, |s| s.matches(&form.username, &form.password));

    let subject = if is_superadmin {
        SUPERADMIN_SUBJECT.to_string()
    } else {
        let user = state
            .users()
            .find_by_credentials(form.username.trim(), &form.password)
            .await?
            .filter(|user| user.is_admin())
            .ok_or_else(|| {
                warn!("Admin login rejected");
                ApiError::Unauthorized("Invalid admin credentials".to_string())
            })?;
        user.id.to_string()
    };

    let token = state.tokens.issue(&subject)?;
    cookies.add(session_cookie(
        &token,
        state.config.jwt.ttl_minutes,
        state.config.is_production(),
    ));

    info!(subject = %subject, "Admin logged in");
    Ok(Redirect::to(ADMIN_PATH))
}

/// `GET /admin/logout`
pub async fn logout(cookies: Cookies) -> Redirect {
    cookies.remove(removal_cookie());
    Redirect::to(LOGIN_PATH)
}

/// `GET /admin`
pub async fn dashboard(
    State(state): State<AppState>,
    session: AdminSession,
) -> ApiResult<Json<Dashboard>> {
    Ok(Json(Dashboard {
        admin: session.display_name(),
        users: state.users().count().await?,
        tasks: state.tasks().count().await?,
        teams: state.teams().count().await?,
        meetings: state.meetings().count().await?,
    }))
}

/// `GET /admin/:entity`
pub async fn list_records(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(entity): Path<String>,
) -> ApiResult<Json<RecordList>> {
    let entity: AdminEntity = entity.parse()?;

    let records = match entity {
        AdminEntity::Users => to_json(state.users().list_all().await?)?,
        AdminEntity::Tasks => to_json(state.tasks().list_all().await?)?,
        AdminEntity::Teams => to_json(state.teams().list_all().await?)?,
        AdminEntity::Meetings => to_json(state.meetings().list_all().await?)?,
    };

    Ok(Json(RecordList {
        entity: entity.as_str(),
        records,
    }))
}

/// `GET /admin/:entity/:id`
pub async fn show_record(
    State(state): State<AppState>,
    _session: AdminSession,
    Path((entity, id)): Path<(String, i64)>,
) -> ApiResult<Json<RecordPage>> {
    let entity: AdminEntity = entity.parse()?;

    let record = match entity {
        AdminEntity::Users => to_record(state.users().get(id).await?)?,
        AdminEntity::Tasks => to_record(state.tasks().get(id).await?)?,
        AdminEntity::Teams => to_record(state.teams().get(id).await?)?,
        AdminEntity::Meetings => to_record(state.meetings().get(id).await?)?,
    }
    .ok_or_else(|| missing(entity, id))?;

    Ok(Json(RecordPage {
        entity: entity.as_str(),
        record,
    }))
}

/// `POST /admin/:entity/:id/delete`
///
/// Teams and meetings go through their domain deletes so membership and
/// participant rows are removed in the same transaction.
pub async fn delete_record(
    State(state): State<AppState>,
    session: AdminSession,
    Path((entity, id)): Path<(String, i64)>,
) -> ApiResult<Redirect> {
    let entity: AdminEntity = entity.parse()?;

    let deleted = match entity {
        AdminEntity::Users => state.users().delete(id).await?,
        AdminEntity::Tasks => state.tasks().delete(id).await?,
        AdminEntity::Teams => state.teams().delete_team(id).await?,
        AdminEntity::Meetings => state.meetings().delete_meeting(id).await?,
    };
    if !deleted {
        return Err(missing(entity, id));
    }

    info!(entity = %entity, id, admin = %session.display_name(), "Record deleted from admin panel");
    Ok(Redirect::to(&format!("{}/{}", ADMIN_PATH, entity)))
}

/// `POST /admin/users/:id/role`
pub async fn set_role(
    State(state): State<AppState>,
    session: AdminSession,
    Path((entity, id)): Path<(String, i64)>,
    ValidForm(form): ValidForm<RoleForm>,
) -> ApiResult<Redirect> {
    let entity: AdminEntity = entity.parse()?;
    if entity != AdminEntity::Users {
        return Err(ApiError::NotFound(format!("{} have no role", entity)));
    }

    let role = form
        .role
        .parse::<UserRole>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user = state.users().set_role(id, role).await?;

    info!(user_id = user.id, role = %role, admin = %session.display_name(), "Role changed");
    Ok(Redirect::to(&format!("{}/{}/{}", ADMIN_PATH, entity, id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamdesk_shared::{
        models::{meeting::Meeting, user::User},
        repository::Entity,
    };

    #[test]
    fn test_entity_parsing() {
        for entity in [
            AdminEntity::Users,
            AdminEntity::Tasks,
            AdminEntity::Teams,
            AdminEntity::Meetings,
        ] {
            assert_eq!(entity.as_str().parse::<AdminEntity>().unwrap(), entity);
        }

        assert!(matches!(
            "task_chats".parse::<AdminEntity>(),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_entity_names_match_tables() {
        assert_eq!(AdminEntity::Users.as_str(), <User as Entity>::TABLE);
        assert_eq!(AdminEntity::Meetings.as_str(), <Meeting as Entity>::TABLE);
    }
}
