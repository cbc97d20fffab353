/// Meeting endpoints
///
/// - `GET  /meetings` - All meetings plus the upcoming ones (admin)
/// - `GET|POST /meetings/create` - Schedule a meeting (admin)
/// - `GET  /meetings/:id` - Meeting with participants
/// - `POST /meetings/:id/add_meeting_member` (admin)
/// - `POST /meetings/:id/delete_meeting_member` (admin)
/// - `POST /meetings/:id/edit` (admin)
/// - `POST /meetings/:id/delete` (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::{AdminUser, CurrentUser},
    routes::forms::{blank_as_none, optional_datetime_local, parse_datetime_local, parse_id, FormFields, ValidForm},
};
use axum::{
    extract::{Path, State},
    response::Redirect,
    Json,
};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use teamdesk_shared::models::{
    meeting::{Meeting, UpdateMeeting},
    user::User,
};
use tracing::info;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct MeetingList {
    pub meetings: Vec<Meeting>,
    pub upcoming: Vec<Meeting>,
}

#[derive(Debug, Serialize)]
pub struct CreateMeetingPage {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct MeetingPage {
    pub meeting: Meeting,
    pub participants: Vec<User>,
    pub available_users: Vec<User>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditMeetingForm {
    /// Left blank to keep the current description
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "optional_datetime_local")]
    pub date: Option<NaiveDateTime>,
}

fn meeting_path(id: i64) -> String {
    format!("/meetings/{}", id)
}

async fn existing_meeting(state: &AppState, id: i64) -> ApiResult<Meeting> {
    state
        .meetings()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Meeting {} not found", id)))
}

/// `GET /meetings`
pub async fn list_meetings(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Json<MeetingList>> {
    let meetings = state.meetings();
    let now = Local::now().naive_local();

    Ok(Json(MeetingList {
        meetings: meetings.list_all().await?,
        upcoming: meetings.list_upcoming(now).await?,
    }))
}

/// `GET /meetings/create`
pub async fn create_meeting_page(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Json<CreateMeetingPage>> {
    Ok(Json(CreateMeetingPage {
        users: state.users().list_all().await?,
    }))
}

/// `POST /meetings/create`
///
/// Form: `description`, `date` (datetime-local), repeated `members` ids.
pub async fn create_meeting(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    form: FormFields,
) -> ApiResult<Redirect> {
    let description = form.require("description")?;
    if description.chars().count() > 2000 {
        return Err(ApiError::BadRequest(
            "Description must be at most 2000 characters".to_string(),
        ));
    }
    let date = parse_datetime_local(form.require("date")?)
        .ok_or_else(|| ApiError::BadRequest("date must be a valid date and time".to_string()))?;
    let members = form.ids("members")?;

    let meeting = state
        .meetings()
        .create_meeting(date, description, Some(admin.id), &members)
        .await?;

    Ok(Redirect::to(&meeting_path(meeting.id)))
}

/// `GET /meetings/:id`
pub async fn meeting_detail(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingPage>> {
    let meeting = existing_meeting(&state, id).await?;
    let participants = state.meetings().participants(id).await?;
    let taken: HashSet<i64> = participants.iter().map(|u| u.id).collect();

    let available_users = state
        .users()
        .list_all()
        .await?
        .into_iter()
        .filter(|user| !taken.contains(&user.id))
        .collect();

    Ok(Json(MeetingPage {
        meeting,
        participants,
        available_users,
    }))
}

/// `POST /meetings/:id/add_meeting_member`
pub async fn add_participant(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
    form: FormFields,
) -> ApiResult<Redirect> {
    let user_id = parse_id("user_id", form.require("user_id")?)?;
    state.meetings().add_participant(id, user_id).await?;

    Ok(Redirect::to(&meeting_path(id)))
}

/// `POST /meetings/:id/delete_meeting_member`
pub async fn remove_participant(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
    form: FormFields,
) -> ApiResult<Redirect> {
    let user_id = parse_id("user_id", form.require("user_id")?)?;

    if !state.meetings().remove_participant(id, user_id).await? {
        return Err(ApiError::NotFound(format!(
            "User {} is not a participant of meeting {}",
            user_id, id
        )));
    }

    Ok(Redirect::to(&meeting_path(id)))
}

/// `POST /meetings/:id/edit`
pub async fn edit_meeting(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    ValidForm(form): ValidForm<EditMeetingForm>,
) -> ApiResult<Redirect> {
    let update = UpdateMeeting {
        description: form.description,
        date: form.date,
    };
    state.meetings().edit_meeting(id, update).await?;

    info!(meeting_id = id, admin_id = admin.id, "Meeting edited");
    Ok(Redirect::to(&meeting_path(id)))
}

/// `POST /meetings/:id/delete`
pub async fn delete_meeting(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Redirect> {
    if !state.meetings().delete_meeting(id).await? {
        return Err(ApiError::NotFound(format!("Meeting {} not found", id)));
    }

    info!(meeting_id = id, admin_id = admin.id, "Meeting deleted via form");
    Ok(Redirect::to("/meetings"))
}
