/// Task endpoints
///
/// Tasks are visible to their creator and performer only. Admins and
/// managers create tasks; the creator edits, grades and deletes them; either
/// party may move the status and comment.
///
/// # Endpoints
///
/// - `GET  /tasks` - The user's tasks and average grade
/// - `GET|POST /tasks/create` - Create a task (admin or manager)
/// - `GET  /tasks/:id` - Task with creator, performer and comments
/// - `GET|POST /tasks/:id/edit` - Edit a task (creator)
/// - `POST /tasks/:id/delete` - Delete a task (creator)
/// - `GET|POST /tasks/:id/change_status?task_status=` - Move status
/// - `GET|POST /tasks/:id/change_assessment?assessment=` - Grade 1-5 (creator)
/// - `POST /tasks/:id/add_comment` - Post a chat message

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::CurrentUser,
    routes::forms::{datetime_local, trimmed, ValidForm},
};
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use teamdesk_shared::models::{
    task::{Task, TaskStatus, UpdateTask, UserTasks},
    task_chat::TaskComment,
    user::User,
};
use tracing::{info, warn};
use validator::Validate;

/// Lowest and highest grade
pub const ASSESSMENT_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

#[derive(Debug, Deserialize, Validate)]
pub struct TaskForm {
    /// Performer user id
    pub performer: i64,

    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,

    #[serde(deserialize_with = "datetime_local")]
    pub deadline: NaiveDateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditTaskForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,

    pub status: String,

    pub performer: i64,

    #[serde(deserialize_with = "datetime_local")]
    pub deadline: NaiveDateTime,

    /// Absent leaves the grade alone, blank clears it
    #[serde(default)]
    pub assessment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub task_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssessmentQuery {
    pub assessment: Option<String>,
}

/// Task creation page model
#[derive(Debug, Serialize)]
pub struct TaskFormPage {
    pub task: Option<Task>,
    pub users: Vec<User>,
}

/// Task detail page model
#[derive(Debug, Serialize)]
pub struct TaskDetail {
    pub task: Task,
    pub creator: Option<User>,
    pub performer: Option<User>,
    pub comments: Vec<TaskComment>,

    /// Whether the viewer created the task
    pub can_edit: bool,
}

/// Parses a 1-5 grade
pub fn parse_assessment(raw: &str) -> ApiResult<i32> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|grade| ASSESSMENT_RANGE.contains(grade))
        .ok_or_else(|| ApiError::BadRequest("Assessment must be an integer from 1 to 5".to_string()))
}

fn parse_status(raw: &str) -> ApiResult<TaskStatus> {
    raw.parse::<TaskStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Blank clears the grade; anything else must be a valid grade
fn parse_optional_assessment(raw: Option<&str>) -> ApiResult<Option<Option<i32>>> {
    match raw.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(grade) => parse_assessment(grade).map(|g| Some(Some(g))),
    }
}

fn task_path(id: i64) -> String {
    format!("/tasks/{}", id)
}

/// Loads a task the user takes part in
async fn visible_task(state: &AppState, id: i64, user: &User) -> ApiResult<Task> {
    let task = state
        .tasks()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", id)))?;

    if !task.involves(user.id) {
        warn!(task_id = id, user_id = user.id, "Task access refused");
        return Err(ApiError::Forbidden("Not a participant of this task".to_string()));
    }
    Ok(task)
}

/// Loads a task the user created
async fn owned_task(state: &AppState, id: i64, user: &User) -> ApiResult<Task> {
    let task = visible_task(state, id, user).await?;
    if task.creator_id != user.id {
        warn!(task_id = id, user_id = user.id, "Task change refused");
        return Err(ApiError::Forbidden("Only the task creator may do this".to_string()));
    }
    Ok(task)
}

fn ensure_can_assign(user: &User) -> ApiResult<()> {
    if user.role.can_assign_tasks() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin or manager role required".to_string()))
    }
}

/// `GET /tasks`
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<UserTasks>> {
    Ok(Json(state.tasks().list_for_user(user.id).await?))
}

/// `GET /tasks/create`
pub async fn create_task_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<TaskFormPage>> {
    ensure_can_assign(&user)?;

    Ok(Json(TaskFormPage {
        task: None,
        users: state.users().list_all().await?,
    }))
}

/// `POST /tasks/create`
///
/// # Errors
///
/// - 403 unless the user is an admin or manager
/// - 400 when the performer does not exist
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidForm(form): ValidForm<TaskForm>,
) -> ApiResult<Redirect> {
    ensure_can_assign(&user)?;

    state
        .tasks()
        .create_task(&user, form.performer, &form.description, form.deadline)
        .await?;

    Ok(Redirect::to("/tasks"))
}

/// `GET /tasks/:id`
pub async fn task_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskDetail>> {
    let task = visible_task(&state, id, &user).await?;

    let users = state.users();
    let creator = users.get(task.creator_id).await?;
    let performer = users.get(task.performer_id).await?;
    let comments = state.tasks().comments(task.id).await?;

    Ok(Json(TaskDetail {
        can_edit: task.creator_id == user.id,
        task,
        creator,
        performer,
        comments,
    }))
}

/// `GET /tasks/:id/edit`
pub async fn edit_task_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskFormPage>> {
    let task = owned_task(&state, id, &user).await?;

    Ok(Json(TaskFormPage {
        task: Some(task),
        users: state.users().list_all().await?,
    }))
}

/// `POST /tasks/:id/edit`
pub async fn edit_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    ValidForm(form): ValidForm<EditTaskForm>,
) -> ApiResult<Redirect> {
    owned_task(&state, id, &user).await?;

    let update = UpdateTask {
        description: Some(form.description),
        status: Some(parse_status(&form.status)?),
        performer_id: Some(form.performer),
        deadline: Some(form.deadline),
        assessment: parse_optional_assessment(form.assessment.as_deref())?,
    };
    state.tasks().update_task(id, update).await?;

    info!(task_id = id, user_id = user.id, "Task edited");
    Ok(Redirect::to(&task_path(id)))
}

/// `POST /tasks/:id/delete`
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Redirect> {
    owned_task(&state, id, &user).await?;
    state.tasks().delete(id).await?;

    info!(task_id = id, user_id = user.id, "Task deleted");
    Ok(Redirect::to("/tasks"))
}

/// `GET|POST /tasks/:id/change_status?task_status=in_work`
pub async fn change_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Redirect> {
    let raw = query
        .task_status
        .ok_or_else(|| ApiError::BadRequest("task_status is required".to_string()))?;
    let status = parse_status(&raw)?;

    visible_task(&state, id, &user).await?;
    state.tasks().update_status(id, status).await?;

    info!(task_id = id, user_id = user.id, status = %status, "Task status changed");
    Ok(Redirect::to(&task_path(id)))
}

/// `GET|POST /tasks/:id/change_assessment?assessment=4`
pub async fn change_assessment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<AssessmentQuery>,
) -> ApiResult<Redirect> {
    let grade = parse_assessment(query.assessment.as_deref().unwrap_or_default())?;

    owned_task(&state, id, &user).await?;
    state.tasks().update_assessment(id, grade).await?;

    info!(task_id = id, user_id = user.id, grade, "Task graded");
    Ok(Redirect::to(&task_path(id)))
}

/// `POST /tasks/:id/add_comment`
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    ValidForm(form): ValidForm<CommentForm>,
) -> ApiResult<Redirect> {
    visible_task(&state, id, &user).await?;
    state.tasks().add_comment(id, user.id, &form.message).await?;

    Ok(Redirect::to(&task_path(id)))
}
