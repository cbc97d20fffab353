/// Task model and task operations
///
/// A task is created by one user and assigned to another (the performer). It
/// moves freely between the three statuses; the creator may grade it with an
/// assessment from 1 to 5 once it exists.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('open', 'in_work', 'completed');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     creator_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     performer_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     description TEXT NOT NULL,
///     deadline TIMESTAMP NOT NULL,
///     status task_status NOT NULL DEFAULT 'open',
///     assessment INTEGER CHECK (assessment BETWEEN 1 AND 5),
///     created_at TIMESTAMP NOT NULL DEFAULT LOCALTIMESTAMP
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use teamdesk_shared::models::task::{Task, TaskStatus};
/// use teamdesk_shared::models::user::User;
/// use teamdesk_shared::repository::Repository;
/// use chrono::NaiveDate;
///
/// # async fn example(tasks: Repository<Task>, creator: User) -> Result<(), Box<dyn std::error::Error>> {
/// let deadline = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(18, 0, 0).unwrap();
/// let task = tasks.create_task(&creator, 7, "Write release notes", deadline).await?;
///
/// tasks.update_status(task.id, TaskStatus::InWork).await?;
/// let overview = tasks.list_for_user(creator.id).await?;
/// println!("average: {:?}", overview.average_assessment);
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::task_chat::{TaskChat, TaskComment};
use super::user::User;
use crate::repository::{Entity, Fields, Repository, RepositoryError, SqlValue};

/// Task progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InWork,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InWork => "in_work",
            TaskStatus::Completed => "completed",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Open
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "open" => Ok(TaskStatus::Open),
            "in_work" => Ok(TaskStatus::InWork),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl From<TaskStatus> for SqlValue {
    fn from(status: TaskStatus) -> Self {
        SqlValue::Enum {
            type_name: "task_status",
            label: status.as_str(),
        }
    }
}

/// Task row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub creator_id: i64,
    pub performer_id: i64,
    pub description: String,
    pub deadline: NaiveDateTime,
    pub status: TaskStatus,

    /// 1..=5, set by the creator after creation
    pub assessment: Option<i32>,

    pub created_at: NaiveDateTime,
}

impl Task {
    /// Whether `user_id` is the creator or the performer
    pub fn involves(&self, user_id: i64) -> bool {
        self.creator_id == user_id || self.performer_id == user_id
    }
}

impl Entity for Task {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "creator_id",
        "performer_id",
        "description",
        "deadline",
        "status",
        "assessment",
        "created_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

/// Partial task update; only `Some` fields are written
///
/// `assessment: Some(None)` clears the grade.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub performer_id: Option<i64>,
    pub deadline: Option<NaiveDateTime>,
    pub assessment: Option<Option<i32>>,
}

impl From<UpdateTask> for Fields {
    fn from(data: UpdateTask) -> Self {
        let mut fields = Fields::new();
        if let Some(description) = data.description {
            fields.push("description", description);
        }
        if let Some(status) = data.status {
            fields.push("status", status);
        }
        if let Some(performer_id) = data.performer_id {
            fields.push("performer_id", performer_id);
        }
        if let Some(deadline) = data.deadline {
            fields.push("deadline", deadline);
        }
        if let Some(assessment) = data.assessment {
            fields.push("assessment", assessment);
        }
        fields
    }
}

/// A user's tasks together with their average grade
#[derive(Debug, Clone, Serialize)]
pub struct UserTasks {
    pub tasks: Vec<Task>,

    /// Mean of the non-null assessments, rounded to two decimals
    pub average_assessment: Option<f64>,
}

/// Mean of the non-null assessments rounded to two decimals; `None` when no
/// task is graded
pub fn average_assessment(tasks: &[Task]) -> Option<f64> {
    let grades: Vec<i32> = tasks.iter().filter_map(|t| t.assessment).collect();
    if grades.is_empty() {
        return None;
    }

    let mean = grades.iter().map(|&g| f64::from(g)).sum::<f64>() / grades.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

fn task_columns() -> String {
    Task::COLUMNS.join(", ")
}

impl Repository<Task> {
    /// Creates an open task
    ///
    /// # Errors
    ///
    /// `InvalidPerformer` when `performer_id` names no user.
    pub async fn create_task(
        &self,
        creator: &User,
        performer_id: i64,
        description: &str,
        deadline: NaiveDateTime,
    ) -> Result<Task, RepositoryError> {
        self.ensure_performer(performer_id).await?;

        let task = self
            .create(
                Fields::new()
                    .set("creator_id", creator.id)
                    .set("performer_id", performer_id)
                    .set("description", description)
                    .set("deadline", deadline)
                    .set("status", TaskStatus::Open),
            )
            .await?;

        info!(task_id = task.id, creator_id = creator.id, performer_id, "Task created");
        Ok(task)
    }

    /// Tasks the user created or performs, with their average grade
    pub async fn list_for_user(&self, user_id: i64) -> Result<UserTasks, RepositoryError> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE creator_id = $1 OR performer_id = $1 ORDER BY deadline, id",
            task_columns()
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let average_assessment = average_assessment(&tasks);
        Ok(UserTasks {
            tasks,
            average_assessment,
        })
    }

    /// Unfinished tasks assigned to the user with a deadline in `[start, end]`
    pub async fn list_in_date_range(
        &self,
        user_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Task>, RepositoryError> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {} FROM tasks
            WHERE performer_id = $1
              AND deadline BETWEEN $2 AND $3
              AND status <> 'completed'
            ORDER BY deadline, id
            "#,
            task_columns()
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;

        Ok(tasks)
    }

    pub async fn update_status(&self, id: i64, status: TaskStatus) -> Result<Task, RepositoryError> {
        self.update(id, Fields::new().set("status", status))
            .await?
            .ok_or(RepositoryError::NotFound { entity: "Task", id })
    }

    pub async fn update_assessment(&self, id: i64, assessment: i32) -> Result<Task, RepositoryError> {
        self.update(id, Fields::new().set("assessment", assessment))
            .await?
            .ok_or(RepositoryError::NotFound { entity: "Task", id })
    }

    /// Applies an edit, validating a new performer first
    pub async fn update_task(&self, id: i64, data: UpdateTask) -> Result<Task, RepositoryError> {
        if let Some(performer_id) = data.performer_id {
            self.ensure_performer(performer_id).await?;
        }

        self.update(id, data.into())
            .await?
            .ok_or(RepositoryError::NotFound { entity: "Task", id })
    }

    /// Chat messages on a task with their authors, oldest first
    pub async fn comments(&self, task_id: i64) -> Result<Vec<TaskComment>, RepositoryError> {
        let comments = sqlx::query_as::<_, TaskComment>(
            r#"
            SELECT c.id, c.task_id, c.user_id,
                   u.name AS author_name, u.lastname AS author_lastname,
                   c.text, c.created_at
            FROM task_chats c
            JOIN users u ON u.id = c.user_id
            WHERE c.task_id = $1
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await?;

        Ok(comments)
    }

    /// Appends a chat message to a task
    pub async fn add_comment(
        &self,
        task_id: i64,
        user_id: i64,
        text: &str,
    ) -> Result<TaskChat, RepositoryError> {
        Repository::<TaskChat>::new(self.pool().clone())
            .create(
                Fields::new()
                    .set("task_id", task_id)
                    .set("user_id", user_id)
                    .set("text", text),
            )
            .await
    }

    async fn ensure_performer(&self, performer_id: i64) -> Result<(), RepositoryError> {
        let users = Repository::<User>::new(self.pool().clone());
        match users.get(performer_id).await? {
            Some(_) => Ok(()),
            None => Err(RepositoryError::InvalidPerformer(performer_id)),
        }
    }
}
