/// Task discussion messages
///
/// Append-only. Messages are readable only by the task's creator and
/// performer; that rule is enforced by the handlers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::repository::Entity;

/// One chat message on a task
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskChat {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub text: String,
    pub created_at: NaiveDateTime,
}

impl Entity for TaskChat {
    const TABLE: &'static str = "task_chats";
    const COLUMNS: &'static [&'static str] = &["id", "user_id", "task_id", "text", "created_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

/// A chat message joined with its author, as shown on the task page
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskComment {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub author_lastname: String,
    pub text: String,
    pub created_at: NaiveDateTime,
}
