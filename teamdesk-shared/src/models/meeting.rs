/// Meetings and their participants
///
/// Participants are keyed by `(meeting_id, user_id)`, so adding someone twice
/// is a no-op. Deleting a meeting removes its participant rows first.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE meetings (
///     id BIGSERIAL PRIMARY KEY,
///     description TEXT NOT NULL,
///     date TIMESTAMP NOT NULL,
///     creator_id BIGINT REFERENCES users(id) ON DELETE SET NULL
/// );
///
/// CREATE TABLE meeting_participants (
///     meeting_id BIGINT NOT NULL REFERENCES meetings(id),
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     PRIMARY KEY (meeting_id, user_id)
/// );
/// ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::team::dedup;
use super::user::User;
use crate::repository::{Entity, Fields, Repository, RepositoryError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Meeting {
    pub id: i64,
    pub description: String,
    pub date: NaiveDateTime,

    /// `None` once the creating user has been deleted
    pub creator_id: Option<i64>,
}

impl Entity for Meeting {
    const TABLE: &'static str = "meetings";
    const COLUMNS: &'static [&'static str] = &["id", "description", "date", "creator_id"];

    fn id(&self) -> i64 {
        self.id
    }
}

/// Partial meeting edit
#[derive(Debug, Clone, Default)]
pub struct UpdateMeeting {
    pub description: Option<String>,
    pub date: Option<NaiveDateTime>,
}

impl From<UpdateMeeting> for Fields {
    fn from(data: UpdateMeeting) -> Self {
        let mut fields = Fields::new();
        if let Some(description) = data.description {
            fields.push("description", description);
        }
        if let Some(date) = data.date {
            fields.push("date", date);
        }
        fields
    }
}

fn meeting_columns(alias: &str) -> String {
    Meeting::COLUMNS
        .iter()
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Repository<Meeting> {
    /// Creates a meeting and its participant rows in one transaction
    ///
    /// # Errors
    ///
    /// `UnknownMember` when a member id names no user; nothing is written.
    pub async fn create_meeting(
        &self,
        date: NaiveDateTime,
        description: &str,
        creator_id: Option<i64>,
        member_ids: &[i64],
    ) -> Result<Meeting, RepositoryError> {
        let member_ids = dedup(member_ids);
        if let Some(id) = Repository::<User>::new(self.pool().clone())
            .first_missing(&member_ids)
            .await?
        {
            return Err(RepositoryError::UnknownMember(id));
        }

        let mut tx = self.pool().begin().await?;

        let meeting = sqlx::query_as::<_, Meeting>(
            r#"
            INSERT INTO meetings (description, date, creator_id)
            VALUES ($1, $2, $3)
            RETURNING id, description, date, creator_id
            "#,
        )
        .bind(description)
        .bind(date)
        .bind(creator_id)
        .fetch_one(&mut *tx)
        .await?;

        for &user_id in &member_ids {
            sqlx::query("INSERT INTO meeting_participants (meeting_id, user_id) VALUES ($1, $2)")
                .bind(meeting.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(meeting_id = meeting.id, participants = member_ids.len(), "Meeting created");
        Ok(meeting)
    }

    /// Adds a participant; adding an existing participant changes nothing
    ///
    /// # Errors
    ///
    /// `NotFound` when the meeting or the user does not exist.
    pub async fn add_participant(&self, meeting_id: i64, user_id: i64) -> Result<(), RepositoryError> {
        if self.get(meeting_id).await?.is_none() {
            return Err(RepositoryError::NotFound { entity: "Meeting", id: meeting_id });
        }
        if Repository::<User>::new(self.pool().clone()).get(user_id).await?.is_none() {
            return Err(RepositoryError::NotFound { entity: "User", id: user_id });
        }

        sqlx::query(
            r#"
            INSERT INTO meeting_participants (meeting_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (meeting_id, user_id) DO NOTHING
            "#,
        )
        .bind(meeting_id)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Removes a participant; returns whether one was removed
    pub async fn remove_participant(&self, meeting_id: i64, user_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM meeting_participants WHERE meeting_id = $1 AND user_id = $2")
            .bind(meeting_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes participant rows, then the meeting, in one transaction
    pub async fn delete_meeting(&self, meeting_id: i64) -> Result<bool, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM meeting_participants WHERE meeting_id = $1")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM meetings WHERE id = $1")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(meeting_id, deleted = result.rows_affected() > 0, "Meeting deleted");
        Ok(result.rows_affected() > 0)
    }

    pub async fn edit_meeting(&self, meeting_id: i64, data: UpdateMeeting) -> Result<Meeting, RepositoryError> {
        self.update(meeting_id, data.into())
            .await?
            .ok_or(RepositoryError::NotFound { entity: "Meeting", id: meeting_id })
    }

    /// Participants of a meeting ordered by name
    pub async fn participants(&self, meeting_id: i64) -> Result<Vec<User>, RepositoryError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.lastname, u.email, u.password_hash, u.role
            FROM meeting_participants mp
            JOIN users u ON u.id = mp.user_id
            WHERE mp.meeting_id = $1
            ORDER BY u.name, u.lastname, u.id
            "#,
        )
        .bind(meeting_id)
        .fetch_all(self.pool())
        .await?;

        Ok(users)
    }

    /// Meetings strictly after `now`, soonest first
    pub async fn list_upcoming(&self, now: NaiveDateTime) -> Result<Vec<Meeting>, RepositoryError> {
        let meetings = sqlx::query_as::<_, Meeting>(&format!(
            "SELECT {} FROM meetings m WHERE m.date > $1 ORDER BY m.date, m.id",
            meeting_columns("m")
        ))
        .bind(now)
        .fetch_all(self.pool())
        .await?;

        Ok(meetings)
    }

    /// Meetings the user takes part in with a date in `[start, end]`
    pub async fn list_in_date_range(
        &self,
        user_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Meeting>, RepositoryError> {
        let meetings = sqlx::query_as::<_, Meeting>(&format!(
            r#"
            SELECT {} FROM meetings m
            JOIN meeting_participants mp ON mp.meeting_id = m.id
            WHERE mp.user_id = $1 AND m.date BETWEEN $2 AND $3
            ORDER BY m.date, m.id
            "#,
            meeting_columns("m")
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;

        Ok(meetings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_qualified_columns() {
        assert_eq!(
            meeting_columns("m"),
            "m.id, m.description, m.date, m.creator_id"
        );
    }

    #[test]
    fn test_update_meeting_fields() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let fields: Fields = UpdateMeeting {
            description: None,
            date: Some(date),
        }
        .into();

        assert_eq!(fields.columns().collect::<Vec<_>>(), vec!["date"]);
    }
}
