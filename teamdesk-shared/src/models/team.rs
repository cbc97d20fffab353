/// Teams and team membership
///
/// Membership is a `user_teams` row carrying a per-team role. A user is
/// expected to be in at most one team; when several rows exist the earliest
/// one is treated as the user's team.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE team_role AS ENUM ('staff', 'manager');
///
/// CREATE TABLE teams (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL
/// );
///
/// CREATE TABLE user_teams (
///     id BIGSERIAL PRIMARY KEY,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     team_id BIGINT NOT NULL REFERENCES teams(id),
///     role team_role NOT NULL DEFAULT 'staff'
/// );
/// ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::user::{User, UserRole};
use crate::repository::{Entity, Fields, Repository, RepositoryError, SqlValue};

/// Role inside a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Staff,
    Manager,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Staff => "staff",
            TeamRole::Manager => "manager",
        }
    }
}

impl Default for TeamRole {
    fn default() -> Self {
        TeamRole::Staff
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown team role: {0}")]
pub struct UnknownTeamRole(pub String);

impl FromStr for TeamRole {
    type Err = UnknownTeamRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(TeamRole::Staff),
            "manager" => Ok(TeamRole::Manager),
            other => Err(UnknownTeamRole(other.to_string())),
        }
    }
}

impl From<TeamRole> for SqlValue {
    fn from(role: TeamRole) -> Self {
        SqlValue::Enum {
            type_name: "team_role",
            label: role.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

impl Entity for Team {
    const TABLE: &'static str = "teams";
    const COLUMNS: &'static [&'static str] = &["id", "name"];

    fn id(&self) -> i64 {
        self.id
    }
}

/// Membership row linking a user to a team
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserTeam {
    pub id: i64,
    pub user_id: i64,
    pub team_id: i64,
    pub role: TeamRole,
}

impl Entity for UserTeam {
    const TABLE: &'static str = "user_teams";
    const COLUMNS: &'static [&'static str] = &["id", "user_id", "team_id", "role"];

    fn id(&self) -> i64 {
        self.id
    }
}

/// A team member as listed on the team page
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub user_id: i64,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub user_role: UserRole,
    pub team_role: TeamRole,
}

impl Repository<Team> {
    /// Creates a team and adds `member_ids` as staff in one transaction
    ///
    /// # Errors
    ///
    /// `UnknownMember` when a member id names no user; nothing is written.
    pub async fn create_team(&self, name: &str, member_ids: &[i64]) -> Result<Team, RepositoryError> {
        let member_ids = dedup(member_ids);
        if let Some(id) = Repository::<User>::new(self.pool().clone())
            .first_missing(&member_ids)
            .await?
        {
            return Err(RepositoryError::UnknownMember(id));
        }

        let mut tx = self.pool().begin().await?;

        let team = sqlx::query_as::<_, Team>("INSERT INTO teams (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

        for &user_id in &member_ids {
            sqlx::query("INSERT INTO user_teams (user_id, team_id, role) VALUES ($1, $2, 'staff')")
                .bind(user_id)
                .bind(team.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(team_id = team.id, members = member_ids.len(), "Team created");
        Ok(team)
    }

    /// Adds a member, or updates the role of an existing one
    ///
    /// # Errors
    ///
    /// `NotFound` when the team or the user does not exist.
    pub async fn add_member(
        &self,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
    ) -> Result<UserTeam, RepositoryError> {
        if self.get(team_id).await?.is_none() {
            return Err(RepositoryError::NotFound { entity: "Team", id: team_id });
        }
        if Repository::<User>::new(self.pool().clone()).get(user_id).await?.is_none() {
            return Err(RepositoryError::NotFound { entity: "User", id: user_id });
        }

        let links = Repository::<UserTeam>::new(self.pool().clone());
        let existing = links
            .filter(Fields::new().set("team_id", team_id).set("user_id", user_id))
            .await?;

        let link = match existing.into_iter().next() {
            Some(link) => links
                .update(link.id, Fields::new().set("role", role))
                .await?
                .ok_or(RepositoryError::NotFound { entity: "UserTeam", id: link.id })?,
            None => {
                links
                    .create(
                        Fields::new()
                            .set("team_id", team_id)
                            .set("user_id", user_id)
                            .set("role", role),
                    )
                    .await?
            }
        };

        info!(team_id, user_id, role = %role, "Team member added");
        Ok(link)
    }

    /// Removes a member; returns whether a membership existed
    pub async fn remove_member(&self, team_id: i64, user_id: i64) -> Result<bool, RepositoryError> {
        let removed = Repository::<UserTeam>::new(self.pool().clone())
            .delete_where(Fields::new().set("team_id", team_id).set("user_id", user_id))
            .await?;
        Ok(removed > 0)
    }

    /// Deletes the team's memberships, then the team, in one transaction
    pub async fn delete_team(&self, team_id: i64) -> Result<bool, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM user_teams WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(team_id, deleted = result.rows_affected() > 0, "Team deleted");
        Ok(result.rows_affected() > 0)
    }

    pub async fn rename(&self, team_id: i64, name: &str) -> Result<Team, RepositoryError> {
        self.update(team_id, Fields::new().set("name", name))
            .await?
            .ok_or(RepositoryError::NotFound { entity: "Team", id: team_id })
    }

    /// Members of a team ordered by name
    pub async fn members(&self, team_id: i64) -> Result<Vec<TeamMember>, RepositoryError> {
        let members = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT u.id AS user_id, u.name, u.lastname, u.email,
                   u.role AS user_role, ut.role AS team_role
            FROM user_teams ut
            JOIN users u ON u.id = ut.user_id
            WHERE ut.team_id = $1
            ORDER BY u.name, u.lastname, u.id
            "#,
        )
        .bind(team_id)
        .fetch_all(self.pool())
        .await?;

        Ok(members)
    }

    /// The team of the user's earliest membership, if any
    pub async fn team_for_user(&self, user_id: i64) -> Result<Option<Team>, RepositoryError> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT t.id, t.name
            FROM user_teams ut
            JOIN teams t ON t.id = ut.team_id
            WHERE ut.user_id = $1
            ORDER BY ut.id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(team)
    }
}

/// Drops repeated ids while keeping first-seen order
pub(crate) fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut seen = Vec::with_capacity(ids.len());
    for &id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
