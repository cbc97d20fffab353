/// User model and account operations
///
/// Users own tasks (as creator or performer), chat messages, team memberships
/// and meeting participations. Passwords are stored as Argon2id digests only.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(20) NOT NULL,
///     lastname VARCHAR(30) NOT NULL,
///     email VARCHAR(100) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'user'
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use teamdesk_shared::models::user::{NewUser, User, UserRole};
/// use teamdesk_shared::repository::Repository;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let users = Repository::<User>::new(pool);
///
/// let user = users
///     .create_user(NewUser {
///         name: "Ada".to_string(),
///         lastname: "Lovelace".to_string(),
///         email: "ada@example.com".to_string(),
///         password: "analytical-engine".to_string(),
///         role: UserRole::User,
///     })
///     .await?;
///
/// let found = users.find_by_credentials("ada@example.com", "analytical-engine").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::password::{hash_password, verify_password};
use crate::repository::{is_unique_violation, Entity, Fields, Repository, RepositoryError, SqlValue};

/// Account role
///
/// `Admin` unlocks the admin-gated pages; `Manager` may assign tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
    Manager,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Whether this role may create and assign tasks
    pub fn can_assign_tasks(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a role outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl From<UserRole> for SqlValue {
    fn from(role: UserRole) -> Self {
        SqlValue::Enum {
            type_name: "user_role",
            label: role.as_str(),
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub lastname: String,

    /// Unique across all users
    pub email: String,

    /// Argon2id digest, never serialized into page models
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub role: UserRole,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.lastname)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "lastname", "email", "password_hash", "role"];

    fn id(&self) -> i64 {
        self.id
    }
}

/// Input for registering a user; `password` is plaintext and hashed on insert
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

/// Partial profile update; only `Some` fields are written
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,

    /// New plaintext password, hashed before writing
    pub password: Option<String>,

    pub role: Option<UserRole>,
}

impl UpdateUser {
    fn into_fields(self) -> Result<Fields, RepositoryError> {
        let mut fields = Fields::new();
        if let Some(name) = self.name {
            fields.push("name", name);
        }
        if let Some(lastname) = self.lastname {
            fields.push("lastname", lastname);
        }
        if let Some(email) = self.email {
            fields.push("email", email);
        }
        if let Some(password) = self.password {
            fields.push("password_hash", hash_password(&password)?);
        }
        if let Some(role) = self.role {
            fields.push("role", role);
        }
        Ok(fields)
    }
}

impl Repository<User> {
    /// Finds a user by exact email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .filter(Fields::new().set("email", email))
            .await?
            .into_iter()
            .next())
    }

    /// First id in `ids` that names no user, if any
    pub async fn first_missing(&self, ids: &[i64]) -> Result<Option<i64>, RepositoryError> {
        if ids.is_empty() {
            return Ok(None);
        }
        let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.pool())
            .await?;
        Ok(ids.iter().copied().find(|id| !found.contains(id)))
    }

    /// Returns the user when `email` exists and `password` matches its digest
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let user = self.find_by_email(email).await?;
        Ok(user.filter(|u| verify_password(password, &u.password_hash)))
    }

    /// Registers a user, hashing the password
    ///
    /// # Errors
    ///
    /// `DuplicateEmail` when the email is taken, including when a concurrent
    /// registration wins the race and the unique index rejects the insert.
    pub async fn create_user(&self, data: NewUser) -> Result<User, RepositoryError> {
        if self.find_by_email(&data.email).await?.is_some() {
            return Err(RepositoryError::DuplicateEmail(data.email));
        }

        let fields = Fields::new()
            .set("name", data.name)
            .set("lastname", data.lastname)
            .set("email", data.email.clone())
            .set("password_hash", hash_password(&data.password)?)
            .set("role", data.role);

        match self.create(fields).await {
            Ok(user) => {
                info!(user_id = user.id, role = %user.role, "User registered");
                Ok(user)
            }
            Err(RepositoryError::Database(e)) if is_unique_violation(&e) => {
                Err(RepositoryError::DuplicateEmail(data.email))
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces the stored password digest
    pub async fn update_password(&self, id: i64, password: &str) -> Result<User, RepositoryError> {
        self.update(id, Fields::new().set("password_hash", hash_password(password)?))
            .await?
            .ok_or(RepositoryError::NotFound { entity: "User", id })
    }

    /// Applies a partial profile update
    ///
    /// # Errors
    ///
    /// `DuplicateEmail` when the new email belongs to another user,
    /// `NotFound` when `id` does not exist.
    pub async fn update_profile(&self, id: i64, data: UpdateUser) -> Result<User, RepositoryError> {
        if let Some(email) = data.email.as_deref() {
            if let Some(owner) = self.find_by_email(email).await? {
                if owner.id != id {
                    return Err(RepositoryError::DuplicateEmail(email.to_string()));
                }
            }
        }

        let email = data.email.clone();
        match self.update(id, data.into_fields()?).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(RepositoryError::NotFound { entity: "User", id }),
            Err(RepositoryError::Database(e)) if is_unique_violation(&e) => {
                Err(RepositoryError::DuplicateEmail(email.unwrap_or_default()))
            }
            Err(e) => Err(e),
        }
    }

    /// Sets the account role
    pub async fn set_role(&self, id: i64, role: UserRole) -> Result<User, RepositoryError> {
        self.update(id, Fields::new().set("role", role))
            .await?
            .ok_or(RepositoryError::NotFound { entity: "User", id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("user".parse::<UserRole>().unwrap(), UserRole::User);
        assert_eq!(" Admin ".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("MANAGER".parse::<UserRole>().unwrap(), UserRole::Manager);
        assert!("superuser".parse::<UserRole>().is_err());
        assert!("".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_permissions() {
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Manager.is_admin());
        assert!(UserRole::Manager.can_assign_tasks());
        assert!(UserRole::Admin.can_assign_tasks());
        assert!(!UserRole::User.can_assign_tasks());
        assert_eq!(UserRole::default(), UserRole::User);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: 1,
            name: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: UserRole::Manager,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "manager");
        assert_eq!(user.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_update_fields_only_include_set_values() {
        let fields = UpdateUser {
            name: Some("Grace".to_string()),
            role: Some(UserRole::Admin),
            ..Default::default()
        }
        .into_fields()
        .unwrap();

        assert_eq!(fields.columns().collect::<Vec<_>>(), vec!["name", "role"]);
        assert!(matches!(
            fields.get("role"),
            Some(SqlValue::Enum { type_name: "user_role", label: "admin" })
        ));
    }

    #[test]
    fn test_update_fields_hash_password() {
        let fields = UpdateUser {
            password: Some("new-password".to_string()),
            ..Default::default()
        }
        .into_fields()
        .unwrap();

        match fields.get("password_hash") {
            Some(SqlValue::Text(digest)) => assert!(verify_password("new-password", digest)),
            other => panic!("expected hashed password, got {:?}", other),
        }
    }
}
