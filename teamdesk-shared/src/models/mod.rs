/// Database models and their domain operations
///
/// Each model implements [`crate::repository::Entity`]; its entity-specific
/// queries are inherent methods on `Repository<Model>` in the same file.
///
/// # Models
///
/// - `user`: accounts, roles and credentials
/// - `task`: assigned work items with status and assessment
/// - `task_chat`: per-task discussion messages
/// - `team`: teams and `user_teams` memberships
/// - `meeting`: meetings and their participants
///
/// # Example
///
/// ```no_run
/// use teamdesk_shared::models::team::Team;
/// use teamdesk_shared::repository::Repository;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let teams = Repository::<Team>::new(pool);
/// let team = teams.create_team("Platform", &[1, 2, 3]).await?;
/// let members = teams.members(team.id).await?;
/// # Ok(())
/// # }
/// ```

pub mod meeting;
pub mod task;
pub mod task_chat;
pub mod team;
pub mod user;
