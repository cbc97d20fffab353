/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use teamdesk_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config)?;
/// let app = teamdesk_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use teamdesk_shared::{
    auth::jwt::{TokenError, TokenIssuer},
    models::{meeting::Meeting, task::Task, team::Team, user::User},
    repository::Repository,
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state
///
/// Cloned into each handler via Axum's `State` extractor; built once at
/// startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Session token issuer built from `config.jwt`
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    /// Creates new application state
    ///
    /// # Errors
    ///
    /// Fails when the configured token algorithm is not supported.
    pub fn new(db: PgPool, config: Config) -> Result<Self, TokenError> {
        let tokens = TokenIssuer::new(&config.token_settings())?;
        Ok(Self {
            db,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
        })
    }

    pub fn users(&self) -> Repository<User> {
        Repository::new(self.db.clone())
    }

    pub fn tasks(&self) -> Repository<Task> {
        Repository::new(self.db.clone())
    }

    pub fn teams(&self) -> Repository<Team> {
        Repository::new(self.db.clone())
    }

    pub fn meetings(&self) -> Repository<Meeting> {
        Repository::new(self.db.clone())
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /health
/// /auth/{login,register,logout}
/// /users/{profile,edit,delete}
/// /tasks[/create | /:id[/edit|/delete|/change_status|/change_assessment|/add_comment]]
/// /teams[/create | /my_team | /:id[/add_team_member|/delete_team_member|/delete|/rename]]
/// /meetings[/create | /:id[/add_meeting_member|/delete_meeting_member|/edit|/delete]]
/// /calendar
/// /admin[/login | /logout | /:entity[/:id[/delete|/role]]]
/// ```
///
/// Session checks happen per handler through the extractors in
/// [`crate::middleware::session`].
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route(
            "/login",
            get(routes::auth::login_page).post(routes::auth::login),
        )
        .route(
            "/register",
            get(routes::auth::register_page).post(routes::auth::register),
        )
        .route("/logout", get(routes::auth::logout));

    let user_routes = Router::new()
        .route("/profile", get(routes::users::profile))
        .route("/edit", post(routes::users::edit_profile))
        .route("/delete", post(routes::users::delete_account));

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list_tasks))
        .route(
            "/create",
            get(routes::tasks::create_task_page).post(routes::tasks::create_task),
        )
        .route("/:id", get(routes::tasks::task_detail))
        .route(
            "/:id/edit",
            get(routes::tasks::edit_task_page).post(routes::tasks::edit_task),
        )
        .route("/:id/delete", post(routes::tasks::delete_task))
        .route(
            "/:id/change_status",
            get(routes::tasks::change_status).post(routes::tasks::change_status),
        )
        .route(
            "/:id/change_assessment",
            get(routes::tasks::change_assessment).post(routes::tasks::change_assessment),
        )
        .route("/:id/add_comment", post(routes::tasks::add_comment));

    let team_routes = Router::new()
        .route("/", get(routes::teams::list_teams))
        .route(
            "/create",
            get(routes::teams::create_team_page).post(routes::teams::create_team),
        )
        .route("/my_team", get(routes::teams::my_team))
        .route("/:id", get(routes::teams::team_detail))
        .route("/:id/add_team_member", post(routes::teams::add_member))
        .route("/:id/delete_team_member", post(routes::teams::remove_member))
        .route("/:id/delete", post(routes::teams::delete_team))
        .route("/:id/rename", post(routes::teams::rename_team));

    let meeting_routes = Router::new()
        .route("/", get(routes::meetings::list_meetings))
        .route(
            "/create",
            get(routes::meetings::create_meeting_page).post(routes::meetings::create_meeting),
        )
        .route("/:id", get(routes::meetings::meeting_detail))
        .route("/:id/add_meeting_member", post(routes::meetings::add_participant))
        .route(
            "/:id/delete_meeting_member",
            post(routes::meetings::remove_participant),
        )
        .route("/:id/edit", post(routes::meetings::edit_meeting))
        .route("/:id/delete", post(routes::meetings::delete_meeting));

    let admin_routes = Router::new()
        .route("/", get(routes::admin::dashboard))
        .route("/login", post(routes::admin::login))
        .route("/logout", get(routes::admin::logout))
        .route("/:entity", get(routes::admin::list_records))
        .route("/:entity/:id", get(routes::admin::show_record))
        .route("/:entity/:id/delete", post(routes::admin::delete_record))
        .route("/:entity/:id/role", post(routes::admin::set_role));

    let production = state.config.is_production();

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/calendar", get(routes::calendar::calendar_view))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/tasks", task_routes)
        .nest("/teams", team_routes)
        .nest("/meetings", meeting_routes)
        .nest("/admin", admin_routes)
        .layer(CookieManagerLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
