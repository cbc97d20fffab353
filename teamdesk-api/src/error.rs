/// Error handling for the API server
///
/// Handlers return `Result<T, ApiError>`; the error renders either as a JSON
/// [`ErrorResponse`] with a matching status code or, for a missing session, as
/// a `303 See Other` redirect to the login page.
///
/// # Example
///
/// ```
/// use teamdesk_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(id: i64) -> ApiResult<Json<Value>> {
///     if id <= 0 {
///         return Err(ApiError::NotFound(format!("Task {} not found", id)));
///     }
///     Ok(Json(json!({ "id": id })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use teamdesk_shared::{
    auth::{jwt::TokenError, password::PasswordError, session::SessionError},
    calendar::CalendarError,
    repository::{is_foreign_key_violation, is_unique_violation, RepositoryError},
};

/// Where unauthenticated requests are sent
pub const LOGIN_PATH: &str = "/auth/login";

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Form validation failed (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// No valid session; redirects to the login page (303)
    Unauthenticated,

    /// Credentials rejected (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "forbidden")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Unauthenticated => write!(f, "Authentication required"),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Unauthenticated => return Redirect::to(LOGIN_PATH).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return ApiError::NotFound("Resource not found".to_string());
        }
        if is_unique_violation(&err) {
            return ApiError::BadRequest("Record already exists".to_string());
        }
        if is_foreign_key_violation(&err) {
            return ApiError::BadRequest("Referenced record does not exist".to_string());
        }
        ApiError::InternalError(format!("Database error: {}", err))
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => e.into(),
            RepositoryError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            RepositoryError::DuplicateEmail(_)
            | RepositoryError::InvalidPerformer(_)
            | RepositoryError::UnknownMember(_) => {
                ApiError::BadRequest(err.to_string())
            }
            RepositoryError::UnknownColumn { .. } | RepositoryError::Password(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthenticated => ApiError::Unauthenticated,
            SessionError::Forbidden => ApiError::Forbidden("Admin role required".to_string()),
            SessionError::Store(e) => e.into(),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::InternalError(format!("Token operation failed: {}", err))
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<CalendarError> for ApiError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::InvalidMonth { .. } => ApiError::BadRequest(err.to_string()),
            CalendarError::Repository(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", field)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Task 4 not found".to_string());
        assert_eq!(err.to_string(), "Not found: Task 4 not found");
    }

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        let response = ApiError::Unauthenticated.into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), LOGIN_PATH);
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::ValidationError(vec![]), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_domain_error_mapping() {
        assert!(matches!(
            ApiError::from(RepositoryError::DuplicateEmail("a@b.c".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(RepositoryError::InvalidPerformer(9)),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(RepositoryError::UnknownMember(987654321)),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(RepositoryError::NotFound { entity: "Task", id: 1 }),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(SessionError::Forbidden),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(SessionError::Unauthenticated),
            ApiError::Unauthenticated
        ));
        assert!(matches!(
            ApiError::from(CalendarError::InvalidMonth { year: 2025, month: 13 }),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(sqlx::Error::RowNotFound),
            ApiError::NotFound(_)
        ));
    }
}
