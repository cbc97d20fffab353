/// Calendar endpoint
///
/// ```text
/// GET /calendar?year=2025&month=3
/// ```
///
/// Both parameters default to the current month in server-local time.

use crate::{app::AppState, error::ApiResult, middleware::session::CurrentUser};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use teamdesk_shared::calendar::{load_calendar, CalendarView};

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl CalendarQuery {
    /// Requested month, falling back to `today`'s
    pub fn resolve(&self, today: NaiveDate) -> (i32, u32) {
        (
            self.year.unwrap_or_else(|| today.year()),
            self.month.unwrap_or_else(|| today.month()),
        )
    }
}

/// `GET /calendar`
///
/// # Errors
///
/// - 400 for a month outside 1-12
pub async fn calendar_view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<Json<CalendarView>> {
    let today = Local::now().date_naive();
    let (year, month) = query.resolve(today);

    let view = load_calendar(
        &state.meetings(),
        &state.tasks(),
        user.id,
        year,
        month,
        today,
    )
    .await?;

    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_to_today() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        assert_eq!(CalendarQuery::default().resolve(today), (2025, 3));
        assert_eq!(
            CalendarQuery { year: Some(2024), month: None }.resolve(today),
            (2024, 3)
        );
        assert_eq!(
            CalendarQuery { year: None, month: Some(12) }.resolve(today),
            (2025, 12)
        );
    }
}
