/// Monthly calendar aggregation
///
/// Builds the calendar page for one user: a Monday-first grid of full weeks
/// for the requested month, each in-month day carrying that day's meetings and
/// open tasks, plus a seven-day upcoming list starting today.
///
/// Everything except [`load_calendar`] is pure and takes `today` explicitly.
///
/// # Example
///
/// ```
/// use teamdesk_shared::calendar::CalendarView;
/// use chrono::NaiveDate;
///
/// let today = NaiveDate::from_ymd_opt(2021, 2, 10).unwrap();
/// let view = CalendarView::build(2021, 2, today, &[], &[], &[], &[]).unwrap();
///
/// assert_eq!(view.weeks.len(), 4);
/// assert_eq!(view.upcoming.len(), 7);
/// ```

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::models::meeting::Meeting;
use crate::models::task::Task;
use crate::repository::{Repository, RepositoryError};

/// Longest event title shown in a calendar cell, in characters
pub const TITLE_LIMIT: usize = 30;

/// Years the calendar can be browsed in
pub const YEARS: RangeInclusive<i32> = 1..=9999;

/// Days covered by the upcoming list, today included
pub const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Invalid calendar month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Meeting,
    Task,
}

/// One entry in a day cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub title: String,

    /// `HH:MM`
    pub time: String,

    #[serde(rename = "type")]
    pub kind: EventKind,
}

impl CalendarEvent {
    fn new(description: &str, at: NaiveDateTime, kind: EventKind) -> Self {
        Self {
            title: truncate_title(description),
            time: at.format("%H:%M").to_string(),
            kind,
        }
    }
}

/// A grid cell; both fields are `None` for days outside the month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCell {
    pub date: Option<NaiveDate>,
    pub events: Option<Vec<CalendarEvent>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingDay {
    pub date: NaiveDate,

    /// `DD.MM.YYYY`
    pub label: String,

    pub events: Vec<CalendarEvent>,
}

/// Page model for the calendar view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarView {
    pub year: i32,
    pub month: u32,
    pub current_date: NaiveDate,
    pub today: NaiveDate,
    pub weeks: Vec<Vec<DayCell>>,
    pub upcoming: Vec<UpcomingDay>,
    pub prev_month: NaiveDate,
    pub next_month: NaiveDate,
}

impl CalendarView {
    /// Assembles the view from already-fetched events
    ///
    /// `month_*` are the events inside the requested month, `upcoming_*` those
    /// inside [`upcoming_range`] of `today`.
    pub fn build(
        year: i32,
        month: u32,
        today: NaiveDate,
        month_meetings: &[Meeting],
        month_tasks: &[Task],
        upcoming_meetings: &[Meeting],
        upcoming_tasks: &[Task],
    ) -> Result<Self, CalendarError> {
        let (first, _) = month_bounds(year, month)?;
        let (prev_month, next_month) = adjacent_months(first);

        let month_events = bucket_events(month_meetings, month_tasks);
        let upcoming_events = bucket_events(upcoming_meetings, upcoming_tasks);

        Ok(Self {
            year,
            month,
            current_date: first,
            today,
            weeks: month_grid(year, month, &month_events)?,
            upcoming: upcoming_days(today, &upcoming_events),
            prev_month,
            next_month,
        })
    }
}

/// Fetches the user's meetings and tasks and builds the view
pub async fn load_calendar(
    meetings: &Repository<Meeting>,
    tasks: &Repository<Task>,
    user_id: i64,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Result<CalendarView, CalendarError> {
    let (start, end) = month_range(year, month)?;
    let month_meetings = meetings.list_in_date_range(user_id, start, end).await?;
    let month_tasks = tasks.list_in_date_range(user_id, start, end).await?;

    let (start, end) = upcoming_range(today);
    let upcoming_meetings = meetings.list_in_date_range(user_id, start, end).await?;
    let upcoming_tasks = tasks.list_in_date_range(user_id, start, end).await?;

    CalendarView::build(
        year,
        month,
        today,
        &month_meetings,
        &month_tasks,
        &upcoming_meetings,
        &upcoming_tasks,
    )
}

/// First and last day of a month
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), CalendarError> {
    let invalid = || CalendarError::InvalidMonth { year, month };
    if !YEARS.contains(&year) {
        return Err(invalid());
    }

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next_first.pred_opt().ok_or_else(invalid)?;

    Ok((first, last))
}

/// `[first 00:00:00, last 23:59:59]` of a month
pub fn month_range(year: i32, month: u32) -> Result<(NaiveDateTime, NaiveDateTime), CalendarError> {
    let (first, last) = month_bounds(year, month)?;
    Ok((first.and_time(NaiveTime::MIN), end_of_day(last)))
}

/// `[today 00:00:00, today+6 23:59:59]`
pub fn upcoming_range(today: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let last = today + Duration::days(UPCOMING_DAYS - 1);
    (today.and_time(NaiveTime::MIN), end_of_day(last))
}

/// First days of the previous and the next month
///
/// Falls back to `first` itself at the edges of the representable range.
pub fn adjacent_months(first: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = first.with_day(1).unwrap_or(first);
    let prev = first.checked_sub_months(Months::new(1)).unwrap_or(first);
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
    (prev, next)
}

/// Groups events by calendar day, meetings before tasks within a day
pub fn bucket_events(meetings: &[Meeting], tasks: &[Task]) -> BTreeMap<NaiveDate, Vec<CalendarEvent>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<CalendarEvent>> = BTreeMap::new();

    for meeting in meetings {
        buckets
            .entry(meeting.date.date())
            .or_default()
            .push(CalendarEvent::new(&meeting.description, meeting.date, EventKind::Meeting));
    }
    for task in tasks {
        buckets
            .entry(task.deadline.date())
            .or_default()
            .push(CalendarEvent::new(&task.description, task.deadline, EventKind::Task));
    }

    buckets
}

/// Monday-first weeks covering the whole month
///
/// Each in-month day appears exactly once and always has an event list;
/// padding days from neighboring months have neither date nor events.
pub fn month_grid(
    year: i32,
    month: u32,
    events: &BTreeMap<NaiveDate, Vec<CalendarEvent>>,
) -> Result<Vec<Vec<DayCell>>, CalendarError> {
    let invalid = || CalendarError::InvalidMonth { year, month };
    let (first, last) = month_bounds(year, month)?;

    let start = first
        .checked_sub_days(Days::new(u64::from(first.weekday().num_days_from_monday())))
        .ok_or_else(invalid)?;
    let end = last
        .checked_add_days(Days::new(u64::from(6 - last.weekday().num_days_from_monday())))
        .ok_or_else(invalid)?;

    let mut weeks = Vec::new();
    let mut day = start;
    while day <= end {
        let mut week = Vec::with_capacity(7);
        for _ in 0..7 {
            week.push(if day.month() == month && day.year() == year {
                DayCell {
                    date: Some(day),
                    events: Some(events.get(&day).cloned().unwrap_or_default()),
                }
            } else {
                DayCell {
                    date: None,
                    events: None,
                }
            });
            day = day.succ_opt().ok_or_else(invalid)?;
        }
        weeks.push(week);
    }

    Ok(weeks)
}

/// Seven consecutive days from `today`, including days without events
pub fn upcoming_days(today: NaiveDate, events: &BTreeMap<NaiveDate, Vec<CalendarEvent>>) -> Vec<UpcomingDay> {
    (0..UPCOMING_DAYS)
        .map(|offset| {
            let date = today + Duration::days(offset);
            UpcomingDay {
                date,
                label: date.format("%d.%m.%Y").to_string(),
                events: events.get(&date).cloned().unwrap_or_default(),
            }
        })
        .collect()
}

/// First [`TITLE_LIMIT`] characters of a description
pub fn truncate_title(description: &str) -> String {
    description.chars().take(TITLE_LIMIT).collect()
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(23, 59, 59).unwrap_or_else(|| day.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::TaskStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    fn meeting(id: i64, description: &str, when: NaiveDateTime) -> Meeting {
        Meeting {
            id,
            description: description.to_string(),
            date: when,
            creator_id: Some(1),
        }
    }

    fn task(id: i64, description: &str, deadline: NaiveDateTime) -> Task {
        Task {
            id,
            creator_id: 1,
            performer_id: 2,
            description: description.to_string(),
            deadline,
            status: TaskStatus::Open,
            assessment: None,
            created_at: deadline,
        }
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(2024, 2).unwrap(), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(month_bounds(2025, 2).unwrap().1, date(2025, 2, 28));
        assert_eq!(month_bounds(2025, 12).unwrap().1, date(2025, 12, 31));
        assert_eq!(month_bounds(2025, 4).unwrap().1, date(2025, 4, 30));
    }

    #[test]
    fn test_invalid_month() {
        assert!(matches!(month_bounds(2025, 0), Err(CalendarError::InvalidMonth { .. })));
        assert!(matches!(month_bounds(2025, 13), Err(CalendarError::InvalidMonth { .. })));
    }

    #[test]
    fn test_years_outside_range_are_rejected() {
        let today = date(2025, 3, 9);
        for year in [-262143, -5000, 0, 10000, i32::MAX] {
            assert!(
                matches!(
                    CalendarView::build(year, 1, today, &[], &[], &[], &[]),
                    Err(CalendarError::InvalidMonth { .. })
                ),
                "{}",
                year
            );
            assert!(month_range(year, 1).is_err(), "{}", year);
        }
    }

    #[test]
    fn test_year_range_edges() {
        let today = date(2025, 3, 9);

        let first = CalendarView::build(1, 1, today, &[], &[], &[], &[]).unwrap();
        assert_eq!(first.next_month, date(1, 2, 1));
        assert_eq!(first.prev_month, date(0, 12, 1));

        let last = CalendarView::build(9999, 12, today, &[], &[], &[], &[]).unwrap();
        assert_eq!(last.prev_month, date(9999, 11, 1));
        assert_eq!(last.next_month, date(10000, 1, 1));
        assert!(last.weeks.iter().flatten().filter(|c| c.date.is_some()).count() == 31);
    }

    #[test]
    fn test_month_range_covers_whole_last_day() {
        let (start, end) = month_range(2025, 6).unwrap();
        assert_eq!(start, at(2025, 6, 1, 0, 0));
        assert_eq!(end, date(2025, 6, 30).and_hms_opt(23, 59, 59).unwrap());
    }

    #[test]
    fn test_grid_contains_each_day_once() {
        for (year, month) in [(2025, 2), (2024, 2), (2025, 6), (2025, 9), (2026, 3)] {
            let grid = month_grid(year, month, &BTreeMap::new()).unwrap();
            let (_, last) = month_bounds(year, month).unwrap();

            let dates: Vec<NaiveDate> = grid.iter().flatten().filter_map(|c| c.date).collect();
            assert_eq!(dates.len() as u32, last.day());
            for (i, d) in dates.iter().enumerate() {
                assert_eq!(d.day(), i as u32 + 1);
            }

            for cell in grid.iter().flatten() {
                assert_eq!(cell.date.is_none(), cell.events.is_none());
            }
            assert!(grid.iter().all(|week| week.len() == 7));
        }
    }

    #[test]
    fn test_grid_is_monday_first() {
        // 2025-06-01 is a Sunday
        let grid = month_grid(2025, 6, &BTreeMap::new()).unwrap();

        assert_eq!(grid.len(), 6);
        assert!(grid[0][..6].iter().all(|c| c.date.is_none()));
        assert_eq!(grid[0][6].date, Some(date(2025, 6, 1)));
        assert_eq!(grid[5][0].date, Some(date(2025, 6, 30)));
        assert!(grid[5][1..].iter().all(|c| c.date.is_none()));
    }

    #[test]
    fn test_february_starting_monday_fills_four_weeks() {
        // 2021-02-01 is a Monday and February 2021 has 28 days
        let grid = month_grid(2021, 2, &BTreeMap::new()).unwrap();
        assert_eq!(grid.len(), 4);
        assert!(grid.iter().flatten().all(|c| c.date.is_some()));
    }

    #[test]
    fn test_events_land_in_their_day_only() {
        let tasks = [task(1, "Ship release", at(2025, 6, 12, 17, 45))];
        let events = bucket_events(&[], &tasks);
        let grid = month_grid(2025, 6, &events).unwrap();

        for cell in grid.iter().flatten() {
            let Some(day) = cell.date else { continue };
            let events = cell.events.as_ref().unwrap();
            if day == date(2025, 6, 12) {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].time, "17:45");
                assert_eq!(events[0].kind, EventKind::Task);
            } else {
                assert!(events.is_empty(), "unexpected events on {}", day);
            }
        }
    }

    #[test]
    fn test_meetings_precede_tasks_within_a_day() {
        let meetings = [meeting(1, "Standup", at(2025, 6, 3, 10, 0))];
        let tasks = [task(1, "Morning task", at(2025, 6, 3, 8, 0))];
        let events = bucket_events(&meetings, &tasks);

        let day = &events[&date(2025, 6, 3)];
        assert_eq!(day[0].kind, EventKind::Meeting);
        assert_eq!(day[1].kind, EventKind::Task);
    }

    #[test]
    fn test_title_truncation_is_char_safe() {
        let long = "Подготовить квартальный отчёт для совета директоров";
        let title = truncate_title(long);
        assert_eq!(title.chars().count(), TITLE_LIMIT);
        assert!(long.starts_with(&title));

        assert_eq!(truncate_title("short"), "short");
    }

    #[test]
    fn test_upcoming_days_always_seven() {
        let today = date(2025, 12, 29);
        let meetings = [meeting(1, "Retro", at(2026, 1, 2, 15, 0))];
        let events = bucket_events(&meetings, &[]);
        let days = upcoming_days(today, &events);

        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, today);
        assert_eq!(days[6].date, date(2026, 1, 4));
        assert_eq!(days[4].label, "02.01.2026");
        assert_eq!(days[4].events.len(), 1);
        assert_eq!(days.iter().map(|d| d.events.len()).sum::<usize>(), 1);
    }

    #[test]
    fn test_upcoming_range() {
        let (start, end) = upcoming_range(date(2025, 3, 1));
        assert_eq!(start, at(2025, 3, 1, 0, 0));
        assert_eq!(end, date(2025, 3, 7).and_hms_opt(23, 59, 59).unwrap());
    }

    #[test]
    fn test_adjacent_months() {
        assert_eq!(adjacent_months(date(2025, 1, 1)), (date(2024, 12, 1), date(2025, 2, 1)));
        assert_eq!(adjacent_months(date(2025, 12, 1)), (date(2025, 11, 1), date(2026, 1, 1)));
        assert_eq!(adjacent_months(date(2025, 3, 1)), (date(2025, 2, 1), date(2025, 4, 1)));
    }

    #[test]
    fn test_build_view() {
        let today = date(2025, 6, 10);
        let month_meetings = [meeting(1, "Planning", at(2025, 6, 11, 9, 0))];
        let view = CalendarView::build(2025, 6, today, &month_meetings, &[], &month_meetings, &[]).unwrap();

        assert_eq!(view.current_date, date(2025, 6, 1));
        assert_eq!(view.prev_month, date(2025, 5, 1));
        assert_eq!(view.next_month, date(2025, 7, 1));
        assert_eq!(view.upcoming[1].events[0].title, "Planning");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["upcoming"][1]["events"][0]["type"], "meeting");
        assert!(json["weeks"][0][0]["date"].is_null());
    }
}
