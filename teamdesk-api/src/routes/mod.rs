/// Route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login and logout
/// - `users`: The signed-in user's profile
/// - `tasks`: Tasks, grades and task chat
/// - `teams`: Teams and memberships
/// - `meetings`: Meetings and participants
/// - `calendar`: Monthly calendar
/// - `admin`: Record management panel
/// - `forms`: Form extraction helpers

pub mod admin;
pub mod auth;
pub mod calendar;
pub mod forms;
pub mod health;
pub mod meetings;
pub mod tasks;
pub mod teams;
pub mod users;
