use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{NaiveDate, NaiveDateTime};

/// Окно записи. Администрация может завести несколько окон,
/// авторитетным считается активное окно с самой поздней base_date.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SchedulingWindow {
    pub id: i64,
    pub title: String,
    pub base_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

// Выбор авторитетного окна из всех настроенных.
// При равных base_date берём окно с бОльшим id (заведённое позже).
pub fn select_active_window(windows: Vec<SchedulingWindow>) -> Option<SchedulingWindow> {
    windows
        .into_iter()
        .filter(|w| w.active)
        .max_by_key(|w| (w.base_date, w.id))
}
