pub mod admin;
pub mod schedule;
pub mod seats;

use axum::http::StatusCode;
use axum::Router;
use std::sync::Arc;

use crate::services::assignment::AssignmentError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(seats::routes())
        .merge(schedule::routes())
        .merge(admin::routes())
}

/* ---------- helpers ---------- */

pub(crate) fn status_419() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::CONFLICT)
}

// Единое отображение исходов движка в HTTP-ответы.
// Конфликты отдаём с кодом 419, отказы политики с 403.
pub(crate) fn map_assignment_error(err: AssignmentError) -> (StatusCode, String) {
    match err {
        AssignmentError::NoActiveWindow => {
            (StatusCode::FORBIDDEN, "Нет активного окна записи".to_string())
        }
        AssignmentError::WindowClosed => {
            (StatusCode::FORBIDDEN, "Окно записи закрыто".to_string())
        }
        AssignmentError::OutsideAccessWindow => (
            StatusCode::FORBIDDEN,
            "Доступ для вашей группы ещё не открыт".to_string(),
        ),
        AssignmentError::Forbidden => (
            StatusCode::FORBIDDEN,
            "Место не найдено или не принадлежит вам".to_string(),
        ),
        AssignmentError::SeatAlreadyTaken => (status_419(), "Место уже занято".to_string()),
        AssignmentError::AlreadyAssigned { held: Some(seat) } => (
            status_419(),
            format!(
                "За вами уже закреплено место {} (аудитория {})",
                seat.key(),
                seat.room_number
            ),
        ),
        AssignmentError::AlreadyAssigned { held: None } => (
            status_419(),
            "За вами уже закреплено другое место".to_string(),
        ),
        AssignmentError::UserAlreadyAssigned { held: Some(seat) } => (
            status_419(),
            format!(
                "За пользователем уже закреплено место {} (аудитория {})",
                seat.key(),
                seat.room_number
            ),
        ),
        AssignmentError::UserAlreadyAssigned { held: None } => (
            status_419(),
            "За пользователем уже закреплено другое место".to_string(),
        ),
        AssignmentError::SeatNotFound => (StatusCode::NOT_FOUND, "Место не найдено".to_string()),
        AssignmentError::UserNotFound => {
            (StatusCode::NOT_FOUND, "Пользователь не найден".to_string())
        }
        AssignmentError::NotAssigned => {
            (status_419(), "Место никому не назначено".to_string())
        }
        AssignmentError::Store(e) => {
            tracing::error!("store error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string())
        }
    }
}
