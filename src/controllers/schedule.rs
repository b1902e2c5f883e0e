use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;

use crate::policy::AccessDecision;
use crate::AppState;

use super::map_assignment_error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/schedule", get(current_schedule))
}

// GET /api/schedule - активное окно и вердикт допуска для вызывающего
async fn current_schedule(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let window = state
        .assignments
        .active_window()
        .await
        .map_err(map_assignment_error)?;

    let Some(window) = window else {
        return Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "window": null,
                "access": "no_active_window"
            })),
        ));
    };

    // Администраторы окно записи не проходят
    let access = if user.is_admin {
        AccessDecision::Allowed
    } else {
        state
            .assignments
            .policy()
            .evaluate(user.priority, Utc::now(), &window)
    };

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "window": window,
            "access": access
        })),
    ))
}
