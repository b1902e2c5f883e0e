use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;

use crate::models::Priority;
use crate::services::assignment::Caller;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub display_name: String,
    pub priority: Priority,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id.clone(),
            priority: self.priority,
            is_admin: self.is_admin,
        }
    }
}

// Структура для результата из БД
#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    display_name: String,
    password_plain: Option<String>,
    priority: i16,
    is_admin: bool,
}

// Basic Auth extractor: логин - это идентификатор студента
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Проверяем что это Basic auth
        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Декодируем base64
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let credentials = String::from_utf8(decoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        // Разделяем user_id:password
        let mut parts = credentials.splitn(2, ':');
        let user_id = parts.next().ok_or(StatusCode::UNAUTHORIZED)?;
        let password = parts.next().ok_or(StatusCode::UNAUTHORIZED)?;

        // Проверяем в БД (без макросов)
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT user_id, display_name, password_plain, priority, is_admin
             FROM users
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let user = row.ok_or(StatusCode::UNAUTHORIZED)?;

        // Проверяем пароль (для хакатона используем password_plain)
        if user.password_plain != Some(password.to_string()) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let priority = Priority::new(user.priority).ok_or_else(|| {
            tracing::error!("user {} has priority {} outside 1..=12", user.user_id, user.priority);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        // Обновляем last_logged_in
        sqlx::query("UPDATE users SET last_logged_in = NOW() WHERE user_id = $1")
            .bind(&user.user_id)
            .execute(&state.db.pool)
            .await
            .ok(); // Игнорируем ошибку обновления

        Ok(AuthUser {
            user_id: user.user_id,
            display_name: user.display_name,
            priority,
            is_admin: user.is_admin,
        })
    }
}
