use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::NaiveDateTime;
use std::fmt;

/// Приоритетная группа студента: 1 — самая срочная, 12 — общая очередь.
/// Диапазон дублируется CHECK-ограничением в БД.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct Priority(i16);

impl Priority {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 12;

    pub fn new(value: i16) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn get(self) -> i16 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_plain: Option<String>, // For testing only
    pub priority: Priority,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
    pub last_logged_in: NaiveDateTime,
}

impl User {
    // Проверить пароль (для хакатона используем plain password)
    pub fn verify_password(&self, password: &str) -> bool {
        if let Some(ref plain) = self.password_plain {
            plain == password
        } else {
            // В продакшене здесь был бы bcrypt
            false
        }
    }
}
