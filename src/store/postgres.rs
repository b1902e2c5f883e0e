use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::models::{Seat, SeatKey, SchedulingWindow, User};

use super::{AcquireOutcome, SeatStore, StoreError};

// Имя частичного уникального индекса на seats.assigned_to (см. миграции).
// По нему отличаем гонку "один студент - два места" от прочих ошибок БД.
const HOLDER_UNIQ_CONSTRAINT: &str = "seats_assigned_to_uniq";

const SEAT_COLUMNS: &str =
    "number, section, room_number, status, assigned_to, confirmed, created_at, updated_at";

#[derive(Clone)]
pub struct PgSeatStore {
    pool: Pool<Postgres>,
}

impl PgSeatStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn is_holder_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.constraint() == Some(HOLDER_UNIQ_CONSTRAINT),
        _ => false,
    }
}

#[async_trait]
impl SeatStore for PgSeatStore {
    async fn seat(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError> {
        let seat = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE number = $1 AND section = $2"
        ))
        .bind(key.number)
        .bind(&key.section)
        .fetch_optional(&self.pool)
        .await?;
        Ok(seat)
    }

    async fn seat_held_by(&self, user_id: &str) -> Result<Option<Seat>, StoreError> {
        let seat = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE assigned_to = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(seat)
    }

    async fn try_acquire(
        &self,
        key: &SeatKey,
        user_id: &str,
        confirmed: bool,
    ) -> Result<AcquireOutcome, StoreError> {
        // Единственный шаг, разрешающий гонки: условный UPDATE одним
        // запросом. Если условие не прошло, строка не меняется.
        let res = sqlx::query_as::<_, Seat>(&format!(
            r#"
            UPDATE seats
            SET assigned_to = $1, confirmed = $2, status = 'occupied', updated_at = NOW()
            WHERE number = $3 AND section = $4
              AND assigned_to IS NULL AND status = 'available'
            RETURNING {SEAT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(confirmed)
        .bind(key.number)
        .bind(&key.section)
        .fetch_optional(&self.pool)
        .await;

        match res {
            Ok(Some(seat)) => Ok(AcquireOutcome::Acquired(seat)),
            Ok(None) => Ok(AcquireOutcome::SeatTaken),
            Err(e) if is_holder_unique_violation(&e) => {
                tracing::warn!(
                    "holder uniqueness violation for user {} on seat {}: concurrent acquire lost",
                    user_id,
                    key
                );
                Ok(AcquireOutcome::HolderConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError> {
        // Статус возвращаем в available только если место было занято:
        // административные пометки (maintenance и т.п.) не трогаем
        let seat = sqlx::query_as::<_, Seat>(&format!(
            r#"
            UPDATE seats
            SET assigned_to = NULL,
                confirmed = FALSE,
                status = CASE WHEN assigned_to IS NULL THEN status ELSE 'available'::seat_status END,
                updated_at = NOW()
            WHERE number = $1 AND section = $2
            RETURNING {SEAT_COLUMNS}
            "#
        ))
        .bind(key.number)
        .bind(&key.section)
        .fetch_optional(&self.pool)
        .await?;
        Ok(seat)
    }

    async fn confirm(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError> {
        let seat = sqlx::query_as::<_, Seat>(&format!(
            r#"
            UPDATE seats
            SET confirmed = TRUE, updated_at = NOW()
            WHERE number = $1 AND section = $2 AND assigned_to IS NOT NULL
            RETURNING {SEAT_COLUMNS}
            "#
        ))
        .bind(key.number)
        .bind(&key.section)
        .fetch_optional(&self.pool)
        .await?;
        Ok(seat)
    }

    async fn user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, display_name, password_plain, priority, is_admin, created_at, last_logged_in
             FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn scheduling_windows(&self) -> Result<Vec<SchedulingWindow>, StoreError> {
        let windows = sqlx::query_as::<_, SchedulingWindow>(
            "SELECT id, title, base_date, end_date, active, created_at
             FROM scheduling_windows
             ORDER BY base_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(windows)
    }
}
