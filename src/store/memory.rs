//! In-memory seat store for tests and single-node experiments.
//!
//! Mirrors the Postgres contract under one `tokio::sync::Mutex`: the
//! conditional acquire and the one-seat-per-holder check happen inside
//! a single critical section, which is exactly what the database gives
//! us with a conditional UPDATE plus a sparse unique index.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;

use crate::models::{Seat, SeatKey, SeatStatus, SchedulingWindow, User};

use super::{AcquireOutcome, SeatStore, StoreError};

#[derive(Debug, Default)]
struct InnerState {
    seats: HashMap<(i32, String), Seat>,
    users: HashMap<String, User>,
    windows: Vec<SchedulingWindow>,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySeatStore {
    state: Arc<Mutex<InnerState>>,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_seat(&self, seat: Seat) {
        let mut state = self.state.lock().await;
        state.seats.insert((seat.number, seat.section.clone()), seat);
    }

    pub async fn add_user(&self, user: User) {
        let mut state = self.state.lock().await;
        state.users.insert(user.user_id.clone(), user);
    }

    pub async fn add_window(&self, window: SchedulingWindow) {
        let mut state = self.state.lock().await;
        state.windows.push(window);
    }

    fn now() -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    async fn seat(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.seats.get(&(key.number, key.section.clone())).cloned())
    }

    async fn seat_held_by(&self, user_id: &str) -> Result<Option<Seat>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .seats
            .values()
            .find(|s| s.assigned_to.as_deref() == Some(user_id))
            .cloned())
    }

    async fn try_acquire(
        &self,
        key: &SeatKey,
        user_id: &str,
        confirmed: bool,
    ) -> Result<AcquireOutcome, StoreError> {
        let mut state = self.state.lock().await;

        // Условие проверяется раньше ограничения уникальности,
        // в том же порядке, что и у Postgres
        let free = state
            .seats
            .get(&(key.number, key.section.clone()))
            .is_some_and(|s| s.is_free());
        if !free {
            return Ok(AcquireOutcome::SeatTaken);
        }

        let already_holds = state
            .seats
            .values()
            .any(|s| s.assigned_to.as_deref() == Some(user_id));
        if already_holds {
            return Ok(AcquireOutcome::HolderConflict);
        }

        let seat = state
            .seats
            .get_mut(&(key.number, key.section.clone()))
            .expect("seat checked above");
        seat.assigned_to = Some(user_id.to_string());
        seat.confirmed = confirmed;
        seat.status = SeatStatus::Occupied;
        seat.updated_at = Self::now();
        Ok(AcquireOutcome::Acquired(seat.clone()))
    }

    async fn release(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(seat) = state.seats.get_mut(&(key.number, key.section.clone())) else {
            return Ok(None);
        };
        if seat.assigned_to.is_some() {
            seat.assigned_to = None;
            seat.status = SeatStatus::Available;
            seat.updated_at = Self::now();
        }
        seat.confirmed = false;
        Ok(Some(seat.clone()))
    }

    async fn confirm(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(seat) = state.seats.get_mut(&(key.number, key.section.clone())) else {
            return Ok(None);
        };
        if seat.assigned_to.is_none() {
            return Ok(None);
        }
        seat.confirmed = true;
        seat.updated_at = Self::now();
        Ok(Some(seat.clone()))
    }

    async fn user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(user_id).cloned())
    }

    async fn scheduling_windows(&self) -> Result<Vec<SchedulingWindow>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.windows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Room;

    fn seat(number: i32, section: &str) -> Seat {
        Seat {
            number,
            section: section.to_string(),
            room_number: Room::R117,
            status: SeatStatus::Available,
            assigned_to: None,
            confirmed: false,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    #[tokio::test]
    async fn test_conditional_acquire_fails_when_taken() {
        let store = MemorySeatStore::new();
        store.add_seat(seat(1, "A")).await;
        let key = SeatKey::new(1, "A");

        let first = store.try_acquire(&key, "alice", false).await.unwrap();
        assert!(matches!(first, AcquireOutcome::Acquired(_)));

        let second = store.try_acquire(&key, "bob", false).await.unwrap();
        assert!(matches!(second, AcquireOutcome::SeatTaken));
    }

    #[tokio::test]
    async fn test_holder_uniqueness_fires_on_second_seat() {
        let store = MemorySeatStore::new();
        store.add_seat(seat(1, "A")).await;
        store.add_seat(seat(2, "A")).await;

        let first = store
            .try_acquire(&SeatKey::new(1, "A"), "alice", false)
            .await
            .unwrap();
        assert!(matches!(first, AcquireOutcome::Acquired(_)));

        let second = store
            .try_acquire(&SeatKey::new(2, "A"), "alice", false)
            .await
            .unwrap();
        assert!(matches!(second, AcquireOutcome::HolderConflict));
    }

    #[tokio::test]
    async fn test_maintenance_seat_is_not_acquirable() {
        let store = MemorySeatStore::new();
        let mut s = seat(1, "A");
        s.status = SeatStatus::Maintenance;
        store.add_seat(s).await;

        let res = store
            .try_acquire(&SeatKey::new(1, "A"), "alice", false)
            .await
            .unwrap();
        assert!(matches!(res, AcquireOutcome::SeatTaken));
    }

    #[tokio::test]
    async fn test_release_clears_confirmation_and_keeps_markers() {
        let store = MemorySeatStore::new();
        store.add_seat(seat(1, "A")).await;
        let key = SeatKey::new(1, "A");

        store.try_acquire(&key, "alice", true).await.unwrap();
        let released = store.release(&key).await.unwrap().unwrap();
        assert!(released.assigned_to.is_none());
        assert!(!released.confirmed);
        assert_eq!(released.status, SeatStatus::Available);

        // Повторный release ничего не меняет
        let again = store.release(&key).await.unwrap().unwrap();
        assert!(again.assigned_to.is_none());
        assert_eq!(again.status, SeatStatus::Available);
    }
}
