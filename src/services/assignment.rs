//! assignment.rs
//!
//! Этот модуль реализует сервисный слой распределения мест.
//!
//! Ключевые компоненты:
//! 1.  **AssignmentService**: движок назначения. Оркестрирует проверку окна
//!     записи, рекомендательную проверку уже занятого места и атомарный
//!     условный захват в хранилище.
//! 2.  **AssignmentError**: полная таксономия исходов. Отказы политики и
//!     конфликты гонок ожидаемы и возвращаются вызывающему как есть, без
//!     повторов внутри движка.
//! 3.  **Caller**: разрешённая личность запроса (кто, группа, админ ли).
//!
//! Корректность при параллельных запросах держится ровно на двух гарантиях
//! хранилища: атомарности условного UPDATE и уникальности держателя места.
//! Предварительные SELECT здесь только ради внятных ответов пользователю.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::models::{select_active_window, Priority, Seat, SeatKey, SchedulingWindow};
use crate::policy::{AccessDecision, AccessPolicy};
use crate::store::{AcquireOutcome, SeatStore, StoreError};

/// Разрешённая личность вызывающего. Строится в транспортном слое
/// (Basic auth), движок заголовков не видит.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub priority: Priority,
    pub is_admin: bool,
}

#[derive(Debug, Error)]
pub enum AssignmentError {
    // --- отказы политики (рекомендательные) ---
    #[error("нет активного окна записи")]
    NoActiveWindow,
    #[error("окно записи закрыто")]
    WindowClosed,
    #[error("доступ в данное время закрыт")]
    OutsideAccessWindow,
    #[error("операция запрещена")]
    Forbidden,

    // --- конфликты, ожидаемые при гонках ---
    #[error("место уже занято")]
    SeatAlreadyTaken,
    #[error("за вами уже закреплено другое место")]
    AlreadyAssigned { held: Option<Seat> },
    #[error("за пользователем уже закреплено место")]
    UserAlreadyAssigned { held: Option<Seat> },

    // --- не найдено ---
    #[error("место не найдено")]
    SeatNotFound,
    #[error("пользователь не найден")]
    UserNotFound,
    #[error("место никому не назначено")]
    NotAssigned,

    // --- сбой хранилища ---
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn SeatStore>,
    policy: AccessPolicy,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn SeatStore>, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Активное окно записи (самое позднее из активных), если есть.
    pub async fn active_window(&self) -> Result<Option<SchedulingWindow>, AssignmentError> {
        let windows = self.store.scheduling_windows().await?;
        Ok(select_active_window(windows))
    }

    /// Место, закреплённое за пользователем, если есть.
    pub async fn held_seat(&self, user_id: &str) -> Result<Option<Seat>, AssignmentError> {
        Ok(self.store.seat_held_by(user_id).await?)
    }

    /// Попытка занять место. Для не-админов сначала проверяется окно записи
    /// и отсутствие уже закреплённого места; сам захват - один условный
    /// UPDATE, который и разрешает гонку за место.
    pub async fn acquire(
        &self,
        key: &SeatKey,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Seat, AssignmentError> {
        if !caller.is_admin {
            self.check_access(caller.priority, now).await?;
        }

        if self.store.seat(key).await?.is_none() {
            return Err(AssignmentError::SeatNotFound);
        }

        if !caller.is_admin {
            // Рекомендательная проверка: дружелюбный отказ с указанием
            // уже занятого места. Гонку она не закрывает.
            if let Some(held) = self.store.seat_held_by(&caller.user_id).await? {
                return Err(AssignmentError::AlreadyAssigned { held: Some(held) });
            }
        }

        match self
            .store
            .try_acquire(key, &caller.user_id, caller.is_admin)
            .await?
        {
            AcquireOutcome::Acquired(seat) => {
                info!("seat {} acquired by {}", key, caller.user_id);
                Ok(seat)
            }
            AcquireOutcome::SeatTaken => Err(AssignmentError::SeatAlreadyTaken),
            AcquireOutcome::HolderConflict => {
                // Проигравший гонку "тот же студент, два места":
                // перечитываем, какое место он успел получить
                let held = self.store.seat_held_by(&caller.user_id).await?;
                Err(AssignmentError::AlreadyAssigned { held })
            }
        }
    }

    /// Освободить место. Разрешено держателю и администратору. Повторный
    /// вызов на свободном месте ничего не меняет.
    pub async fn release(&self, key: &SeatKey, caller: &Caller) -> Result<Seat, AssignmentError> {
        let Some(seat) = self.store.seat(key).await? else {
            return Err(AssignmentError::SeatNotFound);
        };

        if !caller.is_admin && seat.assigned_to.as_deref() != Some(caller.user_id.as_str()) {
            return Err(AssignmentError::Forbidden);
        }

        let Some(seat) = self.store.release(key).await? else {
            return Err(AssignmentError::SeatNotFound);
        };
        info!("seat {} released by {}", key, caller.user_id);
        Ok(seat)
    }

    /// Административное подтверждение назначения.
    pub async fn confirm(&self, key: &SeatKey) -> Result<Seat, AssignmentError> {
        let Some(seat) = self.store.seat(key).await? else {
            return Err(AssignmentError::SeatNotFound);
        };
        if seat.assigned_to.is_none() {
            return Err(AssignmentError::NotAssigned);
        }

        match self.store.confirm(key).await? {
            Some(seat) => Ok(seat),
            // Место успели освободить между проверкой и записью
            None => Err(AssignmentError::NotAssigned),
        }
    }

    /// Административное назначение места произвольному пользователю в обход
    /// окна записи. Захват тем же условным UPDATE, что и обычный путь.
    pub async fn admin_assign(
        &self,
        key: &SeatKey,
        target_user_id: &str,
    ) -> Result<Seat, AssignmentError> {
        let Some(seat) = self.store.seat(key).await? else {
            return Err(AssignmentError::SeatNotFound);
        };
        if seat.assigned_to.is_some() {
            return Err(AssignmentError::SeatAlreadyTaken);
        }

        if self.store.user(target_user_id).await?.is_none() {
            return Err(AssignmentError::UserNotFound);
        }
        if let Some(held) = self.store.seat_held_by(target_user_id).await? {
            return Err(AssignmentError::UserAlreadyAssigned { held: Some(held) });
        }

        match self.store.try_acquire(key, target_user_id, false).await? {
            AcquireOutcome::Acquired(seat) => {
                info!("seat {} assigned to {} by admin", key, target_user_id);
                Ok(seat)
            }
            AcquireOutcome::SeatTaken => Err(AssignmentError::SeatAlreadyTaken),
            AcquireOutcome::HolderConflict => {
                let held = self.store.seat_held_by(target_user_id).await?;
                Err(AssignmentError::UserAlreadyAssigned { held })
            }
        }
    }

    /// Оценка допуска без попытки захвата (для отображения статуса клиенту).
    pub async fn check_access(
        &self,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<(), AssignmentError> {
        let Some(window) = self.active_window().await? else {
            return Err(AssignmentError::NoActiveWindow);
        };
        match self.policy.evaluate(priority, now, &window) {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::WindowClosed => Err(AssignmentError::WindowClosed),
            AccessDecision::OutsideAccessWindow => Err(AssignmentError::OutsideAccessWindow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Room, SeatStatus, User};
    use crate::store::MemorySeatStore;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone};
    use futures::future::join_all;

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

    fn user(id: &str, priority: i16, is_admin: bool) -> User {
        User {
            user_id: id.to_string(),
            display_name: id.to_string(),
            password_plain: Some("secret".to_string()),
            priority: Priority::new(priority).unwrap(),
            is_admin,
            created_at: NaiveDateTime::default(),
            last_logged_in: NaiveDateTime::default(),
        }
    }

    fn caller(id: &str, priority: i16, is_admin: bool) -> Caller {
        Caller {
            user_id: id.to_string(),
            priority: Priority::new(priority).unwrap(),
            is_admin,
        }
    }

    fn march_window() -> SchedulingWindow {
        SchedulingWindow {
            id: 1,
            title: "весенний набор".to_string(),
            base_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            active: true,
            created_at: NaiveDateTime::default(),
        }
    }

    // 2024-03-01 15:00 по Алматы: общий допуск открыт для всех групп
    fn open_hours() -> DateTime<Utc> {
        chrono_tz::Asia::Almaty
            .with_ymd_and_hms(2024, 3, 1, 15, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn service_with_window() -> (AssignmentService, Arc<MemorySeatStore>) {
        let store = Arc::new(MemorySeatStore::new());
        store.add_window(march_window()).await;
        let service = AssignmentService::new(
            store.clone(),
            AccessPolicy::new(chrono_tz::Asia::Almaty),
        );
        (service, store)
    }

    #[tokio::test]
    async fn test_acquire_rejected_before_common_access() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;

        // 14:59 местного: группа 1 ещё не допущена
        let early = chrono_tz::Asia::Almaty
            .with_ymd_and_hms(2024, 3, 1, 14, 59, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        let res = service
            .acquire(&SeatKey::new(1, "A"), &caller("u1", 1, false), early)
            .await;
        assert!(matches!(res, Err(AssignmentError::OutsideAccessWindow)));

        // В 15:00 та же попытка доходит до захвата
        let res = service
            .acquire(&SeatKey::new(1, "A"), &caller("u1", 1, false), open_hours())
            .await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_without_active_window() {
        let store = Arc::new(MemorySeatStore::new());
        store.add_seat(seat(1, "A")).await;
        let service = AssignmentService::new(
            store,
            AccessPolicy::new(chrono_tz::Asia::Almaty),
        );

        let res = service
            .acquire(&SeatKey::new(1, "A"), &caller("u1", 5, false), open_hours())
            .await;
        assert!(matches!(res, Err(AssignmentError::NoActiveWindow)));
    }

    #[tokio::test]
    async fn test_acquire_unknown_seat() {
        let (service, _store) = service_with_window().await;
        let res = service
            .acquire(&SeatKey::new(99, "Z"), &caller("u1", 5, false), open_hours())
            .await;
        assert!(matches!(res, Err(AssignmentError::SeatNotFound)));
    }

    #[tokio::test]
    async fn test_acquire_sets_pending_for_student_and_confirmed_for_admin() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;
        store.add_seat(seat(2, "A")).await;

        let s = service
            .acquire(&SeatKey::new(1, "A"), &caller("student", 5, false), open_hours())
            .await
            .unwrap();
        assert_eq!(s.assigned_to.as_deref(), Some("student"));
        assert!(!s.confirmed);
        assert_eq!(s.status, SeatStatus::Occupied);

        let s = service
            .acquire(&SeatKey::new(2, "A"), &caller("admin", 5, true), open_hours())
            .await
            .unwrap();
        assert!(s.confirmed);
    }

    #[tokio::test]
    async fn test_second_holder_gets_clean_conflict() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;

        service
            .acquire(&SeatKey::new(1, "A"), &caller("alice", 5, false), open_hours())
            .await
            .unwrap();
        let res = service
            .acquire(&SeatKey::new(1, "A"), &caller("bob", 5, false), open_hours())
            .await;
        assert!(matches!(res, Err(AssignmentError::SeatAlreadyTaken)));
    }

    #[tokio::test]
    async fn test_prior_holding_reported_with_location() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;
        store.add_seat(seat(2, "A")).await;

        service
            .acquire(&SeatKey::new(1, "A"), &caller("alice", 5, false), open_hours())
            .await
            .unwrap();
        let res = service
            .acquire(&SeatKey::new(2, "A"), &caller("alice", 5, false), open_hours())
            .await;
        match res {
            Err(AssignmentError::AlreadyAssigned { held: Some(held) }) => {
                assert_eq!(held.key(), SeatKey::new(1, "A"));
            }
            other => panic!("expected AlreadyAssigned, got {other:?}"),
        }

        // Второе место не пострадало
        let untouched = store.seat(&SeatKey::new(2, "A")).await.unwrap().unwrap();
        assert!(untouched.is_free());
    }

    #[tokio::test]
    async fn test_race_one_seat_many_callers() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;
        let service = Arc::new(service);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .acquire(
                            &SeatKey::new(1, "A"),
                            &caller(&format!("user-{i}"), 5, false),
                            open_hours(),
                        )
                        .await
                })
            })
            .collect();

        let results: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.expect("task panicked"))
            .collect();

        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(AssignmentError::SeatAlreadyTaken)))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 15);
    }

    #[tokio::test]
    async fn test_race_same_caller_two_seats() {
        // Гонка одного студента за два места: выигрывает ровно одна попытка,
        // вторая упирается в уникальность держателя
        for _ in 0..20 {
            let (service, store) = service_with_window().await;
            store.add_seat(seat(1, "A")).await;
            store.add_seat(seat(2, "A")).await;
            let service = Arc::new(service);

            let a = {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .acquire(&SeatKey::new(1, "A"), &caller("alice", 5, false), open_hours())
                        .await
                })
            };
            let b = {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .acquire(&SeatKey::new(2, "A"), &caller("alice", 5, false), open_hours())
                        .await
                })
            };

            let results = [a.await.unwrap(), b.await.unwrap()];
            let wins = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(wins, 1, "ровно одна из двух попыток должна пройти");
            assert!(results
                .iter()
                .all(|r| r.is_ok() || matches!(r, Err(AssignmentError::AlreadyAssigned { .. }))));

            let held = store.seat_held_by("alice").await.unwrap();
            assert!(held.is_some());
        }
    }

    #[tokio::test]
    async fn test_admin_bypasses_closed_window() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;

        // 2024-03-11: окно закрыто для всех групп
        let late = chrono_tz::Asia::Almaty
            .with_ymd_and_hms(2024, 3, 11, 9, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        let res = service
            .acquire(&SeatKey::new(1, "A"), &caller("student", 3, false), late)
            .await;
        assert!(matches!(res, Err(AssignmentError::WindowClosed)));

        let res = service
            .acquire(&SeatKey::new(1, "A"), &caller("admin", 3, true), late)
            .await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_release_owner_admin_and_stranger() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;
        let key = SeatKey::new(1, "A");

        service
            .acquire(&key, &caller("alice", 5, false), open_hours())
            .await
            .unwrap();

        let res = service.release(&key, &caller("bob", 5, false)).await;
        assert!(matches!(res, Err(AssignmentError::Forbidden)));

        let released = service.release(&key, &caller("alice", 5, false)).await.unwrap();
        assert!(released.assigned_to.is_none());
        assert!(!released.confirmed);

        // Повторный release (идемпотентность) доступен администратору
        let again = service.release(&key, &caller("admin", 5, true)).await.unwrap();
        assert!(again.assigned_to.is_none());
        assert_eq!(again.status, SeatStatus::Available);
    }

    #[tokio::test]
    async fn test_confirm_lifecycle() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;
        let key = SeatKey::new(1, "A");

        // Подтверждение пустого места отклоняется без изменений
        let res = service.confirm(&key).await;
        assert!(matches!(res, Err(AssignmentError::NotAssigned)));
        assert!(store.seat(&key).await.unwrap().unwrap().is_free());

        service
            .acquire(&key, &caller("alice", 5, false), open_hours())
            .await
            .unwrap();
        let confirmed = service.confirm(&key).await.unwrap();
        assert!(confirmed.confirmed);

        // Release сбрасывает подтверждение: инвариант confirmed => assigned
        let released = service.release(&key, &caller("alice", 5, false)).await.unwrap();
        assert!(!released.confirmed);
    }

    #[tokio::test]
    async fn test_admin_assign_paths() {
        let (service, store) = service_with_window().await;
        store.add_seat(seat(1, "A")).await;
        store.add_seat(seat(2, "A")).await;
        store.add_user(user("bob", 7, false)).await;

        let res = service.admin_assign(&SeatKey::new(1, "A"), "ghost").await;
        assert!(matches!(res, Err(AssignmentError::UserNotFound)));

        let assigned = service.admin_assign(&SeatKey::new(1, "A"), "bob").await.unwrap();
        assert_eq!(assigned.assigned_to.as_deref(), Some("bob"));
        assert!(!assigned.confirmed);

        let res = service.admin_assign(&SeatKey::new(1, "A"), "bob").await;
        assert!(matches!(res, Err(AssignmentError::SeatAlreadyTaken)));

        let res = service.admin_assign(&SeatKey::new(2, "A"), "bob").await;
        match res {
            Err(AssignmentError::UserAlreadyAssigned { held: Some(held) }) => {
                assert_eq!(held.key(), SeatKey::new(1, "A"));
            }
            other => panic!("expected UserAlreadyAssigned, got {other:?}"),
        }
    }
}
