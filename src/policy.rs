//! policy.rs
//!
//! Правила допуска к выбору места. Вся арифметика ведётся по настенным часам
//! одного фиксированного часового пояса, независимо от локали сервера.
//!
//! Как устроен допуск в день начала окна (base_date):
//! 1. После 23:59:59.999 последнего дня окна запись закрыта для всех.
//! 2. С 15:00 первого дня и до конца окна допускаются все группы без исключения.
//! 3. Группы 2..=11 дополнительно получают свой получасовой слот утром,
//!    по убыванию номера начиная с 10:00 (11 -> 10:00, 10 -> 10:30, ... 2 -> 14:30).
//! 4. Группы 1 и 12 своего слота не имеют и ждут общего допуска в 15:00.
//! 5. Администраторы этот модуль не проходят вообще (проверка выше по стеку).

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::{Priority, SchedulingWindow};

// Час общего допуска: с этого момента слоты не важны
const COMMON_ACCESS_TIME: (u32, u32) = (15, 0);
// Первый выделенный слот и его длительность
const FIRST_SLOT_TIME: (u32, u32) = (10, 0);
const SLOT_MINUTES: i64 = 30;
// Группы, имеющие собственный слот
const FIRST_SLOTTED: i16 = 11;
const LAST_SLOTTED: i16 = 2;

/// Вердикт оценки допуска. Все варианты кроме `Allowed` носят
/// рекомендательный характер: это не ошибки системы.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allowed,
    WindowClosed,
    OutsideAccessWindow,
}

#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    tz: Tz,
}

impl AccessPolicy {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Решает, может ли студент группы `priority` пытаться занять место
    /// в момент `now` при действующем окне `window`.
    pub fn evaluate(
        &self,
        priority: Priority,
        now: DateTime<Utc>,
        window: &SchedulingWindow,
    ) -> AccessDecision {
        // Все сравнения в настенном времени настроенного пояса
        let now_local = now.with_timezone(&self.tz).naive_local();

        let end_of_window = window
            .end_date
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap();
        if now_local > end_of_window {
            return AccessDecision::WindowClosed;
        }

        let (h, m) = COMMON_ACCESS_TIME;
        let common_access = window.base_date.and_hms_opt(h, m, 0).unwrap();
        if now_local >= common_access {
            return AccessDecision::Allowed;
        }

        if let Some((start, end)) = dedicated_slot(priority, window) {
            if now_local >= start && now_local < end {
                return AccessDecision::Allowed;
            }
        }

        AccessDecision::OutsideAccessWindow
    }
}

/// Выделенный получасовой слот группы в день base_date, если он есть.
/// Группы 1 и 12 (и любые вне таблицы) слота не имеют.
fn dedicated_slot(priority: Priority, window: &SchedulingWindow) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let p = priority.get();
    if !(LAST_SLOTTED..=FIRST_SLOTTED).contains(&p) {
        return None;
    }

    let (h, m) = FIRST_SLOT_TIME;
    let first = NaiveTime::from_hms_opt(h, m, 0).unwrap();
    let offset = Duration::minutes(SLOT_MINUTES * i64::from(FIRST_SLOTTED - p));
    let start = window.base_date.and_time(first) + offset;
    Some((start, start + Duration::minutes(SLOT_MINUTES)))
}
