use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::NaiveDateTime;
use std::fmt;

// Известные физические аудитории. Новые добавляются миграцией (тип room_number в БД).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_number")]
pub enum Room {
    #[sqlx(rename = "117")]
    #[serde(rename = "117")]
    R117,
    #[sqlx(rename = "118")]
    #[serde(rename = "118")]
    R118,
    #[sqlx(rename = "204")]
    #[serde(rename = "204")]
    R204,
}

impl Room {
    pub const ALL: [Room; 3] = [Room::R117, Room::R118, Room::R204];
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::R117 => write!(f, "117"),
            Room::R118 => write!(f, "118"),
            Room::R204 => write!(f, "204"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Occupied,
    Reserved,
    Maintenance,
}

// Составной ключ места: номер + секция, уникален во всей системе
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatKey {
    pub number: i32,
    pub section: String,
}

impl SeatKey {
    pub fn new(number: i32, section: impl Into<String>) -> Self {
        Self { number, section: section.into() }
    }
}

impl fmt::Display for SeatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.section, self.number)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub number: i32,
    pub section: String,
    pub room_number: Room,
    pub status: SeatStatus,
    pub assigned_to: Option<String>,
    pub confirmed: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Seat {
    pub fn key(&self) -> SeatKey {
        SeatKey::new(self.number, self.section.clone())
    }

    pub fn is_free(&self) -> bool {
        self.assigned_to.is_none() && self.status == SeatStatus::Available
    }
}
