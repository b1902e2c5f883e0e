//! Persistence seam for the assignment engine.
//!
//! The engine never talks to sqlx directly: everything goes through
//! [`SeatStore`], which promises two things the correctness argument
//! rests on:
//! - `try_acquire` is a single atomic conditional update, not a
//!   read-then-write;
//! - at most one seat per holder, enforced by the backend itself
//!   (a sparse unique constraint), surfaced as
//!   [`AcquireOutcome::HolderConflict`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Seat, SeatKey, SchedulingWindow, User};

pub use memory::MemorySeatStore;
pub use postgres::PgSeatStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of the atomic conditional acquire.
#[derive(Debug)]
pub enum AcquireOutcome {
    /// The condition held at update time; the seat now belongs to the caller.
    Acquired(Seat),
    /// The condition failed: the seat is held or not open for assignment.
    SeatTaken,
    /// The one-seat-per-holder constraint fired: the caller acquired
    /// another seat between the advisory pre-check and this write.
    HolderConflict,
}

#[async_trait]
pub trait SeatStore: Send + Sync {
    /// Point lookup by composite key.
    async fn seat(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError>;

    /// The seat currently held by `user_id`, if any. Advisory: callers must
    /// not treat this as a lock.
    async fn seat_held_by(&self, user_id: &str) -> Result<Option<Seat>, StoreError>;

    /// Atomically assign the seat to `user_id` if and only if it is still
    /// free and open for assignment at update time.
    async fn try_acquire(
        &self,
        key: &SeatKey,
        user_id: &str,
        confirmed: bool,
    ) -> Result<AcquireOutcome, StoreError>;

    /// Unconditionally clear the holder and the confirmation flag.
    /// Returns `None` when the seat does not exist; releasing an already
    /// free seat is a no-op returning the unchanged record.
    async fn release(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError>;

    /// Set `confirmed` if the seat is currently held. Returns `None` when
    /// the seat is missing or unheld at update time.
    async fn confirm(&self, key: &SeatKey) -> Result<Option<Seat>, StoreError>;

    async fn user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    /// Every configured scheduling window; selection happens in the engine.
    async fn scheduling_windows(&self) -> Result<Vec<SchedulingWindow>, StoreError>;
}
