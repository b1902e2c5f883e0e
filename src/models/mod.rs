pub mod seat;
pub mod user;
pub mod schedule;

pub use seat::{Room, Seat, SeatKey, SeatStatus};
pub use user::{Priority, User};
pub use schedule::{select_active_window, SchedulingWindow};
