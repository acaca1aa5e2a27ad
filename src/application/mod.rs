//! Application layer containing the use cases.
//!
//! Services share one [`Store`](crate::domain::ports::Store) and open a unit
//! of work per call. [`engine::BookingEngine`] wires them together.

pub mod bookings;
pub mod engine;
pub mod lifecycle;
pub mod listings;
pub mod reconciliation;
pub mod repository;
pub mod reviews;
