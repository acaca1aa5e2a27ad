//! Entities, invariants and ports. No I/O happens in this layer.

pub mod authorization;
pub mod booking;
pub mod gateway;
pub mod ids;
pub mod listing;
pub mod money;
pub mod payment;
pub mod ports;
pub mod review;
