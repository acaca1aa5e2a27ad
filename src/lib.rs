//! Property-rental booking backend with Chapa payment reconciliation.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
