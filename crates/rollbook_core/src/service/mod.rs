//! Application state services.
//!
//! # Responsibility
//! - Hold UI-facing state derived from repository subscriptions.
//! - Keep frontends decoupled from storage and mapping details.

pub mod student_service;
