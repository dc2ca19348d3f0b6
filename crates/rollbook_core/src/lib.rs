//! Core data layer for Rollbook.
//! This crate owns the student roster: durable storage, domain mapping and
//! the shared live-list state consumed by UI frontends.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::student::{ParseStudentIdError, Student, StudentId};
pub use repo::student_repo::{RepoError, RepoResult, StudentRepository, StudentWatch};
pub use service::student_service::{ListSubscription, StudentService, DEFAULT_GRACE_WINDOW};
pub use store::student_store::{SqliteStudentStore, StudentRow, StudentStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
