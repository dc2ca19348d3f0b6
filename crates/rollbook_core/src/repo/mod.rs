//! Repository layer.
//!
//! # Responsibility
//! - Translate between storage rows and domain objects.
//! - Keep storage I/O off the caller's task via blocking-pool dispatch.

pub mod student_repo;
