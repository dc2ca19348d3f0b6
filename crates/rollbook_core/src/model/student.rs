//! Student domain model.
//!
//! # Responsibility
//! - Define the roster entry shared by storage and state layers.
//! - Provide the validated identifier type layered over the textual key.
//!
//! # Invariants
//! - A `StudentId` is assigned once at creation and never changes.
//! - `StudentId::parse(id.to_string())` always yields the identical value.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one roster entry.
///
/// Stored as canonical lowercase hyphenated text; constructed either fresh
/// (`random`) or by parsing a previously serialized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(Uuid);

impl StudentId {
    /// Generates a fresh random (v4) identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a textual identifier back into its structured form.
    ///
    /// # Errors
    /// Returns [`ParseStudentIdError`] when `value` is not a valid uuid.
    pub fn parse(value: &str) -> Result<Self, ParseStudentIdError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| ParseStudentIdError {
                value: value.to_string(),
            })
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for StudentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Canonical serialization: lowercase hyphenated.
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudentId {
    type Err = ParseStudentIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Rejected textual identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStudentIdError {
    value: String,
}

impl ParseStudentIdError {
    /// The offending input text.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for ParseStudentIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed student id `{}`", self.value)
    }
}

impl Error for ParseStudentIdError {}

/// One roster entry: display name plus two attendance counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    /// Lessons the student skipped. Never decremented below zero.
    pub skipped_lessons: u32,
    /// Lab works the student completed.
    pub completed_works: u32,
}

impl Student {
    /// Creates a roster entry with a fresh random id and zeroed counters.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(StudentId::random(), name, 0, 0)
    }

    /// Creates a roster entry with every field supplied by the caller.
    ///
    /// Used by read-mapping and tests where identity already exists.
    pub fn with_id(
        id: StudentId,
        name: impl Into<String>,
        skipped_lessons: u32,
        completed_works: u32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            skipped_lessons,
            completed_works,
        }
    }
}
