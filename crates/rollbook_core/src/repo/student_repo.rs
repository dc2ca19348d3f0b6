//! Student repository: domain mapping plus asynchronous store access.
//!
//! # Responsibility
//! - Map [`StudentRow`] to [`Student`] and back (textual id <-> structured
//!   id, raw counters <-> typed counters).
//! - Run every store call on the blocking pool so callers never block on
//!   storage I/O.
//!
//! # Invariants
//! - Id translation is lossless: `to_string` then `parse` yields the same id.
//! - A row that fails read-mapping fails the whole read; rows are never
//!   silently dropped.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task;

use crate::db::DbError;
use crate::model::student::{ParseStudentIdError, Student, StudentId};
use crate::store::student_store::{StudentRow, StudentStore};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for roster reads and writes.
#[derive(Debug)]
pub enum RepoError {
    /// The storage medium could not complete the call.
    Db(DbError),
    /// A stored id failed to parse as a structured identifier.
    MalformedId(ParseStudentIdError),
    /// A stored counter is outside the representable range.
    InvalidData(String),
    /// The background dispatch was torn down before the call completed.
    Canceled,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::MalformedId(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted student data: {message}"),
            Self::Canceled => write!(f, "storage call canceled before completion"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::MalformedId(err) => Some(err),
            Self::InvalidData(_) => None,
            Self::Canceled => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ParseStudentIdError> for RepoError {
    fn from(value: ParseStudentIdError) -> Self {
        Self::MalformedId(value)
    }
}

/// Asynchronous facade over a [`StudentStore`].
pub struct StudentRepository {
    store: Arc<dyn StudentStore>,
}

impl StudentRepository {
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    /// Live view over the full roster.
    ///
    /// The returned feed emits the current list on its first `next` call and
    /// re-emits after every store mutation. Emissions may repeat an
    /// unchanged list; consumers hold last-value-wins state, so that is
    /// harmless.
    pub fn watch_all(&self) -> StudentWatch {
        StudentWatch {
            changes: self.store.observe(),
            store: Arc::clone(&self.store),
            primed: false,
        }
    }

    /// One-shot read of the full roster.
    pub async fn all_once(&self) -> RepoResult<Vec<Student>> {
        let store = Arc::clone(&self.store);
        run_blocking(move || read_roster(store.as_ref())).await
    }

    /// Persists a new roster entry (upsert semantics on id conflict).
    pub async fn add(&self, student: Student) -> RepoResult<()> {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.insert(&to_row(&student)).map_err(RepoError::from)).await
    }

    /// Replaces the stored entry matching `student.id`; no-op when absent.
    pub async fn update(&self, student: Student) -> RepoResult<()> {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.update(&to_row(&student)).map_err(RepoError::from)).await
    }

    /// Deletes the entry with the given id; no-op when absent.
    pub async fn remove_by_id(&self, id: StudentId) -> RepoResult<()> {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.delete_by_id(&id.to_string()).map_err(RepoError::from)).await
    }
}

/// Live subscription over the roster table.
///
/// Holds its own change receiver, so concurrent feeds observe independently.
pub struct StudentWatch {
    store: Arc<dyn StudentStore>,
    changes: watch::Receiver<u64>,
    primed: bool,
}

impl StudentWatch {
    /// Returns the next full-roster emission.
    ///
    /// The first call resolves immediately with the current contents; later
    /// calls wait for a change tick and then re-read the table.
    pub async fn next(&mut self) -> RepoResult<Vec<Student>> {
        if self.primed {
            if self.changes.changed().await.is_err() {
                return Err(RepoError::Canceled);
            }
        } else {
            self.primed = true;
        }

        let store = Arc::clone(&self.store);
        run_blocking(move || read_roster(store.as_ref())).await
    }
}

async fn run_blocking<T, F>(job: F) -> RepoResult<T>
where
    F: FnOnce() -> RepoResult<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(job).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(RepoError::Canceled),
    }
}

fn read_roster(store: &dyn StudentStore) -> RepoResult<Vec<Student>> {
    store
        .read_all()?
        .into_iter()
        .map(to_domain)
        .collect::<RepoResult<Vec<_>>>()
}

fn to_row(student: &Student) -> StudentRow {
    StudentRow {
        id: student.id.to_string(),
        name: student.name.clone(),
        skipped_lessons: i64::from(student.skipped_lessons),
        completed_works: i64::from(student.completed_works),
    }
}

fn to_domain(row: StudentRow) -> RepoResult<Student> {
    let id = StudentId::parse(&row.id)?;
    Ok(Student {
        id,
        name: row.name,
        skipped_lessons: counter_from_db(row.skipped_lessons, "skippedLessons")?,
        completed_works: counter_from_db(row.completed_works, "completedWorks")?,
    })
}

fn counter_from_db(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("counter `{value}` in students.{column} out of range"))
    })
}
