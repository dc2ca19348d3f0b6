//! Student record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide full-table read, upsert/update/delete mutators and change ticks
//!   over the `students` table.
//!
//! # Invariants
//! - `read_all` returns rows in insertion order; the upsert path keeps an
//!   existing row's position when it replaces the row.
//! - The revision is bumped after every upsert, and after update/delete only
//!   when a row matched.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tokio::sync::watch;

use crate::db::DbResult;

const STUDENT_SELECT_SQL: &str = "SELECT
    id,
    name,
    skippedLessons,
    completedWorks
FROM students
ORDER BY rowid";

/// Persisted shape of one roster entry.
///
/// `id` is the canonical textual identifier; the counters carry whatever the
/// table holds, including out-of-range values a bulk writer may have left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub skipped_lessons: i64,
    pub completed_works: i64,
}

/// Store contract for the `students` table.
///
/// Observation is "tick, then re-read": [`StudentStore::observe`] yields a
/// receiver that fires after every committed mutation, and observers reload
/// the table through [`StudentStore::read_all`]. Every receiver is
/// independent; all of them see the same underlying data.
pub trait StudentStore: Send + Sync {
    /// One-shot full-table read, in insertion order.
    fn read_all(&self) -> DbResult<Vec<StudentRow>>;

    /// Upsert: replaces the row with the same id wholesale, otherwise
    /// creates a new row. Idempotent under identical input.
    fn insert(&self, record: &StudentRow) -> DbResult<()>;

    /// Replaces the row whose id matches. A missing id is a no-op, not an
    /// error.
    fn update(&self, record: &StudentRow) -> DbResult<()>;

    /// Removes the row with the given id if present; no-op when absent.
    fn delete_by_id(&self, id: &str) -> DbResult<()>;

    /// Change ticks for the table. The receiver's value is an opaque
    /// revision counter.
    fn observe(&self) -> watch::Receiver<u64>;
}

/// SQLite-backed student store.
///
/// Mutations are serialized by the connection mutex; each mutator is a
/// single atomic statement.
pub struct SqliteStudentStore {
    conn: Mutex<Connection>,
    revision: watch::Sender<u64>,
}

impl SqliteStudentStore {
    /// Wraps an open connection (see [`crate::db::open_db`]).
    pub fn new(conn: Connection) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            conn: Mutex::new(conn),
            revision,
        }
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

impl StudentStore for SqliteStudentStore {
    fn read_all(&self) -> DbResult<Vec<StudentRow>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(STUDENT_SELECT_SQL)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(StudentRow {
                id: row.get("id")?,
                name: row.get("name")?,
                skipped_lessons: row.get("skippedLessons")?,
                completed_works: row.get("completedWorks")?,
            });
        }

        Ok(records)
    }

    fn insert(&self, record: &StudentRow) -> DbResult<()> {
        // ON CONFLICT DO UPDATE keeps the conflicting row's rowid, so a
        // replaced record keeps its place in the insertion order.
        self.lock_conn().execute(
            "INSERT INTO students (id, name, skippedLessons, completedWorks)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                skippedLessons = excluded.skippedLessons,
                completedWorks = excluded.completedWorks;",
            params![
                record.id.as_str(),
                record.name.as_str(),
                record.skipped_lessons,
                record.completed_works,
            ],
        )?;
        self.bump_revision();
        Ok(())
    }

    fn update(&self, record: &StudentRow) -> DbResult<()> {
        let changed = self.lock_conn().execute(
            "UPDATE students
             SET
                name = ?2,
                skippedLessons = ?3,
                completedWorks = ?4
             WHERE id = ?1;",
            params![
                record.id.as_str(),
                record.name.as_str(),
                record.skipped_lessons,
                record.completed_works,
            ],
        )?;

        if changed > 0 {
            self.bump_revision();
        }

        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> DbResult<()> {
        let changed = self
            .lock_conn()
            .execute("DELETE FROM students WHERE id = ?1;", [id])?;

        if changed > 0 {
            self.bump_revision();
        }

        Ok(())
    }

    fn observe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
