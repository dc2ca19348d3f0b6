//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire store -> repository -> service explicitly (the composition root)
//!   and verify one add/observe round trip against an in-memory database.
//! - Keep output deterministic for quick local sanity checks.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use rollbook_core::db::open_db_in_memory;
use rollbook_core::{SqliteStudentStore, StudentRepository, StudentService};

const OBSERVE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let conn = open_db_in_memory()?;
    let store = Arc::new(SqliteStudentStore::new(conn));
    let repo = StudentRepository::new(store);
    let service = StudentService::new(repo);

    let mut roster = service.subscribe();
    service.add_student("Ivanov", 0, 0);

    let students = tokio::time::timeout(OBSERVE_TIMEOUT, async {
        loop {
            match roster.next().await {
                Some(items) if !items.is_empty() => break items,
                Some(_) => continue,
                None => break Vec::new(),
            }
        }
    })
    .await?;

    println!("rollbook_core version={}", rollbook_core::core_version());
    for student in &students {
        println!(
            "student id={} name={} skipped={} completed={}",
            student.id, student.name, student.skipped_lessons, student.completed_works
        );
    }
    println!("students={}", students.len());
    Ok(())
}
