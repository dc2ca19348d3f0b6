use std::sync::Arc;

use rollbook_core::db::open_db_in_memory;
use rollbook_core::{
    RepoError, SqliteStudentStore, Student, StudentId, StudentRepository, StudentRow, StudentStore,
};

fn new_store() -> Arc<SqliteStudentStore> {
    Arc::new(SqliteStudentStore::new(open_db_in_memory().unwrap()))
}

#[tokio::test]
async fn stored_entry_round_trips_through_the_domain_shape() {
    let repo = StudentRepository::new(new_store());
    let student = Student::with_id(StudentId::random(), "Ivanov", 2, 5);

    repo.add(student.clone()).await.unwrap();

    let all = repo.all_once().await.unwrap();
    assert_eq!(all, vec![student]);
}

#[tokio::test]
async fn domain_id_is_stored_as_canonical_text() {
    let store = new_store();
    let repo = StudentRepository::new(store.clone());
    let student = Student::new("Ivanov");

    repo.add(student.clone()).await.unwrap();

    let rows = store.read_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, student.id.to_string());
}

#[tokio::test]
async fn watch_emits_current_contents_first() {
    let store = new_store();
    store
        .insert(&StudentRow {
            id: StudentId::random().to_string(),
            name: "Ivanov".to_string(),
            skipped_lessons: 0,
            completed_works: 0,
        })
        .unwrap();

    let repo = StudentRepository::new(store);
    let mut watch = repo.watch_all();

    let first = watch.next().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].name, "Ivanov");
}

#[tokio::test]
async fn watch_converges_after_add_and_remove() {
    let repo = StudentRepository::new(new_store());
    let mut watch = repo.watch_all();

    let initial = watch.next().await.unwrap();
    assert!(initial.is_empty());

    let student = Student::new("Ivanov");
    repo.add(student.clone()).await.unwrap();
    let after_add = watch.next().await.unwrap();
    assert_eq!(after_add, vec![student.clone()]);

    repo.remove_by_id(student.id).await.unwrap();
    let after_remove = watch.next().await.unwrap();
    assert!(after_remove.is_empty());
}

#[tokio::test]
async fn concurrent_watches_observe_the_same_data() {
    let repo = StudentRepository::new(new_store());
    let mut first = repo.watch_all();
    let mut second = repo.watch_all();

    repo.add(Student::new("Ivanov")).await.unwrap();

    // Each feed consumes its snapshot plus the post-add emission on its own
    // receiver; both settle on the same one-element roster.
    let mut last_first = first.next().await.unwrap();
    if last_first.is_empty() {
        last_first = first.next().await.unwrap();
    }
    let mut last_second = second.next().await.unwrap();
    if last_second.is_empty() {
        last_second = second.next().await.unwrap();
    }

    assert_eq!(last_first, last_second);
    assert_eq!(last_first.len(), 1);
}

#[tokio::test]
async fn update_miss_and_delete_miss_surface_no_error() {
    let repo = StudentRepository::new(new_store());
    let present = Student::new("Ivanov");
    repo.add(present.clone()).await.unwrap();

    repo.update(Student::new("Ghost")).await.unwrap();
    repo.remove_by_id(StudentId::random()).await.unwrap();

    assert_eq!(repo.all_once().await.unwrap(), vec![present]);
}

#[tokio::test]
async fn malformed_stored_id_fails_the_read() {
    let store = new_store();
    store
        .insert(&StudentRow {
            id: "not-a-uuid".to_string(),
            name: "Ivanov".to_string(),
            skipped_lessons: 0,
            completed_works: 0,
        })
        .unwrap();

    let repo = StudentRepository::new(store);
    let err = repo.all_once().await.unwrap_err();
    assert!(matches!(err, RepoError::MalformedId(_)), "got {err}");
}

#[tokio::test]
async fn negative_stored_counter_fails_the_read() {
    let store = new_store();
    store
        .insert(&StudentRow {
            id: StudentId::random().to_string(),
            name: "Ivanov".to_string(),
            skipped_lessons: -3,
            completed_works: 0,
        })
        .unwrap();

    let repo = StudentRepository::new(store);
    let err = repo.all_once().await.unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)), "got {err}");
}
