use std::sync::Arc;
use std::time::Duration;

use rollbook_core::db::open_db_in_memory;
use rollbook_core::{
    ListSubscription, SqliteStudentStore, Student, StudentId, StudentRepository, StudentService,
};

const EMISSION_TIMEOUT: Duration = Duration::from_secs(5);

fn new_service(grace: Duration) -> StudentService {
    let store = Arc::new(SqliteStudentStore::new(open_db_in_memory().unwrap()));
    StudentService::with_grace_window(StudentRepository::new(store), grace)
}

async fn next_matching<F>(subscription: &mut ListSubscription, mut matches: F) -> Vec<Student>
where
    F: FnMut(&[Student]) -> bool,
{
    tokio::time::timeout(EMISSION_TIMEOUT, async {
        loop {
            let items = subscription.next().await.expect("state cell closed");
            if matches(&items) {
                break items;
            }
        }
    })
    .await
    .expect("timed out waiting for a matching roster emission")
}

#[tokio::test]
async fn state_starts_as_an_empty_list() {
    let service = new_service(Duration::from_millis(100));
    assert!(service.items().is_empty());

    let subscription = service.subscribe();
    assert!(subscription.current().is_empty());
}

#[tokio::test]
async fn added_student_reaches_subscribers() {
    let service = new_service(Duration::from_millis(100));
    let mut subscription = service.subscribe();

    service.add_student("Ivanov", 0, 0);

    let items = next_matching(&mut subscription, |items| !items.is_empty()).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Ivanov");
    assert_eq!(items[0].skipped_lessons, 0);
    assert_eq!(items[0].completed_works, 0);
    assert_eq!(service.items(), items);
}

#[tokio::test]
async fn add_update_remove_scenario() {
    let service = new_service(Duration::from_millis(100));
    let mut subscription = service.subscribe();

    service.add_student("Ivanov", 0, 0);
    let added = next_matching(&mut subscription, |items| items.len() == 1).await;
    assert_eq!(added[0].name, "Ivanov");
    assert_eq!(added[0].completed_works, 0);
    let id = added[0].id;

    let mut updated = added[0].clone();
    updated.completed_works = 1;
    service.update_item(id, updated);
    let after_update = next_matching(&mut subscription, |items| {
        items.len() == 1 && items[0].completed_works == 1
    })
    .await;
    assert_eq!(after_update[0].id, id);
    assert_eq!(after_update[0].name, "Ivanov");

    service.remove_item(id);
    next_matching(&mut subscription, |items| items.is_empty()).await;
}

#[tokio::test]
async fn update_corrects_a_mismatched_id() {
    let service = new_service(Duration::from_millis(100));
    let mut subscription = service.subscribe();

    service.add_student("Ivanov", 0, 0);
    let added = next_matching(&mut subscription, |items| items.len() == 1).await;
    let stored_id = added[0].id;

    // A copied entry with a stale id still targets the original row.
    let stray = Student::with_id(StudentId::random(), "Petrov", 2, 3);
    service.update_item(stored_id, stray);

    let items = next_matching(&mut subscription, |items| {
        items.len() == 1 && items[0].name == "Petrov"
    })
    .await;
    assert_eq!(items[0].id, stored_id);
    assert_eq!(items[0].skipped_lessons, 2);
    assert_eq!(items[0].completed_works, 3);
}

#[tokio::test]
async fn placeholder_names_follow_the_list_length() {
    let service = new_service(Duration::from_millis(100));
    let mut subscription = service.subscribe();

    service.add_item();
    let first = next_matching(&mut subscription, |items| items.len() == 1).await;
    assert_eq!(first[0].name, "Student 1");

    service.add_item();
    let second = next_matching(&mut subscription, |items| items.len() == 2).await;
    assert!(second.iter().any(|student| student.name == "Student 2"));
}

#[tokio::test]
async fn live_query_stops_only_after_the_grace_window() {
    let service = new_service(Duration::from_millis(50));

    let subscription = service.subscribe();
    assert!(service.live_query_active());

    drop(subscription);
    assert!(service.live_query_active());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!service.live_query_active());
}

#[tokio::test]
async fn reattach_within_the_grace_window_keeps_the_query_alive() {
    let service = new_service(Duration::from_millis(200));

    let first = service.subscribe();
    drop(first);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let _second = service.subscribe();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(service.live_query_active());
}

#[tokio::test]
async fn writes_after_teardown_do_not_refresh_the_state() {
    let service = new_service(Duration::from_millis(50));

    {
        let mut subscription = service.subscribe();
        service.add_student("Ivanov", 0, 0);
        next_matching(&mut subscription, |items| items.len() == 1).await;
    }

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!service.live_query_active());

    service.add_student("Petrov", 0, 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    // The write landed, but nothing pumps it into the cell anymore.
    assert_eq!(service.items().len(), 1);

    let mut subscription = service.subscribe();
    let items = next_matching(&mut subscription, |items| items.len() == 2).await;
    assert!(items.iter().any(|student| student.name == "Petrov"));
}

#[test]
fn editing_cell_transitions() {
    let service = {
        let store = Arc::new(SqliteStudentStore::new(open_db_in_memory().unwrap()));
        StudentService::new(StudentRepository::new(store))
    };
    assert_eq!(service.editing(), None);

    let first = StudentId::random();
    service.start_editing(first);
    assert_eq!(service.editing(), Some(first));

    // Starting over an active selection replaces it.
    let second = StudentId::random();
    service.start_editing(second);
    assert_eq!(service.editing(), Some(second));

    service.stop_editing();
    assert_eq!(service.editing(), None);
}

#[tokio::test]
async fn editing_selection_is_watchable() {
    let service = new_service(Duration::from_millis(100));
    let mut editing = service.watch_editing();

    let id = StudentId::random();
    service.start_editing(id);
    assert!(editing.has_changed().unwrap());
    assert_eq!(*editing.borrow_and_update(), Some(id));

    service.stop_editing();
    assert_eq!(*editing.borrow_and_update(), None);
}
