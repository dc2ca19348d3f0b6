//! Roster state holder.
//!
//! # Responsibility
//! - Republish the repository's live view as a last-value-wins state cell.
//! - Accept fire-and-forget add/update/remove intents.
//! - Track the transient "which entry is being edited" selection.
//!
//! # Invariants
//! - Exactly one pump drives the state cell, and it runs only while at least
//!   one subscriber is attached (plus the grace window after the last one
//!   detaches).
//! - The state cell starts as an empty list and afterwards always holds the
//!   most recent emission.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{error, info};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::model::student::{Student, StudentId};
use crate::repo::student_repo::{RepoResult, StudentRepository};

/// How long the live query keeps running after the last subscriber detaches.
///
/// Re-attachment within this window reuses the running query instead of
/// restarting it, which rides out transient UI teardown/rebuild cycles.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(5);

/// State holder for the roster screen.
///
/// Must be created and used inside a Tokio runtime: intents and
/// subscriptions spawn tasks on the ambient runtime. Dropping the service
/// aborts write intents that have not reached the storage layer yet.
pub struct StudentService {
    repo: Arc<StudentRepository>,
    share: Arc<ListShare>,
    editing: watch::Sender<Option<StudentId>>,
    writes: Mutex<JoinSet<()>>,
}

impl StudentService {
    pub fn new(repo: StudentRepository) -> Self {
        Self::with_grace_window(repo, DEFAULT_GRACE_WINDOW)
    }

    /// Builds the service with a custom teardown grace window.
    pub fn with_grace_window(repo: StudentRepository, grace: Duration) -> Self {
        let repo = Arc::new(repo);
        let (items, _) = watch::channel(Vec::new());
        let (editing, _) = watch::channel(None);

        Self {
            share: Arc::new(ListShare {
                repo: Arc::clone(&repo),
                items,
                grace,
                inner: Mutex::new(ShareInner::default()),
            }),
            repo,
            editing,
            writes: Mutex::new(JoinSet::new()),
        }
    }

    /// Current roster snapshot. Empty until the first emission arrives.
    pub fn items(&self) -> Vec<Student> {
        self.share.items.borrow().clone()
    }

    /// Attaches an observer to the live roster state.
    ///
    /// The first subscriber starts the underlying live query; the query is
    /// torn down only after the last subscriber has been gone for the grace
    /// window.
    pub fn subscribe(&self) -> ListSubscription {
        let rx = self.share.items.subscribe();
        ListShare::attach(&self.share);
        ListSubscription {
            rx,
            share: Arc::clone(&self.share),
        }
    }

    /// Whether the underlying live query is currently attached.
    pub fn live_query_active(&self) -> bool {
        self.share.lock_inner().pump.is_some()
    }

    /// Adds a student with a fresh random id.
    ///
    /// Fire-and-forget: the visible list updates once the live query
    /// re-fires after the write lands.
    pub fn add_student(
        &self,
        name: impl Into<String>,
        skipped_lessons: u32,
        completed_works: u32,
    ) {
        let student = Student::with_id(
            StudentId::random(),
            name,
            skipped_lessons,
            completed_works,
        );
        let repo = Arc::clone(&self.repo);
        self.spawn_write("student_add", async move { repo.add(student).await });
    }

    /// Adds a placeholder entry named after the current list length.
    pub fn add_item(&self) {
        let name = format!("Student {}", self.items().len() + 1);
        self.add_student(name, 0, 0);
    }

    /// Replaces the stored entry for `id` with `updated`.
    ///
    /// A mismatched `updated.id` is corrected to `id` before delegating, so
    /// callers may pass a copied entry without fixing its id first.
    pub fn update_item(&self, id: StudentId, updated: Student) {
        let mut student = updated;
        if student.id != id {
            student.id = id;
        }
        let repo = Arc::clone(&self.repo);
        self.spawn_write("student_update", async move { repo.update(student).await });
    }

    /// Deletes the entry with the given id. Fire-and-forget.
    pub fn remove_item(&self, id: StudentId) {
        let repo = Arc::clone(&self.repo);
        self.spawn_write("student_remove", async move { repo.remove_by_id(id).await });
    }

    /// Marks `id` as the entry currently being edited.
    pub fn start_editing(&self, id: StudentId) {
        self.editing.send_replace(Some(id));
    }

    /// Clears the editing selection.
    pub fn stop_editing(&self) {
        self.editing.send_replace(None);
    }

    /// The entry currently being edited, if any. Never persisted.
    pub fn editing(&self) -> Option<StudentId> {
        *self.editing.borrow()
    }

    /// Watchable view of the editing selection.
    pub fn watch_editing(&self) -> watch::Receiver<Option<StudentId>> {
        self.editing.subscribe()
    }

    fn spawn_write<F>(&self, op: &'static str, call: F)
    where
        F: Future<Output = RepoResult<()>> + Send + 'static,
    {
        let mut writes = self
            .writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Reap finished intents so the set does not grow unbounded.
        while writes.try_join_next().is_some() {}

        writes.spawn(async move {
            if let Err(err) = call.await {
                error!("event={op} module=service status=error error={err}");
            }
        });
    }
}

/// Observer handle for the roster state.
///
/// Detaches on drop; the last detachment arms the grace timer.
pub struct ListSubscription {
    rx: watch::Receiver<Vec<Student>>,
    share: Arc<ListShare>,
}

impl ListSubscription {
    /// Most recent emission without waiting.
    pub fn current(&self) -> Vec<Student> {
        self.rx.borrow().clone()
    }

    /// Waits for the next emission and returns it.
    ///
    /// Returns `None` only when the state cell has been torn down entirely.
    pub async fn next(&mut self) -> Option<Vec<Student>> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for ListSubscription {
    fn drop(&mut self) {
        ListShare::detach(&self.share);
    }
}

/// Subscriber-counted live query shared by all roster observers.
struct ListShare {
    repo: Arc<StudentRepository>,
    items: watch::Sender<Vec<Student>>,
    grace: Duration,
    inner: Mutex<ShareInner>,
}

#[derive(Default)]
struct ShareInner {
    subscribers: usize,
    pump: Option<JoinHandle<()>>,
    teardown: Option<JoinHandle<()>>,
}

impl ListShare {
    fn lock_inner(&self) -> MutexGuard<'_, ShareInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn attach(share: &Arc<Self>) {
        let mut inner = share.lock_inner();
        inner.subscribers += 1;

        if let Some(timer) = inner.teardown.take() {
            timer.abort();
        }

        if inner.pump.is_none() {
            info!("event=live_share module=service status=start");
            let pump_share = Arc::clone(share);
            inner.pump = Some(tokio::spawn(async move { pump_share.pump().await }));
        }
    }

    fn detach(share: &Arc<Self>) {
        let mut inner = share.lock_inner();
        inner.subscribers = inner.subscribers.saturating_sub(1);

        if inner.subscribers == 0 && inner.pump.is_some() && inner.teardown.is_none() {
            let timer_share = Arc::clone(share);
            inner.teardown = Some(tokio::spawn(async move {
                tokio::time::sleep(timer_share.grace).await;
                timer_share.expire();
            }));
        }
    }

    /// Tears the pump down unless a subscriber re-attached meanwhile.
    fn expire(&self) {
        let mut inner = self.lock_inner();
        inner.teardown = None;

        if inner.subscribers == 0 {
            if let Some(pump) = inner.pump.take() {
                pump.abort();
                info!("event=live_share module=service status=stop");
            }
        }
    }

    async fn pump(self: Arc<Self>) {
        let mut feed = self.repo.watch_all();
        loop {
            match feed.next().await {
                Ok(items) => {
                    self.items.send_replace(items);
                }
                Err(err) => {
                    // The cell keeps its last value; observers are simply no
                    // longer refreshed until a new subscription cycle.
                    error!("event=live_share module=service status=error error={err}");
                    break;
                }
            }
        }
    }
}
