//! Task list state holder.
//!
//! Owns the current [`Filter`], derives the displayed list from the store's
//! full set, and is the only component that mutates tasks.
//!
//! Mutations are queued to a single writer task and applied in submission
//! order. Each one looks its target up in the gateway's latest snapshot at
//! the moment it runs; ids that are no longer present are ignored.
//!
//! The displayed list is shared while observed: the first observer starts a
//! task that combines the store's full set with the filter, and that task
//! stops once nobody has observed it for the configured stop timeout. A later
//! observer restarts it and sees the current snapshot immediately.

use crate::config::ViewConfig;
use crate::db::now_ms;
use crate::error::{TodoError, TodoResult, validate_title};
use crate::gateway::TaskGateway;
use crate::types::{Filter, Task, TaskId, TaskSnapshot, derive};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, warn};

/// The filtered list as seen by observers.
pub type DisplayedTasks = Arc<Vec<Task>>;

/// A queued mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mutation {
    Add {
        title: String,
        deadline: Option<i64>,
    },
    ToggleCompletion(TaskId),
    UpdateDetails {
        id: TaskId,
        title: String,
        deadline: Option<i64>,
    },
    Delete(TaskId),
}

struct Request {
    mutation: Mutation,
    reply: oneshot::Sender<TodoResult<()>>,
}

/// Outcome of a queued mutation.
///
/// Dropping it is fine: the write still happens and its effect shows up in
/// the displayed list. Awaiting it yields the write's result.
pub struct PendingWrite {
    rx: oneshot::Receiver<TodoResult<()>>,
}

impl Future for PendingWrite {
    type Output = TodoResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(TodoError::internal(
                    "task writer stopped before applying the request",
                ))
            })
        })
    }
}

struct Shared {
    gateway: Arc<dyn TaskGateway>,
    runtime: Handle,
    filter_tx: watch::Sender<Filter>,
    displayed_tx: watch::Sender<DisplayedTasks>,
    /// Combine task while the displayed list is being observed.
    sharing: Mutex<Option<JoinHandle<()>>>,
    /// Signalled when an observer joins a running combine task.
    resubscribed: Notify,
    stop_timeout: Duration,
}

impl Shared {
    fn lock_sharing(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sharing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recompute the displayed list, notifying observers only on change.
    fn publish(&self, snapshot: &TaskSnapshot, filter: Filter) {
        let next = derive(snapshot, filter);
        self.displayed_tx.send_if_modified(|current| {
            if **current == next {
                return false;
            }
            debug!(%filter, shown = next.len(), total = snapshot.len(), "Displayed tasks changed");
            *current = Arc::new(next);
            true
        });
    }
}

/// Single source of truth for the task list a user currently sees.
///
/// Must be created inside a tokio runtime. Dropping it cancels the store
/// subscription; mutations already submitted are still written.
pub struct TaskListState {
    shared: Arc<Shared>,
    requests: mpsc::UnboundedSender<Request>,
    failures_tx: Arc<watch::Sender<Option<TodoError>>>,
}

impl TaskListState {
    pub fn new(gateway: Arc<dyn TaskGateway>, config: &ViewConfig) -> Self {
        let runtime = Handle::current();
        let (filter_tx, _) = watch::channel(Filter::All);
        let (displayed_tx, _) = watch::channel(DisplayedTasks::default());
        let (failures_tx, _) = watch::channel(None);
        let failures_tx = Arc::new(failures_tx);
        let (requests, requests_rx) = mpsc::unbounded_channel();

        runtime.spawn(run_writer(
            Arc::clone(&gateway),
            requests_rx,
            Arc::clone(&failures_tx),
        ));

        Self {
            shared: Arc::new(Shared {
                gateway,
                runtime,
                filter_tx,
                displayed_tx,
                sharing: Mutex::new(None),
                resubscribed: Notify::new(),
                stop_timeout: config.stop_timeout(),
            }),
            requests,
            failures_tx,
        }
    }

    /// Live filtered task list.
    ///
    /// The returned receiver already holds the current list. The underlying
    /// store subscription is started if it is not running.
    pub fn observe_filtered_tasks(&self) -> watch::Receiver<DisplayedTasks> {
        let shared = &self.shared;
        let mut sharing = shared.lock_sharing();
        let rx = shared.displayed_tx.subscribe();

        if sharing.as_ref().is_none_or(|handle| handle.is_finished()) {
            let all_rx = shared.gateway.observe_all();
            let snapshot = all_rx.borrow().clone();
            shared.publish(&snapshot, *shared.filter_tx.borrow());
            debug!("Starting task list subscription");
            *sharing = Some(
                shared
                    .runtime
                    .spawn(run_sharing(Arc::clone(shared), all_rx)),
            );
        } else {
            // Restart the idle countdown once this observer leaves.
            shared.resubscribed.notify_one();
        }

        rx
    }

    /// Live current filter.
    pub fn observe_current_filter(&self) -> watch::Receiver<Filter> {
        self.shared.filter_tx.subscribe()
    }

    /// Most recent storage failure, for a generic failure state in the UI.
    ///
    /// Reset to `None` by the next successful write.
    pub fn observe_failures(&self) -> watch::Receiver<Option<TodoError>> {
        self.failures_tx.subscribe()
    }

    pub fn current_filter(&self) -> Filter {
        *self.shared.filter_tx.borrow()
    }

    /// Replace the filter. Only the displayed list is recomputed.
    pub fn set_filter(&self, filter: Filter) {
        self.shared.filter_tx.send_if_modified(|current| {
            if *current == filter {
                return false;
            }
            *current = filter;
            true
        });
    }

    /// Queue a new, not completed task. Blank titles are rejected here and
    /// never reach storage.
    pub fn add_task(&self, title: &str, deadline: Option<i64>) -> TodoResult<PendingWrite> {
        validate_title(title)?;
        Ok(self.submit(Mutation::Add {
            title: title.to_string(),
            deadline,
        }))
    }

    /// Queue a completion flip for `id`.
    pub fn toggle_completion(&self, id: TaskId) -> PendingWrite {
        self.submit(Mutation::ToggleCompletion(id))
    }

    /// Queue a title/deadline edit for `id`. Completion state is untouched.
    pub fn update_details(
        &self,
        id: TaskId,
        title: &str,
        deadline: Option<i64>,
    ) -> TodoResult<PendingWrite> {
        validate_title(title)?;
        Ok(self.submit(Mutation::UpdateDetails {
            id,
            title: title.to_string(),
            deadline,
        }))
    }

    /// Queue removal of `id`.
    pub fn delete_task(&self, id: TaskId) -> PendingWrite {
        self.submit(Mutation::Delete(id))
    }

    fn submit(&self, mutation: Mutation) -> PendingWrite {
        let (reply, rx) = oneshot::channel();
        if self.requests.send(Request { mutation, reply }).is_err() {
            // The dropped reply resolves the PendingWrite with an error.
            warn!("Task writer is gone, dropping mutation");
        }
        PendingWrite { rx }
    }
}

impl Drop for TaskListState {
    fn drop(&mut self) {
        if let Some(handle) = self.shared.lock_sharing().take() {
            handle.abort();
        }
    }
}

/// Apply queued mutations one at a time until every sender is gone.
async fn run_writer(
    gateway: Arc<dyn TaskGateway>,
    mut requests: mpsc::UnboundedReceiver<Request>,
    failures_tx: Arc<watch::Sender<Option<TodoError>>>,
) {
    while let Some(Request { mutation, reply }) = requests.recv().await {
        let result = apply(gateway.as_ref(), mutation).await;
        match result {
            Ok(()) => {
                failures_tx.send_if_modified(|failure| failure.take().is_some());
            }
            Err(ref err) => {
                error!(code = ?err.code, "Task mutation failed: {}", err);
                failures_tx.send_replace(Some(err.clone()));
            }
        }
        let _ = reply.send(result);
    }
    debug!("Task writer finished");
}

async fn apply(gateway: &dyn TaskGateway, mutation: Mutation) -> TodoResult<()> {
    match mutation {
        Mutation::Add { title, deadline } => {
            let id = gateway.insert(Task::new(title, deadline)).await?;
            debug!(id, "Added task");
        }
        Mutation::ToggleCompletion(id) => {
            if let Some(task) = lookup(gateway, id) {
                gateway.update(task.toggled(now_ms())).await?;
            }
        }
        Mutation::UpdateDetails {
            id,
            title,
            deadline,
        } => {
            if let Some(task) = lookup(gateway, id) {
                gateway.update(task.with_details(title, deadline)).await?;
            }
        }
        Mutation::Delete(id) => {
            if let Some(task) = lookup(gateway, id) {
                gateway.delete(task).await?;
            }
        }
    }
    Ok(())
}

/// Find `id` in the latest full set. A miss means the task was deleted in the
/// meantime, which is not an error.
fn lookup(gateway: &dyn TaskGateway, id: TaskId) -> Option<Task> {
    let found = gateway.current().get(id).cloned();
    if found.is_none() {
        debug!(id, "Task not found, ignoring mutation");
    }
    found
}

/// Combine the store's full set with the filter until unobserved for
/// `stop_timeout`, counted from the last observer leaving.
async fn run_sharing(shared: Arc<Shared>, mut all_rx: watch::Receiver<TaskSnapshot>) {
    let mut filter_rx = shared.filter_tx.subscribe();
    let mut idle_deadline: Option<Instant> = None;

    // Catch anything that changed between the caller's prime and now.
    {
        let snapshot = all_rx.borrow_and_update().clone();
        let filter = *filter_rx.borrow_and_update();
        shared.publish(&snapshot, filter);
    }

    loop {
        tokio::select! {
            changed = all_rx.changed() => {
                if changed.is_err() {
                    debug!("Task store closed, stopping task list subscription");
                    return;
                }
            }
            changed = filter_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = shared.displayed_tx.closed(), if idle_deadline.is_none() => {
                idle_deadline = Some(Instant::now() + shared.stop_timeout);
                continue;
            }
            _ = shared.resubscribed.notified(), if idle_deadline.is_some() => {
                idle_deadline = None;
                continue;
            }
            _ = sleep_until(idle_deadline.unwrap_or_else(Instant::now)),
                if idle_deadline.is_some() =>
            {
                let mut sharing = shared.lock_sharing();
                if shared.displayed_tx.receiver_count() == 0 {
                    debug!(
                        timeout_ms = shared.stop_timeout.as_millis() as u64,
                        "No observers, stopping task list subscription"
                    );
                    *sharing = None;
                    return;
                }
                idle_deadline = None;
                continue;
            }
        }

        let snapshot = all_rx.borrow_and_update().clone();
        let filter = *filter_rx.borrow_and_update();
        shared.publish(&snapshot, filter);
    }
}
