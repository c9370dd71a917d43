//! Persistence gateway: durable task storage observed as a live full set.
//!
//! Every successful write re-reads the whole table inside the same
//! transaction and publishes it on a watch channel before the connection lock
//! is released, so snapshots go out in the order writes were applied. A late
//! observer gets the current snapshot straight away from the channel.

use crate::config::StoreConfig;
use crate::db::Database;
use crate::db::tasks::{delete_task_on, insert_task_on, list_tasks_on, update_task_on};
use crate::error::{TodoError, TodoResult};
use crate::types::{Task, TaskId, TaskSnapshot};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::{OnceCell, watch};
use tracing::{debug, error, info};

/// Storage abstraction with live-observable CRUD over tasks.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    /// Live full set, newest id first. The receiver starts at the current
    /// snapshot and sees every later one.
    fn observe_all(&self) -> watch::Receiver<TaskSnapshot>;

    /// The most recently published full set.
    fn current(&self) -> TaskSnapshot {
        self.observe_all().borrow().clone()
    }

    /// Store a task. A missing id is assigned; an existing id is replaced.
    async fn insert(&self, task: Task) -> TodoResult<TaskId>;

    /// Replace the stored task with the same id. Unknown ids are ignored.
    async fn update(&self, task: Task) -> TodoResult<()>;

    /// Remove the stored task with the same id. Unknown ids are ignored.
    async fn delete(&self, task: Task) -> TodoResult<()>;
}

/// [`TaskGateway`] over the SQLite [`Database`].
pub struct SqliteGateway {
    db: Database,
    snapshot_tx: Arc<watch::Sender<TaskSnapshot>>,
}

impl SqliteGateway {
    /// Wrap an already migrated database, loading the initial snapshot.
    pub fn new(db: Database) -> TodoResult<Self> {
        let initial = TaskSnapshot::new(db.list_tasks()?);
        let (snapshot_tx, _) = watch::channel(initial);
        Ok(Self {
            db,
            snapshot_tx: Arc::new(snapshot_tx),
        })
    }

    /// Open (creating and migrating if needed) the database described by `config`.
    pub fn open(config: &StoreConfig) -> TodoResult<Self> {
        config.ensure_db_dir()?;
        let db = Database::open_with_busy_timeout(&config.db_path, config.busy_timeout_ms)?;
        Self::new(db)
    }

    /// In-memory store (for testing).
    pub fn in_memory() -> TodoResult<Self> {
        Self::new(Database::open_in_memory()?)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Number of live subscriptions to the full set.
    pub fn observer_count(&self) -> usize {
        self.snapshot_tx.receiver_count()
    }

    /// Run `op` in a transaction on the blocking pool. When it reports a
    /// change, the new full set is published before the lock is released.
    async fn write<F, T>(&self, name: &'static str, op: F) -> TodoResult<T>
    where
        F: FnOnce(&Connection) -> anyhow::Result<(T, bool)> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let snapshot_tx = Arc::clone(&self.snapshot_tx);

        let result = tokio::task::spawn_blocking(move || {
            db.with_conn_mut(|conn| {
                let txn = conn.transaction()?;
                let (out, changed) = op(&*txn)?;
                if !changed {
                    return Ok(out);
                }
                let tasks = list_tasks_on(&txn)?;
                txn.commit()?;
                debug!(count = tasks.len(), "Publishing task snapshot");
                snapshot_tx.send_replace(TaskSnapshot::new(tasks));
                Ok(out)
            })
        })
        .await?;

        result.map_err(|err| {
            let err = TodoError::from(err);
            error!(op = name, "Task store write failed: {}", err);
            err
        })
    }
}

#[async_trait]
impl TaskGateway for SqliteGateway {
    fn observe_all(&self) -> watch::Receiver<TaskSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn current(&self) -> TaskSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    async fn insert(&self, task: Task) -> TodoResult<TaskId> {
        self.write("insert", move |conn| Ok((insert_task_on(conn, &task)?, true)))
            .await
    }

    async fn update(&self, task: Task) -> TodoResult<()> {
        let id = task.id;
        let changed = self
            .write("update", move |conn| {
                let changed = update_task_on(conn, &task)?;
                Ok((changed, changed))
            })
            .await?;
        if !changed {
            debug!(?id, "Update matched no stored task");
        }
        Ok(())
    }

    async fn delete(&self, task: Task) -> TodoResult<()> {
        let Some(id) = task.id else {
            return Ok(());
        };
        let changed = self
            .write("delete", move |conn| {
                let changed = delete_task_on(conn, id)?;
                Ok((changed, changed))
            })
            .await?;
        if !changed {
            debug!(id, "Delete matched no stored task");
        }
        Ok(())
    }
}

/// Lazily opened, shared [`SqliteGateway`].
///
/// The first [`GatewayCell::get`] opens and migrates the store; concurrent
/// first callers wait on that single initialization and all receive the same
/// handle. A failed open leaves the cell empty so a later call can retry.
pub struct GatewayCell {
    config: StoreConfig,
    cell: OnceCell<Arc<SqliteGateway>>,
}

impl GatewayCell {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> TodoResult<Arc<SqliteGateway>> {
        let gateway = self
            .cell
            .get_or_try_init(|| async {
                let config = self.config.clone();
                let gateway =
                    tokio::task::spawn_blocking(move || SqliteGateway::open(&config)).await??;
                info!("Task store ready at {}", self.config.db_path.display());
                Ok::<_, TodoError>(Arc::new(gateway))
            })
            .await?;
        Ok(Arc::clone(gateway))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
