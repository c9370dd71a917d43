//! Integration tests for the database layer and the SQLite gateway.
//!
//! These tests use an in-memory SQLite database unless a file is needed.

use std::sync::Arc;
use todo_state::config::StoreConfig;
use todo_state::db::Database;
use todo_state::gateway::{GatewayCell, SqliteGateway, TaskGateway};
use todo_state::types::Task;

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn setup_gateway() -> SqliteGateway {
    SqliteGateway::in_memory().expect("Failed to create in-memory gateway")
}

mod database_tests {
    use super::*;

    #[test]
    fn insert_assigns_increasing_ids() {
        let db = setup_db();

        let first = db.insert_task(&Task::new("first", None)).unwrap();
        let second = db.insert_task(&Task::new("second", Some(1_000))).unwrap();

        assert!(second > first);
        let stored = db.get_task(second).unwrap().unwrap();
        assert_eq!(stored.title, "second");
        assert_eq!(stored.deadline, Some(1_000));
        assert!(!stored.is_completed);
        assert!(stored.completion_date.is_none());
    }

    #[test]
    fn list_orders_newest_first() {
        let db = setup_db();
        for title in ["a", "b", "c"] {
            db.insert_task(&Task::new(title, None)).unwrap();
        }

        let titles: Vec<String> = db
            .list_tasks()
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
    }

    #[test]
    fn insert_with_existing_id_replaces() {
        let db = setup_db();
        let id = db.insert_task(&Task::new("old", None)).unwrap();

        let replacement = Task {
            id: Some(id),
            ..Task::new("new", None)
        };
        assert_eq!(db.insert_task(&replacement).unwrap(), id);

        let tasks = db.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "new");
    }

    #[test]
    fn update_and_delete_unknown_id_are_noops() {
        let db = setup_db();
        db.insert_task(&Task::new("keep", None)).unwrap();

        let ghost = Task {
            id: Some(999),
            ..Task::new("ghost", None)
        };
        assert!(!db.update_task(&ghost).unwrap());
        assert!(!db.delete_task(999).unwrap());
        assert!(!db.update_task(&Task::new("no id", None)).unwrap());

        assert_eq!(db.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn update_replaces_all_fields() {
        let db = setup_db();
        let id = db.insert_task(&Task::new("task", None)).unwrap();
        let stored = db.get_task(id).unwrap().unwrap();

        let done = stored.toggled(5_000);
        assert!(db.update_task(&done).unwrap());

        let reread = db.get_task(id).unwrap().unwrap();
        assert!(reread.is_completed);
        assert_eq!(reread.completion_date, Some(5_000));
    }

    #[test]
    fn get_task_returns_none_for_unknown_id() {
        let db = setup_db();
        assert!(db.get_task(42).unwrap().is_none());
    }
}

mod gateway_tests {
    use super::*;

    #[tokio::test]
    async fn insert_publishes_new_snapshot() {
        let gateway = setup_gateway();
        let mut rx = gateway.observe_all();
        assert!(rx.borrow_and_update().is_empty());

        let id = gateway.insert(Task::new("Buy milk", None)).await.unwrap();

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(id).unwrap().title, "Buy milk");
    }

    #[tokio::test]
    async fn late_observer_gets_current_snapshot() {
        let gateway = setup_gateway();
        gateway.insert(Task::new("a", None)).await.unwrap();
        gateway.insert(Task::new("b", None)).await.unwrap();

        let rx = gateway.observe_all();
        let titles: Vec<String> = rx.borrow().tasks().iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn update_of_missing_id_does_not_emit() {
        let gateway = setup_gateway();
        gateway.insert(Task::new("a", None)).await.unwrap();
        let mut rx = gateway.observe_all();
        rx.borrow_and_update();

        let ghost = Task {
            id: Some(404),
            ..Task::new("ghost", None)
        };
        gateway.update(ghost.clone()).await.unwrap();
        gateway.delete(ghost).await.unwrap();
        gateway.delete(Task::new("never stored", None)).await.unwrap();

        assert!(!rx.has_changed().unwrap());
        assert_eq!(gateway.current().len(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_emit_in_order() {
        let gateway = setup_gateway();
        let id = gateway.insert(Task::new("a", None)).await.unwrap();
        let stored = gateway.current().get(id).cloned().unwrap();

        gateway.update(stored.with_details("renamed", Some(7))).await.unwrap();
        let renamed = gateway.current().get(id).cloned().unwrap();
        assert_eq!(renamed.title, "renamed");
        assert_eq!(renamed.deadline, Some(7));

        gateway.delete(renamed).await.unwrap();
        assert!(gateway.current().is_empty());
        assert!(gateway.database().get_task(id).unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_conflicting_id_replaces_record() {
        let gateway = setup_gateway();
        let id = gateway.insert(Task::new("original", None)).await.unwrap();

        let replacement = Task {
            id: Some(id),
            ..Task::new("replacement", None)
        };
        assert_eq!(gateway.insert(replacement).await.unwrap(), id);

        let snapshot = gateway.current();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(id).unwrap().title, "replacement");
    }

    #[tokio::test]
    async fn failed_write_rolls_back_without_emitting() {
        let gateway = setup_gateway();
        let id = gateway.insert(Task::new("kept", None)).await.unwrap();
        gateway
            .database()
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER read_only_insert BEFORE INSERT ON tasks
                     BEGIN SELECT RAISE(ABORT, 'read only'); END;
                     CREATE TRIGGER read_only_update BEFORE UPDATE ON tasks
                     BEGIN SELECT RAISE(ABORT, 'read only'); END;",
                )?;
                Ok(())
            })
            .unwrap();
        let mut rx = gateway.observe_all();
        rx.borrow_and_update();

        let err = gateway.insert(Task::new("rejected", None)).await.unwrap_err();
        assert!(err.is_storage());

        let stored = gateway.current().get(id).cloned().unwrap();
        let err = gateway.update(stored.toggled(1_000)).await.unwrap_err();
        assert!(err.is_storage());

        assert!(!rx.has_changed().unwrap());
        let tasks = gateway.database().list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].is_completed);
        assert_eq!(gateway.current().tasks(), tasks.as_slice());
    }
}

mod gateway_cell_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_access_opens_once() {
        let dir = tempfile::tempdir().unwrap();
        let cell = Arc::new(GatewayCell::new(StoreConfig::at(
            dir.path().join("store").join("tasks.db"),
        )));
        assert!(!cell.is_initialized());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move { cell.get().await.unwrap() })
            })
            .collect();

        let mut gateways = Vec::new();
        for handle in handles {
            gateways.push(handle.await.unwrap());
        }

        assert!(cell.is_initialized());
        assert!(gateways.iter().all(|g| Arc::ptr_eq(g, &gateways[0])));
        assert!(dir.path().join("store").join("tasks.db").exists());
    }

    #[tokio::test]
    async fn failed_open_is_reported_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let cell = GatewayCell::new(StoreConfig::at(blocker.join("tasks.db")));
        let err = match cell.get().await {
            Ok(_) => panic!("opening under a regular file should fail"),
            Err(err) => err,
        };

        assert!(err.is_storage());
        assert!(!cell.is_initialized());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at(dir.path().join("tasks.db"));

        {
            let cell = GatewayCell::new(config.clone());
            let gateway = cell.get().await.unwrap();
            gateway.insert(Task::new("persisted", Some(86_400_000))).await.unwrap();
        }

        let gateway = GatewayCell::new(config).get().await.unwrap();
        let snapshot = gateway.current();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.tasks()[0].title, "persisted");
        assert_eq!(snapshot.tasks()[0].deadline, Some(86_400_000));
    }
}
