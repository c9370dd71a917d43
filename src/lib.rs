//! Task list state over a live-observable SQLite task store.
//!
//! [`gateway::SqliteGateway`] persists tasks and publishes the full set on
//! every change; [`state::TaskListState`] combines that set with the current
//! [`types::Filter`] and serializes all mutations.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod gateway;
pub mod logging;
pub mod state;
pub mod types;
