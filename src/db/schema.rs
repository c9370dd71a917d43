//! Schema introspection queries for the task database.

use super::Database;
use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Information about a table column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

impl Database {
    /// Highest migration version applied, or `None` for an unmigrated file.
    pub fn schema_version(&self) -> Result<Option<i32>> {
        self.with_conn(|conn| {
            let has_history: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master
                 WHERE type = 'table' AND name = 'refinery_schema_history'",
                [],
                |row| row.get(0),
            )?;
            if !has_history {
                return Ok(None);
            }

            let version: Option<i32> = conn.query_row(
                "SELECT MAX(version) FROM refinery_schema_history",
                [],
                |row| row.get(0),
            )?;
            Ok(version)
        })
    }

    /// Column information for a table, in declaration order.
    pub fn table_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        self.with_conn(|conn| get_table_columns(conn, table_name))
    }
}

fn get_table_columns(conn: &Connection, table_name: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
    )?;

    let columns = stmt
        .query_map([table_name], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
                nullable: row.get::<_, i32>(2)? == 0,
                default_value: row.get(3)?,
                primary_key: row.get::<_, i32>(4)? > 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(columns)
}
