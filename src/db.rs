#[cfg(test)]
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

pub const KEY_TEMPLATES: &str = "templates";
pub const KEY_UI_STATE: &str = "uiState";

/// Durable key/value blob storage. Values are whole JSON documents; there are
/// no partial writes.
pub trait Persistence {
    /// Returns the stored values for the keys that exist. Missing keys are absent from the map.
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    fn set(&self, entries: Vec<(&str, Value)>) -> Result<()>;
}

// ── SQLite ──

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

impl Persistence for SqliteStorage {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = stmt
                .query_row(rusqlite::params![key], |row| row.get(0))
                .optional()?;
            if let Some(raw) = raw {
                out.insert(key.to_string(), serde_json::from_str(&raw)?);
            }
        }
        Ok(out)
    }

    fn set(&self, entries: Vec<(&str, Value)>) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )?;
            for (key, value) in &entries {
                stmt.execute(rusqlite::params![key, value.to_string()])?;
            }
        }
        tx.commit()?;
        debug!(keys = entries.len(), "persisted");
        Ok(())
    }
}

// ── In-memory ──

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    values: RefCell<HashMap<String, Value>>,
}

#[cfg(test)]
impl Persistence for MemoryStorage {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let values = self.values.borrow();
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, entries: Vec<(&str, Value)>) -> Result<()> {
        let mut values = self.values.borrow_mut();
        for (key, value) in entries {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }
}

// ── Tests ──
