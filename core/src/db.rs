use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// Key of the recipe list document.
pub const RECIPES_KEY: &str = "recipes";
/// Key of the optional user profile document.
pub const USER_KEY: &str = "user";
/// Key of the view history document.
pub const HISTORY_KEY: &str = "history";
/// Key of the settings document.
pub const SETTINGS_KEY: &str = "settings";

/// Key/value persistence for whole JSON documents.
///
/// `save` writes every pair or none of them, so a failed save leaves the
/// previously stored documents untouched.
pub trait DocumentStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, documents: &[(&str, String)]) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<bool>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    #[cfg(test)]
    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM documents ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl DocumentStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to load document '{key}'"))
    }

    fn save(&mut self, documents: &[(&str, String)]) -> Result<()> {
        let now = chrono::Local::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        for (key, value) in documents {
            tx.execute(
                "INSERT INTO documents (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("Failed to save document '{key}'"))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM documents WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}
