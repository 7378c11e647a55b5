use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bindings (
    routing_key TEXT PRIMARY KEY,
    candidate_id TEXT NOT NULL,
    owner_id TEXT,
    last_checked_at INTEGER NOT NULL,
    previous_candidate_id TEXT
);
CREATE TABLE IF NOT EXISTS candidates (
    candidate_id TEXT PRIMARY KEY,
    routing_key TEXT NOT NULL,
    owner_id TEXT,
    description TEXT NOT NULL DEFAULT '',
    command_template TEXT NOT NULL DEFAULT '',
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS candidates_by_key ON candidates (routing_key, updated_at DESC);
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store is closed")]
    Closed,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store worker failed: {0}")]
    Worker(String),
}

/// Shared handle over the sqlite connection backing bindings and candidates.
///
/// Clones share one connection; its mutex serializes every statement, so
/// writes to the same routing key never interleave.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Option<Connection>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn open_file(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_from_config(cfg: &Config) -> Result<Self, StoreError> {
        Self::open_file(&cfg.database_path)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Runs `op` against the connection on the blocking pool.
    pub async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            op(conn).map_err(StoreError::from)
        })
        .await
        .map_err(|error| StoreError::Worker(error.to_string()))?
    }

    /// Drops the connection; later operations on any clone fail with [`StoreError::Closed`].
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, error)| StoreError::Sqlite(error))?;
        }
        Ok(())
    }
}
