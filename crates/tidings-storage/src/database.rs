// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use tidings_core::TidingsError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into TidingsError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TidingsError {
    TidingsError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database behind a single writer thread.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, TidingsError> {
        let conn = Connection::open(path.to_string()).await.map_err(|e| {
            TidingsError::Storage {
                source: Box::new(e),
            }
        })?;
        let db = Self { conn };
        db.setup().await?;
        debug!(path, "database opened");
        Ok(db)
    }

    /// Open an in-memory database with migrations applied. Test use.
    pub async fn open_in_memory() -> Result<Self, TidingsError> {
        let conn = Connection::open_in_memory().await.map_err(|e| {
            TidingsError::Storage {
                source: Box::new(e),
            }
        })?;
        let db = Self { conn };
        db.setup().await?;
        Ok(db)
    }

    async fn setup(&self) -> Result<(), TidingsError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.busy_timeout(std::time::Duration::from_millis(5000))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                migrations::run_migrations(conn)
                    .map_err(|e| rusqlite::Error::ModuleError(e.to_string()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and flush pending writes.
    pub async fn close(&self) -> Result<(), TidingsError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
