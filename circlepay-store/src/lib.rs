//! SQLite persistence for CirclePay.
//!
//! [`SqliteStore`] implements both [`TransferStore`](circlepay::TransferStore)
//! and [`CampaignStore`](circlepay::CampaignStore) over a single database
//! file. Statements run on the blocking thread pool against connections
//! checked out of a fixed-size pool owned by the store.
//!
//! `mark_executed` is a single conditional `UPDATE ... WHERE executed = 0`,
//! so the compare-and-set holds across processes sharing the file too.

mod campaigns;
mod pool;
mod transfers;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use circlepay::StoreError;
use rusqlite::Connection;

use crate::pool::Pool;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS transfers (
        id                TEXT PRIMARY KEY,
        initiator         TEXT NOT NULL,
        sender            TEXT NOT NULL,
        receiver          TEXT NOT NULL,
        amount            TEXT NOT NULL,
        chain_id          INTEGER NOT NULL,
        destination_chain INTEGER NOT NULL,
        valid_after       INTEGER NOT NULL,
        valid_before      INTEGER NOT NULL,
        nonce             TEXT NOT NULL,
        sign              BLOB NOT NULL,
        executed          INTEGER NOT NULL DEFAULT 0,
        transaction_hash  TEXT,
        initiate_date     INTEGER NOT NULL,
        executed_at       INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_transfers_sender_nonce ON transfers(chain_id, sender, nonce);
    CREATE INDEX IF NOT EXISTS idx_transfers_initiate_date ON transfers(initiate_date);
    CREATE TABLE IF NOT EXISTS campaigns (
        id      TEXT PRIMARY KEY,
        owner   TEXT NOT NULL,
        reserve TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_campaigns_owner ON campaigns(owner);
";

/// Maps any backend failure to [`StoreError::Backend`].
pub(crate) fn backend(error: impl fmt::Display) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// Connections opened for an on-disk database unless configured otherwise.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// SQLite-backed transfer and campaign store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<Pool>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` with
    /// [`DEFAULT_POOL_SIZE`] connections.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the file cannot be opened or the
    /// schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_pool_size(path, DEFAULT_POOL_SIZE)
    }

    /// Opens (or creates) the database at `path` with `pool_size`
    /// connections.
    ///
    /// On Unix the file is restricted to its owner, since it holds signed
    /// authorizations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the file cannot be opened or the
    /// schema cannot be applied.
    pub fn open_with_pool_size(
        path: impl AsRef<Path>,
        pool_size: usize,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let pool = Pool::open(path, pool_size)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(_e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            {
                #[cfg(feature = "telemetry")]
                tracing::warn!(path = %path.display(), error = %_e, "failed to restrict database permissions");
            }
        }

        Self::with_schema(pool)
    }

    /// Opens a private in-memory database on a single connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if SQLite fails to initialize.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_schema(Pool::in_memory()?)
    }

    fn with_schema(pool: Arc<Pool>) -> Result<Self, StoreError> {
        let conn = pool.try_acquire().ok_or_else(|| {
            StoreError::Backend("no connection available for schema setup".into())
        })?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        drop(conn);
        Ok(Self { pool })
    }

    /// Runs `f` on a pooled connection on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let mut conn = self.pool.acquire().await?;
        tokio::task::spawn_blocking(move || f(&mut *conn))
            .await
            .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
    }
}
