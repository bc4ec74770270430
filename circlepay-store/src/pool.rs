//! A fixed-size SQLite connection pool.
//!
//! Connections are opened up front. [`Pool::acquire`] waits for a permit and
//! hands out a [`PooledConnection`] guard; dropping the guard puts the
//! connection back, whichever thread it is dropped on.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use circlepay::StoreError;
use rusqlite::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::backend;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct Pool {
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl Pool {
    /// Opens `size` connections to the database file at `path`.
    pub(crate) fn open(path: &Path, size: usize) -> Result<Arc<Self>, StoreError> {
        let size = size.max(1);
        let connections = (0..size)
            .map(|_| {
                let conn = Connection::open(path).map_err(backend)?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })
                .map_err(backend)?;
                conn.busy_timeout(BUSY_TIMEOUT).map_err(backend)?;
                Ok(conn)
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(Self::from_connections(connections))
    }

    /// A single private in-memory connection.
    pub(crate) fn in_memory() -> Result<Arc<Self>, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Ok(Self::from_connections(vec![conn]))
    }

    fn from_connections(connections: Vec<Connection>) -> Arc<Self> {
        let size = connections.len();
        Arc::new(Self {
            idle: Mutex::new(connections),
            permits: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    /// Waits for a free connection.
    pub(crate) async fn acquire(self: &Arc<Self>) -> Result<PooledConnection, StoreError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(backend)?;
        self.checkout(permit)
    }

    /// Takes a free connection if one is available right now.
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Option<PooledConnection> {
        let permit = Arc::clone(&self.permits).try_acquire_owned().ok()?;
        self.checkout(permit).ok()
    }

    fn checkout(
        self: &Arc<Self>,
        permit: OwnedSemaphorePermit,
    ) -> Result<PooledConnection, StoreError> {
        let conn = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or_else(|| StoreError::Backend("connection pool is exhausted".into()))?;
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }
}

/// A connection checked out of the [`Pool`].
pub(crate) struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<Pool>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    #[allow(clippy::unwrap_used)]
    fn deref(&self) -> &Connection {
        // Only `Drop` takes the connection out.
        self.conn.as_ref().unwrap()
    }
}

impl DerefMut for PooledConnection {
    #[allow(clippy::unwrap_used)]
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(conn);
        }
    }
}
