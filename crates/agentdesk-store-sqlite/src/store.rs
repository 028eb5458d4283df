//! [`SqliteStore`]: connection management and the per-call execution path
//! shared by every repository.

use std::{
  fmt,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use agentdesk_core::{Id, store::Storage};
use rusqlite::TransactionBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
  Ctx, Error, Result, StoreConfig, Transaction,
  schema::{CONNECTION_PRAGMAS, SCHEMA, SCHEMA_VERSION},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The agentdesk store backed by SQLite.
///
/// Cloning is cheap; the default connection is reference-counted. Calls made
/// outside a unit of work are serialised on that connection; each unit of work
/// opens a second connection to the same database.
#[derive(Clone)]
pub struct SqliteStore {
  conn:         tokio_rusqlite::Connection,
  location:     Arc<Path>,
  busy_timeout: Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(StoreConfig::file(path.as_ref())).await
  }

  /// Open a private in-memory store, useful for testing.
  ///
  /// Each call gets its own database. It lives as long as the store (or any
  /// clone of it) does.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_with(StoreConfig::in_memory()).await
  }

  pub async fn open_with(config: StoreConfig) -> Result<Self> {
    let in_memory = config.is_in_memory();
    // A named `memdb` database is shared by every connection in the process
    // that opens the same name, which units of work rely on.
    let location: PathBuf = if in_memory {
      PathBuf::from(format!("file:/agentdesk-{}?vfs=memdb", Id::new()))
    } else {
      config.path
    };
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

    let conn = open_connection(&location, busy_timeout)
      .await
      .map_err(|e| Error::storage("open", location.display(), e))?;

    let store = Self { conn, location: location.into(), busy_timeout };
    store.init_schema(!in_memory).await?;
    debug!(location = %store.location.display(), "store opened");
    Ok(store)
  }

  async fn init_schema(&self, wal: bool) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        if wal {
          conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        let version: i64 =
          conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
          conn.execute_batch(SCHEMA)?;
        }
        Ok(())
      })
      .await
      .map_err(|e| Error::storage("init_schema", self.location.display(), e))
  }

  /// Open a fresh connection to this store's database for a unit of work.
  pub(crate) async fn connect(&self) -> Result<tokio_rusqlite::Connection> {
    open_connection(&self.location, self.busy_timeout)
      .await
      .map_err(|e| Error::transaction("begin", e))
  }

  /// Run `f` against the connection selected by `ctx`.
  ///
  /// Outside a unit of work `f` runs in its own transaction on the default
  /// connection; inside one it runs under a savepoint of the unit's
  /// transaction. Either way the statements in `f` apply atomically, and a
  /// cancellation observed before the commit discards them.
  pub(crate) async fn run<T, F>(
    &self,
    ctx: &Ctx,
    access: Access,
    op: &'static str,
    target: impl fmt::Display,
    f: F,
  ) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, Abort> + Send + 'static,
  {
    let target = target.to_string();
    let conn = match ctx.unit_of_work() {
      Some(tx) => tx.connection(op)?,
      None => self.conn.clone(),
    };

    if ctx.is_cancelled() {
      return Err(Error::Cancelled { op });
    }

    let guard = ctx.cancellation().clone();
    let call = conn.call(move |conn| Ok(atomically(conn, access, &guard, f)));

    let outcome = tokio::select! {
      biased;
      _ = ctx.cancelled() => {
        debug!(op, %target, "abandoning in-flight storage call");
        return Err(Error::Cancelled { op });
      }
      outcome = call => outcome,
    };

    let result = match outcome {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(Abort::Sql(e))) => Err(Error::storage(op, &target, e.into())),
      Ok(Err(Abort::Domain(e))) => Err(e),
      Ok(Err(Abort::Cancelled)) => Err(Error::Cancelled { op }),
      Err(e) => Err(Error::storage(op, &target, e)),
    };

    match &result {
      Ok(_) => debug!(op, %target, "ok"),
      Err(e) => debug!(op, %target, error = %e, "failed"),
    }
    result
  }
}

impl Storage for SqliteStore {
  type Error = Error;
  type UnitOfWork = Transaction;
}

pub(crate) async fn open_connection(
  location: &Path,
  busy_timeout: Duration,
) -> tokio_rusqlite::Result<tokio_rusqlite::Connection> {
  let conn = tokio_rusqlite::Connection::open(location).await?;
  conn
    .call(move |conn| {
      conn.busy_timeout(busy_timeout)?;
      conn.execute_batch(CONNECTION_PRAGMAS)?;
      Ok(())
    })
    .await?;
  Ok(conn)
}

// ─── Atomic scopes ───────────────────────────────────────────────────────────

/// Whether a call only reads or also writes. Writers take the database write
/// lock up front so check-then-write sequences cannot interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
  Read,
  Write,
}

impl Access {
  fn behavior(self) -> TransactionBehavior {
    match self {
      Access::Read => TransactionBehavior::Deferred,
      Access::Write => TransactionBehavior::Immediate,
    }
  }
}

/// Why a closure on the database thread stopped early. Any of these rolls
/// back the enclosing transaction or savepoint.
pub(crate) enum Abort {
  Sql(rusqlite::Error),
  Domain(Error),
  Cancelled,
}

impl From<rusqlite::Error> for Abort {
  fn from(e: rusqlite::Error) -> Self { Abort::Sql(e) }
}

impl From<Error> for Abort {
  fn from(e: Error) -> Self { Abort::Domain(e) }
}

impl From<agentdesk_core::Error> for Abort {
  fn from(e: agentdesk_core::Error) -> Self { Abort::Domain(e.into()) }
}

fn atomically<T>(
  conn: &mut rusqlite::Connection,
  access: Access,
  guard: &CancellationToken,
  f: impl FnOnce(&rusqlite::Connection) -> Result<T, Abort>,
) -> Result<T, Abort> {
  if guard.is_cancelled() {
    return Err(Abort::Cancelled);
  }

  // Dropping the transaction or savepoint without committing rolls it back.
  if conn.is_autocommit() {
    let tx = conn.transaction_with_behavior(access.behavior())?;
    let value = f(&tx)?;
    if guard.is_cancelled() {
      return Err(Abort::Cancelled);
    }
    tx.commit()?;
    Ok(value)
  } else {
    let sp = conn.savepoint()?;
    let value = f(&sp)?;
    if guard.is_cancelled() {
      return Err(Abort::Cancelled);
    }
    sp.commit()?;
    Ok(value)
  }
}
