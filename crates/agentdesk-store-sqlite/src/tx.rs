//! Units of work: [`Transaction`] handles and the
//! [`TransactionCoordinator`] implementation.

use std::{
  fmt,
  future::Future,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use agentdesk_core::{Id, store::TransactionCoordinator};
use tracing::{debug, info, warn};

use crate::{Ctx, Error, Result, SqliteStore};

// ─── Handle ──────────────────────────────────────────────────────────────────

/// A handle to one open SQLite transaction on a dedicated connection.
///
/// Cloning shares the same transaction. Once committed or rolled back the
/// handle refuses further work. If every clone is dropped while the
/// transaction is still open, closing the connection rolls it back.
#[derive(Clone)]
pub struct Transaction {
  inner: Arc<Inner>,
}

struct Inner {
  id:       Id,
  conn:     tokio_rusqlite::Connection,
  finished: AtomicBool,
}

impl Transaction {
  fn new(conn: tokio_rusqlite::Connection) -> Self {
    Self {
      inner: Arc::new(Inner { id: Id::new(), conn, finished: AtomicBool::new(false) }),
    }
  }

  /// Identifier used to correlate log lines for this unit of work.
  pub fn id(&self) -> Id { self.inner.id }

  pub fn is_finished(&self) -> bool { self.inner.finished.load(Ordering::Acquire) }

  pub(crate) fn connection(&self, op: &'static str) -> Result<tokio_rusqlite::Connection> {
    if self.is_finished() {
      return Err(Error::TransactionFailure {
        op,
        source: format!("unit of work {} already finished", self.inner.id).into(),
      });
    }
    Ok(self.inner.conn.clone())
  }

  async fn finish(&self, op: &'static str, sql: &'static str) -> Result<()> {
    if self.inner.finished.swap(true, Ordering::AcqRel) {
      return Err(Error::TransactionFailure {
        op,
        source: format!("unit of work {} already finished", self.inner.id).into(),
      });
    }
    self
      .inner
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await
      .map_err(|e| Error::transaction(op, e))
  }

  async fn commit(&self) -> Result<()> {
    let result = self.finish("commit", "COMMIT").await;
    if result.is_err() {
      // A failed COMMIT can leave the transaction open.
      let cleanup = self
        .inner
        .conn
        .call(|conn| {
          if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
          }
          Ok(())
        })
        .await;
      if let Err(e) = cleanup {
        warn!(tx = %self.inner.id, error = %e, "rollback after failed commit failed");
      }
    }
    result
  }

  async fn rollback(&self) -> Result<()> { self.finish("rollback", "ROLLBACK").await }
}

impl fmt::Debug for Transaction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Transaction")
      .field("id", &self.inner.id)
      .field("finished", &self.is_finished())
      .finish()
  }
}

impl Drop for Inner {
  fn drop(&mut self) {
    if !*self.finished.get_mut() {
      warn!(tx = %self.id, "unit of work dropped while open; rolling back");
    }
  }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

impl SqliteStore {
  async fn begin(&self, ctx: &Ctx) -> Result<Transaction> {
    let conn = self.connect().await?;
    let begin = conn.call(|conn| {
      conn.execute_batch("BEGIN IMMEDIATE")?;
      Ok(())
    });

    tokio::select! {
      biased;
      _ = ctx.cancelled() => return Err(Error::Cancelled { op: "begin" }),
      began = begin => began.map_err(|e| Error::transaction("begin", e))?,
    }

    let tx = Transaction::new(conn);
    debug!(tx = %tx.id(), "unit of work started");
    Ok(tx)
  }
}

impl TransactionCoordinator for SqliteStore {
  async fn run_in_transaction<'a, T, E, F, Fut>(
    &'a self,
    ctx: &'a Ctx,
    work: F,
  ) -> std::result::Result<T, E>
  where
    T: Send + 'a,
    E: From<Error> + Send + 'a,
    F: FnOnce(Ctx) -> Fut + Send + 'a,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'a,
  {
    if let Some(active) = ctx.unit_of_work()
      && !active.is_finished()
    {
      debug!(tx = %active.id(), "joining active unit of work");
      return work(ctx.clone()).await;
    }

    let tx = self.begin(ctx).await?;
    let scoped = ctx.in_unit_of_work(tx.clone());

    let outcome = tokio::select! {
      biased;
      _ = ctx.cancelled() => {
        warn!(tx = %tx.id(), "unit of work cancelled");
        Err(E::from(Error::Cancelled { op: "transaction" }))
      }
      outcome = work(scoped) => outcome,
    };

    match outcome {
      Ok(value) => {
        tx.commit().await?;
        info!(tx = %tx.id(), "unit of work committed");
        Ok(value)
      }
      Err(err) => {
        match tx.rollback().await {
          Ok(()) => debug!(tx = %tx.id(), "unit of work rolled back"),
          Err(e) => warn!(tx = %tx.id(), error = %e, "rollback failed"),
        }
        Err(err)
      }
    }
  }
}
