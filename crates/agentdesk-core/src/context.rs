//! Per-call context: a cancellation signal plus an optional unit of work.
//!
//! Every repository operation receives a [`Context`]. When the context carries
//! a unit of work, the operation runs inside it; otherwise the backend uses
//! its default handle. The unit-of-work type is chosen by the backend, so the
//! handle is strongly typed end to end.

use tokio_util::sync::CancellationToken;

pub struct Context<U> {
  cancel: CancellationToken,
  unit:   Option<U>,
}

impl<U> Context<U> {
  /// A context with a fresh, never-cancelled token and no unit of work.
  pub fn new() -> Self { Self::with_cancellation(CancellationToken::new()) }

  /// A context that is cancelled when `token` is.
  pub fn with_cancellation(token: CancellationToken) -> Self {
    Self { cancel: token, unit: None }
  }

  pub fn cancellation(&self) -> &CancellationToken { &self.cancel }

  pub fn is_cancelled(&self) -> bool { self.cancel.is_cancelled() }

  /// Resolves once the caller cancels.
  pub async fn cancelled(&self) { self.cancel.cancelled().await }

  /// The active unit of work, if any.
  pub fn unit_of_work(&self) -> Option<&U> { self.unit.as_ref() }

  /// A copy of this context that runs operations inside `unit`. The
  /// cancellation token is shared.
  pub fn in_unit_of_work(&self, unit: U) -> Self {
    Self { cancel: self.cancel.clone(), unit: Some(unit) }
  }
}

impl<U> Default for Context<U> {
  fn default() -> Self { Self::new() }
}

impl<U: Clone> Clone for Context<U> {
  fn clone(&self) -> Self {
    Self { cancel: self.cancel.clone(), unit: self.unit.clone() }
  }
}

impl<U> std::fmt::Debug for Context<U> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Context")
      .field("cancelled", &self.cancel.is_cancelled())
      .field("in_unit_of_work", &self.unit.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unit_of_work_shares_cancellation() {
    let root: Context<u8> = Context::new();
    let scoped = root.in_unit_of_work(7);

    assert_eq!(scoped.unit_of_work(), Some(&7));
    assert!(root.unit_of_work().is_none());

    root.cancellation().cancel();
    assert!(scoped.is_cancelled());
  }

  #[tokio::test]
  async fn cancelled_resolves_after_cancel() {
    let ctx: Context<()> = Context::new();
    ctx.cancellation().cancel();
    ctx.cancelled().await;
  }
}
