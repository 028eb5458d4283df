//! Error type for `agentdesk-store-sqlite`.
//!
//! SQLite failures are classified as they leave the database thread: unique,
//! foreign-key and check failures become [`Error::ConstraintViolation`], lock
//! contention and connectivity problems become [`Error::StorageUnavailable`].
//! Everything else keeps the operation name and target for diagnosis.

use agentdesk_core::Entity;
use rusqlite::ErrorCode;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} not found: {key}")]
  NotFound { entity: Entity, key: String },

  #[error("constraint violation: {0}")]
  ConstraintViolation(String),

  #[error("malformed identifier: {0:?}")]
  MalformedId(String),

  #[error("transaction failed during {op}: {source}")]
  TransactionFailure {
    op:     &'static str,
    #[source]
    source: BoxError,
  },

  #[error("storage unavailable during {op} ({target}): {source}")]
  StorageUnavailable {
    op:     &'static str,
    target: String,
    #[source]
    source: tokio_rusqlite::Error,
  },

  #[error("{op} cancelled")]
  Cancelled { op: &'static str },

  #[error("database error during {op} ({target}): {source}")]
  Database {
    op:     &'static str,
    target: String,
    #[source]
    source: tokio_rusqlite::Error,
  },

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value could not be decoded into its domain type.
  #[error("corrupt row: {0}")]
  Corrupt(String),
}

/// Coarse classification for transports and retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  ConstraintViolation,
  TransactionFailure,
  StorageUnavailable,
  Cancelled,
  Internal,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::NotFound { .. } => ErrorKind::NotFound,
      Error::ConstraintViolation(_) | Error::MalformedId(_) => {
        ErrorKind::ConstraintViolation
      }
      Error::TransactionFailure { .. } => ErrorKind::TransactionFailure,
      Error::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
      Error::Cancelled { .. } => ErrorKind::Cancelled,
      Error::Database { .. } | Error::DateParse(_) | Error::Corrupt(_) => {
        ErrorKind::Internal
      }
    }
  }

  /// Whether the caller may retry the same operation unchanged.
  pub fn is_retryable(&self) -> bool {
    self.kind() == ErrorKind::StorageUnavailable
  }

  pub(crate) fn not_found(entity: Entity, key: impl ToString) -> Self {
    Error::NotFound { entity, key: key.to_string() }
  }

  pub(crate) fn constraint(msg: impl Into<String>) -> Self {
    Error::ConstraintViolation(msg.into())
  }

  /// Classify a failure reported by the database thread.
  pub(crate) fn storage(
    op: &'static str,
    target: impl ToString,
    source: tokio_rusqlite::Error,
  ) -> Self {
    let target = target.to_string();
    match sqlite_code(&source) {
      Some(ErrorCode::ConstraintViolation) => {
        Error::ConstraintViolation(format!("{op} ({target}): {source}"))
      }
      Some(code) if is_unavailable(code) => {
        Error::StorageUnavailable { op, target, source }
      }
      _ if matches!(source, tokio_rusqlite::Error::ConnectionClosed) => {
        Error::StorageUnavailable { op, target, source }
      }
      _ => Error::Database { op, target, source },
    }
  }

  /// Classify a failure to begin, commit or roll back a transaction.
  pub(crate) fn transaction(op: &'static str, source: tokio_rusqlite::Error) -> Self {
    match sqlite_code(&source) {
      Some(code) if is_unavailable(code) => Error::StorageUnavailable {
        op,
        target: "transaction".to_owned(),
        source,
      },
      _ => Error::TransactionFailure { op, source: Box::new(source) },
    }
  }
}

fn sqlite_code(err: &tokio_rusqlite::Error) -> Option<ErrorCode> {
  match err {
    tokio_rusqlite::Error::Rusqlite(e) => e.sqlite_error_code(),
    _ => None,
  }
}

fn is_unavailable(code: ErrorCode) -> bool {
  matches!(
    code,
    ErrorCode::DatabaseBusy
      | ErrorCode::DatabaseLocked
      | ErrorCode::CannotOpen
      | ErrorCode::SystemIoFailure
  )
}

impl From<agentdesk_core::Error> for Error {
  fn from(err: agentdesk_core::Error) -> Self {
    match err {
      agentdesk_core::Error::NotFound { entity, key } => {
        Error::NotFound { entity, key }
      }
      agentdesk_core::Error::ConstraintViolation(msg) => {
        Error::ConstraintViolation(msg)
      }
      agentdesk_core::Error::MalformedId(s) => Error::MalformedId(s),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
