//! Error types for `agentdesk-core`.

use std::fmt;

use thiserror::Error;

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Agent,
  User,
  Supplier,
  Credential,
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Entity::Agent => "agent",
      Entity::User => "user",
      Entity::Supplier => "supplier",
      Entity::Credential => "credential",
    })
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// No live row matches; either it never existed or it is soft-deleted.
  #[error("{entity} not found: {key}")]
  NotFound { entity: Entity, key: String },

  /// A uniqueness, referential, or hierarchy rule would be broken.
  #[error("constraint violation: {0}")]
  ConstraintViolation(String),

  #[error("malformed identifier: {0:?}")]
  MalformedId(String),
}

impl Error {
  pub fn not_found(entity: Entity, key: impl fmt::Display) -> Self {
    Self::NotFound { entity, key: key.to_string() }
  }

  pub fn constraint(msg: impl Into<String>) -> Self {
    Self::ConstraintViolation(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
