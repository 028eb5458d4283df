//! Per-agent, per-supplier credentials.
//!
//! The payload is ciphertext produced by the caller. This crate stores and
//! returns it byte-for-byte and never looks inside.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Id, Result};

/// An encrypted credential blob. `Debug` prints only the length.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OpaquePayload(Vec<u8>);

impl OpaquePayload {
  pub fn as_bytes(&self) -> &[u8] { &self.0 }

  pub fn into_bytes(self) -> Vec<u8> { self.0 }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<u8>> for OpaquePayload {
  fn from(bytes: Vec<u8>) -> Self { Self(bytes) }
}

impl From<&[u8]> for OpaquePayload {
  fn from(bytes: &[u8]) -> Self { Self(bytes.to_vec()) }
}

impl From<&str> for OpaquePayload {
  fn from(text: &str) -> Self { Self(text.as_bytes().to_vec()) }
}

impl fmt::Debug for OpaquePayload {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "OpaquePayload(<{} bytes>)", self.0.len())
  }
}

/// The live (or historical, once soft-deleted) credential set an agent uses
/// against one supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
  pub id:          Id,
  pub agent_id:    Id,
  pub supplier_id: Id,
  #[serde(skip_serializing)]
  pub payload:     OpaquePayload,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
  pub deleted_at:  Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCredential {
  pub agent_id:    Id,
  pub supplier_id: Id,
  pub payload:     OpaquePayload,
}

impl NewCredential {
  pub fn new(
    agent_id: Id,
    supplier_id: Id,
    payload: impl Into<OpaquePayload>,
  ) -> Self {
    Self { agent_id, supplier_id, payload: payload.into() }
  }

  pub fn into_credential(self, now: DateTime<Utc>) -> Result<Credential> {
    Ok(Credential {
      id:          Id::new(),
      agent_id:    self.agent_id,
      supplier_id: self.supplier_id,
      payload:     self.payload,
      created_at:  now,
      updated_at:  now,
      deleted_at:  None,
    })
  }
}
