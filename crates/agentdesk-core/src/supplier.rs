//! Suppliers: external booking systems (GDSs, airlines, bed banks).
//!
//! Suppliers are reference data: created once, never edited, and only
//! soft-deleted while no live credential points at them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Id, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
  pub id:         Id,
  /// Stable short code such as `AMADEUS`; unique across all rows.
  pub code:       String,
  pub name:       String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplier {
  pub code: String,
  pub name: String,
}

impl NewSupplier {
  pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
    Self { code: code.into(), name: name.into() }
  }

  pub fn into_supplier(self, now: DateTime<Utc>) -> Result<Supplier> {
    if self.code.trim().is_empty() {
      return Err(Error::constraint("supplier code must not be empty"));
    }
    Ok(Supplier {
      id:         Id::new(),
      code:       self.code,
      name:       self.name,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    })
  }
}
