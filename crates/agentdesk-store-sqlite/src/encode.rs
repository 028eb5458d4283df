//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, identifiers their 26-character text form,
//! booleans `0`/`1`, and credential payloads raw blobs.

use agentdesk_core::{
  Id,
  agent::{Agent, AgentType, AgentView},
  credential::Credential,
  supplier::Supplier,
  user::User,
};
use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_id(id: Id) -> String { id.to_string() }

pub fn decode_id(s: &str) -> Result<Id> {
  s.parse()
    .map_err(|_| Error::Corrupt(format!("invalid stored id: {s:?}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

fn decode_opt_id(s: Option<&str>) -> Result<Option<Id>> {
  s.map(decode_id).transpose()
}

/// SQLite binds integers as `i64`; offsets past `i64::MAX` clamp so they
/// select nothing instead of wrapping negative.
pub fn encode_offset(offset: u64) -> i64 {
  i64::try_from(offset).unwrap_or(i64::MAX)
}

pub fn encode_agent_type(t: AgentType) -> &'static str {
  match t {
    AgentType::Iata => "IATA",
    AgentType::SubAgent => "SUB_AGENT",
  }
}

pub fn decode_agent_type(s: &str) -> Result<AgentType> {
  match s {
    "IATA" => Ok(AgentType::Iata),
    "SUB_AGENT" => Ok(AgentType::SubAgent),
    other => Err(Error::Corrupt(format!("unknown agent type: {other:?}"))),
  }
}

// ─── Agents ──────────────────────────────────────────────────────────────────

pub const AGENT_COLUMNS: &str = "id, agent_name, email, agent_type, \
  parent_agent_id, is_active, created_at, updated_at, deleted_at";

/// Raw values read directly from an `agents` row.
pub struct RawAgent {
  pub id:              String,
  pub name:            String,
  pub email:           String,
  pub agent_type:      String,
  pub parent_agent_id: Option<String>,
  pub is_active:       bool,
  pub created_at:      String,
  pub updated_at:      String,
  pub deleted_at:      Option<String>,
}

impl RawAgent {
  /// Read the columns listed in [`AGENT_COLUMNS`], in order.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      name:            row.get(1)?,
      email:           row.get(2)?,
      agent_type:      row.get(3)?,
      parent_agent_id: row.get(4)?,
      is_active:       row.get(5)?,
      created_at:      row.get(6)?,
      updated_at:      row.get(7)?,
      deleted_at:      row.get(8)?,
    })
  }

  pub fn into_agent(self) -> Result<Agent> {
    Ok(Agent {
      id:              decode_id(&self.id)?,
      name:            self.name,
      email:           self.email,
      agent_type:      decode_agent_type(&self.agent_type)?,
      parent_agent_id: decode_opt_id(self.parent_agent_id.as_deref())?,
      is_active:       self.is_active,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
      deleted_at:      decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

/// An agent row with its parent and live children, as read in one snapshot.
pub struct RawAgentView {
  pub agent:    RawAgent,
  pub parent:   Option<RawAgent>,
  pub children: Vec<RawAgent>,
}

impl RawAgentView {
  pub fn into_view(self) -> Result<AgentView> {
    Ok(AgentView {
      agent:    self.agent.into_agent()?,
      parent:   self.parent.map(RawAgent::into_agent).transpose()?,
      children: self
        .children
        .into_iter()
        .map(RawAgent::into_agent)
        .collect::<Result<_>>()?,
    })
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "id, agent_id, name, email, password_hash, \
  is_active, created_at, updated_at, deleted_at";

pub struct RawUser {
  pub id:            String,
  pub agent_id:      Option<String>,
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub is_active:     bool,
  pub created_at:    String,
  pub updated_at:    String,
  pub deleted_at:    Option<String>,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      agent_id:      row.get(1)?,
      name:          row.get(2)?,
      email:         row.get(3)?,
      password_hash: row.get(4)?,
      is_active:     row.get(5)?,
      created_at:    row.get(6)?,
      updated_at:    row.get(7)?,
      deleted_at:    row.get(8)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:            decode_id(&self.id)?,
      agent_id:      decode_opt_id(self.agent_id.as_deref())?,
      name:          self.name,
      email:         self.email,
      password_hash: self.password_hash,
      is_active:     self.is_active,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
      deleted_at:    decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

// ─── Suppliers ───────────────────────────────────────────────────────────────

pub const SUPPLIER_COLUMNS: &str =
  "id, supplier_code, supplier_name, created_at, updated_at, deleted_at";

pub struct RawSupplier {
  pub id:         String,
  pub code:       String,
  pub name:       String,
  pub created_at: String,
  pub updated_at: String,
  pub deleted_at: Option<String>,
}

impl RawSupplier {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      code:       row.get(1)?,
      name:       row.get(2)?,
      created_at: row.get(3)?,
      updated_at: row.get(4)?,
      deleted_at: row.get(5)?,
    })
  }

  pub fn into_supplier(self) -> Result<Supplier> {
    Ok(Supplier {
      id:         decode_id(&self.id)?,
      code:       self.code,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      deleted_at: decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

// ─── Credentials ─────────────────────────────────────────────────────────────

pub const CREDENTIAL_COLUMNS: &str = "id, iata_agent_id, supplier_id, \
  credentials_opaque, created_at, updated_at, deleted_at";

pub struct RawCredential {
  pub id:          String,
  pub agent_id:    String,
  pub supplier_id: String,
  pub payload:     Vec<u8>,
  pub created_at:  String,
  pub updated_at:  String,
  pub deleted_at:  Option<String>,
}

impl RawCredential {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      agent_id:    row.get(1)?,
      supplier_id: row.get(2)?,
      payload:     row.get(3)?,
      created_at:  row.get(4)?,
      updated_at:  row.get(5)?,
      deleted_at:  row.get(6)?,
    })
  }

  pub fn into_credential(self) -> Result<Credential> {
    Ok(Credential {
      id:          decode_id(&self.id)?,
      agent_id:    decode_id(&self.agent_id)?,
      supplier_id: decode_id(&self.supplier_id)?,
      payload:     self.payload.into(),
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
      deleted_at:  decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}
