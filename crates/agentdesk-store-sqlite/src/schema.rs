//! SQL schema for the agentdesk SQLite store.
//!
//! Applied once at startup when `PRAGMA user_version` is behind
//! [`SCHEMA_VERSION`]. Uniqueness that only applies to live rows is expressed
//! as partial unique indexes, so the check and the insert are one atomic step.

pub const SCHEMA_VERSION: i64 = 1;

/// Applied on every connection, including the per-transaction ones.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA foreign_keys = ON;
";

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id              TEXT PRIMARY KEY,
    agent_name      TEXT NOT NULL,
    email           TEXT NOT NULL,
    agent_type      TEXT NOT NULL CHECK (agent_type IN ('IATA', 'SUB_AGENT')),
    parent_agent_id TEXT REFERENCES agents(id),
    is_active       INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    deleted_at      TEXT,
    CHECK (
      (agent_type = 'IATA'      AND parent_agent_id IS NULL) OR
      (agent_type = 'SUB_AGENT' AND parent_agent_id IS NOT NULL)
    ),
    CHECK (parent_agent_id IS NULL OR parent_agent_id != id)
);

CREATE UNIQUE INDEX IF NOT EXISTS agents_email_live_idx
    ON agents(email) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS agents_parent_idx ON agents(parent_agent_id);

CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    agent_id      TEXT REFERENCES agents(id) ON DELETE SET NULL,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS users_email_live_idx
    ON users(email) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS users_agent_idx ON users(agent_id);

-- Reference data; codes stay reserved even after a soft delete.
CREATE TABLE IF NOT EXISTS suppliers (
    id            TEXT PRIMARY KEY,
    supplier_code TEXT NOT NULL UNIQUE,
    supplier_name TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT
);

-- credentials_opaque is caller-encrypted ciphertext, stored verbatim.
CREATE TABLE IF NOT EXISTS agent_supplier_credentials (
    id                 TEXT PRIMARY KEY,
    iata_agent_id      TEXT NOT NULL REFERENCES agents(id),
    supplier_id        TEXT NOT NULL REFERENCES suppliers(id) ON DELETE RESTRICT,
    credentials_opaque BLOB NOT NULL,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    deleted_at         TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS credentials_pair_live_idx
    ON agent_supplier_credentials(iata_agent_id, supplier_id)
    WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS credentials_supplier_idx
    ON agent_supplier_credentials(supplier_id);

PRAGMA user_version = 1;
";
