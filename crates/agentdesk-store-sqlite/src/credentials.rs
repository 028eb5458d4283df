//! [`CredentialRepository`] for [`SqliteStore`].
//!
//! At most one live row exists per (agent, supplier); the partial unique index
//! `credentials_pair_live_idx` is the source of truth and a second insert is
//! reported as a constraint violation. Payloads are bound as blobs and never
//! inspected.

use agentdesk_core::{
  Entity, Id, Page, PageRequest,
  credential::{Credential, NewCredential, OpaquePayload},
  store::CredentialRepository,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, Params};

use crate::{
  Ctx, Error, Result, SqliteStore,
  agents::agent_is_live,
  encode::{CREDENTIAL_COLUMNS, RawCredential, encode_dt, encode_id, encode_offset},
  store::Access,
  suppliers::supplier_is_live,
};

fn select_credential(
  conn: &Connection,
  filter: &str,
  params: impl Params,
) -> rusqlite::Result<Option<RawCredential>> {
  conn
    .query_row(
      &format!(
        "SELECT {CREDENTIAL_COLUMNS} FROM agent_supplier_credentials WHERE {filter}"
      ),
      params,
      RawCredential::from_row,
    )
    .optional()
}

fn select_credentials(
  conn: &Connection,
  filter: &str,
  params: impl Params,
) -> rusqlite::Result<Vec<RawCredential>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {CREDENTIAL_COLUMNS} FROM agent_supplier_credentials WHERE {filter}"
  ))?;
  let rows = stmt
    .query_map(params, RawCredential::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

impl CredentialRepository for SqliteStore {
  async fn create_credential(
    &self,
    ctx: &Ctx,
    input: NewCredential,
  ) -> Result<Credential> {
    let credential = input.into_credential(Utc::now())?;
    let record = credential.clone();
    let target = format!("{}/{}", credential.agent_id, credential.supplier_id);

    self
      .run(ctx, Access::Write, "credential.create", target, move |conn| {
        let agent_str = encode_id(record.agent_id);
        let supplier_str = encode_id(record.supplier_id);

        if !agent_is_live(conn, &agent_str)? {
          return Err(
            Error::constraint(format!(
              "agent {agent_str} does not exist or is deleted"
            ))
            .into(),
          );
        }
        if !supplier_is_live(conn, &supplier_str)? {
          return Err(
            Error::constraint(format!(
              "supplier {supplier_str} does not exist or is deleted"
            ))
            .into(),
          );
        }

        conn.execute(
          "INSERT INTO agent_supplier_credentials (
             id, iata_agent_id, supplier_id, credentials_opaque,
             created_at, updated_at, deleted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
          rusqlite::params![
            encode_id(record.id),
            agent_str,
            supplier_str,
            record.payload.as_bytes(),
            encode_dt(record.created_at),
            encode_dt(record.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(credential)
  }

  async fn get_credential(&self, ctx: &Ctx, id: Id) -> Result<Credential> {
    let id_str = encode_id(id);

    self
      .run(ctx, Access::Read, "credential.get", id, move |conn| {
        Ok(
          select_credential(conn, "id = ?1 AND deleted_at IS NULL", [&id_str])?
            .ok_or_else(|| Error::not_found(Entity::Credential, &id_str))?,
        )
      })
      .await?
      .into_credential()
  }

  async fn get_credential_by_agent_and_supplier(
    &self,
    ctx: &Ctx,
    agent_id: Id,
    supplier_id: Id,
  ) -> Result<Credential> {
    let agent_str = encode_id(agent_id);
    let supplier_str = encode_id(supplier_id);
    let target = format!("{agent_str}/{supplier_str}");

    self
      .run(ctx, Access::Read, "credential.get_by_pair", target.clone(), move |conn| {
        Ok(
          select_credential(
            conn,
            "iata_agent_id = ?1 AND supplier_id = ?2 AND deleted_at IS NULL",
            [&agent_str, &supplier_str],
          )?
          .ok_or_else(|| Error::not_found(Entity::Credential, &target))?,
        )
      })
      .await?
      .into_credential()
  }

  async fn update_credential(
    &self,
    ctx: &Ctx,
    id: Id,
    payload: OpaquePayload,
  ) -> Result<Credential> {
    let id_str = encode_id(id);
    let now = encode_dt(Utc::now());

    self
      .run(ctx, Access::Write, "credential.rotate", id, move |conn| {
        let rows = conn.execute(
          "UPDATE agent_supplier_credentials
              SET credentials_opaque = ?2, updated_at = ?3
            WHERE id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, payload.as_bytes(), now],
        )?;
        if rows == 0 {
          return Err(Error::not_found(Entity::Credential, &id_str).into());
        }
        Ok(
          select_credential(conn, "id = ?1", [&id_str])?
            .ok_or_else(|| Error::not_found(Entity::Credential, &id_str))?,
        )
      })
      .await?
      .into_credential()
  }

  async fn delete_credential(&self, ctx: &Ctx, id: Id) -> Result<()> {
    let id_str = encode_id(id);
    let now = encode_dt(Utc::now());

    self
      .run(ctx, Access::Write, "credential.delete", id, move |conn| {
        let rows = conn.execute(
          "UPDATE agent_supplier_credentials SET deleted_at = ?2, updated_at = ?2
            WHERE id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, now],
        )?;
        if rows == 0 {
          return Err(Error::not_found(Entity::Credential, &id_str).into());
        }
        Ok(())
      })
      .await
  }

  async fn list_credentials(
    &self,
    ctx: &Ctx,
    page: PageRequest,
  ) -> Result<Page<Credential>> {
    let (raws, total) = self
      .run(ctx, Access::Read, "credential.list", "credentials", move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM agent_supplier_credentials WHERE deleted_at IS NULL",
          [],
          |row| row.get(0),
        )?;
        let raws = select_credentials(
          conn,
          "deleted_at IS NULL ORDER BY id LIMIT ?1 OFFSET ?2",
          rusqlite::params![i64::from(page.limit), encode_offset(page.offset)],
        )?;
        Ok((raws, total))
      })
      .await?;

    Ok(Page {
      items:  raws
        .into_iter()
        .map(RawCredential::into_credential)
        .collect::<Result<_>>()?,
      total:  total as u64,
      offset: page.offset,
      limit:  page.limit,
    })
  }

  async fn list_credentials_for_agent(
    &self,
    ctx: &Ctx,
    agent_id: Id,
  ) -> Result<Vec<Credential>> {
    let agent_str = encode_id(agent_id);

    let raws = self
      .run(ctx, Access::Read, "credential.list_for_agent", agent_id, move |conn| {
        Ok(select_credentials(
          conn,
          "iata_agent_id = ?1 AND deleted_at IS NULL ORDER BY id",
          [&agent_str],
        )?)
      })
      .await?;

    raws.into_iter().map(RawCredential::into_credential).collect()
  }
}
