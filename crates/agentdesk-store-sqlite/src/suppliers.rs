//! [`SupplierRepository`] for [`SqliteStore`].

use agentdesk_core::{
  Entity, Id, Page, PageRequest,
  store::SupplierRepository,
  supplier::{NewSupplier, Supplier},
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, Params};

use crate::{
  Ctx, Error, Result, SqliteStore,
  encode::{RawSupplier, SUPPLIER_COLUMNS, encode_dt, encode_id, encode_offset},
  store::Access,
};

fn select_supplier(
  conn: &Connection,
  filter: &str,
  params: impl Params,
) -> rusqlite::Result<Option<RawSupplier>> {
  conn
    .query_row(
      &format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE {filter}"),
      params,
      RawSupplier::from_row,
    )
    .optional()
}

pub(crate) fn supplier_is_live(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM suppliers WHERE id = ?1 AND deleted_at IS NULL",
        [id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

impl SupplierRepository for SqliteStore {
  async fn create_supplier(&self, ctx: &Ctx, input: NewSupplier) -> Result<Supplier> {
    let supplier = input.into_supplier(Utc::now())?;
    let record = supplier.clone();

    self
      .run(ctx, Access::Write, "supplier.create", &supplier.code, move |conn| {
        conn.execute(
          "INSERT INTO suppliers (
             id, supplier_code, supplier_name, created_at, updated_at, deleted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
          rusqlite::params![
            encode_id(record.id),
            record.code,
            record.name,
            encode_dt(record.created_at),
            encode_dt(record.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(supplier)
  }

  async fn get_supplier(&self, ctx: &Ctx, id: Id) -> Result<Supplier> {
    let id_str = encode_id(id);

    self
      .run(ctx, Access::Read, "supplier.get", id, move |conn| {
        Ok(
          select_supplier(conn, "id = ?1 AND deleted_at IS NULL", [&id_str])?
            .ok_or_else(|| Error::not_found(Entity::Supplier, &id_str))?,
        )
      })
      .await?
      .into_supplier()
  }

  async fn get_supplier_by_code(&self, ctx: &Ctx, code: &str) -> Result<Supplier> {
    let code = code.to_owned();

    self
      .run(ctx, Access::Read, "supplier.get_by_code", code.clone(), move |conn| {
        Ok(
          select_supplier(conn, "supplier_code = ?1 AND deleted_at IS NULL", [&code])?
            .ok_or_else(|| Error::not_found(Entity::Supplier, &code))?,
        )
      })
      .await?
      .into_supplier()
  }

  async fn list_suppliers(&self, ctx: &Ctx, page: PageRequest) -> Result<Page<Supplier>> {
    let (raws, total) = self
      .run(ctx, Access::Read, "supplier.list", "suppliers", move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM suppliers WHERE deleted_at IS NULL",
          [],
          |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUPPLIER_COLUMNS} FROM suppliers
            WHERE deleted_at IS NULL ORDER BY id LIMIT ?1 OFFSET ?2"
        ))?;
        let raws = stmt
          .query_map(
            rusqlite::params![i64::from(page.limit), encode_offset(page.offset)],
            RawSupplier::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((raws, total))
      })
      .await?;

    Ok(Page {
      items:  raws
        .into_iter()
        .map(RawSupplier::into_supplier)
        .collect::<Result<_>>()?,
      total:  total as u64,
      offset: page.offset,
      limit:  page.limit,
    })
  }

  async fn delete_supplier(&self, ctx: &Ctx, id: Id) -> Result<()> {
    let id_str = encode_id(id);
    let now = encode_dt(Utc::now());

    // Runs under the write lock, so no credential can be attached between
    // the usage check and the update.
    self
      .run(ctx, Access::Write, "supplier.delete", id, move |conn| {
        if !supplier_is_live(conn, &id_str)? {
          return Err(Error::not_found(Entity::Supplier, &id_str).into());
        }

        let in_use: i64 = conn.query_row(
          "SELECT COUNT(*) FROM agent_supplier_credentials
            WHERE supplier_id = ?1 AND deleted_at IS NULL",
          [&id_str],
          |row| row.get(0),
        )?;
        if in_use > 0 {
          return Err(
            Error::constraint(format!(
              "supplier {id_str} is referenced by {in_use} live credential(s)"
            ))
            .into(),
          );
        }

        let rows = conn.execute(
          "UPDATE suppliers SET deleted_at = ?2, updated_at = ?2
            WHERE id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, now],
        )?;
        if rows == 0 {
          return Err(Error::not_found(Entity::Supplier, &id_str).into());
        }
        Ok(())
      })
      .await
  }
}
