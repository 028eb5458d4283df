//! [`UserRepository`] for [`SqliteStore`].

use agentdesk_core::{
  Entity, Id, Page, PageRequest,
  store::UserRepository,
  user::{NewUser, User, UserChanges},
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, Params};

use crate::{
  Ctx, Error, Result, SqliteStore,
  agents::agent_is_live,
  encode::{RawUser, USER_COLUMNS, encode_dt, encode_id, encode_offset},
  store::{Abort, Access},
};

fn select_user(
  conn: &Connection,
  filter: &str,
  params: impl Params,
) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}"),
      params,
      RawUser::from_row,
    )
    .optional()
}

fn select_users(
  conn: &Connection,
  filter: &str,
  params: impl Params,
) -> rusqlite::Result<Vec<RawUser>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}"))?;
  let rows = stmt
    .query_map(params, RawUser::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn ensure_owner_live(conn: &Connection, agent_id: Id) -> Result<(), Abort> {
  let agent_str = encode_id(agent_id);
  if !agent_is_live(conn, &agent_str)? {
    return Err(
      Error::constraint(format!(
        "owning agent {agent_str} does not exist or is deleted"
      ))
      .into(),
    );
  }
  Ok(())
}

impl UserRepository for SqliteStore {
  async fn create_user(&self, ctx: &Ctx, input: NewUser) -> Result<User> {
    let user = input.into_user(Utc::now())?;
    let record = user.clone();

    self
      .run(ctx, Access::Write, "user.create", user.id, move |conn| {
        if let Some(agent_id) = record.agent_id {
          ensure_owner_live(conn, agent_id)?;
        }
        conn.execute(
          "INSERT INTO users (
             id, agent_id, name, email, password_hash,
             is_active, created_at, updated_at, deleted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
          rusqlite::params![
            encode_id(record.id),
            record.agent_id.map(encode_id),
            record.name,
            record.email,
            record.password_hash,
            record.is_active,
            encode_dt(record.created_at),
            encode_dt(record.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, ctx: &Ctx, id: Id) -> Result<User> {
    let id_str = encode_id(id);

    self
      .run(ctx, Access::Read, "user.get", id, move |conn| {
        Ok(
          select_user(conn, "id = ?1 AND deleted_at IS NULL", [&id_str])?
            .ok_or_else(|| Error::not_found(Entity::User, &id_str))?,
        )
      })
      .await?
      .into_user()
  }

  async fn get_user_by_email(&self, ctx: &Ctx, email: &str) -> Result<User> {
    let email = email.to_owned();

    self
      .run(ctx, Access::Read, "user.get_by_email", email.clone(), move |conn| {
        Ok(
          select_user(conn, "email = ?1 AND deleted_at IS NULL", [&email])?
            .ok_or_else(|| Error::not_found(Entity::User, &email))?,
        )
      })
      .await?
      .into_user()
  }

  async fn get_users_by_agent(&self, ctx: &Ctx, agent_id: Id) -> Result<Vec<User>> {
    let agent_str = encode_id(agent_id);

    let raws = self
      .run(ctx, Access::Read, "user.get_by_agent", agent_id, move |conn| {
        Ok(select_users(
          conn,
          "agent_id = ?1 AND deleted_at IS NULL ORDER BY id",
          [&agent_str],
        )?)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn get_active_users(&self, ctx: &Ctx) -> Result<Vec<User>> {
    let raws = self
      .run(ctx, Access::Read, "user.get_active", "users", |conn| {
        Ok(select_users(
          conn,
          "is_active = 1 AND deleted_at IS NULL ORDER BY id",
          [],
        )?)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn update_user(&self, ctx: &Ctx, id: Id, changes: UserChanges) -> Result<User> {
    let id_str = encode_id(id);

    self
      .run(ctx, Access::Write, "user.update", id, move |conn| {
        let mut user =
          select_user(conn, "id = ?1 AND deleted_at IS NULL", [&id_str])?
            .ok_or_else(|| Error::not_found(Entity::User, &id_str))?
            .into_user()?;

        let reassigning = matches!(changes.agent_id, Some(Some(_)));
        changes.apply(&mut user, Utc::now())?;
        if reassigning && let Some(agent_id) = user.agent_id {
          ensure_owner_live(conn, agent_id)?;
        }

        // The password hash is left out on purpose; see `update_password`.
        let rows = conn.execute(
          "UPDATE users
              SET agent_id = ?2, name = ?3, email = ?4, is_active = ?5,
                  updated_at = ?6
            WHERE id = ?1 AND deleted_at IS NULL",
          rusqlite::params![
            id_str,
            user.agent_id.map(encode_id),
            user.name,
            user.email,
            user.is_active,
            encode_dt(user.updated_at),
          ],
        )?;
        if rows == 0 {
          return Err(Error::not_found(Entity::User, &id_str).into());
        }
        Ok(user)
      })
      .await
  }

  async fn update_password(
    &self,
    ctx: &Ctx,
    id: Id,
    password_hash: &str,
  ) -> Result<()> {
    let id_str = encode_id(id);
    let hash = password_hash.to_owned();
    let now = encode_dt(Utc::now());

    self
      .run(ctx, Access::Write, "user.update_password", id, move |conn| {
        let rows = conn.execute(
          "UPDATE users SET password_hash = ?2, updated_at = ?3
            WHERE id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, hash, now],
        )?;
        if rows == 0 {
          return Err(Error::not_found(Entity::User, &id_str).into());
        }
        Ok(())
      })
      .await
  }

  async fn delete_user(&self, ctx: &Ctx, id: Id) -> Result<()> {
    let id_str = encode_id(id);
    let now = encode_dt(Utc::now());

    self
      .run(ctx, Access::Write, "user.delete", id, move |conn| {
        let rows = conn.execute(
          "UPDATE users SET deleted_at = ?2, updated_at = ?2
            WHERE id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, now],
        )?;
        if rows == 0 {
          return Err(Error::not_found(Entity::User, &id_str).into());
        }
        Ok(())
      })
      .await
  }

  async fn list_users(&self, ctx: &Ctx, page: PageRequest) -> Result<Page<User>> {
    let (raws, total) = self
      .run(ctx, Access::Read, "user.list", "users", move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL",
          [],
          |row| row.get(0),
        )?;
        let raws = select_users(
          conn,
          "deleted_at IS NULL ORDER BY id LIMIT ?1 OFFSET ?2",
          rusqlite::params![i64::from(page.limit), encode_offset(page.offset)],
        )?;
        Ok((raws, total))
      })
      .await?;

    Ok(Page {
      items:  raws.into_iter().map(RawUser::into_user).collect::<Result<_>>()?,
      total:  total as u64,
      offset: page.offset,
      limit:  page.limit,
    })
  }
}
