//! [`AgentRepository`] for [`SqliteStore`].

use agentdesk_core::{
  Entity, Id, Page, PageRequest,
  agent::{Agent, AgentChanges, AgentView, NewAgent},
  store::AgentRepository,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, Params};

use crate::{
  Ctx, Error, Result, SqliteStore,
  encode::{
    AGENT_COLUMNS, RawAgent, RawAgentView, encode_agent_type, encode_dt, encode_id,
    encode_offset,
  },
  store::{Abort, Access},
};

/// Upper bound on ancestor hops before the chain is treated as corrupt.
const MAX_ANCESTRY_DEPTH: usize = 1_024;

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn select_agent(
  conn: &Connection,
  filter: &str,
  params: impl Params,
) -> rusqlite::Result<Option<RawAgent>> {
  conn
    .query_row(
      &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE {filter}"),
      params,
      RawAgent::from_row,
    )
    .optional()
}

fn select_agents(
  conn: &Connection,
  filter: &str,
  params: impl Params,
) -> rusqlite::Result<Vec<RawAgent>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE {filter}"))?;
  let rows = stmt
    .query_map(params, RawAgent::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Whether a non-deleted agent with this id exists.
pub(crate) fn agent_is_live(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM agents WHERE id = ?1 AND deleted_at IS NULL",
        [id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn ensure_parent_live(conn: &Connection, parent_id: &str) -> Result<(), Abort> {
  if !agent_is_live(conn, parent_id)? {
    return Err(
      Error::constraint(format!(
        "parent agent {parent_id} does not exist or is deleted"
      ))
      .into(),
    );
  }
  Ok(())
}

/// Reject making `parent_id` the parent of `agent_id` when `agent_id` is
/// already one of its ancestors.
fn ensure_acyclic(
  conn: &Connection,
  agent_id: &str,
  parent_id: &str,
) -> Result<(), Abort> {
  let mut cursor = Some(parent_id.to_owned());
  let mut hops = 0;

  while let Some(current) = cursor {
    if current == agent_id {
      return Err(
        Error::constraint(format!(
          "agent {parent_id} is a descendant of agent {agent_id}; \
           assigning it as parent would create a cycle"
        ))
        .into(),
      );
    }
    hops += 1;
    if hops > MAX_ANCESTRY_DEPTH {
      return Err(
        Error::constraint(format!(
          "ancestor chain of agent {parent_id} is deeper than {MAX_ANCESTRY_DEPTH}"
        ))
        .into(),
      );
    }
    cursor = conn
      .query_row(
        "SELECT parent_agent_id FROM agents WHERE id = ?1",
        [&current],
        |row| row.get::<_, Option<String>>(0),
      )
      .optional()?
      .flatten();
  }
  Ok(())
}

fn load_view(conn: &Connection, agent: RawAgent) -> rusqlite::Result<RawAgentView> {
  let parent = match agent.parent_agent_id.as_deref() {
    Some(parent_id) => select_agent(conn, "id = ?1", [parent_id])?,
    None => None,
  };
  let children = select_agents(
    conn,
    "parent_agent_id = ?1 AND deleted_at IS NULL ORDER BY id",
    [&agent.id],
  )?;
  Ok(RawAgentView { agent, parent, children })
}

fn write_agent(conn: &Connection, agent: &Agent) -> rusqlite::Result<usize> {
  conn.execute(
    "UPDATE agents
        SET agent_name = ?2, email = ?3, agent_type = ?4, parent_agent_id = ?5,
            is_active = ?6, updated_at = ?7
      WHERE id = ?1 AND deleted_at IS NULL",
    rusqlite::params![
      encode_id(agent.id),
      agent.name,
      agent.email,
      encode_agent_type(agent.agent_type),
      agent.parent_agent_id.map(encode_id),
      agent.is_active,
      encode_dt(agent.updated_at),
    ],
  )
}

// ─── AgentRepository impl ────────────────────────────────────────────────────

impl AgentRepository for SqliteStore {
  async fn create_agent(&self, ctx: &Ctx, input: NewAgent) -> Result<Agent> {
    let agent = input.into_agent(Utc::now())?;
    let record = agent.clone();

    self
      .run(ctx, Access::Write, "agent.create", agent.id, move |conn| {
        if let Some(parent) = record.parent_agent_id {
          ensure_parent_live(conn, &encode_id(parent))?;
        }
        conn.execute(
          "INSERT INTO agents (
             id, agent_name, email, agent_type, parent_agent_id,
             is_active, created_at, updated_at, deleted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
          rusqlite::params![
            encode_id(record.id),
            record.name,
            record.email,
            encode_agent_type(record.agent_type),
            record.parent_agent_id.map(encode_id),
            record.is_active,
            encode_dt(record.created_at),
            encode_dt(record.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(agent)
  }

  async fn get_agent(&self, ctx: &Ctx, id: Id) -> Result<AgentView> {
    let id_str = encode_id(id);

    let raw = self
      .run(ctx, Access::Read, "agent.get", id, move |conn| {
        let agent = select_agent(conn, "id = ?1 AND deleted_at IS NULL", [&id_str])?
          .ok_or_else(|| Error::not_found(Entity::Agent, &id_str))?;
        Ok(load_view(conn, agent)?)
      })
      .await?;

    raw.into_view()
  }

  async fn get_agent_by_email(&self, ctx: &Ctx, email: &str) -> Result<AgentView> {
    let email = email.to_owned();

    let raw = self
      .run(ctx, Access::Read, "agent.get_by_email", email.clone(), move |conn| {
        let agent =
          select_agent(conn, "email = ?1 AND deleted_at IS NULL", [&email])?
            .ok_or_else(|| Error::not_found(Entity::Agent, &email))?;
        Ok(load_view(conn, agent)?)
      })
      .await?;

    raw.into_view()
  }

  async fn get_agents_by_parent(&self, ctx: &Ctx, parent_id: Id) -> Result<Vec<Agent>> {
    let parent_str = encode_id(parent_id);

    let raws = self
      .run(ctx, Access::Read, "agent.get_by_parent", parent_id, move |conn| {
        Ok(select_agents(
          conn,
          "parent_agent_id = ?1 AND deleted_at IS NULL ORDER BY id",
          [&parent_str],
        )?)
      })
      .await?;

    raws.into_iter().map(RawAgent::into_agent).collect()
  }

  async fn get_active_agents(&self, ctx: &Ctx) -> Result<Vec<Agent>> {
    self.agents_by_activity(ctx, true).await
  }

  async fn get_inactive_agents(&self, ctx: &Ctx) -> Result<Vec<Agent>> {
    self.agents_by_activity(ctx, false).await
  }

  async fn update_agent(
    &self,
    ctx: &Ctx,
    id: Id,
    changes: AgentChanges,
  ) -> Result<Agent> {
    let id_str = encode_id(id);

    self
      .run(ctx, Access::Write, "agent.update", id, move |conn| {
        let mut agent =
          select_agent(conn, "id = ?1 AND deleted_at IS NULL", [&id_str])?
            .ok_or_else(|| Error::not_found(Entity::Agent, &id_str))?
            .into_agent()?;

        let moving = changes.touches_parent();
        changes.apply(&mut agent, Utc::now())?;

        if moving && let Some(parent) = agent.parent_agent_id {
          let parent_str = encode_id(parent);
          ensure_parent_live(conn, &parent_str)?;
          ensure_acyclic(conn, &id_str, &parent_str)?;
        }

        if write_agent(conn, &agent)? == 0 {
          return Err(Error::not_found(Entity::Agent, &id_str).into());
        }
        Ok(agent)
      })
      .await
  }

  async fn delete_agent(&self, ctx: &Ctx, id: Id) -> Result<()> {
    let id_str = encode_id(id);
    let now = encode_dt(Utc::now());

    // Runs under the write lock, so no sub-agent can be attached between the
    // child check and the update. The affected-row count of the conditional
    // update is the existence check, so two racing deletes cannot both
    // succeed.
    self
      .run(ctx, Access::Write, "agent.delete", id, move |conn| {
        if !agent_is_live(conn, &id_str)? {
          return Err(Error::not_found(Entity::Agent, &id_str).into());
        }

        let children: i64 = conn.query_row(
          "SELECT COUNT(*) FROM agents
            WHERE parent_agent_id = ?1 AND deleted_at IS NULL",
          [&id_str],
          |row| row.get(0),
        )?;
        if children > 0 {
          return Err(
            Error::constraint(format!(
              "agent {id_str} still has {children} live sub-agent(s)"
            ))
            .into(),
          );
        }

        let rows = conn.execute(
          "UPDATE agents SET deleted_at = ?2, updated_at = ?2
            WHERE id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, now],
        )?;
        if rows == 0 {
          return Err(Error::not_found(Entity::Agent, &id_str).into());
        }
        Ok(())
      })
      .await
  }

  async fn list_agents(&self, ctx: &Ctx, page: PageRequest) -> Result<Page<Agent>> {
    let (raws, total) = self
      .run(ctx, Access::Read, "agent.list", "agents", move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM agents WHERE deleted_at IS NULL",
          [],
          |row| row.get(0),
        )?;
        let raws = select_agents(
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
        .map(RawAgent::into_agent)
        .collect::<Result<_>>()?,
      total:  total as u64,
      offset: page.offset,
      limit:  page.limit,
    })
  }
}

impl SqliteStore {
  async fn agents_by_activity(&self, ctx: &Ctx, active: bool) -> Result<Vec<Agent>> {
    let raws = self
      .run(ctx, Access::Read, "agent.by_activity", active, move |conn| {
        Ok(select_agents(
          conn,
          "is_active = ?1 AND deleted_at IS NULL ORDER BY id",
          [active],
        )?)
      })
      .await?;

    raws.into_iter().map(RawAgent::into_agent).collect()
  }
}
