//! Agents: IATA-accredited agencies and the sub-agents that sell under them.
//!
//! Agents form a tree: an IATA agent is a root and a sub-agent always points at
//! a parent. Deleting an agent is a soft delete; users and credentials owned by
//! it are left untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Id, Result};

/// The accreditation level of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentType {
  Iata,
  SubAgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
  pub id:              Id,
  pub name:            String,
  pub email:           String,
  pub agent_type:      AgentType,
  pub parent_agent_id: Option<Id>,
  pub is_active:       bool,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  pub deleted_at:      Option<DateTime<Utc>>,
}

impl Agent {
  pub fn is_live(&self) -> bool { self.deleted_at.is_none() }
}

/// Check that the agent type and parent reference agree.
pub fn check_hierarchy_shape(
  agent_type: AgentType,
  parent_agent_id: Option<Id>,
) -> Result<()> {
  match (agent_type, parent_agent_id) {
    (AgentType::Iata, None) | (AgentType::SubAgent, Some(_)) => Ok(()),
    (AgentType::Iata, Some(_)) => {
      Err(Error::constraint("an IATA agent cannot have a parent agent"))
    }
    (AgentType::SubAgent, None) => {
      Err(Error::constraint("a sub-agent must reference a parent agent"))
    }
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Input for creating an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgent {
  pub name:            String,
  pub email:           String,
  pub agent_type:      AgentType,
  pub parent_agent_id: Option<Id>,
  pub is_active:       bool,
}

impl NewAgent {
  pub fn iata(name: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      name:            name.into(),
      email:           email.into(),
      agent_type:      AgentType::Iata,
      parent_agent_id: None,
      is_active:       true,
    }
  }

  pub fn sub_agent(
    name: impl Into<String>,
    email: impl Into<String>,
    parent: Id,
  ) -> Self {
    Self {
      name:            name.into(),
      email:           email.into(),
      agent_type:      AgentType::SubAgent,
      parent_agent_id: Some(parent),
      is_active:       true,
    }
  }

  /// Validate and stamp a new [`Agent`] with a fresh identifier.
  pub fn into_agent(self, now: DateTime<Utc>) -> Result<Agent> {
    require_non_empty("agent name", &self.name)?;
    require_non_empty("agent email", &self.email)?;
    check_hierarchy_shape(self.agent_type, self.parent_agent_id)?;

    Ok(Agent {
      id:              Id::new(),
      name:            self.name,
      email:           self.email,
      agent_type:      self.agent_type,
      parent_agent_id: self.parent_agent_id,
      is_active:       self.is_active,
      created_at:      now,
      updated_at:      now,
      deleted_at:      None,
    })
  }
}

/// A partial update. `None` leaves a field unchanged; for the parent,
/// `Some(None)` detaches the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentChanges {
  pub name:            Option<String>,
  pub email:           Option<String>,
  pub agent_type:      Option<AgentType>,
  pub parent_agent_id: Option<Option<Id>>,
  pub is_active:       Option<bool>,
}

impl AgentChanges {
  /// Whether applying these changes may move the agent within the tree.
  pub fn touches_parent(&self) -> bool { self.parent_agent_id.is_some() }

  /// Apply onto `agent`, re-checking the field invariants.
  pub fn apply(self, agent: &mut Agent, now: DateTime<Utc>) -> Result<()> {
    if let Some(name) = self.name {
      require_non_empty("agent name", &name)?;
      agent.name = name;
    }
    if let Some(email) = self.email {
      require_non_empty("agent email", &email)?;
      agent.email = email;
    }
    if let Some(agent_type) = self.agent_type {
      agent.agent_type = agent_type;
    }
    if let Some(parent) = self.parent_agent_id {
      if parent == Some(agent.id) {
        return Err(Error::constraint(format!(
          "agent {} cannot be its own parent",
          agent.id
        )));
      }
      agent.parent_agent_id = parent;
    }
    if let Some(is_active) = self.is_active {
      agent.is_active = is_active;
    }
    check_hierarchy_shape(agent.agent_type, agent.parent_agent_id)?;
    agent.updated_at = now;
    Ok(())
  }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::constraint(format!("{field} must not be empty")));
  }
  Ok(())
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// An agent with its immediate neighbourhood in the tree: the parent (even if
/// soft-deleted, so audits can see it) and the live direct children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentView {
  pub agent:    Agent,
  pub parent:   Option<Agent>,
  pub children: Vec<Agent>,
}
