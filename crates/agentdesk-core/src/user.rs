//! Users: people who log in on behalf of an agent.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Id, Result};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:            Id,
  pub agent_id:      Option<Id>,
  pub name:          String,
  pub email:         String,
  /// Already-hashed secret (e.g. an argon2 PHC string). Never serialised.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub is_active:     bool,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
  pub deleted_at:    Option<DateTime<Utc>>,
}

impl User {
  pub fn is_live(&self) -> bool { self.deleted_at.is_none() }
}

impl fmt::Debug for User {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("User")
      .field("id", &self.id)
      .field("agent_id", &self.agent_id)
      .field("name", &self.name)
      .field("email", &self.email)
      .field("is_active", &self.is_active)
      .field("created_at", &self.created_at)
      .field("updated_at", &self.updated_at)
      .field("deleted_at", &self.deleted_at)
      .finish_non_exhaustive()
  }
}

/// Input for creating a user.
#[derive(Clone)]
pub struct NewUser {
  pub agent_id:      Option<Id>,
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub is_active:     bool,
}

impl NewUser {
  pub fn new(
    name: impl Into<String>,
    email: impl Into<String>,
    password_hash: impl Into<String>,
  ) -> Self {
    Self {
      agent_id:      None,
      name:          name.into(),
      email:         email.into(),
      password_hash: password_hash.into(),
      is_active:     true,
    }
  }

  pub fn for_agent(mut self, agent_id: Id) -> Self {
    self.agent_id = Some(agent_id);
    self
  }

  pub fn into_user(self, now: DateTime<Utc>) -> Result<User> {
    if self.name.trim().is_empty() {
      return Err(Error::constraint("user name must not be empty"));
    }
    if self.email.trim().is_empty() {
      return Err(Error::constraint("user email must not be empty"));
    }

    Ok(User {
      id:            Id::new(),
      agent_id:      self.agent_id,
      name:          self.name,
      email:         self.email,
      password_hash: self.password_hash,
      is_active:     self.is_active,
      created_at:    now,
      updated_at:    now,
      deleted_at:    None,
    })
  }
}

/// A partial update. The password is deliberately absent; it is rotated
/// through its own narrow operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserChanges {
  pub agent_id:  Option<Option<Id>>,
  pub name:      Option<String>,
  pub email:     Option<String>,
  pub is_active: Option<bool>,
}

impl UserChanges {
  pub fn apply(self, user: &mut User, now: DateTime<Utc>) -> Result<()> {
    if let Some(agent_id) = self.agent_id {
      user.agent_id = agent_id;
    }
    if let Some(name) = self.name {
      if name.trim().is_empty() {
        return Err(Error::constraint("user name must not be empty"));
      }
      user.name = name;
    }
    if let Some(email) = self.email {
      if email.trim().is_empty() {
        return Err(Error::constraint("user email must not be empty"));
      }
      user.email = email;
    }
    if let Some(is_active) = self.is_active {
      user.is_active = is_active;
    }
    user.updated_at = now;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn password_hash_is_not_serialized() {
    let user = NewUser::new("Ana", "ana@sky.example", "$argon2id$v=19$secret")
      .into_user(Utc::now())
      .unwrap();
    let json = serde_json::to_string(&user).unwrap();
    assert!(!json.contains("argon2id"));
    assert!(!format!("{user:?}").contains("argon2id"));
  }

  #[test]
  fn empty_email_is_rejected() {
    let err = NewUser::new("Ana", "  ", "h").into_user(Utc::now()).unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
  }
}
