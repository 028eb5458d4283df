//! Command handlers. Each one maps to a single repository call, except
//! `onboard`, which groups several into one unit of work.

use std::{io, path::Path};

use agentdesk_core::{
  Id, PageRequest,
  agent::{AgentChanges, AgentType, NewAgent},
  credential::{NewCredential, OpaquePayload},
  store::{
    AgentRepository, CredentialRepository, SupplierRepository,
    TransactionCoordinator, UserRepository,
  },
  supplier::NewSupplier,
  user::NewUser,
};
use agentdesk_store_sqlite::{Ctx, SqliteStore};
use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use rand_core::OsRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{AgentCommand, Command, CredentialCommand, SupplierCommand, UserCommand};

pub async fn run(store: &SqliteStore, command: Command) -> anyhow::Result<()> {
  let ctx = Ctx::with_cancellation(interrupt_token());

  match command {
    Command::Init => {
      info!("schema ready");
      Ok(())
    }
    Command::Supplier(cmd) => supplier(store, &ctx, cmd).await,
    Command::Agent(cmd) => agent(store, &ctx, cmd).await,
    Command::User(cmd) => user(store, &ctx, cmd).await,
    Command::Credential(cmd) => credential(store, &ctx, cmd).await,
    Command::Onboard { name, email, supplier, payload, user_email, user_name } => {
      let payload = read_payload(&payload)?;
      let first_user = match user_email {
        Some(email) => {
          let name = user_name.unwrap_or_else(|| email.clone());
          Some(NewUser::new(name, email, hash_password(&read_password()?)?))
        }
        None => None,
      };
      onboard(store, &ctx, NewAgent::iata(name, email), &supplier, payload, first_user)
        .await
    }
  }
}

// ─── Suppliers ───────────────────────────────────────────────────────────────

async fn supplier(
  store: &SqliteStore,
  ctx: &Ctx,
  cmd: SupplierCommand,
) -> anyhow::Result<()> {
  match cmd {
    SupplierCommand::Add { code, name } => {
      print_json(&store.create_supplier(ctx, NewSupplier::new(code, name)).await?)
    }
    SupplierCommand::Show { code } => {
      print_json(&store.get_supplier_by_code(ctx, &code).await?)
    }
    SupplierCommand::List { offset, limit } => {
      print_json(&store.list_suppliers(ctx, PageRequest::new(offset, limit)).await?)
    }
    SupplierCommand::Delete { id } => {
      store.delete_supplier(ctx, id).await?;
      info!(%id, "supplier deleted");
      Ok(())
    }
  }
}

// ─── Agents ──────────────────────────────────────────────────────────────────

async fn agent(store: &SqliteStore, ctx: &Ctx, cmd: AgentCommand) -> anyhow::Result<()> {
  match cmd {
    AgentCommand::Add { name, email, parent, inactive } => {
      let mut input = match parent {
        Some(parent) => NewAgent::sub_agent(name, email, parent),
        None => NewAgent::iata(name, email),
      };
      input.is_active = !inactive;
      print_json(&store.create_agent(ctx, input).await?)
    }
    AgentCommand::Show { agent } => {
      let view = match agent.parse::<Id>() {
        Ok(id) => store.get_agent(ctx, id).await?,
        Err(_) => store.get_agent_by_email(ctx, &agent).await?,
      };
      print_json(&view)
    }
    AgentCommand::List { active: Some(true), .. } => {
      print_json(&store.get_active_agents(ctx).await?)
    }
    AgentCommand::List { active: Some(false), .. } => {
      print_json(&store.get_inactive_agents(ctx).await?)
    }
    AgentCommand::List { offset, limit, active: None } => {
      print_json(&store.list_agents(ctx, PageRequest::new(offset, limit)).await?)
    }
    AgentCommand::Move { id, parent } => {
      let changes = AgentChanges {
        agent_type: Some(AgentType::SubAgent),
        parent_agent_id: Some(Some(parent)),
        ..Default::default()
      };
      print_json(&store.update_agent(ctx, id, changes).await?)
    }
    AgentCommand::Activate { id } => set_active(store, ctx, id, true).await,
    AgentCommand::Deactivate { id } => set_active(store, ctx, id, false).await,
    AgentCommand::Delete { id } => {
      store.delete_agent(ctx, id).await?;
      info!(%id, "agent deleted");
      Ok(())
    }
  }
}

async fn set_active(
  store: &SqliteStore,
  ctx: &Ctx,
  id: Id,
  active: bool,
) -> anyhow::Result<()> {
  let changes = AgentChanges { is_active: Some(active), ..Default::default() };
  print_json(&store.update_agent(ctx, id, changes).await?)
}

// ─── Users ───────────────────────────────────────────────────────────────────

async fn user(store: &SqliteStore, ctx: &Ctx, cmd: UserCommand) -> anyhow::Result<()> {
  match cmd {
    UserCommand::Add { name, email, agent } => {
      let mut input = NewUser::new(name, email, hash_password(&read_password()?)?);
      if let Some(agent) = agent {
        input = input.for_agent(agent);
      }
      print_json(&store.create_user(ctx, input).await?)
    }
    UserCommand::Show { email } => print_json(&store.get_user_by_email(ctx, &email).await?),
    UserCommand::List { agent } => print_json(&store.get_users_by_agent(ctx, agent).await?),
    UserCommand::SetPassword { id } => {
      let hash = hash_password(&read_password()?)?;
      store.update_password(ctx, id, &hash).await?;
      info!(%id, "password updated");
      Ok(())
    }
    UserCommand::Delete { id } => {
      store.delete_user(ctx, id).await?;
      info!(%id, "user deleted");
      Ok(())
    }
  }
}

// ─── Credentials ─────────────────────────────────────────────────────────────

async fn credential(
  store: &SqliteStore,
  ctx: &Ctx,
  cmd: CredentialCommand,
) -> anyhow::Result<()> {
  match cmd {
    CredentialCommand::Connect { agent, supplier, payload } => {
      let input = NewCredential::new(agent, supplier, read_payload(&payload)?);
      print_json(&store.create_credential(ctx, input).await?)
    }
    CredentialCommand::Show { agent, supplier } => print_json(
      &store
        .get_credential_by_agent_and_supplier(ctx, agent, supplier)
        .await?,
    ),
    CredentialCommand::Rotate { id, payload } => {
      let payload = read_payload(&payload)?;
      print_json(&store.update_credential(ctx, id, payload).await?)
    }
    CredentialCommand::List { agent } => {
      print_json(&store.list_credentials_for_agent(ctx, agent).await?)
    }
    CredentialCommand::Disconnect { id } => {
      store.delete_credential(ctx, id).await?;
      info!(%id, "credential disconnected");
      Ok(())
    }
  }
}

// ─── Onboarding ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Onboarded {
  agent:      agentdesk_core::agent::Agent,
  user:       Option<agentdesk_core::user::User>,
  credential: agentdesk_core::credential::Credential,
}

async fn onboard(
  store: &SqliteStore,
  ctx: &Ctx,
  agent: NewAgent,
  supplier_code: &str,
  payload: OpaquePayload,
  first_user: Option<NewUser>,
) -> anyhow::Result<()> {
  let onboarded = store
    .run_in_transaction(ctx, move |tx| async move {
      let supplier = store.get_supplier_by_code(&tx, supplier_code).await?;
      let agent = store.create_agent(&tx, agent).await?;
      let user = match first_user {
        Some(input) => Some(store.create_user(&tx, input.for_agent(agent.id)).await?),
        None => None,
      };
      let credential = store
        .create_credential(&tx, NewCredential::new(agent.id, supplier.id, payload))
        .await?;
      Ok::<_, agentdesk_store_sqlite::Error>(Onboarded { agent, user, credential })
    })
    .await
    .context("onboarding failed; nothing was saved")?;

  print_json(&onboarded)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// A token cancelled on Ctrl-C, so an in-flight unit of work rolls back.
fn interrupt_token() -> CancellationToken {
  let token = CancellationToken::new();
  let trigger = token.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted; cancelling");
      trigger.cancel();
    }
  });
  token
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn read_payload(path: &Path) -> anyhow::Result<OpaquePayload> {
  let bytes = std::fs::read(path)
    .with_context(|| format!("failed to read payload from {}", path.display()))?;
  Ok(OpaquePayload::from(bytes))
}

/// Read a password line from stdin. Input is echoed; pipe it in for scripts.
fn read_password() -> anyhow::Result<String> {
  use std::io::{BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches('\n').trim_end_matches('\r').to_string();
  anyhow::ensure!(!password.is_empty(), "password must not be empty");
  Ok(password)
}

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string(),
  )
}
