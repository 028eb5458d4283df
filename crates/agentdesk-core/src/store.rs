//! Repository traits implemented by storage backends.
//!
//! Every operation takes a [`Context`] parameterised by the backend's
//! unit-of-work handle. Inside [`TransactionCoordinator::run_in_transaction`]
//! the context carries that handle and all repositories share it; outside, the
//! backend falls back to its default handle.
//!
//! All methods return `Send` futures so the traits work in multi-threaded
//! async runtimes.

use std::future::Future;

use crate::{
  Context, Id, Page, PageRequest,
  agent::{Agent, AgentChanges, AgentView, NewAgent},
  credential::{Credential, NewCredential, OpaquePayload},
  supplier::{NewSupplier, Supplier},
  user::{NewUser, User, UserChanges},
};

/// Associated types shared by all repositories of one backend.
pub trait Storage: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  /// Strongly typed handle to an open transaction.
  type UnitOfWork: Clone + Send + Sync + 'static;
}

// ─── Agents ──────────────────────────────────────────────────────────────────

pub trait AgentRepository: Storage {
  /// Persist a new agent. Fails with a constraint violation if the email is
  /// taken by a live agent or the declared parent is missing or deleted.
  fn create_agent<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    input: NewAgent,
  ) -> impl Future<Output = Result<Agent, Self::Error>> + Send + 'a;

  /// Fetch a live agent with its parent and direct children.
  fn get_agent<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
  ) -> impl Future<Output = Result<AgentView, Self::Error>> + Send + 'a;

  fn get_agent_by_email<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    email: &'a str,
  ) -> impl Future<Output = Result<AgentView, Self::Error>> + Send + 'a;

  /// Live direct children of `parent_id`, active or not.
  fn get_agents_by_parent<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    parent_id: Id,
  ) -> impl Future<Output = Result<Vec<Agent>, Self::Error>> + Send + 'a;

  fn get_active_agents<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
  ) -> impl Future<Output = Result<Vec<Agent>, Self::Error>> + Send + 'a;

  fn get_inactive_agents<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
  ) -> impl Future<Output = Result<Vec<Agent>, Self::Error>> + Send + 'a;

  /// Apply `changes` to a live agent. Moving an agent under one of its own
  /// descendants is rejected.
  fn update_agent<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
    changes: AgentChanges,
  ) -> impl Future<Output = Result<Agent, Self::Error>> + Send + 'a;

  /// Soft-delete a live agent. Exactly one of several concurrent calls
  /// succeeds; the rest report not found.
  fn delete_agent<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn list_agents<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<Agent>, Self::Error>> + Send + 'a;
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub trait UserRepository: Storage {
  fn create_user<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  fn get_user<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  fn get_user_by_email<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    email: &'a str,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  fn get_users_by_agent<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    agent_id: Id,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  fn get_active_users<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  fn update_user<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
    changes: UserChanges,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  /// Replace only the password hash and `updated_at`.
  fn update_password<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
    password_hash: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete_user<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn list_users<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<User>, Self::Error>> + Send + 'a;
}

// ─── Suppliers ───────────────────────────────────────────────────────────────

pub trait SupplierRepository: Storage {
  fn create_supplier<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    input: NewSupplier,
  ) -> impl Future<Output = Result<Supplier, Self::Error>> + Send + 'a;

  fn get_supplier<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
  ) -> impl Future<Output = Result<Supplier, Self::Error>> + Send + 'a;

  fn get_supplier_by_code<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    code: &'a str,
  ) -> impl Future<Output = Result<Supplier, Self::Error>> + Send + 'a;

  fn list_suppliers<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<Supplier>, Self::Error>> + Send + 'a;

  /// Soft-delete a supplier. Rejected while any live credential references
  /// it.
  fn delete_supplier<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Credentials ─────────────────────────────────────────────────────────────

pub trait CredentialRepository: Storage {
  /// Store the first live credential for an (agent, supplier) pair.
  fn create_credential<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    input: NewCredential,
  ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + 'a;

  fn get_credential<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
  ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + 'a;

  fn get_credential_by_agent_and_supplier<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    agent_id: Id,
    supplier_id: Id,
  ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + 'a;

  /// Rotate the payload in place; the credential id is unchanged.
  fn update_credential<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
    payload: OpaquePayload,
  ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + 'a;

  fn delete_credential<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    id: Id,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn list_credentials<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<Credential>, Self::Error>> + Send + 'a;

  fn list_credentials_for_agent<'a>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    agent_id: Id,
  ) -> impl Future<Output = Result<Vec<Credential>, Self::Error>> + Send + 'a;
}

// ─── Units of work ───────────────────────────────────────────────────────────

pub trait TransactionCoordinator: Storage {
  /// Run `work` inside one transaction.
  ///
  /// `work` receives a context carrying the transaction. If it returns `Ok`
  /// the transaction commits; otherwise it rolls back and the error from
  /// `work` is returned unchanged. When `ctx` already carries a unit of work,
  /// that one is reused and no new transaction is opened.
  fn run_in_transaction<'a, T, E, F, Fut>(
    &'a self,
    ctx: &'a Context<Self::UnitOfWork>,
    work: F,
  ) -> impl Future<Output = Result<T, E>> + Send + 'a
  where
    T: Send + 'a,
    E: From<Self::Error> + Send + 'a,
    F: FnOnce(Context<Self::UnitOfWork>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<T, E>> + Send + 'a;
}
