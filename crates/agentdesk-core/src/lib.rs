//! Core types and trait definitions for the agentdesk agent/credential store.
//!
//! This crate is deliberately free of database dependencies. Storage backends
//! implement the repository traits in [`store`]; callers depend on those
//! traits, not on any concrete backend.

// Native `async fn` in traits; the returned futures carry explicit `Send`
// bounds in the trait signatures.
#![allow(async_fn_in_trait)]

pub mod agent;
pub mod context;
pub mod credential;
pub mod error;
pub mod id;
pub mod page;
pub mod store;
pub mod supplier;
pub mod user;

pub use context::Context;
pub use error::{Entity, Error, Result};
pub use id::Id;
pub use page::{Page, PageRequest};
