//! `agentdesk` administration binary.
//!
//! Reads `agentdesk.toml` (or the path given with `--config`), layers
//! `AGENTDESK_*` environment variables on top, opens the SQLite store and runs
//! one command against it. Results are printed as JSON.
//!
//! ```text
//! agentdesk supplier add AMADEUS "Amadeus GDS"
//! agentdesk onboard --name "Sky Tours" --email ops@sky.example \
//!   --supplier AMADEUS --payload amadeus.bin
//! ```

mod commands;
mod settings;

use std::path::PathBuf;

use agentdesk_core::Id;
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "agentdesk", version, about = "Agent, user and supplier credential store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "agentdesk.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the database and its schema if they do not exist yet.
  Init,

  /// Manage GDS suppliers.
  #[command(subcommand)]
  Supplier(SupplierCommand),

  /// Manage agents and the agency tree.
  #[command(subcommand)]
  Agent(AgentCommand),

  /// Manage login accounts.
  #[command(subcommand)]
  User(UserCommand),

  /// Manage per-supplier credentials.
  #[command(subcommand)]
  Credential(CredentialCommand),

  /// Create an IATA agent, an optional first user, and its first supplier
  /// credential in one unit of work.
  Onboard {
    #[arg(long)]
    name:       String,
    #[arg(long)]
    email:      String,
    /// Supplier code, e.g. AMADEUS.
    #[arg(long)]
    supplier:   String,
    /// File holding the already-encrypted credential payload.
    #[arg(long, value_name = "FILE")]
    payload:    PathBuf,
    /// Also create a user with this email; the password is read from stdin.
    #[arg(long)]
    user_email: Option<String>,
    #[arg(long, requires = "user_email")]
    user_name:  Option<String>,
  },
}

#[derive(Subcommand)]
enum SupplierCommand {
  Add { code: String, name: String },
  Show { code: String },
  List {
    #[arg(long, default_value_t = 0)]
    offset: u64,
    #[arg(long, default_value_t = agentdesk_core::page::DEFAULT_LIMIT)]
    limit:  u32,
  },
  Delete { id: Id },
}

#[derive(Subcommand)]
enum AgentCommand {
  /// Add an IATA agent, or a sub-agent when `--parent` is given.
  Add {
    #[arg(long)]
    name:     String,
    #[arg(long)]
    email:    String,
    #[arg(long)]
    parent:   Option<Id>,
    #[arg(long)]
    inactive: bool,
  },
  /// Show an agent with its parent and children, by id or email.
  Show { agent: String },
  List {
    #[arg(long, default_value_t = 0)]
    offset:   u64,
    #[arg(long, default_value_t = agentdesk_core::page::DEFAULT_LIMIT)]
    limit:    u32,
    /// Only agents with this activity flag, unpaginated.
    #[arg(long, conflicts_with_all = ["offset", "limit"])]
    active:   Option<bool>,
  },
  /// Move an agent under another parent.
  Move { id: Id, parent: Id },
  Activate { id: Id },
  Deactivate { id: Id },
  Delete { id: Id },
}

#[derive(Subcommand)]
enum UserCommand {
  /// Add a user; the password is read from stdin.
  Add {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    agent: Option<Id>,
  },
  Show { email: String },
  /// List the users attached to an agent.
  List { agent: Id },
  /// Replace a user's password; the new one is read from stdin.
  SetPassword { id: Id },
  Delete { id: Id },
}

#[derive(Subcommand)]
enum CredentialCommand {
  /// Store a credential for an (agent, supplier) pair.
  Connect {
    #[arg(long)]
    agent:    Id,
    #[arg(long)]
    supplier: Id,
    #[arg(long, value_name = "FILE")]
    payload:  PathBuf,
  },
  /// Show the live credential for an (agent, supplier) pair.
  Show {
    #[arg(long)]
    agent:    Id,
    #[arg(long)]
    supplier: Id,
  },
  /// Replace the payload of an existing credential.
  Rotate {
    id:      Id,
    #[arg(long, value_name = "FILE")]
    payload: PathBuf,
  },
  /// List an agent's live credentials.
  List { agent: Id },
  Disconnect { id: Id },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store = agentdesk_store_sqlite::SqliteStore::open_with(settings.store.clone())
    .await
    .with_context(|| {
      format!("failed to open store at {}", settings.store.path.display())
    })?;

  commands::run(&store, cli.command).await
}
