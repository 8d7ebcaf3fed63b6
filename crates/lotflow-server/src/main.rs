//! lotflow server binary.
//!
//! Loads configuration from `config.toml` (override with `--config`) and
//! `LOTFLOW_*` environment variables, opens the SQLite store, and serves the
//! lot workflow API.
//!
//! # Bootstrapping the first approver
//!
//! A fresh store has no accounts. Create the first approver with a password
//! entered on stdin:
//!
//! ```
//! cargo run -p lotflow-server --bin lotflow -- --bootstrap-approver admin@example.com
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use lotflow_api::{
  AppState,
  password::{MIN_PASSWORD_LEN, hash_password},
};
use lotflow_core::identity::{NewUser, Role, UserDirectory};
use lotflow_server::{
  ServerConfig,
  notify::{WebhookNotifier, spawn_notifier},
};
use lotflow_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Lot registration workflow server")]
struct Cli {
  /// TOML configuration file; missing is fine when env vars cover it.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create an approver account with this email, reading its password from
  /// stdin, and exit.
  #[arg(long, value_name = "EMAIL")]
  bootstrap_approver: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = load_config(&cli.config)?;

  let store_path = home_relative(&cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("cannot open store {}", store_path.display()))?,
  );

  let users = match &cfg.root_admin_email {
    Some(email) => UserDirectory::new(Arc::clone(&store)).with_root_admin(email),
    None => UserDirectory::new(Arc::clone(&store)),
  };

  if let Some(email) = cli.bootstrap_approver {
    return bootstrap_approver(&users, email).await;
  }

  let notifier = Arc::new(
    WebhookNotifier::new(cfg.notify_enabled, cfg.notify_webhook_url.clone())
      .context("cannot build webhook client")?,
  );
  if !notifier.is_enabled() {
    info!("chat notifications disabled");
  }
  let sink = spawn_notifier(Arc::clone(&notifier), Arc::new(users.clone()));
  let app = lotflow_server::router(AppState::new(store, users, Arc::new(sink)), notifier);

  let listener = TcpListener::bind((cfg.host.as_str(), cfg.port))
    .await
    .with_context(|| format!("cannot bind {}:{}", cfg.host, cfg.port))?;
  info!(addr = %listener.local_addr()?, "lotflow listening");

  axum::serve(listener, app).await.context("server stopped with an error")
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("LOTFLOW"))
    .build()
    .with_context(|| format!("cannot read configuration from {}", path.display()))?
    .try_deserialize()
    .context("invalid server configuration")
}

/// Create an approver from a password typed on stdin and print its id.
async fn bootstrap_approver(
  users: &UserDirectory<SqliteStore>,
  email: String,
) -> anyhow::Result<()> {
  let password = read_password()?;
  anyhow::ensure!(
    password.chars().count() >= MIN_PASSWORD_LEN,
    "password must be at least {MIN_PASSWORD_LEN} characters"
  );
  let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2: {e}"))?;
  let user = users
    .create_user(NewUser { email, role: Role::Approver, display_name: None }, hash)
    .await
    .context("cannot create approver")?;
  println!("{}", user.id);
  Ok(())
}

/// Prompt for a password and read one line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::Write as _;
  eprint!("Password: ");
  std::io::stderr().flush().ok();
  let mut line = String::new();
  std::io::stdin().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}

/// Resolve `~/…` against `$HOME`; other paths are returned as given.
fn home_relative(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
