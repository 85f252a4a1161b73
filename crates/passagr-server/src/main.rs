//! passagr server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and serves the editorial API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `[auth] password_hash`:
//!
//! ```
//! cargo run -p passagr-server -- --hash-password
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use passagr_api::AppState;
use passagr_pipeline::{
  Pipeline,
  links::HttpLinkProbe,
  model::ChatCompletionsModel,
  signals::{Signals, TracingSink, run_signal_worker},
};
use passagr_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::{ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "passagr editorial pipeline server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Print the effective critical-field set as JSON and exit.
  #[arg(long)]
  print_critical_fields: bool,
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

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)?;

  if cli.print_critical_fields {
    println!("{}", serde_json::to_string_pretty(&cfg.critical_fields)?);
    return Ok(());
  }

  let auth = cfg
    .auth
    .clone()
    .context("missing [auth] section (username, password_hash)")?;
  if auth.cron_secret.is_none() {
    warn!("no cron secret configured; job endpoints will reject every request");
  }
  for (entity_type, fields) in cfg.critical_fields.iter() {
    info!(%entity_type, fields = ?fields, "critical fields");
  }
  for entity_type in cfg.critical_fields.uncovered_defaults() {
    warn!(%entity_type, "no critical fields configured; changes to this type skip review");
  }

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let seeded = store
    .seed_freshness_policies(&cfg.freshness_policies)
    .await
    .context("failed to seed freshness policies")?;
  info!(seeded, "freshness policies ready");

  let (signals, rx) = Signals::channel();
  tokio::spawn(run_signal_worker(rx, TracingSink));

  let model = ChatCompletionsModel::new(cfg.model.clone()).context("failed to build model client")?;
  let probe = HttpLinkProbe::new().context("failed to build link probe")?;
  let pipeline = Pipeline::new(
    Arc::new(store),
    model,
    cfg.critical_fields.clone(),
    signals,
    cfg.pipeline.clone(),
  );

  let state = AppState {
    pipeline: Arc::new(pipeline),
    probe:    Arc::new(probe),
    auth:     Arc::new(auth),
  };
  let app = passagr_api::router(state).layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", cfg.host, cfg.port);
  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}
