//! Server configuration: a TOML file layered with `PASSAGR_*` environment
//! variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `PASSAGR_AUTH__CRON_SECRET` or `PASSAGR_MODEL__API_KEY`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use passagr_api::AuthConfig;
use passagr_core::policy::{CriticalFields, FreshnessPolicy, default_freshness_policies};
use passagr_pipeline::{PipelineConfig, model::ModelConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  /// Required to serve; optional so the audit flags work without it.
  pub auth:               Option<AuthConfig>,
  #[serde(default)]
  pub model:              ModelConfig,
  #[serde(default)]
  pub pipeline:           PipelineConfig,
  /// Entity types named here replace the built-in list; the rest keep it.
  #[serde(default)]
  pub critical_fields:    CriticalFields,
  /// Seeded into the store at startup; stored policies win.
  #[serde(default = "default_freshness_policies")]
  pub freshness_policies: Vec<FreshnessPolicy>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("passagr.db") }

impl ServerConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_builder(
      config::Config::builder().add_source(config::File::from(path).required(false)),
    )
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    let mut cfg: Self = builder
      .add_source(
        config::Environment::with_prefix("PASSAGR")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.critical_fields = CriticalFields::default().overlay(cfg.critical_fields);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
