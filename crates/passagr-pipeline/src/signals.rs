//! Downstream signals emitted after a publish: search resync and cache purge.
//!
//! The publisher hands signals to an unbounded channel and moves on. A worker
//! task drains the channel into a [`SignalSink`]; delivery failures are logged
//! and never reach the publish that caused them.

use std::future::Future;

use passagr_core::entity::EntityType;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::BoxError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
  /// Re-index one entity. The search side upserts or deletes depending on
  /// the entity's current status, so repeated delivery is harmless.
  SearchSync { entity_type: EntityType, entity_id: Uuid },
  /// Drop cached copies of a public path.
  CachePurge { path: String },
}

/// The sending half handed to the publisher. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Signals {
  tx: Option<mpsc::UnboundedSender<Signal>>,
}

impl Signals {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Signal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx: Some(tx) }, rx)
  }

  /// A sender that drops every signal.
  pub fn disabled() -> Self { Self::default() }

  pub fn emit(&self, signal: Signal) {
    let Some(tx) = &self.tx else { return };
    if let Err(e) = tx.send(signal) {
      warn!(signal = ?e.0, "signal worker is gone; dropping signal");
    }
  }
}

/// Where signals end up: a search indexer, a CDN purge API, a log.
pub trait SignalSink: Send + Sync {
  fn deliver(&self, signal: &Signal) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Logs each signal. The default sink when no search or cache service is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl SignalSink for TracingSink {
  async fn deliver(&self, signal: &Signal) -> Result<(), BoxError> {
    match signal {
      Signal::SearchSync { entity_type, entity_id } => {
        info!(%entity_type, %entity_id, collection = entity_type.collection(), "search sync")
      }
      Signal::CachePurge { path } => info!(%path, "cache purge"),
    }
    Ok(())
  }
}

/// Drain `rx` into `sink` until every sender is dropped.
pub async fn run_signal_worker<K: SignalSink>(mut rx: mpsc::UnboundedReceiver<Signal>, sink: K) {
  while let Some(signal) = rx.recv().await {
    if let Err(e) = sink.deliver(&signal).await {
      warn!(?signal, error = %e, "signal delivery failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;

  #[derive(Clone, Default)]
  struct Recorder(Arc<Mutex<Vec<Signal>>>);

  impl SignalSink for Recorder {
    async fn deliver(&self, signal: &Signal) -> Result<(), BoxError> {
      self.0.lock().map_err(|e| e.to_string())?.push(signal.clone());
      Ok(())
    }
  }

  #[tokio::test]
  async fn worker_drains_until_senders_drop() {
    let (signals, rx) = Signals::channel();
    let sink = Recorder::default();
    let worker = tokio::spawn(run_signal_worker(rx, sink.clone()));

    signals.emit(Signal::CachePurge { path: "/public/countries/x".into() });
    signals.emit(Signal::SearchSync {
      entity_type: EntityType::Country,
      entity_id:   Uuid::nil(),
    });
    drop(signals);
    worker.await.unwrap();

    let seen = sink.0.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(matches!(seen[0], Signal::CachePurge { .. }));
  }

  #[test]
  fn disabled_signals_are_dropped_quietly() {
    Signals::disabled().emit(Signal::CachePurge { path: "/".into() });
  }
}
