//! The passagr editorial pipeline.
//!
//! A candidate moves through six stages, in order:
//!
//! 1. [`extractor`]: source text to a [`CandidateEntity`](passagr_core::entity::CandidateEntity)
//! 2. [`validator`]: schema, business and safety checks, yielding an impact tier
//! 3. [`differ`]: field-level diff against the published entity
//! 4. [`router`]: human review or automatic publication
//! 5. [`publisher`]: version-checked write, changelog entry, downstream signals
//! 6. [`alert`]: notification text for medium and high impact publishes
//!
//! [`Pipeline`] wires the stages over a single
//! [`PipelineStore`](passagr_core::store::PipelineStore) and also resolves
//! reviews. The [`freshness`] scanner and [`links`] checker are the periodic
//! jobs that feed it.

pub mod alert;
pub mod differ;
pub mod error;
pub mod extractor;
pub mod freshness;
pub mod links;
pub mod model;
pub mod pipeline;
pub mod publisher;
pub mod router;
pub mod schema;
pub mod signals;
pub mod validator;

pub use error::{Error, Result};
pub use pipeline::{BatchReport, Outcome, Pipeline, PipelineConfig};

#[cfg(test)]
mod testing;
