//! Stage 1: turn a source document into a [`CandidateEntity`].

use std::sync::Arc;

use chrono::Utc;
use passagr_core::{
  entity::{CandidateEntity, EntityType},
  store::PipelineStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  model::{ExtractionModel, ExtractionRequest},
  schema,
};

const SYSTEM_PROMPT: &str =
  "You are a helpful assistant that extracts structured data from text. Respond with only JSON.";

/// What to extract, and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionTask {
  pub source_id:   Uuid,
  pub entity_type: EntityType,
  /// Set when the task refreshes an existing entity.
  #[serde(default)]
  pub entity_id:   Option<Uuid>,
}

pub struct Extractor<S, M> {
  store: Arc<S>,
  model: M,
}

impl<S: PipelineStore, M: ExtractionModel> Extractor<S, M> {
  pub fn new(store: Arc<S>, model: M) -> Self { Self { store, model } }

  /// Load the source, prompt the model, and conform its answer.
  ///
  /// Writes nothing. Any failure here means no downstream stage runs.
  pub async fn extract(&self, task: &ExtractionTask) -> Result<CandidateEntity> {
    let source = self
      .store
      .get_source(task.source_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SourceNotFound(task.source_id))?;

    let excerpt = source
      .excerpt
      .as_deref()
      .filter(|e| !e.trim().is_empty())
      .ok_or(Error::EmptySource(task.source_id))?;

    let request = ExtractionRequest {
      system: SYSTEM_PROMPT.to_owned(),
      prompt: build_prompt(task.entity_type, excerpt, &source.url),
    };

    let raw = self.model.complete(request).await.inspect_err(|e| {
      warn!(source_id = %task.source_id, error = %e, "extraction model call failed");
    })?;

    let parsed: Value = serde_json::from_str(&raw)?;
    let Value::Object(object) = parsed else {
      warn!(source_id = %task.source_id, "model output is not a JSON object");
      return Err(Error::MalformedExtraction);
    };

    let fields = schema::conform(task.entity_type, &object);
    debug!(
      source_id = %task.source_id,
      entity_type = %task.entity_type,
      fields = fields.len(),
      "extraction complete"
    );

    Ok(CandidateEntity {
      entity_type: task.entity_type,
      entity_id: task.entity_id,
      source_id: task.source_id,
      last_verified_at: Utc::now(),
      fields,
    })
  }
}

fn build_prompt(entity_type: EntityType, excerpt: &str, url: &str) -> String {
  let skeleton = serde_json::to_string_pretty(&schema::skeleton(entity_type))
    .unwrap_or_else(|_| "{}".to_owned());
  format!(
    "You are an expert data extraction agent. Your task is to extract information from the \
     provided text and format it into a JSON object.\n\
     Only extract what is explicitly present in the text. Do not hallucinate or invent any \
     facts.\n\
     If a field's value is not found, set it to null or an empty array.\n\
     Your output must be a single JSON object matching the schema provided.\n\n\
     Schema for {entity_type}: {skeleton}\n\
     Text content: {excerpt}\n\
     Source URL: {url}\n"
  )
}
