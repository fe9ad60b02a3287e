//! Embedding client for OpenAI-compatible endpoints.
//!
//! Talks to `POST {apiBaseUrl}/embeddings` with `{ model, input }` and reads
//! back `{ data: [{ embedding }, ...] }` in input order. The HTTP client is
//! a lazily initialized process-wide singleton; outgoing calls are bounded
//! by a semaphore of [`DEFAULT_MAX_IN_FLIGHT`] permits.
//!
//! # Task-conditioned prompts
//!
//! Model families trained with instruction prefixes (currently the
//! embeddinggemma family) get a per-task prompt wrapped around the text:
//! document-side, query-side, and symmetric-similarity prompts produce
//! different vectors, which is what makes dual-task indexing useful. Models
//! without a task dimension receive the text untouched; the task still
//! records the caller's intent on the fragment.
//!
//! # Failure contract
//!
//! All transport and protocol failures surface as
//! [`Error::EmbeddingBackend`] carrying the provider's message. Callers
//! check [`Error::is_input_too_long`] to decide whether splitting the
//! fragment and retrying is worthwhile.

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::EmbeddingTask;

/// Upper bound on concurrent outgoing embedding calls.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

struct Backend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    permits: Semaphore,
}

static BACKEND: OnceLock<Backend> = OnceLock::new();

/// Resolve the process-wide backend, initializing it from `config` on the
/// first call. Later calls reuse the first configuration.
fn backend(config: &Config) -> Result<&'static Backend> {
    if !config.embedding_enabled() {
        return Err(Error::Config(
            "apiBaseUrl is empty; embedding is disabled".to_string(),
        ));
    }
    Ok(BACKEND.get_or_init(|| Backend {
        http: reqwest::Client::new(),
        base_url: config.api_base_url.trim_end_matches('/').to_string(),
        api_key: config.api_key.clone(),
        permits: Semaphore::new(DEFAULT_MAX_IN_FLIGHT),
    }))
}

/// Whether `model` belongs to a family with task-conditioned prompts.
pub fn is_task_aware(model: &str) -> bool {
    model.to_lowercase().contains("embeddinggemma")
}

/// Tasks to index fragments under for `model`: dual-task for task-aware
/// families, symmetric similarity otherwise.
pub fn default_index_tasks(model: &str) -> Vec<EmbeddingTask> {
    if is_task_aware(model) {
        vec![
            EmbeddingTask::RetrievalDocument,
            EmbeddingTask::RetrievalQuery,
        ]
    } else {
        vec![EmbeddingTask::SemanticSimilarity]
    }
}

/// Default task for the query side of a semantic search against `model`.
pub fn default_query_task(model: &str) -> EmbeddingTask {
    if is_task_aware(model) {
        EmbeddingTask::RetrievalQuery
    } else {
        EmbeddingTask::SemanticSimilarity
    }
}

/// Wrap `text` in the model family's prompt for `task`.
fn apply_task_prompt(text: &str, model: &str, task: EmbeddingTask) -> String {
    if !is_task_aware(model) {
        return text.to_string();
    }
    match task {
        EmbeddingTask::RetrievalDocument => format!("title: none | text: {text}"),
        EmbeddingTask::RetrievalQuery => format!("task: search result | query: {text}"),
        EmbeddingTask::SemanticSimilarity => {
            format!("task: sentence similarity | query: {text}")
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Embed a batch of texts, preserving input order.
pub async fn embed_batch(
    config: &Config,
    texts: &[String],
    model: &str,
    task: EmbeddingTask,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let backend = backend(config)?;
    let input: Vec<String> = texts
        .iter()
        .map(|t| apply_task_prompt(t, model, task))
        .collect();

    let _permit = backend
        .permits
        .acquire()
        .await
        .map_err(|e| Error::EmbeddingBackend(e.to_string()))?;

    let url = format!("{}/embeddings", backend.base_url);
    let mut request = backend
        .http
        .post(&url)
        .timeout(REQUEST_TIMEOUT)
        .json(&EmbedRequest { model, input });
    if !backend.api_key.is_empty() {
        request = request.bearer_auth(&backend.api_key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::EmbeddingBackend(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::EmbeddingBackend(format!("{status}: {body}")));
    }

    let parsed: EmbedResponse = response
        .json()
        .await
        .map_err(|e| Error::EmbeddingBackend(format!("malformed embeddings response: {e}")))?;

    if parsed.data.len() != texts.len() {
        return Err(Error::EmbeddingBackend(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            parsed.data.len()
        )));
    }

    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

/// Embed a single text.
pub async fn embed(
    config: &Config,
    text: &str,
    model: &str,
    task: EmbeddingTask,
) -> Result<Vec<f32>> {
    let mut vectors = embed_batch(config, &[text.to_string()], model, task).await?;
    vectors
        .pop()
        .ok_or_else(|| Error::EmbeddingBackend("empty embeddings response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemma_family_gets_task_prompts() {
        let doc = apply_task_prompt("hello", "embeddinggemma", EmbeddingTask::RetrievalDocument);
        assert_eq!(doc, "title: none | text: hello");

        let query = apply_task_prompt("hello", "embeddinggemma", EmbeddingTask::RetrievalQuery);
        assert_eq!(query, "task: search result | query: hello");

        let sim =
            apply_task_prompt("hello", "EmbeddingGemma-300m", EmbeddingTask::SemanticSimilarity);
        assert_eq!(sim, "task: sentence similarity | query: hello");
    }

    #[test]
    fn other_models_pass_text_through() {
        let out = apply_task_prompt("hello", "nomic-embed-text", EmbeddingTask::RetrievalQuery);
        assert_eq!(out, "hello");
    }

    #[test]
    fn index_tasks_depend_on_model_family() {
        assert_eq!(
            default_index_tasks("embeddinggemma"),
            vec![
                EmbeddingTask::RetrievalDocument,
                EmbeddingTask::RetrievalQuery
            ]
        );
        assert_eq!(
            default_index_tasks("all-minilm"),
            vec![EmbeddingTask::SemanticSimilarity]
        );
        assert_eq!(
            default_query_task("embeddinggemma"),
            EmbeddingTask::RetrievalQuery
        );
        assert_eq!(
            default_query_task("all-minilm"),
            EmbeddingTask::SemanticSimilarity
        );
    }

    #[test]
    fn response_parsing_preserves_order() {
        let raw = r#"{ "data": [
            { "embedding": [1.0, 2.0], "index": 0 },
            { "embedding": [3.0, 4.0], "index": 1 }
        ], "model": "m" }"#;
        let parsed: EmbedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].embedding, vec![1.0, 2.0]);
        assert_eq!(parsed.data[1].embedding, vec![3.0, 4.0]);
    }
}
