//! Query engine: semantic search over loaded indexes and lexical search
//! delegated to an external `ripgrep` process.
//!
//! # Semantic search
//!
//! Brute-force exact cosine over every fragment that matches the requested
//! `(model, task)` pair, optionally restricted by file extension. Results
//! are ranked descending by similarity; ties keep insertion order (files in
//! path order, fragments in line order). Multi-index search applies
//! `max_results` per index, then re-sorts the concatenation globally.
//!
//! # Lexical search
//!
//! Spawns `rg --json --line-number --column` rooted at the index's path and
//! parses the NDJSON stream. Only `type:"match"` records are used; every
//! submatch becomes a hit. A missing binary, a failed spawn, or a non-zero
//! exit all degrade to an empty result set — lexical search never fails the
//! caller. Malformed JSON lines are skipped silently.

use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::embedding;
use crate::error::Result;
use crate::models::{extension_of, EmbeddingTask, FileRecord, Index};
use crate::similarity::cosine;
use crate::store;

/// File identity attached to a search hit.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub path: String,
    pub filename: String,
}

/// One semantic search result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticHit {
    pub file: FileMeta,
    pub fragment: crate::models::Fragment,
    pub similarity: f32,
}

/// One lexical (ripgrep) search result.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrepHit {
    pub file: FileMeta,
    pub line_number: u64,
    pub line_content: String,
    pub match_start: u64,
    /// Inclusive end column, i.e. ripgrep's exclusive `end - 1`.
    pub match_end: u64,
}

/// Normalize an extension filter entry: lowercase, leading dot.
fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Rank the fragments of one index against a precomputed query embedding.
///
/// Only fragments whose `model` and `task` both match are considered; files
/// are skipped entirely when `allowed_extensions` is non-empty and does not
/// contain their extension. Fragments without a usable vector (not yet
/// embedded, or of a different dimension) are ignored.
pub fn search_index(
    index: &Index,
    query: &[f32],
    max_results: usize,
    model: &str,
    task: EmbeddingTask,
    allowed_extensions: &[String],
) -> Vec<SemanticHit> {
    let allowed: Vec<String> = allowed_extensions
        .iter()
        .map(|e| normalize_extension(e))
        .collect();

    let mut hits = Vec::new();
    for file in index.files().values() {
        if !allowed.is_empty() && !allowed.contains(&extension_of(&file.path)) {
            continue;
        }
        for fragment in &file.fragments {
            if fragment.model != model || fragment.task != task {
                continue;
            }
            let Ok(similarity) = cosine(query, &fragment.embedding) else {
                continue;
            };
            hits.push(SemanticHit {
                file: FileMeta {
                    path: file.path.clone(),
                    filename: file.filename.clone(),
                },
                fragment: fragment.clone(),
                similarity,
            });
        }
    }

    rank(&mut hits, max_results);
    hits
}

/// Stable descending sort by similarity, truncated to `max_results`.
fn rank(hits: &mut Vec<SemanticHit>, max_results: usize) {
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(max_results);
}

/// Semantic search over a single index from query text.
pub async fn semantic_search(
    config: &Config,
    index: &Index,
    query_text: &str,
    max_results: usize,
    model: &str,
    task: EmbeddingTask,
    allowed_extensions: &[String],
) -> Result<Vec<SemanticHit>> {
    let query = embedding::embed(config, query_text, model, task).await?;
    Ok(search_index(
        index,
        &query,
        max_results,
        model,
        task,
        allowed_extensions,
    ))
}

/// Semantic search across every stored index.
///
/// `max_results` caps each index individually and the merged result again
/// after the global re-sort.
pub async fn search_all_indexes(
    config: &Config,
    app_dir: &Path,
    query_text: &str,
    max_results: usize,
    model: Option<&str>,
    allowed_extensions: &[String],
) -> Result<Vec<SemanticHit>> {
    let model = model.unwrap_or(&config.embedding_model);
    let task = embedding::default_query_task(model);
    let query = embedding::embed(config, query_text, model, task).await?;

    let mut hits = Vec::new();
    for (_, index) in store::load_all_indexes(app_dir) {
        hits.extend(search_index(
            &index,
            &query,
            max_results,
            model,
            task,
            allowed_extensions,
        ));
    }

    rank(&mut hits, max_results);
    Ok(hits)
}

/// Lexical search over one index via ripgrep.
pub async fn lexical_search(
    index: &Index,
    pattern: &str,
    case_sensitive: bool,
    max_results: usize,
) -> Vec<GrepHit> {
    let mut cmd = tokio::process::Command::new("rg");
    cmd.arg("--json").arg("--line-number").arg("--column");
    if !case_sensitive {
        cmd.arg("--ignore-case");
    }
    cmd.arg("--").arg(pattern).arg(index.path());

    let output = match cmd.output().await {
        Ok(output) => output,
        Err(e) => {
            warn!("failed to spawn rg: {e}");
            return Vec::new();
        }
    };
    if !output.status.success() {
        return Vec::new();
    }

    parse_rg_output(&String::from_utf8_lossy(&output.stdout), index, max_results)
}

/// Parse ripgrep's NDJSON stream into hits resolved against the index map.
fn parse_rg_output(stdout: &str, index: &Index, max_results: usize) -> Vec<GrepHit> {
    let mut hits = Vec::new();

    for line in stdout.lines() {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if value.get("type").and_then(|t| t.as_str()) != Some("match") {
            continue;
        }
        let data = &value["data"];
        let Some(matched_path) = data["path"]["text"].as_str() else {
            continue;
        };
        let Some(file) = resolve_file(index, matched_path) else {
            continue;
        };

        let line_number = data["line_number"].as_u64().unwrap_or(0);
        let line_content = data["lines"]["text"].as_str().unwrap_or("").trim();
        let Some(submatches) = data["submatches"].as_array() else {
            continue;
        };

        for submatch in submatches {
            let start = submatch["start"].as_u64().unwrap_or(0);
            let end = submatch["end"].as_u64().unwrap_or(start + 1);
            hits.push(GrepHit {
                file: FileMeta {
                    path: file.path.clone(),
                    filename: file.filename.clone(),
                },
                line_number,
                line_content: line_content.to_string(),
                match_start: start,
                match_end: end.saturating_sub(1),
            });
            if hits.len() >= max_results {
                return hits;
            }
        }
    }

    hits
}

/// Exact path lookup with a suffix-match fallback for relative rg output.
fn resolve_file<'a>(index: &'a Index, path: &str) -> Option<&'a FileRecord> {
    index
        .files()
        .get(path)
        .or_else(|| index.files().values().find(|f| f.path.ends_with(path)))
}

/// Lexical search across every stored index, merged by
/// `(filename, line_number)`.
pub async fn lexical_search_all(
    app_dir: &Path,
    pattern: &str,
    case_sensitive: bool,
    max_results: usize,
) -> Vec<GrepHit> {
    let mut hits = Vec::new();
    for (_, index) in store::load_all_indexes(app_dir) {
        hits.extend(lexical_search(&index, pattern, case_sensitive, max_results).await);
    }
    hits.sort_by(|a, b| {
        (&a.file.filename, a.line_number).cmp(&(&b.file.filename, b.line_number))
    });
    hits.truncate(max_results);
    hits
}
