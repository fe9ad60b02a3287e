//! Core data models for the fragment index.
//!
//! The data lifecycle is:
//!
//! ```text
//! discover → chunk_file() → Fragment (line range, no text)
//!                               ↓
//!                          embed() → Fragment.embedding
//!                               ↓
//!                     FileRecord { path, hash, fragments }
//!                               ↓
//!                     Index::Folder | Index::GitRepo
//!                               ↓
//!                     codec (4-byte version header + payload)
//! ```
//!
//! # Type relationships
//!
//! - A **[`Fragment`]** is a contiguous 1-based inclusive line range of a
//!   single file, plus embedding metadata. Fragment text is *not* stored;
//!   callers slice lines by range when they need it.
//! - A **[`FileRecord`]** owns the ordered fragments of one file together
//!   with the file's content hash and timestamps.
//! - An **[`Index`]** is a tagged union: a plain folder index, or a git-repo
//!   index that additionally carries advisory commit metadata.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// The role an embedding plays at query time.
///
/// For model families with task-conditioned prompts (e.g. embeddinggemma),
/// `RetrievalDocument` and `RetrievalQuery` produce asymmetric vectors and a
/// fragment may be indexed under both. Models without a task dimension use
/// `SemanticSimilarity` and ignore the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingTask {
    /// Indexed corpus side of an asymmetric retrieval pair.
    RetrievalDocument,
    /// Query side of an asymmetric retrieval pair.
    RetrievalQuery,
    /// Symmetric text-to-text similarity.
    SemanticSimilarity,
}

/// A contiguous line range of a single file with embedding metadata.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `start_line` / `end_line` | 1-based inclusive range, `start_line ≤ end_line` |
/// | `embedding` | dense vector; empty until the embedding stage attaches one |
/// | `fragment_type` | free-form tag, e.g. `"document"`, `"markdown_section"` |
/// | `model` | embedding model identifier the vector belongs to |
/// | `chunk_algorithm` | `"simple"`, `"markdown"` or `"nim"` |
/// | `task` | the [`EmbeddingTask`] the vector was produced for |
/// | `private` | reserved, default `false` |
/// | `content_score` | 0–100 heuristic of how much signal the text carries |
/// | `hash` | SHA-256 of the fragment's text, lowercase hex |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub start_line: u32,
    pub end_line: u32,
    pub embedding: Vec<f32>,
    pub fragment_type: String,
    pub model: String,
    pub chunk_algorithm: String,
    pub task: EmbeddingTask,
    pub private: bool,
    pub content_score: u8,
    pub hash: String,
}

/// One indexed file: identity, content hash, timestamps, and its fragments.
///
/// Fragments are ordered by `start_line`; fragments produced by the same
/// chunk algorithm never overlap, but a file may carry parallel fragment
/// sequences from more than one algorithm or task (dual-task indexing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Absolute path of the file.
    pub path: String,
    /// Basename, kept denormalized for lexical-result merging.
    pub filename: String,
    /// SHA-256 of the full file bytes, lowercase hex.
    pub hash: String,
    /// Creation time, Unix seconds.
    pub creation_time: f64,
    /// Last modification time, Unix seconds.
    pub last_modified: f64,
    pub fragments: Vec<Fragment>,
}

/// A persisted index over one root: either a plain folder or a git repo.
///
/// The git variant's commit metadata is advisory only — it is refreshed on
/// every update but the index is not tied to a specific commit.
///
/// The file map is a `BTreeMap` keyed by absolute path so serialization is
/// deterministic (sorted by key), which the golden-file tests rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Index {
    Folder {
        path: String,
        files: BTreeMap<String, FileRecord>,
    },
    GitRepo {
        path: String,
        files: BTreeMap<String, FileRecord>,
        /// Basename of the repository directory.
        name: String,
        /// 40-char hex of HEAD, or `"unknown"` when git was unavailable.
        latest_commit_hash: String,
        /// Whether uncommitted changes were present at the last update.
        is_dirty: bool,
    },
}

/// Discriminant for [`Index`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Folder,
    GitRepo,
}

impl Index {
    pub fn kind(&self) -> IndexKind {
        match self {
            Index::Folder { .. } => IndexKind::Folder,
            Index::GitRepo { .. } => IndexKind::GitRepo,
        }
    }

    /// Root path the index was built from.
    pub fn path(&self) -> &str {
        match self {
            Index::Folder { path, .. } => path,
            Index::GitRepo { path, .. } => path,
        }
    }

    pub fn files(&self) -> &BTreeMap<String, FileRecord> {
        match self {
            Index::Folder { files, .. } => files,
            Index::GitRepo { files, .. } => files,
        }
    }

    pub fn files_mut(&mut self) -> &mut BTreeMap<String, FileRecord> {
        match self {
            Index::Folder { files, .. } => files,
            Index::GitRepo { files, .. } => files,
        }
    }

    /// Total fragment count across all files.
    pub fn fragment_count(&self) -> usize {
        self.files().values().map(|f| f.fragments.len()).sum()
    }
}

/// Lowercased extension of a path including the leading dot, or `""` when
/// the path has none. Filters and the chunker dispatch both key off this.
pub fn extension_of(path: &str) -> String {
    match Path::new(path).extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(extension_of("/a/b/Readme.MD"), ".md");
        assert_eq!(extension_of("/a/b/main.rs"), ".rs");
        assert_eq!(extension_of("/a/b/Makefile"), "");
        assert_eq!(extension_of("/a/b/archive.tar.gz"), ".gz");
    }

    #[test]
    fn index_accessors_match_variant() {
        let folder = Index::Folder {
            path: "/tmp/x".to_string(),
            files: BTreeMap::new(),
        };
        assert_eq!(folder.kind(), IndexKind::Folder);
        assert_eq!(folder.path(), "/tmp/x");
        assert_eq!(folder.fragment_count(), 0);

        let repo = Index::GitRepo {
            path: "/tmp/repo".to_string(),
            files: BTreeMap::new(),
            name: "repo".to_string(),
            latest_commit_hash: "unknown".to_string(),
            is_dirty: true,
        };
        assert_eq!(repo.kind(), IndexKind::GitRepo);
    }
}
