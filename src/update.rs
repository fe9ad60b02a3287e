//! Incremental index maintenance.
//!
//! Keeps an on-disk index in sync with a mutating file tree without
//! re-embedding unchanged files:
//!
//! 1. Load the existing index (any load failure, including a deleted
//!    version-mismatched file, falls back to a full build).
//! 2. Discover the current file set with the same filters as a full build.
//! 3. Diff: files gone from disk are removed, files that are new or whose
//!    content changed are rebuilt, everything else keeps its fragments and
//!    embeddings untouched.
//! 4. Git-repo metadata is refreshed unconditionally.
//!
//! The updater reports whether anything changed; callers must skip the
//! write-back when nothing did, so an unchanged tree produces a
//! byte-identical index file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::codec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::indexer;
use crate::models::{Index, IndexKind};
use crate::store;

/// What an update pass did to one index.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOutcome {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    /// Fragment count of the resulting index.
    pub fragments: usize,
    /// Whether the index differs from what was loaded. `false` means the
    /// caller must not write the file back.
    pub changed: bool,
}

/// Whether a stored file record is stale relative to the file on disk.
///
/// The content hash is authoritative in both directions: a bumped mtime
/// over identical bytes is not a change (a `touch` or a checkout that
/// resets timestamps must not force a re-embed), and a same-mtime edit is
/// still caught. The record is stale exactly when the bytes no longer hash
/// to `record.hash`.
pub fn needs_reindexing(record: &crate::models::FileRecord, path: &Path) -> Result<bool> {
    let bytes = std::fs::read(path)?;
    Ok(indexer::sha256_hex(&bytes) != record.hash)
}

/// Bring the index at `index_path` in sync with `root`.
///
/// Falls back to a full build when no usable index exists on disk (missing,
/// corrupt, version-mismatched, or of the wrong kind). Per-file failures are
/// logged and leave the previous record in place, so one unreadable file
/// never poisons the rest of the index.
pub async fn update_index(
    index_path: &Path,
    root: &Path,
    kind: IndexKind,
    config: &Config,
) -> Result<(Index, UpdateOutcome)> {
    let loaded = match codec::read_index(index_path) {
        Ok(index) if index.kind() == kind => Some(index),
        Ok(_) => {
            info!(
                "index {} has the wrong kind, rebuilding",
                index_path.display()
            );
            None
        }
        Err(Error::IndexVersionMismatch { found, expected, .. }) => {
            info!(
                "index {} had format version {found} (expected {expected}), rebuilding",
                index_path.display()
            );
            None
        }
        Err(e) => {
            if index_path.exists() {
                warn!("could not load index {}: {e}, rebuilding", index_path.display());
            }
            None
        }
    };

    let Some(mut index) = loaded else {
        let index = full_build(root, kind, config).await?;
        let outcome = UpdateOutcome {
            added: index.files().len(),
            fragments: index.fragment_count(),
            changed: true,
            ..UpdateOutcome::default()
        };
        return Ok((index, outcome));
    };

    let current = indexer::discover(root, config)?;
    let current_keys: BTreeSet<String> = current
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();

    // Files that vanished from disk.
    let stale: Vec<String> = index
        .files()
        .keys()
        .filter(|k| !current_keys.contains(*k))
        .cloned()
        .collect();
    for key in &stale {
        index.files_mut().remove(key);
    }

    // New files and files whose content moved on.
    let mut to_rebuild: Vec<PathBuf> = Vec::new();
    for path in &current {
        let key = path.to_string_lossy().to_string();
        match index.files().get(&key) {
            None => to_rebuild.push(path.clone()),
            Some(record) => match needs_reindexing(record, path) {
                Ok(true) => to_rebuild.push(path.clone()),
                Ok(false) => {}
                Err(e) => {
                    warn!("cannot read {}: {e}; keeping previous record", path.display());
                }
            },
        }
    }

    let mut added = 0;
    let mut modified = 0;
    for path in to_rebuild {
        match indexer::build_file_record(&path, config).await {
            Ok(record) => {
                if index
                    .files_mut()
                    .insert(record.path.clone(), record)
                    .is_some()
                {
                    modified += 1;
                } else {
                    added += 1;
                }
            }
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }

    let mut changed = added > 0 || modified > 0 || !stale.is_empty();

    if let Index::GitRepo {
        latest_commit_hash,
        is_dirty,
        ..
    } = &mut index
    {
        let (commit, dirty) = indexer::git_repo_metadata(root);
        if *latest_commit_hash != commit || *is_dirty != dirty {
            changed = true;
        }
        *latest_commit_hash = commit;
        *is_dirty = dirty;
    }

    let outcome = UpdateOutcome {
        added,
        modified,
        removed: stale.len(),
        fragments: index.fragment_count(),
        changed,
    };
    Ok((index, outcome))
}

async fn full_build(root: &Path, kind: IndexKind, config: &Config) -> Result<Index> {
    match kind {
        IndexKind::Folder => indexer::index_folder(root, config).await,
        IndexKind::GitRepo => indexer::index_git_repo(root, config).await,
    }
}

/// Update one configured target and persist the result when it changed.
pub async fn update_target(
    config: &Config,
    app_dir: &Path,
    target: &Path,
    kind: IndexKind,
) -> Result<UpdateOutcome> {
    let root = std::fs::canonicalize(target)
        .map_err(|_| Error::Config(format!("target does not exist: {}", target.display())))?;

    let index_path = match kind {
        IndexKind::Folder => store::folder_index_path(app_dir, &root),
        IndexKind::GitRepo => store::repo_index_path(app_dir, &root),
    };

    let (index, outcome) = update_index(&index_path, &root, kind, config).await?;
    if outcome.changed {
        codec::write_index(&index, &index_path)?;
    }
    Ok(outcome)
}

/// Run an incremental update over every configured target, printing a
/// per-target summary. Individual target failures are reported and do not
/// stop the run.
pub async fn run_index_all(config: &Config, app_dir: &Path) -> anyhow::Result<()> {
    if config.folders.is_empty() && config.git_repos.is_empty() {
        println!("No folders or git repos configured. Use `codescout add` first.");
        return Ok(());
    }

    for folder in &config.folders {
        report_target(
            folder,
            update_target(config, app_dir, folder, IndexKind::Folder).await,
        );
    }

    for repo in &config.git_repos {
        if !repo.join(".git").exists() {
            eprintln!("error: {} is not a git repository", repo.display());
            continue;
        }
        report_target(
            repo,
            update_target(config, app_dir, repo, IndexKind::GitRepo).await,
        );
    }

    Ok(())
}

fn report_target(target: &Path, result: Result<UpdateOutcome>) {
    match result {
        Ok(outcome) => {
            println!("indexed {}", target.display());
            println!(
                "  added: {}  modified: {}  removed: {}",
                outcome.added, outcome.modified, outcome.removed
            );
            println!("  fragments: {}", outcome.fragments);
            if !outcome.changed {
                println!("  unchanged");
            }
        }
        Err(e) => eprintln!("error indexing {}: {e}", target.display()),
    }
}

/// List the stored indexes with their file and fragment counts.
pub fn run_show_indexes(app_dir: &Path) -> anyhow::Result<()> {
    let indexes = store::load_all_indexes(app_dir);
    if indexes.is_empty() {
        println!("No indexes found under {}.", app_dir.display());
        return Ok(());
    }

    for (path, index) in indexes {
        match &index {
            Index::Folder { path: root, files } => {
                println!("folder {}", root);
                println!("  files: {}  fragments: {}", files.len(), index.fragment_count());
            }
            Index::GitRepo {
                path: root,
                files,
                name,
                latest_commit_hash,
                is_dirty,
            } => {
                println!("repo {name} ({root})");
                println!("  files: {}  fragments: {}", files.len(), index.fragment_count());
                println!("  commit: {latest_commit_hash}  dirty: {is_dirty}");
            }
        }
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  index file: {} (written {modified})", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileRecord;

    fn record_for(path: &Path, hash: &str, last_modified: f64) -> FileRecord {
        FileRecord {
            path: path.to_string_lossy().to_string(),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            hash: hash.to_string(),
            creation_time: last_modified,
            last_modified,
            fragments: Vec::new(),
        }
    }

    #[test]
    fn unchanged_content_needs_no_reindex() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "stable").unwrap();

        let record = record_for(&path, &indexer::sha256_hex(b"stable"), f64::MAX);
        assert!(!needs_reindexing(&record, &path).unwrap());
    }

    #[test]
    fn hash_mismatch_wins_over_equal_mtime() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "edited in place").unwrap();

        let record = record_for(&path, "0000", f64::MAX);
        assert!(needs_reindexing(&record, &path).unwrap());
    }

    #[test]
    fn bumped_mtime_over_identical_bytes_is_not_stale() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "content").unwrap();

        // Stored mtime far in the past: the file looks touched, but the
        // bytes still hash to the stored value.
        let record = record_for(&path, &indexer::sha256_hex(b"content"), 0.0);
        assert!(!needs_reindexing(&record, &path).unwrap());
    }

    #[test]
    fn newer_mtime_with_changed_bytes_is_stale() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "rewritten").unwrap();

        let record = record_for(&path, &indexer::sha256_hex(b"original"), 0.0);
        assert!(needs_reindexing(&record, &path).unwrap());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let record = record_for(Path::new("/nope/a.txt"), "x", 0.0);
        assert!(matches!(
            needs_reindexing(&record, Path::new("/nope/a.txt")),
            Err(Error::Io(_))
        ));
    }
}
