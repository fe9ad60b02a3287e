//! Full index construction: discovery, filtering, and per-file assembly.
//!
//! The build pipeline walks a root, keeps the paths that pass the
//! include/exclude filters, chunks each file, attaches embeddings, and
//! assembles the resulting [`FileRecord`]s into an [`Index`]. Git-repo
//! indexes additionally record advisory commit metadata obtained by spawning
//! `git` (never by shelling out to an interpolated command string).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::warn;
use walkdir::WalkDir;

use crate::chunker::{self, LineChunk};
use crate::config::Config;
use crate::embedding;
use crate::error::{Error, Result};
use crate::models::{extension_of, EmbeddingTask, FileRecord, Fragment, Index};

/// How many times an over-long fragment is halved before giving up.
const SPLIT_RETRY_DEPTH: u32 = 2;

/// Match a basename against a blacklist pattern holding at most one `*`.
pub fn matches_filename_pattern(name: &str, pattern: &str) -> bool {
    match pattern.find('*') {
        None => name == pattern,
        Some(pos) => {
            let prefix = &pattern[..pos];
            let suffix = &pattern[pos + 1..];
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
    }
}

/// Decide whether a path is indexed.
///
/// Order matters only for short-circuiting: the extension blacklist and the
/// filename blacklist always win; the whitelist applies only when non-empty.
pub fn should_include(path: &Path, config: &Config) -> bool {
    let ext = extension_of(&path.to_string_lossy());

    if config
        .blacklist_extensions
        .iter()
        .any(|e| e.to_lowercase() == ext)
    {
        return false;
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if config
        .blacklist_filenames
        .iter()
        .any(|p| matches_filename_pattern(&name, p))
    {
        return false;
    }

    if !config.whitelist_extensions.is_empty()
        && !config
            .whitelist_extensions
            .iter()
            .any(|e| e.to_lowercase() == ext)
    {
        return false;
    }

    true
}

/// Walk `root` recursively and return the sorted set of indexable files.
pub fn discover(root: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::Config(format!(
            "target does not exist: {}",
            root.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry under {}: {e}", root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if should_include(entry.path(), config) {
            paths.push(entry.path().to_path_buf());
        }
    }

    paths.sort();
    Ok(paths)
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub(crate) fn system_time_secs(t: SystemTime) -> f64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn make_fragment(
    chunk: &LineChunk,
    start_line: u32,
    end_line: u32,
    text: &str,
    model: &str,
    task: EmbeddingTask,
    embedding: Vec<f32>,
) -> Fragment {
    Fragment {
        start_line,
        end_line,
        embedding,
        fragment_type: chunk.fragment_type.to_string(),
        model: model.to_string(),
        chunk_algorithm: chunk.algorithm.to_string(),
        task,
        private: false,
        content_score: chunker::content_score(text),
        hash: sha256_hex(text.as_bytes()),
    }
}

/// Embed one chunk, halving it on input-too-long responses up to
/// [`SPLIT_RETRY_DEPTH`] times. Returns one fragment per surviving piece.
async fn embed_chunk(
    config: &Config,
    chunk: &LineChunk,
    text: &str,
    task: EmbeddingTask,
) -> Result<Vec<Fragment>> {
    let model = &config.embedding_model;
    let mut fragments = Vec::new();
    let mut pending = vec![(
        text.to_string(),
        chunk.start_line,
        chunk.end_line,
        SPLIT_RETRY_DEPTH,
    )];

    while let Some((piece, start, end, depth)) = pending.pop() {
        match embedding::embed(config, &piece, model, task).await {
            Ok(vector) => {
                fragments.push(make_fragment(chunk, start, end, &piece, model, task, vector));
            }
            Err(e) if e.is_input_too_long() && depth > 0 => {
                let parts = chunker::split_fragment(&piece, start, end)?;
                for (part_text, part_start, part_end) in parts.into_iter().rev() {
                    pending.push((part_text, part_start, part_end, depth - 1));
                }
            }
            Err(e) => return Err(e),
        }
    }

    fragments.sort_by_key(|f| f.start_line);
    Ok(fragments)
}

/// Build the [`FileRecord`] for a single file: read, hash, chunk, embed.
///
/// Unreadable files fail with `Io` and produce no partial record. Embedding
/// failures other than input-too-long drop the affected fragment only; the
/// file keeps whatever else embedded successfully.
pub async fn build_file_record(path: &Path, config: &Config) -> Result<FileRecord> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let hash = sha256_hex(&bytes);

    let meta = std::fs::metadata(path)?;
    let last_modified = system_time_secs(meta.modified()?);
    let creation_time = meta
        .created()
        .map(system_time_secs)
        .unwrap_or(last_modified);

    let path_str = path.to_string_lossy().to_string();
    let model = config.embedding_model.clone();
    let tasks = embedding::default_index_tasks(&model);

    let mut fragments = Vec::new();
    for chunk in chunker::chunk_file(&text, &extension_of(&path_str)) {
        let chunk_text = chunker::slice_lines(&text, chunk.start_line, chunk.end_line);
        if chunk_text.trim().is_empty() {
            continue;
        }

        if !config.embedding_enabled() {
            fragments.push(make_fragment(
                &chunk,
                chunk.start_line,
                chunk.end_line,
                &chunk_text,
                &model,
                tasks[0],
                Vec::new(),
            ));
            continue;
        }

        for task in &tasks {
            match embed_chunk(config, &chunk, &chunk_text, *task).await {
                Ok(embedded) => fragments.extend(embedded),
                Err(e) => {
                    warn!(
                        "embedding failed for {}:{}-{}: {e}",
                        path_str, chunk.start_line, chunk.end_line
                    );
                }
            }
        }
    }

    // A file with nothing embeddable is still represented.
    if fragments.is_empty() {
        fragments.push(Fragment {
            start_line: 1,
            end_line: 1,
            embedding: Vec::new(),
            fragment_type: "document".to_string(),
            model: model.clone(),
            chunk_algorithm: "simple".to_string(),
            task: tasks[0],
            private: false,
            content_score: 0,
            hash: sha256_hex(b""),
        });
    }

    Ok(FileRecord {
        path: path_str,
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        hash,
        creation_time,
        last_modified,
        fragments,
    })
}

/// Build the full file map for a root. Per-file failures are logged and the
/// file is skipped; they never abort the whole build.
async fn build_files(root: &Path, config: &Config) -> Result<BTreeMap<String, FileRecord>> {
    let mut files = BTreeMap::new();
    for path in discover(root, config)? {
        match build_file_record(&path, config).await {
            Ok(record) => {
                files.insert(record.path.clone(), record);
            }
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }
    Ok(files)
}

/// Build a folder index from scratch.
pub async fn index_folder(root: &Path, config: &Config) -> Result<Index> {
    let files = build_files(root, config).await?;
    Ok(Index::Folder {
        path: root.to_string_lossy().to_string(),
        files,
    })
}

/// Build a git-repo index from scratch, recording commit metadata.
pub async fn index_git_repo(root: &Path, config: &Config) -> Result<Index> {
    let files = build_files(root, config).await?;
    let (latest_commit_hash, is_dirty) = git_repo_metadata(root);
    Ok(Index::GitRepo {
        path: root.to_string_lossy().to_string(),
        files,
        name: root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        latest_commit_hash,
        is_dirty,
    })
}

/// Advisory repo metadata: HEAD commit hash and dirtiness.
///
/// `git rev-parse HEAD` failure yields `"unknown"`; `git status --porcelain`
/// failure is treated as dirty.
pub fn git_repo_metadata(repo_dir: &Path) -> (String, bool) {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let dirty = match Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(repo_dir)
        .output()
    {
        Ok(out) if out.status.success() => !out.stdout.is_empty(),
        _ => true,
    };

    (commit, dirty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offline_config() -> Config {
        Config {
            api_base_url: String::new(),
            whitelist_extensions: vec![".txt".to_string(), ".md".to_string()],
            blacklist_extensions: vec![".log".to_string()],
            blacklist_filenames: vec!["secret*".to_string(), "exact.txt".to_string()],
            ..Config::default()
        }
    }

    #[test]
    fn filename_patterns_support_single_star() {
        assert!(matches_filename_pattern("package-lock.json", "package-lock.json"));
        assert!(matches_filename_pattern("foo.generated.ts", "*.generated.ts"));
        assert!(matches_filename_pattern(".env.local", ".env*"));
        assert!(matches_filename_pattern("secret_key", "secret*"));
        assert!(!matches_filename_pattern("mysecret", "secret*"));
        assert!(!matches_filename_pattern("ab", "a*ab")); // overlap must not double-count
        assert!(matches_filename_pattern("aXab", "a*ab"));
    }

    #[test]
    fn include_filter_honors_all_three_lists() {
        let config = offline_config();
        assert!(should_include(Path::new("/p/readme.md"), &config));
        assert!(should_include(Path::new("/p/notes.TXT"), &config));
        // Blacklisted extension wins even though not whitelisted anyway.
        assert!(!should_include(Path::new("/p/build.log"), &config));
        // Filename blacklist wins over whitelist.
        assert!(!should_include(Path::new("/p/secret_notes.txt"), &config));
        assert!(!should_include(Path::new("/p/exact.txt"), &config));
        // Not whitelisted.
        assert!(!should_include(Path::new("/p/main.rs"), &config));
        assert!(!should_include(Path::new("/p/Makefile"), &config));
    }

    #[test]
    fn empty_whitelist_admits_everything_not_blacklisted() {
        let mut config = offline_config();
        config.whitelist_extensions.clear();
        assert!(should_include(Path::new("/p/main.rs"), &config));
        assert!(!should_include(Path::new("/p/build.log"), &config));
    }

    #[test]
    fn discover_is_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
        std::fs::write(tmp.path().join("skip.log"), "x").unwrap();
        std::fs::write(tmp.path().join("sub/c.md"), "c").unwrap();

        let paths = discover(tmp.path(), &offline_config()).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| {
                p.strip_prefix(tmp.path())
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub/c.md"]);
    }

    #[test]
    fn discover_missing_root_is_a_config_error() {
        let err = discover(Path::new("/definitely/not/here"), &offline_config()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn file_record_carries_hash_times_and_fragments() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.txt");
        std::fs::write(&path, "alpha\nbeta\ngamma\n").unwrap();

        let record = build_file_record(&path, &offline_config()).await.unwrap();
        assert_eq!(record.filename, "doc.txt");
        assert_eq!(record.hash, sha256_hex(b"alpha\nbeta\ngamma\n"));
        assert!(record.last_modified > 0.0);
        assert_eq!(record.fragments.len(), 1);
        assert_eq!(record.fragments[0].start_line, 1);
        assert_eq!(record.fragments[0].end_line, 3);
        // Offline build leaves vectors empty but still tags the intent.
        assert!(record.fragments[0].embedding.is_empty());
        assert_eq!(record.fragments[0].chunk_algorithm, "simple");
    }

    #[tokio::test]
    async fn empty_file_gets_placeholder_fragment() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        let record = build_file_record(&path, &offline_config()).await.unwrap();
        assert_eq!(record.fragments.len(), 1);
        assert_eq!(record.fragments[0].start_line, 1);
        assert_eq!(record.fragments[0].end_line, 1);
        assert_eq!(record.fragments[0].content_score, 0);
    }

    #[tokio::test]
    async fn folder_index_maps_absolute_paths() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "one\n").unwrap();
        std::fs::write(tmp.path().join("b.md"), "# two\n").unwrap();

        let index = index_folder(tmp.path(), &offline_config()).await.unwrap();
        assert_eq!(index.files().len(), 2);
        assert!(index.files().keys().all(|k| k.starts_with('/')));
        let md = index
            .files()
            .values()
            .find(|f| f.filename == "b.md")
            .unwrap();
        assert_eq!(md.fragments[0].chunk_algorithm, "markdown");
    }

    #[test]
    fn git_metadata_falls_back_outside_a_repo() {
        let tmp = TempDir::new().unwrap();
        let (commit, dirty) = git_repo_metadata(tmp.path());
        assert_eq!(commit, "unknown");
        assert!(dirty);
    }
}
