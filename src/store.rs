//! On-disk layout of index files.
//!
//! Folder indexes live at `~/.codescout/folders/<sanitized-path>.flat` and
//! git-repo indexes at `~/.codescout/repos/<basename>.flat`. Sanitization
//! replaces path separators with `_` so a full folder path maps to a flat
//! file name.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::codec;
use crate::models::Index;

pub const INDEX_FILE_EXT: &str = "flat";

/// Directory holding folder indexes.
pub fn folders_dir(app_dir: &Path) -> PathBuf {
    app_dir.join("folders")
}

/// Directory holding git-repo indexes.
pub fn repos_dir(app_dir: &Path) -> PathBuf {
    app_dir.join("repos")
}

/// Replace `/` and `\` with `_` so a path can serve as a file name.
pub fn sanitize_index_name(path: &str) -> String {
    path.replace(['/', '\\'], "_")
}

/// Index file path for a folder target.
pub fn folder_index_path(app_dir: &Path, folder: &Path) -> PathBuf {
    let name = sanitize_index_name(&folder.to_string_lossy());
    folders_dir(app_dir).join(format!("{name}.{INDEX_FILE_EXT}"))
}

/// Index file path for a git-repo target (keyed by basename).
pub fn repo_index_path(app_dir: &Path, repo: &Path) -> PathBuf {
    let name = repo
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| sanitize_index_name(&repo.to_string_lossy()));
    repos_dir(app_dir).join(format!("{name}.{INDEX_FILE_EXT}"))
}

/// Load every readable index under the app directory.
///
/// Unreadable or incompatible files are skipped with a warning — a
/// version-mismatched file has already been deleted by the codec and will be
/// rebuilt on the next update.
pub fn load_all_indexes(app_dir: &Path) -> Vec<(PathBuf, Index)> {
    let mut indexes = Vec::new();
    for dir in [folders_dir(app_dir), repos_dir(app_dir)] {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(INDEX_FILE_EXT) {
                continue;
            }
            match codec::read_index(&path) {
                Ok(index) => indexes.push((path, index)),
                Err(e) => warn!("skipping index {}: {e}", path.display()),
            }
        }
    }
    indexes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Index;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn sanitization_flattens_separators() {
        assert_eq!(sanitize_index_name("/home/dev/notes"), "_home_dev_notes");
        assert_eq!(sanitize_index_name(r"C:\work\src"), "C:_work_src");
    }

    #[test]
    fn folder_and_repo_paths_use_flat_extension() {
        let app = Path::new("/home/dev/.codescout");
        assert_eq!(
            folder_index_path(app, Path::new("/home/dev/notes")),
            Path::new("/home/dev/.codescout/folders/_home_dev_notes.flat")
        );
        assert_eq!(
            repo_index_path(app, Path::new("/home/dev/src/myrepo")),
            Path::new("/home/dev/.codescout/repos/myrepo.flat")
        );
    }

    #[test]
    fn load_all_skips_unreadable_files() {
        let tmp = TempDir::new().unwrap();
        let folders = folders_dir(tmp.path());
        std::fs::create_dir_all(&folders).unwrap();

        // One valid index, one garbage file, one wrong extension.
        let index = Index::Folder {
            path: "/x".to_string(),
            files: BTreeMap::new(),
        };
        codec::write_index(&index, &folders.join("good.flat")).unwrap();
        std::fs::write(folders.join("bad.flat"), b"xx").unwrap();
        std::fs::write(folders.join("ignored.txt"), b"xx").unwrap();

        let loaded = load_all_indexes(tmp.path());
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1, index);
    }
}
