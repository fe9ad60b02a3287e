use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application configuration, persisted as JSON at
/// `~/.codescout/config.json`. Missing keys fall back to defaults on load,
/// and a fresh file (including a generated API key) is written on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Informational; not used for compatibility decisions.
    pub version: String,
    /// Folder targets for index-all / watch.
    pub folders: Vec<PathBuf>,
    /// Git-repo targets; each must contain a `.git`.
    pub git_repos: Vec<PathBuf>,
    /// When non-empty, only these extensions are indexed (leading dot).
    pub whitelist_extensions: Vec<String>,
    /// Extensions that are always excluded.
    pub blacklist_extensions: Vec<String>,
    /// Basename patterns with a single `*`, always excluded.
    pub blacklist_filenames: Vec<String>,
    /// Default embedding model for build and query.
    pub embedding_model: String,
    /// OpenAI-compatible embeddings endpoint. Empty disables embedding.
    pub api_base_url: String,
    /// Bearer token for the embedding endpoint and the HTTP/MCP servers.
    pub api_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: env!("CARGO_PKG_VERSION").to_string(),
            folders: Vec::new(),
            git_repos: Vec::new(),
            whitelist_extensions: [
                ".md", ".markdown", ".txt", ".rst", ".nim", ".nims", ".rs", ".go", ".py",
                ".js", ".ts", ".jsx", ".tsx", ".c", ".h", ".cpp", ".hpp", ".java", ".kt",
                ".rb", ".sh", ".toml", ".json", ".yaml", ".yml", ".sql", ".proto",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            blacklist_extensions: [".lock", ".bin", ".map", ".svg", ".png", ".jpg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            blacklist_filenames: [
                "package-lock.json",
                "Cargo.lock",
                "*.generated.ts",
                ".env*",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            embedding_model: "embeddinggemma".to_string(),
            api_base_url: "http://localhost:11434/v1".to_string(),
            api_key: String::new(),
        }
    }
}

impl Config {
    /// Whether the embedding stage is active. An empty endpoint disables it;
    /// fragments are then stored with empty vectors.
    pub fn embedding_enabled(&self) -> bool {
        !self.api_base_url.is_empty()
    }
}

/// Get the user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Application directory, `~/.codescout`.
pub fn app_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codescout")
}

/// Path of the configuration file inside an app directory.
pub fn config_path(app_dir: &Path) -> PathBuf {
    app_dir.join("config.json")
}

/// Load the configuration from `app_dir`, creating a default file (with a
/// generated API key) when none exists. After loading, the
/// `OPENAI_API_BASE_URL` / `OPENAI_BASE_URL` environment variables override
/// the persisted endpoint without being written back.
pub fn load_or_init(app_dir: &Path) -> Result<Config> {
    let path = config_path(app_dir);

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_json::from_str::<Config>(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?
    } else {
        Config::default()
    };

    // Regenerate missing scalars rather than failing.
    let mut dirty = !path.exists();
    if config.api_key.is_empty() {
        config.api_key = uuid::Uuid::new_v4().simple().to_string();
        dirty = true;
    }
    if dirty {
        save(&config, app_dir)?;
    }

    if let Some(base) = std::env::var("OPENAI_API_BASE_URL")
        .ok()
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
    {
        config.api_base_url = base;
    }

    Ok(config)
}

/// Persist the configuration as pretty-printed JSON.
pub fn save(config: &Config, app_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(app_dir)
        .with_context(|| format!("failed to create app directory: {}", app_dir.display()))?;
    let path = config_path(app_dir);
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_load_creates_file_with_api_key() {
        let tmp = TempDir::new().unwrap();
        let config = load_or_init(tmp.path()).unwrap();

        assert!(!config.api_key.is_empty());
        assert!(config_path(tmp.path()).exists());

        // Second load returns the same key.
        let again = load_or_init(tmp.path()).unwrap();
        assert_eq!(config.api_key, again.api_key);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            config_path(tmp.path()),
            r#"{ "folders": ["/tmp/notes"], "apiKey": "k" }"#,
        )
        .unwrap();

        let config = load_or_init(tmp.path()).unwrap();
        assert_eq!(config.folders, vec![PathBuf::from("/tmp/notes")]);
        assert_eq!(config.api_key, "k");
        assert_eq!(config.embedding_model, "embeddinggemma");
        assert!(!config.whitelist_extensions.is_empty());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json.get("whitelistExtensions").is_some());
        assert!(json.get("gitRepos").is_some());
        assert!(json.get("apiBaseUrl").is_some());
        assert!(json.get("blacklistFilenames").is_some());
    }

    #[test]
    fn disabled_embedding_when_endpoint_empty() {
        let mut config = Config::default();
        config.api_base_url = String::new();
        assert!(!config.embedding_enabled());
    }
}
