//! # codescout CLI
//!
//! The `codescout` binary manages the index targets and drives indexing,
//! search, and the servers.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codescout add <path>` | Register a folder (or `--repo` a git repo) |
//! | `codescout remove <path>` | Unregister a target |
//! | `codescout list` | Show configured targets |
//! | `codescout show` | Show stored indexes with file/fragment counts |
//! | `codescout index-all` | Incrementally (re)index every target |
//! | `codescout watch` | Re-index on an interval, forever |
//! | `codescout search "<query>"` | Semantic search across all indexes |
//! | `codescout grep <pattern>` | Lexical search via ripgrep |
//! | `codescout serve` | Start the HTTP + MCP server |

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use codescout::{config, search, server, store, update, watch};

/// codescout — local code and document search with fragment embeddings.
#[derive(Parser)]
#[command(
    name = "codescout",
    about = "Local code and document search: fragment indexes with embeddings, ripgrep lexical search, HTTP and MCP servers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a folder or git repository for indexing.
    Add {
        /// Path to the folder or repository.
        path: PathBuf,

        /// Register as a git repository (the path must contain a `.git`).
        #[arg(long)]
        repo: bool,
    },

    /// Unregister a target. Its index file is left on disk.
    Remove {
        /// Path previously passed to `add`.
        path: PathBuf,
    },

    /// List configured folders and repositories.
    List,

    /// Show stored indexes with their file and fragment counts.
    Show,

    /// Incrementally index every configured target.
    ///
    /// Unchanged files keep their fragments and embeddings; only new,
    /// modified, and deleted files are touched. Indexes whose format
    /// version no longer matches are rebuilt from scratch.
    IndexAll,

    /// Run `index-all` on an interval, forever.
    Watch {
        /// Seconds between passes (minimum 1).
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
    },

    /// Semantic search across all stored indexes.
    Search {
        /// Natural-language query.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        max_results: usize,

        /// Embedding model (defaults to the configured one).
        #[arg(long)]
        model: Option<String>,

        /// Restrict results to these file extensions (e.g. `.rs`).
        #[arg(long = "extension")]
        extensions: Vec<String>,
    },

    /// Lexical search via ripgrep across all stored indexes.
    Grep {
        /// Regular expression to search for.
        pattern: String,

        /// Match case exactly.
        #[arg(long)]
        case_sensitive: bool,

        /// Maximum number of matches.
        #[arg(long, default_value_t = 50)]
        max_results: usize,
    },

    /// Start the HTTP + MCP server.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:7979")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let app_dir = config::app_dir();
    let mut cfg = config::load_or_init(&app_dir)?;

    match cli.command {
        Commands::Add { path, repo } => {
            let canonical = std::fs::canonicalize(&path)
                .with_context(|| format!("path does not exist: {}", path.display()))?;
            if repo {
                if !canonical.join(".git").exists() {
                    anyhow::bail!("{} is not a git repository", canonical.display());
                }
                if !cfg.git_repos.contains(&canonical) {
                    cfg.git_repos.push(canonical.clone());
                    config::save(&cfg, &app_dir)?;
                }
                println!("added repo {}", canonical.display());
            } else {
                if !cfg.folders.contains(&canonical) {
                    cfg.folders.push(canonical.clone());
                    config::save(&cfg, &app_dir)?;
                }
                println!("added folder {}", canonical.display());
            }
        }

        Commands::Remove { path } => {
            let canonical = std::fs::canonicalize(&path).unwrap_or(path);
            let before = cfg.folders.len() + cfg.git_repos.len();
            cfg.folders.retain(|p| p != &canonical);
            cfg.git_repos.retain(|p| p != &canonical);
            if cfg.folders.len() + cfg.git_repos.len() == before {
                println!("{} was not configured", canonical.display());
            } else {
                config::save(&cfg, &app_dir)?;
                println!("removed {}", canonical.display());
            }
        }

        Commands::List => {
            if cfg.folders.is_empty() && cfg.git_repos.is_empty() {
                println!("No targets configured.");
            }
            for folder in &cfg.folders {
                println!("folder {}", folder.display());
            }
            for repo in &cfg.git_repos {
                println!("repo   {}", repo.display());
            }
        }

        Commands::Show => {
            update::run_show_indexes(&app_dir)?;
        }

        Commands::IndexAll => {
            update::run_index_all(&cfg, &app_dir).await?;
        }

        Commands::Watch { interval_secs } => {
            watch::watch(&cfg, &app_dir, interval_secs).await?;
        }

        Commands::Search {
            query,
            max_results,
            model,
            extensions,
        } => {
            if store::load_all_indexes(&app_dir).is_empty() {
                println!("No indexes found. Run `codescout index-all` first.");
                return Ok(());
            }
            match search::search_all_indexes(
                &cfg,
                &app_dir,
                &query,
                max_results,
                model.as_deref(),
                &extensions,
            )
            .await
            {
                Ok(hits) if hits.is_empty() => println!("No results."),
                Ok(hits) => {
                    for hit in hits {
                        println!(
                            "{:.4}  {}:{}-{}",
                            hit.similarity,
                            hit.file.path,
                            hit.fragment.start_line,
                            hit.fragment.end_line
                        );
                    }
                }
                Err(e) => eprintln!("search failed: {e}"),
            }
        }

        Commands::Grep {
            pattern,
            case_sensitive,
            max_results,
        } => {
            let hits =
                search::lexical_search_all(&app_dir, &pattern, case_sensitive, max_results).await;
            if hits.is_empty() {
                println!("No results.");
            }
            for hit in hits {
                println!(
                    "{}:{}: {}",
                    hit.file.path, hit.line_number, hit.line_content
                );
            }
        }

        Commands::Serve { bind } => {
            server::run_server(&cfg, &app_dir, &bind).await?;
        }
    }

    Ok(())
}
