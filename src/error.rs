//! Error taxonomy for the indexing and retrieval core.
//!
//! Library code returns [`Error`]; the CLI and server layers wrap it in
//! `anyhow` where extra context helps. The variants map one-to-one onto the
//! recovery strategies of the callers:
//!
//! | Variant | Recovery |
//! |---------|----------|
//! | `Config` | regenerate defaults for missing scalars, propagate missing paths |
//! | `Io` | abort the current file, continue with the next |
//! | `CorruptIndex` | rebuild that single index from scratch |
//! | `IndexVersionMismatch` | file already deleted; treat as "no index exists" |
//! | `EmbeddingBackend` | split-and-retry when input was too long, else skip the fragment |
//! | `InvalidArgument` | programmer error, surfaced to the caller |
//! | `Subprocess` | `rg` → empty results, `git` → `"unknown"` / dirty |

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt index file: {0}")]
    CorruptIndex(PathBuf),

    #[error("index {filepath} has format version {found}, expected {expected}")]
    IndexVersionMismatch {
        filepath: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("embedding backend: {0}")]
    EmbeddingBackend(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("subprocess failed: {0}")]
    Subprocess(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether an embedding failure was caused by an over-long input.
    ///
    /// Providers phrase this differently (OpenAI: "maximum context length",
    /// Ollama: "input length exceeds", llama.cpp: "too long"), so the check
    /// is a substring match over the provider message.
    pub fn is_input_too_long(&self) -> bool {
        match self {
            Error::EmbeddingBackend(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("too long")
                    || msg.contains("too large")
                    || msg.contains("maximum context")
                    || msg.contains("context length")
                    || msg.contains("exceeds")
            }
            _ => false,
        }
    }
}
