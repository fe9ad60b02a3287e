//! # codescout
//!
//! **A local code-and-document search engine.**
//!
//! codescout watches configured folders and git repositories, splits every
//! tracked file into line-bounded fragments, attaches dense embedding
//! vectors, and persists each target as a versioned binary index. Queries
//! run lexically (via an external `ripgrep` process), semantically (exact
//! cosine over fragment embeddings), or across all indexes at once, and are
//! served through a CLI, an HTTP/JSON API, and MCP tools.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────────┐
//! │   Targets     │──▶│     Pipeline      │──▶│  .flat indexes  │
//! │ folders/repos │   │ chunk+embed+diff │   │ (~/.codescout)  │
//! └──────────────┘   └──────────────────┘   └───────┬────────┘
//!                                                   │
//!                          ┌────────────┬───────────┤
//!                          ▼            ▼           ▼
//!                     ┌────────┐   ┌────────┐  ┌────────┐
//!                     │  CLI   │   │  HTTP  │  │  MCP   │
//!                     └────────┘   └────────┘  └────────┘
//! ```
//!
//! ## Data flow
//!
//! 1. **Discovery** ([`indexer`]) walks each target and keeps the files that
//!    pass the extension/filename filters.
//! 2. The **chunkers** ([`chunker`]) turn file text into non-overlapping
//!    line ranges; blob-like and overlong lines are isolated.
//! 3. The **embedding client** ([`embedding`]) attaches task-aware vectors
//!    from an OpenAI-compatible endpoint, splitting over-long fragments.
//! 4. The **codec** ([`codec`]) persists the index behind a 4-byte version
//!    header; incompatible files are purged and rebuilt.
//! 5. On later runs the **updater** ([`update`]) diffs content hashes
//!    against the stored records and re-embeds only what changed; the
//!    **watch loop** ([`watch`]) repeats this on an interval.
//! 6. The **query engine** ([`search`]) ranks fragments by cosine
//!    similarity and shells out to `ripgrep` for lexical matches; the
//!    **servers** ([`server`], [`mcp`]) expose both over HTTP and MCP.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Core data types: `Fragment`, `FileRecord`, `Index` |
//! | [`chunker`] | Generic, Markdown, and Nim-aware line chunkers |
//! | [`embedding`] | Task-aware embedding client with bounded concurrency |
//! | [`similarity`] | Cosine similarity over `f32` vectors |
//! | [`codec`] | Version-prefixed binary index serialization |
//! | [`indexer`] | Discovery, filters, and full index builds |
//! | [`update`] | Incremental updates via content-hash diffing |
//! | [`store`] | Index file layout under `~/.codescout` |
//! | [`search`] | Semantic and ripgrep-backed lexical search |
//! | [`watch`] | Periodic re-indexing with error isolation |
//! | [`server`] | Axum HTTP API with bearer auth and CORS |
//! | [`mcp`] | MCP tools over streamable HTTP |
//! | [`config`] | JSON configuration at `~/.codescout/config.json` |
//! | [`error`] | Error taxonomy shared by the core |

pub mod chunker;
pub mod codec;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod mcp;
pub mod models;
pub mod search;
pub mod server;
pub mod similarity;
pub mod store;
pub mod update;
pub mod watch;
