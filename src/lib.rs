//! # devspace
//!
//! Per-user sandboxed workspaces with markdown indexing and an AI
//! coding-assistant chat proxy.
//!
//! Each user gets a directory tree under the workspaces root
//! (`user-<id>/{project,docs,notes,uploads}` plus a seed `README.md`). The
//! HTTP API reads, writes and uploads files beneath that root, runs the
//! assistant with the workspace as its working directory, and searches the
//! workspace's markdown through a pluggable content index.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!  HTTP / CLI ─▶│  Workspace   │──▶ workspaces/user-<id>/…
//!              │   Manager    │
//!              └──┬────────┬──┘
//!                 │        │
//!          ┌──────▼───┐ ┌──▼────────┐
//!          │ Indexer  │ │ Assistant │
//!          │ SQLite / │ │ claude CLI│
//!          │ memory   │ └───────────┘
//!          └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Error taxonomy and HTTP mapping |
//! | [`models`] | Core data types |
//! | [`workspace`] | Workspace lifecycle and sandboxed file access |
//! | [`listing`] | Directory-walk and index-backed file listing |
//! | [`indexer`] | Content index trait and markdown scanner |
//! | [`index_sqlite`] | SQLite index backend |
//! | [`index_memory`] | In-memory index backend |
//! | [`markdown`] | Frontmatter, title and tag extraction |
//! | [`assistant`] | Assistant trait and `claude` CLI runner |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |

pub mod assistant;
pub mod config;
pub mod db;
pub mod error;
pub mod index_memory;
pub mod index_sqlite;
pub mod indexer;
pub mod listing;
pub mod markdown;
pub mod migrate;
pub mod models;
pub mod server;
pub mod workspace;
