//! planboard - ordered, grouped task board with optimistic sync
//!
//! Tasks belong to one status column at a time and keep a dense order
//! inside it. Moves are computed as minimal patch sets, applied locally at
//! once and persisted to a remote row store; a rejected write rolls the
//! whole move back.
//!
//! # Module Organization
//!
//! - `item`: Task model, statuses, drafts, field edits and patches
//! - `store`: In-memory item store with per-item revisions
//! - `group`: Status columns derived from the store
//! - `reorder`: Move planning and dense renumbering
//! - `remote`: Remote store trait and the in-memory implementation
//! - `sync`: Patch persistence and validated fetch
//! - `board`: Optimistic update controller and notices
//! - `session`: Authenticated principal and shell identity resolution
//! - `stats`: Completion rate, overdue count and trend
//! - `calendar`: Weekly agenda by due date
//! - `file_store`: JSON-file remote store used by the CLI
//! - `storage`: Data directory layout and JSON helpers
//! - `lock`: File locking and atomic writes
//! - `config`: Configuration loading from `planboard.toml`
//! - `output`: Shared human/JSON output envelope
//! - `cli`: Command-line interface using clap
//! - `error`: Error types and result aliases

pub mod board;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod error;
pub mod file_store;
pub mod group;
pub mod item;
pub mod lock;
pub mod output;
pub mod remote;
pub mod reorder;
pub mod session;
pub mod stats;
pub mod storage;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
