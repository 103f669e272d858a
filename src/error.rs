//! Crate-wide error type.
//!
//! Every fallible public operation returns `Result<T>` aliased to this error. Variants map
//! onto the taxonomy described in the design docs: staging failures the caller can react to,
//! and conditions the engine treats as unrecoverable for the current session (returned as
//! `Err`, not a process abort — see the module docs on `GraphError::WalIo`).

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("primary key already exists for label {label}")]
  SchemaMismatch { label: String },

  #[error("vertex {oid} not found for label {label}")]
  NotFound { label: String, oid: String },

  #[error("a transaction is already in progress on this session")]
  TransactionInProgress,

  #[error("session is open read-only")]
  ReadOnly,

  #[error("no active transaction")]
  NoTransaction,

  #[error("invalid timestamp: {0}")]
  InvalidTimestamp(u64),

  #[error("corrupt on-disk state at {path}: {reason}")]
  Corrupt { path: PathBuf, reason: String },

  #[error("WAL I/O failure: {0}")]
  WalIo(#[from] std::io::Error),

  #[error("duplicate primary key {oid} during bulk load of label {label}")]
  BulkLoadViolation { label: String, oid: String },

  #[error("arena exhausted after {requested} bytes")]
  ArenaExhausted { requested: usize },

  #[error("could not resolve edge endpoint ({label}, {oid}) against the locally visible graph")]
  Conflict { label: String, oid: String },

  #[error("internal invariant violated: {0}")]
  Internal(String),
}

impl GraphError {
  pub fn internal(msg: impl Into<String>) -> Self {
    GraphError::Internal(msg.into())
  }
}
