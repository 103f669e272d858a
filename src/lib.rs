//! propgraph — a transactional, in-memory property graph storage engine.
//!
//! # Architecture
//!
//! - **Storage**: per-label property tables plus a compressed-sparse-row adjacency pair
//!   (`DualCsr`) per declared `(src_label, etype, dst_label)` triplet.
//! - **Versioning**: a monotonic-timestamp `VersionManager` coordinates read, insert, and update
//!   transaction phases without a cooperative runtime.
//! - **Durability**: a per-writer-thread write-ahead log, replayed on `GraphDb::open`.
//!
//! The six transaction flavors (read, single-vertex insert, single-edge insert, bulk insert,
//! update, compact) are the engine's entire public write surface; see [`txn`] and [`session`].

#![deny(clippy::all)]
#![allow(dead_code)]

pub mod constants;
pub mod error;
pub mod graph;
pub mod session;
pub mod storage;
pub mod txn;
pub mod types;
pub mod util;
pub mod version;
pub mod wal;

pub use error::{GraphError, Result};
pub use graph::{Schema, SchemaBuilder};
pub use session::{Engine, GraphDb, OpenOptions};
pub use txn::{BulkInsertTransaction, CompactTransaction, ReadTransaction, SingleEdgeInsertTransaction, SingleVertexInsertTransaction, UpdateTransaction};
pub use types::{EdgeStrategy, Oid, PkType, PropValue, PropValueTag, Triplet};
