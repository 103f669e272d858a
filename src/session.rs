//! The graph database session: opens a work directory, replays its WAL, and hands out
//! transactions against the resulting in-memory graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::constants::{DEFAULT_AUTO_COMPACT_THRESHOLD, LF_INDEXER_DEFAULT_RATE, WAL_DEFAULT_TRUNCATE_SIZE};
use crate::error::{GraphError, Result};
use crate::graph::mutable_graph::MutableGraph;
use crate::graph::schema::Schema;
use crate::txn::{BulkInsertTransaction, CompactTransaction, ReadTransaction, SingleEdgeInsertTransaction, SingleVertexInsertTransaction, UpdateTransaction};
use crate::types::LabelId;
use crate::util::arena::Arena;
use crate::util::lock::{FileLock, LockType};
use crate::version::VersionManager;
use crate::wal::parser::{parse_wal_dir, replay};
use crate::wal::writer::{LocalFileTransport, WalTransport, WalWriter};

/// Builder for session-open configuration. Every setting has a default so `OpenOptions::default()`
/// is always a valid, if unopinionated, starting point.
#[derive(Clone)]
pub struct OpenOptions {
  read_only: bool,
  create_if_missing: bool,
  thread_num: usize,
  lf_indexer_rate: f64,
  wal_truncate_size: u64,
  auto_compact_threshold: Option<f64>,
}

impl Default for OpenOptions {
  fn default() -> Self {
    OpenOptions {
      read_only: false,
      create_if_missing: true,
      thread_num: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
      lf_indexer_rate: LF_INDEXER_DEFAULT_RATE,
      wal_truncate_size: WAL_DEFAULT_TRUNCATE_SIZE,
      auto_compact_threshold: None,
    }
  }
}

impl OpenOptions {
  pub fn read_only(mut self, value: bool) -> Self {
    self.read_only = value;
    self
  }

  pub fn create_if_missing(mut self, value: bool) -> Self {
    self.create_if_missing = value;
    self
  }

  pub fn thread_num(mut self, value: usize) -> Self {
    self.thread_num = value.max(1);
    self
  }

  pub fn lf_indexer_rate(mut self, value: f64) -> Self {
    self.lf_indexer_rate = value;
    self
  }

  pub fn wal_truncate_size(mut self, value: u64) -> Self {
    self.wal_truncate_size = value;
    self
  }

  /// Enables degree-triggered auto-compaction: once the ratio of dead-to-live adjacency entries
  /// exceeds `threshold`, the next transaction to observe it schedules a compaction. Off by
  /// default, matching the original engine's manual-only compaction.
  pub fn auto_compact_threshold(mut self, threshold: f64) -> Self {
    self.auto_compact_threshold = Some(threshold);
    self
  }

  /// Enables auto-compaction at the default ratio (§4.P).
  pub fn enable_auto_compact(self) -> Self {
    self.auto_compact_threshold(DEFAULT_AUTO_COMPACT_THRESHOLD)
  }
}

/// The mutable graph, its schema, and the version manager coordinating access to it. Shared
/// (behind an `Arc`) by every transaction a session hands out.
pub struct Engine {
  pub(crate) schema: Arc<Schema>,
  pub(crate) graph: MutableGraph,
  pub(crate) version: VersionManager,
}

/// One open graph database: the shared `Engine`, one WAL writer per worker thread slot, and one
/// bump arena per worker thread slot for transactions that need scratch space during staging.
pub struct GraphDb {
  engine: Arc<Engine>,
  work_dir: PathBuf,
  wal_writers: Vec<Arc<WalWriter>>,
  arenas: Vec<Arc<Arena>>,
  read_only: bool,
  auto_compact_threshold: Option<f64>,
  _lock: FileLock,
}

impl GraphDb {
  /// Opens `work_dir`, replaying any WAL files already present, and seeds the version manager so
  /// newly issued timestamps continue past the last durably committed one.
  pub fn open(work_dir: impl AsRef<Path>, schema: Schema, options: OpenOptions) -> Result<Self> {
    let work_dir = work_dir.as_ref().to_path_buf();
    if options.create_if_missing {
      std::fs::create_dir_all(&work_dir)?;
    }
    let lock_kind = if options.read_only { LockType::Shared } else { LockType::Exclusive };
    let lock = FileLock::acquire(&work_dir, lock_kind)?;

    let schema = Arc::new(schema);
    let graph = MutableGraph::with_lf_indexer_rate(Arc::clone(&schema), options.lf_indexer_rate);

    let parsed = match parse_wal_dir(&work_dir) {
      Ok(parsed) => parsed,
      Err(err) => {
        warn!(?err, path = %work_dir.display(), "failed to parse WAL directory, starting from an empty graph");
        crate::wal::parser::ParsedWal { insert_ops: Default::default(), update_ops: Vec::new(), last_ts: 0 }
      }
    };
    let replayed_last_ts = replay(&graph, &parsed)?;

    let version = VersionManager::new(options.thread_num);
    version.seed(replayed_last_ts, replayed_last_ts + 1);

    let wal_version = replayed_last_ts as u64 + 1;
    let mut wal_writers = Vec::with_capacity(options.thread_num);
    let mut arenas = Vec::with_capacity(options.thread_num);
    if !options.read_only {
      for thread_id in 0..options.thread_num {
        let transport: Box<dyn WalTransport> = Box::new(LocalFileTransport::create(&work_dir, thread_id, wal_version, options.wal_truncate_size)?);
        wal_writers.push(Arc::new(WalWriter::new(transport)));
      }
    }
    for _ in 0..options.thread_num.max(1) {
      arenas.push(Arc::new(Arena::new()));
    }

    info!(
      path = %work_dir.display(),
      replayed_records = parsed.insert_ops.len() + parsed.update_ops.len(),
      read_ts = version.read_ts(),
      "graph database session opened"
    );

    Ok(GraphDb {
      engine: Arc::new(Engine { schema, graph, version }),
      work_dir,
      wal_writers,
      arenas,
      read_only: options.read_only,
      auto_compact_threshold: options.auto_compact_threshold,
      _lock: lock,
    })
  }

  pub fn schema(&self) -> &Schema {
    &self.engine.schema
  }

  pub fn work_dir(&self) -> &Path {
    &self.work_dir
  }

  fn wal_writer(&self, thread_id: usize) -> Result<Arc<WalWriter>> {
    if self.read_only || self.wal_writers.is_empty() {
      return Err(GraphError::ReadOnly);
    }
    Ok(Arc::clone(&self.wal_writers[thread_id % self.wal_writers.len()]))
  }

  fn arena(&self, thread_id: usize) -> Arc<Arena> {
    Arc::clone(&self.arenas[thread_id % self.arenas.len()])
  }

  pub fn get_read_transaction(&self) -> ReadTransaction {
    ReadTransaction::new(Arc::clone(&self.engine))
  }

  pub fn get_single_vertex_insert_transaction(&self, thread_id: usize, label: LabelId) -> SingleVertexInsertTransaction {
    let wal = self.wal_writer(thread_id).expect("write transaction requested on a read-only session");
    SingleVertexInsertTransaction::new(Arc::clone(&self.engine), wal, label)
  }

  pub fn get_single_edge_insert_transaction(&self, thread_id: usize) -> SingleEdgeInsertTransaction {
    let wal = self.wal_writer(thread_id).expect("write transaction requested on a read-only session");
    SingleEdgeInsertTransaction::new(Arc::clone(&self.engine), wal)
  }

  pub fn get_bulk_insert_transaction(&self, thread_id: usize) -> BulkInsertTransaction {
    let wal = self.wal_writer(thread_id).expect("write transaction requested on a read-only session");
    BulkInsertTransaction::new(Arc::clone(&self.engine), wal, self.arena(thread_id))
  }

  pub fn get_update_transaction(&self, thread_id: usize) -> UpdateTransaction {
    let wal = self.wal_writer(thread_id).expect("write transaction requested on a read-only session");
    UpdateTransaction::new(Arc::clone(&self.engine), wal)
  }

  pub fn get_compact_transaction(&self) -> CompactTransaction {
    CompactTransaction::new(Arc::clone(&self.engine))
  }

  /// Ratio of dead-to-live adjacency entries past which `OpenOptions::auto_compact_threshold`
  /// asks the caller to schedule a compaction. Evaluating the actual ratio and triggering the
  /// compaction transaction is left to the caller (typically a background thread watching this
  /// session), matching the programmatic-only configuration surface described in §6.
  pub fn auto_compact_threshold(&self) -> Option<f64> {
    self.auto_compact_threshold
  }
}
