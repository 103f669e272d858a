//! Magic numbers and layout constants shared by the snapshot writer/reader, the WAL, and the
//! version manager.

use crate::types::{LabelId, TxId, Vid};

// ============================================================================
// Magic bytes (little-endian u32)
// ============================================================================

/// Snapshot magic: "PGS1"
pub const MAGIC_SNAPSHOT: u32 = 0x31534750;

pub const VERSION_SNAPSHOT: u32 = 1;
pub const MIN_READER_SNAPSHOT: u32 = 1;

// ============================================================================
// Alignment requirements
// ============================================================================

/// 64-byte alignment for mmap friendliness
pub const SECTION_ALIGNMENT: usize = 64;
/// 8-byte alignment for WAL records
pub const WAL_RECORD_ALIGNMENT: usize = 8;

// ============================================================================
// Arena allocator
// ============================================================================

/// Bump-allocator chunk size, per §4.B.
pub const ARENA_CHUNK_SIZE: usize = 4096;

// ============================================================================
// CSR adjacency growth
// ============================================================================

/// `capacity = degree + ceil(degree / DEGREE_SLACK_DIVISOR)` at batch init, per §4.F.
pub const DEGREE_SLACK_DIVISOR: u32 = 5;

// ============================================================================
// Lock-free indexer
// ============================================================================

/// Default max load factor for the lock-free serving indexer, per §4.E.
pub const LF_INDEXER_DEFAULT_RATE: f64 = 0.8;
/// Max load factor for the single-threaded building (Robin Hood) indexer before rehash.
pub const BUILD_INDEXER_MAX_LOAD: f64 = 0.5;

// ============================================================================
// Version manager
// ============================================================================

/// Size of the version manager's out-of-order completion ring-bitset (`1 << 20`), per §4.I.
pub const VERSION_RING_BITS: u32 = 20;
pub const VERSION_RING_SIZE: u32 = 1 << VERSION_RING_BITS;
pub const VERSION_RING_MASK: u32 = VERSION_RING_SIZE - 1;
/// Backoff when a read/insert acquisition observes a draining update.
pub const VERSION_SPIN_BACKOFF_MICROS: u64 = 100;

// ============================================================================
// WAL
// ============================================================================

/// Per-writer-thread WAL file truncation grain (1 GiB), overridable via `OpenOptions`.
pub const WAL_DEFAULT_TRUNCATE_SIZE: u64 = 1 << 30;
/// Sparse index size for `insert_wals[ts]` during WAL parsing (`1 << 27`), per §4.J.
pub const WAL_PARSE_SPARSE_INDEX_SIZE: usize = 1 << 27;
/// Below this span of timestamps, the parser uses a `HashMap` instead of the sparse vector
/// (§10.2 enrichment — avoids a 128M-entry allocation for small graphs and tests).
pub const WAL_PARSE_DENSE_INDEX_THRESHOLD: u32 = 1 << 16;

// ============================================================================
// Compaction
// ============================================================================

/// Default ratio of dead-to-live adjacency entries that triggers auto-compaction when
/// `OpenOptions::auto_compact_threshold` is enabled.
pub const DEFAULT_AUTO_COMPACT_THRESHOLD: f64 = 0.5;

// ============================================================================
// Initial ids (0 is reserved as "unassigned"/null)
// ============================================================================

pub const INITIAL_VID: Vid = 0;
pub const INITIAL_LABEL_ID: LabelId = 1;
pub const INITIAL_ETYPE_ID: LabelId = 1;
pub const INITIAL_PROPKEY_ID: LabelId = 1;
pub const INITIAL_TX_ID: TxId = 1;

/// Snapshot generation starts at 1; 0 means "no snapshot yet".
pub const INITIAL_SNAPSHOT_GEN: u64 = 0;
