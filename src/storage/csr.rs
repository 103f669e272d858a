//! Compressed-sparse-row adjacency, one instance per (triplet, direction).
//!
//! `data` on an edge is always a pre-encoded `u64`: either a fixed-width payload reinterpreted
//! as bits, or a row index into the shared string column `DualCsr` owns for variable-width
//! payloads. The CSR itself never interprets `data` beyond storing and returning it.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::constants::DEGREE_SLACK_DIVISOR;
use crate::types::{Timestamp, Vid, TS_MAX, VID_SENTINEL};

/// A single (neighbor, timestamp, data) tuple as handed back to iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeView {
  pub neighbor: Vid,
  pub ts: Timestamp,
  pub data: u64,
}

/// Shared behavior of the three adjacency strategies.
pub trait CsrLike: Send + Sync {
  /// Pre-size storage from a per-vid degree estimate (index = src vid).
  fn batch_init(degrees: &[u32]) -> Self
  where
    Self: Sized;

  /// Timestamped write, used by all transaction kinds.
  fn put_edge(&self, src: Vid, dst: Vid, data: u64, ts: Timestamp);

  /// Same as `put_edge` but `data` is already a row index into a shared string column — kept as
  /// a distinct entry point because `DualCsr::put_edge` needs to route to it without re-deciding
  /// the payload kind per call.
  fn put_edge_with_index(&self, src: Vid, dst: Vid, row_id: u64, ts: Timestamp) {
    self.put_edge(src, dst, row_id, ts)
  }

  /// Untimestamped write used only by the bulk loader, which assigns timestamps by replaying
  /// the WAL afterward rather than per edge.
  fn batch_put_edge(&self, src: Vid, dst: Vid, data: u64);

  /// Overwrite an existing live `src -> dst` edge's `data`/`ts` in place, without appending a
  /// new entry. Used only by the update transaction, which already holds exclusive access (the
  /// version manager has drained every other reader and writer before an update transaction can
  /// run), so there is no concurrent reader to keep a consistent view of during the mutation.
  /// Returns `false` if no live edge `src -> dst` exists to update.
  fn update_edge(&self, src: Vid, dst: Vid, data: u64, ts: Timestamp) -> bool;

  /// Every edge out of `src` visible at `read_ts` (`ts <= read_ts`), most-recent writes first
  /// within a chunk are not guaranteed — callers needing Single-strategy "latest wins" semantics
  /// get that for free since Single holds only one slot.
  fn edges(&self, src: Vid, read_ts: Timestamp) -> Vec<EdgeView>;

  fn degree(&self, src: Vid, read_ts: Timestamp) -> usize {
    self.edges(src, read_ts).len()
  }

  /// Extend per-vid storage so index `min_len - 1` is addressable. Called when a new vertex is
  /// added to a label that participates in this triplet direction, after batch-init sized the
  /// backing arrays to the load-time vertex count.
  fn grow_to(&mut self, min_len: usize);

  /// Right-size every per-vid chunk's capacity to its live size, per the compact transaction's
  /// contract. A no-op for strategies with nothing to shrink.
  fn compact(&mut self) {}
}

/// A triplet direction with strategy `None`: every operation is a no-op.
pub struct EmptyCsr;

impl CsrLike for EmptyCsr {
  fn batch_init(_degrees: &[u32]) -> Self {
    EmptyCsr
  }

  fn put_edge(&self, _src: Vid, _dst: Vid, _data: u64, _ts: Timestamp) {}

  fn batch_put_edge(&self, _src: Vid, _dst: Vid, _data: u64) {}

  fn update_edge(&self, _src: Vid, _dst: Vid, _data: u64, _ts: Timestamp) -> bool {
    false
  }

  fn edges(&self, _src: Vid, _read_ts: Timestamp) -> Vec<EdgeView> {
    Vec::new()
  }

  fn grow_to(&mut self, _min_len: usize) {}
}

struct SingleSlot {
  neighbor: std::sync::atomic::AtomicU32,
  data: std::sync::atomic::AtomicU64,
  ts: std::sync::atomic::AtomicU32,
}

impl SingleSlot {
  fn empty() -> Self {
    SingleSlot {
      neighbor: std::sync::atomic::AtomicU32::new(VID_SENTINEL),
      data: std::sync::atomic::AtomicU64::new(0),
      ts: std::sync::atomic::AtomicU32::new(TS_MAX),
    }
  }
}

/// A triplet direction with strategy `Single`: at most one live edge per source vid. A new
/// write simply overwrites the slot; there is no history beyond the single current value.
pub struct SingleCsr {
  slots: Vec<SingleSlot>,
}

impl CsrLike for SingleCsr {
  fn batch_init(degrees: &[u32]) -> Self {
    SingleCsr {
      slots: (0..degrees.len()).map(|_| SingleSlot::empty()).collect(),
    }
  }

  fn put_edge(&self, src: Vid, dst: Vid, data: u64, ts: Timestamp) {
    let slot = &self.slots[src as usize];
    slot.neighbor.store(dst, std::sync::atomic::Ordering::Relaxed);
    slot.data.store(data, std::sync::atomic::Ordering::Relaxed);
    slot.ts.store(ts, std::sync::atomic::Ordering::Release);
  }

  fn batch_put_edge(&self, src: Vid, dst: Vid, data: u64) {
    self.put_edge(src, dst, data, 0);
  }

  fn update_edge(&self, src: Vid, dst: Vid, data: u64, ts: Timestamp) -> bool {
    let Some(slot) = self.slots.get(src as usize) else {
      return false;
    };
    let live = slot.ts.load(std::sync::atomic::Ordering::Acquire) != TS_MAX;
    if !live || slot.neighbor.load(std::sync::atomic::Ordering::Relaxed) != dst {
      return false;
    }
    slot.data.store(data, std::sync::atomic::Ordering::Relaxed);
    slot.ts.store(ts, std::sync::atomic::Ordering::Release);
    true
  }

  fn edges(&self, src: Vid, read_ts: Timestamp) -> Vec<EdgeView> {
    let Some(slot) = self.slots.get(src as usize) else {
      return Vec::new();
    };
    let ts = slot.ts.load(std::sync::atomic::Ordering::Acquire);
    if ts == TS_MAX || ts > read_ts {
      return Vec::new();
    }
    vec![EdgeView {
      neighbor: slot.neighbor.load(std::sync::atomic::Ordering::Relaxed),
      ts,
      data: slot.data.load(std::sync::atomic::Ordering::Relaxed),
    }]
  }

  fn grow_to(&mut self, min_len: usize) {
    while self.slots.len() < min_len {
      self.slots.push(SingleSlot::empty());
    }
  }
}

struct Entry {
  neighbor: std::sync::atomic::AtomicU32,
  data: std::sync::atomic::AtomicU64,
  ts: std::sync::atomic::AtomicU32,
}

impl Entry {
  fn empty() -> Self {
    Entry {
      neighbor: std::sync::atomic::AtomicU32::new(VID_SENTINEL),
      data: std::sync::atomic::AtomicU64::new(0),
      ts: std::sync::atomic::AtomicU32::new(TS_MAX),
    }
  }
}

/// A growable arena of entries for one source vid. `next_free` is the high-water mark of
/// claimed (written-or-being-written) slots; entries at or past it are untouched and read as
/// `TS_MAX`. Growing replaces the whole chunk behind an `Arc`, so a reader holding a clone from
/// before a grow keeps reading its own (now-detached) copy safely — this plays the role the
/// original engine's arena-backed raw pointer swap plays, at the cost of one extra refcount
/// bump per read instead of a raw CAS.
struct Chunk {
  entries: Vec<Entry>,
  next_free: std::sync::atomic::AtomicU32,
}

impl Chunk {
  fn with_capacity(capacity: usize) -> Self {
    Chunk {
      entries: (0..capacity).map(|_| Entry::empty()).collect(),
      next_free: std::sync::atomic::AtomicU32::new(0),
    }
  }

  fn capacity(&self) -> usize {
    self.entries.len()
  }

  /// Grow by `capacity/2 + 1` entries, copying live slots into the new backing array.
  fn grown(&self) -> Self {
    let old_cap = self.capacity();
    let extra = old_cap / DEGREE_SLACK_DIVISOR as usize + 1;
    let grown = Chunk::with_capacity(old_cap + extra);
    let live = self.next_free.load(std::sync::atomic::Ordering::Acquire) as usize;
    for i in 0..live.min(old_cap) {
      let src = &self.entries[i];
      let dst = &grown.entries[i];
      dst.neighbor.store(
        src.neighbor.load(std::sync::atomic::Ordering::Relaxed),
        std::sync::atomic::Ordering::Relaxed,
      );
      dst.data.store(
        src.data.load(std::sync::atomic::Ordering::Relaxed),
        std::sync::atomic::Ordering::Relaxed,
      );
      dst.ts.store(
        src.ts.load(std::sync::atomic::Ordering::Acquire),
        std::sync::atomic::Ordering::Release,
      );
    }
    grown.next_free.store(live as u32, std::sync::atomic::Ordering::Release);
    grown
  }

  /// Right-size this chunk to `live + ceil(live / 5)`, dropping whatever slack the growth
  /// policy left behind. Used by compaction, which runs with exclusive access.
  fn compacted(&self) -> Self {
    let live = self.next_free.load(std::sync::atomic::Ordering::Acquire) as usize;
    let slack = live / DEGREE_SLACK_DIVISOR as usize + 1;
    let compacted = Chunk::with_capacity((live + slack).max(1));
    for i in 0..live.min(self.capacity()) {
      let src = &self.entries[i];
      let dst = &compacted.entries[i];
      dst.neighbor.store(
        src.neighbor.load(std::sync::atomic::Ordering::Relaxed),
        std::sync::atomic::Ordering::Relaxed,
      );
      dst.data.store(
        src.data.load(std::sync::atomic::Ordering::Relaxed),
        std::sync::atomic::Ordering::Relaxed,
      );
      dst.ts.store(
        src.ts.load(std::sync::atomic::Ordering::Acquire),
        std::sync::atomic::Ordering::Release,
      );
    }
    compacted.next_free.store(live as u32, std::sync::atomic::Ordering::Release);
    compacted
  }
}

struct PerVidAdjacency {
  chunk: RwLock<Arc<Chunk>>,
  /// Serializes writers for this vid; readers never take it. Plays the role of the original
  /// engine's per-source spin-lock — `parking_lot::Mutex` spins briefly before parking, so the
  /// uncontended fast path is a spin-lock in practice.
  writer_lock: Mutex<()>,
}

impl PerVidAdjacency {
  fn with_capacity(capacity: usize) -> Self {
    PerVidAdjacency {
      chunk: RwLock::new(Arc::new(Chunk::with_capacity(capacity.max(1)))),
      writer_lock: Mutex::new(()),
    }
  }

  fn append(&self, dst: Vid, data: u64, ts: Timestamp) {
    let _guard = self.writer_lock.lock();
    let mut chunk = self.chunk.read().clone();
    if chunk.next_free.load(std::sync::atomic::Ordering::Relaxed) as usize >= chunk.capacity() {
      let grown = Arc::new(chunk.grown());
      *self.chunk.write() = grown.clone();
      chunk = grown;
    }
    let idx = chunk.next_free.fetch_add(1, std::sync::atomic::Ordering::Relaxed) as usize;
    let entry = &chunk.entries[idx];
    entry.neighbor.store(dst, std::sync::atomic::Ordering::Relaxed);
    entry.data.store(data, std::sync::atomic::Ordering::Relaxed);
    entry.ts.store(ts, std::sync::atomic::Ordering::Release);
  }

  /// Overwrite the most-recently-appended live entry whose neighbor is `dst`, in place. Exclusive
  /// access only (the caller is an update transaction, which has already drained every other
  /// reader and writer), so this can mutate `data`/`ts` without the append path's grow-then-swap
  /// dance.
  fn update_matching(&self, dst: Vid, data: u64, ts: Timestamp) -> bool {
    let _guard = self.writer_lock.lock();
    let chunk = self.chunk.read().clone();
    let live = chunk.next_free.load(std::sync::atomic::Ordering::Acquire) as usize;
    let mut target = None;
    for i in 0..live.min(chunk.capacity()) {
      let entry = &chunk.entries[i];
      if entry.ts.load(std::sync::atomic::Ordering::Acquire) == TS_MAX {
        continue;
      }
      if entry.neighbor.load(std::sync::atomic::Ordering::Relaxed) == dst {
        target = Some(i);
      }
    }
    let Some(i) = target else {
      return false;
    };
    let entry = &chunk.entries[i];
    entry.data.store(data, std::sync::atomic::Ordering::Relaxed);
    entry.ts.store(ts, std::sync::atomic::Ordering::Release);
    true
  }

  /// Truncate this vid's chunk to `size + ceil(size/5)` capacity. Exclusive access only
  /// (compaction holds the update timestamp), so this bypasses the writer lock and mutates the
  /// `Arc<Chunk>` in place via `&mut self`.
  fn compact(&mut self) {
    let compacted = self.chunk.get_mut().compacted();
    *self.chunk.get_mut() = Arc::new(compacted);
  }

  fn snapshot_edges(&self, read_ts: Timestamp) -> Vec<EdgeView> {
    let chunk = self.chunk.read().clone();
    let live = chunk.next_free.load(std::sync::atomic::Ordering::Acquire) as usize;
    let mut out = Vec::new();
    for entry in chunk.entries.iter().take(live.min(chunk.capacity())) {
      let ts = entry.ts.load(std::sync::atomic::Ordering::Acquire);
      if ts == TS_MAX || ts > read_ts {
        continue;
      }
      out.push(EdgeView {
        neighbor: entry.neighbor.load(std::sync::atomic::Ordering::Relaxed),
        ts,
        data: entry.data.load(std::sync::atomic::Ordering::Relaxed),
      });
    }
    out
  }
}

/// A triplet direction with strategy `Multiple`: a chunked, growable adjacency list per source
/// vid.
pub struct MultiCsr {
  adjacency: Vec<PerVidAdjacency>,
}

impl CsrLike for MultiCsr {
  /// `degrees[vid]` seeds `capacity = degree + ceil(degree / 5)` per vid, so ordinary-fanout
  /// growth never needs an arena resize during normal loading.
  fn batch_init(degrees: &[u32]) -> Self {
    MultiCsr {
      adjacency: degrees
        .iter()
        .map(|&d| {
          let slack = (d as usize + DEGREE_SLACK_DIVISOR as usize - 1) / DEGREE_SLACK_DIVISOR as usize;
          PerVidAdjacency::with_capacity(d as usize + slack)
        })
        .collect(),
    }
  }

  fn put_edge(&self, src: Vid, dst: Vid, data: u64, ts: Timestamp) {
    self.adjacency[src as usize].append(dst, data, ts);
  }

  fn batch_put_edge(&self, src: Vid, dst: Vid, data: u64) {
    self.adjacency[src as usize].append(dst, data, 0);
  }

  fn update_edge(&self, src: Vid, dst: Vid, data: u64, ts: Timestamp) -> bool {
    match self.adjacency.get(src as usize) {
      Some(adj) => adj.update_matching(dst, data, ts),
      None => false,
    }
  }

  fn edges(&self, src: Vid, read_ts: Timestamp) -> Vec<EdgeView> {
    match self.adjacency.get(src as usize) {
      Some(adj) => adj.snapshot_edges(read_ts),
      None => Vec::new(),
    }
  }

  fn degree(&self, src: Vid, read_ts: Timestamp) -> usize {
    self
      .adjacency
      .get(src as usize)
      .map(|a| a.snapshot_edges(read_ts).len())
      .unwrap_or(0)
  }

  fn grow_to(&mut self, min_len: usize) {
    while self.adjacency.len() < min_len {
      self.adjacency.push(PerVidAdjacency::with_capacity(1));
    }
  }

  fn compact(&mut self) {
    for adj in &mut self.adjacency {
      adj.compact();
    }
  }
}

/// Chooses the strategy's concrete storage while presenting one call surface to `DualCsr`.
pub enum Csr {
  Empty(EmptyCsr),
  Single(SingleCsr),
  Multiple(MultiCsr),
}

impl Csr {
  pub fn batch_init_empty() -> Self {
    Csr::Empty(EmptyCsr)
  }

  pub fn batch_init_single(degrees: &[u32]) -> Self {
    Csr::Single(SingleCsr::batch_init(degrees))
  }

  pub fn batch_init_multiple(degrees: &[u32]) -> Self {
    Csr::Multiple(MultiCsr::batch_init(degrees))
  }

  pub fn put_edge(&self, src: Vid, dst: Vid, data: u64, ts: Timestamp) {
    match self {
      Csr::Empty(c) => c.put_edge(src, dst, data, ts),
      Csr::Single(c) => c.put_edge(src, dst, data, ts),
      Csr::Multiple(c) => c.put_edge(src, dst, data, ts),
    }
  }

  pub fn batch_put_edge(&self, src: Vid, dst: Vid, data: u64) {
    match self {
      Csr::Empty(c) => c.batch_put_edge(src, dst, data),
      Csr::Single(c) => c.batch_put_edge(src, dst, data),
      Csr::Multiple(c) => c.batch_put_edge(src, dst, data),
    }
  }

  pub fn update_edge(&self, src: Vid, dst: Vid, data: u64, ts: Timestamp) -> bool {
    match self {
      Csr::Empty(c) => c.update_edge(src, dst, data, ts),
      Csr::Single(c) => c.update_edge(src, dst, data, ts),
      Csr::Multiple(c) => c.update_edge(src, dst, data, ts),
    }
  }

  pub fn edges(&self, src: Vid, read_ts: Timestamp) -> Vec<EdgeView> {
    match self {
      Csr::Empty(c) => c.edges(src, read_ts),
      Csr::Single(c) => c.edges(src, read_ts),
      Csr::Multiple(c) => c.edges(src, read_ts),
    }
  }

  pub fn degree(&self, src: Vid, read_ts: Timestamp) -> usize {
    match self {
      Csr::Empty(c) => c.degree(src, read_ts),
      Csr::Single(c) => c.degree(src, read_ts),
      Csr::Multiple(c) => c.degree(src, read_ts),
    }
  }

  pub fn grow_to(&mut self, min_len: usize) {
    match self {
      Csr::Empty(c) => c.grow_to(min_len),
      Csr::Single(c) => c.grow_to(min_len),
      Csr::Multiple(c) => c.grow_to(min_len),
    }
  }

  pub fn compact(&mut self) {
    match self {
      Csr::Empty(c) => c.compact(),
      Csr::Single(c) => c.compact(),
      Csr::Multiple(c) => c.compact(),
    }
  }
}
