//! Out/in CSR pair for one `(src_label, etype, dst_label)` triplet, plus the shared
//! variable-width edge-property column that both directions' entries index into when the
//! triplet's payload is a string.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::storage::column::StringColumn;
use crate::storage::csr::{Csr, EdgeView};
use crate::types::{EdgeStrategy, Timestamp, Vid};

/// An edge payload as staged by a transaction, before it is reduced to the `u64` bits a `Csr`
/// stores.
#[derive(Debug, Clone)]
pub enum EdgePayload {
  Fixed(u64),
  Str(String),
}

/// Append-only string storage shared by both directions of a triplet, addressed by a row id
/// distinct from any vid space. `next_row` is handed out before the corresponding bytes are
/// written, mirroring `column_idx.fetch_add(1)` in the design this mirrors.
struct SharedStringColumn {
  next_row: AtomicU64,
  bytes: Mutex<StringColumn>,
}

impl SharedStringColumn {
  fn new() -> Self {
    SharedStringColumn {
      next_row: AtomicU64::new(0),
      bytes: Mutex::new(StringColumn::new(0)),
    }
  }

  fn append(&self, value: &str) -> u64 {
    let row = self.next_row.fetch_add(1, Ordering::SeqCst);
    let mut column = self.bytes.lock();
    column.resize(row as usize + 1);
    column.set(row as u32, value);
    row
  }

  fn get(&self, row: u64) -> String {
    self.bytes.lock().get(row as u32).to_string()
  }
}

/// Owns the out/in CSR pair for one triplet direction pair, and (if either direction's strategy
/// needs it) the shared string column for variable-width payloads.
pub struct DualCsr {
  out: Csr,
  in_: Csr,
  strings: Option<SharedStringColumn>,
}

impl DualCsr {
  pub fn new(out_strategy: EdgeStrategy, in_strategy: EdgeStrategy, out_degrees: &[u32], in_degrees: &[u32], has_string_payload: bool) -> Self {
    let build = |strategy: EdgeStrategy, degrees: &[u32]| match strategy {
      EdgeStrategy::None => Csr::batch_init_empty(),
      EdgeStrategy::Single => Csr::batch_init_single(degrees),
      EdgeStrategy::Multiple => Csr::batch_init_multiple(degrees),
    };
    DualCsr {
      out: build(out_strategy, out_degrees),
      in_: build(in_strategy, in_degrees),
      strings: if has_string_payload { Some(SharedStringColumn::new()) } else { None },
    }
  }

  /// Writes `src -> dst` into both directions, routing a string payload through the shared
  /// column first so both CSRs end up pointing at the same row.
  pub fn put_edge(&self, src: Vid, dst: Vid, payload: EdgePayload, ts: Timestamp) {
    let data = match payload {
      EdgePayload::Fixed(bits) => bits,
      EdgePayload::Str(s) => {
        let strings = self
          .strings
          .as_ref()
          .expect("put_edge called with a string payload on a triplet with no string column");
        strings.append(&s)
      }
    };
    self.out.put_edge(src, dst, data, ts);
    self.in_.put_edge(dst, src, data, ts);
  }

  /// Overwrite an existing `src -> dst` edge's payload/timestamp in place on both directions,
  /// rather than appending a new entry the way `put_edge` does. A string payload still appends
  /// a fresh row to the shared column (Open Question §10.2: the column itself stays append-only
  /// even though the CSR entries pointing into it are now rewritten, not duplicated) — only the
  /// row index the entries carry changes in place. Returns `false` if no live `src -> dst` edge
  /// was found on (at least) one direction, which should not happen for a well-formed triplet
  /// (testable property #5, dual symmetry) but is surfaced rather than silently ignored.
  pub fn update_edge(&self, src: Vid, dst: Vid, payload: EdgePayload, ts: Timestamp) -> bool {
    let data = match payload {
      EdgePayload::Fixed(bits) => bits,
      EdgePayload::Str(s) => {
        let strings = self
          .strings
          .as_ref()
          .expect("update_edge called with a string payload on a triplet with no string column");
        strings.append(&s)
      }
    };
    let out_updated = self.out.update_edge(src, dst, data, ts);
    let in_updated = self.in_.update_edge(dst, src, data, ts);
    out_updated && in_updated
  }

  pub fn batch_put_edge(&self, src: Vid, dst: Vid, payload: EdgePayload) {
    let data = match payload {
      EdgePayload::Fixed(bits) => bits,
      EdgePayload::Str(s) => {
        let strings = self.strings.as_ref().expect("batch_put_edge called with a string payload on a triplet with no string column");
        strings.append(&s)
      }
    };
    self.out.batch_put_edge(src, dst, data);
    self.in_.batch_put_edge(dst, src, data);
  }

  pub fn out_edges(&self, src: Vid, read_ts: Timestamp) -> Vec<EdgeView> {
    self.out.edges(src, read_ts)
  }

  pub fn in_edges(&self, dst: Vid, read_ts: Timestamp) -> Vec<EdgeView> {
    self.in_.edges(dst, read_ts)
  }

  pub fn out_degree(&self, src: Vid, read_ts: Timestamp) -> usize {
    self.out.degree(src, read_ts)
  }

  pub fn in_degree(&self, dst: Vid, read_ts: Timestamp) -> usize {
    self.in_.degree(dst, read_ts)
  }

  /// Extend the out-CSR so source vids up to `min_len - 1` are addressable. Called when a new
  /// vertex is added to this triplet's source label.
  pub fn grow_out_to(&mut self, min_len: usize) {
    self.out.grow_to(min_len);
  }

  /// Extend the in-CSR so destination vids up to `min_len - 1` are addressable. Called when a
  /// new vertex is added to this triplet's destination label.
  pub fn grow_in_to(&mut self, min_len: usize) {
    self.in_.grow_to(min_len);
  }

  /// Right-size both directions' per-vid chunk capacities to their live size.
  pub fn compact(&mut self) {
    self.out.compact();
    self.in_.compact();
  }

  /// Resolve a `u64` edge entry into a displayable payload: the raw bits for a fixed-width
  /// triplet, or the referenced row's string for a variable-width one.
  pub fn resolve_payload(&self, data: u64) -> EdgePayload {
    match &self.strings {
      Some(strings) => EdgePayload::Str(strings.get(data)),
      None => EdgePayload::Fixed(data),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fixed_payload_is_visible_from_both_directions() {
    let dual = DualCsr::new(EdgeStrategy::Multiple, EdgeStrategy::Multiple, &[0, 0], &[0, 0], false);
    dual.put_edge(0, 1, EdgePayload::Fixed(42), 1);
    assert_eq!(dual.out_edges(0, 1)[0].data, 42);
    assert_eq!(dual.in_edges(1, 1)[0].data, 42);
  }

  #[test]
  fn string_payload_resolves_through_shared_column() {
    let dual = DualCsr::new(EdgeStrategy::Multiple, EdgeStrategy::Multiple, &[0], &[0], true);
    dual.put_edge(0, 0, EdgePayload::Str("hello".into()), 1);
    let row = dual.out_edges(0, 1)[0].data;
    match dual.resolve_payload(row) {
      EdgePayload::Str(s) => assert_eq!(s, "hello"),
      _ => panic!("expected string payload"),
    }
  }

  #[test]
  fn update_edge_rewrites_both_directions_without_duplicating() {
    let dual = DualCsr::new(EdgeStrategy::Multiple, EdgeStrategy::Multiple, &[0, 0], &[0, 0], false);
    dual.put_edge(0, 1, EdgePayload::Fixed(42), 1);
    assert!(dual.update_edge(0, 1, EdgePayload::Fixed(99), 2));
    let out = dual.out_edges(0, 2);
    let in_ = dual.in_edges(1, 2);
    assert_eq!(out.len(), 1);
    assert_eq!(in_.len(), 1);
    assert_eq!(out[0].data, 99);
    assert_eq!(in_[0].data, 99);
  }

  #[test]
  fn none_strategy_direction_never_materializes_edges() {
    let dual = DualCsr::new(EdgeStrategy::Multiple, EdgeStrategy::None, &[0], &[], false);
    dual.put_edge(0, 0, EdgePayload::Fixed(1), 1);
    assert_eq!(dual.out_edges(0, 1).len(), 1);
    assert_eq!(dual.in_edges(0, 1).len(), 0);
  }
}
