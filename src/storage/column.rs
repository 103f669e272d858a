//! Typed columnar storage, one per declared vertex or edge property.
//!
//! Fixed-width properties are a dense `MmapArray<T>` indexed by vid. Strings are two parallel
//! arrays — an offset vector and a byte buffer — appended to monotonically: `set(vid, s)` always
//! appends fresh bytes and records the new start offset, so rewriting the same vid leaks the
//! previous bytes until compaction. That is intentional (see the design notes on the shared
//! edge-property column) and applies to vertex string columns too, for the same reason: a
//! column never needs to reason about in-place byte reclamation outside compaction.

use std::path::Path;

use crate::error::{GraphError, Result};
use crate::types::{PropValue, PropValueTag, Vid};
use crate::util::MmapArray;

/// A dense, fixed-width property column backed by an anonymous `MmapArray<T>`.
pub struct FixedColumn<T: Copy + Default> {
  data: MmapArray<T>,
}

impl<T: Copy + Default> FixedColumn<T> {
  pub fn new(row_capacity: usize) -> Self {
    FixedColumn {
      data: MmapArray::new_anon(row_capacity),
    }
  }

  pub fn resize(&mut self, n: usize) {
    if n > self.data.size() {
      self.data.resize(n).expect("anonymous resize cannot fail");
    }
  }

  pub fn get(&self, vid: Vid) -> T {
    self.data.data()[vid as usize]
  }

  pub fn set(&mut self, vid: Vid, value: T) {
    self.data.data_mut()[vid as usize] = value;
  }

  pub fn dump_values<P: AsRef<Path>>(&self, path: P, n: usize) -> Result<()> {
    self.data.dump_to_file(path, n)
  }

  pub fn open_values<P: AsRef<Path>>(path: P) -> Result<Self> {
    Ok(FixedColumn {
      data: MmapArray::open_for_read(path)?,
    })
  }
}

/// An append-only, variable-width string column. `offsets[vid]` is the start byte of row
/// `vid`; `lengths[vid]` is that row's byte length, recorded at write time so a row's extent
/// never depends on where any other row's offset happens to land. A fresh `set` for a vid
/// that already holds a value writes new bytes at the end of the buffer and updates both
/// arrays for that vid only — other rows, including ones with a numerically smaller offset,
/// are untouched and still resolve to their own correct bytes.
pub struct StringColumn {
  offsets: Vec<u64>,
  lengths: Vec<u32>,
  bytes: Vec<u8>,
}

const UNSET: u64 = u64::MAX;

impl StringColumn {
  pub fn new(row_capacity: usize) -> Self {
    StringColumn {
      offsets: vec![UNSET; row_capacity],
      lengths: vec![0; row_capacity],
      bytes: Vec::new(),
    }
  }

  pub fn resize(&mut self, n: usize) {
    if n > self.offsets.len() {
      self.offsets.resize(n, UNSET);
      self.lengths.resize(n, 0);
    }
  }

  /// Append `value` as row `vid`'s content. Per the column's append-only contract, calling
  /// this again for the same `vid` appends a fresh copy and leaks the old bytes — only
  /// compaction reclaims them. The new `(offset, length)` pair fully describes the row, so a
  /// rewrite of one vid never changes what any other vid reads.
  pub fn set(&mut self, vid: Vid, value: &str) {
    let idx = vid as usize;
    if idx >= self.offsets.len() {
      self.resize(idx + 1);
    }
    let start = self.bytes.len() as u64;
    self.bytes.extend_from_slice(value.as_bytes());
    self.offsets[idx] = start;
    self.lengths[idx] = value.len() as u32;
  }

  /// Row `vid`'s content. The row's own `(offset, length)` pair is self-contained, so this is
  /// correct regardless of write order or intervening rewrites of other rows.
  pub fn get(&self, vid: Vid) -> &str {
    let idx = vid as usize;
    let start = match self.offsets.get(idx).copied() {
      Some(o) if o != UNSET => o as usize,
      _ => return "",
    };
    let end = start + self.lengths[idx] as usize;
    std::str::from_utf8(&self.bytes[start..end]).unwrap_or("")
  }

  /// Rebuild the byte buffer keeping only the bytes each live row still points at, dropping
  /// whatever a prior rewrite of the same vid left behind. Offsets and lengths are rewritten
  /// in place so that row order (and therefore each row's content) is unchanged.
  pub fn compact(&mut self) {
    let mut new_bytes = Vec::with_capacity(self.bytes.len());
    let mut new_offsets = vec![UNSET; self.offsets.len()];
    let mut new_lengths = vec![0u32; self.lengths.len()];
    for vid in 0..self.offsets.len() {
      if self.offsets[vid] == UNSET {
        continue;
      }
      let value = self.get(vid as u32).to_string();
      new_offsets[vid] = new_bytes.len() as u64;
      new_lengths[vid] = value.len() as u32;
      new_bytes.extend_from_slice(value.as_bytes());
    }
    self.bytes = new_bytes;
    self.offsets = new_offsets;
    self.lengths = new_lengths;
  }

  pub fn dump<P: AsRef<Path>>(&self, values_path: P, offsets_path: P) -> Result<()> {
    std::fs::write(values_path, &self.bytes)?;
    let mut offset_bytes = Vec::with_capacity(self.offsets.len() * 12);
    for (offset, length) in self.offsets.iter().zip(self.lengths.iter()) {
      offset_bytes.extend_from_slice(&offset.to_le_bytes());
      offset_bytes.extend_from_slice(&length.to_le_bytes());
    }
    std::fs::write(offsets_path, offset_bytes)?;
    Ok(())
  }
}

/// Sum type over every concrete column representation, tagged by `PropValueTag`. Columns never
/// store `PropValue` directly — only the transaction/API boundary boxes into that enum.
pub enum Column {
  Bool(FixedColumn<u8>),
  U8(FixedColumn<u8>),
  U16(FixedColumn<u16>),
  U32(FixedColumn<u32>),
  U64(FixedColumn<u64>),
  I32(FixedColumn<i32>),
  I64(FixedColumn<i64>),
  F32(FixedColumn<f32>),
  F64(FixedColumn<f64>),
  DateMillis(FixedColumn<i64>),
  DayDate(FixedColumn<i32>),
  LabelId(FixedColumn<u32>),
  GlobalId(FixedColumn<u64>),
  String(StringColumn),
}

impl Column {
  pub fn new(tag: PropValueTag, row_capacity: usize) -> Self {
    match tag {
      PropValueTag::Bool => Column::Bool(FixedColumn::new(row_capacity)),
      PropValueTag::U8 => Column::U8(FixedColumn::new(row_capacity)),
      PropValueTag::U16 => Column::U16(FixedColumn::new(row_capacity)),
      PropValueTag::U32 => Column::U32(FixedColumn::new(row_capacity)),
      PropValueTag::U64 => Column::U64(FixedColumn::new(row_capacity)),
      PropValueTag::I32 => Column::I32(FixedColumn::new(row_capacity)),
      PropValueTag::I64 => Column::I64(FixedColumn::new(row_capacity)),
      PropValueTag::F32 => Column::F32(FixedColumn::new(row_capacity)),
      PropValueTag::F64 => Column::F64(FixedColumn::new(row_capacity)),
      PropValueTag::DateMillis => Column::DateMillis(FixedColumn::new(row_capacity)),
      PropValueTag::DayDate => Column::DayDate(FixedColumn::new(row_capacity)),
      PropValueTag::LabelId => Column::LabelId(FixedColumn::new(row_capacity)),
      PropValueTag::GlobalId => Column::GlobalId(FixedColumn::new(row_capacity)),
      PropValueTag::String => Column::String(StringColumn::new(row_capacity)),
      PropValueTag::Record | PropValueTag::Empty => {
        // Records/nulls are never column-resident; callers must not declare a column of
        // this tag directly.
        panic!("Record/Empty are not storable column tags")
      }
    }
  }

  pub fn tag(&self) -> PropValueTag {
    match self {
      Column::Bool(_) => PropValueTag::Bool,
      Column::U8(_) => PropValueTag::U8,
      Column::U16(_) => PropValueTag::U16,
      Column::U32(_) => PropValueTag::U32,
      Column::U64(_) => PropValueTag::U64,
      Column::I32(_) => PropValueTag::I32,
      Column::I64(_) => PropValueTag::I64,
      Column::F32(_) => PropValueTag::F32,
      Column::F64(_) => PropValueTag::F64,
      Column::DateMillis(_) => PropValueTag::DateMillis,
      Column::DayDate(_) => PropValueTag::DayDate,
      Column::LabelId(_) => PropValueTag::LabelId,
      Column::GlobalId(_) => PropValueTag::GlobalId,
      Column::String(_) => PropValueTag::String,
    }
  }

  pub fn resize(&mut self, n: usize) {
    match self {
      Column::Bool(c) | Column::U8(c) => c.resize(n),
      Column::U16(c) => c.resize(n),
      Column::U32(c) => c.resize(n),
      Column::U64(c) => c.resize(n),
      Column::I32(c) => c.resize(n),
      Column::I64(c) => c.resize(n),
      Column::F32(c) => c.resize(n),
      Column::F64(c) => c.resize(n),
      Column::DateMillis(c) => c.resize(n),
      Column::DayDate(c) => c.resize(n),
      Column::LabelId(c) => c.resize(n),
      Column::GlobalId(c) => c.resize(n),
      Column::String(c) => c.resize(n),
    }
  }

  /// Drop leaked bytes from prior string rewrites; a no-op for every fixed-width variant.
  pub fn compact(&mut self) {
    if let Column::String(c) = self {
      c.compact();
    }
  }

  pub fn get_any(&self, vid: Vid) -> PropValue {
    match self {
      Column::Bool(c) => PropValue::Bool(c.get(vid) != 0),
      Column::U8(c) => PropValue::U8(c.get(vid)),
      Column::U16(c) => PropValue::U16(c.get(vid)),
      Column::U32(c) => PropValue::U32(c.get(vid)),
      Column::U64(c) => PropValue::U64(c.get(vid)),
      Column::I32(c) => PropValue::I32(c.get(vid)),
      Column::I64(c) => PropValue::I64(c.get(vid)),
      Column::F32(c) => PropValue::F32(c.get(vid)),
      Column::F64(c) => PropValue::F64(c.get(vid)),
      Column::DateMillis(c) => PropValue::DateMillis(crate::types::DateMillis(c.get(vid))),
      Column::DayDate(c) => PropValue::DayDate(crate::types::DayDate(c.get(vid))),
      Column::LabelId(c) => PropValue::LabelId(c.get(vid)),
      Column::GlobalId(c) => PropValue::GlobalId(c.get(vid)),
      Column::String(c) => PropValue::String(c.get(vid).to_string()),
    }
  }

  pub fn set_any(&mut self, vid: Vid, value: PropValue) -> Result<()> {
    if value.tag() != self.tag() {
      return Err(GraphError::SchemaMismatch {
        label: format!("column expects {:?}, got {:?}", self.tag(), value.tag()),
      });
    }
    match (self, value) {
      (Column::Bool(c), PropValue::Bool(v)) => c.set(vid, v as u8),
      (Column::U8(c), PropValue::U8(v)) => c.set(vid, v),
      (Column::U16(c), PropValue::U16(v)) => c.set(vid, v),
      (Column::U32(c), PropValue::U32(v)) => c.set(vid, v),
      (Column::U64(c), PropValue::U64(v)) => c.set(vid, v),
      (Column::I32(c), PropValue::I32(v)) => c.set(vid, v),
      (Column::I64(c), PropValue::I64(v)) => c.set(vid, v),
      (Column::F32(c), PropValue::F32(v)) => c.set(vid, v),
      (Column::F64(c), PropValue::F64(v)) => c.set(vid, v),
      (Column::DateMillis(c), PropValue::DateMillis(v)) => c.set(vid, v.0),
      (Column::DayDate(c), PropValue::DayDate(v)) => c.set(vid, v.0),
      (Column::LabelId(c), PropValue::LabelId(v)) => c.set(vid, v),
      (Column::GlobalId(c), PropValue::GlobalId(v)) => c.set(vid, v),
      (Column::String(c), PropValue::String(v)) => c.set(vid, &v),
      _ => unreachable!("tag check above guarantees a matching arm"),
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fixed_column_round_trip() {
    let mut col = Column::new(PropValueTag::I64, 4);
    col.set_any(2, PropValue::I64(99)).unwrap();
    assert_eq!(col.get_any(2), PropValue::I64(99));
  }

  #[test]
  fn fixed_column_rejects_type_mismatch() {
    let mut col = Column::new(PropValueTag::I64, 4);
    assert!(col.set_any(0, PropValue::Bool(true)).is_err());
  }

  #[test]
  fn string_column_append_only() {
    let mut col = StringColumn::new(4);
    col.set(0, "alice");
    col.set(1, "bob");
    assert_eq!(col.get(0), "alice");
    assert_eq!(col.get(1), "bob");
  }

  #[test]
  fn string_column_compact_drops_leaked_bytes_from_rewrites() {
    let mut col = StringColumn::new(2);
    col.set(0, "original-long-value");
    col.set(0, "short");
    assert!(col.bytes.len() > "short".len());
    col.compact();
    assert_eq!(col.get(0), "short");
    assert_eq!(col.bytes.len(), "short".len());
  }

  #[test]
  fn string_column_rewrite_of_non_last_row_does_not_disturb_later_rows() {
    let mut col = StringColumn::new(2);
    col.set(0, "a");
    col.set(1, "bb");
    // Rewriting vid 0 (not the highest-indexed row) appends its new bytes past vid 1's
    // offset; vid 1 must still resolve to its own, unmoved bytes and vid 0 to the rewrite.
    col.set(0, "a-updated");
    assert_eq!(col.get(0), "a-updated");
    assert_eq!(col.get(1), "bb");
  }

  #[test]
  fn string_column_grows_with_resize() {
    let mut col = StringColumn::new(2);
    col.resize(5);
    col.set(4, "carol");
    assert_eq!(col.get(4), "carol");
  }
}
