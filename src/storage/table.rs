//! A labeled, ordered set of columns sharing a row-capacity, indexed by vid. One `Table` per
//! vertex label.

use indexmap::IndexMap;

use crate::error::Result;
use crate::storage::column::Column;
use crate::types::{PropValue, PropValueTag, Vid};

/// Declares one property of a table at construction time.
pub struct ColumnDef {
  pub name: String,
  pub tag: PropValueTag,
}

impl ColumnDef {
  pub fn new(name: impl Into<String>, tag: PropValueTag) -> Self {
    ColumnDef {
      name: name.into(),
      tag,
    }
  }
}

/// Per-vertex-label property storage. Column order is insertion order (an `IndexMap`, so
/// `get_column_by_id` is stable across a session) and every column shares `row_capacity`.
pub struct Table {
  columns: IndexMap<String, Column>,
  row_capacity: usize,
}

impl Table {
  pub fn new(defs: Vec<ColumnDef>, capacity: usize) -> Self {
    let mut columns = IndexMap::with_capacity(defs.len());
    for def in defs {
      columns.insert(def.name, Column::new(def.tag, capacity));
    }
    Table {
      columns,
      row_capacity: capacity,
    }
  }

  pub fn row_capacity(&self) -> usize {
    self.row_capacity
  }

  /// Grow every column to hold at least `n` rows.
  pub fn resize(&mut self, n: usize) {
    if n <= self.row_capacity {
      return;
    }
    for column in self.columns.values_mut() {
      column.resize(n);
    }
    self.row_capacity = n;
  }

  pub fn get_column(&self, name: &str) -> Option<&Column> {
    self.columns.get(name)
  }

  pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
    self.columns.get_mut(name)
  }

  /// Compact every string column, dropping bytes leaked by in-place field rewrites.
  pub fn compact(&mut self) {
    for column in self.columns.values_mut() {
      column.compact();
    }
  }

  pub fn get_column_by_id(&self, i: usize) -> Option<&Column> {
    self.columns.get_index(i).map(|(_, c)| c)
  }

  pub fn column_names(&self) -> impl Iterator<Item = &str> {
    self.columns.keys().map(|s| s.as_str())
  }

  /// Write a full row at `vid`, growing the table first if needed.
  pub fn insert(&mut self, vid: Vid, record: Vec<(String, PropValue)>) -> Result<()> {
    if vid as usize >= self.row_capacity {
      self.resize(vid as usize + 1);
    }
    for (name, value) in record {
      if let Some(column) = self.columns.get_mut(&name) {
        column.set_any(vid, value)?;
      }
    }
    Ok(())
  }

  /// An unowned view of row `vid`: callers read individual columns through `get_column` plus
  /// this vid rather than materializing a full record eagerly.
  pub fn get_row(&self, vid: Vid) -> RowView<'_> {
    RowView { table: self, vid }
  }
}

pub struct RowView<'a> {
  table: &'a Table,
  vid: Vid,
}

impl<'a> RowView<'a> {
  pub fn get(&self, name: &str) -> Option<PropValue> {
    self.table.get_column(name).map(|c| c.get_any(self.vid))
  }

  pub fn vid(&self) -> Vid {
    self.vid
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insert_and_read_row() {
    let mut table = Table::new(
      vec![
        ColumnDef::new("id", PropValueTag::I64),
        ColumnDef::new("name", PropValueTag::String),
      ],
      4,
    );
    table
      .insert(
        0,
        vec![
          ("id".into(), PropValue::I64(42)),
          ("name".into(), PropValue::String("a".into())),
        ],
      )
      .unwrap();

    let row = table.get_row(0);
    assert_eq!(row.get("id"), Some(PropValue::I64(42)));
    assert_eq!(row.get("name"), Some(PropValue::String("a".into())));
  }

  #[test]
  fn insert_grows_capacity_as_needed() {
    let mut table = Table::new(vec![ColumnDef::new("n", PropValueTag::I64)], 1);
    table.insert(5, vec![("n".into(), PropValue::I64(7))]).unwrap();
    assert!(table.row_capacity() > 5);
    assert_eq!(table.get_row(5).get("n"), Some(PropValue::I64(7)));
  }
}
