//! Read transaction: a consistent view of the graph as of a fixed `read_ts`, never blocking
//! except during another transaction's update drain.

use std::sync::Arc;

use crate::error::Result;
use crate::session::Engine;
use crate::storage::EdgePayload;
use crate::types::{LabelId, Oid, PropValue, Timestamp, Triplet, Vid};

/// Holds a `read_ts` acquired from the version manager for its whole lifetime. RAII: dropping
/// without calling `commit`/`abort` releases the timestamp exactly as `abort` would (both are
/// equivalent for a read — there is nothing to stage).
pub struct ReadTransaction {
  engine: Arc<Engine>,
  read_ts: Timestamp,
  finished: bool,
}

impl ReadTransaction {
  pub(crate) fn new(engine: Arc<Engine>) -> Self {
    let read_ts = engine.version.acquire_read();
    ReadTransaction { engine, read_ts, finished: false }
  }

  pub fn read_ts(&self) -> Timestamp {
    self.read_ts
  }

  pub fn get_lid(&self, label: LabelId, oid: &Oid) -> Option<Vid> {
    self.engine.graph.get_lid(label, oid)
  }

  pub fn get_vertex(&self, label: LabelId, vid: Vid) -> Result<Vec<(String, PropValue)>> {
    self.engine.graph.get_full_row(label, vid)
  }

  pub fn get_vertex_field(&self, label: LabelId, vid: Vid, column: &str) -> Result<Option<PropValue>> {
    self.engine.graph.get_vertex_field(label, vid, column)
  }

  /// Out-neighbors of `src` in `triplet`, filtered to entries committed at or before this
  /// transaction's `read_ts`.
  pub fn out_edges(&self, triplet: Triplet, src: Vid) -> Result<Vec<(Vid, Timestamp, EdgePayload)>> {
    let edges = self.engine.graph.out_edges(triplet, src, self.read_ts)?;
    edges
      .into_iter()
      .map(|e| Ok((e.neighbor, e.ts, self.engine.graph.resolve_edge_payload(triplet, e.data)?)))
      .collect()
  }

  /// In-neighbors of `dst` in `triplet`, filtered the same way.
  pub fn in_edges(&self, triplet: Triplet, dst: Vid) -> Result<Vec<(Vid, Timestamp, EdgePayload)>> {
    let edges = self.engine.graph.in_edges(triplet, dst, self.read_ts)?;
    edges
      .into_iter()
      .map(|e| Ok((e.neighbor, e.ts, self.engine.graph.resolve_edge_payload(triplet, e.data)?)))
      .collect()
  }

  pub fn vertex_count(&self, label: LabelId) -> usize {
    self.engine.graph.vertex_count(label)
  }

  pub fn commit(mut self) {
    self.finish();
  }

  pub fn abort(mut self) {
    self.finish();
  }

  fn finish(&mut self) {
    if !self.finished {
      self.engine.version.release_read();
      self.finished = true;
    }
  }
}

impl Drop for ReadTransaction {
  fn drop(&mut self) {
    self.finish();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::schema::SchemaBuilder;
  use crate::session::{GraphDb, OpenOptions};
  use crate::types::{EdgeStrategy, PkType, PropValueTag};
  use tempfile::tempdir;

  fn schema() -> crate::graph::schema::Schema {
    SchemaBuilder::new()
      .vertex_label("PERSON", vec![("id", PropValueTag::I64), ("name", PropValueTag::String)], "id", PkType::Int64)
      .edge_triplet("KNOWS", "PERSON", "PERSON", EdgeStrategy::Multiple, EdgeStrategy::Multiple, PropValueTag::I64)
      .build()
      .unwrap()
  }

  #[test]
  fn abort_is_idempotent_and_releases_timestamp() {
    let dir = tempdir().unwrap();
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    let tx = db.get_read_transaction();
    tx.abort();
  }
}
