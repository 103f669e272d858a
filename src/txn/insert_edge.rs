//! Single-edge insert transaction: both endpoints must already be committed and visible.

use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::session::Engine;
use crate::storage::EdgePayload;
use crate::types::{LabelId, Oid, Timestamp, Triplet};
use crate::wal::parser::edge_payload_to_propvalue;
use crate::wal::record::WalOp;
use crate::wal::writer::WalWriter;

/// Holds an insert timestamp for its whole lifetime, same discipline as
/// [`super::insert_vertex::SingleVertexInsertTransaction`].
pub struct SingleEdgeInsertTransaction {
  engine: Arc<Engine>,
  wal: Arc<WalWriter>,
  ts: Timestamp,
  staged: Option<(Triplet, Oid, Oid, EdgePayload)>,
  finished: bool,
}

impl SingleEdgeInsertTransaction {
  pub(crate) fn new(engine: Arc<Engine>, wal: Arc<WalWriter>) -> Self {
    let ts = engine.version.acquire_insert();
    SingleEdgeInsertTransaction { engine, wal, ts, staged: None, finished: false }
  }

  pub fn ts(&self) -> Timestamp {
    self.ts
  }

  pub fn stage_edge(&mut self, triplet: Triplet, src_oid: Oid, dst_oid: Oid, payload: EdgePayload) {
    self.staged = Some((triplet, src_oid, dst_oid, payload));
  }

  pub fn commit(mut self) -> Result<()> {
    let result = self.do_commit();
    self.engine.version.release_insert(self.ts);
    self.finished = true;
    result
  }

  fn do_commit(&mut self) -> Result<()> {
    let (triplet, src_oid, dst_oid, payload) = self.staged.take().ok_or_else(|| GraphError::internal("no edge staged"))?;
    let src = self.resolve(triplet.src_label, &src_oid)?;
    let dst = self.resolve(triplet.dst_label, &dst_oid)?;
    self.engine.graph.ingest_edge(triplet, src, dst, payload.clone(), self.ts)?;

    let wal_payload = edge_payload_to_propvalue(self.engine.graph.schema(), triplet, &payload);
    let op = WalOp::EdgeInsert {
      src_label: triplet.src_label,
      src_oid,
      dst_label: triplet.dst_label,
      dst_oid,
      etype: triplet.etype,
      payload: wal_payload,
    };
    self.wal.append_insert(self.ts, &[op])
  }

  fn resolve(&self, label: LabelId, oid: &Oid) -> Result<crate::types::Vid> {
    self.engine.graph.get_lid(label, oid).ok_or_else(|| GraphError::NotFound { label: label.to_string(), oid: oid.to_string() })
  }

  pub fn abort(mut self) {
    self.finished = true;
    self.engine.version.release_insert(self.ts);
  }
}

impl Drop for SingleEdgeInsertTransaction {
  fn drop(&mut self) {
    if !self.finished {
      self.engine.version.release_insert(self.ts);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::schema::SchemaBuilder;
  use crate::session::{GraphDb, OpenOptions};
  use crate::types::{decode_fixed_bits, EdgeStrategy, PkType, PropValue, PropValueTag};
  use tempfile::tempdir;

  fn schema() -> crate::graph::schema::Schema {
    SchemaBuilder::new()
      .vertex_label("PERSON", vec![("id", PropValueTag::I64), ("name", PropValueTag::String)], "id", PkType::Int64)
      .edge_triplet("KNOWS", "PERSON", "PERSON", EdgeStrategy::Multiple, EdgeStrategy::Multiple, PropValueTag::I64)
      .build()
      .unwrap()
  }

  #[test]
  fn commit_makes_the_edge_visible_symmetrically() {
    let dir = tempdir().unwrap();
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    let person = db.schema().vertex_label_id("PERSON").unwrap();
    let knows = db.schema().etype_id("KNOWS").unwrap();
    let triplet = Triplet::new(person, knows, person);

    for oid in [1i64, 2] {
      let mut tx = db.get_single_vertex_insert_transaction(0, person);
      tx.stage_vertex(Oid::Int64(oid), vec![("id".into(), PropValue::I64(oid)), ("name".into(), PropValue::String(format!("p{oid}")))]);
      tx.commit().unwrap();
    }

    let mut tx = db.get_single_edge_insert_transaction(0);
    tx.stage_edge(triplet, Oid::Int64(1), Oid::Int64(2), EdgePayload::Fixed(7));
    tx.commit().unwrap();

    let read = db.get_read_transaction();
    let v1 = read.get_lid(person, &Oid::Int64(1)).unwrap();
    let v2 = read.get_lid(person, &Oid::Int64(2)).unwrap();
    let out = read.out_edges(triplet, v1).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, v2);
    if let EdgePayload::Fixed(bits) = out[0].2 {
      assert_eq!(decode_fixed_bits(PropValueTag::I64, bits), PropValue::I64(7));
    } else {
      panic!("expected fixed payload");
    }
    let inn = read.in_edges(triplet, v2).unwrap();
    assert_eq!(inn.len(), 1);
    assert_eq!(inn[0].0, v1);
    read.abort();
  }

  #[test]
  fn missing_endpoint_aborts_with_not_found() {
    let dir = tempdir().unwrap();
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    let person = db.schema().vertex_label_id("PERSON").unwrap();
    let knows = db.schema().etype_id("KNOWS").unwrap();
    let triplet = Triplet::new(person, knows, person);

    let mut tx = db.get_single_edge_insert_transaction(0);
    tx.stage_edge(triplet, Oid::Int64(1), Oid::Int64(2), EdgePayload::Fixed(7));
    assert!(matches!(tx.commit(), Err(GraphError::NotFound { .. })));
  }
}
