//! Single-vertex insert transaction: stages one new vertex plus zero or more edges touching it,
//! then commits them all under one insert timestamp.

use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::session::Engine;
use crate::storage::EdgePayload;
use crate::types::{LabelId, Oid, PropValue, Timestamp, Triplet, Vid};
use crate::wal::parser::edge_payload_to_propvalue;
use crate::wal::record::WalOp;
use crate::wal::writer::WalWriter;

/// Where one end of a staged edge resolves: either a vertex already visible in the graph, or
/// the vertex this transaction is about to allocate.
#[derive(Clone, Copy)]
enum Endpoint {
  Existing(Vid),
  New,
}

struct StagedEdge {
  triplet: Triplet,
  src: Endpoint,
  dst: Endpoint,
  payload: EdgePayload,
}

/// Holds an insert timestamp for its whole lifetime. Dropping without `commit()` (or calling
/// `abort()` explicitly) releases the timestamp having written nothing — per the contract, abort
/// reverts the issued timestamp so readers never stall on the gap.
pub struct SingleVertexInsertTransaction {
  engine: Arc<Engine>,
  wal: Arc<WalWriter>,
  label: LabelId,
  ts: Timestamp,
  staged: Option<(Oid, Vec<(String, PropValue)>)>,
  edges: Vec<StagedEdge>,
  finished: bool,
}

impl SingleVertexInsertTransaction {
  pub(crate) fn new(engine: Arc<Engine>, wal: Arc<WalWriter>, label: LabelId) -> Self {
    let ts = engine.version.acquire_insert();
    SingleVertexInsertTransaction { engine, wal, label, ts, staged: None, edges: Vec::new(), finished: false }
  }

  pub fn ts(&self) -> Timestamp {
    self.ts
  }

  pub fn stage_vertex(&mut self, oid: Oid, props: Vec<(String, PropValue)>) {
    self.staged = Some((oid, props));
  }

  fn resolve(&self, label: LabelId, oid: &Oid) -> Result<Vid> {
    self.engine.graph.get_lid(label, oid).ok_or_else(|| GraphError::NotFound { label: label.to_string(), oid: oid.to_string() })
  }

  /// Stage an edge from the vertex being inserted to an already-committed vertex.
  pub fn stage_edge_to_existing(&mut self, triplet: Triplet, dst_label: LabelId, dst_oid: &Oid, payload: EdgePayload) -> Result<()> {
    let dst = self.resolve(dst_label, dst_oid)?;
    self.edges.push(StagedEdge { triplet, src: Endpoint::New, dst: Endpoint::Existing(dst), payload });
    Ok(())
  }

  /// Stage an edge from an already-committed vertex to the vertex being inserted.
  pub fn stage_edge_from_existing(&mut self, triplet: Triplet, src_label: LabelId, src_oid: &Oid, payload: EdgePayload) -> Result<()> {
    let src = self.resolve(src_label, src_oid)?;
    self.edges.push(StagedEdge { triplet, src: Endpoint::Existing(src), dst: Endpoint::New, payload });
    Ok(())
  }

  /// Write the staged vertex and its adjacent edges, append one WAL record covering all of it,
  /// and release the insert timestamp. Returns the newly allocated vid.
  pub fn commit(mut self) -> Result<Vid> {
    let result = self.do_commit();
    self.engine.version.release_insert(self.ts);
    self.finished = true;
    result
  }

  fn do_commit(&mut self) -> Result<Vid> {
    let (oid, props) = self.staged.take().ok_or_else(|| GraphError::internal("no vertex staged"))?;
    if self.engine.graph.get_lid(self.label, &oid).is_some() {
      return Err(GraphError::SchemaMismatch { label: format!("duplicate primary key {oid} for label {}", self.label) });
    }
    let vid = self.engine.graph.add_vertex(self.label, oid.clone())?;
    self.engine.graph.write_vertex_row(self.label, vid, props.clone())?;

    let mut ops = vec![WalOp::VertexInsert { label: self.label, oid, props }];
    for edge in &self.edges {
      let src = match edge.src {
        Endpoint::Existing(v) => v,
        Endpoint::New => vid,
      };
      let dst = match edge.dst {
        Endpoint::Existing(v) => v,
        Endpoint::New => vid,
      };
      self.engine.graph.ingest_edge(edge.triplet, src, dst, edge.payload.clone(), self.ts)?;
      let src_oid = self
        .engine
        .graph
        .oid_of(edge.triplet.src_label, src)
        .ok_or_else(|| GraphError::internal("edge endpoint vid has no indexed oid"))?;
      let dst_oid = self
        .engine
        .graph
        .oid_of(edge.triplet.dst_label, dst)
        .ok_or_else(|| GraphError::internal("edge endpoint vid has no indexed oid"))?;
      let payload = edge_payload_to_propvalue(self.engine.graph.schema(), edge.triplet, &edge.payload);
      ops.push(WalOp::EdgeInsert {
        src_label: edge.triplet.src_label,
        src_oid,
        dst_label: edge.triplet.dst_label,
        dst_oid,
        etype: edge.triplet.etype,
        payload,
      });
    }
    self.wal.append_insert(self.ts, &ops)?;
    Ok(vid)
  }

  pub fn abort(mut self) {
    self.finished = true;
    self.engine.version.release_insert(self.ts);
  }
}

impl Drop for SingleVertexInsertTransaction {
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
  fn commit_allocates_vid_and_is_visible_to_a_later_read() {
    let dir = tempdir().unwrap();
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    let person = db.schema().vertex_label_id("PERSON").unwrap();

    let mut tx = db.get_single_vertex_insert_transaction(0, person);
    tx.stage_vertex(Oid::Int64(42), vec![("id".into(), PropValue::I64(42)), ("name".into(), PropValue::String("a".into()))]);
    let vid = tx.commit().unwrap();
    assert_eq!(vid, 0);

    let read = db.get_read_transaction();
    assert_eq!(read.get_lid(person, &Oid::Int64(42)), Some(0));
    read.abort();
  }

  #[test]
  fn duplicate_primary_key_aborts_without_allocating() {
    let dir = tempdir().unwrap();
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    let person = db.schema().vertex_label_id("PERSON").unwrap();

    let mut tx = db.get_single_vertex_insert_transaction(0, person);
    tx.stage_vertex(Oid::Int64(2), vec![("id".into(), PropValue::I64(2)), ("name".into(), PropValue::String("a".into()))]);
    tx.commit().unwrap();

    let mut tx2 = db.get_single_vertex_insert_transaction(0, person);
    tx2.stage_vertex(Oid::Int64(2), vec![("id".into(), PropValue::I64(2)), ("name".into(), PropValue::String("dup".into()))]);
    assert!(tx2.commit().is_err());

    let read = db.get_read_transaction();
    assert_eq!(read.vertex_count(person), 1);
    read.abort();
  }
}
