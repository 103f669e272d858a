//! Update transaction: exclusive access to the graph, buffering new vertices, new edges, vertex
//! field updates, and edge payload updates in private side tables until commit.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::session::Engine;
use crate::storage::EdgePayload;
use crate::types::{LabelId, Oid, PropValue, Timestamp, Triplet, Vid};
use crate::wal::parser::edge_payload_to_propvalue;
use crate::wal::record::WalOp;
use crate::wal::writer::WalWriter;

/// Holds the drained `update_ts` for its whole lifetime. Every other transaction kind is blocked
/// from acquiring while this is outstanding (`VersionManager::acquire_update` drains them first).
pub struct UpdateTransaction {
  engine: Arc<Engine>,
  wal: Arc<WalWriter>,
  ts: Timestamp,
  added_vertices: Vec<(LabelId, Oid, Vec<(String, PropValue)>)>,
  updated_vertex_fields: Vec<(LabelId, Oid, String, PropValue)>,
  added_edges: Vec<(Triplet, Oid, Oid, EdgePayload)>,
  updated_edge_data: Vec<(Triplet, Oid, Oid, EdgePayload)>,
  finished: bool,
}

impl UpdateTransaction {
  pub(crate) fn new(engine: Arc<Engine>, wal: Arc<WalWriter>) -> Self {
    let ts = engine.version.acquire_update();
    UpdateTransaction {
      engine,
      wal,
      ts,
      added_vertices: Vec::new(),
      updated_vertex_fields: Vec::new(),
      added_edges: Vec::new(),
      updated_edge_data: Vec::new(),
      finished: false,
    }
  }

  pub fn ts(&self) -> Timestamp {
    self.ts
  }

  pub fn get_lid(&self, label: LabelId, oid: &Oid) -> Option<Vid> {
    self.engine.graph.get_lid(label, oid)
  }

  pub fn get_vertex_field(&self, label: LabelId, vid: Vid, column: &str) -> Result<Option<PropValue>> {
    self.engine.graph.get_vertex_field(label, vid, column)
  }

  pub fn out_edges(&self, triplet: Triplet, src: Vid) -> Result<Vec<(Vid, Timestamp, EdgePayload)>> {
    let edges = self.engine.graph.out_edges(triplet, src, self.ts)?;
    edges
      .into_iter()
      .map(|e| Ok((e.neighbor, e.ts, self.engine.graph.resolve_edge_payload(triplet, e.data)?)))
      .collect()
  }

  pub fn stage_added_vertex(&mut self, label: LabelId, oid: Oid, props: Vec<(String, PropValue)>) {
    self.added_vertices.push((label, oid, props));
  }

  pub fn stage_vertex_field_update(&mut self, label: LabelId, oid: Oid, column: impl Into<String>, value: PropValue) {
    self.updated_vertex_fields.push((label, oid, column.into(), value));
  }

  pub fn stage_added_edge(&mut self, triplet: Triplet, src_oid: Oid, dst_oid: Oid, payload: EdgePayload) {
    self.added_edges.push((triplet, src_oid, dst_oid, payload));
  }

  pub fn stage_edge_data_update(&mut self, triplet: Triplet, src_oid: Oid, dst_oid: Oid, payload: EdgePayload) {
    self.updated_edge_data.push((triplet, src_oid, dst_oid, payload));
  }

  /// Writes the full mutation log to WAL, then applies it in commit order: new vertices, new
  /// edges, vertex-field updates, edge-data updates. Releases the update timestamp regardless of
  /// outcome once applied.
  pub fn commit(mut self) -> Result<()> {
    let result = self.do_commit();
    self.engine.version.release_update(self.ts);
    self.finished = true;
    result
  }

  fn do_commit(&mut self) -> Result<()> {
    let mut ops = Vec::new();
    for (label, oid, props) in &self.added_vertices {
      ops.push(WalOp::AddedVertex { label: *label, oid: oid.clone(), props: props.clone() });
    }
    for (triplet, src_oid, dst_oid, payload) in &self.added_edges {
      let wal_payload = edge_payload_to_propvalue(self.engine.graph.schema(), *triplet, payload);
      ops.push(WalOp::AddedEdge {
        src_label: triplet.src_label,
        src_oid: src_oid.clone(),
        dst_label: triplet.dst_label,
        dst_oid: dst_oid.clone(),
        etype: triplet.etype,
        payload: wal_payload,
      });
    }
    for (label, oid, column, value) in &self.updated_vertex_fields {
      ops.push(WalOp::UpdatedVertexField { label: *label, oid: oid.clone(), column: column.clone(), value: value.clone() });
    }
    for (triplet, src_oid, dst_oid, payload) in &self.updated_edge_data {
      let wal_payload = edge_payload_to_propvalue(self.engine.graph.schema(), *triplet, payload);
      ops.push(WalOp::UpdatedEdgeData {
        src_label: triplet.src_label,
        src_oid: src_oid.clone(),
        dst_label: triplet.dst_label,
        dst_oid: dst_oid.clone(),
        etype: triplet.etype,
        new_payload: wal_payload,
      });
    }
    self.wal.append_update(self.ts, &ops)?;

    let mut new_vids: HashMap<(LabelId, Oid), Vid> = HashMap::new();
    for (label, oid, props) in self.added_vertices.drain(..) {
      let vid = self.engine.graph.add_vertex(label, oid.clone())?;
      self.engine.graph.write_vertex_row(label, vid, props)?;
      new_vids.insert((label, oid), vid);
    }

    let resolve = |graph: &crate::graph::MutableGraph, new_vids: &HashMap<(LabelId, Oid), Vid>, label: LabelId, oid: &Oid| -> Result<Vid> {
      if let Some(vid) = graph.get_lid(label, oid) {
        return Ok(vid);
      }
      new_vids
        .get(&(label, oid.clone()))
        .copied()
        .ok_or_else(|| GraphError::NotFound { label: label.to_string(), oid: oid.to_string() })
    };

    for (triplet, src_oid, dst_oid, payload) in self.added_edges.drain(..) {
      let src = resolve(&self.engine.graph, &new_vids, triplet.src_label, &src_oid)?;
      let dst = resolve(&self.engine.graph, &new_vids, triplet.dst_label, &dst_oid)?;
      self.engine.graph.ingest_edge(triplet, src, dst, payload, self.ts)?;
    }

    for (label, oid, column, value) in self.updated_vertex_fields.drain(..) {
      let vid = resolve(&self.engine.graph, &new_vids, label, &oid)?;
      self.engine.graph.set_vertex_field(label, vid, &column, value)?;
    }

    for (triplet, src_oid, dst_oid, payload) in self.updated_edge_data.drain(..) {
      let src = resolve(&self.engine.graph, &new_vids, triplet.src_label, &src_oid)?;
      let dst = resolve(&self.engine.graph, &new_vids, triplet.dst_label, &dst_oid)?;
      self.engine.graph.update_edge(triplet, src, dst, payload, self.ts)?;
    }
    Ok(())
  }

  pub fn abort(mut self) {
    self.finished = true;
    self.engine.version.revert_update(self.ts);
  }
}

impl Drop for UpdateTransaction {
  fn drop(&mut self) {
    if !self.finished {
      self.engine.version.revert_update(self.ts);
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
      .vertex_label("PERSON", vec![("id", PropValueTag::I64), ("n", PropValueTag::I64)], "id", PkType::Int64)
      .edge_triplet("KNOWS", "PERSON", "PERSON", EdgeStrategy::Multiple, EdgeStrategy::Multiple, PropValueTag::I64)
      .build()
      .unwrap()
  }

  #[test]
  fn lost_update_check_100_threads_increment_disjoint_people() {
    let dir = tempdir().unwrap();
    let db = Arc::new(GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap());
    let person = db.schema().vertex_label_id("PERSON").unwrap();

    {
      let mut tx = db.get_update_transaction(0);
      for i in 0..10i64 {
        tx.stage_added_vertex(person, Oid::Int64(i), vec![("id".into(), PropValue::I64(i)), ("n".into(), PropValue::I64(0))]);
      }
      tx.commit().unwrap();
    }

    let mut handles = Vec::new();
    for t in 0..100 {
      let db = Arc::clone(&db);
      handles.push(std::thread::spawn(move || {
        let target = Oid::Int64((t % 10) as i64);
        let mut tx = db.get_update_transaction(t % 4);
        let vid = tx.get_lid(person, &target).unwrap();
        let current = tx.get_vertex_field(person, vid, "n").unwrap().unwrap().as_i64().unwrap();
        tx.stage_vertex_field_update(person, target, "n", PropValue::I64(current + 1));
        tx.commit().unwrap();
      }));
    }
    for h in handles {
      h.join().unwrap();
    }

    let read = db.get_read_transaction();
    let mut total = 0i64;
    for i in 0..10i64 {
      let vid = read.get_lid(person, &Oid::Int64(i)).unwrap();
      total += read.get_vertex_field(person, vid, "n").unwrap().unwrap().as_i64().unwrap();
    }
    read.abort();
    assert_eq!(total, 100);
  }

  #[test]
  fn edge_data_update_rewrites_in_place_without_duplicating_the_edge() {
    let dir = tempdir().unwrap();
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    let person = db.schema().vertex_label_id("PERSON").unwrap();
    let knows = Triplet::new(person, db.schema().etype_id("KNOWS").unwrap(), person);

    {
      let mut tx = db.get_single_vertex_insert_transaction(0, person);
      tx.stage_vertex(Oid::Int64(1), vec![("id".into(), PropValue::I64(1)), ("n".into(), PropValue::I64(0))]);
      tx.commit().unwrap();
    }
    {
      let mut tx = db.get_single_vertex_insert_transaction(0, person);
      tx.stage_vertex(Oid::Int64(2), vec![("id".into(), PropValue::I64(2)), ("n".into(), PropValue::I64(0))]);
      tx.commit().unwrap();
    }
    {
      let mut tx = db.get_single_edge_insert_transaction(0);
      tx.stage_edge(knows, Oid::Int64(1), Oid::Int64(2), EdgePayload::Fixed(100));
      tx.commit().unwrap();
    }

    let mut tx = db.get_update_transaction(0);
    tx.stage_edge_data_update(knows, Oid::Int64(1), Oid::Int64(2), EdgePayload::Fixed(200));
    tx.commit().unwrap();

    let read = db.get_read_transaction();
    let src = read.get_lid(person, &Oid::Int64(1)).unwrap();
    let dst = read.get_lid(person, &Oid::Int64(2)).unwrap();
    let out = read.out_edges(knows, src).unwrap();
    let in_ = read.in_edges(knows, dst).unwrap();
    assert_eq!(out.len(), 1, "edge-data update must rewrite the existing entry, not append a second one");
    assert_eq!(in_.len(), 1);
    assert!(matches!(out[0].2, EdgePayload::Fixed(200)));
    assert!(matches!(in_[0].2, EdgePayload::Fixed(200)));
    read.abort();
  }

  #[test]
  fn abort_reverts_timestamp_and_applies_nothing() {
    let dir = tempdir().unwrap();
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    let person = db.schema().vertex_label_id("PERSON").unwrap();

    let mut tx = db.get_update_transaction(0);
    tx.stage_added_vertex(person, Oid::Int64(1), vec![("id".into(), PropValue::I64(1)), ("n".into(), PropValue::I64(0))]);
    tx.abort();

    let read = db.get_read_transaction();
    assert_eq!(read.vertex_count(person), 0);
    read.abort();
  }
}
