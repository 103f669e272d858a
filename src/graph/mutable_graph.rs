//! Aggregates every vertex label's table and indexer, every triplet's dual-CSR, and the
//! schema. This is the in-memory graph every transaction reads through and mutates into.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{GraphError, Result};
use crate::graph::schema::Schema;
use crate::storage::table::ColumnDef;
use crate::storage::{DualCsr, EdgePayload, EdgeView, LfIndexer, Table};
use crate::types::{LabelId, Oid, PropValue, Timestamp, Triplet, Vid};

struct VertexStore {
  table: RwLock<Table>,
  indexer: LfIndexer,
}

/// The whole in-memory graph: one `VertexStore` per declared vertex label, one `DualCsr` per
/// declared triplet, plus the schema that describes them both.
pub struct MutableGraph {
  schema: Arc<Schema>,
  vertices: HashMap<LabelId, VertexStore>,
  edges: HashMap<Triplet, RwLock<DualCsr>>,
}

impl MutableGraph {
  /// An empty graph matching `schema`, with zero vertices and zero edges per label/triplet.
  pub fn new(schema: Arc<Schema>) -> Self {
    Self::with_lf_indexer_rate(schema, crate::constants::LF_INDEXER_DEFAULT_RATE)
  }

  /// Same as `new`, but with an explicit max load factor for each label's serving indexer
  /// (`OpenOptions::lf_indexer_rate`).
  pub fn with_lf_indexer_rate(schema: Arc<Schema>, lf_indexer_rate: f64) -> Self {
    let mut vertices = HashMap::new();
    for label in schema.vertex_labels() {
      vertices.insert(
        label.id,
        VertexStore {
          table: RwLock::new(Table::new(label.column_defs(), 0)),
          indexer: LfIndexer::with_capacity(0, lf_indexer_rate),
        },
      );
    }
    let mut edges = HashMap::new();
    for triplet in schema.triplets() {
      edges.insert(
        triplet.triplet,
        RwLock::new(DualCsr::new(
          triplet.out_strategy,
          triplet.in_strategy,
          &[],
          &[],
          triplet.has_string_payload(),
        )),
      );
    }
    MutableGraph { schema, vertices, edges }
  }

  /// Build a graph whose vertex tables/indexers and triplet CSRs are pre-sized from bulk-load
  /// degree estimates — used by the bulk insert transaction's batch-init path so ordinary
  /// fanout never needs a mid-load chunk growth.
  pub fn with_batch_capacity(
    schema: Arc<Schema>,
    vertex_counts: &HashMap<LabelId, usize>,
    out_degrees: &HashMap<Triplet, Vec<u32>>,
    in_degrees: &HashMap<Triplet, Vec<u32>>,
  ) -> Self {
    let mut vertices = HashMap::new();
    for label in schema.vertex_labels() {
      let cap = vertex_counts.get(&label.id).copied().unwrap_or(0);
      vertices.insert(
        label.id,
        VertexStore {
          table: RwLock::new(Table::new(label.column_defs(), cap)),
          indexer: LfIndexer::with_capacity(cap, crate::constants::LF_INDEXER_DEFAULT_RATE),
        },
      );
    }
    let mut edges = HashMap::new();
    for triplet in schema.triplets() {
      let empty = Vec::new();
      let out_d = out_degrees.get(&triplet.triplet).unwrap_or(&empty);
      let in_d = in_degrees.get(&triplet.triplet).unwrap_or(&empty);
      edges.insert(
        triplet.triplet,
        RwLock::new(DualCsr::new(
          triplet.out_strategy,
          triplet.in_strategy,
          out_d,
          in_d,
          triplet.has_string_payload(),
        )),
      );
    }
    MutableGraph { schema, vertices, edges }
  }

  pub fn schema(&self) -> &Schema {
    &self.schema
  }

  fn vertex_store(&self, label: LabelId) -> Result<&VertexStore> {
    self.vertices.get(&label).ok_or_else(|| GraphError::SchemaMismatch {
      label: format!("unknown vertex label {label}"),
    })
  }

  fn edge_store(&self, triplet: Triplet) -> Result<&RwLock<DualCsr>> {
    self.edges.get(&triplet).ok_or_else(|| GraphError::SchemaMismatch {
      label: format!("unknown edge triplet {:?}", triplet),
    })
  }

  pub fn get_lid(&self, label: LabelId, oid: &Oid) -> Option<Vid> {
    self.vertices.get(&label).and_then(|s| s.indexer.get(oid))
  }

  pub fn vertex_count(&self, label: LabelId) -> usize {
    self.vertices.get(&label).map(|s| s.indexer.len()).unwrap_or(0)
  }

  /// Allocates a new vid for `oid` under `label`, growing that label's table and every
  /// triplet's CSR that references this label as source or destination. Does not check for a
  /// pre-existing `oid` — callers (the insert transactions) must consult `get_lid` first and
  /// treat a hit as a duplicate-PK staging failure.
  pub fn add_vertex(&self, label: LabelId, oid: Oid) -> Result<Vid> {
    let store = self.vertex_store(label)?;
    let vid = store.indexer.insert(oid);
    store.table.write().resize(vid as usize + 1);
    for triplet in self.schema.triplets_with_src(label) {
      if let Some(dual) = self.edges.get(&triplet.triplet) {
        dual.write().grow_out_to(vid as usize + 1);
      }
    }
    for triplet in self.schema.triplets_with_dst(label) {
      if let Some(dual) = self.edges.get(&triplet.triplet) {
        dual.write().grow_in_to(vid as usize + 1);
      }
    }
    Ok(vid)
  }

  pub fn write_vertex_row(&self, label: LabelId, vid: Vid, record: Vec<(String, PropValue)>) -> Result<()> {
    self.vertex_store(label)?.table.write().insert(vid, record)
  }

  pub fn get_vertex_field(&self, label: LabelId, vid: Vid, column: &str) -> Result<Option<PropValue>> {
    Ok(self.vertex_store(label)?.table.read().get_row(vid).get(column))
  }

  pub fn set_vertex_field(&self, label: LabelId, vid: Vid, column: &str, value: PropValue) -> Result<()> {
    let store = self.vertex_store(label)?;
    let mut table = store.table.write();
    let col = table.get_column_mut(column).ok_or_else(|| GraphError::SchemaMismatch {
      label: format!("label {label} has no column {column}"),
    })?;
    col.set_any(vid, value)
  }

  pub fn get_full_row(&self, label: LabelId, vid: Vid) -> Result<Vec<(String, PropValue)>> {
    let store = self.vertex_store(label)?;
    let table = store.table.read();
    let row = table.get_row(vid);
    Ok(table.column_names().map(|n| (n.to_string(), row.get(n).unwrap_or(PropValue::Empty))).collect())
  }

  /// Decode a vid's declared primary-key property as an `Oid`, used by iteration/display paths
  /// that need the user-facing key rather than the internal vid.
  pub fn oid_of(&self, label: LabelId, vid: Vid) -> Option<Oid> {
    self.vertices.get(&label)?.indexer.key_of(vid)
  }

  /// Timestamped write, routed through the triplet's dual-CSR.
  pub fn ingest_edge(&self, triplet: Triplet, src: Vid, dst: Vid, payload: EdgePayload, ts: Timestamp) -> Result<()> {
    self.edge_store(triplet)?.read().put_edge(src, dst, payload, ts);
    Ok(())
  }

  /// Untimestamped write used only by the bulk loader during batch ingestion.
  pub fn batch_ingest_edge(&self, triplet: Triplet, src: Vid, dst: Vid, payload: EdgePayload) -> Result<()> {
    self.edge_store(triplet)?.read().batch_put_edge(src, dst, payload);
    Ok(())
  }

  /// In-place rewrite of an existing edge's payload, used by the update transaction's
  /// edge-data-update stage. Unlike `ingest_edge`, this never appends a new adjacency entry.
  pub fn update_edge(&self, triplet: Triplet, src: Vid, dst: Vid, payload: EdgePayload, ts: Timestamp) -> Result<()> {
    let updated = self.edge_store(triplet)?.read().update_edge(src, dst, payload, ts);
    if !updated {
      return Err(GraphError::NotFound { label: triplet.src_label.to_string(), oid: format!("edge {src} -> {dst}") });
    }
    Ok(())
  }

  pub fn out_edges(&self, triplet: Triplet, src: Vid, read_ts: Timestamp) -> Result<Vec<EdgeView>> {
    Ok(self.edge_store(triplet)?.read().out_edges(src, read_ts))
  }

  pub fn in_edges(&self, triplet: Triplet, dst: Vid, read_ts: Timestamp) -> Result<Vec<EdgeView>> {
    Ok(self.edge_store(triplet)?.read().in_edges(dst, read_ts))
  }

  pub fn resolve_edge_payload(&self, triplet: Triplet, data: u64) -> Result<EdgePayload> {
    Ok(self.edge_store(triplet)?.read().resolve_payload(data))
  }

  /// Compact every triplet's CSR chunk capacities and every vertex table's string columns.
  /// Runs under the update timestamp's exclusive access, so plain `&self` with internal
  /// mutation through the existing locks is safe — no concurrent reader or writer is active.
  pub fn compact(&self, _up_to_ts: Timestamp) {
    for dual in self.edges.values() {
      dual.write().compact();
    }
    for store in self.vertices.values() {
      store.table.write().compact();
    }
  }

  pub fn vertex_labels(&self) -> impl Iterator<Item = LabelId> + '_ {
    self.vertices.keys().copied()
  }
}
