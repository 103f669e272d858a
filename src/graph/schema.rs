//! Label id/name maps, per-label property metadata, edge strategies, and primary-key
//! declarations. Immutable after `SchemaBuilder::build()`; every transaction consults it to
//! serialize/deserialize across the WAL and to pick a triplet's CSR strategy.

use std::collections::HashMap;

use crate::constants::{INITIAL_ETYPE_ID, INITIAL_LABEL_ID};
use crate::error::{GraphError, Result};
use crate::storage::ColumnDef;
use crate::types::{EdgeStrategy, EtypeId, LabelId, PkType, PropValueTag, Triplet};

/// One declared vertex property: name, type, and whether it is the label's primary key.
#[derive(Debug, Clone)]
pub struct PropertySchema {
  pub name: String,
  pub tag: PropValueTag,
}

/// Everything the schema knows about one vertex label.
#[derive(Debug, Clone)]
pub struct VertexLabelSchema {
  pub id: LabelId,
  pub name: String,
  pub properties: Vec<PropertySchema>,
  pub pk_column: String,
  pub pk_type: PkType,
}

impl VertexLabelSchema {
  pub fn column_defs(&self) -> Vec<ColumnDef> {
    self
      .properties
      .iter()
      .map(|p| ColumnDef::new(p.name.clone(), p.tag))
      .collect()
  }

  pub fn property(&self, name: &str) -> Option<&PropertySchema> {
    self.properties.iter().find(|p| p.name == name)
  }
}

/// Everything the schema knows about one `(src_label, etype, dst_label)` triplet: the storage
/// strategy in each direction and the edge payload's type (`PropValueTag::Empty` for no
/// payload, `PropValueTag::String` for a variable-width payload routed through the dual-CSR's
/// shared string column, anything else for a fixed-width payload encoded inline).
#[derive(Debug, Clone, Copy)]
pub struct EdgeTripletSchema {
  pub triplet: Triplet,
  pub out_strategy: EdgeStrategy,
  pub in_strategy: EdgeStrategy,
  pub payload_tag: PropValueTag,
}

impl EdgeTripletSchema {
  pub fn has_string_payload(&self) -> bool {
    self.payload_tag == PropValueTag::String
  }
}

/// Immutable-after-load schema value object.
#[derive(Debug, Clone)]
pub struct Schema {
  vertex_labels: Vec<VertexLabelSchema>,
  vertex_name_to_id: HashMap<String, LabelId>,
  edge_name_to_id: HashMap<String, EtypeId>,
  edge_id_to_name: HashMap<EtypeId, String>,
  triplets: Vec<EdgeTripletSchema>,
}

impl Schema {
  pub fn vertex_labels(&self) -> &[VertexLabelSchema] {
    &self.vertex_labels
  }

  pub fn triplets(&self) -> &[EdgeTripletSchema] {
    &self.triplets
  }

  pub fn vertex_label(&self, id: LabelId) -> Option<&VertexLabelSchema> {
    self.vertex_labels.iter().find(|l| l.id == id)
  }

  pub fn vertex_label_id(&self, name: &str) -> Option<LabelId> {
    self.vertex_name_to_id.get(name).copied()
  }

  pub fn etype_id(&self, name: &str) -> Option<EtypeId> {
    self.edge_name_to_id.get(name).copied()
  }

  pub fn etype_name(&self, id: EtypeId) -> Option<&str> {
    self.edge_id_to_name.get(&id).map(|s| s.as_str())
  }

  pub fn triplet_schema(&self, triplet: Triplet) -> Option<&EdgeTripletSchema> {
    self.triplets.iter().find(|t| t.triplet == triplet)
  }

  /// Triplets whose source label is `label` — their out-CSR must grow when a new vertex of
  /// this label is added.
  pub fn triplets_with_src(&self, label: LabelId) -> impl Iterator<Item = &EdgeTripletSchema> {
    self.triplets.iter().filter(move |t| t.triplet.src_label == label)
  }

  /// Triplets whose destination label is `label` — their in-CSR must grow symmetrically.
  pub fn triplets_with_dst(&self, label: LabelId) -> impl Iterator<Item = &EdgeTripletSchema> {
    self.triplets.iter().filter(move |t| t.triplet.dst_label == label)
  }
}

/// Builds a `Schema` by declaring vertex labels and edge triplets in order; ids are assigned
/// densely starting at `INITIAL_LABEL_ID`/`INITIAL_ETYPE_ID` in declaration order.
#[derive(Default)]
pub struct SchemaBuilder {
  vertex_labels: Vec<VertexLabelSchema>,
  vertex_name_to_id: HashMap<String, LabelId>,
  edge_name_to_id: HashMap<String, EtypeId>,
  edge_id_to_name: HashMap<EtypeId, String>,
  triplets: Vec<EdgeTripletSchema>,
  next_etype: EtypeId,
}

impl SchemaBuilder {
  pub fn new() -> Self {
    SchemaBuilder {
      next_etype: INITIAL_ETYPE_ID,
      ..Default::default()
    }
  }

  /// Declares a vertex label with `pk_column` as its primary key (must also appear in
  /// `properties`).
  pub fn vertex_label(
    mut self,
    name: impl Into<String>,
    properties: Vec<(&str, PropValueTag)>,
    pk_column: impl Into<String>,
    pk_type: PkType,
  ) -> Self {
    let name = name.into();
    let pk_column = pk_column.into();
    let id = INITIAL_LABEL_ID + self.vertex_labels.len() as LabelId;
    self.vertex_name_to_id.insert(name.clone(), id);
    self.vertex_labels.push(VertexLabelSchema {
      id,
      name,
      properties: properties
        .into_iter()
        .map(|(n, t)| PropertySchema { name: n.to_string(), tag: t })
        .collect(),
      pk_column,
      pk_type,
    });
    self
  }

  /// Declares a `(src_label, etype, dst_label)` triplet. `payload_tag` is
  /// `PropValueTag::Empty` for no payload, `PropValueTag::String` for a variable-width payload,
  /// or any fixed-width tag for an inline scalar payload.
  pub fn edge_triplet(
    mut self,
    etype_name: impl Into<String>,
    src_label: &str,
    dst_label: &str,
    out_strategy: EdgeStrategy,
    in_strategy: EdgeStrategy,
    payload_tag: PropValueTag,
  ) -> Self {
    let etype_name = etype_name.into();
    let etype = *self.edge_name_to_id.entry(etype_name.clone()).or_insert_with(|| {
      let id = self.next_etype;
      self.next_etype += 1;
      id
    });
    self.edge_id_to_name.insert(etype, etype_name);
    let src = self.vertex_name_to_id[src_label];
    let dst = self.vertex_name_to_id[dst_label];
    self.triplets.push(EdgeTripletSchema {
      triplet: Triplet::new(src, etype, dst),
      out_strategy,
      in_strategy,
      payload_tag,
    });
    self
  }

  pub fn build(self) -> Result<Schema> {
    for label in &self.vertex_labels {
      if label.property(&label.pk_column).is_none() {
        return Err(GraphError::internal(format!(
          "label {} declares primary key column {} with no matching property",
          label.name, label.pk_column
        )));
      }
    }
    Ok(Schema {
      vertex_labels: self.vertex_labels,
      vertex_name_to_id: self.vertex_name_to_id,
      edge_name_to_id: self.edge_name_to_id,
      edge_id_to_name: self.edge_id_to_name,
      triplets: self.triplets,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn person_knows_schema() -> Schema {
    SchemaBuilder::new()
      .vertex_label("PERSON", vec![("id", PropValueTag::I64), ("name", PropValueTag::String)], "id", PkType::Int64)
      .edge_triplet(
        "KNOWS",
        "PERSON",
        "PERSON",
        EdgeStrategy::Multiple,
        EdgeStrategy::Multiple,
        PropValueTag::I64,
      )
      .build()
      .unwrap()
  }

  #[test]
  fn assigns_dense_ids_in_declaration_order() {
    let schema = person_knows_schema();
    assert_eq!(schema.vertex_label_id("PERSON"), Some(INITIAL_LABEL_ID));
    assert_eq!(schema.etype_id("KNOWS"), Some(INITIAL_ETYPE_ID));
  }

  #[test]
  fn rejects_primary_key_with_no_matching_property() {
    let err = SchemaBuilder::new()
      .vertex_label("PERSON", vec![("name", PropValueTag::String)], "id", PkType::Int64)
      .build();
    assert!(err.is_err());
  }

  #[test]
  fn finds_triplets_by_src_and_dst_label() {
    let schema = person_knows_schema();
    let person = schema.vertex_label_id("PERSON").unwrap();
    assert_eq!(schema.triplets_with_src(person).count(), 1);
    assert_eq!(schema.triplets_with_dst(person).count(), 1);
  }
}
