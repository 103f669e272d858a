//! S7 — update transaction WAL round trip (SPEC_FULL.md §8): an update transaction that adds a
//! vertex, updates an existing vertex field, and adds an edge must survive a reopen without
//! compaction, proving the update WAL payload carries the full mutation log and not just a
//! commit marker (§4.J / §10.1).

use propgraph::graph::schema::SchemaBuilder;
use propgraph::session::{GraphDb, OpenOptions};
use propgraph::storage::EdgePayload;
use propgraph::types::{EdgeStrategy, Oid, PkType, PropValue, PropValueTag, Triplet};

fn schema() -> propgraph::graph::schema::Schema {
  SchemaBuilder::new()
    .vertex_label("PERSON", vec![("id", PropValueTag::I64), ("name", PropValueTag::String)], "id", PkType::Int64)
    .edge_triplet("KNOWS", "PERSON", "PERSON", EdgeStrategy::Multiple, EdgeStrategy::Multiple, PropValueTag::I64)
    .build()
    .unwrap()
}

#[test]
fn update_transaction_mutations_survive_reopen_without_compaction() {
  let dir = tempfile::tempdir().unwrap();
  let person;
  let knows;

  {
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    person = db.schema().vertex_label_id("PERSON").unwrap();
    knows = Triplet::new(person, db.schema().etype_id("KNOWS").unwrap(), person);

    // Seed two vertices through a plain insert so the update transaction below has an
    // existing vertex to mutate and an existing endpoint to connect to.
    for (oid, name) in [(1i64, "a"), (2i64, "b")] {
      let mut tx = db.get_single_vertex_insert_transaction(0, person);
      tx.stage_vertex(Oid::Int64(oid), vec![("id".into(), PropValue::I64(oid)), ("name".into(), PropValue::String(name.into()))]);
      tx.commit().unwrap();
    }

    let mut tx = db.get_update_transaction(0);
    tx.stage_added_vertex(person, Oid::Int64(3), vec![("id".into(), PropValue::I64(3)), ("name".into(), PropValue::String("c".into()))]);
    tx.stage_vertex_field_update(person, Oid::Int64(1), "name", PropValue::String("a-updated".into()));
    tx.stage_added_edge(knows, Oid::Int64(1), Oid::Int64(3), EdgePayload::Fixed(7));
    tx.commit().unwrap();
  }

  // Reopen without compacting: the graph must be reconstructed purely from WAL replay.
  let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
  let read = db.get_read_transaction();

  assert_eq!(read.vertex_count(person), 3);

  let vid3 = read.get_lid(person, &Oid::Int64(3)).expect("added vertex survives replay");
  assert_eq!(read.get_vertex_field(person, vid3, "name").unwrap().unwrap().as_str().unwrap(), "c");

  let vid1 = read.get_lid(person, &Oid::Int64(1)).unwrap();
  assert_eq!(read.get_vertex_field(person, vid1, "name").unwrap().unwrap().as_str().unwrap(), "a-updated");

  let out = read.out_edges(knows, vid1).unwrap();
  assert_eq!(out.len(), 1);
  assert_eq!(out[0].0, vid3);
  assert!(matches!(out[0].2, EdgePayload::Fixed(7)));

  read.abort();
}
