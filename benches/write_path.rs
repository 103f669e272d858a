//! Benchmarks for the durable write path: bulk-insert batch throughput and per-commit WAL
//! append latency under different batch sizes.
//!
//! Run with: cargo bench --bench write_path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;

use propgraph::graph::schema::SchemaBuilder;
use propgraph::session::{GraphDb, OpenOptions};
use propgraph::storage::EdgePayload;
use propgraph::types::{EdgeStrategy, Oid, PkType, PropValue, PropValueTag, Triplet};

fn test_schema() -> propgraph::graph::schema::Schema {
  SchemaBuilder::new()
    .vertex_label("User", vec![("id", PropValueTag::I64), ("name", PropValueTag::String)], "id", PkType::Int64)
    .edge_triplet("FOLLOWS", "User", "User", EdgeStrategy::Multiple, EdgeStrategy::Multiple, PropValueTag::I64)
    .build()
    .unwrap()
}

fn bench_bulk_insert_vertices(c: &mut Criterion) {
  let mut group = c.benchmark_group("bulk_insert_vertices");
  group.sample_size(10);

  for count in [100, 1_000, 10_000].iter() {
    group.throughput(Throughput::Elements(*count as u64));
    group.bench_with_input(BenchmarkId::new("count", count), count, |bencher, &count| {
      bencher.iter_with_setup(
        || {
          let temp_dir = tempdir().unwrap();
          let db = GraphDb::open(temp_dir.path(), test_schema(), OpenOptions::default()).unwrap();
          let user = db.schema().vertex_label_id("User").unwrap();
          (temp_dir, db, user)
        },
        |(_temp_dir, db, user)| {
          let mut tx = db.get_bulk_insert_transaction(0);
          for i in 0..count {
            tx.stage_vertex(Oid::Int64(i as i64), vec![("id".into(), PropValue::I64(i as i64)), ("name".into(), PropValue::String(format!("user{i}")))]);
          }
          let _ = black_box(tx.commit());
        },
      );
    });
  }

  group.finish();
}

fn bench_bulk_insert_vertices_and_edges(c: &mut Criterion) {
  let mut group = c.benchmark_group("bulk_insert_vertices_and_edges");
  group.sample_size(10);

  for count in [100, 1_000, 5_000].iter() {
    group.throughput(Throughput::Elements(*count as u64));
    group.bench_with_input(BenchmarkId::new("vertices", count), count, |bencher, &count| {
      bencher.iter_with_setup(
        || {
          let temp_dir = tempdir().unwrap();
          let db = GraphDb::open(temp_dir.path(), test_schema(), OpenOptions::default()).unwrap();
          let user = db.schema().vertex_label_id("User").unwrap();
          let follows = db.schema().etype_id("FOLLOWS").unwrap();
          (temp_dir, db, user, follows)
        },
        |(_temp_dir, db, user, follows)| {
          let triplet = Triplet::new(user, follows, user);
          let mut tx = db.get_bulk_insert_transaction(0);
          for i in 0..count {
            tx.stage_vertex(Oid::Int64(i as i64), vec![("id".into(), PropValue::I64(i as i64)), ("name".into(), PropValue::String(format!("user{i}")))]);
          }
          for i in 1..count {
            tx.stage_edge(triplet, Oid::Int64((i - 1) as i64), Oid::Int64(i as i64), EdgePayload::Fixed(1));
          }
          let _ = black_box(tx.commit());
        },
      );
    });
  }

  group.finish();
}

fn bench_single_vertex_insert_commit_latency(c: &mut Criterion) {
  let mut group = c.benchmark_group("single_vertex_insert_commit_latency");

  let temp_dir = tempdir().unwrap();
  let db = GraphDb::open(temp_dir.path(), test_schema(), OpenOptions::default()).unwrap();
  let user = db.schema().vertex_label_id("User").unwrap();

  group.bench_function("fsync_per_commit", |bencher| {
    let mut i = 0i64;
    bencher.iter(|| {
      let mut tx = db.get_single_vertex_insert_transaction(0, user);
      tx.stage_vertex(Oid::Int64(i), vec![("id".into(), PropValue::I64(i)), ("name".into(), PropValue::String(format!("user{i}")))]);
      let _ = black_box(tx.commit());
      i += 1;
    });
  });

  group.finish();
}

criterion_group!(
  benches,
  bench_bulk_insert_vertices,
  bench_bulk_insert_vertices_and_edges,
  bench_single_vertex_insert_commit_latency
);
criterion_main!(benches);
