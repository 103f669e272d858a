//! Benchmarks for concurrent transaction throughput: parallel reads against a write-heavy
//! workload, and update-transaction serialization cost under thread contention.
//!
//! Run with: cargo bench --bench concurrent

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;

use propgraph::graph::schema::SchemaBuilder;
use propgraph::session::{GraphDb, OpenOptions};
use propgraph::types::{EdgeStrategy, Oid, PkType, PropValue, PropValueTag};

fn test_schema() -> propgraph::graph::schema::Schema {
  SchemaBuilder::new()
    .vertex_label("User", vec![("id", PropValueTag::I64), ("n", PropValueTag::I64)], "id", PkType::Int64)
    .edge_triplet("FOLLOWS", "User", "User", EdgeStrategy::Multiple, EdgeStrategy::Multiple, PropValueTag::I64)
    .build()
    .unwrap()
}

fn seeded_db(vertex_count: i64) -> (tempfile::TempDir, Arc<GraphDb>) {
  let temp_dir = tempdir().unwrap();
  let db = GraphDb::open(temp_dir.path(), test_schema(), OpenOptions::default()).unwrap();
  let user = db.schema().vertex_label_id("User").unwrap();
  for i in 0..vertex_count {
    let mut tx = db.get_single_vertex_insert_transaction(0, user);
    tx.stage_vertex(Oid::Int64(i), vec![("id".into(), PropValue::I64(i)), ("n".into(), PropValue::I64(0))]);
    tx.commit().unwrap();
  }
  (temp_dir, Arc::new(db))
}

fn bench_concurrent_reads_during_updates(c: &mut Criterion) {
  let mut group = c.benchmark_group("concurrent_read_during_update");
  group.sample_size(10);

  for reader_count in [1, 4, 8].iter() {
    group.throughput(Throughput::Elements(*reader_count as u64));
    group.bench_with_input(BenchmarkId::new("readers", reader_count), reader_count, |bencher, &reader_count| {
      bencher.iter_with_setup(
        || seeded_db(1000),
        |(_temp_dir, db)| {
          let user = db.schema().vertex_label_id("User").unwrap();
          let writer = {
            let db = Arc::clone(&db);
            thread::spawn(move || {
              for i in 0..50i64 {
                let mut tx = db.get_update_transaction(0);
                let vid = tx.get_lid(user, &Oid::Int64(i % 1000)).unwrap();
                tx.stage_vertex_field_update(user, Oid::Int64(i % 1000), "n", PropValue::I64(vid as i64));
                tx.commit().unwrap();
              }
            })
          };
          let mut readers = Vec::new();
          for _ in 0..reader_count {
            let db = Arc::clone(&db);
            readers.push(thread::spawn(move || {
              let read = db.get_read_transaction();
              for i in 0..200i64 {
                let _ = black_box(read.get_lid(user, &Oid::Int64(i % 1000)));
              }
              read.abort();
            }));
          }
          writer.join().unwrap();
          for r in readers {
            r.join().unwrap();
          }
        },
      );
    });
  }

  group.finish();
}

fn bench_update_transaction_serialization(c: &mut Criterion) {
  let mut group = c.benchmark_group("update_transaction_serialization");
  group.sample_size(10);

  for thread_count in [1, 4, 16].iter() {
    group.throughput(Throughput::Elements(*thread_count as u64));
    group.bench_with_input(BenchmarkId::new("threads", thread_count), thread_count, |bencher, &thread_count| {
      bencher.iter_with_setup(
        || seeded_db(thread_count as i64),
        |(_temp_dir, db)| {
          let user = db.schema().vertex_label_id("User").unwrap();
          let mut handles = Vec::new();
          for t in 0..thread_count {
            let db = Arc::clone(&db);
            handles.push(thread::spawn(move || {
              let oid = Oid::Int64(t as i64);
              let mut tx = db.get_update_transaction(t as usize);
              let vid = tx.get_lid(user, &oid).unwrap();
              let current = tx.get_vertex_field(user, vid, "n").unwrap().unwrap().as_i64().unwrap();
              tx.stage_vertex_field_update(user, oid, "n", PropValue::I64(current + 1));
              tx.commit().unwrap();
            }));
          }
          for h in handles {
            h.join().unwrap();
          }
        },
      );
    });
  }

  group.finish();
}

criterion_group!(benches, bench_concurrent_reads_during_updates, bench_update_transaction_serialization);
criterion_main!(benches);
