//! Compact transaction: exclusive access, no mutations, right-sizes every CSR chunk and string
//! column to its live size.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::session::Engine;
use crate::types::Timestamp;

/// Holds the drained `update_ts` for its whole lifetime, same exclusive-access discipline as
/// [`super::update::UpdateTransaction`].
pub struct CompactTransaction {
  engine: Arc<Engine>,
  ts: Timestamp,
  finished: bool,
}

impl CompactTransaction {
  pub(crate) fn new(engine: Arc<Engine>) -> Self {
    let ts = engine.version.acquire_update();
    CompactTransaction { engine, ts, finished: false }
  }

  pub fn ts(&self) -> Timestamp {
    self.ts
  }

  pub fn commit(mut self) -> Result<()> {
    info!(ts = self.ts, "compaction starting");
    self.engine.graph.compact(self.ts);
    info!(ts = self.ts, "compaction finished");
    self.engine.version.release_update(self.ts);
    self.finished = true;
    Ok(())
  }

  pub fn abort(mut self) {
    self.finished = true;
    self.engine.version.revert_update(self.ts);
  }
}

impl Drop for CompactTransaction {
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
  use crate::types::{EdgeStrategy, Oid, PkType, PropValue, PropValueTag};
  use tempfile::tempdir;

  fn schema() -> crate::graph::schema::Schema {
    SchemaBuilder::new()
      .vertex_label("PERSON", vec![("id", PropValueTag::I64), ("name", PropValueTag::String)], "id", PkType::Int64)
      .edge_triplet("KNOWS", "PERSON", "PERSON", EdgeStrategy::Multiple, EdgeStrategy::Multiple, PropValueTag::I64)
      .build()
      .unwrap()
  }

  #[test]
  fn compact_preserves_visible_state() {
    let dir = tempdir().unwrap();
    let db = GraphDb::open(dir.path(), schema(), OpenOptions::default()).unwrap();
    let person = db.schema().vertex_label_id("PERSON").unwrap();

    let mut tx = db.get_single_vertex_insert_transaction(0, person);
    tx.stage_vertex(Oid::Int64(1), vec![("id".into(), PropValue::I64(1)), ("name".into(), PropValue::String("a".into()))]);
    tx.commit().unwrap();

    let compact = db.get_compact_transaction();
    compact.commit().unwrap();

    let read = db.get_read_transaction();
    assert_eq!(read.vertex_count(person), 1);
    read.abort();
  }
}
