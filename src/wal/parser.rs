//! WAL replay on session open: enumerates every writer thread's file, decodes its record
//! stream, and replays mutations against a freshly-constructed `MutableGraph` in timestamp
//! order.
//!
//! Deviation from the sparse-vector sketch in the design notes: `insert_wals` is kept as a
//! `BTreeMap<Timestamp, Vec<WalOp>>` rather than a preallocated `1 << 27`-entry array — this
//! engine is resident-in-memory only, and a graph small enough to fit there doesn't need a
//! 128M-slot table to index a few thousand commits. `WAL_PARSE_DENSE_INDEX_THRESHOLD` documents
//! the same call for the on-disk case this crate doesn't implement.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::graph::mutable_graph::MutableGraph;
use crate::graph::schema::Schema;
use crate::storage::EdgePayload;
use crate::types::{decode_fixed_bits, encode_fixed_bits, PropValue, PropValueTag, Timestamp, Triplet};
use crate::wal::record::{decode_ops, WalHeader, WalOp};
use tracing::warn;

pub struct ParsedWal {
  pub insert_ops: BTreeMap<Timestamp, Vec<WalOp>>,
  pub update_ops: Vec<(Timestamp, Vec<WalOp>)>,
  pub last_ts: Timestamp,
}

/// Parse every `thread_*_*.wal` file under `work_dir` and merge their records by timestamp.
/// Missing `work_dir` or an empty directory parses to an empty, `last_ts == 0` result.
pub fn parse_wal_dir(work_dir: &Path) -> Result<ParsedWal> {
  let mut insert_ops: BTreeMap<Timestamp, Vec<WalOp>> = BTreeMap::new();
  let mut update_ops: Vec<(Timestamp, Vec<WalOp>)> = Vec::new();
  let mut last_ts: Timestamp = 0;

  let Ok(entries) = std::fs::read_dir(work_dir) else {
    return Ok(ParsedWal { insert_ops, update_ops, last_ts });
  };

  for entry in entries {
    let entry = entry?;
    let name = entry.file_name();
    let name = name.to_string_lossy();
    if !name.starts_with("thread_") || !name.ends_with(".wal") {
      continue;
    }
    let bytes = std::fs::read(entry.path())?;
    let mut offset = 0usize;
    while offset + WalHeader::ENCODED_LEN <= bytes.len() {
      let header = WalHeader::decode(&bytes[offset..offset + WalHeader::ENCODED_LEN])?;
      // The file is pre-truncated to its truncation grain; an all-zero header marks the end
      // of actually-written records (valid timestamps start at 1).
      if header.timestamp == 0 && header.length == 0 {
        break;
      }
      let payload_start = offset + WalHeader::ENCODED_LEN;
      let payload_end = payload_start + header.length as usize;
      if payload_end > bytes.len() {
        warn!(file = %name, offset, "truncated WAL record, stopping replay of this file");
        break;
      }
      let ops = decode_ops(&bytes[payload_start..payload_end])?;
      if header.is_update {
        update_ops.push((header.timestamp, ops));
      } else {
        insert_ops.insert(header.timestamp, ops);
      }
      last_ts = last_ts.max(header.timestamp);
      offset = payload_end;
    }
  }

  update_ops.sort_by_key(|(ts, _)| *ts);
  Ok(ParsedWal { insert_ops, update_ops, last_ts })
}

/// Convert a WAL-decoded `PropValue` into the `EdgePayload` `DualCsr::put_edge` expects —
/// inverse of [`edge_payload_to_propvalue`], shared by replay and every insert/update
/// transaction's commit path so the PropValue/bits mapping lives in exactly one place.
pub(crate) fn edge_payload(schema: &Schema, triplet: Triplet, payload: PropValue) -> EdgePayload {
  let triplet_schema = schema.triplet_schema(triplet);
  match triplet_schema.map(|t| t.payload_tag) {
    Some(PropValueTag::String) => EdgePayload::Str(payload.as_str().unwrap_or_default().to_string()),
    Some(PropValueTag::Empty) | None => EdgePayload::Fixed(0),
    _ => EdgePayload::Fixed(encode_fixed_bits(&payload)),
  }
}

/// Convert a staged `EdgePayload` back into the typed `PropValue` a WAL op records — used when
/// a transaction's commit path needs to log the edge it just wrote.
pub(crate) fn edge_payload_to_propvalue(schema: &Schema, triplet: Triplet, payload: &EdgePayload) -> PropValue {
  match payload {
    EdgePayload::Str(s) => PropValue::String(s.clone()),
    EdgePayload::Fixed(bits) => {
      let tag = schema.triplet_schema(triplet).map(|t| t.payload_tag).unwrap_or(PropValueTag::Empty);
      if tag == PropValueTag::Empty {
        PropValue::Empty
      } else {
        decode_fixed_bits(tag, *bits)
      }
    }
  }
}

/// Apply one timestamp's ops directly against the graph, bypassing the WAL (the ops came from
/// the WAL in the first place).
fn apply_ops(graph: &MutableGraph, ops: &[WalOp], ts: Timestamp) -> Result<()> {
  for op in ops {
    match op {
      WalOp::VertexInsert { label, oid, props } | WalOp::AddedVertex { label, oid, props } => {
        let vid = graph.add_vertex(*label, oid.clone())?;
        graph.write_vertex_row(*label, vid, props.clone())?;
      }
      WalOp::EdgeInsert { src_label, src_oid, dst_label, dst_oid, etype, payload }
      | WalOp::AddedEdge { src_label, src_oid, dst_label, dst_oid, etype, payload } => {
        let triplet = Triplet::new(*src_label, *etype, *dst_label);
        let src = graph.get_lid(*src_label, src_oid);
        let dst = graph.get_lid(*dst_label, dst_oid);
        if let (Some(src), Some(dst)) = (src, dst) {
          let payload = edge_payload(graph.schema(), triplet, payload.clone());
          graph.ingest_edge(triplet, src, dst, payload, ts)?;
        }
      }
      WalOp::UpdatedVertexField { label, oid, column, value } => {
        if let Some(vid) = graph.get_lid(*label, oid) {
          graph.set_vertex_field(*label, vid, column, value.clone())?;
        }
      }
      WalOp::UpdatedEdgeData { src_label, src_oid, dst_label, dst_oid, etype, new_payload } => {
        let triplet = Triplet::new(*src_label, *etype, *dst_label);
        let src = graph.get_lid(*src_label, src_oid);
        let dst = graph.get_lid(*dst_label, dst_oid);
        if let (Some(src), Some(dst)) = (src, dst) {
          let payload = edge_payload(graph.schema(), triplet, new_payload.clone());
          graph.ingest_edge(triplet, src, dst, payload, ts)?;
        }
      }
    }
  }
  Ok(())
}

/// Replay a parsed WAL against `graph` in timestamp order: for each `ts` from 1 to `last_ts`,
/// any insert record for `ts` is applied before any update record at the same `ts`. Returns the
/// highest replayed timestamp, the seed for `read_ts`/`write_ts` going forward.
pub fn replay(graph: &MutableGraph, parsed: &ParsedWal) -> Result<Timestamp> {
  let mut update_idx = 0usize;
  for ts in 1..=parsed.last_ts {
    if let Some(ops) = parsed.insert_ops.get(&ts) {
      apply_ops(graph, ops, ts)?;
    }
    while update_idx < parsed.update_ops.len() && parsed.update_ops[update_idx].0 == ts {
      let (_, ops) = &parsed.update_ops[update_idx];
      apply_ops(graph, ops, ts)?;
      update_idx += 1;
    }
  }
  Ok(parsed.last_ts)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::schema::SchemaBuilder;
  use crate::types::{EdgeStrategy, Oid, PkType, PropValueTag};
  use crate::wal::writer::{LocalFileTransport, WalWriter};
  use std::sync::Arc;
  use tempfile::tempdir;

  fn schema() -> Arc<Schema> {
    Arc::new(
      SchemaBuilder::new()
        .vertex_label("PERSON", vec![("id", PropValueTag::I64), ("name", PropValueTag::String)], "id", PkType::Int64)
        .edge_triplet("KNOWS", "PERSON", "PERSON", EdgeStrategy::Multiple, EdgeStrategy::Multiple, PropValueTag::I64)
        .build()
        .unwrap(),
    )
  }

  #[test]
  fn replay_reconstructs_vertices_and_edges() {
    let dir = tempdir().unwrap();
    let transport = LocalFileTransport::create(dir.path(), 0, 1, 4096).unwrap();
    let writer = WalWriter::new(Box::new(transport));

    writer
      .append_insert(
        1,
        &[WalOp::VertexInsert {
          label: 1,
          oid: Oid::Int64(1),
          props: vec![("id".into(), PropValue::I64(1)), ("name".into(), PropValue::String("a".into()))],
        }],
      )
      .unwrap();
    writer
      .append_insert(
        2,
        &[
          WalOp::VertexInsert {
            label: 1,
            oid: Oid::Int64(2),
            props: vec![("id".into(), PropValue::I64(2)), ("name".into(), PropValue::String("b".into()))],
          },
          WalOp::EdgeInsert {
            src_label: 1,
            src_oid: Oid::Int64(1),
            dst_label: 1,
            dst_oid: Oid::Int64(2),
            etype: 1,
            payload: PropValue::I64(100),
          },
        ],
      )
      .unwrap();

    let parsed = parse_wal_dir(dir.path()).unwrap();
    assert_eq!(parsed.last_ts, 2);

    let schema = schema();
    let graph = MutableGraph::new(Arc::clone(&schema));
    let last_ts = replay(&graph, &parsed).unwrap();
    assert_eq!(last_ts, 2);

    let person = schema.vertex_label_id("PERSON").unwrap();
    let knows = schema.triplets()[0].triplet;
    let v1 = graph.get_lid(person, &Oid::Int64(1)).unwrap();
    let v2 = graph.get_lid(person, &Oid::Int64(2)).unwrap();
    let out = graph.out_edges(knows, v1, last_ts).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].neighbor, v2);
    assert_eq!(decode_fixed_bits(PropValueTag::I64, out[0].data), PropValue::I64(100));
  }
}
