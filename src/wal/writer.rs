//! Durable transport for WAL records. `WalTransport` is the abstraction the design calls out
//! explicitly: Kafka and local-file are interchangeable behind it. Only the local-file
//! transport ships here — a Kafka-backed implementation is an integration detail this crate's
//! scope excludes (see SPEC_FULL.md §1), but any crate can provide one by implementing the
//! trait.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Result;
use crate::wal::record::{WalHeader, WalOp};

/// One append of a length-prefixed WAL record. Implementations own their own durability
/// contract; `LocalFileTransport` fsyncs after every call. A failure here is treated as fatal
/// by the session that owns this writer (see `GraphError::WalIo`) — the storage engine does
/// not retry a failed append.
pub trait WalTransport: Send + Sync {
  fn append(&self, bytes: &[u8]) -> Result<()>;
}

/// One writer-thread's append-only log file, named `thread_{thread_id}_{version}.wal` per
/// §4.J. Pre-truncated to `truncate_size` bytes at creation; a new `version` is used each time
/// a session opens, so stale files from a prior open are never appended to.
pub struct LocalFileTransport {
  file: Mutex<File>,
  path: PathBuf,
}

impl LocalFileTransport {
  pub fn create(work_dir: &Path, thread_id: usize, version: u64, truncate_size: u64) -> Result<Self> {
    std::fs::create_dir_all(work_dir)?;
    let path = work_dir.join(format!("thread_{thread_id}_{version}.wal"));
    let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path)?;
    file.set_len(truncate_size)?;
    Ok(LocalFileTransport { file: Mutex::new(file), path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl WalTransport for LocalFileTransport {
  fn append(&self, bytes: &[u8]) -> Result<()> {
    let mut file = self.file.lock();
    file.write_all(bytes)?;
    file.sync_data()?;
    Ok(())
  }
}

/// Encodes a header + op-stream payload and hands it to a `WalTransport`. One instance per
/// writer thread, matching the one-file(or-topic)-per-thread design.
pub struct WalWriter {
  transport: Box<dyn WalTransport>,
  offset: Mutex<u64>,
}

impl WalWriter {
  pub fn new(transport: Box<dyn WalTransport>) -> Self {
    WalWriter { transport, offset: Mutex::new(0) }
  }

  pub fn append_insert(&self, ts: crate::types::Timestamp, ops: &[WalOp]) -> Result<()> {
    self.append(ts, false, ops)
  }

  pub fn append_update(&self, ts: crate::types::Timestamp, ops: &[WalOp]) -> Result<()> {
    self.append(ts, true, ops)
  }

  fn append(&self, ts: crate::types::Timestamp, is_update: bool, ops: &[WalOp]) -> Result<()> {
    let payload = crate::wal::record::encode_ops(ops);
    let header = WalHeader { timestamp: ts, is_update, length: payload.len() as u32 };
    let mut buf = Vec::with_capacity(WalHeader::ENCODED_LEN + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&payload);
    let len = buf.len() as u64;
    self.transport.append(&buf)?;
    *self.offset.lock() += len;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{Oid, PropValue};
  use tempfile::tempdir;

  #[test]
  fn local_file_transport_appends_durably() {
    let dir = tempdir().unwrap();
    let transport = LocalFileTransport::create(dir.path(), 0, 1, 4096).unwrap();
    let writer = WalWriter::new(Box::new(transport));
    let ops = vec![WalOp::VertexInsert { label: 1, oid: Oid::Int64(1), props: vec![("id".into(), PropValue::I64(1))] }];
    writer.append_insert(1, &ops).unwrap();
    let bytes = std::fs::read(dir.path().join("thread_0_1.wal")).unwrap();
    assert!(bytes.len() >= WalHeader::ENCODED_LEN);
    let header = WalHeader::decode(&bytes).unwrap();
    assert_eq!(header.timestamp, 1);
    assert!(!header.is_update);
  }
}
