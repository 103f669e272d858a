//! On-disk/on-wire encoding for WAL records: the fixed header, and the insert/update payload
//! op stream described in §4.J.
//!
//! Deviation from the byte-exact layout sketched in the design notes: label, etype, and
//! property-key identifiers are encoded as little-endian `u32` rather than `u8`, since this
//! engine's `LabelId`/`EtypeId` are `u32` (the design's `label:u8` is illustrative, not a
//! mandated wire width).

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use crate::error::{GraphError, Result};
use crate::types::{DateMillis, DayDate, EtypeId, LabelId, Oid, PropValue, PropValueTag, Timestamp};

/// Top bit of `WalHeader::type_and_length` distinguishes an update record from an insert
/// record; the low 31 bits are the payload length in bytes.
const UPDATE_FLAG: u32 = 1 << 31;
const LENGTH_MASK: u32 = !UPDATE_FLAG;

#[derive(Debug, Clone, Copy)]
pub struct WalHeader {
  pub timestamp: Timestamp,
  pub is_update: bool,
  pub length: u32,
}

impl WalHeader {
  pub const ENCODED_LEN: usize = 8;

  pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
    let mut buf = [0u8; Self::ENCODED_LEN];
    buf[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
    let tl = (self.length & LENGTH_MASK) | if self.is_update { UPDATE_FLAG } else { 0 };
    buf[4..8].copy_from_slice(&tl.to_le_bytes());
    buf
  }

  pub fn decode(buf: &[u8]) -> Result<Self> {
    if buf.len() < Self::ENCODED_LEN {
      return Err(GraphError::internal("WAL header truncated"));
    }
    let timestamp = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let tl = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    Ok(WalHeader {
      timestamp,
      is_update: tl & UPDATE_FLAG != 0,
      length: tl & LENGTH_MASK,
    })
  }
}

/// One staged mutation, in the order transactions append them. Insert transactions only ever
/// produce `VertexInsert`/`EdgeInsert`; update transactions produce the other four, per the
/// Open Question decision recorded in DESIGN.md (the update WAL carries the full mutation log
/// rather than a bare commit marker).
#[derive(Debug, Clone, PartialEq)]
pub enum WalOp {
  VertexInsert {
    label: LabelId,
    oid: Oid,
    props: Vec<(String, PropValue)>,
  },
  EdgeInsert {
    src_label: LabelId,
    src_oid: Oid,
    dst_label: LabelId,
    dst_oid: Oid,
    etype: EtypeId,
    payload: PropValue,
  },
  AddedVertex {
    label: LabelId,
    oid: Oid,
    props: Vec<(String, PropValue)>,
  },
  UpdatedVertexField {
    label: LabelId,
    oid: Oid,
    column: String,
    value: PropValue,
  },
  AddedEdge {
    src_label: LabelId,
    src_oid: Oid,
    dst_label: LabelId,
    dst_oid: Oid,
    etype: EtypeId,
    payload: PropValue,
  },
  UpdatedEdgeData {
    src_label: LabelId,
    src_oid: Oid,
    dst_label: LabelId,
    dst_oid: Oid,
    etype: EtypeId,
    new_payload: PropValue,
  },
}

fn write_oid(buf: &mut Vec<u8>, oid: &Oid) {
  match oid {
    Oid::Int64(v) => {
      buf.push(0);
      buf.write_i64::<LE>(*v).unwrap();
    }
    Oid::Int32(v) => {
      buf.push(1);
      buf.write_i32::<LE>(*v).unwrap();
    }
    Oid::String(s) => {
      buf.push(2);
      buf.write_u32::<LE>(s.len() as u32).unwrap();
      buf.extend_from_slice(s.as_bytes());
    }
  }
}

fn read_oid(cur: &mut &[u8]) -> Result<Oid> {
  let tag = cur.read_u8().map_err(|_| GraphError::internal("truncated oid"))?;
  Ok(match tag {
    0 => Oid::Int64(cur.read_i64::<LE>().map_err(|_| GraphError::internal("truncated oid"))?),
    1 => Oid::Int32(cur.read_i32::<LE>().map_err(|_| GraphError::internal("truncated oid"))?),
    2 => {
      let len = cur.read_u32::<LE>().map_err(|_| GraphError::internal("truncated oid"))? as usize;
      if cur.len() < len {
        return Err(GraphError::internal("truncated oid string"));
      }
      let (s, rest) = cur.split_at(len);
      *cur = rest;
      Oid::String(String::from_utf8_lossy(s).into_owned())
    }
    other => return Err(GraphError::internal(format!("unknown oid tag {other}"))),
  })
}

fn write_propvalue(buf: &mut Vec<u8>, value: &PropValue) {
  buf.push(value.tag() as u8);
  match value {
    PropValue::Bool(v) => buf.push(*v as u8),
    PropValue::U8(v) => buf.push(*v),
    PropValue::U16(v) => buf.write_u16::<LE>(*v).unwrap(),
    PropValue::U32(v) => buf.write_u32::<LE>(*v).unwrap(),
    PropValue::U64(v) => buf.write_u64::<LE>(*v).unwrap(),
    PropValue::I32(v) => buf.write_i32::<LE>(*v).unwrap(),
    PropValue::I64(v) => buf.write_i64::<LE>(*v).unwrap(),
    PropValue::F32(v) => buf.write_f32::<LE>(*v).unwrap(),
    PropValue::F64(v) => buf.write_f64::<LE>(*v).unwrap(),
    PropValue::DateMillis(v) => buf.write_i64::<LE>(v.0).unwrap(),
    PropValue::DayDate(v) => buf.write_i32::<LE>(v.0).unwrap(),
    PropValue::LabelId(v) => buf.write_u32::<LE>(*v).unwrap(),
    PropValue::GlobalId(v) => buf.write_u64::<LE>(*v).unwrap(),
    PropValue::String(s) => {
      buf.write_u32::<LE>(s.len() as u32).unwrap();
      buf.extend_from_slice(s.as_bytes());
    }
    PropValue::Record(items) => {
      buf.write_u32::<LE>(items.len() as u32).unwrap();
      for item in items {
        write_propvalue(buf, item);
      }
    }
    PropValue::Empty => {}
  }
}

fn read_propvalue(cur: &mut &[u8]) -> Result<PropValue> {
  let tag_byte = cur.read_u8().map_err(|_| GraphError::internal("truncated property"))?;
  let tag = PropValueTag::from_u8(tag_byte).ok_or_else(|| GraphError::internal(format!("unknown property tag {tag_byte}")))?;
  let truncated = || GraphError::internal("truncated property payload");
  Ok(match tag {
    PropValueTag::Bool => PropValue::Bool(cur.read_u8().map_err(|_| truncated())? != 0),
    PropValueTag::U8 => PropValue::U8(cur.read_u8().map_err(|_| truncated())?),
    PropValueTag::U16 => PropValue::U16(cur.read_u16::<LE>().map_err(|_| truncated())?),
    PropValueTag::U32 => PropValue::U32(cur.read_u32::<LE>().map_err(|_| truncated())?),
    PropValueTag::U64 => PropValue::U64(cur.read_u64::<LE>().map_err(|_| truncated())?),
    PropValueTag::I32 => PropValue::I32(cur.read_i32::<LE>().map_err(|_| truncated())?),
    PropValueTag::I64 => PropValue::I64(cur.read_i64::<LE>().map_err(|_| truncated())?),
    PropValueTag::F32 => PropValue::F32(cur.read_f32::<LE>().map_err(|_| truncated())?),
    PropValueTag::F64 => PropValue::F64(cur.read_f64::<LE>().map_err(|_| truncated())?),
    PropValueTag::DateMillis => PropValue::DateMillis(DateMillis(cur.read_i64::<LE>().map_err(|_| truncated())?)),
    PropValueTag::DayDate => PropValue::DayDate(DayDate(cur.read_i32::<LE>().map_err(|_| truncated())?)),
    PropValueTag::LabelId => PropValue::LabelId(cur.read_u32::<LE>().map_err(|_| truncated())?),
    PropValueTag::GlobalId => PropValue::GlobalId(cur.read_u64::<LE>().map_err(|_| truncated())?),
    PropValueTag::String => {
      let len = cur.read_u32::<LE>().map_err(|_| truncated())? as usize;
      if cur.len() < len {
        return Err(truncated());
      }
      let (s, rest) = cur.split_at(len);
      *cur = rest;
      PropValue::String(String::from_utf8_lossy(s).into_owned())
    }
    PropValueTag::Record => {
      let len = cur.read_u32::<LE>().map_err(|_| truncated())? as usize;
      let mut items = Vec::with_capacity(len);
      for _ in 0..len {
        items.push(read_propvalue(cur)?);
      }
      PropValue::Record(items)
    }
    PropValueTag::Empty => PropValue::Empty,
  })
}

fn write_props(buf: &mut Vec<u8>, props: &[(String, PropValue)]) {
  buf.write_u32::<LE>(props.len() as u32).unwrap();
  for (name, value) in props {
    buf.write_u32::<LE>(name.len() as u32).unwrap();
    buf.extend_from_slice(name.as_bytes());
    write_propvalue(buf, value);
  }
}

fn read_props(cur: &mut &[u8]) -> Result<Vec<(String, PropValue)>> {
  let truncated = || GraphError::internal("truncated property list");
  let count = cur.read_u32::<LE>().map_err(|_| truncated())? as usize;
  let mut props = Vec::with_capacity(count);
  for _ in 0..count {
    let name_len = cur.read_u32::<LE>().map_err(|_| truncated())? as usize;
    if cur.len() < name_len {
      return Err(truncated());
    }
    let (name_bytes, rest) = cur.split_at(name_len);
    *cur = rest;
    let name = String::from_utf8_lossy(name_bytes).into_owned();
    let value = read_propvalue(cur)?;
    props.push((name, value));
  }
  Ok(props)
}

impl WalOp {
  fn tag(&self) -> u8 {
    match self {
      WalOp::VertexInsert { .. } => 0x00,
      WalOp::EdgeInsert { .. } => 0x01,
      WalOp::AddedVertex { .. } => 0x02,
      WalOp::UpdatedVertexField { .. } => 0x03,
      WalOp::AddedEdge { .. } => 0x04,
      WalOp::UpdatedEdgeData { .. } => 0x05,
    }
  }

  pub fn encode(&self, buf: &mut Vec<u8>) {
    buf.push(self.tag());
    match self {
      WalOp::VertexInsert { label, oid, props } | WalOp::AddedVertex { label, oid, props } => {
        buf.write_u32::<LE>(*label).unwrap();
        write_oid(buf, oid);
        write_props(buf, props);
      }
      WalOp::EdgeInsert { src_label, src_oid, dst_label, dst_oid, etype, payload }
      | WalOp::AddedEdge { src_label, src_oid, dst_label, dst_oid, etype, payload } => {
        buf.write_u32::<LE>(*src_label).unwrap();
        write_oid(buf, src_oid);
        buf.write_u32::<LE>(*dst_label).unwrap();
        write_oid(buf, dst_oid);
        buf.write_u32::<LE>(*etype).unwrap();
        write_propvalue(buf, payload);
      }
      WalOp::UpdatedVertexField { label, oid, column, value } => {
        buf.write_u32::<LE>(*label).unwrap();
        write_oid(buf, oid);
        buf.write_u32::<LE>(column.len() as u32).unwrap();
        buf.extend_from_slice(column.as_bytes());
        write_propvalue(buf, value);
      }
      WalOp::UpdatedEdgeData { src_label, src_oid, dst_label, dst_oid, etype, new_payload } => {
        buf.write_u32::<LE>(*src_label).unwrap();
        write_oid(buf, src_oid);
        buf.write_u32::<LE>(*dst_label).unwrap();
        write_oid(buf, dst_oid);
        buf.write_u32::<LE>(*etype).unwrap();
        write_propvalue(buf, new_payload);
      }
    }
  }

  pub fn decode(cur: &mut &[u8]) -> Result<Self> {
    let truncated = || GraphError::internal("truncated WAL op");
    let tag = cur.read_u8().map_err(|_| truncated())?;
    Ok(match tag {
      0x00 | 0x02 => {
        let label = cur.read_u32::<LE>().map_err(|_| truncated())?;
        let oid = read_oid(cur)?;
        let props = read_props(cur)?;
        if tag == 0x00 {
          WalOp::VertexInsert { label, oid, props }
        } else {
          WalOp::AddedVertex { label, oid, props }
        }
      }
      0x01 | 0x04 => {
        let src_label = cur.read_u32::<LE>().map_err(|_| truncated())?;
        let src_oid = read_oid(cur)?;
        let dst_label = cur.read_u32::<LE>().map_err(|_| truncated())?;
        let dst_oid = read_oid(cur)?;
        let etype = cur.read_u32::<LE>().map_err(|_| truncated())?;
        let payload = read_propvalue(cur)?;
        if tag == 0x01 {
          WalOp::EdgeInsert { src_label, src_oid, dst_label, dst_oid, etype, payload }
        } else {
          WalOp::AddedEdge { src_label, src_oid, dst_label, dst_oid, etype, payload }
        }
      }
      0x03 => {
        let label = cur.read_u32::<LE>().map_err(|_| truncated())?;
        let oid = read_oid(cur)?;
        let col_len = cur.read_u32::<LE>().map_err(|_| truncated())? as usize;
        if cur.len() < col_len {
          return Err(truncated());
        }
        let (col_bytes, rest) = cur.split_at(col_len);
        *cur = rest;
        let column = String::from_utf8_lossy(col_bytes).into_owned();
        let value = read_propvalue(cur)?;
        WalOp::UpdatedVertexField { label, oid, column, value }
      }
      0x05 => {
        let src_label = cur.read_u32::<LE>().map_err(|_| truncated())?;
        let src_oid = read_oid(cur)?;
        let dst_label = cur.read_u32::<LE>().map_err(|_| truncated())?;
        let dst_oid = read_oid(cur)?;
        let etype = cur.read_u32::<LE>().map_err(|_| truncated())?;
        let new_payload = read_propvalue(cur)?;
        WalOp::UpdatedEdgeData { src_label, src_oid, dst_label, dst_oid, etype, new_payload }
      }
      other => return Err(GraphError::internal(format!("unknown WAL op tag {other}"))),
    })
  }
}

/// Encode a full ordered op list as one record payload (the body following a `WalHeader`).
pub fn encode_ops(ops: &[WalOp]) -> Vec<u8> {
  let mut buf = Vec::new();
  for op in ops {
    op.encode(&mut buf);
  }
  buf
}

/// Decode a full op list from a record payload, consuming it to the end.
pub fn decode_ops(mut payload: &[u8]) -> Result<Vec<WalOp>> {
  let mut ops = Vec::new();
  while !payload.is_empty() {
    ops.push(WalOp::decode(&mut payload)?);
  }
  Ok(ops)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_round_trips_insert_and_update_flag() {
    let h = WalHeader { timestamp: 7, is_update: false, length: 123 };
    let decoded = WalHeader::decode(&h.encode()).unwrap();
    assert_eq!(decoded.timestamp, 7);
    assert!(!decoded.is_update);
    assert_eq!(decoded.length, 123);

    let h = WalHeader { timestamp: 9, is_update: true, length: 0 };
    let decoded = WalHeader::decode(&h.encode()).unwrap();
    assert!(decoded.is_update);
    assert_eq!(decoded.length, 0);
  }

  #[test]
  fn op_list_round_trips_through_encode_decode() {
    let ops = vec![
      WalOp::VertexInsert {
        label: 1,
        oid: Oid::Int64(42),
        props: vec![("id".into(), PropValue::I64(42)), ("name".into(), PropValue::String("a".into()))],
      },
      WalOp::EdgeInsert {
        src_label: 1,
        src_oid: Oid::Int64(1),
        dst_label: 1,
        dst_oid: Oid::Int64(2),
        etype: 1,
        payload: PropValue::I64(100),
      },
      WalOp::UpdatedVertexField {
        label: 1,
        oid: Oid::Int64(1),
        column: "name".into(),
        value: PropValue::String("renamed".into()),
      },
    ];
    let bytes = encode_ops(&ops);
    let decoded = decode_ops(&bytes).unwrap();
    assert_eq!(decoded, ops);
  }
}
