//! Shared scalar and tagged-union types used across the storage, WAL, and transaction layers.

use std::fmt;

/// Dense, per-label internal vertex index. Never reused once assigned.
pub type Vid = u32;
/// Sentinel meaning "vertex not yet allocated" — used by single-vertex insert transactions to
/// stand in for the staged vertex's own id before `commit()` allocates a real one.
pub const VID_SENTINEL: Vid = u32::MAX;

/// 64-bit global id: `(label << 56) | vid`.
pub type Gid = u64;

pub type LabelId = u32;
pub type EtypeId = u32;
pub type PropKeyId = u32;
pub type TxId = u64;

/// Monotonic commit timestamp. `TS_MAX` means "not yet published".
pub type Timestamp = u32;
pub const TS_MAX: Timestamp = u32::MAX;

pub fn make_gid(label: LabelId, vid: Vid) -> Gid {
  ((label as u64) << 56) | (vid as u64)
}

pub fn gid_label(gid: Gid) -> LabelId {
  (gid >> 56) as LabelId
}

pub fn gid_vid(gid: Gid) -> Vid {
  (gid & 0x00FF_FFFF_FFFF_FFFF) as Vid
}

/// A date represented as milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateMillis(pub i64);

/// A date packed into a single `i32` as `year*10000 + month*100 + day`, matching the compact
/// on-disk encoding the original engine uses for calendar-only columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayDate(pub i32);

impl DayDate {
  pub fn new(year: i32, month: u32, day: u32) -> Self {
    DayDate(year * 10_000 + month as i32 * 100 + day as i32)
  }

  pub fn year(self) -> i32 {
    self.0 / 10_000
  }

  pub fn month(self) -> u32 {
    ((self.0 / 100) % 100) as u32
  }

  pub fn day(self) -> u32 {
    (self.0 % 100) as u32
  }
}

/// Discriminant for `PropValue`, stable across the WAL encoding and the on-disk column metadata
/// files — this is the byte written as a column's `.meta` type tag and as each WAL property op's
/// type prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropValueTag {
  Bool = 0,
  U8 = 1,
  U16 = 2,
  U32 = 3,
  U64 = 4,
  I32 = 5,
  I64 = 6,
  F32 = 7,
  F64 = 8,
  DateMillis = 9,
  DayDate = 10,
  LabelId = 11,
  GlobalId = 12,
  String = 13,
  Record = 14,
  Empty = 15,
}

impl PropValueTag {
  pub fn from_u8(b: u8) -> Option<Self> {
    use PropValueTag::*;
    Some(match b {
      0 => Bool,
      1 => U8,
      2 => U16,
      3 => U32,
      4 => U64,
      5 => I32,
      6 => I64,
      7 => F32,
      8 => F64,
      9 => DateMillis,
      10 => DayDate,
      11 => LabelId,
      12 => GlobalId,
      13 => String,
      14 => Record,
      15 => Empty,
      _ => return None,
    })
  }

  /// Byte width of the fixed-width in-memory representation, or `None` for variable-width /
  /// composite variants (string, record, empty).
  pub fn fixed_width(self) -> Option<usize> {
    use PropValueTag::*;
    match self {
      Bool | U8 => Some(1),
      U16 => Some(2),
      U32 | I32 | F32 | DayDate | LabelId => Some(4),
      U64 | I64 | F64 | DateMillis | GlobalId => Some(8),
      String | Record | Empty => None,
    }
  }
}

/// Tagged union of every property value the engine can store, matching `PropValueTag` 1:1.
/// This is the boundary type: columns store typed, variant-free data internally and only
/// box/unbox into `PropValue` at the transaction/API surface.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
  Bool(bool),
  U8(u8),
  U16(u16),
  U32(u32),
  U64(u64),
  I32(i32),
  I64(i64),
  F32(f32),
  F64(f64),
  DateMillis(DateMillis),
  DayDate(DayDate),
  LabelId(LabelId),
  GlobalId(Gid),
  String(String),
  Record(Vec<PropValue>),
  Empty,
}

impl PropValue {
  pub fn tag(&self) -> PropValueTag {
    match self {
      PropValue::Bool(_) => PropValueTag::Bool,
      PropValue::U8(_) => PropValueTag::U8,
      PropValue::U16(_) => PropValueTag::U16,
      PropValue::U32(_) => PropValueTag::U32,
      PropValue::U64(_) => PropValueTag::U64,
      PropValue::I32(_) => PropValueTag::I32,
      PropValue::I64(_) => PropValueTag::I64,
      PropValue::F32(_) => PropValueTag::F32,
      PropValue::F64(_) => PropValueTag::F64,
      PropValue::DateMillis(_) => PropValueTag::DateMillis,
      PropValue::DayDate(_) => PropValueTag::DayDate,
      PropValue::LabelId(_) => PropValueTag::LabelId,
      PropValue::GlobalId(_) => PropValueTag::GlobalId,
      PropValue::String(_) => PropValueTag::String,
      PropValue::Record(_) => PropValueTag::Record,
      PropValue::Empty => PropValueTag::Empty,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      PropValue::I64(v) => Some(*v),
      PropValue::I32(v) => Some(*v as i64),
      PropValue::U64(v) => Some(*v as i64),
      PropValue::U32(v) => Some(*v as i64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      PropValue::String(s) => Some(s.as_str()),
      _ => None,
    }
  }
}

impl fmt::Display for PropValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PropValue::Bool(v) => write!(f, "{v}"),
      PropValue::U8(v) => write!(f, "{v}"),
      PropValue::U16(v) => write!(f, "{v}"),
      PropValue::U32(v) => write!(f, "{v}"),
      PropValue::U64(v) => write!(f, "{v}"),
      PropValue::I32(v) => write!(f, "{v}"),
      PropValue::I64(v) => write!(f, "{v}"),
      PropValue::F32(v) => write!(f, "{v}"),
      PropValue::F64(v) => write!(f, "{v}"),
      PropValue::DateMillis(v) => write!(f, "{}", v.0),
      PropValue::DayDate(v) => write!(f, "{}-{:02}-{:02}", v.year(), v.month(), v.day()),
      PropValue::LabelId(v) => write!(f, "label:{v}"),
      PropValue::GlobalId(v) => write!(f, "gid:{v}"),
      PropValue::String(v) => write!(f, "{v}"),
      PropValue::Record(vs) => write!(f, "({})", vs.len()),
      PropValue::Empty => write!(f, "<empty>"),
    }
  }
}

/// Per-triplet-direction storage strategy for edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeStrategy {
  /// The direction is not maintained at all.
  None,
  /// At most one edge per source vid; a new edge overwrites the previous one.
  Single,
  /// Zero or more edges per source vid, stored as a chunked adjacency list.
  Multiple,
}

/// Primary-key column type, declared per vertex label by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PkType {
  Int64,
  Int32,
  String,
}

/// A primary-key value, typed per `PkType`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Oid {
  Int64(i64),
  Int32(i32),
  String(String),
}

impl fmt::Display for Oid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Oid::Int64(v) => write!(f, "{v}"),
      Oid::Int32(v) => write!(f, "{v}"),
      Oid::String(v) => write!(f, "{v}"),
    }
  }
}

/// Reinterprets a fixed-width scalar `PropValue` as the `u64` bits a CSR adjacency entry stores
/// inline. Panics on `String`/`Record`/`Empty` — those payloads never reach a CSR entry
/// directly; `Empty` triplets skip encoding entirely and string triplets route through the
/// dual-CSR's shared string column instead.
pub fn encode_fixed_bits(value: &PropValue) -> u64 {
  match value {
    PropValue::Bool(v) => *v as u64,
    PropValue::U8(v) => *v as u64,
    PropValue::U16(v) => *v as u64,
    PropValue::U32(v) => *v as u64,
    PropValue::U64(v) => *v,
    PropValue::I32(v) => (*v as i64) as u64,
    PropValue::I64(v) => *v as u64,
    PropValue::F32(v) => (v.to_bits() as u64),
    PropValue::F64(v) => v.to_bits(),
    PropValue::DateMillis(v) => v.0 as u64,
    PropValue::DayDate(v) => v.0 as u64,
    PropValue::LabelId(v) => *v as u64,
    PropValue::GlobalId(v) => *v,
    PropValue::String(_) | PropValue::Record(_) | PropValue::Empty => {
      panic!("encode_fixed_bits called on a non-fixed-width payload")
    }
  }
}

/// Inverse of `encode_fixed_bits`: reinterprets `bits` as a `PropValue` of the given tag.
pub fn decode_fixed_bits(tag: PropValueTag, bits: u64) -> PropValue {
  match tag {
    PropValueTag::Bool => PropValue::Bool(bits != 0),
    PropValueTag::U8 => PropValue::U8(bits as u8),
    PropValueTag::U16 => PropValue::U16(bits as u16),
    PropValueTag::U32 => PropValue::U32(bits as u32),
    PropValueTag::U64 => PropValue::U64(bits),
    PropValueTag::I32 => PropValue::I32(bits as i64 as i32),
    PropValueTag::I64 => PropValue::I64(bits as i64),
    PropValueTag::F32 => PropValue::F32(f32::from_bits(bits as u32)),
    PropValueTag::F64 => PropValue::F64(f64::from_bits(bits)),
    PropValueTag::DateMillis => PropValue::DateMillis(DateMillis(bits as i64)),
    PropValueTag::DayDate => PropValue::DayDate(DayDate(bits as i32)),
    PropValueTag::LabelId => PropValue::LabelId(bits as u32),
    PropValueTag::GlobalId => PropValue::GlobalId(bits),
    PropValueTag::String | PropValueTag::Record | PropValueTag::Empty => {
      PropValue::Empty
    }
  }
}

/// `(src-label, edge-label, dst-label)` — keys the dual-CSR registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triplet {
  pub src_label: LabelId,
  pub etype: EtypeId,
  pub dst_label: LabelId,
}

impl Triplet {
  pub fn new(src_label: LabelId, etype: EtypeId, dst_label: LabelId) -> Self {
    Triplet {
      src_label,
      etype,
      dst_label,
    }
  }

  pub fn reversed(self) -> Self {
    Triplet {
      src_label: self.dst_label,
      etype: self.etype,
      dst_label: self.src_label,
    }
  }
}
