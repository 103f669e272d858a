//! Primary-key indexers: a single-threaded building indexer used during bulk load, and a
//! lock-free serving indexer built from it once load completes.

use std::sync::atomic::{AtomicU32, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::constants::{BUILD_INDEXER_MAX_LOAD, LF_INDEXER_DEFAULT_RATE};
use crate::types::{Oid, Vid, VID_SENTINEL};

fn hash_oid(oid: &Oid) -> u64 {
  match oid {
    // Matches the splitmix64 finalizer the original engine uses for integer keys.
    Oid::Int64(v) => splitmix64(*v as u64),
    Oid::Int32(v) => splitmix64(*v as u64),
    Oid::String(s) => xxhash_rust::xxh64::xxh64(s.as_bytes(), 0),
  }
}

fn splitmix64(mut x: u64) -> u64 {
  x ^= x >> 30;
  x = x.wrapping_mul(0xbf58476d1ce4e5b9);
  x ^= x >> 27;
  x = x.wrapping_mul(0x94d049bb133111eb);
  x ^= x >> 31;
  x
}

/// Single-threaded, open-addressed hash map used while bulk-loading a label. Built on
/// `hashbrown` (this crate's `HashMap`) for the open-addressed table itself, with an explicit
/// dense `keys` array kept alongside so it can be handed directly to `LfIndexer::build`.
pub struct IdIndexer {
  table: HashMap<Oid, Vid>,
  keys: Vec<Oid>,
}

impl IdIndexer {
  pub fn new() -> Self {
    IdIndexer {
      table: HashMap::new(),
      keys: Vec::new(),
    }
  }

  pub fn with_capacity(cap: usize) -> Self {
    IdIndexer {
      table: HashMap::with_capacity(cap),
      keys: Vec::with_capacity(cap),
    }
  }

  /// Insert `key` if absent, assigning the next dense vid; returns `(vid, inserted)`.
  pub fn add(&mut self, key: Oid) -> (Vid, bool) {
    if let Some(&vid) = self.table.get(&key) {
      return (vid, false);
    }
    let vid = self.keys.len() as Vid;
    self.keys.push(key.clone());
    self.table.insert(key, vid);
    if self.load_factor() > BUILD_INDEXER_MAX_LOAD {
      self.table.shrink_to_fit(); // hashbrown rehashes internally past its own load factor
    }
    (vid, true)
  }

  pub fn get(&self, key: &Oid) -> Option<Vid> {
    self.table.get(key).copied()
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  pub fn keys(&self) -> &[Oid] {
    &self.keys
  }

  fn load_factor(&self) -> f64 {
    self.keys.len() as f64 / self.table.capacity().max(1) as f64
  }
}

impl Default for IdIndexer {
  fn default() -> Self {
    Self::new()
  }
}

/// Lock-free (for readers) serving indexer built from an `IdIndexer` once bulk load completes.
/// `keys` is a dense, vid-indexed array; `indices` is an open-addressed table of `AtomicU32`
/// cells holding either a vid or `VID_SENTINEL`. Insert publishes `keys[vid]` before the CAS
/// that makes the vid visible through `indices`, so a reader that observes the vid can always
/// safely read the key back.
pub struct LfIndexer {
  keys: RwLock<Vec<Oid>>,
  indices: Vec<AtomicU32>,
  next_vid: AtomicU32,
  capacity: usize,
}

impl LfIndexer {
  /// Build a serving indexer from a completed `IdIndexer`, sized so the load factor never
  /// exceeds `rate` (default `LF_INDEXER_DEFAULT_RATE`).
  pub fn build(building: &IdIndexer, rate: f64) -> Self {
    let rate = if rate <= 0.0 { LF_INDEXER_DEFAULT_RATE } else { rate };
    let capacity = ((building.len() as f64 / rate).ceil() as usize)
      .max(building.len() + 1)
      .next_power_of_two()
      .max(16);
    let indexer = LfIndexer {
      keys: RwLock::new(building.keys().to_vec()),
      indices: (0..capacity).map(|_| AtomicU32::new(VID_SENTINEL)).collect(),
      next_vid: AtomicU32::new(building.len() as u32),
      capacity,
    };
    for (vid, key) in building.keys().iter().enumerate() {
      indexer.publish(key, vid as Vid);
    }
    indexer
  }

  /// An empty serving indexer sized to expect roughly `expected_len` eventual entries.
  pub fn with_capacity(expected_len: usize, rate: f64) -> Self {
    let rate = if rate <= 0.0 { LF_INDEXER_DEFAULT_RATE } else { rate };
    let capacity = ((expected_len.max(1) as f64 / rate).ceil() as usize)
      .next_power_of_two()
      .max(16);
    LfIndexer {
      keys: RwLock::new(Vec::with_capacity(expected_len)),
      indices: (0..capacity).map(|_| AtomicU32::new(VID_SENTINEL)).collect(),
      next_vid: AtomicU32::new(0),
      capacity,
    }
  }

  fn probe_start(&self, key: &Oid) -> usize {
    (hash_oid(key) as usize) & (self.capacity - 1)
  }

  fn publish(&self, key: &Oid, vid: Vid) {
    let mut slot = self.probe_start(key);
    loop {
      match self.indices[slot].compare_exchange(
        VID_SENTINEL,
        vid,
        Ordering::Release,
        Ordering::Relaxed,
      ) {
        Ok(_) => return,
        Err(_) => slot = (slot + 1) & (self.capacity - 1),
      }
    }
  }

  /// Single-writer insert: allocate the next dense vid, record the key, then publish it into
  /// the open-addressed table.
  pub fn insert(&self, key: Oid) -> Vid {
    let vid = self.next_vid.fetch_add(1, Ordering::SeqCst);
    {
      let mut keys = self.keys.write();
      if keys.len() <= vid as usize {
        keys.resize(vid as usize + 1, Oid::Int64(0));
      }
      keys[vid as usize] = key.clone();
    }
    self.publish(&key, vid);
    vid
  }

  /// Concurrent, lock-free read: probe from the key's home slot until either the key is found
  /// or a sentinel cell ends the probe chain.
  pub fn get(&self, key: &Oid) -> Option<Vid> {
    let mut slot = self.probe_start(key);
    let keys = self.keys.read();
    loop {
      let vid = self.indices[slot].load(Ordering::Acquire);
      if vid == VID_SENTINEL {
        return None;
      }
      if keys.get(vid as usize) == Some(key) {
        return Some(vid);
      }
      slot = (slot + 1) & (self.capacity - 1);
    }
  }

  pub fn key_of(&self, vid: Vid) -> Option<Oid> {
    self.keys.read().get(vid as usize).cloned()
  }

  pub fn len(&self) -> usize {
    self.next_vid.load(Ordering::SeqCst) as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn building_indexer_assigns_dense_sequential_vids() {
    let mut idx = IdIndexer::new();
    let (v0, inserted0) = idx.add(Oid::Int64(42));
    let (v1, inserted1) = idx.add(Oid::Int64(7));
    let (v0_again, inserted_again) = idx.add(Oid::Int64(42));
    assert_eq!(v0, 0);
    assert_eq!(v1, 1);
    assert!(inserted0 && inserted1);
    assert_eq!(v0_again, 0);
    assert!(!inserted_again);
  }

  #[test]
  fn lf_indexer_build_preserves_bijection() {
    let mut building = IdIndexer::new();
    for i in 0..200i64 {
      building.add(Oid::Int64(i));
    }
    let lf = LfIndexer::build(&building, 0.8);
    for i in 0..200i64 {
      let vid = lf.get(&Oid::Int64(i)).unwrap();
      assert_eq!(lf.key_of(vid), Some(Oid::Int64(i)));
    }
    assert_eq!(lf.get(&Oid::Int64(9999)), None);
  }

  #[test]
  fn lf_indexer_concurrent_insert_and_get() {
    use std::sync::Arc;
    let lf = Arc::new(LfIndexer::with_capacity(1000, 0.8));
    let mut handles = vec![];
    for t in 0..8 {
      let lf = Arc::clone(&lf);
      handles.push(std::thread::spawn(move || {
        for i in 0..50 {
          let key = Oid::Int64(t * 50 + i);
          let vid = lf.insert(key.clone());
          assert_eq!(lf.get(&key), Some(vid));
        }
      }));
    }
    for h in handles {
      h.join().unwrap();
    }
    assert_eq!(lf.len(), 400);
  }
}
