//! Monotonic-timestamp version manager: issues commit timestamps and coordinates the
//! read / insert / update phases described in §4.I of the design.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::constants::{VERSION_RING_MASK, VERSION_RING_SIZE, VERSION_SPIN_BACKOFF_MICROS};
use crate::types::Timestamp;

/// Out-of-order insert-completion tracker: `release_insert` for a timestamp that isn't the
/// immediate successor of `read_ts` records its arrival here instead of advancing `read_ts`,
/// so a later release of the actual gap-filler can collapse the whole run of now-contiguous
/// bits at once.
struct CompletionRing {
  bits: Vec<bool>,
}

impl CompletionRing {
  fn new() -> Self {
    CompletionRing {
      bits: vec![false; VERSION_RING_SIZE as usize],
    }
  }

  fn set(&mut self, ts: Timestamp) {
    self.bits[(ts & VERSION_RING_MASK) as usize] = true;
  }

  /// Starting from `read_ts + 1`, clear and count every consecutively-set bit.
  fn drain_from(&mut self, read_ts: Timestamp) -> Timestamp {
    let mut ts = read_ts;
    loop {
      let next = ts.wrapping_add(1);
      let slot = (next & VERSION_RING_MASK) as usize;
      if !self.bits[slot] {
        break;
      }
      self.bits[slot] = false;
      ts = next;
    }
    ts
  }
}

/// Issues monotonic timestamps and tracks which of them are durable-in-memory and visible.
///
/// `pending_reqs` counts outstanding read/insert acquisitions. An update acquisition subtracts
/// `thread_num` from it up front and spins until it bottoms out at `-thread_num`, which is the
/// signal that every read/insert in flight at that moment has released; new acquisitions that
/// observe a negative count back off and retry rather than proceed concurrently with the drain.
pub struct VersionManager {
  write_ts: AtomicU32,
  read_ts: AtomicU32,
  pending_reqs: AtomicI32,
  pending_update: AtomicBool,
  buf: Mutex<CompletionRing>,
  thread_num: i32,
}

impl VersionManager {
  pub fn new(thread_num: usize) -> Self {
    VersionManager {
      write_ts: AtomicU32::new(1),
      read_ts: AtomicU32::new(0),
      pending_reqs: AtomicI32::new(0),
      pending_update: AtomicBool::new(false),
      buf: Mutex::new(CompletionRing::new()),
      thread_num: thread_num.max(1) as i32,
    }
  }

  /// Seeds `read_ts`/`write_ts` from a replayed WAL so newly-issued timestamps continue past
  /// whatever was last durably committed.
  pub fn seed(&self, read_ts: Timestamp, write_ts: Timestamp) {
    self.read_ts.store(read_ts, Ordering::SeqCst);
    self.write_ts.store(write_ts, Ordering::SeqCst);
  }

  pub fn read_ts(&self) -> Timestamp {
    self.read_ts.load(Ordering::Acquire)
  }

  fn backoff() {
    std::thread::sleep(Duration::from_micros(VERSION_SPIN_BACKOFF_MICROS));
  }

  /// Spin until `pending_reqs >= 0` (no update is draining), then claim one slot.
  fn claim_slot(&self) {
    loop {
      let current = self.pending_reqs.load(Ordering::Acquire);
      if current >= 0
        && self
          .pending_reqs
          .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
          .is_ok()
      {
        return;
      }
      Self::backoff();
    }
  }

  pub fn acquire_read(&self) -> Timestamp {
    self.claim_slot();
    self.read_ts()
  }

  pub fn release_read(&self) {
    self.pending_reqs.fetch_sub(1, Ordering::AcqRel);
  }

  /// Claims a read/insert slot and hands out the next write timestamp.
  pub fn acquire_insert(&self) -> Timestamp {
    self.claim_slot();
    self.write_ts.fetch_add(1, Ordering::SeqCst)
  }

  /// Linearization point for visibility: advances `read_ts` only when no gap remains at or
  /// below `ts`; otherwise records `ts`'s completion for a later release to collapse.
  pub fn release_insert(&self, ts: Timestamp) {
    let current_read = self.read_ts.load(Ordering::Acquire);
    if ts == current_read.wrapping_add(1) {
      let mut buf = self.buf.lock();
      let advanced = buf.drain_from(ts);
      self.read_ts.store(advanced, Ordering::Release);
    } else {
      self.buf.lock().set(ts);
    }
    self.pending_reqs.fetch_sub(1, Ordering::AcqRel);
  }

  /// Drains every outstanding read/insert acquisition, then hands out the next write timestamp
  /// for exclusive use. Blocks (with backoff) until any other in-flight update finishes and
  /// until the drain completes.
  pub fn acquire_update(&self) -> Timestamp {
    while self
      .pending_update
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
      .is_err()
    {
      Self::backoff();
    }
    self.pending_reqs.fetch_sub(self.thread_num, Ordering::AcqRel);
    while self.pending_reqs.load(Ordering::Acquire) != -self.thread_num {
      Self::backoff();
    }
    self.write_ts.fetch_add(1, Ordering::SeqCst)
  }

  /// Commits the update: its timestamp becomes the new `read_ts` and exclusive access is
  /// released.
  pub fn release_update(&self, ts: Timestamp) {
    self.read_ts.store(ts, Ordering::Release);
    self.pending_reqs.fetch_add(self.thread_num, Ordering::AcqRel);
    self.pending_update.store(false, Ordering::Release);
  }

  /// Discards an acquired-but-unused update timestamp. Rolls `write_ts` back to `ts` only if
  /// nothing has advanced past `ts + 1` in the meantime; either way, releases exclusive access
  /// without advancing `read_ts` (nothing committed).
  pub fn revert_update(&self, ts: Timestamp) -> bool {
    let rolled_back = self
      .write_ts
      .compare_exchange(ts.wrapping_add(1), ts, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok();
    self.pending_reqs.fetch_add(self.thread_num, Ordering::AcqRel);
    self.pending_update.store(false, Ordering::Release);
    rolled_back
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  #[test]
  fn timestamps_are_strictly_increasing() {
    let vm = VersionManager::new(1);
    let t1 = vm.acquire_insert();
    let t2 = vm.acquire_insert();
    assert!(t2 > t1);
  }

  #[test]
  fn gap_free_publication_blocks_on_missing_predecessor() {
    // S5: two inserts acquire T1=1, T2=2; T2 releases first, read_ts stays at 0 until T1
    // releases, then jumps straight to 2.
    let vm = VersionManager::new(1);
    let t1 = vm.acquire_insert();
    let t2 = vm.acquire_insert();
    assert_eq!((t1, t2), (1, 2));
    vm.release_insert(t2);
    assert_eq!(vm.read_ts(), 0);
    vm.release_insert(t1);
    assert_eq!(vm.read_ts(), 2);
  }

  #[test]
  fn update_drains_outstanding_acquisitions() {
    let vm = Arc::new(VersionManager::new(2));
    let vm2 = Arc::clone(&vm);
    let t_read = vm.acquire_read();
    let handle = std::thread::spawn(move || {
      let ts = vm2.acquire_update();
      vm2.release_update(ts);
    });
    std::thread::sleep(Duration::from_millis(5));
    vm.release_read();
    handle.join().unwrap();
    assert!(vm.read_ts() >= t_read);
  }

  #[test]
  fn revert_update_does_not_advance_read_ts() {
    let vm = VersionManager::new(1);
    let before = vm.read_ts();
    let ts = vm.acquire_update();
    assert!(vm.revert_update(ts));
    assert_eq!(vm.read_ts(), before);
  }

  #[test]
  fn seed_continues_timestamps_after_wal_replay() {
    let vm = VersionManager::new(1);
    vm.seed(41, 42);
    assert_eq!(vm.read_ts(), 41);
    assert_eq!(vm.acquire_insert(), 42);
  }
}
