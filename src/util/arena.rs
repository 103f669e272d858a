//! Bump-allocated scratch space for growing CSR adjacency chunks.
//!
//! Matches the allocator the mutable CSR relies on for `Multiple`-strategy growth: allocations
//! are never individually freed, the whole arena is torn down (and any registered destructors
//! run) together, and an old chunk stays valid for any reader holding a pointer into it for as
//! long as the arena that produced it is alive.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::constants::ARENA_CHUNK_SIZE;

struct RawChunk {
  ptr: NonNull<u8>,
  layout: Layout,
}

// SAFETY: chunks are never aliased mutably once handed out; the arena only ever bumps a cursor
// forward within a chunk it exclusively owns.
unsafe impl Send for RawChunk {}

struct Destructor {
  run: Box<dyn FnOnce() + Send>,
}

struct ArenaState {
  chunks: Vec<RawChunk>,
  /// Offset of the next free byte within `chunks.last()`.
  cursor: usize,
  destructors: Vec<Destructor>,
}

impl ArenaState {
  fn new() -> Self {
    ArenaState {
      chunks: Vec::new(),
      cursor: 0,
      destructors: Vec::new(),
    }
  }

  fn current_chunk_remaining(&self) -> usize {
    match self.chunks.last() {
      Some(chunk) => chunk.layout.size() - self.cursor,
      None => 0,
    }
  }

  fn push_chunk(&mut self, min_size: usize) -> std::io::Result<()> {
    let size = min_size.max(ARENA_CHUNK_SIZE);
    let layout = Layout::from_size_align(size, 16)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    // SAFETY: layout has a non-zero size.
    let raw = unsafe { alloc(layout) };
    let ptr = NonNull::new(raw)
      .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::OutOfMemory, "arena allocation failed"))?;
    self.chunks.push(RawChunk { ptr, layout });
    self.cursor = 0;
    Ok(())
  }
}

impl Drop for ArenaState {
  fn drop(&mut self) {
    for d in self.destructors.drain(..) {
      (d.run)();
    }
    for chunk in self.chunks.drain(..) {
      // SAFETY: layout matches the one used in `alloc`.
      unsafe { dealloc(chunk.ptr.as_ptr(), chunk.layout) };
    }
  }
}

/// Bump allocator with 4096-byte chunk granularity. Thread-safe: concurrent single-vertex and
/// single-edge insert transactions may grow adjacency chunks for different source vids at the
/// same time out of the same session-owned arena pool.
pub struct Arena {
  state: Mutex<ArenaState>,
}

impl Arena {
  pub fn new() -> Self {
    Arena {
      state: Mutex::new(ArenaState::new()),
    }
  }

  /// Allocate `n` raw, zero-initialized bytes, 16-byte aligned. Never shrinks or frees
  /// individually; the region stays valid for the arena's full lifetime.
  pub fn allocate(&self, n: usize) -> NonNull<u8> {
    let mut state = self.state.lock();
    if state.current_chunk_remaining() < n {
      state
        .push_chunk(n)
        .expect("arena allocation failed: out of memory");
    }
    let chunk = state.chunks.last().expect("chunk just pushed");
    let offset = state.cursor;
    // SAFETY: offset + n <= chunk size, guaranteed by the remaining-space check above.
    let ptr = unsafe { NonNull::new_unchecked(chunk.ptr.as_ptr().add(offset)) };
    unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, n) };
    state.cursor += n;
    ptr
  }

  /// Allocate room for `count` elements of `stride` bytes each, and register `dtor` to run
  /// (once, on arena drop) against the returned region reinterpreted as `count` instances of
  /// whatever non-trivial type the caller stored there. Used for scratch that isn't plain
  /// `Copy` data (e.g. staged `PropValue::Record` scratch during an update transaction).
  pub fn allocate_typed<F>(&self, stride: usize, count: usize, dtor: F) -> NonNull<u8>
  where
    F: FnOnce() + Send + 'static,
  {
    let ptr = self.allocate(stride * count);
    let mut state = self.state.lock();
    state.destructors.push(Destructor { run: Box::new(dtor) });
    ptr
  }

  /// Zeroed scratch for `len` `u32`s. No destructor is registered: `u32` has no drop glue, so
  /// the memory is simply abandoned with the rest of the arena. Used by the bulk insert
  /// transaction to accumulate per-triplet degree counts while staging rows, instead of growing
  /// a `Vec` per triplet across a possibly large staged batch.
  pub fn alloc_u32_slice(&self, len: usize) -> &mut [u32] {
    let ptr = self.allocate(len * std::mem::size_of::<u32>());
    // SAFETY: `ptr` came from this call alone, is 16-byte aligned (stricter than `u32`'s),
    // zero-initialized, and points into a chunk the arena keeps alive for its own lifetime.
    unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr() as *mut u32, len) }
  }
}

impl Default for Arena {
  fn default() -> Self {
    Self::new()
  }
}

// SAFETY: all mutable state lives behind the internal mutex.
unsafe impl Sync for Arena {}
