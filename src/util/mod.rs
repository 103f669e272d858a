//! Low-level building blocks shared by the storage and WAL layers.

pub mod arena;
pub mod lock;
pub mod mmap_array;

pub use arena::Arena;
pub use lock::{FileLock, LockType};
pub use mmap_array::MmapArray;
