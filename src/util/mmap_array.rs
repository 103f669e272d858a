//! File-or-anonymous-backed typed arrays.
//!
//! Columns and CSR backing stores are all, ultimately, one of these. Growth for anonymous
//! arrays reallocates in place; growth for file-backed arrays truncates the file and remaps.
//! Nothing here bounds-checks — `vid`/`row` indices are pre-established valid by the owning
//! column or CSR before it ever calls into this layer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;

use crate::error::{GraphError, Result};

enum Backing<T> {
  /// In-memory only; grows by reallocating the `Vec`.
  Anon(Vec<T>),
  /// Read-only memory map of an existing file.
  ReadOnly {
    #[allow(dead_code)]
    mmap: memmap2::Mmap,
    ptr: *const T,
    len: usize,
  },
  /// Writable memory map backing a file on disk; `resize` truncates and remaps.
  ReadWrite {
    file: File,
    mmap: memmap2::MmapMut,
    len: usize,
    _marker: PhantomData<T>,
  },
}

/// A typed array that can be backed by anonymous memory, a read-only mmap, or a growable
/// file-backed mmap. `T` must be a plain-old-data type: no destructors, no interior pointers.
pub struct MmapArray<T: Copy> {
  backing: Backing<T>,
}

impl<T: Copy + Default> MmapArray<T> {
  /// An in-memory array of `len` default-initialized elements.
  pub fn new_anon(len: usize) -> Self {
    MmapArray {
      backing: Backing::Anon(vec![T::default(); len]),
    }
  }

  /// Memory-map `path` read-only and expose it as `&[T]`.
  pub fn open_for_read<P: AsRef<Path>>(path: P) -> Result<Self> {
    let file = File::open(path.as_ref())?;
    let file_len = file.metadata()?.len() as usize;
    let elem_size = std::mem::size_of::<T>().max(1);
    if file_len % elem_size != 0 {
      return Err(GraphError::Corrupt {
        path: path.as_ref().to_path_buf(),
        reason: format!("file length {file_len} is not a multiple of element size {elem_size}"),
      });
    }
    let len = file_len / elem_size;
    // SAFETY: the file is not concurrently truncated by this process; callers open arrays
    // from an immutable snapshot directory.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    let ptr = mmap.as_ptr() as *const T;
    Ok(MmapArray {
      backing: Backing::ReadOnly { mmap, ptr, len },
    })
  }

  /// Create (or truncate) a file-backed, writable array of `len` elements.
  pub fn create_for_write<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(true)
      .open(path.as_ref())?;
    let byte_len = (len * std::mem::size_of::<T>()).max(1);
    file.set_len(byte_len as u64)?;
    // SAFETY: file was just sized to byte_len and is exclusively owned by this array.
    let mmap = unsafe { memmap2::MmapMut::map_mut(&file)? };
    Ok(MmapArray {
      backing: Backing::ReadWrite {
        file,
        mmap,
        len,
        _marker: PhantomData,
      },
    })
  }

  pub fn size(&self) -> usize {
    match &self.backing {
      Backing::Anon(v) => v.len(),
      Backing::ReadOnly { len, .. } => *len,
      Backing::ReadWrite { len, .. } => *len,
    }
  }

  pub fn data(&self) -> &[T] {
    match &self.backing {
      Backing::Anon(v) => v.as_slice(),
      // SAFETY: `ptr` is valid for `len` elements for the lifetime of `mmap`, which this
      // slice borrows from.
      Backing::ReadOnly { ptr, len, .. } => unsafe { std::slice::from_raw_parts(*ptr, *len) },
      Backing::ReadWrite { mmap, len, .. } => {
        let ptr = mmap.as_ptr() as *const T;
        // SAFETY: the mmap was sized to hold exactly `len` elements of `T`.
        unsafe { std::slice::from_raw_parts(ptr, *len) }
      }
    }
  }

  pub fn data_mut(&mut self) -> &mut [T] {
    match &mut self.backing {
      Backing::Anon(v) => v.as_mut_slice(),
      Backing::ReadOnly { .. } => panic!("MmapArray opened read-only: cannot mutate"),
      Backing::ReadWrite { mmap, len, .. } => {
        let ptr = mmap.as_mut_ptr() as *mut T;
        // SAFETY: see `data()`.
        unsafe { std::slice::from_raw_parts_mut(ptr, *len) }
      }
    }
  }

  /// Grow (or shrink) the array to `n` elements. Anonymous arrays reallocate; file-backed
  /// arrays truncate the file and remap.
  pub fn resize(&mut self, n: usize) -> Result<()> {
    match &mut self.backing {
      Backing::Anon(v) => {
        v.resize(n, T::default());
        Ok(())
      }
      Backing::ReadOnly { .. } => Err(GraphError::internal(
        "cannot resize a read-only mmap array",
      )),
      Backing::ReadWrite { file, mmap, len, .. } => {
        let byte_len = (n * std::mem::size_of::<T>()).max(1);
        file.set_len(byte_len as u64)?;
        // SAFETY: file was just resized to byte_len; old mmap is dropped before remapping.
        let new_mmap = unsafe { memmap2::MmapMut::map_mut(&*file)? };
        *mmap = new_mmap;
        *len = n;
        Ok(())
      }
    }
  }

  /// Durably write the first `n` elements to `path` (a fresh file, independent of whatever
  /// backs `self`). Used by snapshot dump.
  pub fn dump_to_file<P: AsRef<Path>>(&self, path: P, n: usize) -> Result<()> {
    let n = n.min(self.size());
    let bytes = unsafe {
      std::slice::from_raw_parts(self.data().as_ptr() as *const u8, n * std::mem::size_of::<T>())
    };
    let mut file = OpenOptions::new()
      .write(true)
      .create(true)
      .truncate(true)
      .open(path.as_ref())?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
  }

  /// Flush a writable mmap's dirty pages to disk.
  pub fn sync(&self) -> Result<()> {
    if let Backing::ReadWrite { mmap, .. } = &self.backing {
      mmap.flush()?;
    }
    Ok(())
  }
}
