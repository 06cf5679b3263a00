//! Read-only file regions.
//!
//! A [`FileRegion`] owns the bytes every other view in this crate borrows
//! from: a private read-only memory map for files, or an owned buffer for
//! data that never touched the filesystem. Views carry the region's lifetime,
//! so nothing parsed from it can outlive the mapping.

use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::util::ByteView;

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => mmap,
            Backing::Owned(vec) => vec,
        }
    }
}

/// An immutable byte region backed by a memory-mapped file or an owned buffer.
///
/// The mapping is released exactly once, when the region is dropped.
pub struct FileRegion {
    backing: Backing,
    path: Option<PathBuf>,
}

impl FileRegion {
    /// Memory-maps a regular file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;

        let metadata = file.metadata().map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;
        if !metadata.is_file() {
            return Err(Error::NotRegularFile { path });
        }

        // SAFETY: the map is read-only and private. Concurrent truncation of
        // the file by another process is outside what this crate defends.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
            path: path.clone(),
            source: e,
        })?;

        debug!("mapped {} ({} bytes)", path.display(), mmap.len());

        Ok(Self {
            backing: Backing::Mapped(mmap),
            path: Some(path),
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            backing: Backing::Owned(bytes),
            path: None,
        }
    }

    /// Returns the path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the region length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.backing.bytes().len()
    }

    /// Returns true if the region is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the region is a memory map.
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Returns all bytes of the region.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.backing.bytes()
    }

    /// Returns a bounds-checked view over the whole region.
    #[inline]
    pub fn view(&self) -> ByteView<'_> {
        ByteView::new(self.as_bytes())
    }

    /// Returns `len` bytes at `offset`, or `OutOfBounds`.
    #[inline]
    pub fn read_at(&self, offset: u64, len: u64) -> Result<&[u8]> {
        self.view().bytes_at_u64(offset, len)
    }
}

impl Deref for FileRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for FileRegion {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for FileRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegion")
            .field("path", &self.path)
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
