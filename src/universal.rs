//! Fat (universal) binary containers.
//!
//! A fat file starts with a big-endian header and an array of architecture
//! entries, all inside the first 4 KiB page. Each entry names a slice of the
//! file holding one Mach-O image.

use std::iter::FusedIterator;
use std::ops::Range;

use tracing::error;

use crate::error::{Error, Result};
use crate::macho::{arch_name, CPU_SUBTYPE_ARM64_ALL, CPU_SUBTYPE_ARM64_V8, CPU_TYPE_ARM64, FAT_MAGIC, FAT_MAGIC_64};
use crate::util::ByteView;

/// Size of `fat_header`.
pub const FAT_HEADER_SIZE: usize = 8;
/// Size of `fat_arch`.
pub const FAT_ARCH_SIZE: usize = 20;
/// Size of `fat_arch_64`.
pub const FAT_ARCH_64_SIZE: usize = 32;
/// The header and its entries must fit in this many bytes.
pub const FAT_RESERVED_SIZE: usize = 4096;

/// Subtype bits that carry capabilities rather than the CPU variant.
const CPU_SUBTYPE_MASK: i32 = 0xFF00_0000_u32 as i32;

/// Fat header flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatKind {
    /// Not a fat file
    NotFat,
    /// `fat_arch` entries with 32-bit offsets
    Fat32,
    /// `fat_arch_64` entries with 64-bit offsets
    Fat64,
}

impl FatKind {
    /// Classifies a buffer by its first four big-endian bytes.
    pub fn classify(bytes: &[u8]) -> Self {
        match ByteView::new(bytes).u32_be_at(0) {
            Ok(FAT_MAGIC) => FatKind::Fat32,
            Ok(FAT_MAGIC_64) => FatKind::Fat64,
            _ => FatKind::NotFat,
        }
    }

    /// Size of one architecture entry.
    pub fn entry_size(self) -> usize {
        match self {
            FatKind::Fat64 => FAT_ARCH_64_SIZE,
            _ => FAT_ARCH_SIZE,
        }
    }

    /// Largest entry count that fits in the reserved header page.
    pub fn max_archs(self) -> u32 {
        ((FAT_RESERVED_SIZE - FAT_HEADER_SIZE) / self.entry_size()) as u32
    }
}

/// One architecture slice of a fat file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchitectureSlice {
    /// CPU type
    pub cputype: i32,
    /// CPU subtype
    pub cpusubtype: i32,
    /// Offset of the slice from the start of the fat file
    pub offset: u64,
    /// Size of the slice
    pub size: u64,
    /// Alignment as a power of two
    pub align: u32,
}

impl ArchitectureSlice {
    /// Byte range of the slice within the fat file.
    pub fn range(&self) -> Range<u64> {
        self.offset..self.offset.saturating_add(self.size)
    }

    /// Conventional architecture name, `"unknown"` if not recognized.
    pub fn arch_name(&self) -> &'static str {
        arch_name(self.cputype, self.cpusubtype)
    }

    fn is_plain_arm64(&self) -> bool {
        self.cputype == CPU_TYPE_ARM64
            && matches!(
                self.cpusubtype & !CPU_SUBTYPE_MASK,
                CPU_SUBTYPE_ARM64_ALL | CPU_SUBTYPE_ARM64_V8
            )
    }
}

/// A validated fat header over borrowed bytes.
#[derive(Debug, Clone, Copy)]
pub struct UniversalBinary<'a> {
    data: &'a [u8],
    kind: FatKind,
    count: u32,
}

impl<'a> UniversalBinary<'a> {
    /// Validates the fat header of `data`.
    ///
    /// The declared count must fit in the reserved page, and the entries plus
    /// one spare entry must fit in the buffer.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let kind = FatKind::classify(data);
        if kind == FatKind::NotFat {
            return Err(Error::NotRecognizedFormat {
                expected: "fat binary",
                found: describe_magic(data),
            });
        }

        let count = ByteView::new(data).u32_be_at(4)?;
        if count > kind.max_archs() {
            error!("fat header too large: {} entries", count);
            return Err(Error::malformed_container(format!(
                "{} architectures exceed the maximum of {}",
                count,
                kind.max_archs()
            )));
        }

        let needed = FAT_HEADER_SIZE + (count as usize + 1) * kind.entry_size();
        if needed > data.len() {
            error!("fat header malformed, architecture slices extend beyond end of file");
            return Err(Error::malformed_container(format!(
                "{} architecture entries need {:#x} bytes, file has {:#x}",
                count,
                needed,
                data.len()
            )));
        }

        Ok(Self { data, kind, count })
    }

    /// Header flavor.
    pub fn kind(&self) -> FatKind {
        self.kind
    }

    /// Declared architecture count, not including a hidden trailing slice.
    pub fn declared_count(&self) -> u32 {
        self.count
    }

    /// The whole fat file.
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Iterates the slices. Each call starts from the first entry.
    pub fn slices(&self) -> FatSlices<'a> {
        FatSlices {
            binary: *self,
            index: 0,
            done: false,
        }
    }

    /// Calls `f` for each slice until it returns `false`.
    ///
    /// Stopping early is not an error.
    pub fn for_each_slice<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&ArchitectureSlice) -> bool,
    {
        for slice in self.slices() {
            if !f(&slice?) {
                break;
            }
        }
        Ok(())
    }

    /// Lists the architecture names of all slices.
    pub fn architectures(&self) -> Result<Vec<&'static str>> {
        self.slices()
            .map(|slice| slice.map(|s| s.arch_name()))
            .collect()
    }

    /// Finds the first slice with the given architecture name.
    pub fn slice_for(&self, name: &str) -> Result<Option<ArchitectureSlice>> {
        for slice in self.slices() {
            let slice = slice?;
            if slice.arch_name() == name {
                return Ok(Some(slice));
            }
        }
        Ok(None)
    }

    /// Returns the bytes of a slice.
    pub fn slice_bytes(&self, slice: &ArchitectureSlice) -> Result<&'a [u8]> {
        ByteView::new(self.data).bytes_at_u64(slice.offset, slice.size)
    }

    fn entry(&self, index: u32) -> Result<ArchitectureSlice> {
        let view = ByteView::new(self.data);
        let at = FAT_HEADER_SIZE + index as usize * self.kind.entry_size();
        let cputype = view.i32_be_at(at)?;
        let cpusubtype = view.i32_be_at(at + 4)?;
        let (offset, size, align) = match self.kind {
            FatKind::Fat64 => (
                view.u64_be_at(at + 8)?,
                view.u64_be_at(at + 16)?,
                view.u32_be_at(at + 24)?,
            ),
            _ => (
                view.u32_be_at(at + 8)? as u64,
                view.u32_be_at(at + 12)? as u64,
                view.u32_be_at(at + 16)?,
            ),
        };
        Ok(ArchitectureSlice {
            cputype,
            cpusubtype,
            offset,
            size,
            align,
        })
    }

    fn in_bounds(&self, slice: &ArchitectureSlice) -> bool {
        slice
            .offset
            .checked_add(slice.size)
            .is_some_and(|end| end <= self.data.len() as u64)
    }
}

/// Iterator over the slices of a [`UniversalBinary`].
///
/// After the declared entries, one more entry is inspected when the header
/// page has room for it: a plain arm64 slice there is yielded as well. The
/// iterator fuses after the first error.
#[derive(Debug, Clone)]
pub struct FatSlices<'a> {
    binary: UniversalBinary<'a>,
    index: u32,
    done: bool,
}

impl Iterator for FatSlices<'_> {
    type Item = Result<ArchitectureSlice>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let index = self.index;
        self.index += 1;

        if index < self.binary.count {
            let slice = match self.binary.entry(index) {
                Ok(slice) => slice,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if !self.binary.in_bounds(&slice) {
                self.done = true;
                error!(
                    "fat slice {} ({:#x}+{:#x}) extends beyond end of file",
                    index, slice.offset, slice.size
                );
                return Some(Err(Error::malformed_container(format!(
                    "slice {} at {:#x}+{:#x} exceeds file of {:#x} bytes",
                    index,
                    slice.offset,
                    slice.size,
                    self.binary.data.len()
                ))));
            }
            return Some(Ok(slice));
        }

        // Lookahead for a trailing arm64 slice
        self.done = true;
        if index == self.binary.count && index < self.binary.kind.max_archs() {
            if let Ok(slice) = self.binary.entry(index) {
                if slice.is_plain_arm64() && slice.size > 0 && self.binary.in_bounds(&slice) {
                    return Some(Ok(slice));
                }
            }
        }
        None
    }
}

impl FusedIterator for FatSlices<'_> {}

fn describe_magic(data: &[u8]) -> String {
    match ByteView::new(data).u32_be_at(0) {
        Ok(magic) => format!("magic {magic:#010x}"),
        Err(_) => format!("{} bytes", data.len()),
    }
}
