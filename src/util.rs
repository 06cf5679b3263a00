//! Bounds-checked primitives for reading untrusted binary data.
//!
//! This module provides:
//! - [`ByteView`], a cursor over a borrowed byte slice with typed accessors
//!   in both byte orders (using byteorder for unaligned loads)
//! - SIMD-accelerated null-terminator search (via memchr)
//! - LEB128 decoding and alignment helpers
//!
//! Every accessor validates `offset + len` against the slice with checked
//! arithmetic and reports [`Error::OutOfBounds`] instead of panicking.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};

// =============================================================================
// Byte View
// =============================================================================

/// A read-only, bounds-checked view over a byte slice.
///
/// The view is `Copy` and borrows its data, so every value read from it is
/// tied to the lifetime of the backing buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Creates a view over the given bytes.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Returns the length of the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the view is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the underlying bytes.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Returns `len` bytes starting at `offset`.
    #[inline]
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| Error::out_of_bounds(offset as u64, len as u64, self.data.len() as u64))
    }

    /// Returns everything from `offset` to the end of the view.
    #[inline]
    pub fn tail(&self, offset: usize) -> Result<&'a [u8]> {
        self.data
            .get(offset..)
            .ok_or_else(|| Error::out_of_bounds(offset as u64, 0, self.data.len() as u64))
    }

    /// Returns a sub-view covering `len` bytes at `offset`.
    #[inline]
    pub fn subview(&self, offset: usize, len: usize) -> Result<ByteView<'a>> {
        self.bytes_at(offset, len).map(ByteView::new)
    }

    /// Returns `len` bytes at a 64-bit file offset, rejecting values that do
    /// not fit the address space.
    #[inline]
    pub fn bytes_at_u64(&self, offset: u64, len: u64) -> Result<&'a [u8]> {
        let size = self.data.len() as u64;
        match (usize::try_from(offset), usize::try_from(len)) {
            (Ok(offset), Ok(len)) => self.bytes_at(offset, len),
            _ => Err(Error::out_of_bounds(offset, len, size)),
        }
    }

    #[inline(always)]
    fn array<const N: usize>(&self, offset: usize) -> Result<&'a [u8]> {
        self.bytes_at(offset, N)
    }

    /// Reads a byte.
    #[inline]
    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| Error::out_of_bounds(offset as u64, 1, self.data.len() as u64))
    }

    /// Reads a little-endian u16.
    #[inline]
    pub fn u16_le_at(&self, offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.array::<2>(offset)?))
    }

    /// Reads a little-endian u32.
    #[inline]
    pub fn u32_le_at(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.array::<4>(offset)?))
    }

    /// Reads a little-endian i32.
    #[inline]
    pub fn i32_le_at(&self, offset: usize) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.array::<4>(offset)?))
    }

    /// Reads a little-endian u64.
    #[inline]
    pub fn u64_le_at(&self, offset: usize) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.array::<8>(offset)?))
    }

    /// Reads a big-endian u32.
    #[inline]
    pub fn u32_be_at(&self, offset: usize) -> Result<u32> {
        Ok(BigEndian::read_u32(self.array::<4>(offset)?))
    }

    /// Reads a big-endian i32.
    #[inline]
    pub fn i32_be_at(&self, offset: usize) -> Result<i32> {
        Ok(BigEndian::read_i32(self.array::<4>(offset)?))
    }

    /// Reads a big-endian u64.
    #[inline]
    pub fn u64_be_at(&self, offset: usize) -> Result<u64> {
        Ok(BigEndian::read_u64(self.array::<8>(offset)?))
    }

    /// Reads a fixed-width, NUL-padded string field such as a segment name.
    ///
    /// The field is cut at the first NUL. Invalid UTF-8 is replaced.
    pub fn fixed_str_at(&self, offset: usize, len: usize) -> Result<Cow<'a, str>> {
        let field = self.bytes_at(offset, len)?;
        Ok(String::from_utf8_lossy(&field[..memchr_null(field)]))
    }

    /// Reads a NUL-terminated string starting at `offset`.
    ///
    /// A string that runs to the end of the view without a terminator is
    /// rejected, so a truncated table never yields a bogus trailing name.
    pub fn cstr_at(&self, offset: usize) -> Result<Cow<'a, str>> {
        let bytes = self.tail(offset)?;
        match memchr::memchr(0, bytes) {
            Some(end) => Ok(String::from_utf8_lossy(&bytes[..end])),
            None => Err(Error::out_of_bounds(
                offset as u64,
                bytes.len() as u64 + 1,
                self.data.len() as u64,
            )),
        }
    }

    /// Reads an on-disk structure at `offset`.
    ///
    /// Structures are declared in the little-endian layout used by every
    /// supported Mach-O and dyld cache producer.
    #[inline]
    pub fn read_at<T>(&self, offset: usize) -> Result<T>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        let bytes = self.bytes_at(offset, std::mem::size_of::<T>())?;
        T::read_from_bytes(bytes).map_err(|_| {
            Error::out_of_bounds(
                offset as u64,
                std::mem::size_of::<T>() as u64,
                self.data.len() as u64,
            )
        })
    }

    /// Reads a ULEB128 value at `offset`, returning it with the bytes consumed.
    #[inline]
    pub fn uleb128_at(&self, offset: usize) -> Result<(u64, usize)> {
        read_uleb128(self.tail(offset)?).ok_or(Error::InvalidUleb128 { offset })
    }

    /// Reads an SLEB128 value at `offset`, returning it with the bytes consumed.
    #[inline]
    pub fn sleb128_at(&self, offset: usize) -> Result<(i64, usize)> {
        read_sleb128(self.tail(offset)?).ok_or(Error::InvalidUleb128 { offset })
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

// =============================================================================
// SIMD-Accelerated Byte Search
// =============================================================================

/// Finds the position of the first null byte in a slice.
///
/// Returns the slice length if there is none.
#[inline(always)]
pub fn memchr_null(data: &[u8]) -> usize {
    memchr::memchr(0, data).unwrap_or(data.len())
}

// =============================================================================
// LEB128
// =============================================================================

/// Reads an unsigned LEB128 value with fast paths for common cases.
///
/// Returns `(value, bytes_consumed)` or `None` if the encoding is truncated
/// or overflows 64 bits.
#[inline(always)]
pub fn read_uleb128(data: &[u8]) -> Option<(u64, usize)> {
    let b0 = *data.first()?;

    // Single byte (0-127)
    if b0 < 0x80 {
        return Some((b0 as u64, 1));
    }

    let b1 = *data.get(1)?;
    if b1 < 0x80 {
        let value = ((b0 & 0x7F) as u64) | ((b1 as u64) << 7);
        return Some((value, 2));
    }

    let mut result: u64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte < 0x80 {
            return Some((result, i + 1));
        }
    }

    None
}

/// Reads a signed LEB128 value.
#[inline(always)]
pub fn read_sleb128(data: &[u8]) -> Option<(i64, usize)> {
    let b0 = *data.first()?;

    if b0 < 0x80 {
        // Sign extend from 7 bits
        let value = if (b0 & 0x40) != 0 {
            (b0 as i64) | !0x7F_i64
        } else {
            b0 as i64
        };
        return Some((value, 1));
    }

    let mut result: i64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }

        result |= ((byte & 0x7F) as i64) << shift;
        shift += 7;

        if byte < 0x80 {
            if shift < 64 && (byte & 0x40) != 0 {
                result |= !0_i64 << shift;
            }
            return Some((result, i + 1));
        }
    }

    None
}

// =============================================================================
// Alignment Utilities
// =============================================================================

/// Aligns a value up to the given power-of-two alignment.
///
/// Returns `None` on overflow.
#[inline(always)]
pub const fn align_up(value: u64, alignment: u64) -> Option<u64> {
    debug_assert!(alignment.is_power_of_two());
    match value.checked_add(alignment - 1) {
        Some(v) => Some(v & !(alignment - 1)),
        None => None,
    }
}

/// Checks if a value is aligned to the given power-of-two alignment.
#[inline(always)]
pub const fn is_aligned(value: u64, alignment: u64) -> bool {
    debug_assert!(alignment.is_power_of_two());
    (value & (alignment - 1)) == 0
}

/// Formats a UUID in the canonical 8-4-4-4-12 form.
pub fn uuid_to_string(uuid: &[u8; 16]) -> String {
    let mut out = String::with_capacity(36);
    for (i, byte) in uuid.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}
