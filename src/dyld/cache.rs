//! Dyld shared cache resolution.
//!
//! A cache is a main file plus optional subcache files (`.1`, `.2` or an
//! explicit suffix) and an optional `.symbols` file. Every file is mapped
//! read-only for the lifetime of the [`SharedCache`]; image headers and
//! linkedit data are borrowed from those mappings.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zerocopy::FromBytes;

use super::structs::*;
use crate::error::{Error, Result};
use crate::macho::{MachImage, ValidationOptions, VmProt};
use crate::region::FileRegion;
use crate::util::{uuid_to_string, ByteView};

const LINKEDIT: &str = "__LINKEDIT";

// =============================================================================
// Options
// =============================================================================

/// Options for opening a shared cache.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Map the subcache files listed in the header
    pub load_subcaches: bool,
    /// Map the `.symbols` file when the header records one
    pub load_symbols_file: bool,
    /// Fail when a subcache's UUID differs from the one the main header lists
    pub verify_subcache_uuids: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            load_subcaches: true,
            load_symbols_file: true,
            verify_subcache_uuids: true,
        }
    }
}

// =============================================================================
// Mapping Entry
// =============================================================================

/// A mapping from either the basic or the extended mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Virtual memory address
    pub address: u64,
    /// Size in bytes
    pub size: u64,
    /// Offset within the file of `part`
    pub file_offset: u64,
    /// Maximum protection
    pub max_prot: VmProt,
    /// Initial protection
    pub init_prot: VmProt,
    /// Slide info file offset, zero for basic entries
    pub slide_info_offset: u64,
    /// Slide info size, zero for basic entries
    pub slide_info_size: u64,
    /// Mapping flags, empty for basic entries
    pub flags: MappingFlags,
    /// Index of the cache file holding this mapping (0 = main cache)
    pub part: usize,
}

impl MappingEntry {
    fn from_basic(info: &DyldCacheMappingInfo, part: usize) -> Self {
        Self {
            address: info.address,
            size: info.size,
            file_offset: info.file_offset,
            max_prot: VmProt::from_bits_retain(info.max_prot),
            init_prot: VmProt::from_bits_retain(info.init_prot),
            slide_info_offset: 0,
            slide_info_size: 0,
            flags: MappingFlags::empty(),
            part,
        }
    }

    fn from_extended(info: &DyldCacheMappingAndSlideInfo, part: usize) -> Self {
        Self {
            address: info.address,
            size: info.size,
            file_offset: info.file_offset,
            max_prot: VmProt::from_bits_retain(info.max_prot),
            init_prot: VmProt::from_bits_retain(info.init_prot),
            slide_info_offset: info.slide_info_file_offset,
            slide_info_size: info.slide_info_file_size,
            flags: MappingFlags::from_bits_retain(info.flags),
            part,
        }
    }

    /// Returns the end address, saturating on overflow.
    #[inline]
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    /// Returns true if this mapping contains the given virtual address.
    #[inline]
    pub fn contains_addr(&self, addr: u64) -> bool {
        addr >= self.address && addr < self.end()
    }

    /// Converts a contained virtual address to a file offset.
    #[inline]
    pub fn addr_to_offset(&self, addr: u64) -> Option<u64> {
        if !self.contains_addr(addr) {
            return None;
        }
        self.file_offset.checked_add(addr - self.address)
    }
}

// =============================================================================
// Cache Files
// =============================================================================

/// One mapped cache file.
pub struct CachePart {
    region: FileRegion,
    header: DyldCacheHeader,
}

impl CachePart {
    fn open(path: &Path) -> Result<Self> {
        let region = FileRegion::open(path)?;
        let header = read_header(region.as_bytes())?;
        Ok(Self { region, header })
    }

    /// Path of the file.
    pub fn path(&self) -> Option<&Path> {
        self.region.path()
    }

    /// File contents.
    pub fn bytes(&self) -> &[u8] {
        self.region.as_bytes()
    }

    /// Parsed header.
    pub fn header(&self) -> &DyldCacheHeader {
        &self.header
    }

    /// UUID recorded in the header.
    pub fn uuid(&self) -> [u8; 16] {
        self.header.uuid
    }
}

impl std::fmt::Debug for CachePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePart")
            .field("path", &self.region.path())
            .field("len", &self.region.len())
            .field("uuid", &uuid_to_string(&self.header.uuid))
            .finish()
    }
}

// =============================================================================
// Image Entry
// =============================================================================

/// An image listed in the cache's image table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheImage {
    /// Position in the image table
    pub index: usize,
    /// Install name, e.g. "/usr/lib/libc.dylib"
    pub install_path: String,
    /// Unslid address of the Mach-O header
    pub address: u64,
    /// Offset of the Mach-O header within its cache file
    pub header_offset: u64,
    /// Index of the cache file holding the header
    pub part: usize,
    /// Modification time recorded at build time
    pub mod_time: u64,
    /// Inode recorded at build time
    pub inode: u64,
}

impl CacheImage {
    /// Returns the last path component.
    pub fn basename(&self) -> &str {
        self.install_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.install_path)
    }

    /// Returns true if the path or basename contains `filter`.
    pub fn matches_filter(&self, filter: &str) -> bool {
        self.install_path.contains(filter) || self.basename().contains(filter)
    }
}

// =============================================================================
// Shared Cache
// =============================================================================

/// An opened dyld shared cache.
///
/// The image table is enumerated once when the cache is opened.
#[derive(Debug)]
pub struct SharedCache {
    path: PathBuf,
    /// Main file first, then subcaches in header order
    parts: Vec<CachePart>,
    symbols: Option<CachePart>,
    /// Sorted by address
    mappings: Vec<MappingEntry>,
    images: Vec<CacheImage>,
    by_path: HashMap<String, usize>,
}

impl SharedCache {
    /// Opens a cache with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, CacheOptions::default())
    }

    /// Opens a cache, its subcaches and its symbols file.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: CacheOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let main = CachePart::open(&path)?;

        let mut mappings = parse_mappings(&main, 0)?;
        let mut parts = vec![main];

        if options.load_subcaches {
            for (index, (sub_path, uuid)) in subcache_entries(&parts[0], &path)?
                .into_iter()
                .enumerate()
            {
                let part = CachePart::open(&sub_path).map_err(|e| match e {
                    Error::FileOpen { ref source, .. }
                        if source.kind() == std::io::ErrorKind::NotFound =>
                    {
                        Error::SubcacheNotFound {
                            path: sub_path.clone(),
                        }
                    }
                    other => other,
                })?;
                if options.verify_subcache_uuids {
                    check_uuid(&sub_path, uuid, part.uuid())?;
                }
                mappings.extend(parse_mappings(&part, index + 1)?);
                debug!("loaded subcache {}", sub_path.display());
                parts.push(part);
            }
        }

        let symbols = if options.load_symbols_file {
            load_symbols_file(&parts[0], &path, options.verify_subcache_uuids)?
        } else {
            None
        };

        mappings.sort_by_key(|m| m.address);

        let mut cache = Self {
            path,
            parts,
            symbols,
            mappings,
            images: Vec::new(),
            by_path: HashMap::new(),
        };
        cache.images = cache.parse_images()?;
        for (position, image) in cache.images.iter().enumerate() {
            cache
                .by_path
                .entry(image.install_path.clone())
                .or_insert(position);
        }

        debug!(
            "opened {} cache {}: {} parts, {} mappings, {} images",
            cache.architecture(),
            cache.path.display(),
            cache.parts.len(),
            cache.mappings.len(),
            cache.images.len()
        );

        Ok(cache)
    }

    /// Path of the main cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Main cache header.
    pub fn header(&self) -> &DyldCacheHeader {
        &self.parts[0].header
    }

    /// Architecture named by the main header's magic.
    pub fn architecture(&self) -> &str {
        self.header().architecture()
    }

    /// UUID of the main cache file.
    pub fn uuid(&self) -> [u8; 16] {
        self.header().uuid
    }

    /// Mapped cache files: the main file, then subcaches.
    pub fn parts(&self) -> &[CachePart] {
        &self.parts
    }

    /// The `.symbols` file, if one was loaded.
    pub fn symbols_part(&self) -> Option<&CachePart> {
        self.symbols.as_ref()
    }

    /// All mappings of all parts, sorted by address.
    pub fn mappings(&self) -> &[MappingEntry] {
        &self.mappings
    }

    /// Span from the lowest to the highest mapped address.
    pub fn mapped_size(&self) -> u64 {
        let low = self.mappings.iter().map(|m| m.address).min();
        let high = self.mappings.iter().map(MappingEntry::end).max();
        match (low, high) {
            (Some(low), Some(high)) => high - low,
            _ => 0,
        }
    }

    /// Images in table order.
    pub fn images(&self) -> &[CacheImage] {
        &self.images
    }

    /// Looks up an image by exact install path.
    pub fn image(&self, path: &str) -> Option<&CacheImage> {
        self.by_path.get(path).and_then(|&i| self.images.get(i))
    }

    /// Returns images whose path or basename contains `filter`.
    pub fn find_images(&self, filter: &str) -> Vec<&CacheImage> {
        self.images
            .iter()
            .filter(|image| image.matches_filter(filter))
            .collect()
    }

    /// Returns the mapping containing `addr`.
    pub fn mapping_for_addr(&self, addr: u64) -> Option<&MappingEntry> {
        let idx = self.mappings.partition_point(|m| m.end() <= addr);
        self.mappings
            .get(idx)
            .filter(|m| m.contains_addr(addr))
            .or_else(|| self.mappings.iter().find(|m| m.contains_addr(addr)))
    }

    /// Converts an unslid address to `(part, file offset)`.
    pub fn addr_to_offset(&self, addr: u64) -> Option<(usize, u64)> {
        let mapping = self.mapping_for_addr(addr)?;
        Some((mapping.part, mapping.addr_to_offset(addr)?))
    }

    /// Returns `len` bytes at an unslid address.
    pub fn data_at_addr(&self, addr: u64, len: u64) -> Result<&[u8]> {
        let (part, offset) = self
            .addr_to_offset(addr)
            .ok_or(Error::AddressNotFound { addr })?;
        let data = self.part_bytes(part)?;
        ByteView::new(data).bytes_at_u64(offset, len)
    }

    /// Validates and returns the Mach-O header of an image.
    ///
    /// The returned image resolves linkedit offsets against the cache file
    /// holding the image's `__LINKEDIT` segment. Addresses are unslid.
    pub fn header_for(&self, path: &str) -> Result<MachImage<'_>> {
        let image = self.image(path).ok_or_else(|| Error::ImageNotFound {
            name: path.to_string(),
        })?;

        let data = self.part_bytes(image.part)?;
        let offset = usize::try_from(image.header_offset)
            .map_err(|_| Error::out_of_bounds(image.header_offset, 0, data.len() as u64))?;
        let macho = MachImage::parse_with(data, offset, &ValidationOptions::default())?;

        let linkedit_part = macho
            .segment(LINKEDIT)
            .and_then(|seg| self.addr_to_offset(seg.vmaddr))
            .map(|(part, _)| part);
        match linkedit_part {
            Some(part) => Ok(macho.with_linkedit(self.part_bytes(part)?)),
            None => Ok(macho),
        }
    }

    pub(crate) fn part_bytes(&self, part: usize) -> Result<&[u8]> {
        self.parts
            .get(part)
            .map(CachePart::bytes)
            .ok_or_else(|| Error::malformed_container(format!("cache part {part} is not loaded")))
    }

    fn parse_images(&self) -> Result<Vec<CacheImage>> {
        let main = &self.parts[0];
        let view = ByteView::new(main.bytes());
        let header = main.header();
        let offset = header.actual_images_offset();
        let count = header.actual_images_count();
        let entry_size = std::mem::size_of::<DyldCacheImageInfo>() as u64;

        let table = count
            .checked_mul(entry_size)
            .and_then(|len| view.bytes_at_u64(offset, len).ok())
            .ok_or_else(|| {
                Error::malformed_container(format!(
                    "image table of {count} entries at {offset:#x} exceeds cache file of {:#x} bytes",
                    view.len()
                ))
            })?;
        let table = ByteView::new(table);

        let mut images = Vec::with_capacity(count as usize);
        for index in 0..count as usize {
            let info: DyldCacheImageInfo = table.read_at(index * entry_size as usize)?;

            let install_path = match view.cstr_at(info.path_file_offset as usize) {
                Ok(path) => path.into_owned(),
                Err(e) => {
                    warn!("skipping cache image {}: bad path offset: {}", index, e);
                    continue;
                }
            };

            let Some((part, header_offset)) = self.addr_to_offset(info.address) else {
                warn!(
                    "skipping cache image {} ({}): address {:#x} is not mapped",
                    index, install_path, info.address
                );
                continue;
            };

            images.push(CacheImage {
                index,
                install_path,
                address: info.address,
                header_offset,
                part,
                mod_time: info.mod_time,
                inode: info.inode,
            });
        }

        Ok(images)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Decodes a header, zero-padding files shorter than the newest layout.
fn read_header(data: &[u8]) -> Result<DyldCacheHeader> {
    let mut bytes = [0u8; DyldCacheHeader::SIZE];
    let n = data.len().min(bytes.len());
    bytes[..n].copy_from_slice(&data[..n]);

    let header = DyldCacheHeader::read_from_bytes(&bytes[..]).map_err(|_| {
        Error::NotRecognizedFormat {
            expected: "dyld shared cache",
            found: format!("{} bytes", data.len()),
        }
    })?;
    if !header.has_valid_magic() {
        return Err(Error::NotRecognizedFormat {
            expected: "dyld shared cache",
            found: format!("magic {:?}", String::from_utf8_lossy(&bytes[..n.min(16)])),
        });
    }
    Ok(header)
}

/// Reads the basic or extended mapping table of one part.
fn parse_mappings(part: &CachePart, index: usize) -> Result<Vec<MappingEntry>> {
    let header = part.header();
    let view = ByteView::new(part.bytes());

    let (offset, count, entry_size) = if header.uses_extended_mappings() {
        (
            header.mapping_with_slide_offset,
            header.mapping_with_slide_count,
            std::mem::size_of::<DyldCacheMappingAndSlideInfo>(),
        )
    } else {
        (
            header.mapping_offset,
            header.mapping_count,
            std::mem::size_of::<DyldCacheMappingInfo>(),
        )
    };

    let table = (count as usize)
        .checked_mul(entry_size)
        .and_then(|len| view.subview(offset as usize, len).ok())
        .ok_or_else(|| {
            Error::malformed_container(format!(
                "mapping table of {count} entries at {offset:#x} exceeds file of {:#x} bytes",
                view.len()
            ))
        })?;

    (0..count as usize)
        .map(|i| {
            let at = i * entry_size;
            if header.uses_extended_mappings() {
                let info: DyldCacheMappingAndSlideInfo = table.read_at(at)?;
                Ok(MappingEntry::from_extended(&info, index))
            } else {
                let info: DyldCacheMappingInfo = table.read_at(at)?;
                Ok(MappingEntry::from_basic(&info, index))
            }
        })
        .collect()
}

/// Lists `(path, expected uuid)` for each subcache in the main header.
fn subcache_entries(main: &CachePart, main_path: &Path) -> Result<Vec<(PathBuf, [u8; 16])>> {
    let header = main.header();
    if !header.has_subcaches() {
        return Ok(Vec::new());
    }

    let view = ByteView::new(main.bytes());
    let offset = header.sub_cache_array_offset as usize;
    let v2 = header.uses_v2_subcache_entries();
    let entry_size = if v2 {
        std::mem::size_of::<DyldSubcacheEntry2>()
    } else {
        std::mem::size_of::<DyldSubcacheEntry>()
    };

    let count = header.sub_cache_array_count as u64;
    let table = view
        .bytes_at_u64(offset as u64, count * entry_size as u64)
        .map(ByteView::new)
        .map_err(|_| {
            Error::malformed_container(format!(
                "subcache array of {count} entries at {offset:#x} exceeds cache file of {:#x} bytes",
                view.len()
            ))
        })?;

    let mut entries = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let at = i * entry_size;
        let (uuid, suffix) = if v2 {
            let entry: DyldSubcacheEntry2 = table.read_at(at)?;
            (entry.uuid, entry.suffix_str().to_string())
        } else {
            let entry: DyldSubcacheEntry = table.read_at(at)?;
            (entry.uuid, format!(".{}", i + 1))
        };
        entries.push((with_suffix(main_path, &suffix), uuid));
    }
    Ok(entries)
}

fn load_symbols_file(main: &CachePart, main_path: &Path, verify: bool) -> Result<Option<CachePart>> {
    let header = main.header();
    if !header.has_symbol_file() {
        return Ok(None);
    }

    let path = with_suffix(main_path, ".symbols");
    if !path.is_file() {
        debug!("symbols file {} not present", path.display());
        return Ok(None);
    }

    let part = CachePart::open(&path)?;
    if verify {
        check_uuid(&path, header.symbol_file_uuid, part.uuid())?;
    }
    debug!("loaded symbols file {}", path.display());
    Ok(Some(part))
}

fn check_uuid(path: &Path, expected: [u8; 16], actual: [u8; 16]) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(Error::SubcacheUuidMismatch {
        path: path.to_path_buf(),
        expected: uuid_to_string(&expected),
        actual: uuid_to_string(&actual),
    })
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
