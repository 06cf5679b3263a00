//! Builders for synthetic images, fat files and caches used by unit tests.

use std::mem::offset_of;
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use zerocopy::{FromZeros, IntoBytes};

use crate::dyld::DyldCacheHeader;
use crate::macho::*;

fn align(value: usize, to: usize) -> usize {
    value.div_ceil(to) * to
}

fn pad_to(buf: &mut Vec<u8>, to: usize) {
    let len = align(buf.len(), to);
    buf.resize(len, 0);
}

fn name16(name: &str) -> [u8; 16] {
    let mut field = [0u8; 16];
    field[..name.len()].copy_from_slice(name.as_bytes());
    field
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

/// Appends `value` as ULEB128.
pub fn write_uleb128(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

// =============================================================================
// Mach-O
// =============================================================================

pub struct SectionSpec {
    sectname: String,
    addr: u64,
    size: u64,
    offset: u32,
    flags: u32,
}

impl SectionSpec {
    pub fn new(sectname: &str, addr: u64, size: u64, offset: u32, flags: u32) -> Self {
        Self {
            sectname: sectname.into(),
            addr,
            size,
            offset,
            flags,
        }
    }
}

pub struct SegmentSpec {
    name: String,
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    prot: u32,
    sections: Vec<SectionSpec>,
}

impl SegmentSpec {
    pub fn new(name: &str, vmaddr: u64, vmsize: u64, fileoff: u64, filesize: u64, prot: u32) -> Self {
        Self {
            name: name.into(),
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            prot,
            sections: Vec::new(),
        }
    }

    pub fn section(mut self, section: SectionSpec) -> Self {
        self.sections.push(section);
        self
    }
}

#[derive(Clone)]
pub struct NlistSpec {
    name: String,
    n_type: u8,
    n_sect: u8,
    n_desc: u16,
    strx: Option<u32>,
}

impl NlistSpec {
    pub fn local(name: &str) -> Self {
        Self::with(name, N_SECT, 1, 0)
    }

    pub fn defined(name: &str) -> Self {
        Self::with(name, N_SECT | N_EXT, 1, 0)
    }

    pub fn undefined(name: &str, ordinal: u8) -> Self {
        Self::with(name, N_UNDF | N_EXT, 0, (ordinal as u16) << 8)
    }

    pub fn stab(name: &str) -> Self {
        Self::with(name, 0x64, 0, 0)
    }

    pub fn desc(mut self, desc: u16) -> Self {
        self.n_desc |= desc;
        self
    }

    pub fn strx(mut self, strx: u32) -> Self {
        self.strx = Some(strx);
        self
    }

    fn with(name: &str, n_type: u8, n_sect: u8, n_desc: u16) -> Self {
        Self {
            name: name.into(),
            n_type,
            n_sect,
            n_desc,
            strx: None,
        }
    }

    fn is_stab(&self) -> bool {
        self.n_type & N_STAB != 0
    }

    fn is_external(&self) -> bool {
        !self.is_stab() && self.n_type & N_EXT != 0
    }

    fn is_undefined(&self) -> bool {
        self.is_external() && self.n_type & N_TYPE == N_UNDF
    }
}

/// Patches a u32 field of a command with the file offset of a blob.
struct BlobRef {
    command: usize,
    field: usize,
    blob: usize,
}

/// Assembles a little-endian Mach-O image.
///
/// Commands are emitted in call order. LINKEDIT blobs follow the command
/// region, each 8-byte aligned. The file is not padded out to segment sizes.
pub struct MachBuilder {
    is_64: bool,
    cputype: i32,
    cpusubtype: i32,
    filetype: u32,
    flags: u32,
    commands: Vec<Vec<u8>>,
    blobs: Vec<Vec<u8>>,
    refs: Vec<BlobRef>,
    contents: Vec<(usize, Vec<u8>)>,
}

impl MachBuilder {
    pub fn new_64(cputype: i32, cpusubtype: i32, filetype: u32) -> Self {
        Self::new(true, cputype, cpusubtype, filetype)
    }

    pub fn new_32(cputype: i32, cpusubtype: i32, filetype: u32) -> Self {
        Self::new(false, cputype, cpusubtype, filetype)
    }

    fn new(is_64: bool, cputype: i32, cpusubtype: i32, filetype: u32) -> Self {
        Self {
            is_64,
            cputype,
            cpusubtype,
            filetype,
            flags: 0,
            commands: Vec::new(),
            blobs: Vec::new(),
            refs: Vec::new(),
            contents: Vec::new(),
        }
    }

    fn pointer_align(&self) -> usize {
        if self.is_64 {
            8
        } else {
            4
        }
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Appends a command whose cmdsize is exactly `8 + payload.len()`.
    pub fn raw_command(mut self, cmd: u32, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(8 + payload.len());
        bytes.write_u32::<LittleEndian>(cmd).unwrap();
        bytes.write_u32::<LittleEndian>(8 + payload.len() as u32).unwrap();
        bytes.extend_from_slice(payload);
        self.commands.push(bytes);
        self
    }

    pub fn segment(mut self, spec: SegmentSpec) -> Self {
        let bytes = if self.is_64 {
            let mut seg = SegmentCommand64::default();
            seg.set_name(&spec.name);
            seg.cmdsize = (SegmentCommand64::SIZE + spec.sections.len() * Section64::SIZE) as u32;
            seg.vmaddr = spec.vmaddr;
            seg.vmsize = spec.vmsize;
            seg.fileoff = spec.fileoff;
            seg.filesize = spec.filesize;
            seg.maxprot = spec.prot;
            seg.initprot = spec.prot;
            seg.nsects = spec.sections.len() as u32;
            let mut bytes = seg.as_bytes().to_vec();
            for s in &spec.sections {
                let mut sect = Section64::default();
                sect.set_names(&spec.name, &s.sectname);
                sect.addr = s.addr;
                sect.size = s.size;
                sect.offset = s.offset;
                sect.flags = s.flags;
                bytes.extend_from_slice(sect.as_bytes());
            }
            bytes
        } else {
            let mut seg = SegmentCommand32::new_zeroed();
            seg.cmd = LC_SEGMENT;
            seg.cmdsize = (SegmentCommand32::SIZE + spec.sections.len() * Section32::SIZE) as u32;
            seg.segname = name16(&spec.name);
            seg.vmaddr = spec.vmaddr as u32;
            seg.vmsize = spec.vmsize as u32;
            seg.fileoff = spec.fileoff as u32;
            seg.filesize = spec.filesize as u32;
            seg.maxprot = spec.prot;
            seg.initprot = spec.prot;
            seg.nsects = spec.sections.len() as u32;
            let mut bytes = seg.as_bytes().to_vec();
            for s in &spec.sections {
                let mut sect = Section32::new_zeroed();
                sect.segname = name16(&spec.name);
                sect.sectname = name16(&s.sectname);
                sect.addr = s.addr as u32;
                sect.size = s.size as u32;
                sect.offset = s.offset;
                sect.flags = s.flags;
                bytes.extend_from_slice(sect.as_bytes());
            }
            bytes
        };
        self.commands.push(bytes);
        self
    }

    pub fn dylib(mut self, cmd: u32, path: &str) -> Self {
        let mut bytes = DylibCommand {
            cmd,
            cmdsize: 0,
            dylib: Dylib {
                name_offset: DylibCommand::SIZE as u32,
                timestamp: 2,
                current_version: 0x10000,
                compatibility_version: 0x10000,
            },
        }
        .as_bytes()
        .to_vec();
        bytes.extend_from_slice(path.as_bytes());
        bytes.push(0);
        pad_to(&mut bytes, self.pointer_align());
        let size = bytes.len() as u32;
        put_u32(&mut bytes, 4, size);
        self.commands.push(bytes);
        self
    }

    pub fn string_command(mut self, cmd: u32, s: &str) -> Self {
        let mut bytes = StringCommand {
            cmd,
            cmdsize: 0,
            offset: StringCommand::SIZE as u32,
        }
        .as_bytes()
        .to_vec();
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        pad_to(&mut bytes, self.pointer_align());
        let size = bytes.len() as u32;
        put_u32(&mut bytes, 4, size);
        self.commands.push(bytes);
        self
    }

    pub fn uuid(mut self, uuid: [u8; 16]) -> Self {
        let cmd = UuidCommand {
            uuid,
            ..Default::default()
        };
        self.commands.push(cmd.as_bytes().to_vec());
        self
    }

    fn blob(&mut self, field: usize, data: &[u8]) {
        self.blobs.push(data.to_vec());
        self.refs.push(BlobRef {
            command: self.commands.len(),
            field,
            blob: self.blobs.len() - 1,
        });
    }

    pub fn linkedit_data(mut self, cmd: u32, data: &[u8]) -> Self {
        self.blob(8, data);
        let lc = LinkeditDataCommand::new(cmd, 0, data.len() as u32);
        self.commands.push(lc.as_bytes().to_vec());
        self
    }

    /// Adds LC_SYMTAB, and LC_DYSYMTAB when asked.
    ///
    /// With a dysymtab the records are grouped as locals (stabs included),
    /// defined externals, then undefined externals.
    pub fn symtab(mut self, symbols: &[NlistSpec], with_dysymtab: bool) -> Self {
        let ordered: Vec<NlistSpec> = if with_dysymtab {
            let locals = symbols.iter().filter(|s| !s.is_external());
            let extdefs = symbols.iter().filter(|s| s.is_external() && !s.is_undefined());
            let undefs = symbols.iter().filter(|s| s.is_undefined());
            locals.chain(extdefs).chain(undefs).cloned().collect()
        } else {
            symbols.to_vec()
        };

        let mut strings = vec![0u8];
        let mut table = Vec::new();
        for spec in &ordered {
            let strx = match spec.strx {
                Some(strx) => strx,
                None => {
                    let at = strings.len() as u32;
                    strings.extend_from_slice(spec.name.as_bytes());
                    strings.push(0);
                    at
                }
            };
            if self.is_64 {
                let nlist = Nlist64 {
                    n_strx: strx,
                    n_type: spec.n_type,
                    n_sect: spec.n_sect,
                    n_desc: spec.n_desc,
                    n_value: 0,
                };
                table.extend_from_slice(nlist.as_bytes());
            } else {
                let nlist = Nlist32 {
                    n_strx: strx,
                    n_type: spec.n_type,
                    n_sect: spec.n_sect,
                    n_desc: spec.n_desc,
                    n_value: 0,
                };
                table.extend_from_slice(nlist.as_bytes());
            }
        }

        self.blob(8, &table);
        self.blob(16, &strings);
        let symtab = SymtabCommand {
            nsyms: ordered.len() as u32,
            strsize: strings.len() as u32,
            ..Default::default()
        };
        self.commands.push(symtab.as_bytes().to_vec());

        if with_dysymtab {
            let nlocal = ordered.iter().filter(|s| !s.is_external()).count() as u32;
            let nundef = ordered.iter().filter(|s| s.is_undefined()).count() as u32;
            let nextdef = ordered.len() as u32 - nlocal - nundef;
            let dysymtab = DysymtabCommand {
                cmd: LC_DYSYMTAB,
                cmdsize: DysymtabCommand::SIZE as u32,
                ilocalsym: 0,
                nlocalsym: nlocal,
                iextdefsym: nlocal,
                nextdefsym: nextdef,
                iundefsym: nlocal + nextdef,
                nundefsym: nundef,
                ..Default::default()
            };
            self.commands.push(dysymtab.as_bytes().to_vec());
        }
        self
    }

    /// Adds LC_DYLD_INFO_ONLY. Empty streams get offset and size zero.
    pub fn dyld_info(mut self, bind: &[u8], weak: &[u8], lazy: &[u8], export: &[u8]) -> Self {
        let mut cmd = DyldInfoCommand::default();
        for (field, data) in [(16, bind), (24, weak), (32, lazy), (40, export)] {
            if data.is_empty() {
                continue;
            }
            self.blob(field, data);
            match field {
                16 => cmd.bind_size = data.len() as u32,
                24 => cmd.weak_bind_size = data.len() as u32,
                32 => cmd.lazy_bind_size = data.len() as u32,
                _ => cmd.export_size = data.len() as u32,
            }
        }
        self.commands.push(cmd.as_bytes().to_vec());
        self
    }

    /// Overlays `bytes` at a file offset once the image is laid out.
    pub fn contents(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.contents.push((offset, bytes.to_vec()));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let header_size = if self.is_64 {
            MachHeader64::SIZE
        } else {
            MachHeader32::SIZE
        };

        let mut command_offsets = Vec::with_capacity(self.commands.len());
        let mut cursor = header_size;
        for cmd in &self.commands {
            command_offsets.push(cursor);
            cursor += cmd.len();
        }
        let sizeofcmds = (cursor - header_size) as u32;

        let mut blob_offsets = Vec::with_capacity(self.blobs.len());
        let mut linkedit = align(cursor, 8);
        for blob in &self.blobs {
            blob_offsets.push(linkedit);
            linkedit = align(linkedit + blob.len(), 8);
        }

        for r in &self.refs {
            put_u32(&mut self.commands[r.command], r.field, blob_offsets[r.blob] as u32);
        }

        let mut out = Vec::with_capacity(linkedit);
        if self.is_64 {
            let header = MachHeader64 {
                cputype: self.cputype,
                cpusubtype: self.cpusubtype,
                filetype: self.filetype,
                ncmds: self.commands.len() as u32,
                sizeofcmds,
                flags: self.flags,
                ..Default::default()
            };
            out.extend_from_slice(header.as_bytes());
        } else {
            let header = MachHeader32 {
                magic: MH_MAGIC,
                cputype: self.cputype,
                cpusubtype: self.cpusubtype,
                filetype: self.filetype,
                ncmds: self.commands.len() as u32,
                sizeofcmds,
                flags: self.flags,
            };
            out.extend_from_slice(header.as_bytes());
        }
        for cmd in &self.commands {
            out.extend_from_slice(cmd);
        }
        for (blob, offset) in self.blobs.iter().zip(&blob_offsets) {
            out.resize(*offset, 0);
            out.extend_from_slice(blob);
        }
        out.resize(linkedit, 0);

        for (offset, bytes) in &self.contents {
            let end = offset + bytes.len();
            if out.len() < end {
                out.resize(end, 0);
            }
            out[*offset..end].copy_from_slice(bytes);
        }
        out
    }
}

// =============================================================================
// Export Trie
// =============================================================================

/// Builds a flat export trie: a root whose edges each spell a full name.
#[derive(Default)]
pub struct TrieBuilder {
    exports: Vec<(String, u64, u64)>,
}

impl TrieBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn export(mut self, name: &str, address: u64, flags: u64) -> Self {
        self.exports.push((name.into(), address, flags));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let nodes: Vec<Vec<u8>> = self
            .exports
            .iter()
            .map(|(_, address, flags)| {
                let mut terminal = Vec::new();
                write_uleb128(*flags, &mut terminal);
                write_uleb128(*address, &mut terminal);
                let mut node = Vec::new();
                write_uleb128(terminal.len() as u64, &mut node);
                node.extend_from_slice(&terminal);
                node.push(0);
                node
            })
            .collect();

        let root_len: usize = 2 + self
            .exports
            .iter()
            .map(|(name, _, _)| name.len() + 2)
            .sum::<usize>();

        let mut out = vec![0u8, self.exports.len() as u8];
        let mut child = root_len;
        for ((name, _, _), node) in self.exports.iter().zip(&nodes) {
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            out.push(child as u8);
            child += node.len();
        }
        for node in &nodes {
            out.extend_from_slice(node);
        }
        assert!(out.len() < 0x80, "test trie must keep one-byte child offsets");
        out
    }
}

// =============================================================================
// Chained Fixups
// =============================================================================

/// Builds a LC_DYLD_CHAINED_FIXUPS payload with an empty starts table.
pub fn chained_fixups(format: u32, imports: &[(&str, u32, bool)]) -> Vec<u8> {
    const HEADER_SIZE: u32 = 28;
    let starts_offset = HEADER_SIZE;
    let imports_offset = starts_offset + 4;

    let mut symbols = Vec::new();
    let mut table = Vec::new();
    for (name, ordinal, weak) in imports {
        let name_offset = symbols.len() as u64;
        symbols.extend_from_slice(name.as_bytes());
        symbols.push(0);
        let weak = *weak as u64;
        match format {
            DYLD_CHAINED_IMPORT_ADDEND64 => {
                let raw = (*ordinal as u64 & 0xFFFF) | (weak << 16) | (name_offset << 32);
                table.write_u64::<LittleEndian>(raw).unwrap();
                table.write_u64::<LittleEndian>(0).unwrap();
            }
            _ => {
                let raw = (*ordinal as u64 & 0xFF) | (weak << 8) | (name_offset << 9);
                table.write_u32::<LittleEndian>(raw as u32).unwrap();
                if format == DYLD_CHAINED_IMPORT_ADDEND {
                    table.write_i32::<LittleEndian>(0).unwrap();
                }
            }
        }
    }
    let symbols_offset = imports_offset + table.len() as u32;

    let mut out = Vec::new();
    for field in [
        0,
        starts_offset,
        imports_offset,
        symbols_offset,
        imports.len() as u32,
        format,
        DYLD_CHAINED_SYMBOL_UNCOMPRESSED,
    ] {
        out.write_u32::<LittleEndian>(field).unwrap();
    }
    out.write_u32::<LittleEndian>(0).unwrap();
    out.extend_from_slice(&table);
    out.extend_from_slice(&symbols);
    out
}

// =============================================================================
// Code Signature
// =============================================================================

/// Builds a big-endian embedded signature superblob.
pub fn superblob(blobs: &[(u32, u32, &[u8])]) -> Vec<u8> {
    let index_end = 12 + 8 * blobs.len();
    let mut index = Vec::new();
    let mut body = Vec::new();
    for (slot, magic, payload) in blobs {
        index.write_u32::<BigEndian>(*slot).unwrap();
        index
            .write_u32::<BigEndian>((index_end + body.len()) as u32)
            .unwrap();
        body.write_u32::<BigEndian>(*magic).unwrap();
        body.write_u32::<BigEndian>(8 + payload.len() as u32).unwrap();
        body.extend_from_slice(payload);
    }

    let mut out = Vec::new();
    out.write_u32::<BigEndian>(CSMAGIC_EMBEDDED_SIGNATURE).unwrap();
    out.write_u32::<BigEndian>((index_end + body.len()) as u32).unwrap();
    out.write_u32::<BigEndian>(blobs.len() as u32).unwrap();
    out.extend_from_slice(&index);
    out.extend_from_slice(&body);
    out
}

// =============================================================================
// Fat Files
// =============================================================================

/// Builds a fat file with page-aligned slices.
///
/// Hidden slices get an entry after the declared ones but are left out of
/// `nfat_arch`.
pub struct FatBuilder {
    wide: bool,
    slices: Vec<(i32, i32, Vec<u8>, bool)>,
}

impl FatBuilder {
    pub fn new() -> Self {
        Self {
            wide: false,
            slices: Vec::new(),
        }
    }

    pub fn new_64() -> Self {
        Self {
            wide: true,
            slices: Vec::new(),
        }
    }

    pub fn slice(mut self, cputype: i32, cpusubtype: i32, bytes: &[u8]) -> Self {
        self.slices.push((cputype, cpusubtype, bytes.to_vec(), false));
        self
    }

    pub fn hidden_slice(mut self, cputype: i32, cpusubtype: i32, bytes: &[u8]) -> Self {
        self.slices.push((cputype, cpusubtype, bytes.to_vec(), true));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let declared = self.slices.iter().filter(|s| !s.3).count() as u32;
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(if self.wide { FAT_MAGIC_64 } else { FAT_MAGIC })
            .unwrap();
        out.write_u32::<BigEndian>(declared).unwrap();

        let mut offset = 0x1000usize;
        let mut placed = Vec::new();
        for (cputype, cpusubtype, bytes, _) in &self.slices {
            out.write_i32::<BigEndian>(*cputype).unwrap();
            out.write_i32::<BigEndian>(*cpusubtype).unwrap();
            if self.wide {
                out.write_u64::<BigEndian>(offset as u64).unwrap();
                out.write_u64::<BigEndian>(bytes.len() as u64).unwrap();
                out.write_u32::<BigEndian>(12).unwrap();
                out.write_u32::<BigEndian>(0).unwrap();
            } else {
                out.write_u32::<BigEndian>(offset as u32).unwrap();
                out.write_u32::<BigEndian>(bytes.len() as u32).unwrap();
                out.write_u32::<BigEndian>(12).unwrap();
            }
            placed.push(offset);
            offset = align(offset + bytes.len(), 0x1000);
        }

        for ((_, _, bytes, _), at) in self.slices.iter().zip(placed) {
            out.resize(at, 0);
            out.extend_from_slice(bytes);
        }
        out
    }
}

// =============================================================================
// Shared Cache
// =============================================================================

struct CacheImageSpec {
    path: String,
    address: u64,
    bytes: Option<Vec<u8>>,
}

struct SubcacheSpec {
    suffix: String,
    uuid: [u8; 16],
    address: u64,
    size: u64,
}

/// Writes a main cache file, and optionally subcaches and a symbols file.
///
/// The main file maps flat from `base`: an image at address `a` sits at
/// file offset `a - base`. Header tables must end before the first image.
pub struct CacheBuilder {
    arch: String,
    uuid: [u8; 16],
    base: u64,
    images: Vec<CacheImageSpec>,
    subcaches: Vec<SubcacheSpec>,
    subcache_uuid_override: Option<[u8; 16]>,
    images_count_override: Option<u32>,
    locals: Vec<(usize, Vec<(String, u64)>)>,
    symbols_file_uuid: Option<[u8; 16]>,
}

impl CacheBuilder {
    pub fn new(arch: &str, uuid: [u8; 16], base: u64) -> Self {
        Self {
            arch: arch.into(),
            uuid,
            base,
            images: Vec::new(),
            subcaches: Vec::new(),
            subcache_uuid_override: None,
            images_count_override: None,
            locals: Vec::new(),
            symbols_file_uuid: None,
        }
    }

    /// Adds an image at `address`.
    pub fn image_at(mut self, path: &str, address: u64, macho: Vec<u8>) -> Self {
        self.images.push(CacheImageSpec {
            path: path.into(),
            address,
            bytes: Some(macho),
        });
        self
    }

    /// Adds an image at the vmaddr of its first segment.
    pub fn image(self, path: &str, macho: Vec<u8>) -> Self {
        let address = crate::macho::MachImage::parse(&macho)
            .ok()
            .and_then(|image| image.segments().first().map(|s| s.vmaddr))
            .expect("cache test image needs a segment");
        self.image_at(path, address, macho)
    }

    /// Lists an image whose address no mapping covers.
    pub fn unmapped_image(mut self, path: &str, address: u64) -> Self {
        self.images.push(CacheImageSpec {
            path: path.into(),
            address,
            bytes: None,
        });
        self
    }

    pub fn subcache(mut self, suffix: &str, uuid: [u8; 16], address: u64, size: u64) -> Self {
        self.subcaches.push(SubcacheSpec {
            suffix: suffix.into(),
            uuid,
            address,
            size,
        });
        self
    }

    /// Writes subcache files with this UUID instead of the listed one.
    pub fn subcache_uuid_override(mut self, uuid: [u8; 16]) -> Self {
        self.subcache_uuid_override = Some(uuid);
        self
    }

    pub fn images_count_override(mut self, count: u32) -> Self {
        self.images_count_override = Some(count);
        self
    }

    /// Records local symbols for the image at table index `image`.
    pub fn locals(mut self, image: usize, symbols: &[(&str, u64)]) -> Self {
        let symbols = symbols.iter().map(|(n, a)| (n.to_string(), *a)).collect();
        self.locals.push((image, symbols));
        self
    }

    /// Moves the local symbols into a `.symbols` file with this UUID.
    pub fn symbols_file(mut self, uuid: [u8; 16]) -> Self {
        self.symbols_file_uuid = Some(uuid);
        self
    }

    fn header(&self, uuid: [u8; 16]) -> Vec<u8> {
        let mut buf = vec![0u8; DyldCacheHeader::SIZE];
        let magic = format!("dyld_v1 {:>7}", self.arch);
        buf[..magic.len()].copy_from_slice(magic.as_bytes());
        put_u32(&mut buf, offset_of!(DyldCacheHeader, mapping_offset), DyldCacheHeader::SIZE as u32);
        let at = offset_of!(DyldCacheHeader, uuid);
        buf[at..at + 16].copy_from_slice(&uuid);
        buf
    }

    /// Serializes the local symbols info, its offsets relative to itself.
    fn local_symbols_blob(&self) -> Vec<u8> {
        let wide = self.symbols_file_uuid.is_some();
        let entry_size = if wide { 16 } else { 12 };
        let entries_count = self.images.len();

        let mut entries = Vec::new();
        let mut nlists = Vec::new();
        let mut strings = vec![0u8];
        let mut nlist_count = 0u32;
        for index in 0..entries_count {
            let start = nlist_count;
            for (name, address) in self
                .locals
                .iter()
                .filter(|(image, _)| *image == index)
                .flat_map(|(_, symbols)| symbols)
            {
                let nlist = Nlist64 {
                    n_strx: strings.len() as u32,
                    n_type: N_SECT,
                    n_sect: 1,
                    n_desc: 0,
                    n_value: *address,
                };
                strings.extend_from_slice(name.as_bytes());
                strings.push(0);
                nlists.extend_from_slice(nlist.as_bytes());
                nlist_count += 1;
            }
            let dylib_offset = self.images[index].address.wrapping_sub(self.base);
            if wide {
                entries.write_u64::<LittleEndian>(dylib_offset).unwrap();
            } else {
                entries.write_u32::<LittleEndian>(dylib_offset as u32).unwrap();
            }
            entries.write_u32::<LittleEndian>(start).unwrap();
            entries.write_u32::<LittleEndian>(nlist_count - start).unwrap();
        }

        let entries_offset = 24u32;
        let nlist_offset = entries_offset + (entries_count * entry_size) as u32;
        let strings_offset = nlist_offset + nlists.len() as u32;

        let mut out = Vec::new();
        for field in [
            nlist_offset,
            nlist_count,
            strings_offset,
            strings.len() as u32,
            entries_offset,
            entries_count as u32,
        ] {
            out.write_u32::<LittleEndian>(field).unwrap();
        }
        out.extend_from_slice(&entries);
        out.extend_from_slice(&nlists);
        out.extend_from_slice(&strings);
        out
    }

    fn set_local_symbols(buf: &mut Vec<u8>, blob: &[u8]) {
        pad_to(buf, 8);
        let at = buf.len();
        buf.extend_from_slice(blob);
        put_u64(buf, offset_of!(DyldCacheHeader, local_symbols_offset), at as u64);
        put_u64(buf, offset_of!(DyldCacheHeader, local_symbols_size), blob.len() as u64);
    }

    pub fn write(self, path: &Path) {
        let mut buf = self.header(self.uuid);

        // Mapping table, patched once the file size is known
        let mapping_at = buf.len();
        buf.resize(mapping_at + 32, 0);
        put_u32(&mut buf, offset_of!(DyldCacheHeader, mapping_count), 1);

        let sub_at = buf.len();
        for sub in &self.subcaches {
            buf.extend_from_slice(&sub.uuid);
            buf.write_u64::<LittleEndian>(sub.address - self.base).unwrap();
            let mut suffix = [0u8; 32];
            suffix[..sub.suffix.len()].copy_from_slice(sub.suffix.as_bytes());
            buf.extend_from_slice(&suffix);
        }
        put_u32(&mut buf, offset_of!(DyldCacheHeader, sub_cache_array_offset), sub_at as u32);
        put_u32(
            &mut buf,
            offset_of!(DyldCacheHeader, sub_cache_array_count),
            self.subcaches.len() as u32,
        );

        let table_at = buf.len();
        buf.resize(table_at + self.images.len() * 32, 0);
        put_u32(&mut buf, offset_of!(DyldCacheHeader, images_offset), table_at as u32);
        put_u32(
            &mut buf,
            offset_of!(DyldCacheHeader, images_count),
            self.images_count_override
                .unwrap_or(self.images.len() as u32),
        );
        for (i, image) in self.images.iter().enumerate() {
            let path_at = buf.len() as u32;
            buf.extend_from_slice(image.path.as_bytes());
            buf.push(0);
            let entry = table_at + i * 32;
            put_u64(&mut buf, entry, image.address);
            put_u64(&mut buf, entry + 8, 0x6000_0000 + i as u64);
            put_u64(&mut buf, entry + 16, 100 + i as u64);
            put_u32(&mut buf, entry + 24, path_at);
        }

        let locals = (!self.locals.is_empty()).then(|| self.local_symbols_blob());
        match (&locals, self.symbols_file_uuid) {
            (Some(blob), None) => Self::set_local_symbols(&mut buf, blob),
            (_, Some(uuid)) => {
                let at = offset_of!(DyldCacheHeader, symbol_file_uuid);
                buf[at..at + 16].copy_from_slice(&uuid);
            }
            _ => {}
        }

        for image in &self.images {
            let Some(bytes) = &image.bytes else { continue };
            let at = (image.address - self.base) as usize;
            assert!(at >= buf.len(), "cache header tables overlap an image");
            buf.resize(at, 0);
            buf.extend_from_slice(bytes);
        }
        let len = align(buf.len(), 0x4000).max(0x10000);
        buf.resize(len, 0);

        put_u64(&mut buf, mapping_at, self.base);
        put_u64(&mut buf, mapping_at + 8, len as u64);
        put_u64(&mut buf, mapping_at + 16, 0);
        put_u32(&mut buf, mapping_at + 24, 5);
        put_u32(&mut buf, mapping_at + 28, 5);
        std::fs::write(path, &buf).unwrap();

        for sub in &self.subcaches {
            let mut sub_buf = self.header(self.subcache_uuid_override.unwrap_or(sub.uuid));
            let at = sub_buf.len();
            put_u32(&mut sub_buf, offset_of!(DyldCacheHeader, mapping_with_slide_offset), at as u32);
            put_u32(&mut sub_buf, offset_of!(DyldCacheHeader, mapping_with_slide_count), 1);
            sub_buf.write_u64::<LittleEndian>(sub.address).unwrap();
            sub_buf.write_u64::<LittleEndian>(sub.size).unwrap();
            sub_buf.write_u64::<LittleEndian>(0).unwrap();
            sub_buf.write_u64::<LittleEndian>(0).unwrap();
            sub_buf.write_u64::<LittleEndian>(0).unwrap();
            sub_buf.write_u64::<LittleEndian>(0).unwrap();
            sub_buf.write_u32::<LittleEndian>(1).unwrap();
            sub_buf.write_u32::<LittleEndian>(1).unwrap();
            sub_buf.resize((sub.size as usize).max(sub_buf.len()), 0);

            let mut name = path.as_os_str().to_owned();
            name.push(&sub.suffix);
            std::fs::write(name, &sub_buf).unwrap();
        }

        if let (Some(blob), Some(uuid)) = (&locals, self.symbols_file_uuid) {
            let mut sym_buf = self.header(uuid);
            Self::set_local_symbols(&mut sym_buf, blob);
            let mut name = path.as_os_str().to_owned();
            name.push(".symbols");
            std::fs::write(name, &sym_buf).unwrap();
        }
    }
}
