//! Mach-O binary structures.
//!
//! These structures match the on-disk format of little-endian Mach-O files
//! and are read with [`ByteView::read_at`](crate::util::ByteView::read_at).

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::arch::arch_name;
use super::constants::*;

/// Returns the string in a fixed-width, NUL-padded name field.
#[inline]
pub(crate) fn fixed_name(field: &[u8; 16]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(16);
    std::str::from_utf8(&field[..end]).unwrap_or("")
}

/// Writes a string into a fixed-width, NUL-padded name field.
#[inline]
pub(crate) fn set_fixed_name(field: &mut [u8; 16], name: &str) {
    *field = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(16);
    field[..len].copy_from_slice(&bytes[..len]);
}

// =============================================================================
// Header Structures
// =============================================================================

/// 32-bit Mach-O header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader32 {
    /// Magic number (MH_MAGIC)
    pub magic: u32,
    /// CPU type
    pub cputype: i32,
    /// CPU subtype
    pub cpusubtype: i32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
}

impl MachHeader32 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 28;
}

/// 64-bit Mach-O header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader64 {
    /// Magic number (MH_MAGIC_64)
    pub magic: u32,
    /// CPU type
    pub cputype: i32,
    /// CPU subtype
    pub cpusubtype: i32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
    /// Reserved
    pub reserved: u32,
}

impl MachHeader64 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 32;

    /// Returns the architecture as a string.
    pub fn arch_name(&self) -> &'static str {
        arch_name(self.cputype, self.cpusubtype)
    }
}

impl Default for MachHeader64 {
    fn default() -> Self {
        Self {
            magic: MH_MAGIC_64,
            cputype: 0,
            cpusubtype: 0,
            filetype: 0,
            ncmds: 0,
            sizeofcmds: 0,
            flags: 0,
            reserved: 0,
        }
    }
}

// =============================================================================
// Load Command Header
// =============================================================================

/// Generic load command header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LoadCommandHeader {
    /// Type of load command
    pub cmd: u32,
    /// Size of load command
    pub cmdsize: u32,
}

impl LoadCommandHeader {
    /// Size of the load command header.
    pub const SIZE: usize = 8;
}

// =============================================================================
// Segment Commands
// =============================================================================

/// 32-bit segment command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand32 {
    /// LC_SEGMENT
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u32,
    /// Virtual memory size
    pub vmsize: u32,
    /// File offset
    pub fileoff: u32,
    /// Amount of file to map
    pub filesize: u32,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand32 {
    /// Size of the segment command (without sections).
    pub const SIZE: usize = 56;
}

/// 64-bit segment command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand64 {
    /// LC_SEGMENT_64
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset
    pub fileoff: u64,
    /// Amount of file to map
    pub filesize: u64,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand64 {
    /// Size of the segment command (without sections).
    pub const SIZE: usize = 72;

    /// Returns the segment name as a string.
    pub fn name(&self) -> &str {
        fixed_name(&self.segname)
    }

    /// Sets the segment name from a string.
    pub fn set_name(&mut self, name: &str) {
        set_fixed_name(&mut self.segname, name);
    }
}

impl Default for SegmentCommand64 {
    fn default() -> Self {
        Self {
            cmd: LC_SEGMENT_64,
            cmdsize: Self::SIZE as u32,
            segname: [0u8; 16],
            vmaddr: 0,
            vmsize: 0,
            fileoff: 0,
            filesize: 0,
            maxprot: 0,
            initprot: 0,
            nsects: 0,
            flags: 0,
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// 32-bit section.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section32 {
    /// Section name (16 bytes, null-padded)
    pub sectname: [u8; 16],
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub addr: u32,
    /// Size in bytes
    pub size: u32,
    /// File offset
    pub offset: u32,
    /// Alignment (power of 2)
    pub align: u32,
    /// File offset of relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Flags
    pub flags: u32,
    /// Reserved (for runtime use)
    pub reserved1: u32,
    /// Reserved (for runtime use)
    pub reserved2: u32,
}

impl Section32 {
    /// Size of a section entry.
    pub const SIZE: usize = 68;
}

/// 64-bit section.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section64 {
    /// Section name (16 bytes, null-padded)
    pub sectname: [u8; 16],
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub addr: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset
    pub offset: u32,
    /// Alignment (power of 2)
    pub align: u32,
    /// File offset of relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Flags
    pub flags: u32,
    /// Reserved (for runtime use)
    pub reserved1: u32,
    /// Reserved (for runtime use)
    pub reserved2: u32,
    /// Reserved
    pub reserved3: u32,
}

impl Section64 {
    /// Size of a section entry.
    pub const SIZE: usize = 80;

    /// Sets the section and segment names.
    pub fn set_names(&mut self, segment: &str, section: &str) {
        set_fixed_name(&mut self.segname, segment);
        set_fixed_name(&mut self.sectname, section);
    }
}

impl Default for Section64 {
    fn default() -> Self {
        Self {
            sectname: [0u8; 16],
            segname: [0u8; 16],
            addr: 0,
            size: 0,
            offset: 0,
            align: 0,
            reloff: 0,
            nreloc: 0,
            flags: 0,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
        }
    }
}

// =============================================================================
// Symbol Table Commands
// =============================================================================

/// Symbol table command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SymtabCommand {
    /// LC_SYMTAB
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Symbol table offset
    pub symoff: u32,
    /// Number of symbol table entries
    pub nsyms: u32,
    /// String table offset
    pub stroff: u32,
    /// String table size in bytes
    pub strsize: u32,
}

impl SymtabCommand {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

impl Default for SymtabCommand {
    fn default() -> Self {
        Self {
            cmd: LC_SYMTAB,
            cmdsize: Self::SIZE as u32,
            symoff: 0,
            nsyms: 0,
            stroff: 0,
            strsize: 0,
        }
    }
}

/// Dynamic symbol table command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DysymtabCommand {
    /// LC_DYSYMTAB
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Index of local symbols
    pub ilocalsym: u32,
    /// Number of local symbols
    pub nlocalsym: u32,
    /// Index of externally defined symbols
    pub iextdefsym: u32,
    /// Number of externally defined symbols
    pub nextdefsym: u32,
    /// Index of undefined symbols
    pub iundefsym: u32,
    /// Number of undefined symbols
    pub nundefsym: u32,
    /// File offset to table of contents
    pub tocoff: u32,
    /// Number of entries in table of contents
    pub ntoc: u32,
    /// File offset to module table
    pub modtaboff: u32,
    /// Number of module table entries
    pub nmodtab: u32,
    /// Offset to referenced symbol table
    pub extrefsymoff: u32,
    /// Number of referenced symbol table entries
    pub nextrefsyms: u32,
    /// File offset to the indirect symbol table
    pub indirectsymoff: u32,
    /// Number of indirect symbol table entries
    pub nindirectsyms: u32,
    /// Offset to external relocation entries
    pub extreloff: u32,
    /// Number of external relocation entries
    pub nextrel: u32,
    /// Offset to local relocation entries
    pub locreloff: u32,
    /// Number of local relocation entries
    pub nlocrel: u32,
}

impl DysymtabCommand {
    /// Size of this command.
    pub const SIZE: usize = 80;
}

/// 32-bit symbol table entry.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Nlist32 {
    /// Index into string table
    pub n_strx: u32,
    /// Type flag
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Flags (see <mach-o/stab.h>)
    pub n_desc: u16,
    /// Value
    pub n_value: u32,
}

impl Nlist32 {
    /// Size of an nlist entry.
    pub const SIZE: usize = 12;
}

/// 64-bit symbol table entry.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Nlist64 {
    /// Index into string table
    pub n_strx: u32,
    /// Type flag
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Flags (see <mach-o/stab.h>)
    pub n_desc: u16,
    /// Value
    pub n_value: u64,
}

impl Nlist64 {
    /// Size of an nlist entry.
    pub const SIZE: usize = 16;
}

/// Width-independent view of an nlist entry.
#[derive(Debug, Clone, Copy)]
pub struct NlistEntry {
    /// Index into string table
    pub n_strx: u32,
    /// Type flag
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Flags
    pub n_desc: u16,
    /// Value
    pub n_value: u64,
}

impl NlistEntry {
    /// Returns true if this is an external symbol.
    #[inline]
    pub fn is_external(&self) -> bool {
        (self.n_type & N_EXT) != 0
    }

    /// Returns true if this is an undefined symbol.
    #[inline]
    pub fn is_undefined(&self) -> bool {
        (self.n_type & N_TYPE) == N_UNDF
    }

    /// Returns true if this symbol is defined in a section or absolute.
    #[inline]
    pub fn is_defined(&self) -> bool {
        matches!(self.n_type & N_TYPE, N_SECT | N_ABS | N_INDR)
    }

    /// Returns true if this is a debugging symbol.
    #[inline]
    pub fn is_debug(&self) -> bool {
        (self.n_type & N_STAB) != 0
    }

    /// Returns true for a weak reference.
    #[inline]
    pub fn is_weak_ref(&self) -> bool {
        (self.n_desc & N_WEAK_REF) != 0
    }
}

impl From<Nlist32> for NlistEntry {
    fn from(n: Nlist32) -> Self {
        Self {
            n_strx: n.n_strx,
            n_type: n.n_type,
            n_sect: n.n_sect,
            n_desc: n.n_desc,
            n_value: n.n_value as u64,
        }
    }
}

impl From<Nlist64> for NlistEntry {
    fn from(n: Nlist64) -> Self {
        Self {
            n_strx: n.n_strx,
            n_type: n.n_type,
            n_sect: n.n_sect,
            n_desc: n.n_desc,
            n_value: n.n_value,
        }
    }
}

// =============================================================================
// Dyld Info Command
// =============================================================================

/// Dyld info command (compressed LINKEDIT information).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DyldInfoCommand {
    /// LC_DYLD_INFO or LC_DYLD_INFO_ONLY
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset to rebase info
    pub rebase_off: u32,
    /// Size of rebase info
    pub rebase_size: u32,
    /// File offset to binding info
    pub bind_off: u32,
    /// Size of binding info
    pub bind_size: u32,
    /// File offset to weak binding info
    pub weak_bind_off: u32,
    /// Size of weak binding info
    pub weak_bind_size: u32,
    /// File offset to lazy binding info
    pub lazy_bind_off: u32,
    /// Size of lazy binding info
    pub lazy_bind_size: u32,
    /// File offset to export info
    pub export_off: u32,
    /// Size of export info
    pub export_size: u32,
}

impl DyldInfoCommand {
    /// Size of this command.
    pub const SIZE: usize = 48;
}

impl Default for DyldInfoCommand {
    fn default() -> Self {
        Self {
            cmd: LC_DYLD_INFO_ONLY,
            cmdsize: Self::SIZE as u32,
            rebase_off: 0,
            rebase_size: 0,
            bind_off: 0,
            bind_size: 0,
            weak_bind_off: 0,
            weak_bind_size: 0,
            lazy_bind_off: 0,
            lazy_bind_size: 0,
            export_off: 0,
            export_size: 0,
        }
    }
}

// =============================================================================
// Linkedit Data Command
// =============================================================================

/// Generic linkedit data command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LinkeditDataCommand {
    /// Command type (LC_CODE_SIGNATURE, LC_DYLD_EXPORTS_TRIE, etc.)
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset
    pub dataoff: u32,
    /// Size
    pub datasize: u32,
}

impl LinkeditDataCommand {
    /// Size of this command.
    pub const SIZE: usize = 16;

    /// Creates a command of the given type.
    pub fn new(cmd: u32, dataoff: u32, datasize: u32) -> Self {
        Self {
            cmd,
            cmdsize: Self::SIZE as u32,
            dataoff,
            datasize,
        }
    }
}

// =============================================================================
// String-Carrying Commands
// =============================================================================

/// Dylib reference (shared by several load commands).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Dylib {
    /// Library's path name offset
    pub name_offset: u32,
    /// Library's build timestamp
    pub timestamp: u32,
    /// Library's current version number
    pub current_version: u32,
    /// Library's compatibility version number
    pub compatibility_version: u32,
}

/// Dylib load command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DylibCommand {
    /// LC_LOAD_DYLIB, LC_ID_DYLIB, etc.
    pub cmd: u32,
    /// Total size (includes path string)
    pub cmdsize: u32,
    /// Library identification
    pub dylib: Dylib,
}

impl DylibCommand {
    /// Minimum size of this command (without path string).
    pub const SIZE: usize = 24;
}

/// Command whose payload is a single string (dylinker, rpath, sub-framework).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct StringCommand {
    /// Command type
    pub cmd: u32,
    /// Total size (includes string)
    pub cmdsize: u32,
    /// Offset of the string from the start of the command
    pub offset: u32,
}

impl StringCommand {
    /// Minimum size of this command.
    pub const SIZE: usize = 12;
}

// =============================================================================
// UUID Command
// =============================================================================

/// UUID command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UuidCommand {
    /// LC_UUID
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// UUID
    pub uuid: [u8; 16],
}

impl UuidCommand {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

impl Default for UuidCommand {
    fn default() -> Self {
        Self {
            cmd: LC_UUID,
            cmdsize: Self::SIZE as u32,
            uuid: [0u8; 16],
        }
    }
}

// =============================================================================
// Version Commands
// =============================================================================

/// Build version command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct BuildVersionCommand {
    /// LC_BUILD_VERSION
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Platform
    pub platform: u32,
    /// Minimum OS version (X.Y.Z packed into 32 bits)
    pub minos: u32,
    /// SDK version (X.Y.Z packed into 32 bits)
    pub sdk: u32,
    /// Number of tool entries following
    pub ntools: u32,
}

impl BuildVersionCommand {
    /// Size of this command (without tool entries).
    pub const SIZE: usize = 24;
    /// Size of one tool entry.
    pub const TOOL_SIZE: usize = 8;
}

/// Minimum OS version command (LC_VERSION_MIN_*).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct VersionMinCommand {
    /// LC_VERSION_MIN_*
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// X.Y.Z packed into 32 bits
    pub version: u32,
    /// X.Y.Z packed into 32 bits
    pub sdk: u32,
}

impl VersionMinCommand {
    /// Size of this command.
    pub const SIZE: usize = 16;
}

/// Source version command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SourceVersionCommand {
    /// LC_SOURCE_VERSION
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// A.B.C.D.E packed into 64 bits
    pub version: u64,
}

impl SourceVersionCommand {
    /// Size of this command.
    pub const SIZE: usize = 16;
}

// =============================================================================
// Entry Point / Encryption / Fileset
// =============================================================================

/// Main entry point command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EntryPointCommand {
    /// LC_MAIN
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset of main()
    pub entryoff: u64,
    /// Initial stack size, if not zero
    pub stacksize: u64,
}

impl EntryPointCommand {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

/// 32-bit encryption info command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EncryptionInfoCommand {
    /// LC_ENCRYPTION_INFO
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset of the encrypted range
    pub cryptoff: u32,
    /// Size of the encrypted range
    pub cryptsize: u32,
    /// Encryption system, 0 when not encrypted
    pub cryptid: u32,
}

impl EncryptionInfoCommand {
    /// Size of this command.
    pub const SIZE: usize = 20;
}

/// 64-bit encryption info command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EncryptionInfoCommand64 {
    /// LC_ENCRYPTION_INFO_64
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset of the encrypted range
    pub cryptoff: u32,
    /// Size of the encrypted range
    pub cryptsize: u32,
    /// Encryption system, 0 when not encrypted
    pub cryptid: u32,
    /// Padding to an 8-byte boundary
    pub pad: u32,
}

impl EncryptionInfoCommand64 {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

/// Fileset entry command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FilesetEntryCommand {
    /// LC_FILESET_ENTRY
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Virtual memory address
    pub vmaddr: u64,
    /// File offset
    pub fileoff: u64,
    /// Offset to entry path name
    pub entry_id_offset: u32,
    /// Reserved
    pub reserved: u32,
}

impl FilesetEntryCommand {
    /// Minimum size of this command.
    pub const SIZE: usize = 32;
}

// =============================================================================
// Chained Fixups
// =============================================================================

/// Header of the LC_DYLD_CHAINED_FIXUPS payload.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DyldChainedFixupsHeader {
    /// 0
    pub fixups_version: u32,
    /// Offset of dyld_chained_starts_in_image in chain_data
    pub starts_offset: u32,
    /// Offset of imports table in chain_data
    pub imports_offset: u32,
    /// Offset of symbol strings in chain_data
    pub symbols_offset: u32,
    /// Number of imported symbol names
    pub imports_count: u32,
    /// DYLD_CHAINED_IMPORT*
    pub imports_format: u32,
    /// 0 => uncompressed, 1 => zlib compressed
    pub symbols_format: u32,
}

impl DyldChainedFixupsHeader {
    /// Size of the header.
    pub const SIZE: usize = 28;
}

// =============================================================================
// Display Implementations
// =============================================================================

impl fmt::Display for MachHeader64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MachO {{ arch: {}, type: {:#x}, cmds: {}, flags: {:#x} }}",
            self.arch_name(),
            self.filetype,
            self.ncmds,
            self.flags
        )
    }
}

impl fmt::Display for SegmentCommand64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Segment {{ name: \"{}\", vm: {:#x}+{:#x}, file: {:#x}+{:#x}, sects: {} }}",
            self.name(),
            self.vmaddr,
            self.vmsize,
            self.fileoff,
            self.filesize,
            self.nsects
        )
    }
}
