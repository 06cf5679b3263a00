//! Mach-O, fat and code signature constants and flags.

use bitflags::bitflags;

// =============================================================================
// Magic Numbers
// =============================================================================

/// 64-bit Mach-O magic (little-endian)
pub const MH_MAGIC_64: u32 = 0xFEEDFACF;

/// 64-bit Mach-O magic (big-endian, needs byte swap)
pub const MH_CIGAM_64: u32 = 0xCFFAEDFE;

/// 32-bit Mach-O magic (little-endian)
pub const MH_MAGIC: u32 = 0xFEEDFACE;

/// 32-bit Mach-O magic (big-endian)
pub const MH_CIGAM: u32 = 0xCEFAEDFE;

/// Fat binary magic, 32-bit slice table (stored big-endian)
pub const FAT_MAGIC: u32 = 0xCAFEBABE;

/// Fat binary magic, 64-bit slice table (stored big-endian)
pub const FAT_MAGIC_64: u32 = 0xCAFEBABF;

// =============================================================================
// File Types
// =============================================================================

/// Object file
pub const MH_OBJECT: u32 = 0x1;
/// Executable
pub const MH_EXECUTE: u32 = 0x2;
/// Fixed VM shared library
pub const MH_FVMLIB: u32 = 0x3;
/// Core dump
pub const MH_CORE: u32 = 0x4;
/// Preloaded executable
pub const MH_PRELOAD: u32 = 0x5;
/// Dynamically bound shared library
pub const MH_DYLIB: u32 = 0x6;
/// Dynamic link editor
pub const MH_DYLINKER: u32 = 0x7;
/// Bundle
pub const MH_BUNDLE: u32 = 0x8;
/// Shared library stub
pub const MH_DYLIB_STUB: u32 = 0x9;
/// Debug symbols file
pub const MH_DSYM: u32 = 0xA;
/// Kernel extension bundle
pub const MH_KEXT_BUNDLE: u32 = 0xB;
/// File set (kernel cache)
pub const MH_FILESET: u32 = 0xC;

// =============================================================================
// CPU Types
// =============================================================================

/// 64-bit architecture flag
pub const CPU_ARCH_ABI64: i32 = 0x0100_0000;
/// ILP32 on a 64-bit architecture flag
pub const CPU_ARCH_ABI64_32: i32 = 0x0200_0000;

/// ARM CPU type
pub const CPU_TYPE_ARM: i32 = 12;
/// ARM64 CPU type
pub const CPU_TYPE_ARM64: i32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
/// ARM64_32 CPU type (watchOS)
pub const CPU_TYPE_ARM64_32: i32 = CPU_TYPE_ARM | CPU_ARCH_ABI64_32;

/// x86 CPU type
pub const CPU_TYPE_X86: i32 = 7;
/// x86_64 CPU type
pub const CPU_TYPE_X86_64: i32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;

/// PowerPC CPU type
pub const CPU_TYPE_POWERPC: i32 = 18;

// =============================================================================
// CPU Subtypes
// =============================================================================

/// i386 all
pub const CPU_SUBTYPE_I386_ALL: i32 = 3;
/// x86_64 all
pub const CPU_SUBTYPE_X86_64_ALL: i32 = 3;
/// x86_64 Haswell
pub const CPU_SUBTYPE_X86_64_H: i32 = 8;

/// ARMv6
pub const CPU_SUBTYPE_ARM_V6: i32 = 6;
/// ARMv7
pub const CPU_SUBTYPE_ARM_V7: i32 = 9;
/// ARMv7s
pub const CPU_SUBTYPE_ARM_V7S: i32 = 11;
/// ARMv7k (watchOS)
pub const CPU_SUBTYPE_ARM_V7K: i32 = 12;
/// ARMv6-M
pub const CPU_SUBTYPE_ARM_V6M: i32 = 14;
/// ARMv7-M
pub const CPU_SUBTYPE_ARM_V7M: i32 = 15;
/// ARMv7E-M
pub const CPU_SUBTYPE_ARM_V7EM: i32 = 16;

/// ARM64 all
pub const CPU_SUBTYPE_ARM64_ALL: i32 = 0;
/// ARM64 v8
pub const CPU_SUBTYPE_ARM64_V8: i32 = 1;
/// ARM64e (pointer authentication)
pub const CPU_SUBTYPE_ARM64E: i32 = 2;

/// ARM64_32 all
pub const CPU_SUBTYPE_ARM64_32_ALL: i32 = 0;
/// ARM64_32 v8
pub const CPU_SUBTYPE_ARM64_32_V8: i32 = 1;

/// PowerPC all
pub const CPU_SUBTYPE_POWERPC_ALL: i32 = 0;

/// arm64e pointer authentication ABI bit
pub const CPU_SUBTYPE_PTRAUTH_ABI: u32 = 0x8000_0000;
/// arm64e kernel ABI bit
pub const CPU_SUBTYPE_ARM64_PTR_AUTH_KERNEL: u32 = 0x4000_0000;

// =============================================================================
// Load Commands
// =============================================================================

/// Load command requiring dynamic linker
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

/// Segment of this file
pub const LC_SEGMENT: u32 = 0x1;
/// Link-edit symbol table info
pub const LC_SYMTAB: u32 = 0x2;
/// Link-edit gdb symbol table info (obsolete)
pub const LC_SYMSEG: u32 = 0x3;
/// Thread
pub const LC_THREAD: u32 = 0x4;
/// Unix thread
pub const LC_UNIXTHREAD: u32 = 0x5;
/// Load a fixed VM shared library
pub const LC_LOADFVMLIB: u32 = 0x6;
/// Fixed VM shared library identification
pub const LC_IDFVMLIB: u32 = 0x7;
/// Object identification
pub const LC_IDENT: u32 = 0x8;
/// Fixed VM file inclusion
pub const LC_FVMFILE: u32 = 0x9;
/// Prepage command
pub const LC_PREPAGE: u32 = 0xA;
/// Dynamic link-edit symbol table info
pub const LC_DYSYMTAB: u32 = 0xB;
/// Load a dynamically linked shared library
pub const LC_LOAD_DYLIB: u32 = 0xC;
/// Dynamically linked shared lib identification
pub const LC_ID_DYLIB: u32 = 0xD;
/// Load a dynamic linker
pub const LC_LOAD_DYLINKER: u32 = 0xE;
/// Dynamic linker identification
pub const LC_ID_DYLINKER: u32 = 0xF;
/// Prebound modules
pub const LC_PREBOUND_DYLIB: u32 = 0x10;
/// Image routines
pub const LC_ROUTINES: u32 = 0x11;
/// Sub framework
pub const LC_SUB_FRAMEWORK: u32 = 0x12;
/// Sub umbrella
pub const LC_SUB_UMBRELLA: u32 = 0x13;
/// Sub client
pub const LC_SUB_CLIENT: u32 = 0x14;
/// Sub library
pub const LC_SUB_LIBRARY: u32 = 0x15;
/// Two-level namespace hints
pub const LC_TWOLEVEL_HINTS: u32 = 0x16;
/// Prebind checksum
pub const LC_PREBIND_CKSUM: u32 = 0x17;
/// Load a weak dynamically linked shared library
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD;
/// 64-bit segment
pub const LC_SEGMENT_64: u32 = 0x19;
/// 64-bit image routines
pub const LC_ROUTINES_64: u32 = 0x1A;
/// UUID
pub const LC_UUID: u32 = 0x1B;
/// Runpath additions
pub const LC_RPATH: u32 = 0x1C | LC_REQ_DYLD;
/// Location of code signature
pub const LC_CODE_SIGNATURE: u32 = 0x1D;
/// Location of segment split info
pub const LC_SEGMENT_SPLIT_INFO: u32 = 0x1E;
/// Load and re-export dylib
pub const LC_REEXPORT_DYLIB: u32 = 0x1F | LC_REQ_DYLD;
/// Delay load of dylib
pub const LC_LAZY_LOAD_DYLIB: u32 = 0x20;
/// Encrypted segment information
pub const LC_ENCRYPTION_INFO: u32 = 0x21;
/// Compressed dyld info
pub const LC_DYLD_INFO: u32 = 0x22;
/// Compressed dyld info only
pub const LC_DYLD_INFO_ONLY: u32 = 0x22 | LC_REQ_DYLD;
/// Load upward dylib
pub const LC_LOAD_UPWARD_DYLIB: u32 = 0x23 | LC_REQ_DYLD;
/// Build for macOS min version
pub const LC_VERSION_MIN_MACOSX: u32 = 0x24;
/// Build for iOS min version
pub const LC_VERSION_MIN_IPHONEOS: u32 = 0x25;
/// Location of function starts
pub const LC_FUNCTION_STARTS: u32 = 0x26;
/// Environment variable string
pub const LC_DYLD_ENVIRONMENT: u32 = 0x27;
/// Main entry point (replacement for LC_UNIXTHREAD)
pub const LC_MAIN: u32 = 0x28 | LC_REQ_DYLD;
/// Table of non-instructions in __text
pub const LC_DATA_IN_CODE: u32 = 0x29;
/// Source version
pub const LC_SOURCE_VERSION: u32 = 0x2A;
/// Code signing DRs copied from linked dylibs
pub const LC_DYLIB_CODE_SIGN_DRS: u32 = 0x2B;
/// 64-bit encrypted segment information
pub const LC_ENCRYPTION_INFO_64: u32 = 0x2C;
/// Linker options
pub const LC_LINKER_OPTION: u32 = 0x2D;
/// Optimization hints
pub const LC_LINKER_OPTIMIZATION_HINT: u32 = 0x2E;
/// Build for tvOS min version
pub const LC_VERSION_MIN_TVOS: u32 = 0x2F;
/// Build for watchOS min version
pub const LC_VERSION_MIN_WATCHOS: u32 = 0x30;
/// Arbitrary data included within a Mach-O file
pub const LC_NOTE: u32 = 0x31;
/// Build for platform min version
pub const LC_BUILD_VERSION: u32 = 0x32;
/// Used with linkedit_data_command, payload is trie
pub const LC_DYLD_EXPORTS_TRIE: u32 = 0x33 | LC_REQ_DYLD;
/// Used with linkedit_data_command
pub const LC_DYLD_CHAINED_FIXUPS: u32 = 0x34 | LC_REQ_DYLD;
/// File set entry
pub const LC_FILESET_ENTRY: u32 = 0x35 | LC_REQ_DYLD;
/// Atom info
pub const LC_ATOM_INFO: u32 = 0x36;

// =============================================================================
// Section Types
// =============================================================================

/// Section types mask
pub const SECTION_TYPE: u32 = 0x0000_00FF;

/// Zero fill on demand
pub const S_ZEROFILL: u32 = 0x1;
/// Section with literal C strings
pub const S_CSTRING_LITERALS: u32 = 0x2;
/// Zero fill on demand (>4GB)
pub const S_GB_ZEROFILL: u32 = 0xC;
/// Thread local zerofill section
pub const S_THREAD_LOCAL_ZEROFILL: u32 = 0x12;

// =============================================================================
// Symbol Types
// =============================================================================

/// If any of these bits set, a symbolic debugging entry
pub const N_STAB: u8 = 0xE0;
/// Mask for the type bits
pub const N_TYPE: u8 = 0x0E;
/// External symbol bit
pub const N_EXT: u8 = 0x01;

/// Undefined symbol
pub const N_UNDF: u8 = 0x0;
/// Absolute symbol
pub const N_ABS: u8 = 0x2;
/// Defined in section number n_sect
pub const N_SECT: u8 = 0xE;
/// Indirect
pub const N_INDR: u8 = 0xA;

/// Undefined symbol is allowed to be missing (n_desc)
pub const N_WEAK_REF: u16 = 0x0040;
/// Coalesced symbol is a weak definition (n_desc)
pub const N_WEAK_DEF: u16 = 0x0080;

/// Library ordinal stored in the high byte of n_desc.
#[inline]
pub const fn get_library_ordinal(n_desc: u16) -> u8 {
    ((n_desc >> 8) & 0xFF) as u8
}

// =============================================================================
// Code Signature
// =============================================================================

/// Embedded signature superblob
pub const CSMAGIC_EMBEDDED_SIGNATURE: u32 = 0xFADE_0CC0;
/// Embedded XML entitlements blob
pub const CSMAGIC_EMBEDDED_ENTITLEMENTS: u32 = 0xFADE_7171;
/// Embedded DER entitlements blob
pub const CSMAGIC_EMBEDDED_DER_ENTITLEMENTS: u32 = 0xFADE_7172;
/// Code directory blob
pub const CSMAGIC_CODEDIRECTORY: u32 = 0xFADE_0C02;

/// Code directory slot
pub const CSSLOT_CODEDIRECTORY: u32 = 0;
/// XML entitlements slot
pub const CSSLOT_ENTITLEMENTS: u32 = 5;
/// DER entitlements slot
pub const CSSLOT_DER_ENTITLEMENTS: u32 = 7;

// =============================================================================
// Chained Fixups
// =============================================================================

/// lib_ordinal:8 weak_import:1 name_offset:23
pub const DYLD_CHAINED_IMPORT: u32 = 1;
/// DYLD_CHAINED_IMPORT plus a 32-bit addend
pub const DYLD_CHAINED_IMPORT_ADDEND: u32 = 2;
/// lib_ordinal:16 weak_import:1 reserved:15 name_offset:32, plus a 64-bit addend
pub const DYLD_CHAINED_IMPORT_ADDEND64: u32 = 3;

/// Uncompressed symbol strings
pub const DYLD_CHAINED_SYMBOL_UNCOMPRESSED: u32 = 0;

// =============================================================================
// Header Flags
// =============================================================================

bitflags! {
    /// Mach-O header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MachOFlags: u32 {
        /// The object file has no undefined references
        const NOUNDEFS = 0x1;
        /// The object file is the output of an incremental link
        const INCRLINK = 0x2;
        /// The object file is input for the dynamic linker
        const DYLDLINK = 0x4;
        /// The object file's undefined references are bound by the dynamic linker
        const BINDATLOAD = 0x8;
        /// The file has its dynamic undefined references prebound
        const PREBOUND = 0x10;
        /// The file has its read-only and read-write segments split
        const SPLIT_SEGS = 0x20;
        /// The shared library init routine is to be run lazily
        const LAZY_INIT = 0x40;
        /// The image is using two-level name space bindings
        const TWOLEVEL = 0x80;
        /// The executable is forcing all images to use flat name space bindings
        const FORCE_FLAT = 0x100;
        /// This umbrella guarantees no multiple definitions of symbols in its sub-images
        const NOMULTIDEFS = 0x200;
        /// Do not have dyld notify the prebinding agent about this executable
        const NOFIXPREBINDING = 0x400;
        /// The binary is not prebound but can have its prebinding redone
        const PREBINDABLE = 0x800;
        /// Binds to all two-level namespace modules of its dependent libraries
        const ALLMODSBOUND = 0x1000;
        /// Safe to divide up the sections into sub-sections via symbols
        const SUBSECTIONS_VIA_SYMBOLS = 0x2000;
        /// The binary has been canonicalized via the unprebind operation
        const CANONICAL = 0x4000;
        /// The final linked image contains external weak symbols
        const WEAK_DEFINES = 0x8000;
        /// The final linked image uses weak symbols
        const BINDS_TO_WEAK = 0x10000;
        /// All stacks in the task will be given stack execution privilege
        const ALLOW_STACK_EXECUTION = 0x20000;
        /// The binary declares it is safe for use in processes with uid zero
        const ROOT_SAFE = 0x40000;
        /// The binary declares it is safe for use in processes when issetugid() is true
        const SETUID_SAFE = 0x80000;
        /// No re-exported dylibs need to be examined by the static linker
        const NO_REEXPORTED_DYLIBS = 0x100000;
        /// The OS will load the main executable at a random address
        const PIE = 0x200000;
        /// The static linker may drop the load command if no symbols are referenced
        const DEAD_STRIPPABLE_DYLIB = 0x400000;
        /// Contains a section of type S_THREAD_LOCAL_VARIABLES
        const HAS_TLV_DESCRIPTORS = 0x800000;
        /// Run the main executable with a non-executable heap
        const NO_HEAP_EXECUTION = 0x1000000;
        /// The code was linked for use in an application extension
        const APP_EXTENSION_SAFE = 0x2000000;
        /// The nlist symbol table does not include all the symbols in the dyld info
        const NLIST_OUTOFSYNC_WITH_DYLDINFO = 0x4000000;
        /// Allow simulator platforms in version load commands
        const SIM_SUPPORT = 0x8000000;
        /// The dylib is part of the dyld shared cache
        const DYLIB_IN_CACHE = 0x80000000;
    }
}

bitflags! {
    /// Virtual memory protection bits of a segment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VmProt: u32 {
        /// Readable
        const READ = 0x1;
        /// Writable
        const WRITE = 0x2;
        /// Executable
        const EXECUTE = 0x4;
    }
}
