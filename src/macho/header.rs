//! Mach-O header validation and the borrowed image view.
//!
//! [`MachImage::validate`] runs every structural check without retaining
//! anything. [`MachImage::parse`] runs the same checks and keeps a view that
//! later queries (segments, symbols, signatures) read from lazily.

use std::fmt;

use tracing::error;

use super::arch::{self, Architecture};
use super::commands::{LoadCommand, LoadCommandKind};
use super::constants::*;
use super::structs::*;
use crate::error::{Error, Result};
use crate::util::ByteView;

// =============================================================================
// Classification
// =============================================================================

/// What the first four bytes of a buffer say about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachKind {
    /// Little-endian 32-bit image
    Macho32,
    /// Little-endian 64-bit image
    Macho64,
    /// Byte-swapped image; recognised but not parsed
    BigEndianForeign,
    /// Anything else
    NotMachO,
}

impl MachKind {
    /// Classifies a buffer by its magic.
    pub fn classify(bytes: &[u8]) -> Self {
        match ByteView::new(bytes).u32_le_at(0) {
            Ok(MH_MAGIC) => MachKind::Macho32,
            Ok(MH_MAGIC_64) => MachKind::Macho64,
            Ok(MH_CIGAM) | Ok(MH_CIGAM_64) => MachKind::BigEndianForeign,
            _ => MachKind::NotMachO,
        }
    }
}

/// Mach-O file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Relocatable object file
    Object,
    /// Demand paged executable
    Execute,
    /// Fixed VM shared library
    FvmLib,
    /// Core file
    Core,
    /// Preloaded executable
    Preload,
    /// Dynamically bound shared library
    Dylib,
    /// Dynamic link editor
    Dylinker,
    /// Dynamically bound bundle
    Bundle,
    /// Shared library stub for static linking only
    DylibStub,
    /// Companion file with only debug sections
    Dsym,
    /// x86_64 kext
    KextBundle,
    /// Kernel collection
    Fileset,
    /// A value outside the known range
    Unknown(u32),
}

impl FileType {
    /// Resolves a raw `filetype` value.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            MH_OBJECT => FileType::Object,
            MH_EXECUTE => FileType::Execute,
            MH_FVMLIB => FileType::FvmLib,
            MH_CORE => FileType::Core,
            MH_PRELOAD => FileType::Preload,
            MH_DYLIB => FileType::Dylib,
            MH_DYLINKER => FileType::Dylinker,
            MH_BUNDLE => FileType::Bundle,
            MH_DYLIB_STUB => FileType::DylibStub,
            MH_DSYM => FileType::Dsym,
            MH_KEXT_BUNDLE => FileType::KextBundle,
            MH_FILESET => FileType::Fileset,
            other => FileType::Unknown(other),
        }
    }

    /// Returns the raw `filetype` value.
    pub fn raw(&self) -> u32 {
        match self {
            FileType::Object => MH_OBJECT,
            FileType::Execute => MH_EXECUTE,
            FileType::FvmLib => MH_FVMLIB,
            FileType::Core => MH_CORE,
            FileType::Preload => MH_PRELOAD,
            FileType::Dylib => MH_DYLIB,
            FileType::Dylinker => MH_DYLINKER,
            FileType::Bundle => MH_BUNDLE,
            FileType::DylibStub => MH_DYLIB_STUB,
            FileType::Dsym => MH_DSYM,
            FileType::KextBundle => MH_KEXT_BUNDLE,
            FileType::Fileset => MH_FILESET,
            FileType::Unknown(raw) => *raw,
        }
    }
}

// =============================================================================
// Image Header
// =============================================================================

/// A decoded Mach-O header, independent of its on-disk width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Magic number
    pub magic: u32,
    /// True for MH_MAGIC_64
    pub is_64_bit: bool,
    /// CPU type
    pub cputype: i32,
    /// CPU subtype
    pub cpusubtype: i32,
    /// File type
    pub filetype: FileType,
    /// Header flags
    pub flags: MachOFlags,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of the load command region
    pub sizeofcmds: u32,
}

impl ImageHeader {
    /// Size of the on-disk header.
    #[inline]
    pub fn size(&self) -> usize {
        if self.is_64_bit {
            MachHeader64::SIZE
        } else {
            MachHeader32::SIZE
        }
    }

    fn read(view: ByteView<'_>, offset: usize) -> Result<Self> {
        let header = match MachKind::classify(view.tail(offset)?) {
            MachKind::Macho64 => {
                let h: MachHeader64 = view.read_at(offset)?;
                Self {
                    magic: h.magic,
                    is_64_bit: true,
                    cputype: h.cputype,
                    cpusubtype: h.cpusubtype,
                    filetype: FileType::from_raw(h.filetype),
                    flags: MachOFlags::from_bits_retain(h.flags),
                    ncmds: h.ncmds,
                    sizeofcmds: h.sizeofcmds,
                }
            }
            MachKind::Macho32 => {
                let h: MachHeader32 = view.read_at(offset)?;
                Self {
                    magic: h.magic,
                    is_64_bit: false,
                    cputype: h.cputype,
                    cpusubtype: h.cpusubtype,
                    filetype: FileType::from_raw(h.filetype),
                    flags: MachOFlags::from_bits_retain(h.flags),
                    ncmds: h.ncmds,
                    sizeofcmds: h.sizeofcmds,
                }
            }
            MachKind::BigEndianForeign => {
                return Err(Error::NotRecognizedFormat {
                    expected: "little-endian Mach-O",
                    found: "big-endian Mach-O".into(),
                })
            }
            MachKind::NotMachO => {
                let found = match view.u32_le_at(offset) {
                    Ok(magic) => format!("magic {magic:#010x}"),
                    Err(_) => "truncated header".into(),
                };
                return Err(Error::NotRecognizedFormat {
                    expected: "Mach-O",
                    found,
                });
            }
        };

        if let FileType::Unknown(raw) = header.filetype {
            return Err(Error::UnsupportedFileType(raw));
        }

        Ok(header)
    }
}

impl fmt::Display for ImageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MachO {{ arch: {}, type: {:?}, cmds: {}, flags: {:#x} }}",
            arch::arch_name(self.cputype, self.cpusubtype),
            self.filetype,
            self.ncmds,
            self.flags.bits()
        )
    }
}

// =============================================================================
// Validation Options
// =============================================================================

/// Options controlling how strictly an image is validated.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Check each command's size against its structure (default: true)
    pub command_structure: bool,
    /// Require segments of non-cache images to lie inside the buffer
    /// (default: false)
    pub segment_file_bounds: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            command_structure: true,
            segment_file_bounds: false,
        }
    }
}

// =============================================================================
// Load Command Walk
// =============================================================================

/// Walks the load commands of the header at `offset`, stopping early when the
/// callback returns false.
fn walk_commands<'a, F>(
    data: &'a [u8],
    offset: usize,
    header: &ImageHeader,
    mut callback: F,
) -> Result<()>
where
    F: FnMut(LoadCommand<'a>) -> Result<bool>,
{
    let view = ByteView::new(data);
    let start = offset
        .checked_add(header.size())
        .ok_or_else(|| Error::out_of_bounds(offset as u64, header.size() as u64, data.len() as u64))?;
    let end = start
        .checked_add(header.sizeofcmds as usize)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            Error::malformed_commands(
                0,
                header.size(),
                format!(
                    "sizeofcmds {:#x} exceeds the {:#x} bytes after the header",
                    header.sizeofcmds,
                    data.len().saturating_sub(start)
                ),
            )
        })?;

    let mut cursor = start;
    for index in 0..header.ncmds {
        let relative = cursor - offset;
        let fail = |reason: String| {
            error!("load command {} at {:#x}: {}", index, relative, reason);
            Err(Error::malformed_commands(index, relative, reason))
        };

        if cursor + LoadCommandHeader::SIZE > end {
            return fail("command header extends past sizeofcmds".into());
        }
        let cmd = view.u32_le_at(cursor)?;
        let cmdsize = view.u32_le_at(cursor + 4)? as usize;
        if cmdsize < LoadCommandHeader::SIZE {
            return fail(format!("cmdsize {cmdsize} is smaller than 8"));
        }
        if cmdsize % 4 != 0 {
            return fail(format!("cmdsize {cmdsize} is not a multiple of 4"));
        }
        if cmdsize > end - cursor {
            return fail(format!(
                "cmdsize {cmdsize} runs past the end of the load command region"
            ));
        }

        let bytes = view.bytes_at(cursor, cmdsize)?;
        if !callback(LoadCommand::new(cmd, index, relative, bytes))? {
            break;
        }
        cursor += cmdsize;
    }

    Ok(())
}

/// Checks a command's size against the structure its kind implies.
fn check_command_structure(cmd: &LoadCommand<'_>) -> Result<()> {
    let exact = |expected: usize| -> Result<()> {
        if cmd.size() == expected {
            Ok(())
        } else {
            Err(cmd.malformed(format!(
                "{} has cmdsize {}, expected {}",
                cmd.kind,
                cmd.size(),
                expected
            )))
        }
    };

    match cmd.kind {
        LoadCommandKind::Symtab => exact(SymtabCommand::SIZE),
        LoadCommandKind::Dysymtab => exact(DysymtabCommand::SIZE),
        LoadCommandKind::Uuid => exact(UuidCommand::SIZE),
        LoadCommandKind::DyldInfo | LoadCommandKind::DyldInfoOnly => exact(DyldInfoCommand::SIZE),
        LoadCommandKind::Main => exact(EntryPointCommand::SIZE),
        LoadCommandKind::VersionMinMacosx
        | LoadCommandKind::VersionMinIphoneos
        | LoadCommandKind::VersionMinTvos
        | LoadCommandKind::VersionMinWatchos => exact(VersionMinCommand::SIZE),
        LoadCommandKind::SourceVersion => exact(SourceVersionCommand::SIZE),
        LoadCommandKind::EncryptionInfo => exact(EncryptionInfoCommand::SIZE),
        LoadCommandKind::EncryptionInfo64 => exact(EncryptionInfoCommand64::SIZE),
        kind if kind.is_linkedit_data() => exact(LinkeditDataCommand::SIZE),
        LoadCommandKind::Segment => {
            let seg: SegmentCommand32 = cmd.read()?;
            exact(SegmentCommand32::SIZE + seg.nsects as usize * Section32::SIZE)
        }
        LoadCommandKind::Segment64 => {
            let seg: SegmentCommand64 = cmd.read()?;
            exact(SegmentCommand64::SIZE + seg.nsects as usize * Section64::SIZE)
        }
        LoadCommandKind::BuildVersion => {
            let build: BuildVersionCommand = cmd.read()?;
            exact(BuildVersionCommand::SIZE + build.ntools as usize * BuildVersionCommand::TOOL_SIZE)
        }
        kind if kind.is_dylib_reference() || kind == LoadCommandKind::IdDylib => {
            cmd.dylib_path().map(|_| ())
        }
        LoadCommandKind::LoadDylinker
        | LoadCommandKind::IdDylinker
        | LoadCommandKind::DyldEnvironment
        | LoadCommandKind::Rpath
        | LoadCommandKind::SubFramework
        | LoadCommandKind::SubUmbrella
        | LoadCommandKind::SubClient
        | LoadCommandKind::SubLibrary => cmd.string_payload().map(|_| ()),
        LoadCommandKind::FilesetEntry => {
            let entry: FilesetEntryCommand = cmd.read()?;
            cmd.string_at(entry.entry_id_offset, FilesetEntryCommand::SIZE)
                .map(|_| ())
        }
        // dyld refuses to load an image carrying a required command it does not know
        LoadCommandKind::Unrecognized(raw) if raw & LC_REQ_DYLD != 0 => Err(cmd.malformed(
            format!("unknown command {raw:#x} is marked as required by dyld"),
        )),
        _ => Ok(()),
    }
}

/// Checks that a segment's file range lies inside the buffer.
fn check_segment_bounds(cmd: &LoadCommand<'_>, buffer_len: usize) -> Result<()> {
    let (fileoff, filesize) = match cmd.kind {
        LoadCommandKind::Segment => {
            let seg: SegmentCommand32 = cmd.read()?;
            (seg.fileoff as u64, seg.filesize as u64)
        }
        LoadCommandKind::Segment64 => {
            let seg: SegmentCommand64 = cmd.read()?;
            (seg.fileoff, seg.filesize)
        }
        _ => return Ok(()),
    };

    match fileoff.checked_add(filesize) {
        Some(end) if end <= buffer_len as u64 => Ok(()),
        _ => Err(cmd.malformed(format!(
            "segment file range {fileoff:#x}+{filesize:#x} exceeds {buffer_len:#x} bytes"
        ))),
    }
}

fn validate_at(data: &[u8], offset: usize, options: &ValidationOptions) -> Result<ImageHeader> {
    let header = ImageHeader::read(ByteView::new(data), offset)?;
    let in_cache = header.flags.contains(MachOFlags::DYLIB_IN_CACHE);

    walk_commands(data, offset, &header, |cmd| {
        if options.command_structure {
            check_command_structure(&cmd)?;
        }
        if options.segment_file_bounds && !in_cache {
            check_segment_bounds(&cmd, data.len())?;
        }
        Ok(true)
    })?;

    Ok(header)
}

// =============================================================================
// Mach Image
// =============================================================================

/// A validated, borrowed view of one Mach-O image.
///
/// File offsets stored in the image (segments, sections) resolve against the
/// buffer the image was parsed from. LINKEDIT offsets resolve against the
/// linkedit buffer, which is the same buffer unless
/// [`with_linkedit`](Self::with_linkedit) says otherwise.
#[derive(Clone, Copy)]
pub struct MachImage<'a> {
    data: &'a [u8],
    offset: usize,
    header: ImageHeader,
    linkedit: &'a [u8],
}

impl<'a> MachImage<'a> {
    /// Validates an image without retaining it.
    pub fn validate(bytes: &[u8]) -> Result<ImageHeader> {
        validate_at(bytes, 0, &ValidationOptions::default())
    }

    /// Validates an image with explicit options.
    pub fn validate_with(bytes: &[u8], options: &ValidationOptions) -> Result<ImageHeader> {
        validate_at(bytes, 0, options)
    }

    /// Validates and parses an image that starts at the beginning of `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        Self::parse_at(bytes, 0)
    }

    /// Validates and parses an image whose header sits at `offset` inside a
    /// larger buffer, such as a shared cache file.
    pub fn parse_at(bytes: &'a [u8], offset: usize) -> Result<Self> {
        Self::parse_with(bytes, offset, &ValidationOptions::default())
    }

    /// Like [`parse_at`](Self::parse_at), with explicit validation options.
    pub fn parse_with(bytes: &'a [u8], offset: usize, options: &ValidationOptions) -> Result<Self> {
        let header = validate_at(bytes, offset, options)?;
        Ok(Self {
            data: bytes,
            offset,
            header,
            linkedit: bytes,
        })
    }

    /// Resolves LINKEDIT offsets against another buffer.
    pub fn with_linkedit(mut self, linkedit: &'a [u8]) -> Self {
        self.linkedit = linkedit;
        self
    }

    /// Returns the decoded header.
    #[inline]
    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// Returns the offset of the header within [`bytes`](Self::bytes).
    #[inline]
    pub fn header_offset(&self) -> usize {
        self.offset
    }

    /// Returns the buffer the image was parsed from.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the filetype.
    #[inline]
    pub fn filetype(&self) -> FileType {
        self.header.filetype
    }

    /// Returns the header flags.
    #[inline]
    pub fn flags(&self) -> MachOFlags {
        self.header.flags
    }

    /// Returns true for 64-bit images.
    #[inline]
    pub fn is_64_bit(&self) -> bool {
        self.header.is_64_bit
    }

    // ==================== Load Commands ====================

    /// Visits each load command in order. Returning false stops the walk.
    pub fn for_each_load_command<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(LoadCommand<'a>) -> bool,
    {
        walk_commands(self.data, self.offset, &self.header, |cmd| Ok(f(cmd)))
    }

    /// Collects every load command.
    pub fn load_commands(&self) -> Result<Vec<LoadCommand<'a>>> {
        let mut commands = Vec::with_capacity(self.header.ncmds as usize);
        self.for_each_load_command(|cmd| {
            commands.push(cmd);
            true
        })?;
        Ok(commands)
    }

    /// Returns the first command matching `pred`.
    pub(crate) fn find_command<P>(&self, mut pred: P) -> Option<LoadCommand<'a>>
    where
        P: FnMut(&LoadCommand<'a>) -> bool,
    {
        let mut found = None;
        // The walk already succeeded once in `parse`.
        let _ = self.for_each_load_command(|cmd| {
            if pred(&cmd) {
                found = Some(cmd);
                false
            } else {
                true
            }
        });
        found
    }

    /// Returns the first command of the given kind.
    pub fn command(&self, kind: LoadCommandKind) -> Option<LoadCommand<'a>> {
        self.find_command(|cmd| cmd.kind == kind)
    }

    fn has_command(&self, kinds: &[LoadCommandKind]) -> bool {
        self.find_command(|cmd| kinds.contains(&cmd.kind)).is_some()
    }

    /// Returns `len` bytes at a file offset of the image buffer.
    pub fn file_bytes(&self, offset: u64, len: u64) -> Result<&'a [u8]> {
        ByteView::new(self.data).bytes_at_u64(offset, len)
    }

    /// Returns `len` bytes at a LINKEDIT file offset.
    pub fn linkedit_bytes(&self, offset: u64, len: u64) -> Result<&'a [u8]> {
        ByteView::new(self.linkedit).bytes_at_u64(offset, len)
    }

    // ==================== Architecture ====================

    /// Returns the architecture table entry, if known.
    pub fn architecture(&self) -> Option<&'static Architecture> {
        Architecture::lookup(self.header.cputype, self.header.cpusubtype)
    }

    /// Returns the architecture name, or "unknown".
    pub fn arch_name(&self) -> &'static str {
        arch::arch_name(self.header.cputype, self.header.cpusubtype)
    }

    /// Returns the pointer size in bytes.
    #[inline]
    pub fn pointer_size(&self) -> u64 {
        if self.header.is_64_bit {
            8
        } else {
            4
        }
    }

    /// Returns the VM page size the image is laid out for.
    pub fn page_size(&self) -> u64 {
        arch::page_size(
            self.header.cputype,
            self.header.cpusubtype,
            self.header.filetype.raw(),
        )
    }

    // ==================== Predicates ====================

    /// MH_DYLIB
    pub fn is_dylib(&self) -> bool {
        self.header.filetype == FileType::Dylib
    }

    /// MH_BUNDLE
    pub fn is_bundle(&self) -> bool {
        self.header.filetype == FileType::Bundle
    }

    /// MH_EXECUTE
    pub fn is_main_executable(&self) -> bool {
        self.header.filetype == FileType::Execute
    }

    /// MH_KEXT_BUNDLE
    pub fn is_kext_bundle(&self) -> bool {
        self.header.filetype == FileType::KextBundle
    }

    /// MH_FILESET
    pub fn is_fileset(&self) -> bool {
        self.header.filetype == FileType::Fileset
    }

    /// MH_PRELOAD
    pub fn is_preload(&self) -> bool {
        self.header.filetype == FileType::Preload
    }

    /// MH_DYLINKER
    pub fn is_dyld(&self) -> bool {
        self.header.filetype == FileType::Dylinker
    }

    /// MH_OBJECT
    pub fn is_object_file(&self) -> bool {
        self.header.filetype == FileType::Object
    }

    /// MH_DYLIB_STUB
    pub fn is_dylib_stub(&self) -> bool {
        self.header.filetype == FileType::DylibStub
    }

    /// Returns true if the image loads at a random address.
    pub fn is_pie(&self) -> bool {
        self.header.flags.contains(MachOFlags::PIE)
    }

    /// Returns true if the image is part of a dyld shared cache.
    pub fn in_dyld_cache(&self) -> bool {
        self.header.flags.contains(MachOFlags::DYLIB_IN_CACHE)
    }

    /// Returns true if the image exports weak definitions.
    pub fn has_weak_defs(&self) -> bool {
        self.header.flags.contains(MachOFlags::WEAK_DEFINES)
    }

    /// Returns true if the image binds to weak definitions.
    pub fn uses_weak_defs(&self) -> bool {
        self.header.flags.contains(MachOFlags::BINDS_TO_WEAK)
    }

    /// Returns true if the image uses two-level namespace bindings.
    pub fn uses_two_level_namespace(&self) -> bool {
        self.header.flags.contains(MachOFlags::TWOLEVEL)
    }

    /// Returns true if the image has thread-local variables.
    pub fn has_thread_local_variables(&self) -> bool {
        self.header.flags.contains(MachOFlags::HAS_TLV_DESCRIPTORS)
    }

    /// Returns true if the image was linked for app extensions.
    pub fn is_app_extension_safe(&self) -> bool {
        self.header.flags.contains(MachOFlags::APP_EXTENSION_SAFE)
    }

    /// Returns true if the image allows simulator platforms.
    pub fn is_sim_support(&self) -> bool {
        self.header.flags.contains(MachOFlags::SIM_SUPPORT)
    }

    /// An executable that requests a dynamic linker.
    pub fn is_dynamic_executable(&self) -> bool {
        self.is_main_executable() && self.has_command(&[LoadCommandKind::LoadDylinker])
    }

    /// An executable without a dynamic linker.
    pub fn is_static_executable(&self) -> bool {
        self.is_main_executable() && !self.has_command(&[LoadCommandKind::LoadDylinker])
    }

    /// Returns true if fixups are encoded as chains.
    pub fn has_chained_fixups(&self) -> bool {
        self.has_command(&[LoadCommandKind::DyldChainedFixups])
    }

    /// Returns true if fixups are encoded as rebase/bind opcodes.
    pub fn has_opcode_fixups(&self) -> bool {
        self.has_command(&[LoadCommandKind::DyldInfo, LoadCommandKind::DyldInfoOnly])
    }

    /// Returns true if the image carries LC_CODE_SIGNATURE.
    pub fn has_code_signature(&self) -> bool {
        self.has_command(&[LoadCommandKind::CodeSignature])
    }

    // ==================== Metadata ====================

    /// Returns the image UUID.
    pub fn uuid(&self) -> Option<[u8; 16]> {
        self.command(LoadCommandKind::Uuid)
            .and_then(|cmd| cmd.read::<UuidCommand>().ok())
            .map(|cmd| cmd.uuid)
    }

    /// Returns the install name from LC_ID_DYLIB.
    pub fn install_name(&self) -> Option<&'a str> {
        self.command(LoadCommandKind::IdDylib)
            .and_then(|cmd| cmd.dylib_path().ok())
    }

    /// Returns the paths of dependent libraries, in library-ordinal order.
    pub fn dylibs(&self) -> Vec<&'a str> {
        self.strings_of(|kind| kind.is_dylib_reference(), |cmd| cmd.dylib_path())
    }

    /// Returns the LC_RPATH entries.
    pub fn rpaths(&self) -> Vec<&'a str> {
        self.strings_of(
            |kind| kind == LoadCommandKind::Rpath,
            |cmd| cmd.string_payload(),
        )
    }

    /// Returns the dynamic linker path.
    pub fn dylinker(&self) -> Option<&'a str> {
        self.command(LoadCommandKind::LoadDylinker)
            .and_then(|cmd| cmd.string_payload().ok())
    }

    fn strings_of(
        &self,
        select: impl Fn(LoadCommandKind) -> bool,
        read: impl Fn(&LoadCommand<'a>) -> Result<&'a str>,
    ) -> Vec<&'a str> {
        let mut out = Vec::new();
        let _ = self.for_each_load_command(|cmd| {
            if select(cmd.kind) {
                if let Ok(s) = read(&cmd) {
                    out.push(s);
                }
            }
            true
        });
        out
    }
}

impl fmt::Debug for MachImage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachImage")
            .field("header", &self.header)
            .field("offset", &self.offset)
            .field("len", &self.data.len())
            .field("linkedit_len", &self.linkedit.len())
            .finish()
    }
}
