//! Load command kinds and borrowed load command views.

use std::fmt;

use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::constants::*;
use super::structs::*;
use crate::error::{Error, Result};
use crate::util::ByteView;

// =============================================================================
// Load Command Kind
// =============================================================================

/// The kind of a load command, resolved from its raw `cmd` value.
///
/// Commands this crate does not know are kept as
/// [`Unrecognized`](LoadCommandKind::Unrecognized) rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // Variants mirror the LC_* constants
pub enum LoadCommandKind {
    Segment,
    Segment64,
    Symtab,
    Symseg,
    Thread,
    UnixThread,
    LoadFvmlib,
    IdFvmlib,
    Ident,
    FvmFile,
    Prepage,
    Dysymtab,
    LoadDylib,
    IdDylib,
    LoadDylinker,
    IdDylinker,
    PreboundDylib,
    Routines,
    Routines64,
    SubFramework,
    SubUmbrella,
    SubClient,
    SubLibrary,
    TwolevelHints,
    PrebindChecksum,
    LoadWeakDylib,
    Uuid,
    Rpath,
    CodeSignature,
    SegmentSplitInfo,
    ReexportDylib,
    LazyLoadDylib,
    EncryptionInfo,
    EncryptionInfo64,
    DyldInfo,
    DyldInfoOnly,
    LoadUpwardDylib,
    VersionMinMacosx,
    VersionMinIphoneos,
    VersionMinTvos,
    VersionMinWatchos,
    FunctionStarts,
    DyldEnvironment,
    Main,
    DataInCode,
    SourceVersion,
    DylibCodeSignDrs,
    LinkerOption,
    LinkerOptimizationHint,
    Note,
    BuildVersion,
    DyldExportsTrie,
    DyldChainedFixups,
    FilesetEntry,
    AtomInfo,
    Unrecognized(u32),
}

/// Raw command id, kind and display name for every known load command.
static LOAD_COMMANDS: &[(u32, LoadCommandKind, &str)] = &[
    (LC_SEGMENT, LoadCommandKind::Segment, "LC_SEGMENT"),
    (LC_SYMTAB, LoadCommandKind::Symtab, "LC_SYMTAB"),
    (LC_SYMSEG, LoadCommandKind::Symseg, "LC_SYMSEG"),
    (LC_THREAD, LoadCommandKind::Thread, "LC_THREAD"),
    (LC_UNIXTHREAD, LoadCommandKind::UnixThread, "LC_UNIXTHREAD"),
    (LC_LOADFVMLIB, LoadCommandKind::LoadFvmlib, "LC_LOADFVMLIB"),
    (LC_IDFVMLIB, LoadCommandKind::IdFvmlib, "LC_IDFVMLIB"),
    (LC_IDENT, LoadCommandKind::Ident, "LC_IDENT"),
    (LC_FVMFILE, LoadCommandKind::FvmFile, "LC_FVMFILE"),
    (LC_PREPAGE, LoadCommandKind::Prepage, "LC_PREPAGE"),
    (LC_DYSYMTAB, LoadCommandKind::Dysymtab, "LC_DYSYMTAB"),
    (LC_LOAD_DYLIB, LoadCommandKind::LoadDylib, "LC_LOAD_DYLIB"),
    (LC_ID_DYLIB, LoadCommandKind::IdDylib, "LC_ID_DYLIB"),
    (LC_LOAD_DYLINKER, LoadCommandKind::LoadDylinker, "LC_LOAD_DYLINKER"),
    (LC_ID_DYLINKER, LoadCommandKind::IdDylinker, "LC_ID_DYLINKER"),
    (LC_PREBOUND_DYLIB, LoadCommandKind::PreboundDylib, "LC_PREBOUND_DYLIB"),
    (LC_ROUTINES, LoadCommandKind::Routines, "LC_ROUTINES"),
    (LC_SUB_FRAMEWORK, LoadCommandKind::SubFramework, "LC_SUB_FRAMEWORK"),
    (LC_SUB_UMBRELLA, LoadCommandKind::SubUmbrella, "LC_SUB_UMBRELLA"),
    (LC_SUB_CLIENT, LoadCommandKind::SubClient, "LC_SUB_CLIENT"),
    (LC_SUB_LIBRARY, LoadCommandKind::SubLibrary, "LC_SUB_LIBRARY"),
    (LC_TWOLEVEL_HINTS, LoadCommandKind::TwolevelHints, "LC_TWOLEVEL_HINTS"),
    (LC_PREBIND_CKSUM, LoadCommandKind::PrebindChecksum, "LC_PREBIND_CKSUM"),
    (LC_LOAD_WEAK_DYLIB, LoadCommandKind::LoadWeakDylib, "LC_LOAD_WEAK_DYLIB"),
    (LC_SEGMENT_64, LoadCommandKind::Segment64, "LC_SEGMENT_64"),
    (LC_ROUTINES_64, LoadCommandKind::Routines64, "LC_ROUTINES_64"),
    (LC_UUID, LoadCommandKind::Uuid, "LC_UUID"),
    (LC_RPATH, LoadCommandKind::Rpath, "LC_RPATH"),
    (LC_CODE_SIGNATURE, LoadCommandKind::CodeSignature, "LC_CODE_SIGNATURE"),
    (LC_SEGMENT_SPLIT_INFO, LoadCommandKind::SegmentSplitInfo, "LC_SEGMENT_SPLIT_INFO"),
    (LC_REEXPORT_DYLIB, LoadCommandKind::ReexportDylib, "LC_REEXPORT_DYLIB"),
    (LC_LAZY_LOAD_DYLIB, LoadCommandKind::LazyLoadDylib, "LC_LAZY_LOAD_DYLIB"),
    (LC_ENCRYPTION_INFO, LoadCommandKind::EncryptionInfo, "LC_ENCRYPTION_INFO"),
    (LC_DYLD_INFO, LoadCommandKind::DyldInfo, "LC_DYLD_INFO"),
    (LC_DYLD_INFO_ONLY, LoadCommandKind::DyldInfoOnly, "LC_DYLD_INFO_ONLY"),
    (LC_LOAD_UPWARD_DYLIB, LoadCommandKind::LoadUpwardDylib, "LC_LOAD_UPWARD_DYLIB"),
    (LC_VERSION_MIN_MACOSX, LoadCommandKind::VersionMinMacosx, "LC_VERSION_MIN_MACOSX"),
    (LC_VERSION_MIN_IPHONEOS, LoadCommandKind::VersionMinIphoneos, "LC_VERSION_MIN_IPHONEOS"),
    (LC_FUNCTION_STARTS, LoadCommandKind::FunctionStarts, "LC_FUNCTION_STARTS"),
    (LC_DYLD_ENVIRONMENT, LoadCommandKind::DyldEnvironment, "LC_DYLD_ENVIRONMENT"),
    (LC_MAIN, LoadCommandKind::Main, "LC_MAIN"),
    (LC_DATA_IN_CODE, LoadCommandKind::DataInCode, "LC_DATA_IN_CODE"),
    (LC_SOURCE_VERSION, LoadCommandKind::SourceVersion, "LC_SOURCE_VERSION"),
    (LC_DYLIB_CODE_SIGN_DRS, LoadCommandKind::DylibCodeSignDrs, "LC_DYLIB_CODE_SIGN_DRS"),
    (LC_ENCRYPTION_INFO_64, LoadCommandKind::EncryptionInfo64, "LC_ENCRYPTION_INFO_64"),
    (LC_LINKER_OPTION, LoadCommandKind::LinkerOption, "LC_LINKER_OPTION"),
    (
        LC_LINKER_OPTIMIZATION_HINT,
        LoadCommandKind::LinkerOptimizationHint,
        "LC_LINKER_OPTIMIZATION_HINT",
    ),
    (LC_VERSION_MIN_TVOS, LoadCommandKind::VersionMinTvos, "LC_VERSION_MIN_TVOS"),
    (LC_VERSION_MIN_WATCHOS, LoadCommandKind::VersionMinWatchos, "LC_VERSION_MIN_WATCHOS"),
    (LC_NOTE, LoadCommandKind::Note, "LC_NOTE"),
    (LC_BUILD_VERSION, LoadCommandKind::BuildVersion, "LC_BUILD_VERSION"),
    (LC_DYLD_EXPORTS_TRIE, LoadCommandKind::DyldExportsTrie, "LC_DYLD_EXPORTS_TRIE"),
    (LC_DYLD_CHAINED_FIXUPS, LoadCommandKind::DyldChainedFixups, "LC_DYLD_CHAINED_FIXUPS"),
    (LC_FILESET_ENTRY, LoadCommandKind::FilesetEntry, "LC_FILESET_ENTRY"),
    (LC_ATOM_INFO, LoadCommandKind::AtomInfo, "LC_ATOM_INFO"),
];

impl LoadCommandKind {
    /// Resolves a raw command id.
    pub fn from_raw(cmd: u32) -> Self {
        LOAD_COMMANDS
            .iter()
            .find(|(raw, _, _)| *raw == cmd)
            .map(|(_, kind, _)| *kind)
            .unwrap_or(LoadCommandKind::Unrecognized(cmd))
    }

    /// Returns the LC_* name, or `None` for unrecognized commands.
    pub fn name(&self) -> Option<&'static str> {
        LOAD_COMMANDS
            .iter()
            .find(|(_, kind, _)| kind == self)
            .map(|(_, _, name)| *name)
    }

    /// Returns true for commands that reference another dylib.
    pub fn is_dylib_reference(&self) -> bool {
        matches!(
            self,
            LoadCommandKind::LoadDylib
                | LoadCommandKind::LoadWeakDylib
                | LoadCommandKind::ReexportDylib
                | LoadCommandKind::LoadUpwardDylib
                | LoadCommandKind::LazyLoadDylib
        )
    }

    /// Returns true for commands laid out as a `linkedit_data_command`.
    pub fn is_linkedit_data(&self) -> bool {
        matches!(
            self,
            LoadCommandKind::CodeSignature
                | LoadCommandKind::SegmentSplitInfo
                | LoadCommandKind::FunctionStarts
                | LoadCommandKind::DataInCode
                | LoadCommandKind::DylibCodeSignDrs
                | LoadCommandKind::LinkerOptimizationHint
                | LoadCommandKind::DyldExportsTrie
                | LoadCommandKind::DyldChainedFixups
                | LoadCommandKind::AtomInfo
        )
    }
}

impl fmt::Display for LoadCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => match self {
                LoadCommandKind::Unrecognized(cmd) => write!(f, "LC_UNKNOWN({cmd:#x})"),
                _ => write!(f, "{self:?}"),
            },
        }
    }
}

// =============================================================================
// Load Command View
// =============================================================================

/// A borrowed view of one load command.
#[derive(Debug, Clone, Copy)]
pub struct LoadCommand<'a> {
    /// Resolved kind
    pub kind: LoadCommandKind,
    /// Raw command id
    pub cmd: u32,
    /// Position in the load command list
    pub index: u32,
    /// Offset of the command from the start of the Mach-O header
    pub offset: usize,
    bytes: &'a [u8],
}

impl<'a> LoadCommand<'a> {
    pub(crate) fn new(cmd: u32, index: u32, offset: usize, bytes: &'a [u8]) -> Self {
        Self {
            kind: LoadCommandKind::from_raw(cmd),
            cmd,
            index,
            offset,
            bytes,
        }
    }

    /// Returns the command size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the raw bytes of the command, including its header.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Reads the command as a fixed-layout structure.
    pub fn read<T>(&self) -> Result<T>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        ByteView::new(self.bytes).read_at(0).map_err(|_| {
            self.malformed(format!(
                "{} is {} bytes, expected at least {}",
                self.kind,
                self.bytes.len(),
                std::mem::size_of::<T>()
            ))
        })
    }

    /// Reads a `lc_str` stored at `str_offset` from the start of the command.
    ///
    /// The string must start after `min_offset` and be NUL-terminated inside
    /// the command.
    pub fn string_at(&self, str_offset: u32, min_offset: usize) -> Result<&'a str> {
        let start = str_offset as usize;
        if start < min_offset || start >= self.bytes.len() {
            return Err(self.malformed(format!(
                "{} string offset {:#x} outside command of {} bytes",
                self.kind,
                str_offset,
                self.bytes.len()
            )));
        }
        let tail = &self.bytes[start..];
        let end = memchr::memchr(0, tail).ok_or_else(|| {
            self.malformed(format!("{} string is not NUL-terminated", self.kind))
        })?;
        std::str::from_utf8(&tail[..end])
            .map_err(|_| self.malformed(format!("{} string is not valid UTF-8", self.kind)))
    }

    /// Returns the `(dataoff, datasize)` pair of a linkedit data command.
    pub fn linkedit_data(&self) -> Result<LinkeditDataCommand> {
        self.read::<LinkeditDataCommand>()
    }

    /// Returns the path of a dylib command.
    pub fn dylib_path(&self) -> Result<&'a str> {
        let command = self.read::<DylibCommand>()?;
        self.string_at(command.dylib.name_offset, DylibCommand::SIZE)
    }

    /// Returns the string of a dylinker/rpath/sub-framework style command.
    pub fn string_payload(&self) -> Result<&'a str> {
        let command = self.read::<StringCommand>()?;
        self.string_at(command.offset, StringCommand::SIZE)
    }

    pub(crate) fn malformed(&self, reason: String) -> Error {
        Error::malformed_commands(self.index, self.offset, reason)
    }
}
